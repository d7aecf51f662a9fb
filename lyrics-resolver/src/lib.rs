//! lyrics-resolver library interface
//!
//! Resolves song lyrics for a track id from a curated content repository
//! and a third-party lyric API, tolerating partial failure of either.

pub mod api;
pub mod config;
pub mod error;
pub mod formats;
pub mod services;
pub mod sources;
pub mod types;
pub mod utils;

pub use crate::error::{ApiError, ApiResult, ResolveError, SourceError};
pub use crate::formats::LyricFormat;
pub use crate::services::LyricsResolver;
pub use crate::types::{ResolveOptions, SearchResult, Source};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Resolution engine
    pub resolver: Arc<LyricsResolver>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last upstream failure for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(resolver: Arc<LyricsResolver>) -> Self {
        Self {
            resolver,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::lyrics_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
