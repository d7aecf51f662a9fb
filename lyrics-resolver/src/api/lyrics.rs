//! Lyrics lookup endpoints
//!
//! - `GET /lyrics/:id?format=&fallback=`
//! - `GET /lyrics?id=&format=&fallback=`
//!
//! The body is always the `SearchResult`; the HTTP status mirrors it
//! (200 when found, otherwise the result's status code).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::types::{ResolveOptions, SearchResult};
use crate::AppState;

/// Query parameters accepted by the lyrics endpoints
#[derive(Debug, Default, Deserialize)]
pub struct LyricsQuery {
    /// Track id (query form only)
    pub id: Option<String>,
    /// Fixed format
    pub format: Option<String>,
    /// Comma-separated fallback order
    pub fallback: Option<String>,
}

impl LyricsQuery {
    fn options(&self) -> ResolveOptions {
        ResolveOptions {
            fixed_format: self.format.clone(),
            fallback_order: self.fallback.clone(),
        }
    }
}

/// GET /lyrics/:id
pub async fn get_lyrics(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LyricsQuery>,
) -> ApiResult<Response> {
    resolve_response(&state, &id, &query).await
}

/// GET /lyrics?id=
pub async fn search_lyrics(
    State(state): State<AppState>,
    Query(query): Query<LyricsQuery>,
) -> ApiResult<Response> {
    let id = query
        .id
        .clone()
        .ok_or_else(|| ApiError::BadRequest("Missing required parameter: id".to_string()))?;
    resolve_response(&state, &id, &query).await
}

async fn resolve_response(state: &AppState, id: &str, query: &LyricsQuery) -> ApiResult<Response> {
    let result = state.resolver.resolve(id, &query.options()).await?;

    if let SearchResult::NotFound { error, .. } = &result {
        if result.http_status() >= 500 {
            *state.last_error.write().await = Some(error.clone());
        }
    }

    let status = StatusCode::from_u16(result.http_status()).unwrap_or(StatusCode::NOT_FOUND);
    Ok((status, Json(result)).into_response())
}

/// Build lyrics routes
pub fn lyrics_routes() -> Router<AppState> {
    Router::new()
        .route("/lyrics", get(search_lyrics))
        .route("/lyrics/:id", get(get_lyrics))
}
