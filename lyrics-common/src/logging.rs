//! Tracing subscriber bootstrap
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies to the
//! resolver crate and the HTTP trace layer.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter used by [`init_tracing`]
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("lyrics_resolver={level},lyrics_common={level},tower_http={level}"))
    })
}

/// Install the global tracing subscriber
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(level: &str) -> crate::Result<()> {
    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| crate::Error::Internal(format!("Tracing init failed: {}", e)))
}
