//! Error types for lyrics-resolver
//!
//! - [`SourceError`]: a single upstream probe failed to answer definitively
//! - [`ResolveError`]: why a resolution produced no lyrics, with status mapping
//! - [`ApiError`]: HTTP layer errors

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Failure of one source probe
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Transport failure (connect, reset, DNS)
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream answered with a non-success status other than 404
    #[error("Upstream returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Payload could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Upstream answered success with nothing usable
    #[error("Empty response: {0}")]
    EmptyContent(String),

    /// Per-call timeout elapsed
    #[error("Timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Request deadline reached while the call was pending
    #[error("Request deadline exceeded")]
    DeadlineExceeded,

    /// Call abandoned because its branch was cancelled
    #[error("Cancelled")]
    Cancelled,

    /// Probe worker task failed
    #[error("Probe worker failed: {0}")]
    Worker(String),
}

impl SourceError {
    /// Upstream HTTP status, when the upstream answered at all
    pub fn status_code(&self) -> Option<u16> {
        match self {
            SourceError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Eligible for the single per-call retry
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Network(_) | SourceError::Timeout(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            SourceError::Timeout(_) | SourceError::DeadlineExceeded | SourceError::Cancelled
        )
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not expose the configured duration
            SourceError::Timeout(Duration::ZERO)
        } else if err.is_decode() {
            SourceError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            SourceError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

/// Why a resolution did not produce lyrics
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Malformed input: blank track id
    #[error("Track id is required")]
    MissingTrackId,

    /// A source confirmed absence
    #[error("Not found: {0}")]
    NotFound(String),

    /// A source failed to answer
    #[error("{context}: {error}")]
    Source { context: String, error: SourceError },

    /// Required endpoint unset
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Whole-request deadline exceeded
    #[error("Deadline of {}ms exceeded", .0.as_millis())]
    Timeout(Duration),

    /// Every branch exhausted
    #[error("{}", join_messages(.0))]
    Aggregate(Vec<ResolveError>),
}

fn join_messages(errors: &[ResolveError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ResolveError {
    pub fn source(context: impl Into<String>, error: SourceError) -> Self {
        ResolveError::Source {
            context: context.into(),
            error,
        }
    }

    /// User-visible status code
    ///
    /// Upstream 5xx → 502, timeout → 408, confirmed absence → 404,
    /// anything else → 500. Aggregates pick by that priority.
    pub fn status_code(&self) -> u16 {
        match self {
            ResolveError::MissingTrackId => 400,
            ResolveError::NotFound(_) => 404,
            ResolveError::Source { error, .. } => match error.status_code() {
                Some(status) if status >= 500 => 502,
                _ if error.is_timeout() => 408,
                _ => 500,
            },
            ResolveError::Configuration(_) => 500,
            ResolveError::Timeout(_) => 408,
            ResolveError::Aggregate(errors) => {
                let codes: Vec<u16> = errors.iter().map(ResolveError::status_code).collect();
                [502, 408, 500]
                    .into_iter()
                    .find(|code| codes.contains(code))
                    .unwrap_or(404)
            }
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// `resolve` itself only fails with `MissingTrackId`; upstream problems
/// come back as `SearchResult::NotFound`. The `Internal` arm keeps the
/// conversion total over `ResolveError` so handlers can use `?` on any
/// engine call.
impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::MissingTrackId => ApiError::BadRequest(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
