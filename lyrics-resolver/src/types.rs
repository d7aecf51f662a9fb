//! Resolution data model
//!
//! All values are created per request (or per cache write) and never
//! mutated afterwards.

use crate::error::{ResolveError, SourceError};
use crate::formats::{parse_fallback_order, LyricFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Backing provider of lyric data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Curated content repository
    Repository,
    /// Third-party lyric API
    External,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Repository => f.write_str("repository"),
            Source::External => f.write_str("external"),
        }
    }
}

/// Lyrics found by one probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricHit {
    pub format: LyricFormat,
    pub source: Source,
    pub content: String,
    /// Translation, external source only
    pub translation: Option<String>,
    /// Romanization, external source only
    pub romaji: Option<String>,
}

impl LyricHit {
    pub fn repository(format: LyricFormat, content: impl Into<String>) -> Self {
        Self {
            format,
            source: Source::Repository,
            content: content.into(),
            translation: None,
            romaji: None,
        }
    }

    pub fn external(
        format: LyricFormat,
        content: impl Into<String>,
        translation: Option<String>,
        romaji: Option<String>,
    ) -> Self {
        Self {
            format,
            source: Source::External,
            content: content.into(),
            translation,
            romaji,
        }
    }
}

/// Failed probe, with the format it targeted when known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub format: Option<LyricFormat>,
    pub error: SourceError,
}

/// Outcome of one source+format attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Found(LyricHit),
    /// Source positively confirmed absence
    NotFound { format: Option<LyricFormat> },
    /// Source failed to answer definitively
    Error(SourceFailure),
}

impl FetchOutcome {
    pub fn error(format: Option<LyricFormat>, error: SourceError) -> Self {
        FetchOutcome::Error(SourceFailure { format, error })
    }

    pub fn is_found(&self) -> bool {
        matches!(self, FetchOutcome::Found(_))
    }

    /// Transient failures worth one more attempt
    pub fn is_transient_error(&self) -> bool {
        matches!(self, FetchOutcome::Error(failure) if failure.error.is_transient())
    }
}

/// Final answer for one client request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SearchResult {
    Found {
        id: String,
        format: LyricFormat,
        source: Source,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        translation: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        romaji: Option<String>,
    },
    NotFound {
        id: String,
        error: String,
        #[serde(rename = "statusCode", skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },
}

impl SearchResult {
    pub fn found(id: &str, hit: LyricHit) -> Self {
        SearchResult::Found {
            id: id.to_string(),
            format: hit.format,
            source: hit.source,
            content: hit.content,
            translation: hit.translation,
            romaji: hit.romaji,
        }
    }

    pub fn not_found(id: &str, error: &ResolveError) -> Self {
        SearchResult::NotFound {
            id: id.to_string(),
            error: error.to_string(),
            status_code: Some(error.status_code()),
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, SearchResult::Found { .. })
    }

    /// HTTP status the wrapping layer should answer with
    pub fn http_status(&self) -> u16 {
        match self {
            SearchResult::Found { .. } => 200,
            SearchResult::NotFound { status_code, .. } => status_code.unwrap_or(404),
        }
    }
}

/// Caller-supplied request options, as received
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResolveOptions {
    /// Forced format (case-insensitive)
    pub fixed_format: Option<String>,
    /// Comma-separated fallback order
    pub fallback_order: Option<String>,
}

impl ResolveOptions {
    pub fn fixed(format: impl Into<String>) -> Self {
        Self {
            fixed_format: Some(format.into()),
            fallback_order: None,
        }
    }

    pub fn fallback(order: impl Into<String>) -> Self {
        Self {
            fixed_format: None,
            fallback_order: Some(order.into()),
        }
    }
}

/// Normalized request shape; two equal shapes are cache-equivalent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveRequest {
    pub id: String,
    pub fixed_format: Option<LyricFormat>,
    pub fallback_order: Option<Vec<LyricFormat>>,
}

impl ResolveRequest {
    /// Normalize raw options; invalid parts are dropped with a warning
    pub fn new(id: &str, options: &ResolveOptions) -> Self {
        let fixed_format = options
            .fixed_format
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .and_then(|raw| match raw.parse::<LyricFormat>() {
                Ok(format) => Some(format),
                Err(e) => {
                    warn!(track_id = id, error = %e, "Ignoring invalid fixed format");
                    None
                }
            });

        let fallback_order = options
            .fallback_order
            .as_deref()
            .map(parse_fallback_order)
            .filter(|order| !order.is_empty());

        Self {
            id: id.to_string(),
            fixed_format,
            fallback_order,
        }
    }

    /// Deterministic composite key over (id, fixed format, fallback order)
    pub fn cache_key(&self) -> String {
        let fixed = self
            .fixed_format
            .map(|f| f.as_str().to_string())
            .unwrap_or_else(|| "-".to_string());
        let fallback = self
            .fallback_order
            .as_ref()
            .map(|order| {
                order
                    .iter()
                    .map(LyricFormat::as_str)
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .unwrap_or_else(|| "-".to_string());

        format!("{}|{}|{}", self.id, fixed, fallback)
    }
}
