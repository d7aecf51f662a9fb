//! Repository Client
//!
//! Probes a raw content host (e.g. a git hosting "raw" endpoint) for one
//! lyric file per track and format.
//!
//! # Status handling
//! - 200 with content → `Found`
//! - 200 with a blank body → `Error` (ambiguous answers are never treated as absence)
//! - 404 → `NotFound`
//! - anything else → `Error` carrying the upstream status

use crate::error::SourceError;
use crate::formats::LyricFormat;
use crate::sources::RepositorySource;
use crate::types::{FetchOutcome, LyricHit};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode, Url};
use std::time::Duration;
use tracing::debug;

/// User-Agent header sent to the content host
const USER_AGENT: &str = concat!("lyrics-resolver/", env!("CARGO_PKG_VERSION"));

/// Default request path below the base URL
pub const DEFAULT_PATH_TEMPLATE: &str = "{format}/{id}.{format}";

/// Raw content repository client
#[derive(Debug)]
pub struct RepositoryClient {
    /// HTTP client for content requests
    http_client: Client,
    /// Base URL, e.g. `https://raw.example.org/org/lyrics/main`
    base_url: Url,
    /// Path with `{id}` and `{format}` placeholders
    path_template: String,
}

impl RepositoryClient {
    /// Create a repository client
    ///
    /// `timeout` bounds a single HTTP exchange; the resolver applies its own
    /// per-call timeout on top.
    pub fn new(
        base_url: &str,
        path_template: &str,
        auth_token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| SourceError::Parse(format!("Invalid repository URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(SourceError::Parse(format!(
                "Repository URL cannot be a base: {base_url}"
            )));
        }

        let mut headers = header::HeaderMap::new();
        if let Some(token) = auth_token {
            let value = header::HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| SourceError::Parse(format!("Invalid repository token: {e}")))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| SourceError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url,
            path_template: path_template.to_string(),
        })
    }

    /// URL of the `format` file for `id`
    ///
    /// Each template segment is substituted then percent-encoded on its
    /// own, so an id cannot escape its segment.
    pub fn url_for(&self, id: &str, format: LyricFormat) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            for part in self.path_template.split('/').filter(|p| !p.is_empty()) {
                let rendered = part
                    .replace("{id}", id)
                    .replace("{format}", format.as_str());
                segments.push(&rendered);
            }
        }
        url
    }

    async fn probe(&self, id: &str, format: LyricFormat) -> Result<Option<String>, SourceError> {
        let url = self.url_for(id, format);
        debug!(track_id = %id, %format, url = %url, "Probing repository");

        let response = self.http_client.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Http {
                status: status.as_u16(),
                message: truncate(&body, 200),
            });
        }

        let content = response.text().await?;
        if content.trim().is_empty() {
            return Err(SourceError::EmptyContent(format!(
                "repository returned a blank {format} file for {id}"
            )));
        }

        Ok(Some(content))
    }
}

#[async_trait]
impl RepositorySource for RepositoryClient {
    async fn fetch(&self, id: &str, format: LyricFormat) -> FetchOutcome {
        match self.probe(id, format).await {
            Ok(Some(content)) => FetchOutcome::Found(LyricHit::repository(format, content)),
            Ok(None) => FetchOutcome::NotFound {
                format: Some(format),
            },
            Err(error) => FetchOutcome::error(Some(format), error),
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str, template: &str) -> RepositoryClient {
        RepositoryClient::new(base, template, None, Duration::from_secs(3)).unwrap()
    }

    #[test]
    fn test_url_default_template() {
        let client = client("https://raw.example.org/org/lyrics/main", DEFAULT_PATH_TEMPLATE);
        assert_eq!(
            client.url_for("1824020871", LyricFormat::Ttml).as_str(),
            "https://raw.example.org/org/lyrics/main/ttml/1824020871.ttml"
        );
    }

    #[test]
    fn test_url_trailing_slash_base() {
        let client = client("https://raw.example.org/lyrics/", "data/{id}/{format}");
        assert_eq!(
            client.url_for("42", LyricFormat::Yrc).as_str(),
            "https://raw.example.org/lyrics/data/42/yrc"
        );
    }

    #[test]
    fn test_url_encodes_id() {
        let client = client("https://raw.example.org", DEFAULT_PATH_TEMPLATE);
        let url = client.url_for("../secret", LyricFormat::Lrc);
        assert_eq!(url.as_str(), "https://raw.example.org/lrc/..%2Fsecret.lrc");
    }

    #[test]
    fn test_invalid_base_url() {
        let result = RepositoryClient::new("not a url", DEFAULT_PATH_TEMPLATE, None, Duration::from_secs(1));
        assert!(matches!(result, Err(SourceError::Parse(_))));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
