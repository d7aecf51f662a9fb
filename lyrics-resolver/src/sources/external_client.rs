//! External lyric API client
//!
//! Fetches one JSON payload per track holding up to four lyric fields:
//! `yrc` and `lrc` (primary), `tlyric` (translation) and `romalrc`
//! (romanization). Each field is optional; an absent field means "not
//! present", never an error.
//!
//! # Rate limiting
//! An optional client-side quota (requests per second) is enforced by
//! [`ExternalSource::admit`], which the engine awaits before taking an
//! outbound permit.

use crate::error::SourceError;
use crate::formats::LyricFormat;
use crate::sources::{filter_timed_lines, ExternalSource};
use crate::types::{FetchOutcome, LyricHit};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("lyrics-resolver/", env!("CARGO_PKG_VERSION"));

/// Primary formats tried when the caller gives no hint
const UNHINTED_PREFERENCE: [LyricFormat; 2] = [LyricFormat::Yrc, LyricFormat::Lrc];

type DirectRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// External lyric API client
pub struct ExternalClient {
    http_client: Client,
    /// Full endpoint URL without query
    endpoint: Url,
    /// Optional request quota
    rate_limiter: Option<DirectRateLimiter>,
}

impl ExternalClient {
    pub fn new(
        base_url: &str,
        lyric_path: &str,
        timeout: Duration,
        requests_per_second: Option<u32>,
    ) -> Result<Self, SourceError> {
        let joined = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            lyric_path.trim_start_matches('/')
        );
        let endpoint = Url::parse(&joined)
            .map_err(|e| SourceError::Parse(format!("Invalid external API URL {joined}: {e}")))?;

        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Network(format!("Failed to create HTTP client: {e}")))?;

        let rate_limiter = requests_per_second
            .and_then(NonZeroU32::new)
            .map(|rps| RateLimiter::direct(Quota::per_second(rps)));

        Ok(Self {
            http_client,
            endpoint,
            rate_limiter,
        })
    }

    pub fn url_for(&self, id: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("id", id);
        url
    }

    async fn fetch_payload(&self, id: &str) -> Result<Option<LyricPayload>, SourceError> {
        let url = self.url_for(id);
        debug!(track_id = %id, url = %url, "Querying external lyric API");

        let response = self.http_client.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Http {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let body = response.text().await?;
        let payload: LyricPayload = serde_json::from_str(&body)
            .map_err(|e| SourceError::Parse(format!("Failed to parse lyric payload: {e}")))?;

        match payload.code {
            Some(code) if code != 200 => Err(SourceError::Http {
                status: u16::try_from(code).unwrap_or(500),
                message: format!("lyric API reported code {code}"),
            }),
            _ => Ok(Some(payload)),
        }
    }
}

#[async_trait]
impl ExternalSource for ExternalClient {
    async fn admit(&self) {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }
    }

    async fn fetch(&self, id: &str, format_hint: Option<LyricFormat>) -> FetchOutcome {
        match self.fetch_payload(id).await {
            Ok(Some(payload)) => payload.into_outcome(format_hint),
            Ok(None) => FetchOutcome::NotFound {
                format: format_hint,
            },
            Err(error) => FetchOutcome::error(format_hint, error),
        }
    }
}

/// External API payload
///
/// Every member is optional; decoding never fails on a missing field.
#[derive(Debug, Default, Deserialize)]
pub struct LyricPayload {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub lrc: Option<LyricField>,
    #[serde(default)]
    pub yrc: Option<LyricField>,
    #[serde(default)]
    pub tlyric: Option<LyricField>,
    #[serde(default)]
    pub romalrc: Option<LyricField>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LyricField {
    #[serde(default)]
    pub lyric: Option<String>,
}

impl LyricPayload {
    /// Filtered, non-empty text of `format`, if present
    pub fn field(&self, format: LyricFormat) -> Option<String> {
        let field = match format {
            LyricFormat::Yrc => self.yrc.as_ref(),
            LyricFormat::Lrc => self.lrc.as_ref(),
            LyricFormat::Tlyric => self.tlyric.as_ref(),
            LyricFormat::Romalrc => self.romalrc.as_ref(),
            LyricFormat::Ttml | LyricFormat::Eslrc => None,
        }?;

        let filtered = filter_timed_lines(field.lyric.as_deref()?, format);
        (!filtered.trim().is_empty()).then_some(filtered)
    }

    /// Pick the primary lyric and attach side channels
    pub fn into_outcome(self, format_hint: Option<LyricFormat>) -> FetchOutcome {
        let preference: &[LyricFormat] = match format_hint {
            Some(ref hint) => std::slice::from_ref(hint),
            None => &UNHINTED_PREFERENCE,
        };

        let primary = preference
            .iter()
            .find_map(|format| self.field(*format).map(|content| (*format, content)));

        match primary {
            Some((format, content)) => FetchOutcome::Found(LyricHit::external(
                format,
                content,
                self.field(LyricFormat::Tlyric),
                self.field(LyricFormat::Romalrc),
            )),
            None => FetchOutcome::NotFound {
                format: format_hint,
            },
        }
    }
}
