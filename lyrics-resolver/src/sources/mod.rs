//! Lyric source adapters
//!
//! The engine depends only on the two traits below. Implementations must
//! be safe to call concurrently and must report every abnormal answer as
//! [`FetchOutcome::Error`]; a confirmed absence is [`FetchOutcome::NotFound`].
//!
//! # Adapters
//! 1. **repository_client** - raw content host, one file per track and format
//! 2. **external_client** - third-party lyric API, one JSON payload per track

pub mod external_client;
pub mod repository_client;

pub use external_client::ExternalClient;
pub use repository_client::RepositoryClient;

use crate::formats::LyricFormat;
use crate::types::FetchOutcome;
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

/// Curated content repository, probed one format at a time
#[async_trait]
pub trait RepositorySource: Send + Sync {
    /// Fetch `format` lyrics for `id`
    async fn fetch(&self, id: &str, format: LyricFormat) -> FetchOutcome;
}

/// Third-party lyric API
///
/// Without a hint the adapter picks yrc before lrc itself; the engine
/// treats that as one atomic probe.
#[async_trait]
pub trait ExternalSource: Send + Sync {
    /// Wait until the upstream quota admits one more request
    ///
    /// Awaited before every `fetch` attempt, outside the outbound permit
    /// pool and the per-call timeout.
    async fn admit(&self) {}

    async fn fetch(&self, id: &str, format_hint: Option<LyricFormat>) -> FetchOutcome;
}

/// `[start,duration]` karaoke line tag
static YRC_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[\d+,\d+\]").expect("valid yrc timestamp pattern"));

/// `[mm:ss]`, `[mm:ss.xx]` or `[mm:ss:xx]` line tag
static LRC_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[\d{1,3}:\d{1,2}(?:[.:]\d{1,3})?\]").expect("valid lrc timestamp pattern")
});

/// Keep only lines that start with a timestamp tag for `format`
///
/// Credits blocks and metadata lines are dropped. Formats without a line
/// timestamp convention (ttml) are returned unchanged.
pub fn filter_timed_lines(content: &str, format: LyricFormat) -> String {
    let pattern = match format {
        LyricFormat::Yrc => &*YRC_LINE,
        LyricFormat::Lrc | LyricFormat::Eslrc | LyricFormat::Tlyric | LyricFormat::Romalrc => {
            &*LRC_LINE
        }
        LyricFormat::Ttml => return content.to_string(),
    };

    content
        .lines()
        .map(str::trim_end)
        .filter(|line| pattern.is_match(line.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_lrc_drops_metadata() {
        let raw = "[ar:Someone]\n[by:uploader]\n[00:01.50]first line\n\
                   {\"t\":0,\"c\":[{\"tx\":\"credits\"}]}\n[00:04.20]second line\n";
        assert_eq!(
            filter_timed_lines(raw, LyricFormat::Lrc),
            "[00:01.50]first line\n[00:04.20]second line"
        );
    }

    #[test]
    fn test_filter_yrc_keeps_karaoke_lines() {
        let raw = "{\"t\":0,\"c\":[{\"tx\":\"作词: \"}]}\n[1200,3400](1200,500,0)Hel(1700,400,0)lo\n";
        assert_eq!(
            filter_timed_lines(raw, LyricFormat::Yrc),
            "[1200,3400](1200,500,0)Hel(1700,400,0)lo"
        );
    }

    #[test]
    fn test_filter_all_metadata_is_empty() {
        assert!(filter_timed_lines("[ti:Title]\n[ar:Artist]", LyricFormat::Lrc).is_empty());
    }

    #[test]
    fn test_ttml_passthrough() {
        let raw = "<tt xmlns=\"http://www.w3.org/ns/ttml\"></tt>";
        assert_eq!(filter_timed_lines(raw, LyricFormat::Ttml), raw);
    }
}
