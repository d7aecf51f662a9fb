//! Lyric format registry
//!
//! Enumerates the recognized lyric encodings, validates client-supplied
//! format strings and builds repository candidate lists.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Recognized lyric encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LyricFormat {
    /// Timed text markup (word-level, curated)
    Ttml,
    /// Karaoke-timed lines
    Yrc,
    /// Plain line-timed lyrics
    Lrc,
    /// Enhanced LRC with inline word timings
    Eslrc,
    /// Translation side channel
    Tlyric,
    /// Romanization side channel
    Romalrc,
}

impl LyricFormat {
    pub const ALL: [LyricFormat; 6] = [
        LyricFormat::Ttml,
        LyricFormat::Yrc,
        LyricFormat::Lrc,
        LyricFormat::Eslrc,
        LyricFormat::Tlyric,
        LyricFormat::Romalrc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LyricFormat::Ttml => "ttml",
            LyricFormat::Yrc => "yrc",
            LyricFormat::Lrc => "lrc",
            LyricFormat::Eslrc => "eslrc",
            LyricFormat::Tlyric => "tlyric",
            LyricFormat::Romalrc => "romalrc",
        }
    }

    /// Translation and romanization annotate a primary result, never replace it
    pub fn is_side_channel(&self) -> bool {
        matches!(self, LyricFormat::Tlyric | LyricFormat::Romalrc)
    }

    /// Formats the external API can serve as a primary lyric
    pub fn has_external_equivalent(&self) -> bool {
        matches!(self, LyricFormat::Yrc | LyricFormat::Lrc)
    }
}

impl fmt::Display for LyricFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized format string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown lyric format: {0:?}")]
pub struct UnknownFormat(pub String);

impl FromStr for LyricFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        LyricFormat::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| UnknownFormat(s.to_string()))
    }
}

/// Membership test against the format enumeration; `None` and blank are invalid
pub fn is_valid_format(s: Option<&str>) -> bool {
    match s {
        Some(value) if !value.trim().is_empty() => value.parse::<LyricFormat>().is_ok(),
        _ => false,
    }
}

/// Repository fallback order used when the client supplies none
pub fn default_fallback_order() -> Vec<LyricFormat> {
    vec![LyricFormat::Yrc, LyricFormat::Lrc, LyricFormat::Eslrc]
}

/// Parse a client-supplied comma-separated fallback order
///
/// Order is preserved and duplicates are dropped. `ttml` is removed
/// silently since it always leads the candidate list; unknown entries and
/// side-channel formats are dropped with a warning.
pub fn parse_fallback_order(raw: &str) -> Vec<LyricFormat> {
    let mut order = Vec::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match entry.parse::<LyricFormat>() {
            Ok(LyricFormat::Ttml) => {}
            Ok(format) if format.is_side_channel() => {
                warn!(entry, "Ignoring side-channel format in fallback order");
            }
            Ok(format) => {
                if !order.contains(&format) {
                    order.push(format);
                }
            }
            Err(_) => {
                warn!(entry, "Ignoring invalid format in fallback order");
            }
        }
    }

    order
}

/// Repository candidates in priority order: `ttml` first, then the fallback order
///
/// An empty fallback slice falls back to [`default_fallback_order`].
pub fn repository_candidates(fallback: Option<&[LyricFormat]>) -> Vec<LyricFormat> {
    let rest = match fallback {
        Some(order) if !order.is_empty() => order.to_vec(),
        _ => default_fallback_order(),
    };

    std::iter::once(LyricFormat::Ttml)
        .chain(rest.into_iter().filter(|f| *f != LyricFormat::Ttml))
        .collect()
}
