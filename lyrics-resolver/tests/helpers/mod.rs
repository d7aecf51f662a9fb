//! Scriptable mock sources for resolver integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use lyrics_resolver::error::SourceError;
use lyrics_resolver::services::{CacheSettings, GovernorPolicy, ProbeStrategy, ResolverSettings};
use lyrics_resolver::sources::{ExternalSource, RepositorySource};
use lyrics_resolver::types::{FetchOutcome, LyricHit};
use lyrics_resolver::{LyricFormat, LyricsResolver};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted answer of a mock source
#[derive(Debug, Clone)]
pub enum Reply {
    Found(String),
    NotFound,
    Http(u16),
    Network,
    /// Answer after a delay
    Slow(Duration, Box<Reply>),
}

impl Reply {
    pub fn found(content: &str) -> Self {
        Reply::Found(content.to_string())
    }

    pub fn slow(delay_ms: u64, reply: Reply) -> Self {
        Reply::Slow(Duration::from_millis(delay_ms), Box::new(reply))
    }

    /// Never answers within any sane deadline
    pub fn hang() -> Self {
        Reply::slow(3_600_000, Reply::NotFound)
    }
}

/// Mock repository keyed by format; unscripted formats are not found
#[derive(Default)]
pub struct MockRepository {
    replies: Mutex<HashMap<LyricFormat, Reply>>,
    calls: AtomicUsize,
    calls_by_format: Mutex<HashMap<LyricFormat, usize>>,
}

impl MockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, format: LyricFormat, reply: Reply) -> Self {
        self.set(format, reply);
        self
    }

    pub fn set(&self, format: LyricFormat, reply: Reply) {
        self.replies.lock().unwrap().insert(format, reply);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, format: LyricFormat) -> usize {
        self.calls_by_format
            .lock()
            .unwrap()
            .get(&format)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl RepositorySource for MockRepository {
    async fn fetch(&self, _id: &str, format: LyricFormat) -> FetchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .calls_by_format
            .lock()
            .unwrap()
            .entry(format)
            .or_insert(0) += 1;

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(&format)
            .cloned()
            .unwrap_or(Reply::NotFound);

        play(reply, Some(format), |content| {
            LyricHit::repository(format, content)
        })
        .await
    }
}

/// Mock external API with one scripted answer
pub struct MockExternal {
    reply: Mutex<(LyricFormat, Reply)>,
    translation: Option<String>,
    romaji: Option<String>,
    admission_delay: Duration,
    calls: AtomicUsize,
    hints: Mutex<Vec<Option<LyricFormat>>>,
}

impl MockExternal {
    pub fn not_found() -> Self {
        Self::new(LyricFormat::Lrc, Reply::NotFound)
    }

    pub fn new(format: LyricFormat, reply: Reply) -> Self {
        Self {
            reply: Mutex::new((format, reply)),
            translation: None,
            romaji: None,
            admission_delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            hints: Mutex::new(Vec::new()),
        }
    }

    pub fn with_side_channels(mut self, translation: &str, romaji: &str) -> Self {
        self.translation = Some(translation.to_string());
        self.romaji = Some(romaji.to_string());
        self
    }

    /// Quota wait before every attempt
    pub fn with_admission_delay(mut self, delay_ms: u64) -> Self {
        self.admission_delay = Duration::from_millis(delay_ms);
        self
    }

    pub fn set(&self, format: LyricFormat, reply: Reply) {
        *self.reply.lock().unwrap() = (format, reply);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn hints(&self) -> Vec<Option<LyricFormat>> {
        self.hints.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExternalSource for MockExternal {
    async fn admit(&self) {
        if !self.admission_delay.is_zero() {
            tokio::time::sleep(self.admission_delay).await;
        }
    }

    async fn fetch(&self, _id: &str, format_hint: Option<LyricFormat>) -> FetchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.hints.lock().unwrap().push(format_hint);

        let (format, reply) = self.reply.lock().unwrap().clone();
        if format_hint.is_some_and(|hint| hint != format) {
            return FetchOutcome::NotFound {
                format: format_hint,
            };
        }

        let translation = self.translation.clone();
        let romaji = self.romaji.clone();
        play(reply, format_hint, move |content| {
            LyricHit::external(format, content, translation, romaji)
        })
        .await
    }
}

async fn play(
    reply: Reply,
    format: Option<LyricFormat>,
    hit: impl FnOnce(String) -> LyricHit,
) -> FetchOutcome {
    let mut reply = reply;
    while let Reply::Slow(delay, inner) = reply {
        tokio::time::sleep(delay).await;
        reply = *inner;
    }

    match reply {
        Reply::Found(content) => FetchOutcome::Found(hit(content)),
        Reply::NotFound => FetchOutcome::NotFound { format },
        Reply::Http(status) => FetchOutcome::error(
            format,
            SourceError::Http {
                status,
                message: "scripted failure".to_string(),
            },
        ),
        Reply::Network => {
            FetchOutcome::error(format, SourceError::Network("connection reset".to_string()))
        }
        Reply::Slow(..) => unreachable!("slow replies are unwrapped above"),
    }
}

/// Settings with the default limits and a fresh cache
pub fn test_settings() -> ResolverSettings {
    ResolverSettings {
        policy: GovernorPolicy::default(),
        cache: CacheSettings::default(),
        probe_strategy: ProbeStrategy::Inline,
    }
}

pub fn resolver(
    repository: &Arc<MockRepository>,
    external: &Arc<MockExternal>,
    settings: ResolverSettings,
) -> LyricsResolver {
    LyricsResolver::new(
        Arc::clone(repository) as Arc<dyn RepositorySource>,
        Arc::clone(external) as Arc<dyn ExternalSource>,
        settings,
    )
}
