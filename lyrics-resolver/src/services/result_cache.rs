//! Bounded TTL result cache
//!
//! - `get` checks expiry lazily and drops an expired entry on touch
//! - `set` evicts the single oldest insertion when at capacity
//! - `cleanup` sweeps every expired entry; run it from [`ResultCache::spawn_cleanup`]
//!
//! Stored values are never edited in place: the cache changes only by
//! insertion, expiry and eviction.

use crate::types::{LyricHit, SearchResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Values the cache may hold
///
/// Failure outcomes answer `false` and are refused by [`ResultCache::set`],
/// so transient upstream faults self-heal on the next request.
pub trait Cacheable: Clone + Send + Sync + 'static {
    fn is_cacheable(&self) -> bool;
}

impl Cacheable for SearchResult {
    fn is_cacheable(&self) -> bool {
        self.is_found()
    }
}

impl Cacheable for LyricHit {
    fn is_cacheable(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    data: V,
    inserted_at: Instant,
}

/// TTL cache keyed by string
pub struct ResultCache<V> {
    name: &'static str,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    ttl: Duration,
    capacity: usize,
}

impl<V: Cacheable> ResultCache<V> {
    /// `capacity == 0` disables the cache
    pub fn new(name: &'static str, ttl: Duration, capacity: usize) -> Self {
        Self {
            name,
            entries: Mutex::new(HashMap::new()),
            ttl,
            capacity,
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().await;

        let expired = match entries.get(key) {
            None => return None,
            Some(entry) => entry.inserted_at.elapsed() >= self.ttl,
        };

        if expired {
            entries.remove(key);
            debug!(cache = self.name, key, "Cache entry expired");
            return None;
        }

        entries.get(key).map(|entry| entry.data.clone())
    }

    /// Insert `value`; returns whether it was stored
    pub async fn set(&self, key: impl Into<String>, value: V) -> bool {
        if self.capacity == 0 || !value.is_cacheable() {
            return false;
        }

        let key = key.into();
        let mut entries = self.entries.lock().await;

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
                debug!(cache = self.name, evicted = %oldest, "Cache at capacity, evicted oldest entry");
            }
        }

        entries.insert(
            key,
            CacheEntry {
                data: value,
                inserted_at: Instant::now(),
            },
        );
        true
    }

    /// Remove every expired entry; returns how many were removed
    pub async fn cleanup(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// Run [`cleanup`](Self::cleanup) every `interval` until `token` is cancelled
    pub fn spawn_cleanup(
        self: Arc<Self>,
        interval: Duration,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = self.cleanup().await;
                        if removed > 0 {
                            debug!(cache = self.name, removed, "Swept expired cache entries");
                        }
                    }
                }
            }
        })
    }
}
