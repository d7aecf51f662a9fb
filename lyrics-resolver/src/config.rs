//! Runtime configuration for lyrics-resolver
//!
//! Turns the shared [`TomlConfig`] into engine settings and adapter
//! instances. A missing or invalid endpoint is a [`ResolveError::Configuration`]
//! and aborts startup.

use crate::error::ResolveError;
use crate::services::{CacheSettings, GovernorPolicy, ProbeStrategy, ResolverSettings};
use crate::sources::{ExternalClient, RepositoryClient};
use lyrics_common::config::TomlConfig;
use std::time::Duration;
use tracing::info;

/// Engine settings from TOML configuration
pub fn resolver_settings(config: &TomlConfig) -> ResolverSettings {
    let resolver = &config.resolver;
    let cache = &config.cache;

    ResolverSettings {
        policy: GovernorPolicy {
            deadline: Duration::from_millis(resolver.deadline_ms),
            repository_timeout: Duration::from_millis(config.repository.timeout_ms),
            external_timeout: Duration::from_millis(config.external.timeout_ms),
            max_retries: resolver.max_retries,
            retry_backoff: Duration::from_millis(resolver.retry_backoff_ms),
            max_in_flight: resolver.max_in_flight,
        },
        cache: CacheSettings {
            ttl: Duration::from_secs(cache.ttl_secs),
            capacity: cache.capacity,
            probe_ttl: Duration::from_secs(cache.probe_ttl_secs),
            probe_capacity: cache.probe_capacity,
        },
        probe_strategy: if resolver.spawn_probes {
            ProbeStrategy::Spawned
        } else {
            ProbeStrategy::Inline
        },
    }
}

/// Cache sweep period
pub fn cleanup_interval(config: &TomlConfig) -> Duration {
    Duration::from_secs(config.cache.cleanup_interval_secs.max(1))
}

/// HTTP-level timeout for an adapter: a little above the governor's
/// per-call timeout so the governor fires first
fn transport_timeout(timeout_ms: u64) -> Duration {
    Duration::from_millis(timeout_ms) + Duration::from_millis(500)
}

/// Build the repository adapter
pub fn build_repository_client(config: &TomlConfig) -> Result<RepositoryClient, ResolveError> {
    let repository = &config.repository;
    let base_url = repository
        .base_url
        .as_deref()
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| ResolveError::Configuration("repository.base_url is not set".to_string()))?;

    let client = RepositoryClient::new(
        base_url,
        &repository.path_template,
        repository.auth_token.as_deref(),
        transport_timeout(repository.timeout_ms),
    )
    .map_err(|e| ResolveError::Configuration(e.to_string()))?;

    info!(base_url, template = %repository.path_template, "Repository source configured");
    Ok(client)
}

/// Build the external API adapter
pub fn build_external_client(config: &TomlConfig) -> Result<ExternalClient, ResolveError> {
    let external = &config.external;
    let base_url = external
        .base_url
        .as_deref()
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| ResolveError::Configuration("external.base_url is not set".to_string()))?;

    let client = ExternalClient::new(
        base_url,
        &external.lyric_path,
        transport_timeout(external.timeout_ms),
        external.requests_per_second,
    )
    .map_err(|e| ResolveError::Configuration(e.to_string()))?;

    info!(
        base_url,
        requests_per_second = ?external.requests_per_second,
        "External source configured"
    );
    Ok(client)
}
