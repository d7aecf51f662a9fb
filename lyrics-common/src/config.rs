//! Configuration loading for the lyrics resolver
//!
//! Resolution order for the config file path:
//! 1. Command-line argument (highest priority)
//! 2. `LYRICS_CONFIG` environment variable
//! 3. `<user config dir>/lyrics-resolver/config.toml`, if present
//! 4. No file: compiled defaults
//!
//! Endpoint URLs and the repository token may additionally be overridden
//! from the environment after the file is read.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "LYRICS_CONFIG";
/// Environment override for `[repository] base_url`
pub const REPOSITORY_URL_ENV: &str = "LYRICS_REPOSITORY_URL";
/// Environment override for `[repository] auth_token`
pub const REPOSITORY_TOKEN_ENV: &str = "LYRICS_REPOSITORY_TOKEN";
/// Environment override for `[external] base_url`
pub const EXTERNAL_URL_ENV: &str = "LYRICS_EXTERNAL_API_URL";

/// Top-level TOML configuration
///
/// Every section and field is optional in the file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub repository: RepositoryConfig,
    pub external: ExternalConfig,
    pub resolver: ResolverConfig,
    pub cache: CacheConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5730,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level for the resolver crates when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Lyric content repository (raw file host)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Base URL of the raw content host (required)
    pub base_url: Option<String>,
    /// Path below `base_url`, with `{id}` and `{format}` placeholders
    pub path_template: String,
    /// Optional bearer token sent with every probe
    pub auth_token: Option<String>,
    /// Per-probe timeout
    pub timeout_ms: u64,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            path_template: "{format}/{id}.{format}".to_string(),
            auth_token: None,
            timeout_ms: 3000,
        }
    }
}

/// Third-party lyric API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalConfig {
    /// Base URL of the lyric API (required)
    pub base_url: Option<String>,
    /// Path of the lyric endpoint; the track id is sent as `?id=`
    pub lyric_path: String,
    /// Per-probe timeout
    pub timeout_ms: u64,
    /// Optional client-side request quota
    pub requests_per_second: Option<u32>,
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            lyric_path: "/lyric/new".to_string(),
            timeout_ms: 5000,
            requests_per_second: None,
        }
    }
}

/// Resolution engine limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Global per-request deadline
    pub deadline_ms: u64,
    /// Process-wide cap on in-flight outbound calls
    pub max_in_flight: usize,
    /// Retries per call on transient failure
    pub max_retries: u32,
    /// Linear backoff step between retries
    pub retry_backoff_ms: u64,
    /// Run repository probes on tokio worker tasks
    pub spawn_probes: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            deadline_ms: 6000,
            max_in_flight: 16,
            max_retries: 1,
            retry_backoff_ms: 250,
            spawn_probes: false,
        }
    }
}

/// Result cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub capacity: usize,
    /// TTL of individual repository format hits
    pub probe_ttl_secs: u64,
    pub probe_capacity: usize,
    /// Period of the background expiry sweep
    pub cleanup_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            capacity: 1000,
            probe_ttl_secs: 600,
            probe_capacity: 4000,
            cleanup_interval_secs: 60,
        }
    }
}

impl TomlConfig {
    /// Apply environment variable overrides on top of file values
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = non_empty_env(REPOSITORY_URL_ENV) {
            info!("Repository URL overridden by {}", REPOSITORY_URL_ENV);
            self.repository.base_url = Some(url);
        }
        if let Some(token) = non_empty_env(REPOSITORY_TOKEN_ENV) {
            self.repository.auth_token = Some(token);
        }
        if let Some(url) = non_empty_env(EXTERNAL_URL_ENV) {
            info!("External API URL overridden by {}", EXTERNAL_URL_ENV);
            self.external.base_url = Some(url);
        }
    }

    /// Ensure both upstream endpoints are configured
    ///
    /// A missing endpoint is fatal at startup, never per request.
    pub fn validate_endpoints(&self) -> Result<()> {
        let mut missing = Vec::new();
        if !is_set(&self.repository.base_url) {
            missing.push(format!("repository.base_url ({})", REPOSITORY_URL_ENV));
        }
        if !is_set(&self.external.base_url) {
            missing.push(format!("external.base_url ({})", EXTERNAL_URL_ENV));
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "Required endpoint not configured: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Resolve the config file path
///
/// Returns `None` when no candidate applies; callers then run on defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Some(path) = non_empty_env(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }

    // Priority 3: Per-user config file
    default_config_path().filter(|path| path.exists())
}

/// Platform config location, e.g. `~/.config/lyrics-resolver/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lyrics-resolver").join("config.toml"))
}

/// Load TOML configuration from `path`
///
/// A missing file is not an error: a warning is logged and defaults are
/// returned. Unreadable or malformed files are configuration errors.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Resolve, load and finalize configuration for startup
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    let mut config = match resolve_config_path(cli_arg) {
        Some(path) => load_toml_config(&path)?,
        None => {
            info!("No config file found, using defaults");
            TomlConfig::default()
        }
    };
    config.apply_env_overrides();
    Ok(config)
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}
