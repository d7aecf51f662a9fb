//! Configuration loading and environment override tests
//!
//! Tests that touch process environment variables are marked `#[serial]`
//! so they never interleave.

use lyrics_common::config::{
    load_config, load_toml_config, resolve_config_path, TomlConfig, CONFIG_PATH_ENV,
    EXTERNAL_URL_ENV, REPOSITORY_TOKEN_ENV, REPOSITORY_URL_ENV,
};
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn clear_env() {
    env::remove_var(CONFIG_PATH_ENV);
    env::remove_var(REPOSITORY_URL_ENV);
    env::remove_var(REPOSITORY_TOKEN_ENV);
    env::remove_var(EXTERNAL_URL_ENV);
}

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_missing_file_uses_defaults() {
    let config = load_toml_config(&PathBuf::from("/nonexistent/lyrics/config.toml")).unwrap();
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_malformed_file_is_config_error() {
    let file = write_config("[resolver\ndeadline_ms = ");
    let err = load_toml_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("Configuration error"));
}

#[test]
fn test_full_file_round_trip() {
    let file = write_config(
        r#"
        [server]
        host = "0.0.0.0"
        port = 8080

        [repository]
        base_url = "https://raw.example.org/amll/main"
        path_template = "lyrics/{id}/{format}"
        timeout_ms = 2000

        [external]
        base_url = "https://api.example.org"
        requests_per_second = 5

        [resolver]
        deadline_ms = 4000
        spawn_probes = true
        "#,
    );

    let config = load_toml_config(file.path()).unwrap();
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.repository.path_template, "lyrics/{id}/{format}");
    assert_eq!(config.repository.timeout_ms, 2000);
    assert_eq!(config.external.requests_per_second, Some(5));
    assert_eq!(config.external.lyric_path, "/lyric/new");
    assert_eq!(config.resolver.deadline_ms, 4000);
    assert!(config.resolver.spawn_probes);
    assert!(config.validate_endpoints().is_ok());
}

#[test]
#[serial]
fn test_cli_path_beats_env_path() {
    clear_env();
    env::set_var(CONFIG_PATH_ENV, "/from/env.toml");

    let resolved = resolve_config_path(Some(&PathBuf::from("/from/cli.toml")));
    assert_eq!(resolved, Some(PathBuf::from("/from/cli.toml")));

    let resolved = resolve_config_path(None);
    assert_eq!(resolved, Some(PathBuf::from("/from/env.toml")));

    clear_env();
}

#[test]
#[serial]
fn test_env_overrides_file_endpoints() {
    clear_env();
    let file = write_config(
        r#"
        [repository]
        base_url = "https://file.example.org"

        [external]
        base_url = "https://file-api.example.org"
        "#,
    );

    env::set_var(REPOSITORY_URL_ENV, "https://env.example.org");
    env::set_var(REPOSITORY_TOKEN_ENV, "secret-token");

    let config = load_config(Some(file.path())).unwrap();
    assert_eq!(
        config.repository.base_url.as_deref(),
        Some("https://env.example.org")
    );
    assert_eq!(config.repository.auth_token.as_deref(), Some("secret-token"));
    assert_eq!(
        config.external.base_url.as_deref(),
        Some("https://file-api.example.org")
    );

    clear_env();
}

#[test]
#[serial]
fn test_blank_env_does_not_override() {
    clear_env();
    let file = write_config(
        r#"
        [external]
        base_url = "https://file-api.example.org"
        "#,
    );
    env::set_var(EXTERNAL_URL_ENV, "  ");

    let config = load_config(Some(file.path())).unwrap();
    assert_eq!(
        config.external.base_url.as_deref(),
        Some("https://file-api.example.org")
    );
    assert!(config.validate_endpoints().is_err());

    clear_env();
}
