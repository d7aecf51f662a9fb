//! lyrics-resolver - lyric resolution service
//!
//! Loads configuration, wires the repository and external adapters into
//! the resolution engine and serves it over HTTP.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use lyrics_resolver::{build_router, config, AppState, LyricsResolver};

/// Command-line arguments for lyrics-resolver
#[derive(Parser, Debug)]
#[command(name = "lyrics-resolver")]
#[command(about = "Lyric resolution service")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "LYRICS_PORT")]
    port: Option<u16>,

    /// Log level when RUST_LOG is unset (overrides config)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = lyrics_common::config::load_config(args.config.as_deref())?;

    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| toml_config.logging.level.clone());
    lyrics_common::logging::init_tracing(&log_level)?;

    info!("Starting lyrics-resolver v{}", env!("CARGO_PKG_VERSION"));

    // Missing endpoints are fatal here, never per request
    toml_config.validate_endpoints()?;
    let repository = config::build_repository_client(&toml_config)?;
    let external = config::build_external_client(&toml_config)?;

    let settings = config::resolver_settings(&toml_config);
    info!(
        deadline_ms = settings.policy.deadline.as_millis() as u64,
        max_in_flight = settings.policy.max_in_flight,
        probe_strategy = ?settings.probe_strategy,
        "Resolver configured"
    );
    let resolver = Arc::new(LyricsResolver::new(
        Arc::new(repository),
        Arc::new(external),
        settings,
    ));

    let shutdown = CancellationToken::new();
    let (results_sweep, probes_sweep) =
        resolver.spawn_maintenance(config::cleanup_interval(&toml_config), shutdown.clone());

    let app = build_router(AppState::new(resolver));

    let host = args.host.unwrap_or(toml_config.server.host);
    let port = args.port.unwrap_or(toml_config.server.port);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
            server_shutdown.cancel();
        })
        .await?;

    shutdown.cancel();
    let _ = tokio::join!(results_sweep, probes_sweep);
    info!("lyrics-resolver stopped");

    Ok(())
}
