//! # nesplay
//!
//! Relay server binary: resolves settings, scans the ROM directory and serves
//! the browser client plus the screen/player WebSocket relay.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use nesplay_server::{NesplayServer, ServerConfig};
use nesplay_settings::{LoggingSettings, NesplaySettings};
use tracing_subscriber::EnvFilter;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Screen/controller relay for browser NES play.
#[derive(Parser, Debug)]
#[command(name = "nesplay", version, about = "Screen/controller relay for browser NES play")]
struct Cli {
    /// Port to listen on (overrides settings).
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Address to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Directory with `index.html`, `public/` and `jsnes/` to serve instead of
    /// the bundled client.
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Settings file (default `~/.nesplay/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,

    /// Directory containing `*.nes` ROM files.
    rom_dir: PathBuf,
}

/// Merge CLI flags over the resolved settings.
fn server_config(cli: &Cli, settings: &NesplaySettings) -> ServerConfig {
    let server = &settings.server;
    ServerConfig {
        host: cli.host.clone().unwrap_or_else(|| server.host.clone()),
        port: cli.port.unwrap_or(server.port),
        max_connections: server.max_connections,
        heartbeat_interval_secs: server.heartbeat_interval_secs,
        heartbeat_timeout_secs: server.heartbeat_timeout_secs,
        max_message_size: server.max_message_size,
        send_queue_capacity: server.send_queue_capacity,
        rom_dir: cli.rom_dir.clone(),
        assets_dir: cli.assets.clone(),
    }
}

fn init_logging(logging: &LoggingSettings, force_json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if force_json || logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings = match &args.settings {
        Some(path) => nesplay_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => nesplay_settings::load_settings().with_context(|| {
            format!(
                "Failed to load settings from {}",
                nesplay_settings::settings_path().display()
            )
        })?,
    };

    init_logging(&settings.logging, args.json_logs);

    let metrics = nesplay_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let config = server_config(&args, &settings);
    let server = NesplayServer::new(config)
        .with_context(|| format!("Failed to open ROM directory {}", args.rom_dir.display()))?
        .with_metrics(metrics);

    for (i, rom) in server.library().roms().iter().enumerate() {
        tracing::info!("game {}: {}", i + 1, rom.path.display());
    }

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server
        .shutdown()
        .graceful_shutdown(vec![handle], Some(SHUTDOWN_TIMEOUT))
        .await;

    tracing::info!("Shutdown complete");
    Ok(())
}
