//! Remote Gateway Bridge
//!
//! Main entry point. Loads the bridge configuration, discovers the
//! configured devices and serves the HTTP API until interrupted.
//!
//! The config directory is taken from the first argument, then
//! `GATEWAY_CONFIG_DIR`, then the working directory.

use anyhow::{Context, Result};
use gw_api::AppState;
use gw_config::BridgeConfig;
use gw_platform::{LocalHost, Platform};
use gw_position_feed::PositionFeed;
use gw_trigger::{HttpTriggerPublisher, DEFAULT_TIMEOUT};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_DIR_ENV: &str = "GATEWAY_CONFIG_DIR";

fn config_dir() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_DIR_ENV).ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down...");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("Starting Remote Gateway Bridge v{}", env!("CARGO_PKG_VERSION"));

    let config_dir = config_dir();
    let config = BridgeConfig::load(&config_dir)
        .with_context(|| format!("loading configuration from {}", config_dir.display()))?;
    info!(
        "Loaded configuration '{}' with {} device(s)",
        config.name,
        config.devices.len()
    );

    let publisher = Arc::new(
        HttpTriggerPublisher::new(DEFAULT_TIMEOUT).context("building HTTP client")?,
    );
    let feed = Arc::new(PositionFeed::new());
    let host = Arc::new(LocalHost::new());
    let platform = Arc::new(Platform::from_config(
        &config,
        publisher,
        feed.clone(),
        host,
    ));

    let summary = platform.discover_devices()?;
    info!(
        "Discovered devices: {} added, {} restored, {} removed, {} skipped",
        summary.added, summary.restored, summary.removed, summary.skipped
    );

    let state = AppState {
        platform: platform.clone(),
        feed,
    };
    gw_api::start_server(state, &config.api.bind_address(), shutdown_signal())
        .await
        .with_context(|| format!("serving API on {}", config.api.bind_address()))?;

    platform.stop_forwarders();
    info!("Remote Gateway Bridge stopped");

    Ok(())
}
