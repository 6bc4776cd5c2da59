//! # Notification Relay
//!
//! Entry point: load configuration, connect, run until Ctrl+C.

use anyhow::{Context, Result};
use relay_runtime::{config::redact_url, init_tracing, RelayConfig, RelayRuntime};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = RelayConfig::from_env().context("Invalid configuration")?;

    // Initialize logging
    init_tracing(&config)?;
    info!(broker = %redact_url(&config.redis_url), "Configuration loaded");

    // Create and start the relay runtime
    let mut runtime = RelayRuntime::connect(config).await?;
    runtime.start();

    // Keep the relay running
    info!("Relay is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    // Graceful shutdown
    runtime.shutdown().await;

    Ok(())
}
