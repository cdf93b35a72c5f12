//! # Canton Bridge Relayer
//!
//! Entry point of the relayer process. Configuration comes from `CB_*`
//! environment variables; see [`RelayerConfig::from_env`].
//!
//! The balance cache is held in memory. A relational store implements the
//! same `BalanceStore` port outside this workspace.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use bridge_telemetry::init_telemetry;
use relayer_runtime::container::{RelayerConfig, SubsystemContainer};
use relayer_runtime::RelayerRuntime;
use shared_types::InMemoryBalanceStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = RelayerConfig::from_env();

    // Initialize logging and metrics
    let _telemetry = init_telemetry(&config.telemetry).context("Failed to initialize telemetry")?;

    config.validate().context("Invalid configuration")?;

    let store = Arc::new(InMemoryBalanceStore::new());
    let container =
        SubsystemContainer::connect(config, store).context("Failed to initialize subsystems")?;

    // Create and start the relayer
    let runtime = RelayerRuntime::new(container);
    let relayer = runtime.start().await?;

    // Keep the relayer running
    info!("Relayer is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    // Graceful shutdown
    let report = relayer.shutdown().await;
    info!(
        resume_offset = report.resume_offset,
        withdrawals = report.withdrawals_handled,
        reconcile_runs = report.reconcile_runs,
        "Relayer stopped; set CB_STREAM_FROM_OFFSET to resume"
    );

    Ok(())
}
