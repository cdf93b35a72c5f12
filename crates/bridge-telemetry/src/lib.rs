//! # Bridge Telemetry
//!
//! Logging and metrics for the bridge relayer.
//!
//! ## Components
//!
//! - **Logging**: `tracing-subscriber` with an `EnvFilter`, human-readable or
//!   JSON output
//! - **Metrics**: Prometheus counters, gauges and histograms in a global
//!   registry, rendered with [`gather_text`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bridge_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(&TelemetryConfig::from_env())?;
//! bridge_telemetry::metrics::WITHDRAWALS_FORWARDED.inc();
//! println!("{}", bridge_telemetry::gather_text()?);
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CB_SERVICE_NAME` | `canton-bridge-relayer` | Service name in logs |
//! | `CB_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `CB_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |
//! | `CB_LOG_SOURCE` | `false` | File and line in log lines |

#![warn(missing_docs)]

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::{env_filter, init_logging};
pub use metrics::{gather_text, register_metrics, HistogramTimer};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The global subscriber could not be installed.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// Metric registration or encoding failed.
    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize metrics and logging.
///
/// Returns a guard to hold for the lifetime of the application.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Metrics first so early log lines can already be counted
    register_metrics()?;
    init_logging(config)?;

    tracing::info!(service = %config.service_name, "Telemetry initialized");
    Ok(TelemetryGuard {
        service_name: config.service_name.clone(),
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry...");
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
