//! # Reconciler Configuration

use crate::domain::{ReconcileError, ReconcileResult};
use std::env;
use std::time::Duration;

/// Default pause between periodic runs.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(300);

/// Default time budget of a single periodic run.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(120);

/// Reconciliation engine configuration.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Pause between periodic runs.
    pub interval: Duration,
    /// Time budget of a single periodic run.
    pub run_timeout: Duration,
    /// Symbols whose supply and balances are always written, even without
    /// holdings; also the symbols a full rebuild resets.
    pub symbols: Vec<String>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RECONCILE_INTERVAL,
            run_timeout: DEFAULT_RUN_TIMEOUT,
            symbols: Vec::new(),
        }
    }
}

impl ReconcilerConfig {
    /// Read configuration from the environment.
    ///
    /// # Environment Variables
    ///
    /// - `CB_RECONCILE_INTERVAL_SECS`: pause between runs (default: 300)
    /// - `CB_RECONCILE_TIMEOUT_SECS`: per-run budget (default: 120)
    /// - `CB_RECONCILE_SYMBOLS`: comma-separated symbols, falling back to
    ///   `CB_TOKEN_SYMBOL`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secs = |name: &str, default: Duration| {
            env::var(name)
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };
        let symbols = env::var("CB_RECONCILE_SYMBOLS")
            .or_else(|_| env::var("CB_TOKEN_SYMBOL"))
            .map(|v| parse_symbols(&v))
            .unwrap_or_default();

        Self {
            interval: secs("CB_RECONCILE_INTERVAL_SECS", defaults.interval),
            run_timeout: secs("CB_RECONCILE_TIMEOUT_SECS", defaults.run_timeout),
            symbols,
        }
    }

    /// Fail fast on unusable settings.
    pub fn validate(&self) -> ReconcileResult<()> {
        if self.interval.is_zero() {
            return Err(ReconcileError::Config("interval must be positive".into()));
        }
        if self.run_timeout.is_zero() {
            return Err(ReconcileError::Config("run timeout must be positive".into()));
        }
        if self.symbols.iter().any(|s| s.trim().is_empty()) {
            return Err(ReconcileError::Config("empty token symbol".into()));
        }
        Ok(())
    }
}

fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
