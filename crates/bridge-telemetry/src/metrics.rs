//! Prometheus metrics for the bridge relayer.
//!
//! All metrics follow the naming convention: `cb_<component>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., withdrawals_forwarded_total)
//! - **Gauge**: Value that can go up or down (e.g., stream_offset)
//! - **Histogram**: Distribution of values (e.g., reconcile_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    Opts, Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // RECONCILIATION METRICS (Subsystem 5)
    // =========================================================================

    /// Reconciliation runs by pass and outcome
    pub static ref RECONCILE_RUNS: IntCounterVec = IntCounterVec::new(
        Opts::new("cb_reconcile_runs_total", "Reconciliation runs"),
        &["pass", "outcome"]  // pass: holdings/events/full, outcome: success/failure
    ).expect("metric creation failed");

    /// Audit events seen by the event-sourced pass
    pub static ref RECONCILE_EVENTS: IntCounterVec = IntCounterVec::new(
        Opts::new("cb_reconcile_events_total", "Audit events seen by reconciliation"),
        &["result"]  // result: processed/already_processed/skipped
    ).expect("metric creation failed");

    /// Holdings skipped by the holdings-based pass
    pub static ref RECONCILE_HOLDINGS_SKIPPED: IntCounter = IntCounter::new(
        "cb_reconcile_holdings_skipped_total",
        "Holdings skipped because their amount did not parse"
    ).expect("metric creation failed");

    /// Reconciliation pass duration
    pub static ref RECONCILE_DURATION: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "cb_reconcile_duration_seconds",
            "Time spent in a reconciliation pass"
        ).buckets(exponential_buckets(0.01, 2.0, 14).unwrap()),
        &["pass"]
    ).expect("metric creation failed");

    // =========================================================================
    // WITHDRAWAL STREAM METRICS (Subsystem 4)
    // =========================================================================

    /// Pending withdrawals forwarded to the releaser
    pub static ref WITHDRAWALS_FORWARDED: IntCounter = IntCounter::new(
        "cb_stream_withdrawals_forwarded_total",
        "Pending withdrawal events forwarded by the stream"
    ).expect("metric creation failed");

    /// Stream reconnect attempts
    pub static ref STREAM_RECONNECTS: IntCounter = IntCounter::new(
        "cb_stream_reconnects_total",
        "Withdrawal stream reconnect attempts"
    ).expect("metric creation failed");

    /// Resume offset of the withdrawal stream
    pub static ref STREAM_OFFSET: IntGauge = IntGauge::new(
        "cb_stream_offset",
        "Last ledger offset fully processed by the withdrawal stream"
    ).expect("metric creation failed");

    // =========================================================================
    // AUTH METRICS (Subsystem 1)
    // =========================================================================

    /// Token fetches that reached the provider
    pub static ref AUTH_TOKEN_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("cb_auth_token_requests_total", "Bearer token requests"),
        &["outcome"]  // outcome: success/failure
    ).expect("metric creation failed");

    /// Cached tokens dropped after an auth rejection
    pub static ref AUTH_INVALIDATIONS: IntCounter = IntCounter::new(
        "cb_auth_invalidations_total",
        "Cached bearer tokens invalidated after the ledger rejected them"
    ).expect("metric creation failed");

    // =========================================================================
    // ERROR METRICS
    // =========================================================================

    /// Subsystem errors by type
    pub static ref SUBSYSTEM_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("cb_subsystem_errors_total", "Errors by subsystem and type"),
        &["subsystem", "error_type"]
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry. Safe to call twice.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Reconciliation
        Box::new(RECONCILE_RUNS.clone()),
        Box::new(RECONCILE_EVENTS.clone()),
        Box::new(RECONCILE_HOLDINGS_SKIPPED.clone()),
        Box::new(RECONCILE_DURATION.clone()),
        // Stream
        Box::new(WITHDRAWALS_FORWARDED.clone()),
        Box::new(STREAM_RECONNECTS.clone()),
        Box::new(STREAM_OFFSET.clone()),
        // Auth
        Box::new(AUTH_TOKEN_REQUESTS.clone()),
        Box::new(AUTH_INVALIDATIONS.clone()),
        // Errors
        Box::new(SUBSYSTEM_ERRORS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Render all metrics in the Prometheus text exposition format.
pub fn gather_text() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
    ($histogram:expr, $labels:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram.with_label_values($labels))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics_twice() {
        register_metrics().unwrap();
        register_metrics().unwrap();
    }

    #[test]
    fn test_counter_increment() {
        WITHDRAWALS_FORWARDED.inc();
        assert!(WITHDRAWALS_FORWARDED.get() >= 1);
    }

    #[test]
    fn test_gather_text_contains_registered_metrics() {
        register_metrics().unwrap();
        RECONCILE_RUNS.with_label_values(&["holdings", "success"]).inc();
        let text = gather_text().unwrap();
        assert!(text.contains("cb_reconcile_runs_total"));
        assert!(text.contains("pass=\"holdings\""));
    }

    #[test]
    fn test_histogram_timer() {
        let before = RECONCILE_DURATION.with_label_values(&["events"]).get_sample_count();
        {
            let _timer = time_histogram!(RECONCILE_DURATION, &["events"]);
        }
        let after = RECONCILE_DURATION.with_label_values(&["events"]).get_sample_count();
        assert_eq!(after, before + 1);
    }
}
