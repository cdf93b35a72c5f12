//! Reconciliation decorator recording `cb_reconcile_*` metrics.

use async_trait::async_trait;
use bridge_telemetry::metrics::{
    RECONCILE_DURATION, RECONCILE_EVENTS, RECONCILE_HOLDINGS_SKIPPED, RECONCILE_RUNS,
    SUBSYSTEM_ERRORS,
};
use bridge_telemetry::time_histogram;
use cb_05_reconciliation::{
    EventsReport, FullReconcileReport, HoldingsReport, ReconcileApi, ReconcileError,
    ReconcileResult,
};
use std::sync::Arc;

/// Wraps a [`ReconcileApi`] and records run outcomes, durations and
/// per-event results.
pub struct MeteredReconciler {
    inner: Arc<dyn ReconcileApi>,
}

impl MeteredReconciler {
    /// Decorate `inner`.
    pub fn new(inner: Arc<dyn ReconcileApi>) -> Self {
        Self { inner }
    }
}

fn error_type(err: &ReconcileError) -> &'static str {
    match err {
        ReconcileError::Token(_) => "token",
        ReconcileError::Store(_) => "store",
        ReconcileError::Timeout(_) => "timeout",
        ReconcileError::Config(_) => "config",
    }
}

fn record_outcome<T>(pass: &str, result: &ReconcileResult<T>) {
    match result {
        Ok(_) => RECONCILE_RUNS.with_label_values(&[pass, "success"]).inc(),
        Err(err) => {
            RECONCILE_RUNS.with_label_values(&[pass, "failure"]).inc();
            SUBSYSTEM_ERRORS
                .with_label_values(&["cb-05", error_type(err)])
                .inc();
        }
    }
}

fn record_holdings(report: &HoldingsReport) {
    RECONCILE_HOLDINGS_SKIPPED.inc_by(report.holdings_skipped as u64);
}

fn record_events(report: &EventsReport) {
    RECONCILE_EVENTS
        .with_label_values(&["processed"])
        .inc_by(report.processed as u64);
    RECONCILE_EVENTS
        .with_label_values(&["already_processed"])
        .inc_by(report.already_processed as u64);
    RECONCILE_EVENTS
        .with_label_values(&["skipped"])
        .inc_by(report.skipped as u64);
}

#[async_trait]
impl ReconcileApi for MeteredReconciler {
    async fn reconcile_all(&self) -> ReconcileResult<HoldingsReport> {
        let _timer = time_histogram!(RECONCILE_DURATION, &["holdings"]);
        let result = self.inner.reconcile_all().await;
        record_outcome("holdings", &result);
        if let Ok(report) = &result {
            record_holdings(report);
        }
        result
    }

    async fn reconcile_user_balances_from_holdings(&self) -> ReconcileResult<HoldingsReport> {
        let _timer = time_histogram!(RECONCILE_DURATION, &["balances"]);
        let result = self.inner.reconcile_user_balances_from_holdings().await;
        record_outcome("balances", &result);
        if let Ok(report) = &result {
            record_holdings(report);
        }
        result
    }

    async fn reconcile_from_bridge_events(&self) -> ReconcileResult<EventsReport> {
        let _timer = time_histogram!(RECONCILE_DURATION, &["events"]);
        let result = self.inner.reconcile_from_bridge_events().await;
        record_outcome("events", &result);
        if let Ok(report) = &result {
            record_events(report);
        }
        result
    }

    async fn full_balance_reconciliation(&self) -> ReconcileResult<FullReconcileReport> {
        let _timer = time_histogram!(RECONCILE_DURATION, &["full"]);
        let result = self.inner.full_balance_reconciliation().await;
        record_outcome("full", &result);
        if let Ok(report) = &result {
            record_events(&report.events);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::StoreError;

    struct Fixed;

    #[async_trait]
    impl ReconcileApi for Fixed {
        async fn reconcile_all(&self) -> ReconcileResult<HoldingsReport> {
            Ok(HoldingsReport {
                holdings_scanned: 3,
                holdings_skipped: 2,
                ..Default::default()
            })
        }

        async fn reconcile_user_balances_from_holdings(&self) -> ReconcileResult<HoldingsReport> {
            Err(StoreError::DatabaseError("connection refused".into()).into())
        }

        async fn reconcile_from_bridge_events(&self) -> ReconcileResult<EventsReport> {
            Ok(EventsReport {
                processed: 4,
                skipped: 1,
                ..Default::default()
            })
        }

        async fn full_balance_reconciliation(&self) -> ReconcileResult<FullReconcileReport> {
            Err(ReconcileError::Config("no symbols".into()))
        }
    }

    #[tokio::test]
    async fn test_success_records_run_and_skipped_holdings() {
        let metered = MeteredReconciler::new(Arc::new(Fixed));
        let runs = RECONCILE_RUNS.with_label_values(&["holdings", "success"]).get();
        let skipped = RECONCILE_HOLDINGS_SKIPPED.get();
        let samples = RECONCILE_DURATION
            .with_label_values(&["holdings"])
            .get_sample_count();

        let report = metered.reconcile_all().await.unwrap();
        assert_eq!(report.holdings_scanned, 3);
        assert!(RECONCILE_RUNS.with_label_values(&["holdings", "success"]).get() > runs);
        assert!(RECONCILE_HOLDINGS_SKIPPED.get() >= skipped + 2);
        assert!(
            RECONCILE_DURATION
                .with_label_values(&["holdings"])
                .get_sample_count()
                > samples
        );
    }

    #[tokio::test]
    async fn test_failure_records_error_type() {
        let metered = MeteredReconciler::new(Arc::new(Fixed));
        let errors = SUBSYSTEM_ERRORS.with_label_values(&["cb-05", "store"]).get();

        let err = metered
            .reconcile_user_balances_from_holdings()
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Store(_)));
        assert!(SUBSYSTEM_ERRORS.with_label_values(&["cb-05", "store"]).get() > errors);
        assert!(RECONCILE_RUNS.with_label_values(&["balances", "failure"]).get() >= 1);
    }

    #[tokio::test]
    async fn test_event_results_counted() {
        let metered = MeteredReconciler::new(Arc::new(Fixed));
        let processed = RECONCILE_EVENTS.with_label_values(&["processed"]).get();

        metered.reconcile_from_bridge_events().await.unwrap();
        assert!(RECONCILE_EVENTS.with_label_values(&["processed"]).get() >= processed + 4);
        tokio_test::assert_err!(metered.full_balance_reconciliation().await);
    }

    #[test]
    fn test_error_type_labels() {
        assert_eq!(error_type(&ReconcileError::Config("x".into())), "config");
        assert_eq!(
            error_type(&ReconcileError::Timeout(std::time::Duration::from_secs(1))),
            "timeout"
        );
    }
}
