//! # Periodic Reconciliation
//!
//! Background task that runs `reconcile_all` on a fixed interval. The first
//! run starts immediately. Each run has a time budget; a failed or timed-out
//! run is logged and the loop carries on. Stopping never interrupts a run in
//! flight: `stop` waits for it to finish.

use crate::domain::ReconcilerConfig;
use crate::ports::ReconcileApi;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Run counters of the periodic loop.
#[derive(Debug, Default)]
pub struct LoopStats {
    runs: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
}

impl LoopStats {
    /// Runs started.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }

    /// Runs that returned an error or timed out.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::SeqCst)
    }

    /// Runs that exceeded the time budget.
    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::SeqCst)
    }
}

/// Handle on the periodic reconciliation task.
pub struct PeriodicReconciler {
    shutdown_tx: watch::Sender<bool>,
    stats: Arc<LoopStats>,
    task: JoinHandle<()>,
}

impl PeriodicReconciler {
    /// Spawn the loop.
    pub fn spawn(engine: Arc<dyn ReconcileApi>, config: &ReconcilerConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(LoopStats::default());

        info!(
            interval_secs = config.interval.as_secs(),
            timeout_secs = config.run_timeout.as_secs(),
            "[cb-05] Starting periodic reconciliation"
        );
        let task = tokio::spawn(run_loop(
            engine,
            config.interval,
            config.run_timeout,
            stats.clone(),
            shutdown_rx,
        ));

        Self {
            shutdown_tx,
            stats,
            task,
        }
    }

    /// Shared counters.
    pub fn stats(&self) -> Arc<LoopStats> {
        self.stats.clone()
    }

    /// True once the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal shutdown and wait for the in-flight run, if any.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(err) = self.task.await {
            warn!(error = %err, "[cb-05] Reconciliation task failed");
        }
    }
}

async fn run_loop(
    engine: Arc<dyn ReconcileApi>,
    interval: Duration,
    run_timeout: Duration,
    stats: Arc<LoopStats>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown_rx.changed() => break,
        }
        if *shutdown_rx.borrow() {
            break;
        }
        run_once(engine.as_ref(), run_timeout, &stats).await;
    }

    info!(
        runs = stats.runs(),
        failures = stats.failures(),
        "[cb-05] Periodic reconciliation stopped"
    );
}

async fn run_once(engine: &dyn ReconcileApi, run_timeout: Duration, stats: &LoopStats) {
    stats.runs.fetch_add(1, Ordering::SeqCst);
    match tokio::time::timeout(run_timeout, engine.reconcile_all()).await {
        Ok(Ok(report)) => info!(
            holdings = report.holdings_scanned,
            balances = report.balances_written,
            "[cb-05] Periodic reconciliation run complete"
        ),
        Ok(Err(err)) => {
            stats.failures.fetch_add(1, Ordering::SeqCst);
            error!(error = %err, "[cb-05] Periodic reconciliation run failed");
        }
        Err(_) => {
            stats.failures.fetch_add(1, Ordering::SeqCst);
            stats.timeouts.fetch_add(1, Ordering::SeqCst);
            error!(
                timeout_secs = run_timeout.as_secs(),
                "[cb-05] Periodic reconciliation run timed out"
            );
        }
    }
}
