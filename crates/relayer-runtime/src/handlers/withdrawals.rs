//! # Withdrawal Handler
//!
//! Consumes pending withdrawals and hands them to the EVM releaser. The
//! releaser lives outside this process; the handler logs each withdrawal
//! once, keyed by contract id, so a stream resumed from an earlier offset
//! or a catch-up listing does not announce the same withdrawal twice.

use std::collections::HashSet;
use std::time::Duration;

use bridge_telemetry::metrics::{STREAM_OFFSET, STREAM_RECONNECTS, WITHDRAWALS_FORWARDED};
use cb_04_bridge::{StreamProgress, WithdrawalEvent, WithdrawalStream};
use shared_types::{ContractId, Offset};
use tokio::sync::watch;
use tracing::{debug, info, warn};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Deduplicating consumer of pending withdrawals.
#[derive(Debug, Default)]
pub struct WithdrawalHandler {
    seen: HashSet<ContractId>,
    reported_reconnects: u64,
}

impl WithdrawalHandler {
    /// Empty handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Withdrawals handed over so far.
    pub fn handled(&self) -> usize {
        self.seen.len()
    }

    /// Hand over `event` unless it is settled or was already handed over.
    /// Returns true when the event was new.
    pub fn handle(&mut self, event: &WithdrawalEvent) -> bool {
        if !event.is_pending() {
            debug!(
                contract_id = %event.contract_id,
                status = %event.status,
                "[cb-04] Skipping settled withdrawal"
            );
            return false;
        }
        if !self.seen.insert(event.contract_id.clone()) {
            debug!(contract_id = %event.contract_id, "[cb-04] Withdrawal already handed over");
            return false;
        }

        info!(
            contract_id = %event.contract_id,
            user = %event.user_party,
            destination = %event.evm_destination,
            amount = %event.amount,
            offset = event.offset,
            "[cb-04] Pending withdrawal ready for release"
        );
        WITHDRAWALS_FORWARDED.inc();
        true
    }

    /// Mirror stream progress into the gauges.
    fn record_progress(&mut self, progress: &StreamProgress) {
        let reconnects = progress.reconnects();
        if reconnects > self.reported_reconnects {
            STREAM_RECONNECTS.inc_by(reconnects - self.reported_reconnects);
            self.reported_reconnects = reconnects;
        }
        STREAM_OFFSET.set(progress.last_offset());
    }

    /// Drain `stream` until shutdown or until the ledger closes it.
    /// Returns the offset a restart should resume after and the number of
    /// withdrawals handed over.
    pub async fn run(
        mut self,
        mut stream: WithdrawalStream,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> (Offset, usize) {
        let progress = stream.progress();
        let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);

        loop {
            tokio::select! {
                event = stream.recv() => match event {
                    Some(event) => {
                        self.handle(&event);
                        self.record_progress(&progress);
                    }
                    None => {
                        warn!("[cb-04] Withdrawal stream ended; restart resumes from the reported offset");
                        break;
                    }
                },
                _ = ticker.tick() => self.record_progress(&progress),
                _ = shutdown_rx.changed() => {
                    info!("[cb-04] Shutdown signal received");
                    break;
                }
            }
        }

        let offset = stream.stop().await;
        self.record_progress(&progress);
        info!(
            offset,
            handled = self.handled(),
            "[cb-04] Withdrawal handler stopped"
        );
        (offset, self.handled())
    }
}
