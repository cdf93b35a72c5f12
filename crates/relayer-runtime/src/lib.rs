//! # Bridge Relayer Runtime
//!
//! Wires the bridge subsystems together and runs the relayer's background
//! work.
//!
//! ## Modular Structure
//!
//! - `container/` - Configuration and subsystem wiring
//! - `adapters/` - Metric-recording decorators over subsystem ports
//! - `handlers/` - Consumers of the withdrawal stream
//!
//! ## Startup Sequence
//!
//! 1. Load and validate configuration (environment)
//! 2. Initialize subsystems in dependency order (cb-01 → cb-05)
//! 3. Check the bridge configuration contract is on the ledger
//! 4. Optionally rebuild the balance cache from the audit trail
//! 5. Catch up on withdrawals already pending
//! 6. Start the withdrawal stream and the periodic reconciler
//!
//! ## Background Tasks
//!
//! ```text
//! PeriodicReconciler ──reconcile_all──→ ledger holdings ──→ BalanceStore
//! WithdrawalStream ──Pending──→ WithdrawalHandler ──→ EVM releaser (log)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod container;
pub mod handlers;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use cb_04_bridge::BridgeApi;
use cb_05_reconciliation::{LoopStats, PeriodicReconciler, ReconcileApi};
use shared_types::Offset;

use crate::adapters::MeteredReconciler;
use crate::container::SubsystemContainer;
use crate::handlers::WithdrawalHandler;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Outcome of a graceful shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Offset the withdrawal stream should resume after on restart.
    pub resume_offset: Offset,
    /// Pending withdrawals handed over, catch-up included.
    pub withdrawals_handled: usize,
    /// Periodic reconciliation runs started.
    pub reconcile_runs: u64,
}

/// The relayer runtime orchestrating all subsystems.
pub struct RelayerRuntime {
    container: Arc<SubsystemContainer>,
}

impl RelayerRuntime {
    /// Runtime over an initialized container.
    pub fn new(container: SubsystemContainer) -> Self {
        Self {
            container: Arc::new(container),
        }
    }

    /// Subsystem container.
    pub fn container(&self) -> Arc<SubsystemContainer> {
        Arc::clone(&self.container)
    }

    /// Start the background tasks.
    pub async fn start(&self) -> Result<RunningRelayer> {
        let config = &self.container.config;
        info!("===========================================");
        info!("  Canton Bridge Relayer v{}", VERSION);
        info!("  Relayer: {}", config.bridge.operator_party);
        info!("  Symbol:  {}", config.bridge.symbol);
        info!("===========================================");

        // Step 1: the bridge must be configured on the ledger
        let bridge_config = self
            .container
            .bridge
            .get_bridge_config()
            .await
            .context("Bridge configuration contract not found")?;
        info!(
            contract_id = %bridge_config.contract_id,
            "[cb-04] Bridge configuration found"
        );

        let reconciler: Arc<dyn ReconcileApi> =
            Arc::new(MeteredReconciler::new(self.container.reconciler.clone()));

        // Step 2: optional rebuild from the audit trail
        if config.full_reconcile_on_start {
            let report = reconciler
                .full_balance_reconciliation()
                .await
                .context("Full balance reconciliation failed")?;
            info!(
                symbols = ?report.symbols_reset,
                events = report.events.processed,
                "[cb-05] Balance cache rebuilt"
            );
        }

        // Step 3: catch up on withdrawals created before this process
        let mut handler = WithdrawalHandler::new();
        let existing = self
            .container
            .bridge
            .list_withdrawal_events()
            .await
            .context("Failed to list withdrawal events")?;
        for event in &existing {
            handler.handle(event);
        }
        info!(
            pending = handler.handled(),
            total = existing.len(),
            "[cb-04] Withdrawal catch-up complete"
        );

        // Step 4: stream new withdrawals
        let stream_start = match config.stream_from_offset {
            Some(offset) => offset,
            None => self
                .container
                .session
                .get_ledger_end()
                .await
                .context("Failed to read ledger end")?,
        };
        let stream = self.container.bridge.stream_withdrawal_events(stream_start);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handler_task = tokio::spawn(handler.run(stream, shutdown_rx));

        // Step 5: periodic reconciliation
        let periodic = PeriodicReconciler::spawn(reconciler, &config.reconciler);

        info!(stream_start, "Relayer running");
        Ok(RunningRelayer {
            shutdown_tx,
            handler_task,
            periodic,
            stream_start,
        })
    }
}

/// Handle on a started relayer.
pub struct RunningRelayer {
    shutdown_tx: watch::Sender<bool>,
    handler_task: JoinHandle<(Offset, usize)>,
    periodic: PeriodicReconciler,
    stream_start: Offset,
}

impl RunningRelayer {
    /// Offset the withdrawal stream started after.
    pub fn stream_start(&self) -> Offset {
        self.stream_start
    }

    /// Counters of the periodic reconciler.
    pub fn reconcile_stats(&self) -> Arc<LoopStats> {
        self.periodic.stats()
    }

    /// Shutdown gracefully.
    ///
    /// ## Shutdown Sequence
    ///
    /// 1. Signal the withdrawal handler and wait for the stream to close
    /// 2. Stop the periodic reconciler, letting an in-flight run finish
    pub async fn shutdown(self) -> ShutdownReport {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.shutdown_tx.send(true) {
            warn!("Withdrawal handler already gone: {}", e);
        }
        let (resume_offset, withdrawals_handled) = match self.handler_task.await {
            Ok(summary) => summary,
            Err(e) => {
                error!("Withdrawal handler failed: {}", e);
                (self.stream_start, 0)
            }
        };

        let stats = self.periodic.stats();
        self.periodic.stop().await;

        info!(resume_offset, "Shutdown complete");
        ShutdownReport {
            resume_offset,
            withdrawals_handled,
            reconcile_runs: stats.runs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::RelayerConfig;
    use cb_01_ledger_session::test_utils::MockLedger;
    use cb_01_ledger_session::{CreatedEvent, Event, Transaction, Update};
    use cb_04_bridge::test_utils::{install_bridge_choices, seed_bridge};
    use cb_04_bridge::{WithdrawalEvent, WithdrawalStatus};
    use cb_03_token::test_utils::{install_token_choices, seed_holding, seed_token};
    use shared_types::{Amount, BalanceStore, InMemoryBalanceStore, User};
    use std::time::Duration;

    const RELAYER: &str = "relayer::1220";
    const ALICE: &str = "alice::1220";

    fn config() -> RelayerConfig {
        crate::container::config::tests::valid()
    }

    fn withdrawal(contract_id: &str, offset: Offset) -> WithdrawalEvent {
        WithdrawalEvent {
            contract_id: contract_id.into(),
            operator: RELAYER.into(),
            user_party: ALICE.into(),
            evm_destination: "0xdest".into(),
            amount: "2".into(),
            fingerprint: "0xa11ce".into(),
            status: WithdrawalStatus::Pending,
            evm_tx_hash: None,
            offset,
        }
    }

    fn withdrawal_tx(event: &WithdrawalEvent) -> cb_01_ledger_session::LedgerResult<Update> {
        Ok(Update::Transaction(Transaction {
            update_id: format!("u{}", event.offset),
            offset: event.offset,
            events: vec![Event::Created(CreatedEvent {
                offset: event.offset,
                contract_id: event.contract_id.clone(),
                template_id: config().bridge.withdrawal_event_template(),
                create_arguments: event.to_arguments(),
                signatories: vec![RELAYER.into()],
                ..Default::default()
            })],
            ..Default::default()
        }))
    }

    fn seeded_ledger(with_bridge: bool) -> Arc<MockLedger> {
        let config = config();
        let ledger = Arc::new(MockLedger::new());
        install_token_choices(&ledger, &config.token);
        install_bridge_choices(&ledger, &config.bridge, &config.token);
        let token_cid = seed_token(&ledger, &config.token, "DEMO");
        if with_bridge {
            seed_bridge(&ledger, &config.bridge, &token_cid);
        }
        ledger
    }

    fn runtime(
        config: RelayerConfig,
        ledger: &Arc<MockLedger>,
        store: &Arc<InMemoryBalanceStore>,
    ) -> RelayerRuntime {
        RelayerRuntime::new(
            SubsystemContainer::new(config, ledger.clone(), None, store.clone(), None).unwrap(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_relayer_hands_over_each_withdrawal_once() {
        let ledger = seeded_ledger(true);
        let existing = ledger.add_contract(
            config().bridge.withdrawal_event_template(),
            withdrawal("ignored", 0).to_arguments(),
            &[RELAYER],
        );
        // The stream replays the catch-up withdrawal before a new one.
        ledger.script_stream(vec![
            withdrawal_tx(&withdrawal(&existing, 1000)),
            withdrawal_tx(&withdrawal("w1001", 1001)),
        ]);

        let store = Arc::new(InMemoryBalanceStore::new());
        let relayer = runtime(config(), &ledger, &store).start().await.unwrap();
        assert_eq!(relayer.stream_start(), ledger.offset());

        tokio::time::sleep(Duration::from_secs(1)).await;
        let report = relayer.shutdown().await;

        assert_eq!(report.withdrawals_handled, 2);
        assert_eq!(report.resume_offset, 1001);
        assert_eq!(report.reconcile_runs, 1);
        assert_eq!(store.total_supply("DEMO"), Some(Amount::zero()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_stream_offset_is_used() {
        let ledger = seeded_ledger(true);
        let mut config = config();
        config.stream_from_offset = Some(1);

        let store = Arc::new(InMemoryBalanceStore::new());
        let relayer = runtime(config, &ledger, &store).start().await.unwrap();
        assert_eq!(relayer.stream_start(), 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(ledger.update_requests()[0].begin_exclusive, 1);
        assert_eq!(relayer.shutdown().await.resume_offset, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_reconcile_on_start_then_holdings_pass() {
        let ledger = seeded_ledger(true);
        seed_holding(&ledger, &config().token, ALICE, "7.5", "DEMO");
        let store = Arc::new(InMemoryBalanceStore::new());
        store.register_user(User {
            evm_address: "0xaa".into(),
            fingerprint: "0xa11ce".into(),
            party_id: Some(ALICE.into()),
            mapping_cid: None,
        });

        let mut config = config();
        config.full_reconcile_on_start = true;
        let relayer = runtime(config, &ledger, &store).start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        relayer.shutdown().await;

        assert_eq!(store.balance_of(ALICE, "DEMO"), Amount::parse("7.5").unwrap());
        assert_eq!(
            store.total_supply("DEMO"),
            Some(Amount::parse("7.5").unwrap())
        );
        assert!(store
            .get_reconciliation_state()
            .await
            .unwrap()
            .last_full_reconcile_at
            .is_some());
    }

    #[tokio::test]
    async fn test_start_fails_without_bridge_config() {
        let ledger = seeded_ledger(false);
        let store = Arc::new(InMemoryBalanceStore::new());
        let result = runtime(config(), &ledger, &store).start().await;
        assert!(result.is_err());
    }

    #[test]
    #[allow(clippy::const_is_empty)]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
