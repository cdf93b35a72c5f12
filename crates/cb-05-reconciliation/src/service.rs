//! # Reconciliation Service
//!
//! Three passes make the balance cache converge to the ledger:
//!
//! - **Holdings-based**: sum active holdings per symbol (total supply) and per
//!   (owner, symbol), then overwrite every registered user's cached balance.
//!   Users without holdings are written as zero.
//! - **Event-sourced**: store each mint/burn audit event not yet in the
//!   processed set; storing credits or debits the event party.
//! - **Full rebuild**: zero balances, drop the event log, replay all events.
//!
//! A bad record is logged and skipped; only failures that affect the whole
//! pass are returned as errors.

use crate::domain::{
    EventsReport, FullReconcileReport, HoldingsReport, ReconcileResult, ReconcilerConfig,
};
use crate::ports::ReconcileApi;
use async_trait::async_trait;
use cb_03_token::{Holding, TokenApi};
use shared_types::{Amount, BalanceStore, BridgeEventKind, BridgeEventRecord, PartyId};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Holdings summed per symbol and per (owner, symbol).
#[derive(Debug, Default)]
struct HoldingTotals {
    supply: BTreeMap<String, Amount>,
    by_owner: HashMap<(PartyId, String), Amount>,
    scanned: usize,
    skipped: usize,
}

fn aggregate_holdings(holdings: &[Holding]) -> HoldingTotals {
    let mut totals = HoldingTotals {
        scanned: holdings.len(),
        ..Default::default()
    };
    for holding in holdings {
        let amount = match holding.amount() {
            Ok(amount) => amount,
            Err(err) => {
                warn!(
                    contract_id = %holding.contract_id,
                    amount = %holding.amount,
                    error = %err,
                    "[cb-05] Skipping holding with unparseable amount"
                );
                totals.skipped += 1;
                continue;
            }
        };
        *totals.supply.entry(holding.symbol.clone()).or_default() += &amount;
        *totals
            .by_owner
            .entry((holding.owner.clone(), holding.symbol.clone()))
            .or_default() += &amount;
    }
    totals
}

/// Reconciliation engine.
pub struct ReconciliationService {
    token: Arc<dyn TokenApi>,
    store: Arc<dyn BalanceStore>,
    config: ReconcilerConfig,
}

impl ReconciliationService {
    /// Create the engine over the token component and the balance store.
    pub fn new(
        token: Arc<dyn TokenApi>,
        store: Arc<dyn BalanceStore>,
        config: ReconcilerConfig,
    ) -> ReconcileResult<Self> {
        config.validate()?;
        Ok(Self {
            token,
            store,
            config,
        })
    }

    /// Engine configuration.
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    async fn holding_totals(&self) -> ReconcileResult<HoldingTotals> {
        let holdings = self.token.get_all_holdings().await?;
        Ok(aggregate_holdings(&holdings))
    }

    /// Configured symbols plus every symbol seen in the holdings.
    fn symbols_of(&self, totals: &HoldingTotals) -> BTreeSet<String> {
        self.config
            .symbols
            .iter()
            .cloned()
            .chain(totals.supply.keys().cloned())
            .collect()
    }

    async fn write_user_balances(
        &self,
        totals: &HoldingTotals,
        report: &mut HoldingsReport,
    ) -> ReconcileResult<()> {
        let symbols = self.symbols_of(totals);
        let users = self.store.list_users().await?;

        for user in users.iter().filter(|u| u.is_registered()) {
            let Some(party) = user.party_id.as_deref() else {
                continue;
            };
            for symbol in &symbols {
                let balance = totals
                    .by_owner
                    .get(&(party.to_string(), symbol.clone()))
                    .cloned()
                    .unwrap_or_default();
                match self
                    .store
                    .update_balance_by_party_id(party, symbol, &balance)
                    .await
                {
                    Ok(()) => report.balances_written += 1,
                    Err(err) => {
                        warn!(
                            party,
                            symbol = %symbol,
                            error = %err,
                            "[cb-05] Failed to write cached balance"
                        );
                        report.balances_failed += 1;
                    }
                }
            }
        }
        Ok(())
    }

    async fn load_event_records(
        &self,
        report: &mut EventsReport,
    ) -> ReconcileResult<Vec<BridgeEventRecord>> {
        let mints = self.token.get_mint_events().await?;
        let burns = self.token.get_burn_events().await?;
        report.mint_events = mints.len();
        report.burn_events = burns.len();

        let decoded = mints
            .iter()
            .map(|e| (e.contract_id.as_str(), e.to_record()))
            .chain(burns.iter().map(|e| (e.contract_id.as_str(), e.to_record())));

        let mut records = Vec::with_capacity(report.total());
        for (contract_id, record) in decoded {
            match record {
                Ok(record) => records.push(record),
                Err(err) => {
                    warn!(contract_id, error = %err, "[cb-05] Skipping undecodable audit event");
                    report.skipped += 1;
                }
            }
        }
        records.sort_by_key(|r| r.offset);
        Ok(records)
    }

    async fn apply_event(&self, record: &BridgeEventRecord, report: &mut EventsReport) {
        match self.store.is_event_processed(&record.contract_id).await {
            Ok(true) => {
                report.already_processed += 1;
                return;
            }
            Ok(false) => {}
            Err(err) => {
                warn!(
                    contract_id = %record.contract_id,
                    error = %err,
                    "[cb-05] Processed-set lookup failed, skipping event"
                );
                report.skipped += 1;
                return;
            }
        }

        let stored = match record.kind {
            BridgeEventKind::Mint => self.store.store_mint_event(record).await,
            BridgeEventKind::Burn => self.store.store_burn_event(record).await,
        };
        if let Err(err) = stored {
            warn!(
                contract_id = %record.contract_id,
                kind = ?record.kind,
                error = %err,
                "[cb-05] Failed to store audit event, skipping"
            );
            report.skipped += 1;
            return;
        }
        if let Err(err) = self.store.update_last_reconciled(record.offset, 1).await {
            warn!(offset = record.offset, error = %err, "[cb-05] Failed to advance checkpoint");
        }

        debug!(
            contract_id = %record.contract_id,
            kind = ?record.kind,
            party = %record.party_id,
            amount = %record.amount,
            "[cb-05] Audit event stored"
        );
        report.processed += 1;
        report.last_offset = report.last_offset.max(Some(record.offset));
    }

    async fn replay(&self, records: &[BridgeEventRecord], report: &mut EventsReport) {
        for record in records {
            self.apply_event(record, report).await;
        }
    }
}

#[async_trait]
impl ReconcileApi for ReconciliationService {
    async fn reconcile_all(&self) -> ReconcileResult<HoldingsReport> {
        let totals = self.holding_totals().await?;
        let mut report = HoldingsReport {
            holdings_scanned: totals.scanned,
            holdings_skipped: totals.skipped,
            ..Default::default()
        };

        for symbol in self.symbols_of(&totals) {
            let supply = totals.supply.get(&symbol).cloned().unwrap_or_default();
            self.store.set_total_supply(&symbol, &supply).await?;
            report.total_supply.insert(symbol, supply);
        }
        self.write_user_balances(&totals, &mut report).await?;

        info!(
            holdings = report.holdings_scanned,
            skipped = report.holdings_skipped,
            balances = report.balances_written,
            failed = report.balances_failed,
            "[cb-05] Reconciled supply and balances from holdings"
        );
        Ok(report)
    }

    async fn reconcile_user_balances_from_holdings(&self) -> ReconcileResult<HoldingsReport> {
        let totals = self.holding_totals().await?;
        let mut report = HoldingsReport {
            holdings_scanned: totals.scanned,
            holdings_skipped: totals.skipped,
            ..Default::default()
        };
        self.write_user_balances(&totals, &mut report).await?;

        info!(
            holdings = report.holdings_scanned,
            balances = report.balances_written,
            failed = report.balances_failed,
            "[cb-05] Reconciled user balances from holdings"
        );
        Ok(report)
    }

    async fn reconcile_from_bridge_events(&self) -> ReconcileResult<EventsReport> {
        let mut report = EventsReport::default();
        let records = self.load_event_records(&mut report).await?;
        self.replay(&records, &mut report).await;

        info!(
            mints = report.mint_events,
            burns = report.burn_events,
            processed = report.processed,
            already_processed = report.already_processed,
            skipped = report.skipped,
            "[cb-05] Reconciled from bridge events"
        );
        Ok(report)
    }

    async fn full_balance_reconciliation(&self) -> ReconcileResult<FullReconcileReport> {
        warn!("[cb-05] Starting full balance reconciliation (reset and rebuild)");
        let mut events = EventsReport::default();
        let records = self.load_event_records(&mut events).await?;

        let symbols: BTreeSet<String> = self
            .config
            .symbols
            .iter()
            .cloned()
            .chain(records.iter().map(|r| r.symbol.clone()))
            .collect();
        for symbol in &symbols {
            self.store.reset_balances(symbol).await?;
        }
        self.store.clear_bridge_events().await?;

        self.replay(&records, &mut events).await;
        self.store.mark_full_reconcile_complete().await?;

        info!(
            symbols = ?symbols,
            processed = events.processed,
            skipped = events.skipped,
            "[cb-05] Full balance reconciliation complete"
        );
        Ok(FullReconcileReport {
            symbols_reset: symbols.into_iter().collect(),
            events,
        })
    }
}
