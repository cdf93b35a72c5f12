//! # Inbound Port

use crate::domain::{EventsReport, FullReconcileReport, HoldingsReport, ReconcileResult};
use async_trait::async_trait;

/// Reconciliation engine API - inbound port.
#[async_trait]
pub trait ReconcileApi: Send + Sync {
    /// Write total supply per symbol and every registered user's balance
    /// from the active holdings.
    async fn reconcile_all(&self) -> ReconcileResult<HoldingsReport>;

    /// Overwrite registered users' balances from the active holdings,
    /// leaving total supply untouched.
    async fn reconcile_user_balances_from_holdings(&self) -> ReconcileResult<HoldingsReport>;

    /// Store every mint/burn audit event not yet in the processed set.
    async fn reconcile_from_bridge_events(&self) -> ReconcileResult<EventsReport>;

    /// Zero cached balances, drop the event log and replay the audit events.
    ///
    /// Destructive; meant for startup or detected drift.
    async fn full_balance_reconciliation(&self) -> ReconcileResult<FullReconcileReport>;
}
