//! # Balance Store Port
//!
//! Narrow interface onto the relayer's persistence: cached balances, the
//! bridge event log and the reconciliation checkpoint. The relational
//! implementation lives outside this workspace; `InMemoryBalanceStore` backs
//! tests and the standalone runtime.
//!
//! Storing a mint (burn) event records it in the processed set AND credits
//! (debits) the event party's cached balance for the event symbol, so that a
//! replay of the event log rebuilds balances.

use crate::amount::Amount;
use crate::entities::{
    fingerprints_match, BridgeEventKind, BridgeEventRecord, ContractId, Offset, PartyId,
    ReconciliationState, User,
};
use crate::errors::{StoreError, StoreResult};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// Balance/event store - outbound port.
#[async_trait]
pub trait BalanceStore: Send + Sync {
    /// All known users, registered or not.
    async fn list_users(&self) -> StoreResult<Vec<User>>;

    /// Overwrite the cached balance of `party_id` for `symbol`.
    async fn update_balance_by_party_id(
        &self,
        party_id: &str,
        symbol: &str,
        amount: &Amount,
    ) -> StoreResult<()>;

    /// Zero every cached balance for `symbol`.
    async fn reset_balances(&self, symbol: &str) -> StoreResult<()>;

    /// Atomically debit `from` and credit `to`.
    async fn transfer_balance_by_fingerprint(
        &self,
        from_fingerprint: &str,
        to_fingerprint: &str,
        symbol: &str,
        amount: &Amount,
    ) -> StoreResult<()>;

    /// Whether the audit contract has already been applied.
    async fn is_event_processed(&self, contract_id: &str) -> StoreResult<bool>;

    /// Persist a mint event and credit the recipient.
    async fn store_mint_event(&self, event: &BridgeEventRecord) -> StoreResult<()>;

    /// Persist a burn event and debit the burner.
    async fn store_burn_event(&self, event: &BridgeEventRecord) -> StoreResult<()>;

    /// Drop the persisted mint/burn log.
    async fn clear_bridge_events(&self) -> StoreResult<()>;

    /// Current checkpoint.
    async fn get_reconciliation_state(&self) -> StoreResult<ReconciliationState>;

    /// Stamp the end of a full reset-and-rebuild.
    async fn mark_full_reconcile_complete(&self) -> StoreResult<()>;

    /// Record the authoritative total supply for `symbol`.
    async fn set_total_supply(&self, symbol: &str, amount: &Amount) -> StoreResult<()>;

    /// Advance the checkpoint.
    async fn update_last_reconciled(&self, offset: Offset, events_processed: u64)
        -> StoreResult<()>;
}

#[derive(Default)]
struct StoreInner {
    users: Vec<User>,
    balances: HashMap<(PartyId, String), Amount>,
    total_supply: HashMap<String, Amount>,
    events: HashMap<ContractId, BridgeEventRecord>,
    state: ReconciliationState,
    failing_events: HashSet<ContractId>,
}

impl StoreInner {
    fn party_for_fingerprint(&self, fingerprint: &str) -> StoreResult<PartyId> {
        self.users
            .iter()
            .find(|u| fingerprints_match(&u.fingerprint, fingerprint))
            .and_then(|u| u.party_id.clone())
            .ok_or_else(|| StoreError::UserNotFound(fingerprint.to_string()))
    }

    fn apply_event(&mut self, event: &BridgeEventRecord) -> StoreResult<()> {
        if self.failing_events.contains(&event.contract_id) {
            return Err(StoreError::DatabaseError(format!(
                "injected failure for {}",
                event.contract_id
            )));
        }
        if self.events.contains_key(&event.contract_id) {
            return Ok(());
        }

        let key = (event.party_id.clone(), event.symbol.clone());
        let balance = self.balances.entry(key).or_default();
        match event.kind {
            BridgeEventKind::Mint => *balance += &event.amount,
            BridgeEventKind::Burn => *balance = balance.saturating_sub(&event.amount),
        }
        self.events.insert(event.contract_id.clone(), event.clone());
        Ok(())
    }
}

/// In-memory `BalanceStore`.
#[derive(Default)]
pub struct InMemoryBalanceStore {
    inner: RwLock<StoreInner>,
}

impl InMemoryBalanceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a user (matched by fingerprint).
    pub fn register_user(&self, user: User) {
        let mut inner = self.inner.write();
        inner
            .users
            .retain(|u| !fingerprints_match(&u.fingerprint, &user.fingerprint));
        inner.users.push(user);
    }

    /// Cached balance of a party, zero when unknown.
    pub fn balance_of(&self, party_id: &str, symbol: &str) -> Amount {
        self.inner
            .read()
            .balances
            .get(&(party_id.to_string(), symbol.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Cached balance of a fingerprint, zero when unknown.
    pub fn balance_of_fingerprint(&self, fingerprint: &str, symbol: &str) -> Amount {
        let party = self.inner.read().party_for_fingerprint(fingerprint);
        match party {
            Ok(party) => self.balance_of(&party, symbol),
            Err(_) => Amount::zero(),
        }
    }

    /// Last recorded total supply.
    pub fn total_supply(&self, symbol: &str) -> Option<Amount> {
        self.inner.read().total_supply.get(symbol).cloned()
    }

    /// Number of persisted bridge events.
    pub fn event_count(&self) -> usize {
        self.inner.read().events.len()
    }

    /// Make every write of the given event fail (storage fault injection).
    pub fn fail_event(&self, contract_id: &str) {
        self.inner
            .write()
            .failing_events
            .insert(contract_id.to_string());
    }
}

#[async_trait]
impl BalanceStore for InMemoryBalanceStore {
    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.inner.read().users.clone())
    }

    async fn update_balance_by_party_id(
        &self,
        party_id: &str,
        symbol: &str,
        amount: &Amount,
    ) -> StoreResult<()> {
        self.inner
            .write()
            .balances
            .insert((party_id.to_string(), symbol.to_string()), amount.clone());
        Ok(())
    }

    async fn reset_balances(&self, symbol: &str) -> StoreResult<()> {
        let mut inner = self.inner.write();
        for ((_, sym), balance) in inner.balances.iter_mut() {
            if sym == symbol {
                *balance = Amount::zero();
            }
        }
        Ok(())
    }

    async fn transfer_balance_by_fingerprint(
        &self,
        from_fingerprint: &str,
        to_fingerprint: &str,
        symbol: &str,
        amount: &Amount,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let from = inner.party_for_fingerprint(from_fingerprint)?;
        let to = inner.party_for_fingerprint(to_fingerprint)?;

        let from_key = (from, symbol.to_string());
        let available = inner.balances.get(&from_key).cloned().unwrap_or_default();
        if &available < amount {
            return Err(StoreError::InsufficientBalance {
                fingerprint: from_fingerprint.to_string(),
                available: available.to_string(),
                required: amount.to_string(),
            });
        }

        inner.balances.insert(from_key, &available - amount);
        *inner.balances.entry((to, symbol.to_string())).or_default() += amount;
        Ok(())
    }

    async fn is_event_processed(&self, contract_id: &str) -> StoreResult<bool> {
        Ok(self.inner.read().events.contains_key(contract_id))
    }

    async fn store_mint_event(&self, event: &BridgeEventRecord) -> StoreResult<()> {
        self.inner.write().apply_event(event)
    }

    async fn store_burn_event(&self, event: &BridgeEventRecord) -> StoreResult<()> {
        self.inner.write().apply_event(event)
    }

    async fn clear_bridge_events(&self) -> StoreResult<()> {
        let mut inner = self.inner.write();
        inner.events.clear();
        inner.state.events_processed = 0;
        inner.state.last_processed_offset = 0;
        Ok(())
    }

    async fn get_reconciliation_state(&self) -> StoreResult<ReconciliationState> {
        Ok(self.inner.read().state.clone())
    }

    async fn mark_full_reconcile_complete(&self) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let now = Utc::now();
        inner.state.last_full_reconcile_at = Some(now);
        inner.state.updated_at = Some(now);
        Ok(())
    }

    async fn set_total_supply(&self, symbol: &str, amount: &Amount) -> StoreResult<()> {
        self.inner
            .write()
            .total_supply
            .insert(symbol.to_string(), amount.clone());
        Ok(())
    }

    async fn update_last_reconciled(
        &self,
        offset: Offset,
        events_processed: u64,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write();
        inner.state.last_processed_offset = inner.state.last_processed_offset.max(offset);
        inner.state.events_processed += events_processed;
        inner.state.updated_at = Some(Utc::now());
        Ok(())
    }
}
