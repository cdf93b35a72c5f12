//! # Inbound Ports
//!
//! What the bridge component offers to the EVM watcher and releaser.

use crate::domain::{BridgeConfigContract, BridgeResult, PendingDeposit, WithdrawalEvent};
use async_trait::async_trait;
use cb_03_token::Holding;
use shared_types::{Amount, ContractId};

/// Outcome of a processed deposit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepositOutcome {
    /// Holding minted to the depositor.
    pub holding: Holding,
    /// Receipt replacing the pending deposit.
    pub receipt_cid: Option<ContractId>,
    /// Ledger transaction.
    pub update_id: String,
}

/// Bridge API - inbound port.
#[async_trait]
pub trait BridgeApi: Send + Sync {
    /// Bridge config operated by the relayer.
    async fn get_bridge_config(&self) -> BridgeResult<BridgeConfigContract>;

    /// True when a pending deposit or a receipt carries `evm_tx_hash`.
    async fn is_deposit_processed(&self, evm_tx_hash: &str) -> BridgeResult<bool>;

    /// Record an EVM deposit on the ledger under the canonical form of
    /// `fingerprint`. Unmapped fingerprints fail with `MappingNotFound`.
    async fn create_pending_deposit(
        &self,
        fingerprint: &str,
        amount: &Amount,
        evm_tx_hash: &str,
    ) -> BridgeResult<PendingDeposit>;

    /// Mint a pending deposit to the party of `mapping_cid`.
    ///
    /// On failure the caller re-checks [`is_deposit_processed`] before
    /// retrying.
    ///
    /// [`is_deposit_processed`]: BridgeApi::is_deposit_processed
    async fn process_deposit_and_mint(
        &self,
        deposit_cid: &str,
        mapping_cid: &str,
    ) -> BridgeResult<DepositOutcome>;

    /// Burn from a holding and open a pending withdrawal.
    async fn initiate_withdrawal(
        &self,
        mapping_cid: &str,
        holding_cid: &str,
        amount: &Amount,
        evm_destination: &str,
    ) -> BridgeResult<WithdrawalEvent>;

    /// Mark a withdrawal released. Completing twice is success.
    async fn complete_withdrawal(&self, event_cid: &str, evm_tx_hash: &str) -> BridgeResult<()>;

    /// Active withdrawal events, any status.
    async fn list_withdrawal_events(&self) -> BridgeResult<Vec<WithdrawalEvent>>;
}
