//! # Inbound Ports
//!
//! What the token component offers to the bridge, the reconciler and the
//! relayer's request handlers.

use crate::domain::{
    BurnEvent, Holding, MintEvent, MintResult, TokenConfigContract, TokenResult, TransferResult,
};
use async_trait::async_trait;
use shared_types::{Amount, ContractId, PartyId};

/// Mint parameters.
#[derive(Clone, Debug)]
pub struct MintRequest {
    /// Party credited.
    pub recipient: PartyId,
    /// Quantity to mint.
    pub amount: Amount,
    /// Token symbol.
    pub symbol: String,
    /// EVM deposit transaction backing the mint.
    pub evm_tx_hash: String,
    /// Recipient fingerprint.
    pub user_fingerprint: String,
    /// Config contract; looked up by symbol when absent.
    pub config_cid: Option<ContractId>,
}

/// Burn parameters.
#[derive(Clone, Debug)]
pub struct BurnRequest {
    /// Owner of the holding.
    pub owner: PartyId,
    /// Holding to burn from.
    pub holding_cid: ContractId,
    /// Quantity to burn.
    pub amount: Amount,
    /// Token symbol.
    pub symbol: String,
    /// EVM address receiving the released funds.
    pub evm_destination: String,
    /// Owner fingerprint.
    pub user_fingerprint: String,
    /// Config contract; looked up by symbol when absent.
    pub config_cid: Option<ContractId>,
}

/// Outcome of a burn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BurnResult {
    /// Ledger transaction.
    pub update_id: String,
    /// Audit event, when the transaction carried one.
    pub event_cid: Option<ContractId>,
}

/// Token API - inbound port.
#[async_trait]
pub trait TokenApi: Send + Sync {
    /// Active config contract of `symbol`.
    async fn get_token_config(&self, symbol: &str) -> TokenResult<TokenConfigContract>;

    /// Mint new tokens; returns the created holding.
    async fn mint(&self, request: &MintRequest) -> TokenResult<MintResult>;

    /// Burn from a holding.
    async fn burn(&self, request: &BurnRequest) -> TokenResult<BurnResult>;

    /// Every active holding issued by the relayer.
    async fn get_all_holdings(&self) -> TokenResult<Vec<Holding>>;

    /// Holdings of `owner` for `symbol`.
    async fn get_holdings(&self, owner: &str, symbol: &str) -> TokenResult<Vec<Holding>>;

    /// Decimal sum of the holdings of `owner`; "0" when none.
    async fn get_balance(&self, owner: &str, symbol: &str) -> TokenResult<String>;

    /// Decimal sum of every holding of `symbol`; "0" when none.
    async fn get_total_supply(&self, symbol: &str) -> TokenResult<String>;

    /// Move `amount` from `from` to `to` with the sender's own signature.
    async fn transfer(
        &self,
        from: &str,
        to: &str,
        amount: &Amount,
        symbol: &str,
    ) -> TokenResult<TransferResult>;

    /// Transfer between the parties mapped to two fingerprints, then move
    /// the cached balance.
    async fn transfer_by_fingerprint(
        &self,
        from_fingerprint: &str,
        to_fingerprint: &str,
        amount: &Amount,
        symbol: &str,
    ) -> TokenResult<TransferResult>;

    /// Active mint audit events.
    async fn get_mint_events(&self) -> TokenResult<Vec<MintEvent>>;

    /// Active burn audit events.
    async fn get_burn_events(&self) -> TokenResult<Vec<BurnEvent>>;
}
