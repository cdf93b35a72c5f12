//! # Domain Errors

use cb_01_ledger_session::LedgerError;
use cb_02_identity::IdentityError;
use shared_types::PartyId;
use thiserror::Error;

/// Bridge component errors.
#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    /// No bridge config operated by the relayer party.
    #[error("Bridge config not found for operator {0}")]
    BridgeConfigNotFound(PartyId),

    /// Create returned no pending deposit.
    #[error("Pending deposit not created for EVM tx {0}")]
    PendingDepositNotCreated(String),

    /// Deposit processing committed without a holding.
    #[error("Deposit processing did not mint (update {0})")]
    MintNotProduced(String),

    /// Withdrawal initiation committed without a withdrawal event.
    #[error("Withdrawal event not created (update {0})")]
    WithdrawalNotCreated(String),

    /// Amount must be strictly positive.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Missing package id, operator party or bad stream settings.
    #[error("Bridge configuration error: {0}")]
    Config(String),

    /// Fingerprint resolution failed.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Ledger call failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl BridgeError {
    /// True when the ledger reported that the work was already done.
    pub fn is_already_done(&self) -> bool {
        match self {
            BridgeError::Ledger(err) => {
                err.is_already_exists() || err.to_string().to_ascii_lowercase().contains("already")
            }
            _ => false,
        }
    }
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
