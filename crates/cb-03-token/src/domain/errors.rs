//! # Domain Errors

use cb_01_ledger_session::LedgerError;
use cb_02_identity::IdentityError;
use shared_types::{Amount, AmountError, PartyId, StoreError};
use thiserror::Error;

/// Token component errors.
#[derive(Debug, Clone, Error)]
pub enum TokenError {
    /// No active TokenConfig carries the symbol.
    #[error("Token config not found for symbol {0}")]
    TokenConfigNotFound(String),

    /// No transfer factory administered by the instrument admin.
    #[error("Transfer factory not found for admin {0}")]
    TransferFactoryNotFound(PartyId),

    /// Mint transaction did not create a holding.
    #[error("Mint did not produce a holding (update {0})")]
    HoldingNotFound(String),

    /// Unlocked holdings of the instrument do not cover the amount.
    #[error("Insufficient balance: required {required}, available {total}, shortfall {shortfall}")]
    InsufficientBalance {
        /// Requested amount
        required: Amount,
        /// Unlocked total of the instrument
        total: Amount,
        /// `required - total`
        shortfall: Amount,
    },

    /// Sender has no signer for interactive submission.
    #[error("No signer configured for party {0}")]
    NoSignerConfigured(PartyId),

    /// Amount must be strictly positive.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Decimal string could not be parsed.
    #[error(transparent)]
    Amount(#[from] AmountError),

    /// Missing package id or issuer party.
    #[error("Token configuration error: {0}")]
    Config(String),

    /// Ledger call failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Fingerprint resolution failed.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Balance cache failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for token operations.
pub type TokenResult<T> = Result<T, TokenError>;
