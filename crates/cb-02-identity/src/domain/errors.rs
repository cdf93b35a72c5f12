//! # Domain Errors

use cb_01_ledger_session::{LedgerError, SignerError};
use thiserror::Error;

/// Identity errors.
#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    /// No active mapping carries the fingerprint.
    #[error("Fingerprint mapping not found: {0}")]
    MappingNotFound(String),

    /// Submitted create did not produce a mapping contract.
    #[error("Fingerprint mapping was not created for {0}")]
    MappingNotCreated(String),

    /// EVM address cannot be turned into a fingerprint.
    #[error("Invalid EVM address: {0}")]
    InvalidAddress(String),

    /// Missing package id or issuer party.
    #[error("Identity configuration error: {0}")]
    Config(String),

    /// Ledger call failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Signer failed during external allocation.
    #[error(transparent)]
    Signer(#[from] SignerError),
}

/// Result type for identity operations.
pub type IdentityResult<T> = Result<T, IdentityError>;
