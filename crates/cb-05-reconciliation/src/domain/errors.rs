//! # Domain Errors

use cb_03_token::TokenError;
use shared_types::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Reconciliation errors.
///
/// Per-record problems never surface here; a pass skips and logs them.
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    /// Reading holdings or audit events from the ledger failed.
    #[error("Ledger read failed: {0}")]
    Token(#[from] TokenError),

    /// The balance store failed outside a single record.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A periodic run exceeded its time budget.
    #[error("Reconciliation run timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid configuration.
    #[error("Reconciler configuration error: {0}")]
    Config(String),
}

/// Result type for reconciliation.
pub type ReconcileResult<T> = Result<T, ReconcileError>;
