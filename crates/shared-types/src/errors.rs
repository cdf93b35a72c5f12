//! # Error Types
//!
//! Errors raised by the balance/event store port.

use thiserror::Error;

/// Errors surfaced by a `BalanceStore` implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No registered user has the given fingerprint.
    #[error("User not found for fingerprint {0}")]
    UserNotFound(String),

    /// Cached balance cannot cover a debit.
    #[error("Insufficient cached balance for {fingerprint}: have {available}, need {required}")]
    InsufficientBalance {
        /// Debited fingerprint
        fingerprint: String,
        /// Cached balance
        available: String,
        /// Requested debit
        required: String,
    },

    /// Underlying database failure.
    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
