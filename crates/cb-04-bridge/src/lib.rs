//! # CB-04 Bridge
//!
//! Ledger side of the EVM bridge.
//!
//! **Subsystem ID:** 04
//! **Architecture:** Hexagonal (domain / ports / service) plus a supervised
//! stream task
//!
//! ## Purpose
//!
//! - Deduplicate EVM deposits by transaction hash
//! - Record pending deposits and mint them to the depositor's party
//! - Burn for withdrawals and mark them completed once released
//! - Follow newly pending withdrawals through a reconnecting update stream

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod ports;
pub mod service;
pub mod stream;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-exports
pub use domain::*;
pub use ports::{BridgeApi, DepositOutcome};
pub use service::BridgeService;
pub use stream::{StreamProgress, WithdrawalStream};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    #[allow(clippy::const_is_empty)]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
