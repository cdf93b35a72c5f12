//! # CB-03 Token
//!
//! Ledger-native bridge token.
//!
//! **Subsystem ID:** 03
//! **Architecture:** Hexagonal (domain / algorithms / ports / service)
//!
//! ## Purpose
//!
//! - Discover the per-symbol token config contract
//! - Mint and burn through the config choices, with audit events
//! - Query holdings, balances and total supply in exact decimal arithmetic
//! - Transfer by multi-input holding selection and an externally signed
//!   submission from the sender's own key

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algorithms;
pub mod domain;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-exports
pub use algorithms::{select_holdings, Selection};
pub use domain::*;
pub use ports::{BurnRequest, BurnResult, MintRequest, TokenApi};
pub use service::TokenService;

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
