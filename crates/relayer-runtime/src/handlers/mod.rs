//! # Event Handlers
//!
//! Consumers of the subsystem streams.

pub mod withdrawals;

pub use withdrawals::WithdrawalHandler;
