//! # Shared Types Crate
//!
//! Types shared by every bridge subsystem: exact decimal amounts, ledger
//! identifiers, fingerprint handling, and the balance/event store port.
//!
//! ## Design Principles
//!
//! - **No floating point**: every quantity is an [`Amount`].
//! - **Ledger is truth**: the store only caches what the ledger says; the
//!   reconciliation engine overwrites it.

pub mod amount;
pub mod entities;
pub mod errors;
pub mod store;

pub use amount::{sum_decimal_strings, Amount, AmountError, NUMERIC_SCALE};
pub use entities::*;
pub use errors::*;
pub use store::{BalanceStore, InMemoryBalanceStore};
