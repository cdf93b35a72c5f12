//! # Ports Module
//!
//! Outbound dependencies of the ledger session.

pub mod outbound;

pub use outbound::*;
