//! # Ports
//!
//! Inbound API of the reconciliation engine.

pub mod inbound;

pub use inbound::*;
