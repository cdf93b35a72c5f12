//! # Ports
//!
//! Inbound API of the bridge component.

pub mod inbound;

pub use inbound::*;
