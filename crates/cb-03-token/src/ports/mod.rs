//! # Ports
//!
//! Inbound API of the token component.

pub mod inbound;

pub use inbound::*;
