//! # Domain Module
//!
//! Deposit and withdrawal contracts, configuration and errors of the bridge
//! component.

pub mod config;
pub mod entities;
pub mod errors;

pub use config::*;
pub use entities::*;
pub use errors::*;
