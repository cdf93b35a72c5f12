//! # Domain Module
//!
//! Pass reports, configuration and errors of the reconciliation engine.

pub mod config;
pub mod entities;
pub mod errors;

pub use config::*;
pub use entities::*;
pub use errors::*;
