//! # Domain Module
//!
//! Fingerprint mappings, identity configuration and errors.

pub mod config;
pub mod entities;
pub mod errors;

pub use config::*;
pub use entities::*;
pub use errors::*;
