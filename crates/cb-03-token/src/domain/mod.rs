//! # Domain Module
//!
//! Holdings, token configuration contracts, audit events, configuration and
//! errors of the token component.

pub mod config;
pub mod entities;
pub mod errors;

pub use config::*;
pub use entities::*;
pub use errors::*;
