//! # CB-02 Identity
//!
//! Ledger identities of bridge users.
//!
//! **Subsystem ID:** 02
//! **Architecture:** Hexagonal (domain / ports / service)
//!
//! ## Purpose
//!
//! - Allocate participant-hosted and externally signed parties
//! - Bind EVM-derived fingerprints to parties through a mapping contract
//! - Grant the relayer user act-as rights on user parties

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use domain::{
    FingerprintMapping, IdentityConfig, IdentityError, IdentityResult,
    FINGERPRINT_MAPPING_ENTITY, FINGERPRINT_MAPPING_MODULE,
};
pub use ports::IdentityApi;
pub use service::IdentityService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
