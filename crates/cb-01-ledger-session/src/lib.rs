//! # CB-01 Ledger Session
//!
//! Authenticated access to the participant's ledger API.
//!
//! **Subsystem ID:** 01
//! **Architecture:** Hexagonal (domain / ports / adapters)
//!
//! ## Purpose
//!
//! - Obtain and cache bearer tokens (client-credentials grant)
//! - Query the active contract set, submit commands, stream updates
//! - Prepare and execute externally signed transactions
//! - Convert ledger values to typed fields and back
//!
//! ## Module Structure
//!
//! ```text
//! cb-01-ledger-session/
//! ├── domain/      # Value codec, ledger entities, errors
//! ├── ports/       # LedgerTransport, TokenProvider, Signer, KeyResolver
//! ├── adapters/    # JSON ledger API (HTTP + WebSocket)
//! ├── auth.rs      # OAuth token provider
//! ├── session.rs   # LedgerSession
//! └── signing.rs   # secp256k1 signer
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod auth;
pub mod domain;
pub mod ports;
pub mod session;
pub mod signing;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-exports
pub use adapters::JsonApiTransport;
pub use auth::{compute_refresh_by, AuthConfig, OAuthTokenProvider, StaticTokenProvider};
pub use domain::*;
pub use ports::{
    AccessToken, KeyResolver, LedgerTransport, Signer, StaticKeyResolver, TokenProvider,
};
pub use session::{LedgerConfig, LedgerSession};
pub use signing::{key_fingerprint, Secp256k1Signer};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
