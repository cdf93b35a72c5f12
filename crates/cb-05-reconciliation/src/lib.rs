//! # CB-05 Reconciliation
//!
//! Convergence engine for the relayer's balance cache.
//!
//! **Subsystem ID:** 05
//! **Architecture:** Hexagonal (domain / ports / service)
//!
//! ## Purpose
//!
//! The ledger is the source of truth; the cache is a read-optimized mirror
//! that transfers update on a best-effort basis. This crate brings it back
//! in line:
//!
//! - Holdings-based snapshot of total supply and per-user balances
//! - Event-sourced replay of mint/burn audit events with a processed set
//! - Full reset-and-rebuild for startup or detected drift
//! - A periodic background loop with a per-run timeout

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod ports;
pub mod scheduler;
pub mod service;

// Re-exports
pub use domain::*;
pub use ports::ReconcileApi;
pub use scheduler::{LoopStats, PeriodicReconciler};
pub use service::ReconciliationService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    #[allow(clippy::const_is_empty)]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
