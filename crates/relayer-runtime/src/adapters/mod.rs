//! # Adapter Implementations
//!
//! Decorators that wrap subsystem ports and record Prometheus metrics.
//! The subsystems themselves only log; counting happens here so the
//! subsystem crates stay free of the telemetry dependency.
//!
//! ```text
//! LedgerSession ──→ MeteredTokenProvider ──→ OAuth / static token
//! PeriodicReconciler ──→ MeteredReconciler ──→ ReconciliationService
//! ```

pub mod auth;
pub mod reconciler;

pub use auth::MeteredTokenProvider;
pub use reconciler::MeteredReconciler;
