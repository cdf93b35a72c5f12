//! # Subsystem Container
//!
//! Relayer configuration and the dependency-injection container that builds
//! every subsystem service from it.

pub mod config;
pub mod subsystems;

pub use config::{ConfigError, RelayerConfig};
pub use subsystems::SubsystemContainer;
