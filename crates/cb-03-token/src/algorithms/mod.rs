//! Algorithms module for the token component
//!
//! Contains:
//! - Multi-input holding selection

pub mod selection;

pub use selection::{select_holdings, Selection};
