//! Domain layer for the ledger session.

pub mod entities;
pub mod errors;
pub mod value;

pub use entities::*;
pub use errors::*;
pub use value::*;
