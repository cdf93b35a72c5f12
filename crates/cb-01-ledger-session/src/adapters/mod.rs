//! # Adapters
//!
//! Concrete transport for the ledger session.

pub mod json_api;
pub mod lf_json;
pub mod wire;

pub use json_api::JsonApiTransport;
pub use lf_json::{decode_record, decode_value, encode_record, encode_value};
