//! # Inbound Ports
//!
//! What the identity component offers to the token and bridge components.

use crate::domain::{FingerprintMapping, IdentityResult};
use async_trait::async_trait;
use cb_01_ledger_session::{PartyDetails, Signer};
use shared_types::{PartyId, User};

/// Identity API - inbound port.
#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// Allocate a participant-hosted party.
    async fn allocate_party(&self, hint: &str) -> IdentityResult<PartyDetails>;

    /// Allocate a party whose key stays with `signer`.
    async fn allocate_external_party(
        &self,
        hint: &str,
        public_key_spki_der: &[u8],
        signer: &dyn Signer,
    ) -> IdentityResult<PartyId>;

    /// Bind `fingerprint` to `user_party`.
    async fn create_fingerprint_mapping(
        &self,
        user_party: &str,
        fingerprint: &str,
        evm_address: &str,
    ) -> IdentityResult<FingerprintMapping>;

    /// Look up the mapping of a fingerprint (any casing, with or without `0x`).
    async fn get_fingerprint_mapping(&self, fingerprint: &str)
        -> IdentityResult<FingerprintMapping>;

    /// Let the relayer user act as `party`. Already granted is success.
    async fn grant_act_as_party(&self, party: &str) -> IdentityResult<()>;

    /// Allocate, authorize and map a new EVM user. Idempotent per address.
    async fn register_user(&self, evm_address: &str) -> IdentityResult<User>;
}
