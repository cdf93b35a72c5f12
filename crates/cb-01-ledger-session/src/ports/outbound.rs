//! # Outbound Ports
//!
//! Dependencies of the ledger session: the wire transport, the bearer token
//! source, and the caller-custodied signers of external parties.

use crate::domain::{
    ActiveContractsRequest, AuthError, Commands, CreatedEvent, ExecuteResponse,
    ExecuteSubmission, ExternalPartyTopology, LedgerResult, PartyDetails, PreparedSubmission,
    Signature, SignerError, SubmitResponse, Transaction, UpdateStream, UpdatesRequest, UserRight,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared_types::{Offset, PartyId};
use std::collections::HashMap;
use std::sync::Arc;

/// Ledger RPC surface - outbound port.
///
/// Every call receives the bearer token to attach, or `None` for
/// deployments without auth.
#[async_trait]
pub trait LedgerTransport: Send + Sync {
    /// Current ledger end offset.
    async fn ledger_end(&self, token: Option<&str>) -> LedgerResult<Offset>;

    /// Drain an active contract snapshot.
    async fn active_contracts(
        &self,
        token: Option<&str>,
        request: &ActiveContractsRequest,
    ) -> LedgerResult<Vec<CreatedEvent>>;

    /// Submit and wait for the completion.
    async fn submit_and_wait(
        &self,
        token: Option<&str>,
        commands: &Commands,
    ) -> LedgerResult<SubmitResponse>;

    /// Submit and wait for the resulting transaction.
    async fn submit_and_wait_for_transaction(
        &self,
        token: Option<&str>,
        commands: &Commands,
    ) -> LedgerResult<Transaction>;

    /// Prepare a transaction for external signing.
    async fn prepare_submission(
        &self,
        token: Option<&str>,
        commands: &Commands,
    ) -> LedgerResult<PreparedSubmission>;

    /// Execute a signed prepared transaction and wait for completion.
    async fn execute_submission_and_wait(
        &self,
        token: Option<&str>,
        request: &ExecuteSubmission,
    ) -> LedgerResult<ExecuteResponse>;

    /// Subscribe to updates.
    async fn updates(
        &self,
        token: Option<&str>,
        request: &UpdatesRequest,
    ) -> LedgerResult<UpdateStream>;

    /// Allocate a participant-hosted party.
    async fn allocate_party(&self, token: Option<&str>, hint: &str)
        -> LedgerResult<PartyDetails>;

    /// First step of external party allocation.
    async fn generate_external_party_topology(
        &self,
        token: Option<&str>,
        synchronizer_id: &str,
        hint: &str,
        public_key_spki_der: &[u8],
    ) -> LedgerResult<ExternalPartyTopology>;

    /// Second step of external party allocation.
    async fn allocate_external_party(
        &self,
        token: Option<&str>,
        synchronizer_id: &str,
        topology: &ExternalPartyTopology,
        signature: &Signature,
    ) -> LedgerResult<PartyId>;

    /// Grant rights to a ledger user.
    async fn grant_user_rights(
        &self,
        token: Option<&str>,
        user_id: &str,
        rights: &[UserRight],
    ) -> LedgerResult<()>;

    /// Synchronizers the participant is connected to.
    async fn connected_synchronizers(&self, token: Option<&str>) -> LedgerResult<Vec<String>>;
}

/// A bearer token with its proactive refresh deadline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessToken {
    /// Raw bearer token.
    pub token: String,
    /// Expiry declared by the issuer; `None` when it declared none.
    pub expires_at: Option<DateTime<Utc>>,
    /// Instant after which a fresh token is fetched.
    pub refresh_by: DateTime<Utc>,
}

/// Bearer token source - outbound port.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Cached token, or a fresh one once the cache is stale.
    async fn token(&self) -> Result<AccessToken, AuthError>;

    /// Drop the cached token so the next call refreshes.
    fn invalidate_token(&self);
}

/// Caller-custodied signing key of an external party.
///
/// The private key never leaves the implementation.
#[async_trait]
pub trait Signer: Send + Sync {
    /// DER-encoded ECDSA-SHA256 signature over `message`.
    async fn sign_der(&self, message: &[u8]) -> Result<Vec<u8>, SignerError>;

    /// Ledger fingerprint of the signing key.
    fn fingerprint(&self) -> String;
}

/// Maps a party to the signer holding its key.
pub trait KeyResolver: Send + Sync {
    /// Signer for `party`, if one is configured.
    fn resolve(&self, party: &str) -> Option<Arc<dyn Signer>>;
}

/// Fixed party → signer table.
#[derive(Default, Clone)]
pub struct StaticKeyResolver {
    signers: HashMap<PartyId, Arc<dyn Signer>>,
}

impl StaticKeyResolver {
    /// Empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the signer for `party`.
    pub fn with_signer(mut self, party: impl Into<PartyId>, signer: Arc<dyn Signer>) -> Self {
        self.signers.insert(party.into(), signer);
        self
    }

    /// Register the signer for `party` in place.
    pub fn insert(&mut self, party: impl Into<PartyId>, signer: Arc<dyn Signer>) {
        self.signers.insert(party.into(), signer);
    }
}

impl KeyResolver for StaticKeyResolver {
    fn resolve(&self, party: &str) -> Option<Arc<dyn Signer>> {
        self.signers.get(party).cloned()
    }
}
