//! # Ledger Session
//!
//! Owns the transport, attaches the bearer token to every call and drops the
//! cached token when the ledger reports Unauthenticated / PermissionDenied.
//!
//! All calls are single-shot: errors propagate to the caller, who decides
//! whether to retry.

use crate::adapters::JsonApiTransport;
use crate::domain::{
    ActiveContractsRequest, Command, Commands, CreatedEvent, ExecuteResponse, ExecuteSubmission,
    ExternalPartyTopology, LedgerError, LedgerResult, PartyDetails, PartySignature,
    PreparedSubmission, Signature, SignatureFormat, SigningAlgorithm, SubmitResponse, TemplateId,
    Transaction, UpdateStream, UpdatesRequest, UserRight,
};
use crate::ports::{LedgerTransport, Signer, TokenProvider};
use parking_lot::RwLock;
use shared_types::{Offset, PartyId};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default maximum inbound message size (16 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Connection configuration of the ledger session.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Base URL of the JSON ledger API, e.g. `https://participant:7575`.
    pub base_url: String,
    /// Ledger user the relayer submits as.
    pub user_id: String,
    /// PEM root certificate for private CAs.
    pub tls_root_pem: Option<String>,
    /// Maximum inbound message size in bytes.
    pub max_message_size: usize,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Synchronizer to submit to; discovered when unset.
    pub synchronizer_id: Option<String>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:7575".to_string(),
            user_id: "relayer".to_string(),
            tls_root_pem: None,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            request_timeout: Duration::from_secs(30),
            synchronizer_id: None,
        }
    }
}

impl LedgerConfig {
    /// Read configuration from the environment.
    ///
    /// # Environment Variables
    ///
    /// - `CB_LEDGER_URL`: JSON API base URL (default: http://localhost:7575)
    /// - `CB_LEDGER_USER_ID`: ledger user (default: relayer)
    /// - `CB_LEDGER_TLS_ROOT_PEM`: PEM root certificate contents
    /// - `CB_LEDGER_MAX_MESSAGE_SIZE`: bytes (default: 16 MiB)
    /// - `CB_LEDGER_TIMEOUT_SECS`: request timeout (default: 30)
    /// - `CB_SYNCHRONIZER_ID`: synchronizer (default: discovered)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env::var("CB_LEDGER_URL").unwrap_or(defaults.base_url),
            user_id: env::var("CB_LEDGER_USER_ID").unwrap_or(defaults.user_id),
            tls_root_pem: env::var("CB_LEDGER_TLS_ROOT_PEM").ok(),
            max_message_size: env::var("CB_LEDGER_MAX_MESSAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_message_size),
            request_timeout: env::var("CB_LEDGER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            synchronizer_id: env::var("CB_SYNCHRONIZER_ID").ok().filter(|s| !s.is_empty()),
        }
    }

    /// Fail fast on unusable settings.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.base_url.is_empty() {
            return Err(LedgerError::Config("ledger base URL is not set".into()));
        }
        if self.user_id.is_empty() {
            return Err(LedgerError::Config("ledger user id is not set".into()));
        }
        if self.max_message_size == 0 {
            return Err(LedgerError::Config("max message size must be > 0".into()));
        }
        Ok(())
    }
}

/// Authenticated ledger session.
pub struct LedgerSession {
    config: LedgerConfig,
    transport: Arc<dyn LedgerTransport>,
    auth: Option<Arc<dyn TokenProvider>>,
    synchronizer: RwLock<Option<String>>,
}

impl LedgerSession {
    /// Session over an arbitrary transport.
    pub fn new(
        config: LedgerConfig,
        transport: Arc<dyn LedgerTransport>,
        auth: Option<Arc<dyn TokenProvider>>,
    ) -> Self {
        let synchronizer = RwLock::new(config.synchronizer_id.clone());
        Self {
            config,
            transport,
            auth,
            synchronizer,
        }
    }

    /// Session over the JSON ledger API.
    pub fn connect(
        config: LedgerConfig,
        auth: Option<Arc<dyn TokenProvider>>,
    ) -> LedgerResult<Self> {
        config.validate()?;
        let transport = JsonApiTransport::new(&config)?;
        info!(
            base_url = %config.base_url,
            user_id = %config.user_id,
            auth = auth.is_some(),
            "[cb-01] Ledger session configured"
        );
        Ok(Self::new(config, Arc::new(transport), auth))
    }

    /// Ledger user of the session.
    pub fn user_id(&self) -> &str {
        &self.config.user_id
    }

    /// Session configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Current bearer token; `None` without auth.
    async fn bearer(&self) -> LedgerResult<Option<String>> {
        match &self.auth {
            Some(auth) => Ok(Some(auth.token().await?.token)),
            None => Ok(None),
        }
    }

    /// Drop the cached token; the next call fetches a fresh one.
    pub fn invalidate_token(&self) {
        if let Some(auth) = &self.auth {
            auth.invalidate_token();
        }
    }

    fn observe<T>(&self, op: &'static str, result: LedgerResult<T>) -> LedgerResult<T> {
        if let Err(err) = &result {
            if err.is_auth_error() {
                warn!(op, error = %err, "[cb-01] Auth rejected by ledger, invalidating token");
                self.invalidate_token();
            } else {
                debug!(op, error = %err, "[cb-01] Ledger call failed");
            }
        }
        result
    }

    /// Ledger end offset. Zero means the ledger is empty.
    pub async fn get_ledger_end(&self) -> LedgerResult<Offset> {
        let token = self.bearer().await?;
        let result = self.transport.ledger_end(token.as_deref()).await;
        self.observe("ledger_end", result)
    }

    /// Active contracts of `template` visible to `parties` at `offset`.
    ///
    /// Offset zero and an empty party list are caller errors.
    pub async fn get_active_contracts_by_template(
        &self,
        offset: Offset,
        parties: &[PartyId],
        template_id: &TemplateId,
    ) -> LedgerResult<Vec<CreatedEvent>> {
        if offset == 0 {
            return Err(LedgerError::EmptyLedger);
        }
        if parties.is_empty() {
            return Err(LedgerError::NoParties);
        }

        let request = ActiveContractsRequest {
            active_at_offset: offset,
            parties: parties.to_vec(),
            template_id: template_id.clone(),
        };
        let token = self.bearer().await?;
        let result = self
            .transport
            .active_contracts(token.as_deref(), &request)
            .await;
        let events = self.observe("active_contracts", result)?;
        debug!(
            template = %template_id,
            offset,
            count = events.len(),
            "[cb-01] Active contracts fetched"
        );
        Ok(events)
    }

    /// Active contracts at the current ledger end; empty on an empty ledger.
    pub async fn get_active_contracts(
        &self,
        parties: &[PartyId],
        template_id: &TemplateId,
    ) -> LedgerResult<Vec<CreatedEvent>> {
        let offset = self.get_ledger_end().await?;
        if offset == 0 {
            return Ok(Vec::new());
        }
        self.get_active_contracts_by_template(offset, parties, template_id)
            .await
    }

    /// Build a command batch with a fresh command id.
    pub fn commands(&self, act_as: &[PartyId], commands: Vec<Command>) -> Commands {
        Commands {
            command_id: Uuid::new_v4().to_string(),
            user_id: self.config.user_id.clone(),
            act_as: act_as.to_vec(),
            read_as: Vec::new(),
            commands,
            synchronizer_id: self.synchronizer.read().clone().unwrap_or_default(),
        }
    }

    /// Submit and wait for the completion.
    pub async fn submit_and_wait(&self, commands: &Commands) -> LedgerResult<SubmitResponse> {
        let token = self.bearer().await?;
        let result = self
            .transport
            .submit_and_wait(token.as_deref(), commands)
            .await;
        self.observe("submit_and_wait", result)
    }

    /// Submit and return the produced transaction.
    pub async fn submit_and_wait_for_transaction(
        &self,
        commands: &Commands,
    ) -> LedgerResult<Transaction> {
        let token = self.bearer().await?;
        let result = self
            .transport
            .submit_and_wait_for_transaction(token.as_deref(), commands)
            .await;
        let tx = self.observe("submit_and_wait_for_transaction", result)?;
        debug!(
            command_id = %commands.command_id,
            update_id = %tx.update_id,
            offset = tx.offset,
            "[cb-01] Transaction committed"
        );
        Ok(tx)
    }

    /// Prepare a transaction for external signing.
    pub async fn prepare_submission(
        &self,
        commands: &Commands,
    ) -> LedgerResult<PreparedSubmission> {
        let mut commands = commands.clone();
        if commands.synchronizer_id.is_empty() {
            commands.synchronizer_id = self.synchronizer_id().await?;
        }
        let token = self.bearer().await?;
        let result = self
            .transport
            .prepare_submission(token.as_deref(), &commands)
            .await;
        self.observe("prepare_submission", result)
    }

    /// Execute a prepared transaction with the collected signatures.
    pub async fn execute_submission_and_wait(
        &self,
        prepared: &PreparedSubmission,
        party_signatures: Vec<PartySignature>,
    ) -> LedgerResult<ExecuteResponse> {
        let request = ExecuteSubmission {
            prepared_transaction: prepared.prepared_transaction.clone(),
            party_signatures,
            submission_id: Uuid::new_v4().to_string(),
            user_id: self.config.user_id.clone(),
            hashing_scheme_version: prepared.hashing_scheme_version.clone(),
        };
        let token = self.bearer().await?;
        let result = self
            .transport
            .execute_submission_and_wait(token.as_deref(), &request)
            .await;
        self.observe("execute_submission_and_wait", result)
    }

    /// Interactive Submission: prepare, have `signer` sign the hash on
    /// behalf of `party`, then execute.
    pub async fn submit_interactive(
        &self,
        commands: &Commands,
        party: &str,
        signer: &dyn Signer,
    ) -> LedgerResult<ExecuteResponse> {
        let prepared = self.prepare_submission(commands).await?;
        let der = signer.sign_der(&prepared.prepared_transaction_hash).await?;
        let signature = PartySignature {
            party: party.to_string(),
            signatures: vec![Signature {
                format: SignatureFormat::Der,
                signature: der,
                signed_by: signer.fingerprint(),
                signing_algorithm_spec: SigningAlgorithm::EcDsaSha256,
            }],
        };
        debug!(
            party,
            command_id = %commands.command_id,
            hashing_scheme = %prepared.hashing_scheme_version,
            "[cb-01] Executing externally signed submission"
        );
        self.execute_submission_and_wait(&prepared, vec![signature])
            .await
    }

    /// Raw update subscription.
    pub async fn get_updates(&self, request: &UpdatesRequest) -> LedgerResult<UpdateStream> {
        let token = self.bearer().await?;
        let result = self.transport.updates(token.as_deref(), request).await;
        self.observe("updates", result)
    }

    /// Configured synchronizer, or the first connected one.
    pub async fn synchronizer_id(&self) -> LedgerResult<String> {
        if let Some(id) = self.synchronizer.read().clone() {
            return Ok(id);
        }

        let token = self.bearer().await?;
        let result = self.transport.connected_synchronizers(token.as_deref()).await;
        let id = self
            .observe("connected_synchronizers", result)?
            .into_iter()
            .next()
            .ok_or(LedgerError::NoSynchronizer)?;
        info!(synchronizer_id = %id, "[cb-01] Discovered synchronizer");
        *self.synchronizer.write() = Some(id.clone());
        Ok(id)
    }

    /// Allocate a participant-hosted party.
    pub async fn allocate_party(&self, hint: &str) -> LedgerResult<PartyDetails> {
        let token = self.bearer().await?;
        let result = self.transport.allocate_party(token.as_deref(), hint).await;
        self.observe("allocate_party", result)
    }

    /// Generate the topology transactions for an external party.
    pub async fn generate_external_party_topology(
        &self,
        hint: &str,
        public_key_spki_der: &[u8],
    ) -> LedgerResult<ExternalPartyTopology> {
        let synchronizer = self.synchronizer_id().await?;
        let token = self.bearer().await?;
        let result = self
            .transport
            .generate_external_party_topology(
                token.as_deref(),
                &synchronizer,
                hint,
                public_key_spki_der,
            )
            .await;
        self.observe("generate_external_party_topology", result)
    }

    /// Submit the signed topology of an external party.
    pub async fn allocate_external_party(
        &self,
        topology: &ExternalPartyTopology,
        signature: &Signature,
    ) -> LedgerResult<PartyId> {
        let synchronizer = self.synchronizer_id().await?;
        let token = self.bearer().await?;
        let result = self
            .transport
            .allocate_external_party(token.as_deref(), &synchronizer, topology, signature)
            .await;
        self.observe("allocate_external_party", result)
    }

    /// Grant rights to the session user.
    pub async fn grant_user_rights(&self, rights: &[UserRight]) -> LedgerResult<()> {
        let token = self.bearer().await?;
        let result = self
            .transport
            .grant_user_rights(token.as_deref(), &self.config.user_id, rights)
            .await;
        self.observe("grant_user_rights", result)
    }
}
