//! Token component configuration.

use super::errors::{TokenError, TokenResult};
use cb_01_ledger_session::TemplateId;
use chrono::Duration;
use shared_types::PartyId;
use std::env;

/// Module of the token templates.
pub const TOKEN_MODULE: &str = "CIP56.Token";

/// Module of the audit event templates.
pub const EVENTS_MODULE: &str = "CIP56.Events";

/// Mint choice on the token config.
pub const MINT_CHOICE: &str = "Mint";

/// Burn choice on the token config.
pub const BURN_CHOICE: &str = "Burn";

/// Transfer choice on the transfer factory.
pub const TRANSFER_CHOICE: &str = "TransferFactory_Transfer";

/// Default validity window of a transfer instruction.
pub const DEFAULT_TRANSFER_VALIDITY_SECS: i64 = 3600;

/// Token component configuration.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Package of the token templates (id or `#name`).
    pub package_id: String,
    /// Relayer party: token issuer and instrument admin.
    pub issuer_party: PartyId,
    /// Parties added as observers on audit events.
    pub audit_observers: Vec<PartyId>,
    /// `executeBefore - requestedAt` of transfers.
    pub transfer_validity: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            package_id: String::new(),
            issuer_party: String::new(),
            audit_observers: Vec::new(),
            transfer_validity: Duration::seconds(DEFAULT_TRANSFER_VALIDITY_SECS),
        }
    }
}

impl TokenConfig {
    /// Read configuration from the environment.
    ///
    /// # Environment Variables
    ///
    /// - `CB_TOKEN_PACKAGE_ID`: package of the token templates
    /// - `CB_RELAYER_PARTY`: issuer party
    /// - `CB_AUDIT_OBSERVERS`: comma-separated observer parties
    /// - `CB_TRANSFER_VALIDITY_SECS`: transfer validity (default: 3600)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            package_id: env::var("CB_TOKEN_PACKAGE_ID").unwrap_or_default(),
            issuer_party: env::var("CB_RELAYER_PARTY").unwrap_or_default(),
            audit_observers: env::var("CB_AUDIT_OBSERVERS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            transfer_validity: env::var("CB_TRANSFER_VALIDITY_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::seconds)
                .unwrap_or(defaults.transfer_validity),
        }
    }

    /// Fail fast on missing identifiers.
    pub fn validate(&self) -> TokenResult<()> {
        if self.package_id.is_empty() {
            return Err(TokenError::Config("token package id is not set".into()));
        }
        if self.issuer_party.is_empty() {
            return Err(TokenError::Config("issuer party is not set".into()));
        }
        if self.transfer_validity <= Duration::zero() {
            return Err(TokenError::Config("transfer validity must be positive".into()));
        }
        Ok(())
    }

    fn template(&self, module: &str, entity: &str) -> TemplateId {
        TemplateId::new(&self.package_id, module, entity)
    }

    /// Per-symbol configuration contract.
    pub fn token_config_template(&self) -> TemplateId {
        self.template(TOKEN_MODULE, "TokenConfig")
    }

    /// Holding contract.
    pub fn holding_template(&self) -> TemplateId {
        self.template(TOKEN_MODULE, "Holding")
    }

    /// Transfer factory contract.
    pub fn transfer_factory_template(&self) -> TemplateId {
        self.template(TOKEN_MODULE, "TransferFactory")
    }

    /// Mint audit event.
    pub fn mint_event_template(&self) -> TemplateId {
        self.template(EVENTS_MODULE, "MintEvent")
    }

    /// Burn audit event.
    pub fn burn_event_template(&self) -> TemplateId {
        self.template(EVENTS_MODULE, "BurnEvent")
    }
}
