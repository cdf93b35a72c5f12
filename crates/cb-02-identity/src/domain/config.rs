//! Identity configuration.

use super::errors::{IdentityError, IdentityResult};
use cb_01_ledger_session::TemplateId;
use shared_types::PartyId;
use std::env;

/// Module of the fingerprint mapping template.
pub const FINGERPRINT_MAPPING_MODULE: &str = "Common.FingerprintAuth";

/// Entity name of the fingerprint mapping template.
pub const FINGERPRINT_MAPPING_ENTITY: &str = "FingerprintMapping";

/// Identity component configuration.
#[derive(Debug, Clone, Default)]
pub struct IdentityConfig {
    /// Package holding the mapping template (id or `#name`).
    pub package_id: String,
    /// Relayer party that issues mappings.
    pub issuer_party: PartyId,
}

impl IdentityConfig {
    /// Read configuration from the environment.
    ///
    /// # Environment Variables
    ///
    /// - `CB_COMMON_PACKAGE_ID`: package of the mapping template
    /// - `CB_RELAYER_PARTY`: issuer party
    pub fn from_env() -> Self {
        Self {
            package_id: env::var("CB_COMMON_PACKAGE_ID").unwrap_or_default(),
            issuer_party: env::var("CB_RELAYER_PARTY").unwrap_or_default(),
        }
    }

    /// Fail fast on missing identifiers.
    pub fn validate(&self) -> IdentityResult<()> {
        if self.package_id.is_empty() {
            return Err(IdentityError::Config("mapping package id is not set".into()));
        }
        if self.issuer_party.is_empty() {
            return Err(IdentityError::Config("issuer party is not set".into()));
        }
        Ok(())
    }

    /// Template of the mapping contract.
    pub fn mapping_template(&self) -> TemplateId {
        TemplateId::new(
            &self.package_id,
            FINGERPRINT_MAPPING_MODULE,
            FINGERPRINT_MAPPING_ENTITY,
        )
    }
}
