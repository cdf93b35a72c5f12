//! # Relayer Configuration
//!
//! Unified configuration for all subsystems and runtime parameters.
//!
//! ## Requirements
//!
//! - Every component names the same relayer party
//! - OAuth credentials are either complete or absent
//! - Package ids are set for every template family

use bridge_telemetry::TelemetryConfig;
use cb_01_ledger_session::{AuthConfig, AuthError, LedgerConfig, LedgerError};
use cb_02_identity::{IdentityConfig, IdentityError};
use cb_03_token::{TokenConfig, TokenError};
use cb_04_bridge::{BridgeConfig, BridgeError};
use cb_05_reconciliation::{ReconcileError, ReconcilerConfig};
use shared_types::Offset;
use std::env;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Ledger connection settings are invalid.
    #[error("Ledger configuration: {0}")]
    Ledger(#[from] LedgerError),

    /// OAuth credentials are incomplete.
    #[error("Auth configuration: {0}")]
    Auth(#[from] AuthError),

    /// Identity settings are invalid.
    #[error("Identity configuration: {0}")]
    Identity(#[from] IdentityError),

    /// Token settings are invalid.
    #[error("Token configuration: {0}")]
    Token(#[from] TokenError),

    /// Bridge settings are invalid.
    #[error("Bridge configuration: {0}")]
    Bridge(#[from] BridgeError),

    /// Reconciler settings are invalid.
    #[error("Reconciler configuration: {0}")]
    Reconciler(#[from] ReconcileError),

    /// Components disagree with each other.
    #[error("Inconsistent configuration: {0}")]
    Inconsistent(String),

    /// The relayer signing key could not be loaded.
    #[error("Relayer key: {0}")]
    RelayerKey(String),
}

/// Complete relayer configuration.
#[derive(Debug, Clone, Default)]
pub struct RelayerConfig {
    /// Ledger connection.
    pub ledger: LedgerConfig,
    /// OAuth client credentials; unused when not configured.
    pub auth: AuthConfig,
    /// Pre-issued bearer token, used when OAuth is not configured.
    pub static_token: Option<String>,
    /// Hex-encoded secp256k1 key of the relayer party for externally signed
    /// transfers.
    pub relayer_key_hex: Option<String>,
    /// Identity component.
    pub identity: IdentityConfig,
    /// Token component.
    pub token: TokenConfig,
    /// Bridge component.
    pub bridge: BridgeConfig,
    /// Reconciliation engine.
    pub reconciler: ReconcilerConfig,
    /// Logging and metrics.
    pub telemetry: TelemetryConfig,
    /// Run a full reset-and-rebuild before the periodic loop starts.
    pub full_reconcile_on_start: bool,
    /// Offset the withdrawal stream starts after; the ledger end when unset.
    pub stream_from_offset: Option<Offset>,
}

impl RelayerConfig {
    /// Load configuration from the environment.
    ///
    /// Component variables are documented on each component's `from_env`.
    /// Runtime variables:
    ///
    /// - `CB_LEDGER_TOKEN`: pre-issued bearer token
    /// - `CB_RELAYER_KEY_HEX`: relayer secp256k1 key (32 bytes hex)
    /// - `CB_FULL_RECONCILE_ON_START`: rebuild the cache at startup (default: false)
    /// - `CB_STREAM_FROM_OFFSET`: withdrawal stream start offset (default: ledger end)
    pub fn from_env() -> Self {
        let non_empty = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());

        Self {
            ledger: LedgerConfig::from_env(),
            auth: AuthConfig::from_env(),
            static_token: non_empty("CB_LEDGER_TOKEN"),
            relayer_key_hex: non_empty("CB_RELAYER_KEY_HEX"),
            identity: IdentityConfig::from_env(),
            token: TokenConfig::from_env(),
            bridge: BridgeConfig::from_env(),
            reconciler: ReconcilerConfig::from_env(),
            telemetry: TelemetryConfig::from_env(),
            full_reconcile_on_start: non_empty("CB_FULL_RECONCILE_ON_START")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
            stream_from_offset: non_empty("CB_STREAM_FROM_OFFSET").and_then(|v| v.parse().ok()),
        }
    }

    /// Fail fast on anything a subsystem would reject later.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ledger.validate()?;
        if self.auth.is_configured() {
            self.auth.validate()?;
        }
        self.identity.validate()?;
        self.token.validate()?;
        self.bridge.validate()?;
        self.reconciler.validate()?;

        let relayer = &self.bridge.operator_party;
        if &self.identity.issuer_party != relayer || &self.token.issuer_party != relayer {
            return Err(ConfigError::Inconsistent(format!(
                "relayer party differs between components (identity {}, token {}, bridge {})",
                self.identity.issuer_party, self.token.issuer_party, relayer
            )));
        }
        if !self.reconciler.symbols.is_empty()
            && !self.reconciler.symbols.contains(&self.bridge.symbol)
        {
            return Err(ConfigError::Inconsistent(format!(
                "bridged symbol {} is not reconciled",
                self.bridge.symbol
            )));
        }
        if let Some(key) = &self.relayer_key_hex {
            let bytes = hex::decode(key.trim_start_matches("0x"))
                .map_err(|e| ConfigError::RelayerKey(e.to_string()))?;
            if bytes.len() != 32 {
                return Err(ConfigError::RelayerKey(format!(
                    "expected 32 bytes, got {}",
                    bytes.len()
                )));
            }
        }
        Ok(())
    }
}
