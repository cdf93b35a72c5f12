//! Bridge component configuration.

use super::errors::{BridgeError, BridgeResult};
use cb_01_ledger_session::TemplateId;
use shared_types::PartyId;
use std::env;
use std::time::Duration;

/// Module of the bridge templates.
pub const BRIDGE_MODULE: &str = "Bridge.Contracts";

/// Deposit processing choice on the bridge config.
pub const PROCESS_DEPOSIT_CHOICE: &str = "ProcessDepositAndMint";

/// Withdrawal initiation choice on the bridge config.
pub const INITIATE_WITHDRAWAL_CHOICE: &str = "InitiateWithdrawal";

/// Completion choice on a withdrawal event.
pub const COMPLETE_WITHDRAWAL_CHOICE: &str = "CompleteWithdrawal";

/// First reconnect delay of the withdrawal stream.
pub const DEFAULT_BACKOFF_FLOOR: Duration = Duration::from_secs(5);

/// Largest reconnect delay of the withdrawal stream.
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(60);

/// Default buffer between the stream task and its consumer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Bridge component configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Package of the bridge templates (id or `#name`).
    pub package_id: String,
    /// Relayer party operating the bridge.
    pub operator_party: PartyId,
    /// Symbol of the bridged token.
    pub symbol: String,
    /// First reconnect delay.
    pub backoff_floor: Duration,
    /// Reconnect delay cap.
    pub backoff_cap: Duration,
    /// Withdrawal channel capacity.
    pub channel_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            package_id: String::new(),
            operator_party: String::new(),
            symbol: String::new(),
            backoff_floor: DEFAULT_BACKOFF_FLOOR,
            backoff_cap: DEFAULT_BACKOFF_CAP,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl BridgeConfig {
    /// Read configuration from the environment.
    ///
    /// # Environment Variables
    ///
    /// - `CB_BRIDGE_PACKAGE_ID`: package of the bridge templates
    /// - `CB_RELAYER_PARTY`: operator party
    /// - `CB_TOKEN_SYMBOL`: bridged token symbol
    /// - `CB_STREAM_BACKOFF_SECS`: first reconnect delay (default: 5)
    /// - `CB_STREAM_BACKOFF_MAX_SECS`: reconnect delay cap (default: 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secs = |name: &str, default: Duration| {
            env::var(name)
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };
        Self {
            package_id: env::var("CB_BRIDGE_PACKAGE_ID").unwrap_or_default(),
            operator_party: env::var("CB_RELAYER_PARTY").unwrap_or_default(),
            symbol: env::var("CB_TOKEN_SYMBOL").unwrap_or_default(),
            backoff_floor: secs("CB_STREAM_BACKOFF_SECS", defaults.backoff_floor),
            backoff_cap: secs("CB_STREAM_BACKOFF_MAX_SECS", defaults.backoff_cap),
            channel_capacity: defaults.channel_capacity,
        }
    }

    /// Fail fast on missing identifiers or inconsistent backoff.
    pub fn validate(&self) -> BridgeResult<()> {
        if self.package_id.is_empty() {
            return Err(BridgeError::Config("bridge package id is not set".into()));
        }
        if self.operator_party.is_empty() {
            return Err(BridgeError::Config("operator party is not set".into()));
        }
        if self.symbol.is_empty() {
            return Err(BridgeError::Config("token symbol is not set".into()));
        }
        if self.backoff_floor.is_zero() || self.backoff_cap < self.backoff_floor {
            return Err(BridgeError::Config(format!(
                "invalid stream backoff {:?}..{:?}",
                self.backoff_floor, self.backoff_cap
            )));
        }
        if self.channel_capacity == 0 {
            return Err(BridgeError::Config("channel capacity must be positive".into()));
        }
        Ok(())
    }

    fn template(&self, entity: &str) -> TemplateId {
        TemplateId::new(&self.package_id, BRIDGE_MODULE, entity)
    }

    /// Bridge configuration contract.
    pub fn bridge_config_template(&self) -> TemplateId {
        self.template("BridgeConfig")
    }

    /// Deposit awaiting its mint.
    pub fn pending_deposit_template(&self) -> TemplateId {
        self.template("PendingDeposit")
    }

    /// Record of a processed deposit.
    pub fn deposit_receipt_template(&self) -> TemplateId {
        self.template("DepositReceipt")
    }

    /// Withdrawal lifecycle contract.
    pub fn withdrawal_event_template(&self) -> TemplateId {
        self.template("WithdrawalEvent")
    }
}
