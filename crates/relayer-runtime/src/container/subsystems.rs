//! # Subsystem Container
//!
//! Holds all subsystem instances, wired in dependency order:
//!
//! ```text
//! Level 0: Ledger Session (cb-01)
//! Level 1: Identity (cb-02)
//! Level 2: Token (cb-03), Bridge (cb-04), both over Identity
//! Level 3: Reconciliation (cb-05)
//! ```

use std::sync::Arc;

use tracing::info;

use cb_01_ledger_session::{
    JsonApiTransport, KeyResolver, LedgerTransport, LedgerSession, OAuthTokenProvider,
    Secp256k1Signer, StaticKeyResolver, StaticTokenProvider, TokenProvider,
};
use cb_02_identity::IdentityService;
use cb_03_token::TokenService;
use cb_04_bridge::BridgeService;
use cb_05_reconciliation::ReconciliationService;
use shared_types::BalanceStore;

use crate::adapters::MeteredTokenProvider;
use crate::container::config::{ConfigError, RelayerConfig};

/// Central container holding all subsystem instances.
pub struct SubsystemContainer {
    /// Configuration the container was built from.
    pub config: RelayerConfig,

    /// Ledger Session (Subsystem 1)
    pub session: Arc<LedgerSession>,

    /// Identity (Subsystem 2)
    pub identity: Arc<IdentityService>,

    /// Token (Subsystem 3)
    pub token: Arc<TokenService>,

    /// Bridge (Subsystem 4)
    pub bridge: Arc<BridgeService>,

    /// Reconciliation (Subsystem 5)
    pub reconciler: Arc<ReconciliationService>,

    /// Off-ledger balance cache shared by token and reconciliation.
    pub store: Arc<dyn BalanceStore>,
}

impl SubsystemContainer {
    /// Wire all subsystems over an existing transport.
    pub fn new(
        config: RelayerConfig,
        transport: Arc<dyn LedgerTransport>,
        auth: Option<Arc<dyn TokenProvider>>,
        store: Arc<dyn BalanceStore>,
        keys: Option<Arc<dyn KeyResolver>>,
    ) -> Result<Self, ConfigError> {
        // Level 0
        let session = Arc::new(LedgerSession::new(config.ledger.clone(), transport, auth));

        // Level 1
        let identity = Arc::new(IdentityService::new(
            session.clone(),
            config.identity.clone(),
        )?);

        // Level 2
        let mut token = TokenService::new(session.clone(), config.token.clone(), identity.clone())?
            .with_store(store.clone());
        if let Some(keys) = keys {
            token = token.with_key_resolver(keys);
        }
        let token = Arc::new(token);
        let bridge = Arc::new(BridgeService::new(
            session.clone(),
            identity.clone(),
            config.bridge.clone(),
            config.token.clone(),
        )?);

        // Level 3
        let reconciler = Arc::new(ReconciliationService::new(
            token.clone(),
            store.clone(),
            config.reconciler.clone(),
        )?);

        info!(
            relayer = %config.bridge.operator_party,
            symbol = %config.bridge.symbol,
            "Subsystems initialized"
        );

        Ok(Self {
            config,
            session,
            identity,
            token,
            bridge,
            reconciler,
            store,
        })
    }

    /// Wire all subsystems over the JSON ledger API.
    ///
    /// OAuth client credentials take precedence over a static token; with
    /// neither the session sends no bearer token.
    pub fn connect(config: RelayerConfig, store: Arc<dyn BalanceStore>) -> Result<Self, ConfigError> {
        config.validate()?;

        let auth: Option<Arc<dyn TokenProvider>> = if config.auth.is_configured() {
            info!(token_url = %config.auth.token_url, "[cb-01] Using OAuth client credentials");
            let provider = OAuthTokenProvider::new(config.auth.clone())?;
            Some(Arc::new(MeteredTokenProvider::new(Arc::new(provider))))
        } else if let Some(token) = &config.static_token {
            info!("[cb-01] Using static bearer token");
            let provider = StaticTokenProvider::new(token.clone());
            Some(Arc::new(MeteredTokenProvider::new(Arc::new(provider))))
        } else {
            info!("[cb-01] No ledger auth configured");
            None
        };

        let keys = match &config.relayer_key_hex {
            Some(key) => {
                let signer = Secp256k1Signer::from_hex(key)
                    .map_err(|e| ConfigError::RelayerKey(e.to_string()))?;
                let resolver = StaticKeyResolver::new()
                    .with_signer(config.bridge.operator_party.clone(), Arc::new(signer));
                Some(Arc::new(resolver) as Arc<dyn KeyResolver>)
            }
            None => None,
        };

        let transport = JsonApiTransport::new(&config.ledger)?;
        Self::new(config, Arc::new(transport), auth, store, keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_01_ledger_session::test_utils::MockLedger;
    use shared_types::InMemoryBalanceStore;

    fn config() -> RelayerConfig {
        crate::container::config::tests::valid()
    }

    #[test]
    fn test_container_wires_all_subsystems() {
        let container = SubsystemContainer::new(
            config(),
            Arc::new(MockLedger::new()),
            None,
            Arc::new(InMemoryBalanceStore::new()),
            None,
        )
        .unwrap();

        assert_eq!(container.bridge.config().symbol, "DEMO");
        assert_eq!(container.token.config().issuer_party, "relayer::1220");
        assert_eq!(container.reconciler.config().symbols, vec!["DEMO".to_string()]);
    }

    #[test]
    fn test_invalid_component_config_rejected() {
        let mut config = config();
        config.bridge.package_id.clear();
        let result = SubsystemContainer::new(
            config,
            Arc::new(MockLedger::new()),
            None,
            Arc::new(InMemoryBalanceStore::new()),
            None,
        );
        assert!(matches!(result, Err(ConfigError::Bridge(_))));
    }

    #[test]
    fn test_connect_rejects_bad_key() {
        let mut config = config();
        config.relayer_key_hex = Some("zz".repeat(32));
        let result = SubsystemContainer::connect(config, Arc::new(InMemoryBalanceStore::new()));
        assert!(matches!(result, Err(ConfigError::RelayerKey(_))));
    }
}
