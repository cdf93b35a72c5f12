//! Every component wired over one in-memory ledger, the way the relayer
//! runtime wires them over the JSON API.

use std::sync::Arc;

use cb_01_ledger_session::test_utils::MockLedger;
use cb_01_ledger_session::{LedgerConfig, LedgerSession, Secp256k1Signer, StaticKeyResolver};
use cb_02_identity::{IdentityApi, IdentityConfig, IdentityService};
use cb_03_token::test_utils::{install_token_choices, seed_token};
use cb_03_token::{TokenApi, TokenConfig, TokenService};
use cb_04_bridge::test_utils::{install_bridge_choices, seed_bridge};
use cb_04_bridge::{BridgeApi, BridgeConfig, BridgeService};
use cb_05_reconciliation::{ReconcilerConfig, ReconciliationService};
use shared_types::{Amount, ContractId, InMemoryBalanceStore, PartyId, User};

pub const RELAYER: &str = "relayer::1220";
pub const SYMBOL: &str = "DEMO";

pub fn amount(value: &str) -> Amount {
    Amount::parse(value).unwrap()
}

pub fn token_config() -> TokenConfig {
    TokenConfig {
        package_id: "#token".into(),
        issuer_party: RELAYER.into(),
        ..Default::default()
    }
}

pub fn bridge_config() -> BridgeConfig {
    BridgeConfig {
        package_id: "#bridge".into(),
        operator_party: RELAYER.into(),
        symbol: SYMBOL.into(),
        ..Default::default()
    }
}

/// A bridge user with a party, a fingerprint and a mapping contract.
#[derive(Clone, Debug)]
pub struct Account {
    pub party: PartyId,
    pub fingerprint: String,
    pub mapping_cid: ContractId,
}

pub struct Bridge {
    pub ledger: Arc<MockLedger>,
    pub session: Arc<LedgerSession>,
    pub identity: Arc<IdentityService>,
    pub token: Arc<TokenService>,
    pub bridge: BridgeService,
    pub store: Arc<InMemoryBalanceStore>,
    pub engine: ReconciliationService,
}

impl Bridge {
    /// Components over a seeded ledger. `signers` get in-process keys so
    /// they can send transfers.
    pub fn new(signers: &[&str]) -> Self {
        let ledger = Arc::new(MockLedger::new());
        install_token_choices(&ledger, &token_config());
        install_bridge_choices(&ledger, &bridge_config(), &token_config());
        let token_cid = seed_token(&ledger, &token_config(), SYMBOL);
        seed_bridge(&ledger, &bridge_config(), &token_cid);

        let session = Arc::new(LedgerSession::new(
            LedgerConfig::default(),
            ledger.clone(),
            None,
        ));
        let identity = Arc::new(
            IdentityService::new(
                session.clone(),
                IdentityConfig {
                    package_id: "#common".into(),
                    issuer_party: RELAYER.into(),
                },
            )
            .unwrap(),
        );

        let mut keys = StaticKeyResolver::new();
        for party in signers {
            keys.insert(*party, Arc::new(Secp256k1Signer::generate().unwrap()));
        }
        let store = Arc::new(InMemoryBalanceStore::new());
        let token = Arc::new(
            TokenService::new(session.clone(), token_config(), identity.clone())
                .unwrap()
                .with_key_resolver(Arc::new(keys))
                .with_store(store.clone()),
        );
        let engine = ReconciliationService::new(
            token.clone(),
            store.clone(),
            ReconcilerConfig {
                symbols: vec![SYMBOL.into()],
                ..Default::default()
            },
        )
        .unwrap();

        Self {
            bridge: BridgeService::new(
                session.clone(),
                identity.clone(),
                bridge_config(),
                token_config(),
            )
            .unwrap(),
            ledger,
            session,
            identity,
            token,
            store,
            engine,
        }
    }

    /// Map `fingerprint` to `party` on the ledger and register the user
    /// with the store.
    pub async fn onboard(&self, party: &str, fingerprint: &str) -> Account {
        let evm_address = format!("0x{}", fingerprint.trim_start_matches("0x"));
        let mapping = self
            .identity
            .create_fingerprint_mapping(party, fingerprint, &evm_address)
            .await
            .unwrap();
        self.store.register_user(User {
            evm_address,
            fingerprint: fingerprint.into(),
            party_id: Some(party.into()),
            mapping_cid: Some(mapping.contract_id.clone()),
        });
        Account {
            party: party.into(),
            fingerprint: fingerprint.into(),
            mapping_cid: mapping.contract_id,
        }
    }

    /// What the EVM watcher does for every deposit log: skip if the ledger
    /// already knows the transaction, otherwise record and mint. Returns
    /// true when tokens were minted.
    pub async fn relay_deposit(&self, account: &Account, value: &str, evm_tx_hash: &str) -> bool {
        if self.bridge.is_deposit_processed(evm_tx_hash).await.unwrap() {
            return false;
        }
        let deposit = self
            .bridge
            .create_pending_deposit(&account.fingerprint, &amount(value), evm_tx_hash)
            .await
            .unwrap();
        self.bridge
            .process_deposit_and_mint(&deposit.contract_id, &account.mapping_cid)
            .await
            .unwrap();
        true
    }

    /// Ledger balance of `account`.
    pub async fn balance(&self, account: &Account) -> Amount {
        amount(&self.token.get_balance(&account.party, SYMBOL).await.unwrap())
    }

    /// Ledger total supply.
    pub async fn supply(&self) -> Amount {
        amount(&self.token.get_total_supply(SYMBOL).await.unwrap())
    }

    /// Minted minus burned according to the audit trail.
    pub async fn audited_supply(&self) -> Amount {
        let minted: Amount = self
            .token
            .get_mint_events()
            .await
            .unwrap()
            .iter()
            .map(|e| amount(&e.amount))
            .sum();
        let burned: Amount = self
            .token
            .get_burn_events()
            .await
            .unwrap()
            .iter()
            .map(|e| amount(&e.amount))
            .sum();
        minted - burned
    }

    /// Holding contracts of `account`.
    pub async fn holdings(&self, account: &Account) -> Vec<ContractId> {
        self.token
            .get_holdings(&account.party, SYMBOL)
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.contract_id)
            .collect()
    }

    /// The single holding of `account`.
    pub async fn only_holding(&self, account: &Account) -> ContractId {
        let holdings = self.token.get_holdings(&account.party, SYMBOL).await.unwrap();
        assert_eq!(holdings.len(), 1, "expected one holding for {}", account.party);
        holdings[0].contract_id.clone()
    }
}
