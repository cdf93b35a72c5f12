//! # Bridge Service
//!
//! Deposit state machine (none → PendingDeposit → Holding + DepositReceipt)
//! and withdrawal initiation and completion.

use crate::domain::{
    BridgeConfig, BridgeConfigContract, BridgeError, BridgeResult, DepositReceipt,
    PendingDeposit, WithdrawalEvent, WithdrawalStatus, COMPLETE_WITHDRAWAL_CHOICE,
    INITIATE_WITHDRAWAL_CHOICE, PROCESS_DEPOSIT_CHOICE,
};
use crate::ports::{BridgeApi, DepositOutcome};
use crate::stream::WithdrawalStream;
use async_trait::async_trait;
use cb_01_ledger_session::{
    Command, Commands, CreatedEvent, LedgerSession, Record, StatusCode, TemplateId, Value,
};
use cb_02_identity::IdentityApi;
use cb_03_token::{Holding, TokenConfig};
use chrono::Utc;
use shared_types::{Amount, Offset};
use std::sync::Arc;
use tracing::{debug, info};

/// Bridge component.
pub struct BridgeService {
    session: Arc<LedgerSession>,
    identity: Arc<dyn IdentityApi>,
    config: BridgeConfig,
    token: TokenConfig,
}

impl BridgeService {
    /// Create the service; `token` names the templates the bridge mints.
    /// Deposit fingerprints are resolved through `identity`.
    pub fn new(
        session: Arc<LedgerSession>,
        identity: Arc<dyn IdentityApi>,
        config: BridgeConfig,
        token: TokenConfig,
    ) -> BridgeResult<Self> {
        config.validate()?;
        Ok(Self {
            session,
            identity,
            config,
            token,
        })
    }

    /// Service configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Start forwarding pending withdrawals created after `from_offset`.
    pub fn stream_withdrawal_events(&self, from_offset: Offset) -> WithdrawalStream {
        WithdrawalStream::spawn(self.session.clone(), self.config.clone(), from_offset)
    }

    async fn operator_contracts(&self, template: &TemplateId) -> BridgeResult<Vec<CreatedEvent>> {
        Ok(self
            .session
            .get_active_contracts(std::slice::from_ref(&self.config.operator_party), template)
            .await?)
    }

    fn operator_commands(&self, command: Command) -> Commands {
        self.session.commands(
            std::slice::from_ref(&self.config.operator_party),
            vec![command],
        )
    }
}

#[async_trait]
impl BridgeApi for BridgeService {
    async fn get_bridge_config(&self) -> BridgeResult<BridgeConfigContract> {
        self.operator_contracts(&self.config.bridge_config_template())
            .await?
            .iter()
            .map(BridgeConfigContract::from_created)
            .find(|c| c.operator == self.config.operator_party && c.symbol == self.config.symbol)
            .ok_or_else(|| BridgeError::BridgeConfigNotFound(self.config.operator_party.clone()))
    }

    async fn is_deposit_processed(&self, evm_tx_hash: &str) -> BridgeResult<bool> {
        let pending = self
            .operator_contracts(&self.config.pending_deposit_template())
            .await?;
        if pending
            .iter()
            .map(PendingDeposit::from_created)
            .any(|d| d.evm_tx_hash.eq_ignore_ascii_case(evm_tx_hash))
        {
            return Ok(true);
        }

        let receipts = self
            .operator_contracts(&self.config.deposit_receipt_template())
            .await?;
        Ok(receipts
            .iter()
            .map(DepositReceipt::from_created)
            .any(|r| r.evm_tx_hash.eq_ignore_ascii_case(evm_tx_hash)))
    }

    async fn create_pending_deposit(
        &self,
        fingerprint: &str,
        amount: &Amount,
        evm_tx_hash: &str,
    ) -> BridgeResult<PendingDeposit> {
        if !amount.is_positive() {
            return Err(BridgeError::InvalidAmount(amount.to_string()));
        }
        // The deposit carries the mapping's canonical form, which the
        // processing choice compares verbatim.
        let mapping = self.identity.get_fingerprint_mapping(fingerprint).await?;
        let template = self.config.pending_deposit_template();
        let arguments = PendingDeposit::create_arguments(
            &self.config.operator_party,
            &mapping.fingerprint,
            amount,
            &self.config.symbol,
            evm_tx_hash,
            Utc::now(),
        );
        let commands = self.operator_commands(Command::create(template.clone(), arguments));
        let tx = self.session.submit_and_wait_for_transaction(&commands).await?;

        let deposit = tx
            .find_created(&template)
            .map(PendingDeposit::from_created)
            .ok_or_else(|| BridgeError::PendingDepositNotCreated(evm_tx_hash.to_string()))?;
        info!(
            fingerprint = %mapping.fingerprint,
            user = %mapping.user_party,
            amount = %amount,
            evm_tx_hash,
            contract_id = %deposit.contract_id,
            "[cb-04] Pending deposit created"
        );
        Ok(deposit)
    }

    async fn process_deposit_and_mint(
        &self,
        deposit_cid: &str,
        mapping_cid: &str,
    ) -> BridgeResult<DepositOutcome> {
        let bridge = self.get_bridge_config().await?;
        let argument = Record::new()
            .with("depositCid", Value::contract_id(deposit_cid))
            .with("mappingCid", Value::contract_id(mapping_cid));
        let commands = self.operator_commands(Command::exercise(
            self.config.bridge_config_template(),
            bridge.contract_id,
            PROCESS_DEPOSIT_CHOICE,
            argument,
        ));
        let tx = self.session.submit_and_wait_for_transaction(&commands).await?;

        let holding = tx
            .find_created(&self.token.holding_template())
            .map(Holding::from_created)
            .ok_or_else(|| BridgeError::MintNotProduced(tx.update_id.clone()))?;
        let receipt_cid = tx
            .find_created(&self.config.deposit_receipt_template())
            .map(|r| r.contract_id.clone());
        info!(
            deposit = deposit_cid,
            holding = %holding.contract_id,
            owner = %holding.owner,
            amount = %holding.amount,
            "[cb-04] Deposit minted"
        );
        Ok(DepositOutcome {
            holding,
            receipt_cid,
            update_id: tx.update_id,
        })
    }

    async fn initiate_withdrawal(
        &self,
        mapping_cid: &str,
        holding_cid: &str,
        amount: &Amount,
        evm_destination: &str,
    ) -> BridgeResult<WithdrawalEvent> {
        if !amount.is_positive() {
            return Err(BridgeError::InvalidAmount(amount.to_string()));
        }
        let bridge = self.get_bridge_config().await?;
        let argument = Record::new()
            .with("mappingCid", Value::contract_id(mapping_cid))
            .with("holdingCid", Value::contract_id(holding_cid))
            .with("amount", Value::numeric(amount))
            .with("evmDestination", Value::text(evm_destination));
        let commands = self.operator_commands(Command::exercise(
            self.config.bridge_config_template(),
            bridge.contract_id,
            INITIATE_WITHDRAWAL_CHOICE,
            argument,
        ));
        let tx = self.session.submit_and_wait_for_transaction(&commands).await?;

        let event = tx
            .find_created(&self.config.withdrawal_event_template())
            .map(WithdrawalEvent::from_created)
            .ok_or_else(|| BridgeError::WithdrawalNotCreated(tx.update_id.clone()))?;
        info!(
            contract_id = %event.contract_id,
            user = %event.user_party,
            amount = %amount,
            evm_destination,
            "[cb-04] Withdrawal initiated"
        );
        Ok(event)
    }

    async fn complete_withdrawal(&self, event_cid: &str, evm_tx_hash: &str) -> BridgeResult<()> {
        let argument = Record::new().with("evmTxHash", Value::text(evm_tx_hash));
        let commands = self.operator_commands(Command::exercise(
            self.config.withdrawal_event_template(),
            event_cid,
            COMPLETE_WITHDRAWAL_CHOICE,
            argument,
        ));

        let err: BridgeError = match self.session.submit_and_wait(&commands).await {
            Ok(_) => {
                info!(contract_id = event_cid, evm_tx_hash, "[cb-04] Withdrawal completed");
                return Ok(());
            }
            Err(err) => err.into(),
        };
        if err.is_already_done() {
            debug!(contract_id = event_cid, "[cb-04] Withdrawal already completed");
            return Ok(());
        }

        // A retry after a lost response finds the event archived; the
        // completed successor carries the same release transaction.
        if let BridgeError::Ledger(ledger_err) = &err {
            if ledger_err.code() == Some(StatusCode::NotFound) {
                let completed = self.list_withdrawal_events().await?.into_iter().any(|e| {
                    e.status == WithdrawalStatus::Completed
                        && e.evm_tx_hash
                            .as_deref()
                            .is_some_and(|h| h.eq_ignore_ascii_case(evm_tx_hash))
                });
                if completed {
                    debug!(
                        contract_id = event_cid,
                        evm_tx_hash,
                        "[cb-04] Withdrawal already completed by an earlier attempt"
                    );
                    return Ok(());
                }
            }
        }
        Err(err)
    }

    async fn list_withdrawal_events(&self) -> BridgeResult<Vec<WithdrawalEvent>> {
        Ok(self
            .operator_contracts(&self.config.withdrawal_event_template())
            .await?
            .iter()
            .map(WithdrawalEvent::from_created)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{install_bridge_choices, seed_bridge};
    use cb_01_ledger_session::test_utils::{ChoiceOutcome, MockLedger};
    use cb_01_ledger_session::LedgerConfig;
    use cb_02_identity::{IdentityApi, IdentityConfig, IdentityError, IdentityService};
    use cb_03_token::test_utils::{install_token_choices, seed_holding, seed_token};
    use cb_03_token::{TokenApi, TokenService};

    const RELAYER: &str = "relayer::1220";
    const ALICE: &str = "alice::1220";
    const FINGERPRINT: &str = "0xa11ce";

    fn token_config() -> TokenConfig {
        TokenConfig {
            package_id: "#token".into(),
            issuer_party: RELAYER.into(),
            ..Default::default()
        }
    }

    fn bridge_config() -> BridgeConfig {
        BridgeConfig {
            package_id: "#bridge".into(),
            operator_party: RELAYER.into(),
            symbol: "DEMO".into(),
            ..Default::default()
        }
    }

    struct Fixture {
        ledger: Arc<MockLedger>,
        identity: Arc<IdentityService>,
        bridge: BridgeService,
        token: TokenService,
        mapping_cid: String,
    }

    fn identity(session: &Arc<LedgerSession>) -> Arc<IdentityService> {
        Arc::new(
            IdentityService::new(
                session.clone(),
                IdentityConfig {
                    package_id: "#common".into(),
                    issuer_party: RELAYER.into(),
                },
            )
            .unwrap(),
        )
    }

    async fn fixture() -> Fixture {
        let ledger = Arc::new(MockLedger::new());
        install_token_choices(&ledger, &token_config());
        install_bridge_choices(&ledger, &bridge_config(), &token_config());
        let token_cid = seed_token(&ledger, &token_config(), "DEMO");
        seed_bridge(&ledger, &bridge_config(), &token_cid);

        let session = Arc::new(LedgerSession::new(
            LedgerConfig::default(),
            ledger.clone(),
            None,
        ));
        let identity = identity(&session);
        let mapping = identity
            .create_fingerprint_mapping(ALICE, FINGERPRINT, "0x01")
            .await
            .unwrap();

        Fixture {
            bridge: BridgeService::new(
                session.clone(),
                identity.clone(),
                bridge_config(),
                token_config(),
            )
            .unwrap(),
            token: TokenService::new(session, token_config(), identity.clone()).unwrap(),
            identity,
            ledger,
            mapping_cid: mapping.contract_id,
        }
    }

    fn amount(s: &str) -> Amount {
        Amount::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_deposit_flow() {
        let fx = fixture().await;
        assert!(!fx.bridge.is_deposit_processed("0xdep").await.unwrap());

        let deposit = fx
            .bridge
            .create_pending_deposit(FINGERPRINT, &amount("25.5"), "0xdep")
            .await
            .unwrap();
        assert!(fx.bridge.is_deposit_processed("0xDEP").await.unwrap());

        let outcome = fx
            .bridge
            .process_deposit_and_mint(&deposit.contract_id, &fx.mapping_cid)
            .await
            .unwrap();
        assert_eq!(outcome.holding.owner, ALICE);
        assert_eq!(outcome.holding.amount().unwrap(), amount("25.5"));
        assert!(outcome.receipt_cid.is_some());

        // Receipt keeps the deposit deduplicated once the pending one is gone.
        assert!(fx
            .ledger
            .active(&bridge_config().pending_deposit_template())
            .is_empty());
        assert!(fx.bridge.is_deposit_processed("0xdep").await.unwrap());
        assert_eq!(fx.token.get_balance(ALICE, "DEMO").await.unwrap(), "25.5");
        assert_eq!(fx.token.get_mint_events().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_deposit_fingerprint_mismatch_leaves_deposit() {
        let fx = fixture().await;
        fx.identity
            .create_fingerprint_mapping("bob::1220", "0xb0b", "0x02")
            .await
            .unwrap();
        let deposit = fx
            .bridge
            .create_pending_deposit("0xb0b", &amount("1"), "0xdep")
            .await
            .unwrap();
        // Bob's deposit presented with Alice's mapping.
        assert!(matches!(
            fx.bridge
                .process_deposit_and_mint(&deposit.contract_id, &fx.mapping_cid)
                .await,
            Err(BridgeError::Ledger(_))
        ));
        assert_eq!(
            fx.ledger.active(&bridge_config().pending_deposit_template()).len(),
            1
        );
        assert_eq!(fx.token.get_total_supply("DEMO").await.unwrap(), "0");
    }

    #[tokio::test]
    async fn test_deposit_records_canonical_fingerprint() {
        let fx = fixture().await;
        let deposit = fx
            .bridge
            .create_pending_deposit("A11CE", &amount("2"), "0xdep")
            .await
            .unwrap();
        assert_eq!(deposit.fingerprint, FINGERPRINT);

        let outcome = fx
            .bridge
            .process_deposit_and_mint(&deposit.contract_id, &fx.mapping_cid)
            .await
            .unwrap();
        assert_eq!(outcome.holding.owner, ALICE);
        let mints = fx.token.get_mint_events().await.unwrap();
        assert_eq!(mints[0].user_fingerprint, FINGERPRINT);
    }

    #[tokio::test]
    async fn test_deposit_for_unmapped_fingerprint_fails_fast() {
        let fx = fixture().await;
        assert!(matches!(
            fx.bridge
                .create_pending_deposit("0xdead", &amount("1"), "0xdep")
                .await,
            Err(BridgeError::Identity(IdentityError::MappingNotFound(_)))
        ));
        assert!(fx
            .ledger
            .active(&bridge_config().pending_deposit_template())
            .is_empty());
    }

    #[tokio::test]
    async fn test_deposit_without_mint_is_reported() {
        let fx = fixture().await;
        fx.ledger
            .on_choice(PROCESS_DEPOSIT_CHOICE, |_| Ok(ChoiceOutcome::nonconsuming()));
        let deposit = fx
            .bridge
            .create_pending_deposit(FINGERPRINT, &amount("1"), "0xdep")
            .await
            .unwrap();
        assert!(matches!(
            fx.bridge
                .process_deposit_and_mint(&deposit.contract_id, &fx.mapping_cid)
                .await,
            Err(BridgeError::MintNotProduced(_))
        ));
    }

    #[tokio::test]
    async fn test_pending_deposit_rejects_zero_amount() {
        let fx = fixture().await;
        assert!(matches!(
            fx.bridge
                .create_pending_deposit(FINGERPRINT, &Amount::zero(), "0xdep")
                .await,
            Err(BridgeError::InvalidAmount(_))
        ));
    }

    #[tokio::test]
    async fn test_withdrawal_lifecycle_is_idempotent() {
        let fx = fixture().await;
        let holding = seed_holding(&fx.ledger, &token_config(), ALICE, "10", "DEMO");

        let event = fx
            .bridge
            .initiate_withdrawal(&fx.mapping_cid, &holding, &amount("4"), "0xdest")
            .await
            .unwrap();
        assert!(event.is_pending());
        assert_eq!(event.user_party, ALICE);
        assert_eq!(event.amount, "4");
        assert_eq!(fx.token.get_balance(ALICE, "DEMO").await.unwrap(), "6");
        assert_eq!(fx.token.get_burn_events().await.unwrap().len(), 1);

        fx.bridge
            .complete_withdrawal(&event.contract_id, "0xrelease")
            .await
            .unwrap();
        // Retry with the archived pending event.
        fx.bridge
            .complete_withdrawal(&event.contract_id, "0xrelease")
            .await
            .unwrap();

        let events = fx.bridge.list_withdrawal_events().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, WithdrawalStatus::Completed);
        assert_eq!(events[0].evm_tx_hash.as_deref(), Some("0xrelease"));

        // Completing the completed successor is rejected as "already".
        fx.bridge
            .complete_withdrawal(&events[0].contract_id, "0xrelease")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_complete_unknown_withdrawal_fails() {
        let fx = fixture().await;
        assert!(matches!(
            fx.bridge.complete_withdrawal("missing", "0xrelease").await,
            Err(BridgeError::Ledger(_))
        ));
    }

    #[tokio::test]
    async fn test_withdrawal_exceeding_holding_fails() {
        let fx = fixture().await;
        let holding = seed_holding(&fx.ledger, &token_config(), ALICE, "1", "DEMO");
        tokio_test::assert_err!(
            fx.bridge
                .initiate_withdrawal(&fx.mapping_cid, &holding, &amount("2"), "0xdest")
                .await
        );
        assert!(fx.bridge.list_withdrawal_events().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_bridge_config() {
        let fx = fixture().await;
        let session = Arc::new(LedgerSession::new(
            LedgerConfig::default(),
            fx.ledger.clone(),
            None,
        ));
        let other = BridgeService::new(
            session,
            fx.identity.clone(),
            BridgeConfig {
                symbol: "OTHER".into(),
                ..bridge_config()
            },
            token_config(),
        )
        .unwrap();
        assert!(matches!(
            other.get_bridge_config().await,
            Err(BridgeError::BridgeConfigNotFound(_))
        ));
    }

    #[test]
    fn test_config_validation() {
        let ledger = Arc::new(MockLedger::new());
        let session = Arc::new(LedgerSession::new(LedgerConfig::default(), ledger, None));
        let identity = identity(&session);
        let bad = BridgeConfig {
            backoff_cap: std::time::Duration::from_secs(1),
            ..bridge_config()
        };
        assert!(matches!(
            BridgeService::new(session, identity, bad, token_config()),
            Err(BridgeError::Config(_))
        ));
    }
}
