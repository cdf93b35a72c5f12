//! # Token Service
//!
//! Mint and burn through the token config choices, holding queries with
//! decimal aggregation, and transfers signed by the sender's own key.

use crate::algorithms::select_holdings;
use crate::domain::{
    BurnEvent, Holding, MintEvent, MintResult, TokenConfig, TokenConfigContract, TokenError,
    TokenResult, TransferResult, BURN_CHOICE, MINT_CHOICE, TRANSFER_CHOICE,
};
use crate::ports::{BurnRequest, BurnResult, MintRequest, TokenApi};
use async_trait::async_trait;
use cb_01_ledger_session::{
    Command, CreatedEvent, KeyResolver, LedgerSession, Metadata, Record, TemplateId, Value,
};
use cb_02_identity::IdentityApi;
use chrono::Utc;
use shared_types::{sum_decimal_strings, Amount, BalanceStore, ContractId, PartyId};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Token component.
pub struct TokenService {
    session: Arc<LedgerSession>,
    config: TokenConfig,
    identity: Arc<dyn IdentityApi>,
    keys: Option<Arc<dyn KeyResolver>>,
    store: Option<Arc<dyn BalanceStore>>,
}

impl TokenService {
    /// Create the service; fails on incomplete configuration.
    pub fn new(
        session: Arc<LedgerSession>,
        config: TokenConfig,
        identity: Arc<dyn IdentityApi>,
    ) -> TokenResult<Self> {
        config.validate()?;
        Ok(Self {
            session,
            config,
            identity,
            keys: None,
            store: None,
        })
    }

    /// Signers used for transfers.
    pub fn with_key_resolver(mut self, keys: Arc<dyn KeyResolver>) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Balance cache updated after fingerprint transfers.
    pub fn with_store(mut self, store: Arc<dyn BalanceStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Service configuration.
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    async fn issuer_contracts(&self, template: &TemplateId) -> TokenResult<Vec<CreatedEvent>> {
        Ok(self
            .session
            .get_active_contracts(std::slice::from_ref(&self.config.issuer_party), template)
            .await?)
    }

    async fn config_cid(&self, supplied: &Option<ContractId>, symbol: &str) -> TokenResult<ContractId> {
        match supplied {
            Some(cid) => Ok(cid.clone()),
            None => Ok(self.get_token_config(symbol).await?.contract_id),
        }
    }

    async fn find_transfer_factory(&self, admin: &str) -> TokenResult<ContractId> {
        self.issuer_contracts(&self.config.transfer_factory_template())
            .await?
            .into_iter()
            .find(|c| c.create_arguments.party("admin") == admin)
            .map(|c| c.contract_id)
            .ok_or_else(|| TokenError::TransferFactoryNotFound(admin.to_string()))
    }

    fn sum_amounts<'a>(holdings: impl IntoIterator<Item = &'a Holding>) -> String {
        let (total, rejected) = sum_decimal_strings(holdings.into_iter().map(|h| h.amount.as_str()));
        for amount in rejected {
            warn!(amount, "[cb-03] Ignoring holding with invalid amount");
        }
        total.to_string()
    }
}

#[async_trait]
impl TokenApi for TokenService {
    async fn get_token_config(&self, symbol: &str) -> TokenResult<TokenConfigContract> {
        self.issuer_contracts(&self.config.token_config_template())
            .await?
            .iter()
            .map(TokenConfigContract::from_created)
            .find(|c| c.symbol == symbol)
            .ok_or_else(|| TokenError::TokenConfigNotFound(symbol.to_string()))
    }

    async fn mint(&self, request: &MintRequest) -> TokenResult<MintResult> {
        if !request.amount.is_positive() {
            return Err(TokenError::InvalidAmount(request.amount.to_string()));
        }
        let config_cid = self.config_cid(&request.config_cid, &request.symbol).await?;
        let argument = Record::new()
            .with("recipient", Value::party(&request.recipient))
            .with("amount", Value::numeric(&request.amount))
            .with("evmTxHash", Value::text(&request.evm_tx_hash))
            .with("userFingerprint", Value::text(&request.user_fingerprint))
            .with("auditObservers", Value::party_list(self.config.audit_observers.iter().cloned()));
        let commands = self.session.commands(
            std::slice::from_ref(&self.config.issuer_party),
            vec![Command::exercise(
                self.config.token_config_template(),
                config_cid,
                MINT_CHOICE,
                argument,
            )],
        );
        let tx = self.session.submit_and_wait_for_transaction(&commands).await?;

        let holding = tx
            .find_created(&self.config.holding_template())
            .map(Holding::from_created)
            .ok_or_else(|| TokenError::HoldingNotFound(tx.update_id.clone()))?;
        let event_cid = tx
            .find_created(&self.config.mint_event_template())
            .map(|e| e.contract_id.clone());

        info!(
            recipient = %request.recipient,
            amount = %request.amount,
            symbol = %request.symbol,
            evm_tx_hash = %request.evm_tx_hash,
            holding = %holding.contract_id,
            "[cb-03] Minted"
        );
        Ok(MintResult {
            holding,
            event_cid,
            update_id: tx.update_id,
        })
    }

    async fn burn(&self, request: &BurnRequest) -> TokenResult<BurnResult> {
        if !request.amount.is_positive() {
            return Err(TokenError::InvalidAmount(request.amount.to_string()));
        }
        let config_cid = self.config_cid(&request.config_cid, &request.symbol).await?;
        let argument = Record::new()
            .with("holdingCid", Value::contract_id(&request.holding_cid))
            .with("amount", Value::numeric(&request.amount))
            .with("evmDestination", Value::text(&request.evm_destination))
            .with("userFingerprint", Value::text(&request.user_fingerprint))
            .with("auditObservers", Value::party_list(self.config.audit_observers.iter().cloned()));
        let commands = self.session.commands(
            &[self.config.issuer_party.clone(), request.owner.clone()],
            vec![Command::exercise(
                self.config.token_config_template(),
                config_cid,
                BURN_CHOICE,
                argument,
            )],
        );
        let tx = self.session.submit_and_wait_for_transaction(&commands).await?;
        let event_cid = tx
            .find_created(&self.config.burn_event_template())
            .map(|e| e.contract_id.clone());

        info!(
            owner = %request.owner,
            holding = %request.holding_cid,
            amount = %request.amount,
            symbol = %request.symbol,
            evm_destination = %request.evm_destination,
            "[cb-03] Burned"
        );
        Ok(BurnResult {
            update_id: tx.update_id,
            event_cid,
        })
    }

    async fn get_all_holdings(&self) -> TokenResult<Vec<Holding>> {
        Ok(self
            .issuer_contracts(&self.config.holding_template())
            .await?
            .iter()
            .map(Holding::from_created)
            .collect())
    }

    async fn get_holdings(&self, owner: &str, symbol: &str) -> TokenResult<Vec<Holding>> {
        Ok(self
            .get_all_holdings()
            .await?
            .into_iter()
            .filter(|h| h.owner == owner && h.symbol == symbol)
            .collect())
    }

    async fn get_balance(&self, owner: &str, symbol: &str) -> TokenResult<String> {
        let holdings = self.get_holdings(owner, symbol).await?;
        Ok(Self::sum_amounts(&holdings))
    }

    async fn get_total_supply(&self, symbol: &str) -> TokenResult<String> {
        let holdings = self.get_all_holdings().await?;
        Ok(Self::sum_amounts(holdings.iter().filter(|h| h.symbol == symbol)))
    }

    async fn transfer(
        &self,
        from: &str,
        to: &str,
        amount: &Amount,
        symbol: &str,
    ) -> TokenResult<TransferResult> {
        let signer = self
            .keys
            .as_ref()
            .and_then(|keys| keys.resolve(from))
            .ok_or_else(|| TokenError::NoSignerConfigured(from.to_string()))?;
        if !amount.is_positive() {
            return Err(TokenError::InvalidAmount(amount.to_string()));
        }

        let holdings = self.get_holdings(from, symbol).await?;
        let selection = select_holdings(&holdings, amount)?;
        debug!(
            from,
            inputs = selection.contract_ids.len(),
            selected = %selection.total,
            change = %selection.change(amount),
            "[cb-03] Holdings selected"
        );
        let factory = self.find_transfer_factory(&selection.instrument.admin).await?;

        let requested_at = Utc::now();
        let argument = Record::new()
            .with("sender", Value::party(from))
            .with("receiver", Value::party(to))
            .with("amount", Value::numeric(amount))
            .with("instrumentId", selection.instrument.to_value())
            .with("requestedAt", Value::timestamp(requested_at))
            .with(
                "executeBefore",
                Value::timestamp(requested_at + self.config.transfer_validity),
            )
            .with(
                "inputHoldingCids",
                Value::contract_id_list(selection.contract_ids.iter().cloned()),
            )
            .with("meta", Metadata::with_symbol(symbol).to_value());
        let sender: PartyId = from.to_string();
        let commands = self.session.commands(
            std::slice::from_ref(&sender),
            vec![Command::exercise(
                self.config.transfer_factory_template(),
                factory,
                TRANSFER_CHOICE,
                argument,
            )],
        );
        let response = self
            .session
            .submit_interactive(&commands, from, signer.as_ref())
            .await?;

        info!(
            from,
            to,
            amount = %amount,
            symbol,
            update_id = %response.update_id,
            "[cb-03] Transfer executed"
        );
        Ok(TransferResult {
            update_id: response.update_id,
            inputs: selection.contract_ids,
            amount: amount.clone(),
            symbol: symbol.to_string(),
        })
    }

    async fn transfer_by_fingerprint(
        &self,
        from_fingerprint: &str,
        to_fingerprint: &str,
        amount: &Amount,
        symbol: &str,
    ) -> TokenResult<TransferResult> {
        let from = self.identity.get_fingerprint_mapping(from_fingerprint).await?;
        let to = self.identity.get_fingerprint_mapping(to_fingerprint).await?;
        let result = self
            .transfer(&from.user_party, &to.user_party, amount, symbol)
            .await?;

        // The ledger is authoritative; reconciliation repairs a missed update.
        if let Some(store) = &self.store {
            if let Err(err) = store
                .transfer_balance_by_fingerprint(&from.fingerprint, &to.fingerprint, symbol, amount)
                .await
            {
                warn!(
                    from = %from.fingerprint,
                    to = %to.fingerprint,
                    error = %err,
                    "[cb-03] Balance cache not updated after transfer"
                );
            }
        }
        Ok(result)
    }

    async fn get_mint_events(&self) -> TokenResult<Vec<MintEvent>> {
        Ok(self
            .issuer_contracts(&self.config.mint_event_template())
            .await?
            .iter()
            .map(MintEvent::from_created)
            .collect())
    }

    async fn get_burn_events(&self) -> TokenResult<Vec<BurnEvent>> {
        Ok(self
            .issuer_contracts(&self.config.burn_event_template())
            .await?
            .iter()
            .map(BurnEvent::from_created)
            .collect())
    }
}
