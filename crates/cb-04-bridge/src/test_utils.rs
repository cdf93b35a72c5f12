//! # Bridge Choices on the In-Memory Ledger
//!
//! Ledger-side behaviour of the bridge templates for `MockLedger`: deposit
//! processing and withdrawal initiation on the bridge config, and withdrawal
//! completion on the withdrawal event.

use crate::domain::{
    BridgeConfig, BridgeConfigContract, PendingDeposit, WithdrawalEvent, WithdrawalStatus,
    COMPLETE_WITHDRAWAL_CHOICE, INITIATE_WITHDRAWAL_CHOICE, PROCESS_DEPOSIT_CHOICE,
};
use cb_01_ledger_session::test_utils::{ChoiceOutcome, ExerciseContext, MockLedger};
use cb_01_ledger_session::{CreatedEvent, LedgerError, LedgerResult, Record, StatusCode, Value};
use cb_03_token::test_utils::{amount_arg, burn_effects, mint_effects};
use cb_03_token::{Holding, TokenConfig, TokenConfigContract};
use chrono::Utc;
use shared_types::ContractId;

fn precondition(message: impl Into<String>) -> LedgerError {
    LedgerError::rejected(StatusCode::FailedPrecondition, message)
}

fn lookup<'a>(ctx: &'a ExerciseContext<'_>, contract_id: &str) -> LedgerResult<&'a CreatedEvent> {
    ctx.lookup(contract_id).ok_or_else(|| {
        LedgerError::rejected(StatusCode::NotFound, format!("contract {} not found", contract_id))
    })
}

/// Register the deposit and withdrawal choices.
pub fn install_bridge_choices(ledger: &MockLedger, bridge: &BridgeConfig, token: &TokenConfig) {
    let (cfg, token_cfg) = (bridge.clone(), token.clone());
    ledger.on_choice(PROCESS_DEPOSIT_CHOICE, move |ctx| {
        let args = ctx.args();
        let bridge_contract = BridgeConfigContract::from_created(ctx.target);
        let deposit_cid = args.contract_id("depositCid");
        let deposit = PendingDeposit::from_created(lookup(ctx, &deposit_cid)?);
        let mapping = &lookup(ctx, &args.contract_id("mappingCid"))?.create_arguments;
        let user_party = mapping.party("userParty");
        if mapping.text("fingerprint") != deposit.fingerprint {
            return Err(precondition("deposit fingerprint does not match mapping"));
        }
        let token = TokenConfigContract::from_created(lookup(ctx, &bridge_contract.token_config_cid)?);
        let amount = deposit.amount().map_err(|e| precondition(e.to_string()))?;

        let receipt = Record::new()
            .with("operator", Value::party(&bridge_contract.operator))
            .with("recipient", Value::party(&user_party))
            .with("userFingerprint", Value::text(&deposit.fingerprint))
            .with("amount", Value::numeric(&amount))
            .with("evmTxHash", Value::text(&deposit.evm_tx_hash))
            .with("createdAt", Value::timestamp(Utc::now()));
        Ok(mint_effects(
            ChoiceOutcome::nonconsuming().archive(deposit_cid),
            &token_cfg,
            &token,
            &user_party,
            &amount,
            &deposit.evm_tx_hash,
            &deposit.fingerprint,
        )
        .create(
            cfg.deposit_receipt_template(),
            receipt,
            &[&bridge_contract.operator],
        ))
    });

    let (cfg, token_cfg) = (bridge.clone(), token.clone());
    ledger.on_choice(INITIATE_WITHDRAWAL_CHOICE, move |ctx| {
        let args = ctx.args();
        let bridge_contract = BridgeConfigContract::from_created(ctx.target);
        let mapping = &lookup(ctx, &args.contract_id("mappingCid"))?.create_arguments;
        let user_party = mapping.party("userParty");
        let fingerprint = mapping.text("fingerprint");
        let holding = Holding::from_created(lookup(ctx, &args.contract_id("holdingCid"))?);
        if holding.owner != user_party {
            return Err(precondition("holding is not owned by the withdrawing party"));
        }
        let amount = amount_arg(&args, "amount")?;
        let evm_destination = args.text("evmDestination");

        let outcome = burn_effects(
            ChoiceOutcome::nonconsuming(),
            &token_cfg,
            &holding,
            &amount,
            &evm_destination,
            &fingerprint,
        )?;
        let event = WithdrawalEvent {
            contract_id: ContractId::new(),
            operator: bridge_contract.operator.clone(),
            user_party,
            evm_destination,
            amount: amount.to_string(),
            fingerprint,
            status: WithdrawalStatus::Pending,
            evm_tx_hash: None,
            offset: 0,
        };
        Ok(outcome.create(
            cfg.withdrawal_event_template(),
            event.to_arguments(),
            &[&bridge_contract.operator],
        ))
    });

    let cfg = bridge.clone();
    ledger.on_choice(COMPLETE_WITHDRAWAL_CHOICE, move |ctx| {
        let event = WithdrawalEvent::from_created(ctx.target);
        if event.status.is_terminal() {
            return Err(precondition(format!(
                "withdrawal already {}",
                event.status.as_str().to_ascii_lowercase()
            )));
        }
        let operator = event.operator.clone();
        let completed = WithdrawalEvent {
            status: WithdrawalStatus::Completed,
            evm_tx_hash: Some(ctx.args().text("evmTxHash")),
            ..event
        };
        Ok(ChoiceOutcome::consuming().create(
            cfg.withdrawal_event_template(),
            completed.to_arguments(),
            &[&operator],
        ))
    });
}

/// Seed the bridge config pointing at `token_config_cid`.
pub fn seed_bridge(ledger: &MockLedger, bridge: &BridgeConfig, token_config_cid: &str) -> ContractId {
    let operator = bridge.operator_party.as_str();
    ledger.add_contract(
        bridge.bridge_config_template(),
        BridgeConfigContract::create_arguments(operator, &bridge.symbol, token_config_cid),
        &[operator],
    )
}
