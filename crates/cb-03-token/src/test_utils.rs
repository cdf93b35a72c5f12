//! # Token Choices on the In-Memory Ledger
//!
//! Ledger-side behaviour of the token templates for `MockLedger`: the mint
//! and burn choices of the token config and the transfer factory choice.
//! Downstream crates use these to run token flows in their tests.

use crate::domain::{
    Holding, InstrumentId, TokenConfig, TokenConfigContract, BURN_CHOICE, MINT_CHOICE,
    TRANSFER_CHOICE,
};
use cb_01_ledger_session::test_utils::{ChoiceOutcome, MockLedger};
use cb_01_ledger_session::{LedgerError, LedgerResult, Record, StatusCode, Value};
use chrono::Utc;
use shared_types::{Amount, ContractId};

/// Parse a numeric choice argument the way the ledger would.
pub fn amount_arg(args: &Record, label: &str) -> LedgerResult<Amount> {
    Amount::parse(&args.numeric(label))
        .map_err(|e| LedgerError::rejected(StatusCode::InvalidArgument, e.to_string()))
}

fn precondition(message: impl Into<String>) -> LedgerError {
    LedgerError::rejected(StatusCode::FailedPrecondition, message)
}

fn audit_event(
    issuer: &str,
    party_label: &str,
    party: &str,
    amount: &Amount,
    symbol: &str,
    reference: (&str, &str),
    fingerprint: &str,
) -> Record {
    Record::new()
        .with("issuer", Value::party(issuer))
        .with(party_label, Value::party(party))
        .with("amount", Value::numeric(amount))
        .with("tokenSymbol", Value::text(symbol))
        .with(reference.0, Value::text(reference.1))
        .with("userFingerprint", Value::text(fingerprint))
        .with("timestamp", Value::timestamp(Utc::now()))
        .with("auditObservers", Value::party_list(Vec::<String>::new()))
}

/// Add the effects of minting `amount` to `recipient`: a new holding and a
/// mint audit event.
pub fn mint_effects(
    outcome: ChoiceOutcome,
    config: &TokenConfig,
    token: &TokenConfigContract,
    recipient: &str,
    amount: &Amount,
    evm_tx_hash: &str,
    fingerprint: &str,
) -> ChoiceOutcome {
    outcome
        .create(
            config.holding_template(),
            Holding::create_arguments(
                &token.issuer,
                recipient,
                amount,
                &token.instrument,
                &token.symbol,
            ),
            &[&token.issuer],
        )
        .create(
            config.mint_event_template(),
            audit_event(
                &token.issuer,
                "recipient",
                recipient,
                amount,
                &token.symbol,
                ("evmTxHash", evm_tx_hash),
                fingerprint,
            ),
            &[&token.issuer],
        )
}

/// Add the effects of burning `amount` from `holding`: the holding is
/// archived, change is returned to the owner and a burn audit event is
/// created. Fails like the ledger would on a locked or short holding.
pub fn burn_effects(
    outcome: ChoiceOutcome,
    config: &TokenConfig,
    holding: &Holding,
    amount: &Amount,
    evm_destination: &str,
    fingerprint: &str,
) -> LedgerResult<ChoiceOutcome> {
    let held = holding.amount().map_err(|e| precondition(e.to_string()))?;
    if holding.locked {
        return Err(precondition("holding is locked"));
    }
    if &held < amount {
        return Err(precondition("burn exceeds holding amount"));
    }

    let mut outcome = outcome.archive(holding.contract_id.clone());
    let change = &held - amount;
    if change.is_positive() {
        outcome = outcome.create(
            config.holding_template(),
            Holding::create_arguments(
                &holding.issuer,
                &holding.owner,
                &change,
                &holding.instrument,
                &holding.symbol,
            ),
            &[&holding.issuer],
        );
    }
    Ok(outcome.create(
        config.burn_event_template(),
        audit_event(
            &holding.issuer,
            "burner",
            &holding.owner,
            amount,
            &holding.symbol,
            ("evmDestination", evm_destination),
            fingerprint,
        ),
        &[&holding.issuer],
    ))
}

/// Register the mint, burn and transfer choices.
pub fn install_token_choices(ledger: &MockLedger, config: &TokenConfig) {
    let cfg = config.clone();
    ledger.on_choice(MINT_CHOICE, move |ctx| {
        let args = ctx.args();
        let token = TokenConfigContract::from_created(ctx.target);
        let amount = amount_arg(&args, "amount")?;
        Ok(mint_effects(
            ChoiceOutcome::nonconsuming(),
            &cfg,
            &token,
            &args.party("recipient"),
            &amount,
            &args.text("evmTxHash"),
            &args.text("userFingerprint"),
        ))
    });

    let cfg = config.clone();
    ledger.on_choice(BURN_CHOICE, move |ctx| {
        let args = ctx.args();
        let amount = amount_arg(&args, "amount")?;
        let holding_cid = args.contract_id("holdingCid");
        let holding = ctx
            .lookup(&holding_cid)
            .map(Holding::from_created)
            .ok_or_else(|| LedgerError::rejected(StatusCode::NotFound, holding_cid.clone()))?;
        burn_effects(
            ChoiceOutcome::nonconsuming(),
            &cfg,
            &holding,
            &amount,
            &args.text("evmDestination"),
            &args.text("userFingerprint"),
        )
    });

    let cfg = config.clone();
    ledger.on_choice(TRANSFER_CHOICE, move |ctx| {
        let args = ctx.args();
        let amount = amount_arg(&args, "amount")?;
        let sender = args.party("sender");
        let receiver = args.party("receiver");
        if args.timestamp("executeBefore") < Utc::now() {
            return Err(precondition("transfer instruction expired"));
        }
        let instrument_record = args.record("instrumentId");
        let instrument = InstrumentId::new(
            instrument_record.party("admin"),
            instrument_record.text("id"),
        );
        let inputs: Vec<ContractId> = args
            .field("inputHoldingCids")
            .and_then(Value::as_list)
            .unwrap_or_default()
            .iter()
            .filter_map(Value::as_contract_id)
            .map(str::to_string)
            .collect();

        let mut outcome = ChoiceOutcome::nonconsuming();
        let mut total = Amount::zero();
        let mut symbol = instrument.id.clone();
        for cid in &inputs {
            let holding = ctx
                .lookup(cid)
                .map(Holding::from_created)
                .ok_or_else(|| LedgerError::rejected(StatusCode::NotFound, cid.clone()))?;
            if holding.owner != sender || holding.locked || holding.instrument != instrument {
                return Err(precondition(format!("holding {} not spendable", cid)));
            }
            total += &holding.amount().map_err(|e| precondition(e.to_string()))?;
            symbol = holding.symbol.clone();
            outcome = outcome.archive(cid.clone());
        }
        if total < amount {
            return Err(precondition("inputs do not cover the transfer"));
        }

        outcome = outcome.create(
            cfg.holding_template(),
            Holding::create_arguments(&instrument.admin, &receiver, &amount, &instrument, &symbol),
            &[&instrument.admin],
        );
        let change = &total - &amount;
        if change.is_positive() {
            outcome = outcome.create(
                cfg.holding_template(),
                Holding::create_arguments(&instrument.admin, &sender, &change, &instrument, &symbol),
                &[&instrument.admin],
            );
        }
        Ok(outcome)
    });
}

/// Seed the config contract and transfer factory of `symbol`; returns the
/// config contract id.
pub fn seed_token(ledger: &MockLedger, config: &TokenConfig, symbol: &str) -> ContractId {
    let issuer = config.issuer_party.as_str();
    let cid = ledger.add_contract(
        config.token_config_template(),
        TokenConfigContract::create_arguments(issuer, symbol),
        &[issuer],
    );
    if ledger.active(&config.transfer_factory_template()).is_empty() {
        ledger.add_contract(
            config.transfer_factory_template(),
            Record::new().with("admin", Value::party(issuer)),
            &[issuer],
        );
    }
    cid
}

/// Seed an unlocked holding.
pub fn seed_holding(
    ledger: &MockLedger,
    config: &TokenConfig,
    owner: &str,
    amount: &str,
    symbol: &str,
) -> ContractId {
    let issuer = config.issuer_party.as_str();
    let amount = Amount::parse(amount).unwrap_or_default();
    ledger.add_contract(
        config.holding_template(),
        Holding::create_arguments(
            issuer,
            owner,
            &amount,
            &InstrumentId::new(issuer, symbol),
            symbol,
        ),
        &[issuer],
    )
}
