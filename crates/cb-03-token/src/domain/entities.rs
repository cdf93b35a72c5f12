//! # Token Entities
//!
//! Typed views over the token contracts. Decoding is lenient: a missing
//! field decodes to its zero value and only amounts are validated, on use.

use cb_01_ledger_session::{CreatedEvent, Metadata, Record, Value};
use chrono::{DateTime, Utc};
use shared_types::{Amount, AmountError, BridgeEventKind, BridgeEventRecord, ContractId, PartyId};

/// Instrument of a holding: administering party plus instrument id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct InstrumentId {
    /// Instrument administrator (the token issuer).
    pub admin: PartyId,
    /// Instrument identifier.
    pub id: String,
}

impl InstrumentId {
    /// Build an instrument id.
    pub fn new(admin: impl Into<PartyId>, id: impl Into<String>) -> Self {
        Self {
            admin: admin.into(),
            id: id.into(),
        }
    }

    fn from_record(record: &Record) -> Self {
        Self {
            admin: record.party("admin"),
            id: record.text("id"),
        }
    }

    /// Ledger encoding.
    pub fn to_value(&self) -> Value {
        Record::new()
            .with("admin", Value::party(&self.admin))
            .with("id", Value::text(&self.id))
            .into()
    }
}

/// A token holding.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Holding {
    /// Holding contract.
    pub contract_id: ContractId,
    /// Issuer party.
    pub issuer: PartyId,
    /// Owner party.
    pub owner: PartyId,
    /// Quantity as carried on the ledger.
    pub amount: String,
    /// Instrument of the holding.
    pub instrument: InstrumentId,
    /// Symbol from metadata, falling back to the instrument id.
    pub symbol: String,
    /// Locked holdings are not spendable.
    pub locked: bool,
}

impl Holding {
    /// Decode a holding contract.
    pub fn from_created(event: &CreatedEvent) -> Self {
        let args = &event.create_arguments;
        let instrument = InstrumentId::from_record(&args.record("instrumentId"));
        let symbol = match args.metadata("meta").symbol() {
            "" => instrument.id.clone(),
            s => s.to_string(),
        };
        Self {
            contract_id: event.contract_id.clone(),
            issuer: args.party("issuer"),
            owner: args.party("owner"),
            amount: args.numeric("amount"),
            instrument,
            symbol,
            locked: args.optional("lock").is_some(),
        }
    }

    /// Parsed quantity.
    pub fn amount(&self) -> Result<Amount, AmountError> {
        Amount::parse(&self.amount)
    }

    /// Create arguments of an unlocked holding.
    pub fn create_arguments(
        issuer: &str,
        owner: &str,
        amount: &Amount,
        instrument: &InstrumentId,
        symbol: &str,
    ) -> Record {
        Record::new()
            .with("issuer", Value::party(issuer))
            .with("owner", Value::party(owner))
            .with("amount", Value::numeric(amount))
            .with("instrumentId", instrument.to_value())
            .with("meta", Metadata::with_symbol(symbol).to_value())
            .with("lock", Value::optional(None))
    }
}

/// Per-symbol token configuration contract; mint and burn are its choices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenConfigContract {
    /// Config contract.
    pub contract_id: ContractId,
    /// Issuer party.
    pub issuer: PartyId,
    /// Token symbol.
    pub symbol: String,
    /// Instrument minted by this config.
    pub instrument: InstrumentId,
}

impl TokenConfigContract {
    /// Decode a config contract.
    pub fn from_created(event: &CreatedEvent) -> Self {
        let args = &event.create_arguments;
        let instrument = InstrumentId::from_record(&args.record("instrumentId"));
        let symbol = match args.metadata("meta").symbol() {
            "" => instrument.id.clone(),
            s => s.to_string(),
        };
        Self {
            contract_id: event.contract_id.clone(),
            issuer: args.party("issuer"),
            symbol,
            instrument,
        }
    }

    /// Create arguments of a config contract.
    pub fn create_arguments(issuer: &str, symbol: &str) -> Record {
        Record::new()
            .with("issuer", Value::party(issuer))
            .with("instrumentId", InstrumentId::new(issuer, symbol).to_value())
            .with("meta", Metadata::with_symbol(symbol).to_value())
    }
}

/// Audit record of a mint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MintEvent {
    /// Event contract.
    pub contract_id: ContractId,
    /// Issuer party.
    pub issuer: PartyId,
    /// Party credited.
    pub recipient: PartyId,
    /// Quantity minted.
    pub amount: String,
    /// Token symbol.
    pub symbol: String,
    /// EVM deposit transaction.
    pub evm_tx_hash: String,
    /// Recipient fingerprint.
    pub user_fingerprint: String,
    /// Ledger time of the mint.
    pub timestamp: DateTime<Utc>,
    /// Extra observers.
    pub audit_observers: Vec<PartyId>,
    /// Offset the event was created at.
    pub offset: i64,
}

impl MintEvent {
    /// Decode a mint event contract.
    pub fn from_created(event: &CreatedEvent) -> Self {
        let args = &event.create_arguments;
        Self {
            contract_id: event.contract_id.clone(),
            issuer: args.party("issuer"),
            recipient: args.party("recipient"),
            amount: args.numeric("amount"),
            symbol: args.text("tokenSymbol"),
            evm_tx_hash: args.text("evmTxHash"),
            user_fingerprint: args.text("userFingerprint"),
            timestamp: args.timestamp("timestamp"),
            audit_observers: args.party_list("auditObservers"),
            offset: event.offset,
        }
    }

    /// Store record; fails when the amount does not parse.
    pub fn to_record(&self) -> Result<BridgeEventRecord, AmountError> {
        Ok(BridgeEventRecord {
            contract_id: self.contract_id.clone(),
            kind: BridgeEventKind::Mint,
            party_id: self.recipient.clone(),
            fingerprint: self.user_fingerprint.clone(),
            symbol: self.symbol.clone(),
            amount: Amount::parse(&self.amount)?,
            evm_reference: self.evm_tx_hash.clone(),
            timestamp: self.timestamp,
            offset: self.offset,
        })
    }
}

/// Audit record of a burn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BurnEvent {
    /// Event contract.
    pub contract_id: ContractId,
    /// Issuer party.
    pub issuer: PartyId,
    /// Party debited.
    pub burner: PartyId,
    /// Quantity burned.
    pub amount: String,
    /// Token symbol.
    pub symbol: String,
    /// EVM address receiving the released funds.
    pub evm_destination: String,
    /// Burner fingerprint.
    pub user_fingerprint: String,
    /// Ledger time of the burn.
    pub timestamp: DateTime<Utc>,
    /// Extra observers.
    pub audit_observers: Vec<PartyId>,
    /// Offset the event was created at.
    pub offset: i64,
}

impl BurnEvent {
    /// Decode a burn event contract.
    pub fn from_created(event: &CreatedEvent) -> Self {
        let args = &event.create_arguments;
        Self {
            contract_id: event.contract_id.clone(),
            issuer: args.party("issuer"),
            burner: args.party("burner"),
            amount: args.numeric("amount"),
            symbol: args.text("tokenSymbol"),
            evm_destination: args.text("evmDestination"),
            user_fingerprint: args.text("userFingerprint"),
            timestamp: args.timestamp("timestamp"),
            audit_observers: args.party_list("auditObservers"),
            offset: event.offset,
        }
    }

    /// Store record; fails when the amount does not parse.
    pub fn to_record(&self) -> Result<BridgeEventRecord, AmountError> {
        Ok(BridgeEventRecord {
            contract_id: self.contract_id.clone(),
            kind: BridgeEventKind::Burn,
            party_id: self.burner.clone(),
            fingerprint: self.user_fingerprint.clone(),
            symbol: self.symbol.clone(),
            amount: Amount::parse(&self.amount)?,
            evm_reference: self.evm_destination.clone(),
            timestamp: self.timestamp,
            offset: self.offset,
        })
    }
}

/// Result of a mint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MintResult {
    /// Holding created for the recipient.
    pub holding: Holding,
    /// Audit event, when the transaction carried one.
    pub event_cid: Option<ContractId>,
    /// Ledger transaction.
    pub update_id: String,
}

/// Result of a transfer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferResult {
    /// Ledger transaction.
    pub update_id: String,
    /// Holdings spent.
    pub inputs: Vec<ContractId>,
    /// Transferred quantity.
    pub amount: Amount,
    /// Token symbol.
    pub symbol: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_01_ledger_session::TemplateId;

    fn created(arguments: Record) -> CreatedEvent {
        CreatedEvent {
            offset: 7,
            contract_id: "h1".into(),
            template_id: TemplateId::new("pkg", "CIP56.Token", "Holding"),
            create_arguments: arguments,
            ..Default::default()
        }
    }

    #[test]
    fn test_holding_decode() {
        let instrument = InstrumentId::new("issuer", "DEMO");
        let args = Holding::create_arguments(
            "issuer",
            "alice",
            &Amount::parse("12.5").unwrap(),
            &instrument,
            "DEMO",
        );
        let holding = Holding::from_created(&created(args));
        assert_eq!(holding.owner, "alice");
        assert_eq!(holding.amount().unwrap(), Amount::parse("12.5").unwrap());
        assert_eq!(holding.instrument, instrument);
        assert_eq!(holding.symbol, "DEMO");
        assert!(!holding.locked);
    }

    #[test]
    fn test_holding_symbol_falls_back_to_instrument() {
        let args = Record::new()
            .with("owner", Value::party("alice"))
            .with("instrumentId", InstrumentId::new("issuer", "DEMO").to_value())
            .with("lock", Value::optional(Some(Record::new().into())));
        let holding = Holding::from_created(&created(args));
        assert_eq!(holding.symbol, "DEMO");
        assert!(holding.locked);
        assert_eq!(holding.amount, "0");
    }

    #[test]
    fn test_mint_event_record() {
        let args = Record::new()
            .with("issuer", Value::party("issuer"))
            .with("recipient", Value::party("alice"))
            .with("amount", Value::Numeric("3.25".into()))
            .with("tokenSymbol", Value::text("DEMO"))
            .with("evmTxHash", Value::text("0xabc"))
            .with("userFingerprint", Value::text("0xfp"));
        let event = MintEvent::from_created(&created(args));
        let record = event.to_record().unwrap();
        assert_eq!(record.kind, BridgeEventKind::Mint);
        assert_eq!(record.party_id, "alice");
        assert_eq!(record.amount.to_string(), "3.25");
        assert_eq!(record.offset, 7);

        let broken = MintEvent {
            amount: "abc".into(),
            ..event
        };
        tokio_test::assert_err!(broken.to_record());
    }
}
