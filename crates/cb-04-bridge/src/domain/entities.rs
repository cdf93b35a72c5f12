//! # Bridge Entities

use cb_01_ledger_session::{CreatedEvent, Record, Value};
use chrono::{DateTime, Utc};
use shared_types::{Amount, AmountError, ContractId, Offset, PartyId};
use std::fmt;

/// Bridge configuration contract operated by the relayer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeConfigContract {
    /// Config contract.
    pub contract_id: ContractId,
    /// Operator (relayer) party.
    pub operator: PartyId,
    /// Bridged token symbol.
    pub symbol: String,
    /// Token config the bridge mints and burns through.
    pub token_config_cid: ContractId,
}

impl BridgeConfigContract {
    /// Decode a bridge config contract.
    pub fn from_created(event: &CreatedEvent) -> Self {
        let args = &event.create_arguments;
        Self {
            contract_id: event.contract_id.clone(),
            operator: args.party("operator"),
            symbol: args.text("tokenSymbol"),
            token_config_cid: args.contract_id("tokenConfigCid"),
        }
    }

    /// Create arguments of a bridge config.
    pub fn create_arguments(operator: &str, symbol: &str, token_config_cid: &str) -> Record {
        Record::new()
            .with("operator", Value::party(operator))
            .with("tokenSymbol", Value::text(symbol))
            .with("tokenConfigCid", Value::contract_id(token_config_cid))
    }
}

/// A deposit observed on the EVM side, not yet minted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingDeposit {
    /// Deposit contract.
    pub contract_id: ContractId,
    /// Operator party.
    pub operator: PartyId,
    /// Depositor fingerprint.
    pub fingerprint: String,
    /// Deposited quantity.
    pub amount: String,
    /// Token symbol.
    pub symbol: String,
    /// EVM deposit transaction (dedup key).
    pub evm_tx_hash: String,
    /// When the deposit was recorded.
    pub created_at: DateTime<Utc>,
}

impl PendingDeposit {
    /// Decode a pending deposit contract.
    pub fn from_created(event: &CreatedEvent) -> Self {
        let args = &event.create_arguments;
        Self {
            contract_id: event.contract_id.clone(),
            operator: args.party("operator"),
            fingerprint: args.text("userFingerprint"),
            amount: args.numeric("amount"),
            symbol: args.text("tokenSymbol"),
            evm_tx_hash: args.text("evmTxHash"),
            created_at: args.timestamp("createdAt"),
        }
    }

    /// Create arguments of a pending deposit.
    pub fn create_arguments(
        operator: &str,
        fingerprint: &str,
        amount: &Amount,
        symbol: &str,
        evm_tx_hash: &str,
        created_at: DateTime<Utc>,
    ) -> Record {
        Record::new()
            .with("operator", Value::party(operator))
            .with("userFingerprint", Value::text(fingerprint))
            .with("amount", Value::numeric(amount))
            .with("tokenSymbol", Value::text(symbol))
            .with("evmTxHash", Value::text(evm_tx_hash))
            .with("createdAt", Value::timestamp(created_at))
    }

    /// Parsed quantity.
    pub fn amount(&self) -> Result<Amount, AmountError> {
        Amount::parse(&self.amount)
    }
}

/// A processed deposit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepositReceipt {
    /// Receipt contract.
    pub contract_id: ContractId,
    /// Operator party.
    pub operator: PartyId,
    /// Party credited.
    pub recipient: PartyId,
    /// Depositor fingerprint.
    pub fingerprint: String,
    /// Minted quantity.
    pub amount: String,
    /// EVM deposit transaction (dedup key).
    pub evm_tx_hash: String,
    /// When the deposit was minted.
    pub created_at: DateTime<Utc>,
}

impl DepositReceipt {
    /// Decode a receipt contract.
    pub fn from_created(event: &CreatedEvent) -> Self {
        let args = &event.create_arguments;
        Self {
            contract_id: event.contract_id.clone(),
            operator: args.party("operator"),
            recipient: args.party("recipient"),
            fingerprint: args.text("userFingerprint"),
            amount: args.numeric("amount"),
            evm_tx_hash: args.text("evmTxHash"),
            created_at: args.timestamp("createdAt"),
        }
    }
}

/// Lifecycle of a withdrawal. Completed and Failed are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WithdrawalStatus {
    /// Burned on the ledger, release on the EVM side outstanding.
    Pending,
    /// Released on the EVM side.
    Completed,
    /// Abandoned.
    Failed,
}

impl WithdrawalStatus {
    /// Constructor name on the ledger.
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "Pending",
            WithdrawalStatus::Completed => "Completed",
            WithdrawalStatus::Failed => "Failed",
        }
    }

    /// Decode a status constructor; unknown constructors are `None`.
    pub fn from_constructor(constructor: &str) -> Option<Self> {
        match constructor {
            "Pending" => Some(WithdrawalStatus::Pending),
            "Completed" => Some(WithdrawalStatus::Completed),
            "Failed" => Some(WithdrawalStatus::Failed),
            _ => None,
        }
    }

    /// Ledger encoding.
    pub fn to_value(&self) -> Value {
        Value::variant(self.as_str(), Value::Unit)
    }

    /// True for Completed and Failed.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WithdrawalStatus::Pending)
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A withdrawal as tracked on the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WithdrawalEvent {
    /// Event contract.
    pub contract_id: ContractId,
    /// Operator party.
    pub operator: PartyId,
    /// Withdrawing party.
    pub user_party: PartyId,
    /// EVM address receiving the funds.
    pub evm_destination: String,
    /// Withdrawn quantity.
    pub amount: String,
    /// Withdrawer fingerprint.
    pub fingerprint: String,
    /// Lifecycle state; unknown constructors decode as Failed.
    pub status: WithdrawalStatus,
    /// EVM release transaction, once completed.
    pub evm_tx_hash: Option<String>,
    /// Offset the contract was created at.
    pub offset: Offset,
}

impl WithdrawalEvent {
    /// Decode a withdrawal event contract.
    pub fn from_created(event: &CreatedEvent) -> Self {
        let args = &event.create_arguments;
        let status = args
            .field("status")
            .and_then(Value::as_variant)
            .and_then(|(constructor, _)| WithdrawalStatus::from_constructor(constructor))
            .unwrap_or(WithdrawalStatus::Failed);
        Self {
            contract_id: event.contract_id.clone(),
            operator: args.party("operator"),
            user_party: args.party("userParty"),
            evm_destination: args.text("evmDestination"),
            amount: args.numeric("amount"),
            fingerprint: args.text("userFingerprint"),
            status,
            evm_tx_hash: args
                .optional("evmTxHash")
                .and_then(Value::as_text)
                .map(str::to_string),
            offset: event.offset,
        }
    }

    /// Create arguments of a withdrawal event.
    pub fn to_arguments(&self) -> Record {
        Record::new()
            .with("operator", Value::party(&self.operator))
            .with("userParty", Value::party(&self.user_party))
            .with("evmDestination", Value::text(&self.evm_destination))
            .with("amount", Value::Numeric(self.amount.clone()))
            .with("userFingerprint", Value::text(&self.fingerprint))
            .with("status", self.status.to_value())
            .with(
                "evmTxHash",
                Value::optional(self.evm_tx_hash.as_ref().map(Value::text)),
            )
    }

    /// True while the EVM release is outstanding.
    pub fn is_pending(&self) -> bool {
        self.status == WithdrawalStatus::Pending
    }
}
