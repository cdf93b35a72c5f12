//! # Identity Entities

use cb_01_ledger_session::{CreatedEvent, Record, Value};
use shared_types::{ContractId, PartyId};

/// Binding of an EVM-derived fingerprint to a ledger party.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FingerprintMapping {
    /// Mapping contract.
    pub contract_id: ContractId,
    /// Relayer party that issued the mapping.
    pub issuer: PartyId,
    /// Party the fingerprint resolves to.
    pub user_party: PartyId,
    /// Normalized fingerprint.
    pub fingerprint: String,
    /// EVM address the fingerprint was derived from.
    pub evm_address: String,
}

impl FingerprintMapping {
    /// Decode a mapping contract.
    pub fn from_created(event: &CreatedEvent) -> Self {
        let args = &event.create_arguments;
        Self {
            contract_id: event.contract_id.clone(),
            issuer: args.party("issuer"),
            user_party: args.party("userParty"),
            fingerprint: args.text("fingerprint"),
            evm_address: args.text("evmAddress"),
        }
    }

    /// Create arguments of a mapping contract.
    pub fn create_arguments(
        issuer: &str,
        user_party: &str,
        fingerprint: &str,
        evm_address: &str,
    ) -> Record {
        Record::new()
            .with("issuer", Value::party(issuer))
            .with("userParty", Value::party(user_party))
            .with("fingerprint", Value::text(fingerprint))
            .with("evmAddress", Value::text(evm_address))
    }
}
