//! # Ledger Entities
//!
//! Request and response shapes of the ledger RPC surface, expressed in terms
//! of [`Value`]/[`Record`] rather than the wire encoding.

use super::errors::LedgerResult;
use super::value::{Record, Value};
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use shared_types::{ContractId, Offset, PartyId};
use std::fmt;

/// Fully-qualified template identifier `package:Module.Path:Entity`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TemplateId {
    /// Package id, or a `#package-name` reference.
    pub package_id: String,
    /// Dotted module name.
    pub module_name: String,
    /// Template entity name.
    pub entity_name: String,
}

impl TemplateId {
    /// Build a template id.
    pub fn new(
        package_id: impl Into<String>,
        module_name: impl Into<String>,
        entity_name: impl Into<String>,
    ) -> Self {
        Self {
            package_id: package_id.into(),
            module_name: module_name.into(),
            entity_name: entity_name.into(),
        }
    }

    /// Parse `package:Module:Entity`.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.splitn(3, ':');
        let package_id = parts.next()?;
        let module_name = parts.next()?;
        let entity_name = parts.next()?;
        if package_id.is_empty() || module_name.is_empty() || entity_name.is_empty() {
            return None;
        }
        Some(Self::new(package_id, module_name, entity_name))
    }

    /// Same module and entity; package ids must agree unless either side is a
    /// `#name` reference (the ledger reports resolved ids).
    pub fn matches(&self, other: &TemplateId) -> bool {
        self.module_name == other.module_name
            && self.entity_name == other.entity_name
            && (self.package_id == other.package_id
                || self.package_id.starts_with('#')
                || other.package_id.starts_with('#'))
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.package_id, self.module_name, self.entity_name
        )
    }
}

/// A contract creation as reported by the ledger.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CreatedEvent {
    /// Offset of the transaction that created the contract.
    pub offset: Offset,
    /// Node id within the transaction.
    pub node_id: i64,
    /// New contract id.
    pub contract_id: ContractId,
    /// Template of the contract.
    pub template_id: TemplateId,
    /// Create arguments.
    pub create_arguments: Record,
    /// Signatory parties.
    pub signatories: Vec<PartyId>,
    /// Observer parties.
    pub observers: Vec<PartyId>,
    /// Requesting parties that can see the contract.
    pub witness_parties: Vec<PartyId>,
    /// Ledger effective time of the creation.
    pub created_at: DateTime<Utc>,
}

/// A contract archival.
#[derive(Clone, Debug, PartialEq)]
pub struct ArchivedEvent {
    /// Offset of the archiving transaction.
    pub offset: Offset,
    /// Archived contract id.
    pub contract_id: ContractId,
    /// Template of the archived contract.
    pub template_id: TemplateId,
}

/// A choice exercise.
#[derive(Clone, Debug, PartialEq)]
pub struct ExercisedEvent {
    /// Offset of the transaction.
    pub offset: Offset,
    /// Target contract.
    pub contract_id: ContractId,
    /// Template of the target.
    pub template_id: TemplateId,
    /// Choice name.
    pub choice: String,
    /// Whether the target was archived.
    pub consuming: bool,
    /// Choice result.
    pub exercise_result: Value,
}

/// Transaction tree node.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Contract created.
    Created(CreatedEvent),
    /// Contract archived.
    Archived(ArchivedEvent),
    /// Choice exercised.
    Exercised(ExercisedEvent),
}

/// A committed transaction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Transaction {
    /// Update id.
    pub update_id: String,
    /// Command id of the submission, if visible.
    pub command_id: String,
    /// Ledger offset.
    pub offset: Offset,
    /// Ledger effective time.
    pub effective_at: Option<DateTime<Utc>>,
    /// Events in execution order.
    pub events: Vec<Event>,
}

impl Transaction {
    /// Created events of the transaction.
    pub fn created_events(&self) -> impl Iterator<Item = &CreatedEvent> {
        self.events.iter().filter_map(|e| match e {
            Event::Created(c) => Some(c),
            _ => None,
        })
    }

    /// Archived contract ids of the transaction.
    pub fn archived_contract_ids(&self) -> impl Iterator<Item = &str> {
        self.events.iter().filter_map(|e| match e {
            Event::Archived(a) => Some(a.contract_id.as_str()),
            Event::Exercised(x) if x.consuming => Some(x.contract_id.as_str()),
            _ => None,
        })
    }

    /// First created event of `template`.
    pub fn find_created(&self, template: &TemplateId) -> Option<&CreatedEvent> {
        self.created_events()
            .find(|c| c.template_id.matches(template))
    }
}

/// A single ledger command.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Create a contract.
    Create {
        /// Template to instantiate.
        template_id: TemplateId,
        /// Create arguments.
        arguments: Record,
    },
    /// Exercise a choice on an existing contract.
    Exercise {
        /// Template of the target contract.
        template_id: TemplateId,
        /// Target contract.
        contract_id: ContractId,
        /// Choice name.
        choice: String,
        /// Choice argument.
        argument: Value,
    },
}

impl Command {
    /// Create command.
    pub fn create(template_id: TemplateId, arguments: Record) -> Self {
        Command::Create {
            template_id,
            arguments,
        }
    }

    /// Exercise command.
    pub fn exercise(
        template_id: TemplateId,
        contract_id: impl Into<ContractId>,
        choice: impl Into<String>,
        argument: impl Into<Value>,
    ) -> Self {
        Command::Exercise {
            template_id,
            contract_id: contract_id.into(),
            choice: choice.into(),
            argument: argument.into(),
        }
    }

    /// Choice name, `None` for creates.
    pub fn choice(&self) -> Option<&str> {
        match self {
            Command::Exercise { choice, .. } => Some(choice),
            Command::Create { .. } => None,
        }
    }
}

/// A batch of commands submitted atomically.
#[derive(Clone, Debug, PartialEq)]
pub struct Commands {
    /// Deduplication / correlation id.
    pub command_id: String,
    /// Ledger user the submission is made as.
    pub user_id: String,
    /// Authorizing parties.
    pub act_as: Vec<PartyId>,
    /// Additional readers.
    pub read_as: Vec<PartyId>,
    /// Commands.
    pub commands: Vec<Command>,
    /// Synchronizer to submit to; empty lets the ledger choose.
    pub synchronizer_id: String,
}

/// Outcome of `submit_and_wait`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitResponse {
    /// Update id of the committed transaction.
    pub update_id: String,
    /// Offset of the completion.
    pub completion_offset: Offset,
}

/// Transaction prepared for external signing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedSubmission {
    /// Opaque serialized transaction (base64).
    pub prepared_transaction: String,
    /// Hash the external party must sign.
    pub prepared_transaction_hash: Vec<u8>,
    /// Hashing scheme, echoed on execute.
    pub hashing_scheme_version: String,
}

/// Signature format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureFormat {
    /// ASN.1 DER-encoded ECDSA signature.
    Der,
}

/// Signing algorithm.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SigningAlgorithm {
    /// ECDSA over secp256k1 with SHA-256.
    EcDsaSha256,
}

/// Detached signature with the key that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    /// Encoding of `signature`.
    pub format: SignatureFormat,
    /// Signature bytes.
    pub signature: Vec<u8>,
    /// Fingerprint of the signing key.
    pub signed_by: String,
    /// Algorithm used.
    pub signing_algorithm_spec: SigningAlgorithm,
}

/// All signatures supplied by one party.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartySignature {
    /// Signing party.
    pub party: PartyId,
    /// Its signatures.
    pub signatures: Vec<Signature>,
}

/// Execute request for a prepared transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecuteSubmission {
    /// As returned by prepare.
    pub prepared_transaction: String,
    /// Signatures keyed by party.
    pub party_signatures: Vec<PartySignature>,
    /// Submission id.
    pub submission_id: String,
    /// Ledger user.
    pub user_id: String,
    /// As returned by prepare.
    pub hashing_scheme_version: String,
}

/// Outcome of `execute_submission_and_wait`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecuteResponse {
    /// Update id of the committed transaction.
    pub update_id: String,
    /// Offset of the completion.
    pub completion_offset: Offset,
}

/// Active contract query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveContractsRequest {
    /// Snapshot offset.
    pub active_at_offset: Offset,
    /// Parties whose view is queried.
    pub parties: Vec<PartyId>,
    /// Template filter.
    pub template_id: TemplateId,
}

/// Update subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdatesRequest {
    /// Only updates strictly after this offset.
    pub begin_exclusive: Offset,
    /// Parties whose view is streamed.
    pub parties: Vec<PartyId>,
    /// Template filter; empty streams everything visible.
    pub template_ids: Vec<TemplateId>,
}

/// An element of the update stream.
#[derive(Clone, Debug, PartialEq)]
pub enum Update {
    /// A committed transaction.
    Transaction(Transaction),
    /// Offset checkpoint without visible changes.
    Checkpoint {
        /// Offset reached.
        offset: Offset,
    },
}

impl Update {
    /// Offset of the update.
    pub fn offset(&self) -> Offset {
        match self {
            Update::Transaction(tx) => tx.offset,
            Update::Checkpoint { offset } => *offset,
        }
    }
}

/// Stream of updates; ends cleanly or with an error.
pub type UpdateStream = BoxStream<'static, LedgerResult<Update>>;

/// Party as reported by allocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartyDetails {
    /// Party id.
    pub party: PartyId,
    /// Hosted on this participant.
    pub is_local: bool,
}

/// Topology returned by the first step of external party allocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalPartyTopology {
    /// Party id that will be allocated.
    pub party_id: PartyId,
    /// Fingerprint of the submitted public key.
    pub public_key_fingerprint: String,
    /// Serialized topology transactions (base64).
    pub topology_transactions: Vec<String>,
    /// Hash over all topology transactions; the party key signs it.
    pub multi_hash: Vec<u8>,
}

/// User right kinds that the bridge grants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserRight {
    /// Submit as the party.
    CanActAs(PartyId),
    /// Read as the party.
    CanReadAs(PartyId),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created(template: TemplateId, cid: &str) -> Event {
        Event::Created(CreatedEvent {
            offset: 5,
            node_id: 0,
            contract_id: cid.into(),
            template_id: template,
            create_arguments: Record::new(),
            signatories: vec![],
            observers: vec![],
            witness_parties: vec![],
            created_at: DateTime::<Utc>::default(),
        })
    }

    #[test]
    fn test_template_id_parse_and_display() {
        let t = TemplateId::parse("abc123:Bridge.Deposit:PendingDeposit").unwrap();
        assert_eq!(t.module_name, "Bridge.Deposit");
        assert_eq!(t.to_string(), "abc123:Bridge.Deposit:PendingDeposit");
        assert!(TemplateId::parse("abc:Mod").is_none());
    }

    #[test]
    fn test_template_id_package_name_reference_matches() {
        let by_name = TemplateId::new("#bridge", "Bridge.Deposit", "PendingDeposit");
        let by_id = TemplateId::new("abc123", "Bridge.Deposit", "PendingDeposit");
        let other = TemplateId::new("def456", "Bridge.Deposit", "PendingDeposit");
        assert!(by_name.matches(&by_id));
        assert!(!by_id.matches(&other));
    }

    #[test]
    fn test_find_created() {
        let holding = TemplateId::new("p", "Token.Holding", "Holding");
        let event = TemplateId::new("p", "Token.Events", "MintEvent");
        let tx = Transaction {
            events: vec![created(event.clone(), "ev-1"), created(holding.clone(), "h-1")],
            ..Default::default()
        };
        assert_eq!(tx.find_created(&holding).unwrap().contract_id, "h-1");
        assert_eq!(tx.created_events().count(), 2);
    }
}
