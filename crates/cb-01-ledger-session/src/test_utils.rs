//! # In-Memory Ledger
//!
//! `MockLedger` implements [`LedgerTransport`] against an in-memory active
//! contract set so that the identity, token, bridge and reconciliation
//! subsystems can be exercised without a participant node.
//!
//! Creates are applied directly. Exercises are dispatched to choice handlers
//! registered per choice name; a handler sees the target contract and the
//! active contract set and describes the archives and creates the choice
//! produces. Handlers run under the ledger lock and must not call back into
//! the `MockLedger`.

use crate::domain::{
    ActiveContractsRequest, ArchivedEvent, Command, Commands, CreatedEvent, Event,
    ExecuteResponse, ExecuteSubmission, ExercisedEvent, ExternalPartyTopology, LedgerError,
    LedgerResult, PartyDetails, PreparedSubmission, Record, Signature, StatusCode,
    SubmitResponse, TemplateId, Transaction, Update, UpdateStream, UpdatesRequest, UserRight,
    Value,
};
use crate::ports::LedgerTransport;
use crate::signing::key_fingerprint;
use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use k256::ecdsa::{signature::Verifier, Signature as EcdsaSignature, VerifyingKey};
use k256::pkcs8::DecodePublicKey;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use shared_types::{ContractId, Offset, PartyId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Hashing scheme reported by prepare.
pub const MOCK_HASHING_SCHEME: &str = "HASHING_SCHEME_VERSION_V2";

/// Synchronizer reported as connected.
pub const MOCK_SYNCHRONIZER: &str = "mock::sync";

/// A contract the handler wants created.
#[derive(Clone, Debug)]
pub struct MockCreate {
    /// Template.
    pub template_id: TemplateId,
    /// Create arguments.
    pub arguments: Record,
    /// Signatories; every party value in the arguments is also a stakeholder.
    pub signatories: Vec<PartyId>,
}

/// Effects of an exercised choice.
#[derive(Clone, Debug, Default)]
pub struct ChoiceOutcome {
    /// Archive the target contract.
    pub consuming: bool,
    /// Additional contracts to archive.
    pub archives: Vec<ContractId>,
    /// Contracts to create.
    pub creates: Vec<MockCreate>,
    /// Choice result.
    pub result: Option<Value>,
}

impl ChoiceOutcome {
    /// Outcome that archives the target.
    pub fn consuming() -> Self {
        Self {
            consuming: true,
            ..Default::default()
        }
    }

    /// Outcome that leaves the target active.
    pub fn nonconsuming() -> Self {
        Self::default()
    }

    /// Also create a contract.
    pub fn create(mut self, template_id: TemplateId, arguments: Record, signatories: &[&str]) -> Self {
        self.creates.push(MockCreate {
            template_id,
            arguments,
            signatories: signatories.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    /// Also archive a contract.
    pub fn archive(mut self, contract_id: impl Into<ContractId>) -> Self {
        self.archives.push(contract_id.into());
        self
    }
}

/// What a choice handler sees.
pub struct ExerciseContext<'a> {
    /// Contract the choice is exercised on.
    pub target: &'a CreatedEvent,
    /// Choice argument.
    pub argument: &'a Value,
    /// Submitting parties.
    pub act_as: &'a [PartyId],
    active: &'a [MockContract],
}

impl ExerciseContext<'_> {
    /// The argument as a record (empty when it is not one).
    pub fn args(&self) -> Record {
        self.argument.as_record().cloned().unwrap_or_default()
    }

    /// Look up an active contract.
    pub fn lookup(&self, contract_id: &str) -> Option<&CreatedEvent> {
        self.active
            .iter()
            .find(|c| c.event.contract_id == contract_id)
            .map(|c| &c.event)
    }

    /// Active contracts of a template.
    pub fn active_of(&self, template_id: &TemplateId) -> Vec<&CreatedEvent> {
        self.active
            .iter()
            .filter(|c| c.event.template_id.matches(template_id))
            .map(|c| &c.event)
            .collect()
    }
}

/// Choice handler.
pub type ChoiceHandler =
    Arc<dyn Fn(&ExerciseContext<'_>) -> LedgerResult<ChoiceOutcome> + Send + Sync>;

#[derive(Clone)]
struct MockContract {
    event: CreatedEvent,
    stakeholders: HashSet<PartyId>,
}

#[derive(Default)]
struct MockState {
    offset: Offset,
    next_contract: u64,
    active: Vec<MockContract>,
    handlers: HashMap<String, ChoiceHandler>,
    errors: VecDeque<LedgerError>,
    last_token: Option<String>,
    submitted: Vec<Commands>,
    prepared: HashMap<String, Commands>,
    executed: Vec<ExecuteSubmission>,
    streams: VecDeque<Vec<LedgerResult<Update>>>,
    update_requests: Vec<UpdatesRequest>,
    parties: HashSet<PartyId>,
    external_keys: HashMap<PartyId, Vec<u8>>,
    rights: HashSet<(String, String)>,
}

fn collect_parties(value: &Value, out: &mut HashSet<PartyId>) {
    match value {
        Value::Party(p) => {
            out.insert(p.clone());
        }
        Value::Record(r) => r.fields.iter().for_each(|f| collect_parties(&f.value, out)),
        Value::Variant { value, .. } => collect_parties(value, out),
        Value::Optional(Some(inner)) => collect_parties(inner, out),
        Value::List(items) => items.iter().for_each(|v| collect_parties(v, out)),
        Value::TextMap(map) => map.values().for_each(|v| collect_parties(v, out)),
        Value::GenMap(entries) => entries.iter().for_each(|(k, v)| {
            collect_parties(k, out);
            collect_parties(v, out);
        }),
        _ => {}
    }
}

impl MockState {
    fn take_error(&mut self, token: Option<&str>) -> LedgerResult<()> {
        self.last_token = token.map(str::to_string);
        match self.errors.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn new_contract(
        &mut self,
        offset: Offset,
        template_id: TemplateId,
        arguments: Record,
        signatories: Vec<PartyId>,
    ) -> CreatedEvent {
        self.next_contract += 1;
        let mut stakeholders: HashSet<PartyId> = signatories.iter().cloned().collect();
        collect_parties(&Value::Record(arguments.clone()), &mut stakeholders);
        let event = CreatedEvent {
            offset,
            node_id: 0,
            contract_id: format!("00mock{:08}", self.next_contract),
            template_id,
            create_arguments: arguments,
            signatories,
            observers: Vec::new(),
            witness_parties: stakeholders.iter().cloned().collect(),
            created_at: Utc::now(),
        };
        self.active.push(MockContract {
            event: event.clone(),
            stakeholders,
        });
        event
    }

    fn archive(&mut self, offset: Offset, contract_id: &str) -> LedgerResult<ArchivedEvent> {
        let pos = self
            .active
            .iter()
            .position(|c| c.event.contract_id == contract_id)
            .ok_or_else(|| {
                LedgerError::rejected(
                    StatusCode::NotFound,
                    format!("contract {} not found", contract_id),
                )
            })?;
        let contract = self.active.remove(pos);
        Ok(ArchivedEvent {
            offset,
            contract_id: contract.event.contract_id,
            template_id: contract.event.template_id,
        })
    }

    /// Apply a batch atomically: on error the state is left untouched.
    fn apply(&mut self, commands: &Commands) -> LedgerResult<Transaction> {
        let snapshot_active = self.active.clone();
        let snapshot_next = self.next_contract;
        let offset = self.offset + 1;

        let result = self.apply_inner(offset, commands);
        match result {
            Ok(events) => {
                self.offset = offset;
                self.submitted.push(commands.clone());
                Ok(Transaction {
                    update_id: format!("update-{}", offset),
                    command_id: commands.command_id.clone(),
                    offset,
                    effective_at: Some(Utc::now()),
                    events,
                })
            }
            Err(err) => {
                self.active = snapshot_active;
                self.next_contract = snapshot_next;
                Err(err)
            }
        }
    }

    fn apply_inner(&mut self, offset: Offset, commands: &Commands) -> LedgerResult<Vec<Event>> {
        let mut events = Vec::new();
        for command in &commands.commands {
            match command {
                Command::Create {
                    template_id,
                    arguments,
                } => {
                    let created = self.new_contract(
                        offset,
                        template_id.clone(),
                        arguments.clone(),
                        commands.act_as.clone(),
                    );
                    events.push(Event::Created(created));
                }
                Command::Exercise {
                    contract_id,
                    choice,
                    argument,
                    ..
                } => {
                    let handler = self.handlers.get(choice).cloned().ok_or_else(|| {
                        LedgerError::rejected(
                            StatusCode::InvalidArgument,
                            format!("unknown choice {}", choice),
                        )
                    })?;
                    let target = self
                        .active
                        .iter()
                        .find(|c| &c.event.contract_id == contract_id)
                        .map(|c| c.event.clone())
                        .ok_or_else(|| {
                            LedgerError::rejected(
                                StatusCode::NotFound,
                                format!("contract {} not found", contract_id),
                            )
                        })?;

                    let outcome = {
                        let ctx = ExerciseContext {
                            target: &target,
                            argument,
                            act_as: &commands.act_as,
                            active: &self.active,
                        };
                        handler(&ctx)?
                    };

                    events.push(Event::Exercised(ExercisedEvent {
                        offset,
                        contract_id: contract_id.clone(),
                        template_id: target.template_id.clone(),
                        choice: choice.clone(),
                        consuming: outcome.consuming,
                        exercise_result: outcome.result.clone().unwrap_or(Value::Unit),
                    }));
                    if outcome.consuming {
                        self.archive(offset, contract_id)?;
                    }
                    for cid in &outcome.archives {
                        events.push(Event::Archived(self.archive(offset, cid)?));
                    }
                    for create in outcome.creates {
                        let created = self.new_contract(
                            offset,
                            create.template_id,
                            create.arguments,
                            create.signatories,
                        );
                        events.push(Event::Created(created));
                    }
                }
            }
        }
        Ok(events)
    }
}

/// In-memory ledger.
#[derive(Default)]
pub struct MockLedger {
    state: Mutex<MockState>,
}

impl MockLedger {
    /// Empty ledger at offset 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a contract directly; returns its id.
    pub fn add_contract(&self, template_id: TemplateId, arguments: Record, signatories: &[&str]) -> ContractId {
        let mut state = self.state.lock();
        state.offset += 1;
        let offset = state.offset;
        state
            .new_contract(
                offset,
                template_id,
                arguments,
                signatories.iter().map(|s| s.to_string()).collect(),
            )
            .contract_id
    }

    /// Remove a contract directly.
    pub fn archive_contract(&self, contract_id: &str) -> LedgerResult<()> {
        let mut state = self.state.lock();
        state.offset += 1;
        let offset = state.offset;
        state.archive(offset, contract_id).map(|_| ())
    }

    /// Register the behaviour of a choice.
    pub fn on_choice<F>(&self, choice: &str, handler: F)
    where
        F: Fn(&ExerciseContext<'_>) -> LedgerResult<ChoiceOutcome> + Send + Sync + 'static,
    {
        self.state
            .lock()
            .handlers
            .insert(choice.to_string(), Arc::new(handler));
    }

    /// Fail the next transport call with `err`.
    pub fn fail_next(&self, err: LedgerError) {
        self.state.lock().errors.push_back(err);
    }

    /// Queue the items of the next update subscription. Items at or below the
    /// requested begin offset are dropped; after the last item the stream
    /// ends, or stays open when the script ends with no error and is the last
    /// one queued.
    pub fn script_stream(&self, items: Vec<LedgerResult<Update>>) {
        self.state.lock().streams.push_back(items);
    }

    /// Active contracts of `template_id`, regardless of visibility.
    pub fn active(&self, template_id: &TemplateId) -> Vec<CreatedEvent> {
        self.state
            .lock()
            .active
            .iter()
            .filter(|c| c.event.template_id.matches(template_id))
            .map(|c| c.event.clone())
            .collect()
    }

    /// Bearer token attached to the last call.
    pub fn last_token(&self) -> Option<String> {
        self.state.lock().last_token.clone()
    }

    /// Command batches committed so far.
    pub fn submitted(&self) -> Vec<Commands> {
        self.state.lock().submitted.clone()
    }

    /// Execute requests received so far.
    pub fn executed(&self) -> Vec<ExecuteSubmission> {
        self.state.lock().executed.clone()
    }

    /// Update subscriptions opened so far.
    pub fn update_requests(&self) -> Vec<UpdatesRequest> {
        self.state.lock().update_requests.clone()
    }

    /// Current ledger end.
    pub fn offset(&self) -> Offset {
        self.state.lock().offset
    }
}

#[async_trait]
impl LedgerTransport for MockLedger {
    async fn ledger_end(&self, token: Option<&str>) -> LedgerResult<Offset> {
        let mut state = self.state.lock();
        state.take_error(token)?;
        Ok(state.offset)
    }

    async fn active_contracts(
        &self,
        token: Option<&str>,
        request: &ActiveContractsRequest,
    ) -> LedgerResult<Vec<CreatedEvent>> {
        let mut state = self.state.lock();
        state.take_error(token)?;
        Ok(state
            .active
            .iter()
            .filter(|c| c.event.template_id.matches(&request.template_id))
            .filter(|c| c.event.offset <= request.active_at_offset)
            .filter(|c| request.parties.iter().any(|p| c.stakeholders.contains(p)))
            .map(|c| c.event.clone())
            .collect())
    }

    async fn submit_and_wait(
        &self,
        token: Option<&str>,
        commands: &Commands,
    ) -> LedgerResult<SubmitResponse> {
        let mut state = self.state.lock();
        state.take_error(token)?;
        let tx = state.apply(commands)?;
        Ok(SubmitResponse {
            update_id: tx.update_id,
            completion_offset: tx.offset,
        })
    }

    async fn submit_and_wait_for_transaction(
        &self,
        token: Option<&str>,
        commands: &Commands,
    ) -> LedgerResult<Transaction> {
        let mut state = self.state.lock();
        state.take_error(token)?;
        state.apply(commands)
    }

    async fn prepare_submission(
        &self,
        token: Option<&str>,
        commands: &Commands,
    ) -> LedgerResult<PreparedSubmission> {
        let mut state = self.state.lock();
        state.take_error(token)?;
        let blob = base64::engine::general_purpose::STANDARD.encode(commands.command_id.as_bytes());
        state.prepared.insert(blob.clone(), commands.clone());
        Ok(PreparedSubmission {
            prepared_transaction_hash: Sha256::digest(blob.as_bytes()).to_vec(),
            prepared_transaction: blob,
            hashing_scheme_version: MOCK_HASHING_SCHEME.to_string(),
        })
    }

    async fn execute_submission_and_wait(
        &self,
        token: Option<&str>,
        request: &ExecuteSubmission,
    ) -> LedgerResult<ExecuteResponse> {
        let mut state = self.state.lock();
        state.take_error(token)?;
        let commands = state
            .prepared
            .remove(&request.prepared_transaction)
            .ok_or_else(|| {
                LedgerError::rejected(StatusCode::InvalidArgument, "unknown prepared transaction")
            })?;
        if request.party_signatures.is_empty() {
            return Err(LedgerError::rejected(
                StatusCode::InvalidArgument,
                "missing party signatures",
            ));
        }
        state.executed.push(request.clone());
        let tx = state.apply(&commands)?;
        Ok(ExecuteResponse {
            update_id: tx.update_id,
            completion_offset: tx.offset,
        })
    }

    async fn updates(
        &self,
        token: Option<&str>,
        request: &UpdatesRequest,
    ) -> LedgerResult<UpdateStream> {
        let mut state = self.state.lock();
        state.take_error(token)?;
        state.update_requests.push(request.clone());

        let begin = request.begin_exclusive;
        match state.streams.pop_front() {
            Some(items) => {
                let keep_open = state.streams.is_empty()
                    && items.last().map(|i| i.is_ok()).unwrap_or(true);
                let items: Vec<_> = items
                    .into_iter()
                    .filter(|item| match item {
                        Ok(update) => update.offset() > begin,
                        Err(_) => true,
                    })
                    .collect();
                let scripted = stream::iter(items);
                if keep_open {
                    Ok(scripted.chain(stream::pending()).boxed())
                } else {
                    Ok(scripted.boxed())
                }
            }
            None => Ok(stream::pending().boxed()),
        }
    }

    async fn allocate_party(
        &self,
        token: Option<&str>,
        hint: &str,
    ) -> LedgerResult<PartyDetails> {
        let mut state = self.state.lock();
        state.take_error(token)?;
        let party = format!("{}::1220mock", hint);
        if !state.parties.insert(party.clone()) {
            return Err(LedgerError::rejected(
                StatusCode::AlreadyExists,
                format!("party {} already allocated", party),
            ));
        }
        Ok(PartyDetails {
            party,
            is_local: true,
        })
    }

    async fn generate_external_party_topology(
        &self,
        token: Option<&str>,
        _synchronizer_id: &str,
        hint: &str,
        public_key_spki_der: &[u8],
    ) -> LedgerResult<ExternalPartyTopology> {
        let mut state = self.state.lock();
        state.take_error(token)?;
        VerifyingKey::from_public_key_der(public_key_spki_der).map_err(|e| {
            LedgerError::rejected(StatusCode::InvalidArgument, format!("bad public key: {}", e))
        })?;
        let fingerprint = key_fingerprint(public_key_spki_der);
        let party_id = format!("{}::{}", hint, fingerprint);
        state
            .external_keys
            .insert(party_id.clone(), public_key_spki_der.to_vec());
        Ok(ExternalPartyTopology {
            multi_hash: Sha256::digest(party_id.as_bytes()).to_vec(),
            topology_transactions: vec![base64::engine::general_purpose::STANDARD
                .encode(party_id.as_bytes())],
            party_id,
            public_key_fingerprint: fingerprint,
        })
    }

    async fn allocate_external_party(
        &self,
        token: Option<&str>,
        _synchronizer_id: &str,
        topology: &ExternalPartyTopology,
        signature: &Signature,
    ) -> LedgerResult<PartyId> {
        let mut state = self.state.lock();
        state.take_error(token)?;
        let der = state
            .external_keys
            .get(&topology.party_id)
            .cloned()
            .ok_or_else(|| LedgerError::rejected(StatusCode::NotFound, "unknown topology"))?;
        let key = VerifyingKey::from_public_key_der(&der)
            .map_err(|e| LedgerError::rejected(StatusCode::InvalidArgument, e.to_string()))?;
        let sig = EcdsaSignature::from_der(&signature.signature)
            .map_err(|e| LedgerError::rejected(StatusCode::InvalidArgument, e.to_string()))?;
        key.verify(&topology.multi_hash, &sig).map_err(|_| {
            LedgerError::rejected(StatusCode::InvalidArgument, "invalid topology signature")
        })?;
        if signature.signed_by != topology.public_key_fingerprint {
            return Err(LedgerError::rejected(
                StatusCode::InvalidArgument,
                "signature key does not match topology",
            ));
        }
        state.parties.insert(topology.party_id.clone());
        Ok(topology.party_id.clone())
    }

    async fn grant_user_rights(
        &self,
        token: Option<&str>,
        user_id: &str,
        rights: &[UserRight],
    ) -> LedgerResult<()> {
        let mut state = self.state.lock();
        state.take_error(token)?;
        for right in rights {
            let key = (user_id.to_string(), format!("{:?}", right));
            if !state.rights.insert(key) {
                return Err(LedgerError::rejected(
                    StatusCode::AlreadyExists,
                    format!("user right {:?} already granted", right),
                ));
            }
        }
        Ok(())
    }

    async fn connected_synchronizers(&self, token: Option<&str>) -> LedgerResult<Vec<String>> {
        let mut state = self.state.lock();
        state.take_error(token)?;
        Ok(vec![MOCK_SYNCHRONIZER.to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> TemplateId {
        TemplateId::new("pkg", "Test.Counter", "Counter")
    }

    fn commands(act_as: &str, commands: Vec<Command>) -> Commands {
        Commands {
            command_id: "cmd".into(),
            user_id: "relayer".into(),
            act_as: vec![act_as.into()],
            read_as: vec![],
            commands,
            synchronizer_id: String::new(),
        }
    }

    #[tokio::test]
    async fn test_choice_handler_replaces_contract() {
        let ledger = MockLedger::new();
        let cid = ledger.add_contract(
            counter(),
            Record::new().with("owner", Value::party("alice")).with("n", Value::Int64(1)),
            &["alice"],
        );
        ledger.on_choice("Increment", |ctx| {
            let n = ctx.target.create_arguments.int64("n");
            Ok(ChoiceOutcome::consuming().create(
                counter(),
                Record::new()
                    .with("owner", Value::party("alice"))
                    .with("n", Value::Int64(n + 1)),
                &["alice"],
            ))
        });

        let tx = ledger
            .submit_and_wait_for_transaction(
                None,
                &commands(
                    "alice",
                    vec![Command::exercise(counter(), cid.clone(), "Increment", Value::Unit)],
                ),
            )
            .await
            .unwrap();
        assert_eq!(tx.find_created(&counter()).unwrap().create_arguments.int64("n"), 2);

        let active = ledger.active(&counter());
        assert_eq!(active.len(), 1);
        assert_ne!(active[0].contract_id, cid);
    }

    #[tokio::test]
    async fn test_failed_batch_leaves_state_untouched() {
        let ledger = MockLedger::new();
        let batch = commands(
            "alice",
            vec![
                Command::create(counter(), Record::new()),
                Command::exercise(counter(), "missing", "Increment", Value::Unit),
            ],
        );
        assert!(ledger
            .submit_and_wait(None, &batch)
            .await
            .is_err());
        assert!(ledger.active(&counter()).is_empty());
        assert_eq!(ledger.offset(), 0);
    }

    #[tokio::test]
    async fn test_scripted_stream_filters_begin_offset() {
        let ledger = MockLedger::new();
        ledger.script_stream(vec![
            Ok(Update::Checkpoint { offset: 3 }),
            Ok(Update::Checkpoint { offset: 7 }),
            Err(LedgerError::Unavailable("reset".into())),
        ]);
        let request = UpdatesRequest {
            begin_exclusive: 3,
            parties: vec!["alice".into()],
            template_ids: vec![],
        };
        let items: Vec<_> = ledger
            .updates(None, &request)
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().offset(), 7);
        assert!(items[1].is_err());
    }

    #[tokio::test]
    async fn test_duplicate_right_grant_rejected() {
        let ledger = MockLedger::new();
        let rights = [UserRight::CanActAs("alice".into())];
        ledger.grant_user_rights(None, "relayer", &rights).await.unwrap();
        let err = ledger
            .grant_user_rights(None, "relayer", &rights)
            .await
            .unwrap_err();
        assert!(err.is_already_exists());
    }
}
