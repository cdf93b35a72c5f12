//! # JSON Ledger API Wire Types
//!
//! Request bodies and response decoding for the v2 JSON ledger API.
//! Tagged unions in responses (`CreatedEvent` / `ArchivedEvent` / ...,
//! `Transaction` / `OffsetCheckpoint`) are dispatched on their single key so
//! that unknown variants are skipped instead of failing the whole response.

use super::lf_json::{decode_record, decode_value, encode_record, encode_value, parse_time};
use crate::domain::{
    ArchivedEvent, Command, Commands, CreatedEvent, Event, ExercisedEvent, LedgerError,
    LedgerResult, PartySignature, Signature, SignatureFormat, SigningAlgorithm, StatusCode,
    TemplateId, Transaction, Update, UserRight,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Map, Value as Json};
use shared_types::{Offset, PartyId};

/// Error body returned by the JSON API.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsError {
    /// Symbolic error code, e.g. `CONTRACT_NOT_FOUND`.
    #[serde(default)]
    pub code: String,
    /// Human readable cause.
    #[serde(default)]
    pub cause: String,
    /// Underlying RPC status.
    #[serde(default)]
    pub grpc_code_value: Option<i64>,
}

impl JsError {
    /// Convert to a rejection, falling back to the HTTP status classification.
    pub fn into_ledger_error(self, http_status: Option<u16>) -> LedgerError {
        let code = match (self.grpc_code_value, http_status) {
            (Some(grpc), _) => StatusCode::from_grpc(grpc),
            (None, Some(http)) => StatusCode::from_http(http),
            (None, None) => StatusCode::Unknown,
        };
        let message = match (self.code.is_empty(), self.cause.is_empty()) {
            (false, false) => format!("{}: {}", self.code, self.cause),
            (false, true) => self.code,
            _ => self.cause,
        };
        LedgerError::rejected(code, message)
    }
}

/// `GET /v2/state/ledger-end` response.
#[derive(Debug, Deserialize)]
pub struct LedgerEndResponse {
    /// Ledger end.
    pub offset: Offset,
}

/// Response of the two completion-style endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResponse {
    /// Update id.
    #[serde(default)]
    pub update_id: String,
    /// Completion offset.
    #[serde(default)]
    pub completion_offset: Offset,
}

/// Prepare response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareResponse {
    /// Base64 prepared transaction.
    pub prepared_transaction: String,
    /// Base64 hash to sign.
    pub prepared_transaction_hash: String,
    /// Hashing scheme.
    pub hashing_scheme_version: String,
}

/// `POST /v2/parties` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocatePartyResponse {
    /// Allocated party.
    pub party_details: PartyDetailsDto,
}

/// Party details.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyDetailsDto {
    /// Party id.
    pub party: PartyId,
    /// Hosted locally.
    #[serde(default)]
    pub is_local: bool,
}

/// External topology response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTopologyResponse {
    /// Party id to be allocated.
    pub party_id: PartyId,
    /// Fingerprint of the submitted key.
    pub public_key_fingerprint: String,
    /// Base64 topology transactions.
    #[serde(default)]
    pub topology_transactions: Vec<String>,
    /// Base64 multi-hash.
    pub multi_hash: String,
}

/// External allocation response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocateExternalPartyResponse {
    /// Allocated party.
    pub party_id: PartyId,
}

/// Connected synchronizers response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedSynchronizersResponse {
    /// Connections.
    #[serde(default)]
    pub connected_synchronizers: Vec<ConnectedSynchronizer>,
}

/// One connection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedSynchronizer {
    /// Synchronizer id.
    pub synchronizer_id: String,
}

/// Base64 decode a response field.
pub fn decode_base64(field: &str, value: &str) -> LedgerResult<Vec<u8>> {
    BASE64
        .decode(value)
        .map_err(|e| LedgerError::Malformed(format!("{} is not base64: {}", field, e)))
}

/// Event filter restricting `parties` to `templates` (all templates when empty).
pub fn event_format(parties: &[PartyId], templates: &[TemplateId], verbose: bool) -> Json {
    let cumulative: Vec<Json> = if templates.is_empty() {
        vec![json!({
            "identifierFilter": {
                "WildcardFilter": { "value": { "includeCreatedEventBlob": false } }
            }
        })]
    } else {
        templates
            .iter()
            .map(|t| {
                json!({
                    "identifierFilter": {
                        "TemplateFilter": {
                            "value": {
                                "templateId": t.to_string(),
                                "includeCreatedEventBlob": false
                            }
                        }
                    }
                })
            })
            .collect()
    };

    let filters_by_party: Map<String, Json> = parties
        .iter()
        .map(|p| (p.clone(), json!({ "cumulative": cumulative })))
        .collect();

    json!({ "filtersByParty": filters_by_party, "verbose": verbose })
}

/// Active contracts request body.
pub fn active_contracts_body(offset: Offset, parties: &[PartyId], template: &TemplateId) -> Json {
    json!({
        "eventFormat": event_format(parties, std::slice::from_ref(template), true),
        "verbose": true,
        "activeAtOffset": offset
    })
}

/// Updates subscription body.
pub fn updates_body(begin_exclusive: Offset, parties: &[PartyId], templates: &[TemplateId]) -> Json {
    json!({
        "beginExclusive": begin_exclusive,
        "verbose": true,
        "updateFormat": {
            "includeTransactions": {
                "eventFormat": event_format(parties, templates, true),
                "transactionShape": "TRANSACTION_SHAPE_ACS_DELTA"
            }
        }
    })
}

fn encode_command(command: &Command) -> Json {
    match command {
        Command::Create {
            template_id,
            arguments,
        } => json!({
            "CreateCommand": {
                "templateId": template_id.to_string(),
                "createArguments": encode_record(arguments)
            }
        }),
        Command::Exercise {
            template_id,
            contract_id,
            choice,
            argument,
        } => json!({
            "ExerciseCommand": {
                "templateId": template_id.to_string(),
                "contractId": contract_id,
                "choice": choice,
                "choiceArgument": encode_value(argument)
            }
        }),
    }
}

/// `JsCommands` body.
pub fn commands_body(commands: &Commands) -> Json {
    let mut body = json!({
        "commands": commands.commands.iter().map(encode_command).collect::<Vec<_>>(),
        "commandId": commands.command_id,
        "userId": commands.user_id,
        "actAs": commands.act_as,
        "readAs": commands.read_as,
    });
    if !commands.synchronizer_id.is_empty() {
        body["synchronizerId"] = json!(commands.synchronizer_id);
    }
    body
}

/// Submit-and-wait-for-transaction body: the acting parties see every event.
pub fn submit_for_transaction_body(commands: &Commands) -> Json {
    json!({
        "commands": commands_body(commands),
        "transactionFormat": {
            "eventFormat": event_format(&commands.act_as, &[], true),
            "transactionShape": "TRANSACTION_SHAPE_LEDGER_EFFECTS"
        }
    })
}

/// Prepare body.
pub fn prepare_body(commands: &Commands) -> Json {
    json!({
        "userId": commands.user_id,
        "commandId": commands.command_id,
        "commands": commands.commands.iter().map(encode_command).collect::<Vec<_>>(),
        "actAs": commands.act_as,
        "readAs": commands.read_as,
        "synchronizerId": commands.synchronizer_id,
        "packageIdSelectionPreference": [],
        "verboseHashing": false
    })
}

fn signature_json(signature: &Signature) -> Json {
    let format = match signature.format {
        SignatureFormat::Der => "SIGNATURE_FORMAT_DER",
    };
    let algorithm = match signature.signing_algorithm_spec {
        SigningAlgorithm::EcDsaSha256 => "SIGNING_ALGORITHM_SPEC_EC_DSA_SHA_256",
    };
    json!({
        "format": format,
        "signature": BASE64.encode(&signature.signature),
        "signedBy": signature.signed_by,
        "signingAlgorithmSpec": algorithm
    })
}

/// Execute-and-wait body.
pub fn execute_body(
    prepared_transaction: &str,
    party_signatures: &[PartySignature],
    submission_id: &str,
    user_id: &str,
    hashing_scheme_version: &str,
) -> Json {
    let signatures: Vec<Json> = party_signatures
        .iter()
        .map(|ps| {
            json!({
                "party": ps.party,
                "signatures": ps.signatures.iter().map(signature_json).collect::<Vec<_>>()
            })
        })
        .collect();
    json!({
        "preparedTransaction": prepared_transaction,
        "partySignatures": { "signatures": signatures },
        "deduplicationPeriod": { "Empty": {} },
        "submissionId": submission_id,
        "userId": user_id,
        "hashingSchemeVersion": hashing_scheme_version
    })
}

/// External topology generation body.
pub fn generate_topology_body(synchronizer: &str, hint: &str, public_key_spki_der: &[u8]) -> Json {
    json!({
        "synchronizer": synchronizer,
        "partyHint": hint,
        "publicKey": {
            "format": "CRYPTO_KEY_FORMAT_DER_X509_SUBJECT_PUBLIC_KEY_INFO",
            "keyData": BASE64.encode(public_key_spki_der),
            "keySpec": "SIGNING_KEY_SPEC_EC_SECP256K1"
        }
    })
}

/// External allocation body.
pub fn allocate_external_body(
    synchronizer: &str,
    topology_transactions: &[String],
    signature: &Signature,
) -> Json {
    json!({
        "synchronizer": synchronizer,
        "onboardingTransactions": topology_transactions
            .iter()
            .map(|t| json!({ "transaction": t }))
            .collect::<Vec<_>>(),
        "multiHashSignatures": [signature_json(signature)]
    })
}

/// Grant rights body.
pub fn grant_rights_body(user_id: &str, rights: &[UserRight]) -> Json {
    let rights: Vec<Json> = rights
        .iter()
        .map(|r| match r {
            UserRight::CanActAs(p) => json!({ "kind": { "CanActAs": { "value": { "party": p } } } }),
            UserRight::CanReadAs(p) => json!({ "kind": { "CanReadAs": { "value": { "party": p } } } }),
        })
        .collect();
    json!({ "userId": user_id, "rights": rights, "identityProviderId": "" })
}

fn str_field<'a>(obj: &'a Json, key: &str) -> &'a str {
    obj.get(key).and_then(Json::as_str).unwrap_or_default()
}

fn i64_field(obj: &Json, key: &str) -> i64 {
    obj.get(key).and_then(Json::as_i64).unwrap_or(0)
}

fn parties_field(obj: &Json, key: &str) -> Vec<PartyId> {
    obj.get(key)
        .and_then(Json::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Json::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn template_field(obj: &Json) -> LedgerResult<TemplateId> {
    let raw = str_field(obj, "templateId");
    TemplateId::parse(raw)
        .ok_or_else(|| LedgerError::Malformed(format!("invalid template id {:?}", raw)))
}

/// Decode a `CreatedEvent` object.
pub fn decode_created(obj: &Json) -> LedgerResult<CreatedEvent> {
    let contract_id = str_field(obj, "contractId");
    if contract_id.is_empty() {
        return Err(LedgerError::Malformed("created event without contractId".into()));
    }
    Ok(CreatedEvent {
        offset: i64_field(obj, "offset"),
        node_id: i64_field(obj, "nodeId"),
        contract_id: contract_id.to_string(),
        template_id: template_field(obj)?,
        create_arguments: obj
            .get("createArgument")
            .map(decode_record)
            .unwrap_or_default(),
        signatories: parties_field(obj, "signatories"),
        observers: parties_field(obj, "observers"),
        witness_parties: parties_field(obj, "witnessParties"),
        created_at: parse_time(str_field(obj, "createdAt")),
    })
}

fn decode_event(wrapper: &Json) -> LedgerResult<Option<Event>> {
    let Some(map) = wrapper.as_object() else {
        return Ok(None);
    };
    if let Some(created) = map.get("CreatedEvent") {
        return decode_created(created).map(|c| Some(Event::Created(c)));
    }
    if let Some(archived) = map.get("ArchivedEvent") {
        return Ok(Some(Event::Archived(ArchivedEvent {
            offset: i64_field(archived, "offset"),
            contract_id: str_field(archived, "contractId").to_string(),
            template_id: template_field(archived)?,
        })));
    }
    if let Some(exercised) = map.get("ExercisedEvent") {
        return Ok(Some(Event::Exercised(ExercisedEvent {
            offset: i64_field(exercised, "offset"),
            contract_id: str_field(exercised, "contractId").to_string(),
            template_id: template_field(exercised)?,
            choice: str_field(exercised, "choice").to_string(),
            consuming: exercised
                .get("consuming")
                .and_then(Json::as_bool)
                .unwrap_or(false),
            exercise_result: exercised
                .get("exerciseResult")
                .map(decode_value)
                .unwrap_or(crate::domain::Value::Unit),
        })));
    }
    Ok(None)
}

/// Decode a transaction object.
pub fn decode_transaction(obj: &Json) -> LedgerResult<Transaction> {
    let mut events = Vec::new();
    if let Some(items) = obj.get("events").and_then(Json::as_array) {
        for item in items {
            if let Some(event) = decode_event(item)? {
                events.push(event);
            }
        }
    }
    let effective_at = obj
        .get("effectiveAt")
        .and_then(Json::as_str)
        .map(parse_time);
    Ok(Transaction {
        update_id: str_field(obj, "updateId").to_string(),
        command_id: str_field(obj, "commandId").to_string(),
        offset: i64_field(obj, "offset"),
        effective_at,
        events,
    })
}

/// Decode the body of `submit-and-wait-for-transaction`.
pub fn decode_transaction_response(body: &Json) -> LedgerResult<Transaction> {
    let tx = body
        .get("transaction")
        .ok_or_else(|| LedgerError::Malformed("response without transaction".into()))?;
    decode_transaction(tx)
}

/// Decode an active contracts response (array of contract entries).
pub fn decode_active_contracts(body: &Json) -> LedgerResult<Vec<CreatedEvent>> {
    let entries = body
        .as_array()
        .ok_or_else(|| LedgerError::Malformed("active contracts response is not an array".into()))?;
    let mut events = Vec::with_capacity(entries.len());
    for entry in entries {
        let created = entry
            .get("contractEntry")
            .and_then(|e| e.get("JsActiveContract"))
            .and_then(|c| c.get("createdEvent"));
        if let Some(created) = created {
            events.push(decode_created(created)?);
        }
    }
    Ok(events)
}

/// Decode one websocket message of the update stream.
///
/// Returns `Ok(None)` for update kinds the bridge does not consume
/// (reassignments, topology transactions).
pub fn decode_update_message(body: &Json) -> LedgerResult<Option<Update>> {
    if body.get("update").is_none() && (body.get("code").is_some() || body.get("cause").is_some()) {
        let err: JsError = serde_json::from_value(body.clone()).unwrap_or_default();
        return Err(err.into_ledger_error(None));
    }
    let Some(update) = body.get("update").and_then(Json::as_object) else {
        return Err(LedgerError::Malformed("update message without update".into()));
    };
    if let Some(tx) = update.get("Transaction") {
        let value = tx.get("value").unwrap_or(tx);
        return decode_transaction(value).map(|t| Some(Update::Transaction(t)));
    }
    if let Some(cp) = update.get("OffsetCheckpoint") {
        let value = cp.get("value").unwrap_or(cp);
        return Ok(Some(Update::Checkpoint {
            offset: i64_field(value, "offset"),
        }));
    }
    Ok(None)
}
