//! # JSON Ledger API Transport
//!
//! [`LedgerTransport`] over the participant's v2 JSON API: request/response
//! calls over HTTP (reqwest) and the update stream over a WebSocket
//! (tokio-tungstenite). The bearer token travels as an `Authorization`
//! header on HTTP and as a `jwt.token.<token>` subprotocol on the WebSocket.

use super::wire::{
    self, AllocateExternalPartyResponse, AllocatePartyResponse, CompletionResponse,
    ConnectedSynchronizersResponse, GenerateTopologyResponse, JsError, LedgerEndResponse,
    PrepareResponse,
};
use crate::domain::{
    ActiveContractsRequest, Commands, CreatedEvent, ExecuteResponse, ExecuteSubmission,
    ExternalPartyTopology, LedgerError, LedgerResult, PartyDetails, PreparedSubmission, Signature,
    SubmitResponse, Transaction, UpdateStream, UpdatesRequest, UserRight,
};
use crate::ports::LedgerTransport;
use crate::session::LedgerConfig;
use async_trait::async_trait;
use futures::{stream, SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value as Json;
use shared_types::{Offset, PartyId};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

/// WebSocket subprotocol announcing token-in-subprotocol auth.
const WS_AUTH_PROTOCOL: &str = "daml.ws.auth";

/// JSON API transport.
pub struct JsonApiTransport {
    http: reqwest::Client,
    base_url: String,
    ws_base_url: String,
    max_message_size: usize,
}

impl JsonApiTransport {
    /// Build the HTTP client from the session configuration.
    pub fn new(config: &LedgerConfig) -> LedgerResult<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(std::time::Duration::from_secs(5));
        if let Some(pem) = &config.tls_root_pem {
            let cert = reqwest::Certificate::from_pem(pem.as_bytes())
                .map_err(|e| LedgerError::Config(format!("invalid TLS root: {}", e)))?;
            builder = builder.add_root_certificate(cert);
        }
        let http = builder
            .build()
            .map_err(|e| LedgerError::Config(e.to_string()))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        let ws_base_url = if let Some(rest) = base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base_url.clone()
        };

        Ok(Self {
            http,
            base_url,
            ws_base_url,
            max_message_size: config.max_message_size,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        token: Option<&str>,
    ) -> LedgerResult<Json> {
        let request = match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request
            .send()
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;
        if bytes.len() > self.max_message_size {
            return Err(LedgerError::Malformed(format!(
                "response of {} bytes exceeds limit of {}",
                bytes.len(),
                self.max_message_size
            )));
        }

        if !status.is_success() {
            let err: JsError = serde_json::from_slice(&bytes).unwrap_or_else(|_| JsError {
                cause: String::from_utf8_lossy(&bytes).into_owned(),
                ..Default::default()
            });
            return Err(err.into_ledger_error(Some(status.as_u16())));
        }

        if bytes.is_empty() {
            return Ok(Json::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| LedgerError::Malformed(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, token: Option<&str>, path: &str) -> LedgerResult<T> {
        let body = self.send(self.http.get(self.url(path)), token).await?;
        serde_json::from_value(body).map_err(|e| LedgerError::Malformed(e.to_string()))
    }

    async fn post_json(&self, token: Option<&str>, path: &str, body: &Json) -> LedgerResult<Json> {
        self.send(self.http.post(self.url(path)).json(body), token)
            .await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        token: Option<&str>,
        path: &str,
        body: &Json,
    ) -> LedgerResult<T> {
        let body = self.post_json(token, path, body).await?;
        serde_json::from_value(body).map_err(|e| LedgerError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl LedgerTransport for JsonApiTransport {
    async fn ledger_end(&self, token: Option<&str>) -> LedgerResult<Offset> {
        let response: LedgerEndResponse = self.get(token, "/v2/state/ledger-end").await?;
        Ok(response.offset)
    }

    async fn active_contracts(
        &self,
        token: Option<&str>,
        request: &ActiveContractsRequest,
    ) -> LedgerResult<Vec<CreatedEvent>> {
        let body = wire::active_contracts_body(
            request.active_at_offset,
            &request.parties,
            &request.template_id,
        );
        let response = self
            .post_json(token, "/v2/state/active-contracts", &body)
            .await?;
        wire::decode_active_contracts(&response)
    }

    async fn submit_and_wait(
        &self,
        token: Option<&str>,
        commands: &Commands,
    ) -> LedgerResult<SubmitResponse> {
        let response: CompletionResponse = self
            .post(
                token,
                "/v2/commands/submit-and-wait",
                &wire::commands_body(commands),
            )
            .await?;
        Ok(SubmitResponse {
            update_id: response.update_id,
            completion_offset: response.completion_offset,
        })
    }

    async fn submit_and_wait_for_transaction(
        &self,
        token: Option<&str>,
        commands: &Commands,
    ) -> LedgerResult<Transaction> {
        let response = self
            .post_json(
                token,
                "/v2/commands/submit-and-wait-for-transaction",
                &wire::submit_for_transaction_body(commands),
            )
            .await?;
        wire::decode_transaction_response(&response)
    }

    async fn prepare_submission(
        &self,
        token: Option<&str>,
        commands: &Commands,
    ) -> LedgerResult<PreparedSubmission> {
        let response: PrepareResponse = self
            .post(
                token,
                "/v2/interactive-submission/prepare",
                &wire::prepare_body(commands),
            )
            .await?;
        Ok(PreparedSubmission {
            prepared_transaction_hash: wire::decode_base64(
                "preparedTransactionHash",
                &response.prepared_transaction_hash,
            )?,
            prepared_transaction: response.prepared_transaction,
            hashing_scheme_version: response.hashing_scheme_version,
        })
    }

    async fn execute_submission_and_wait(
        &self,
        token: Option<&str>,
        request: &ExecuteSubmission,
    ) -> LedgerResult<ExecuteResponse> {
        let body = wire::execute_body(
            &request.prepared_transaction,
            &request.party_signatures,
            &request.submission_id,
            &request.user_id,
            &request.hashing_scheme_version,
        );
        let response: CompletionResponse = self
            .post(token, "/v2/interactive-submission/executeAndWait", &body)
            .await?;
        Ok(ExecuteResponse {
            update_id: response.update_id,
            completion_offset: response.completion_offset,
        })
    }

    async fn updates(
        &self,
        token: Option<&str>,
        request: &UpdatesRequest,
    ) -> LedgerResult<UpdateStream> {
        let url = format!("{}/v2/updates/flats", self.ws_base_url);
        let mut ws_request = url
            .as_str()
            .into_client_request()
            .map_err(|e| LedgerError::Config(e.to_string()))?;
        let protocols = match token {
            Some(token) => format!("{}, jwt.token.{}", WS_AUTH_PROTOCOL, token),
            None => WS_AUTH_PROTOCOL.to_string(),
        };
        ws_request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_str(&protocols)
                .map_err(|e| LedgerError::Config(e.to_string()))?,
        );

        let (mut ws, _) = tokio_tungstenite::connect_async(ws_request)
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;

        let body = wire::updates_body(
            request.begin_exclusive,
            &request.parties,
            &request.template_ids,
        );
        let text = serde_json::to_string(&body).map_err(|e| LedgerError::Malformed(e.to_string()))?;
        ws.send(Message::Text(text.into()))
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;
        debug!(
            begin_exclusive = request.begin_exclusive,
            "[cb-01] Update stream opened"
        );

        let max = self.max_message_size;
        let updates = stream::unfold(Some(ws), move |state| async move {
            let mut ws = state?;
            loop {
                match ws.next().await {
                    None | Some(Ok(Message::Close(_))) => return None,
                    Some(Ok(Message::Text(text))) => {
                        if text.len() > max {
                            let err = LedgerError::Malformed(format!(
                                "update message of {} bytes exceeds limit of {}",
                                text.len(),
                                max
                            ));
                            return Some((Err(err), None));
                        }
                        let decoded = serde_json::from_str::<Json>(text.as_str())
                            .map_err(|e| LedgerError::Malformed(e.to_string()))
                            .and_then(|body| wire::decode_update_message(&body));
                        match decoded {
                            Ok(Some(update)) => return Some((Ok(update), Some(ws))),
                            Ok(None) => continue,
                            Err(err) => return Some((Err(err), None)),
                        }
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!(error = %e, "[cb-01] Update stream transport error");
                        return Some((Err(LedgerError::Unavailable(e.to_string())), None));
                    }
                }
            }
        });
        Ok(updates.boxed())
    }

    async fn allocate_party(
        &self,
        token: Option<&str>,
        hint: &str,
    ) -> LedgerResult<PartyDetails> {
        let body = serde_json::json!({ "partyIdHint": hint, "identityProviderId": "" });
        let response: AllocatePartyResponse = self.post(token, "/v2/parties", &body).await?;
        Ok(PartyDetails {
            party: response.party_details.party,
            is_local: response.party_details.is_local,
        })
    }

    async fn generate_external_party_topology(
        &self,
        token: Option<&str>,
        synchronizer_id: &str,
        hint: &str,
        public_key_spki_der: &[u8],
    ) -> LedgerResult<ExternalPartyTopology> {
        let body = wire::generate_topology_body(synchronizer_id, hint, public_key_spki_der);
        let response: GenerateTopologyResponse = self
            .post(token, "/v2/parties/external/generate-topology", &body)
            .await?;
        Ok(ExternalPartyTopology {
            multi_hash: wire::decode_base64("multiHash", &response.multi_hash)?,
            party_id: response.party_id,
            public_key_fingerprint: response.public_key_fingerprint,
            topology_transactions: response.topology_transactions,
        })
    }

    async fn allocate_external_party(
        &self,
        token: Option<&str>,
        synchronizer_id: &str,
        topology: &ExternalPartyTopology,
        signature: &Signature,
    ) -> LedgerResult<PartyId> {
        let body = wire::allocate_external_body(
            synchronizer_id,
            &topology.topology_transactions,
            signature,
        );
        let response: AllocateExternalPartyResponse = self
            .post(token, "/v2/parties/external/allocate", &body)
            .await?;
        Ok(response.party_id)
    }

    async fn grant_user_rights(
        &self,
        token: Option<&str>,
        user_id: &str,
        rights: &[UserRight],
    ) -> LedgerResult<()> {
        let path = format!("/v2/users/{}/rights", user_id);
        self.post_json(token, &path, &wire::grant_rights_body(user_id, rights))
            .await?;
        Ok(())
    }

    async fn connected_synchronizers(&self, token: Option<&str>) -> LedgerResult<Vec<String>> {
        let response: ConnectedSynchronizersResponse = self
            .get(token, "/v2/state/connected-synchronizers")
            .await?;
        Ok(response
            .connected_synchronizers
            .into_iter()
            .map(|s| s.synchronizer_id)
            .collect())
    }
}
