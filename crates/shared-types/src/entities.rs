//! # Shared Entities
//!
//! Identifiers and records that cross subsystem boundaries: fingerprints,
//! registered users, persisted bridge events and the reconciliation checkpoint.

use crate::amount::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// Ledger party identifier (`hint::namespace-fingerprint`).
pub type PartyId = String;

/// Ledger contract identifier.
pub type ContractId = String;

/// Ledger offset. Zero means "ledger is empty".
pub type Offset = i64;

/// Derive the bridge fingerprint for an EVM address.
///
/// The fingerprint is the keccak-256 digest of the 20 raw address bytes,
/// rendered as `0x`-prefixed lowercase hex. Returns `None` when the input is
/// not a 20-byte hex address.
pub fn fingerprint_from_evm_address(address: &str) -> Option<String> {
    let stripped = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address);
    let bytes = hex::decode(stripped).ok()?;
    if bytes.len() != 20 {
        return None;
    }
    let digest = Keccak256::digest(&bytes);
    Some(format!("0x{}", hex::encode(digest)))
}

/// Canonical form of a fingerprint: trimmed, lowercase, `0x`-prefixed.
pub fn normalize_fingerprint(fingerprint: &str) -> String {
    let lowered = fingerprint.trim().to_ascii_lowercase();
    if lowered.starts_with("0x") {
        lowered
    } else {
        format!("0x{}", lowered)
    }
}

/// True when two fingerprints denote the same identity.
pub fn fingerprints_match(a: &str, b: &str) -> bool {
    !a.trim().is_empty() && normalize_fingerprint(a) == normalize_fingerprint(b)
}

/// A user registered with the relayer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// EVM address the user registered with.
    pub evm_address: String,
    /// Fingerprint derived from the EVM address.
    pub fingerprint: String,
    /// Ledger party, once allocated.
    pub party_id: Option<PartyId>,
    /// Fingerprint mapping contract, once created.
    pub mapping_cid: Option<ContractId>,
}

impl User {
    /// Registered users are the ones with a known ledger party.
    pub fn is_registered(&self) -> bool {
        self.party_id.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// Direction of a persisted bridge audit event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BridgeEventKind {
    /// Tokens created on the ledger for an EVM deposit.
    Mint,
    /// Tokens destroyed on the ledger for an EVM withdrawal.
    Burn,
}

/// A mint or burn audit event as persisted by the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeEventRecord {
    /// Audit contract ID (processed-set key).
    pub contract_id: ContractId,
    /// Mint or burn.
    pub kind: BridgeEventKind,
    /// Recipient (mint) or burner (burn) party.
    pub party_id: PartyId,
    /// User fingerprint recorded on the event.
    pub fingerprint: String,
    /// Token symbol.
    pub symbol: String,
    /// Quantity.
    pub amount: Amount,
    /// EVM deposit tx hash (mint) or destination address (burn).
    pub evm_reference: String,
    /// Ledger time of the event.
    pub timestamp: DateTime<Utc>,
    /// Ledger offset the contract was created at.
    pub offset: Offset,
}

/// Reconciliation checkpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationState {
    /// Highest ledger offset fully processed by the event-sourced pass.
    pub last_processed_offset: Offset,
    /// When the last full reset-and-rebuild finished.
    pub last_full_reconcile_at: Option<DateTime<Utc>>,
    /// Bridge events processed since the store was created or cleared.
    pub events_processed: u64,
    /// When the checkpoint was last written.
    pub updated_at: Option<DateTime<Utc>>,
}
