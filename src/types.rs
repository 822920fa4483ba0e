//! Persisted data model: vault metadata, evidence items and custody events.
//!
//! Wire names are camelCase; the same shapes appear in the database payloads
//! and in exported artifacts.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The single vault row is keyed by this id.
pub const PRIMARY_VAULT_ID: &str = "primary";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VaultStatus {
    Locked,
    Unlocked,
}

/// KDF cost parameters, persisted alongside the salt. Deriving a matching
/// master key later requires the exact parameters used at creation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KdfParams {
    /// Algorithm tag, `"argon2id"`.
    pub alg: String,
    /// Memory cost in KiB.
    pub m_cost_kib: u32,
    /// Number of passes.
    pub t_cost: u32,
    /// Lanes.
    pub parallelism: u32,
    pub salt_bytes: u32,
    pub key_bytes: u32,
}

/// A key encrypted under another key. Nonce and ciphertext are base64.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WrappedKey {
    pub nonce: String,
    pub cipher: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultMeta {
    pub id: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub vault_name: String,
    /// Lock state as presented to the user. The kernel writes `unlocked` at
    /// creation and never transitions it; maintaining it across lock and
    /// unlock is the surrounding application's concern.
    pub status: VaultStatus,
    /// KDF salt, base64.
    pub salt: String,
    pub kdf_params: KdfParams,
    /// Vault key encrypted under the passphrase-derived master key.
    pub wrapped_vault_key: WrappedKey,
    /// Ed25519 verifying key, base64. Stored in plaintext.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_public_key: Option<String>,
    /// Signing private key encrypted under the *vault key*, one indirection
    /// below the master key. Never stored unwrapped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrapped_signing_key: Option<WrappedKey>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Photo,
    Video,
    Audio,
    Testimony,
}

/// An encrypted payload at rest: base64 nonce + ciphertext.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedPayload {
    pub nonce: String,
    pub cipher: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub what: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#where: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemLocation {
    pub lat: f64,
    pub lon: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    /// Fix timestamp, epoch milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RedactionRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRedaction {
    /// Only `"pixelate"` today.
    pub method: String,
    pub rects: Vec<RedactionRect>,
    pub created_at: i64,
}

/// Bookkeeping for detector-suggested redaction regions. The detector itself
/// is an external collaborator; only its output is persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSuggestions {
    pub model_version: String,
    pub detected_at: i64,
    pub boxes: Vec<RedactionRect>,
}

/// A captured or imported piece of evidence. The original `encrypted_blob`
/// is never mutated; saving a redacted copy adds the derived artifact
/// alongside it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceItem {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub created_at: i64,
    pub captured_at: i64,
    pub encrypted_blob: EncryptedPayload,
    pub blob_mime: String,
    /// Original plaintext length in bytes.
    pub blob_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redacted_blob: Option<EncryptedPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redacted_mime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redacted_size: Option<u64>,
    #[serde(default)]
    pub metadata: ItemMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<ItemLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redaction: Option<ItemRedaction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_suggestions: Option<AiSuggestions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CustodyAction {
    Capture,
    Redact,
    Export,
    Verify,
    Delete,
}

impl CustodyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustodyAction::Capture => "capture",
            CustodyAction::Redact => "redact",
            CustodyAction::Export => "export",
            CustodyAction::Verify => "verify",
            CustodyAction::Delete => "delete",
        }
    }
}

/// One link in an item's custody chain.
///
/// `hash` commits to `{id, itemId, ts, action, details}` plus the previous
/// event's hash; `prev_hash`, `hash` and `signature` are excluded from the
/// hashed content to avoid self-reference. Events are never mutated or
/// deleted; any edit surfaces as a hash mismatch on verification.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustodyEvent {
    pub id: String,
    pub item_id: String,
    /// Epoch milliseconds; non-decreasing per item in append order.
    pub ts: i64,
    pub action: CustodyAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Previous event's hash, absent for the first event of an item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_hash: Option<String>,
    /// base64 SHA-256 chain hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Detached Ed25519 signature over the UTF-8 bytes of `hash`, base64.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}
