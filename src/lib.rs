//! Evidence Vault Kernel
//!
//! This crate implements the tamper-evident core of a local-first
//! evidence-capture application:
//!
//! - **Vault key management**: a passphrase-derived master key (Argon2id)
//!   wraps a random vault key; the vault key wraps an Ed25519 signing key.
//!   Secrets exist unwrapped in memory only for the duration of an operation.
//! - **Authenticated blob cipher**: media and testimony payloads are sealed
//!   with ChaCha20-Poly1305 under the vault key.
//! - **Custody chain**: every lifecycle event of an evidence item is appended
//!   to a per-item hash chain (SHA-256 over canonical JSON) and signed with
//!   the vault's signing key. The chain proves internal consistency; the
//!   signature proves origin. Both are verified independently.
//! - **Export protocol**: exports carry a manifest (JSON + CSV) of content
//!   hashes, a self-verifying custody-log transcript (JSON lines), and an
//!   offline verifier, so a third party can confirm integrity without the
//!   vault key, the database, or network access.
//!
//! Storage is an explicit [`EvidenceStore`] parameter threaded through every
//! operation; there is no process-global database handle.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use chrono::{TimeZone, Utc};

pub mod canonical;
pub mod config;
pub mod crypto;
pub mod custody;
pub mod error;
pub mod export;
pub mod store;
pub mod types;

pub use canonical::{canonical_stringify, canonicalize};
pub use crypto::blob::{decrypt_blob, encrypt_blob, EncryptedBlob};
pub use crypto::vault::{create_vault, create_vault_with_params, unlock_vault, CreatedVault};
pub use crypto::VaultKey;
pub use custody::{append_custody_event, chain_hash, verify_custody_chain, AppendCustodyEvent};
pub use error::KernelError;
pub use export::bundle::{build_export_bundle, write_bundle_dir, BuildExportInput, ExportBundle};
pub use export::manifest::{
    build_export_manifest, manifest_to_csv, BuildManifestInput, ExportManifest, ManifestBuild,
    ManifestFileEntry, OutputMode,
};
pub use store::{EvidenceStore, InMemoryEvidenceStore, SqliteEvidenceStore};
pub use types::{CustodyAction, CustodyEvent, EvidenceItem, ItemType, VaultMeta};

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> Result<i64> {
    let elapsed = SystemTime::now().duration_since(UNIX_EPOCH)?;
    Ok(i64::try_from(elapsed.as_millis())?)
}

/// Opaque unique identifier for items, events and exports.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Render a millisecond epoch timestamp as an ISO-8601 UTC string.
pub fn iso8601(ts_ms: i64) -> String {
    match Utc.timestamp_millis_opt(ts_ms).single() {
        Some(dt) => dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        None => String::new(),
    }
}
