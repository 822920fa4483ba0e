//! Custody-log transcript for exports.
//!
//! Each line re-derives an export-transcript hash chain over the same
//! canonical content as the stored chain, seeded with the empty string per
//! item. The transcript is self-verifying from the exported lines alone;
//! a verifier needs neither the database nor the stored hashes, though the
//! stored hash, signature and public key ride along for signature checks.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::custody::schema::canonical_event_content;
use crate::store::EvidenceStore;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustodyLogEntry {
    pub id: String,
    pub item_id: String,
    pub ts: i64,
    pub action: String,
    pub details: Option<Value>,
    pub prev_hash: Option<String>,
    pub hash: Option<String>,
    pub signature: Option<String>,
    pub public_key: Option<String>,
    /// Canonical content the chain hashes commit to.
    pub canonical: String,
    /// Transcript hash of the prior line for this item, `""` on the first.
    pub export_prev_hash_sha256: String,
    /// hex SHA-256 over `exportPrevHashSha256 || canonical`.
    pub export_hash_sha256: String,
}

pub(crate) fn transcript_hash(prev: &str, canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev.as_bytes());
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Build the JSON-lines custody log for the given items, one event per
/// line, each item's chain sorted by `ts`. Duplicate item ids are emitted
/// once, in first-seen order.
pub fn build_custody_log(store: &dyn EvidenceStore, item_ids: &[&str]) -> Result<String> {
    let public_key = store.vault_meta()?.and_then(|meta| meta.signing_public_key);

    let mut seen: Vec<&str> = Vec::new();
    for &id in item_ids {
        if !seen.contains(&id) {
            seen.push(id);
        }
    }

    let mut lines = Vec::new();
    for item_id in seen {
        let events = store.custody_events_for_item(item_id)?;
        let mut prev = String::new();
        for event in events {
            let canonical = canonical_event_content(&event);
            let export_hash = transcript_hash(&prev, &canonical);
            let entry = CustodyLogEntry {
                id: event.id,
                item_id: event.item_id,
                ts: event.ts,
                action: event.action.as_str().to_string(),
                details: event.details,
                prev_hash: event.prev_hash,
                hash: event.hash,
                signature: event.signature,
                public_key: public_key.clone(),
                canonical,
                export_prev_hash_sha256: prev,
                export_hash_sha256: export_hash.clone(),
            };
            lines.push(serde_json::to_string(&entry)?);
            prev = export_hash;
        }
    }

    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::vault::{create_vault_with_params, test_kdf_params};
    use crate::custody::chain::{append_custody_event, AppendCustodyEvent};
    use crate::store::InMemoryEvidenceStore;
    use crate::types::CustodyAction;
    use serde_json::json;

    fn store_with_chain() -> InMemoryEvidenceStore {
        let mut store = InMemoryEvidenceStore::new();
        let created =
            create_vault_with_params(&mut store, "v", "pw", test_kdf_params()).unwrap();
        for action in [CustodyAction::Capture, CustodyAction::Redact] {
            append_custody_event(
                &mut store,
                AppendCustodyEvent {
                    item_id: "item-1",
                    action,
                    details: Some(json!({"step": action.as_str()})),
                    vault_key: &created.vault_key,
                },
            )
            .unwrap();
        }
        store
    }

    #[test]
    fn transcript_chains_from_empty_seed() {
        let store = store_with_chain();
        let log = build_custody_log(&store, &["item-1"]).unwrap();
        let entries: Vec<CustodyLogEntry> = log
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].export_prev_hash_sha256, "");
        assert_eq!(
            entries[0].export_hash_sha256,
            transcript_hash("", &entries[0].canonical)
        );
        assert_eq!(
            entries[1].export_prev_hash_sha256,
            entries[0].export_hash_sha256
        );
        assert!(!entries[1].export_hash_sha256.is_empty());
    }

    #[test]
    fn lines_carry_stored_chain_and_public_key() {
        let store = store_with_chain();
        let log = build_custody_log(&store, &["item-1"]).unwrap();
        let entries: Vec<CustodyLogEntry> = log
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert!(entries[0].hash.is_some());
        assert!(entries[0].signature.is_some());
        assert!(entries[0].public_key.is_some());
        assert!(entries[0].prev_hash.is_none());
        assert_eq!(entries[1].prev_hash, entries[0].hash);
    }

    #[test]
    fn nulls_are_explicit_on_the_wire() {
        let store = store_with_chain();
        let log = build_custody_log(&store, &["item-1"]).unwrap();
        let first: Value = serde_json::from_str(log.lines().next().unwrap()).unwrap();
        assert!(first.get("prevHash").is_some());
        assert_eq!(first["prevHash"], Value::Null);
    }

    #[test]
    fn duplicate_item_ids_are_emitted_once() {
        let store = store_with_chain();
        let log = build_custody_log(&store, &["item-1", "item-1"]).unwrap();
        assert_eq!(log.lines().count(), 2);
    }

    #[test]
    fn unknown_item_contributes_no_lines() {
        let store = store_with_chain();
        let log = build_custody_log(&store, &["missing"]).unwrap();
        assert!(log.is_empty());
    }
}
