//! Appending to an item's custody chain.

use std::collections::HashSet;

use anyhow::Result;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::crypto::signing::sign_hash;
use crate::crypto::{base64_encode, VaultKey};
use crate::custody::schema::canonical_event_content;
use crate::error::KernelError;
use crate::store::EvidenceStore;
use crate::types::{CustodyAction, CustodyEvent};
use crate::{new_id, now_ms};

/// Chain hash: base64 SHA-256 over the previous hash string (empty for the
/// first event) followed by the canonical content bytes.
pub fn chain_hash(prev_hash: Option<&str>, canonical_content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.unwrap_or("").as_bytes());
    hasher.update(canonical_content.as_bytes());
    base64_encode(&hasher.finalize())
}

pub struct AppendCustodyEvent<'a> {
    pub item_id: &'a str,
    pub action: CustodyAction,
    pub details: Option<Value>,
    pub vault_key: &'a VaultKey,
}

/// Append a signed event to the item's chain.
///
/// Reads the current tail, links the new event to it, signs the computed
/// hash under the vault's signing key and persists the event. Appends for
/// one item are serialized by exclusive store access; a chain that already
/// contains two events with the same predecessor is refused as corrupt
/// rather than extended.
pub fn append_custody_event(
    store: &mut dyn EvidenceStore,
    input: AppendCustodyEvent<'_>,
) -> Result<CustodyEvent> {
    let existing = store.custody_events_for_item(input.item_id)?;

    let mut seen = HashSet::new();
    for event in &existing {
        if let Some(prev) = event.prev_hash.as_deref() {
            if !seen.insert(prev) {
                return Err(KernelError::ChainForked {
                    item_id: input.item_id.to_string(),
                    prev_hash: prev.to_string(),
                }
                .into());
            }
        }
    }

    let tail = existing.last();
    let prev_hash = tail.and_then(|event| event.hash.clone());
    // ts must be non-decreasing per item even across clock steps.
    let now = now_ms()?;
    let ts = tail.map_or(now, |t| now.max(t.ts));

    let mut event = CustodyEvent {
        id: new_id(),
        item_id: input.item_id.to_string(),
        ts,
        action: input.action,
        details: input.details,
        prev_hash: prev_hash.clone(),
        hash: None,
        signature: None,
    };

    let canonical = canonical_event_content(&event);
    let hash = chain_hash(prev_hash.as_deref(), &canonical);
    let signed = sign_hash(store, input.vault_key, &hash)?;

    event.hash = Some(hash);
    event.signature = Some(signed.signature);
    store.add_custody_event(&event)?;

    Ok(event)
}
