//! Replay verification of a custody chain.

use crate::custody::chain::chain_hash;
use crate::custody::schema::canonical_event_content;
use crate::types::CustodyEvent;

/// Replay the chain from its genesis event and check every link.
///
/// Events are ordered by timestamp with the stored order as tie-break,
/// matching the order appends produced them in. An empty chain verifies.
pub fn verify_custody_chain(events: &[CustodyEvent]) -> bool {
    let mut ordered: Vec<&CustodyEvent> = events.iter().collect();
    ordered.sort_by_key(|event| event.ts);

    let mut prev: Option<String> = None;
    for event in ordered {
        if event.prev_hash != prev {
            return false;
        }
        let canonical = canonical_event_content(event);
        let expected = chain_hash(prev.as_deref(), &canonical);
        match &event.hash {
            Some(stored) if *stored == expected => {}
            _ => return false,
        }
        prev = event.hash.clone();
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::vault::{create_vault_with_params, test_kdf_params};
    use crate::crypto::VaultKey;
    use crate::custody::chain::{append_custody_event, AppendCustodyEvent};
    use crate::store::{EvidenceStore, InMemoryEvidenceStore};
    use crate::types::CustodyAction;
    use serde_json::json;

    fn chain_of(n: usize) -> (InMemoryEvidenceStore, VaultKey) {
        let mut store = InMemoryEvidenceStore::new();
        let created =
            create_vault_with_params(&mut store, "v", "pw", test_kdf_params()).unwrap();
        for i in 0..n {
            append_custody_event(
                &mut store,
                AppendCustodyEvent {
                    item_id: "item-1",
                    action: CustodyAction::Capture,
                    details: Some(json!({"seq": i})),
                    vault_key: &created.vault_key,
                },
            )
            .unwrap();
        }
        (store, created.vault_key)
    }

    #[test]
    fn empty_chain_verifies() {
        assert!(verify_custody_chain(&[]));
    }

    #[test]
    fn intact_chain_verifies() {
        let (store, _) = chain_of(4);
        let events = store.custody_events_for_item("item-1").unwrap();
        assert!(verify_custody_chain(&events));
    }

    #[test]
    fn tampered_details_break_verification() {
        let (store, _) = chain_of(3);
        let mut events = store.custody_events_for_item("item-1").unwrap();
        events[1].details = Some(json!({"seq": 99}));
        assert!(!verify_custody_chain(&events));
    }

    #[test]
    fn removed_middle_event_breaks_verification() {
        let (store, _) = chain_of(3);
        let mut events = store.custody_events_for_item("item-1").unwrap();
        events.remove(1);
        assert!(!verify_custody_chain(&events));
    }

    #[test]
    fn shifted_timestamp_breaks_verification() {
        let (store, _) = chain_of(3);
        let mut events = store.custody_events_for_item("item-1").unwrap();
        // ts is part of the signed content; moving the genesis event later
        // both reorders the replay and invalidates its hash.
        events[0].ts = events[2].ts + 1;
        assert!(!verify_custody_chain(&events));
    }

    #[test]
    fn altered_stored_hash_breaks_verification() {
        let (store, _) = chain_of(2);
        let mut events = store.custody_events_for_item("item-1").unwrap();
        events[1].hash = Some("bm90LXRoZS1oYXNo".to_string());
        assert!(!verify_custody_chain(&events));
    }
}
