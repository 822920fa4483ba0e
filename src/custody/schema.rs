//! Canonical projection of a custody event.
//!
//! Only `{id, itemId, ts, action, details}` participate in hashing;
//! `prevHash`, `hash` and `signature` are excluded so the hash never refers
//! to itself. Absent `details` canonicalizes to an explicit null.

use serde_json::{json, Value};

use crate::canonical::canonical_stringify;
use crate::types::CustodyEvent;

/// The hashed content fields of an event, as a JSON value.
pub fn custody_event_content(event: &CustodyEvent) -> Value {
    json!({
        "id": event.id,
        "itemId": event.item_id,
        "ts": event.ts,
        "action": event.action.as_str(),
        "details": event.details.clone().unwrap_or(Value::Null),
    })
}

/// Canonical string form of the hashed content fields.
pub fn canonical_event_content(event: &CustodyEvent) -> String {
    canonical_stringify(&custody_event_content(event))
}
