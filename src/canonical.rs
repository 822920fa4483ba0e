//! Deterministic JSON canonicalization.
//!
//! Hashing and signing inputs must be byte-stable for structurally equal
//! values: object keys are sorted lexicographically at every depth, array
//! order is preserved, and non-finite numbers normalize to null. Absent
//! optional fields are the Rust analogue of `undefined` and are simply not
//! serialized; explicit nulls pass through.

use serde_json::{Map, Value};

/// Recursively normalize a JSON value into its canonical form.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => value.clone(),
        Value::Number(n) => {
            // serde_json cannot represent NaN/inf directly, but values built
            // through lossy float paths still get normalized to null here.
            match n.as_f64() {
                Some(f) if !f.is_finite() => Value::Null,
                _ => value.clone(),
            }
        }
        Value::Array(entries) => Value::Array(entries.iter().map(canonicalize).collect()),
        Value::Object(map) => {
            let mut sorted: Vec<(&String, &Value)> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = Map::new();
            for (key, entry) in sorted {
                out.insert(key.clone(), canonicalize(entry));
            }
            Value::Object(out)
        }
    }
}

/// Serialize the canonical form. For any two values that are deep-equal under
/// key-order-insensitive comparison, the output is byte-identical.
pub fn canonical_stringify(value: &Value) -> String {
    serde_json::to_string(&canonicalize(value)).expect("canonical value serializes")
}
