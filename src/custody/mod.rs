//! Per-item tamper-evident custody chains.
//!
//! Each evidence item carries an append-only sequence of signed events
//! linked by SHA-256 hashes. The chain proves internal consistency (no
//! retained record was altered undetected); the Ed25519 signature over each
//! hash proves origin. The two guarantees are orthogonal and verified
//! independently.

pub mod chain;
pub mod schema;
pub mod verify;

pub use chain::{append_custody_event, chain_hash, AppendCustodyEvent};
pub use schema::{canonical_event_content, custody_event_content};
pub use verify::verify_custody_chain;
