//! Verification of exported artifacts, without the vault.
//!
//! Works from the exported files alone: manifest hashes are checked against
//! supplied file bytes, and the custody-log transcript is replayed per item.
//! Verification failure is reported as data, not raised as an error; the
//! caller branches on the report.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::canonical::canonical_stringify;
use crate::crypto::signing::verify_hash_signature;
use crate::error::KernelError;
use crate::export::custody_log::transcript_hash;
use crate::export::manifest::{sha256_hex, ExportManifest};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileStatus {
    Ok,
    Mismatch,
    NotInManifest,
}

#[derive(Clone, Debug)]
pub struct FileCheck {
    pub path: String,
    pub status: FileStatus,
}

#[derive(Clone, Debug, Default)]
pub struct ManifestReport {
    pub checks: Vec<FileCheck>,
    pub ok: usize,
    pub mismatched: usize,
    pub unmatched: usize,
}

impl ManifestReport {
    pub fn all_ok(&self) -> bool {
        self.mismatched == 0 && self.unmatched == 0
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Check supplied file bytes against manifest entries, matching by exact
/// path first, then `media/<basename>`, then bare basename.
pub fn verify_manifest_files(
    manifest: &ExportManifest,
    files: &[(String, Vec<u8>)],
) -> ManifestReport {
    let mut expected: BTreeMap<&str, &str> = BTreeMap::new();
    for entry in &manifest.files {
        expected.insert(entry.filename.as_str(), entry.sha256.as_str());
    }

    let mut report = ManifestReport::default();
    for (path, bytes) in files {
        let name = basename(path);
        let media_key = format!("media/{name}");
        let wanted = expected
            .get(path.as_str())
            .or_else(|| expected.get(media_key.as_str()))
            .or_else(|| expected.get(name));

        let status = match wanted {
            None => {
                report.unmatched += 1;
                FileStatus::NotInManifest
            }
            Some(hash) if sha256_hex(bytes) == **hash => {
                report.ok += 1;
                FileStatus::Ok
            }
            Some(_) => {
                report.mismatched += 1;
                FileStatus::Mismatch
            }
        };
        report.checks.push(FileCheck {
            path: path.clone(),
            status,
        });
    }
    report
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogIssue {
    MalformedLine { line: usize, reason: String },
    CanonicalMismatch { event_id: String },
    PrevHashMismatch { event_id: String },
    HashMismatch { event_id: String },
    SignatureInvalid { event_id: String },
}

impl fmt::Display for LogIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogIssue::MalformedLine { line, reason } => {
                write!(f, "line {line}: malformed entry ({reason})")
            }
            LogIssue::CanonicalMismatch { event_id } => {
                write!(f, "event {event_id}: canonical content mismatch")
            }
            LogIssue::PrevHashMismatch { event_id } => {
                write!(f, "event {event_id}: transcript prev-hash mismatch")
            }
            LogIssue::HashMismatch { event_id } => {
                write!(f, "event {event_id}: transcript hash mismatch")
            }
            LogIssue::SignatureInvalid { event_id } => {
                write!(f, "event {event_id}: signature invalid")
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct ItemReport {
    pub item_id: String,
    pub events: usize,
    pub issues: Vec<LogIssue>,
}

impl ItemReport {
    pub fn ok(&self) -> bool {
        self.issues.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct CustodyLogReport {
    pub items: Vec<ItemReport>,
    pub malformed: Vec<LogIssue>,
    pub items_ok: usize,
    pub items_failed: usize,
}

impl CustodyLogReport {
    pub fn all_ok(&self) -> bool {
        self.items_failed == 0 && self.malformed.is_empty()
    }
}

struct ParsedEntry {
    id: String,
    item_id: String,
    ts: i64,
    value: Value,
}

fn parse_line(line_no: usize, line: &str) -> Result<ParsedEntry, KernelError> {
    let malformed = |reason: String| KernelError::MalformedLogEntry {
        line: line_no,
        reason,
    };
    let value: Value = serde_json::from_str(line).map_err(|e| malformed(e.to_string()))?;
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing id".to_string()))?
        .to_string();
    let item_id = value
        .get("itemId")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing itemId".to_string()))?
        .to_string();
    let ts = value
        .get("ts")
        .and_then(Value::as_i64)
        .ok_or_else(|| malformed("missing ts".to_string()))?;
    for field in ["canonical", "exportPrevHashSha256", "exportHashSha256"] {
        if !value.get(field).is_some_and(Value::is_string) {
            return Err(malformed(format!("missing {field}")));
        }
    }
    Ok(ParsedEntry {
        id,
        item_id,
        ts,
        value,
    })
}

fn str_field<'a>(value: &'a Value, field: &str) -> &'a str {
    value.get(field).and_then(Value::as_str).unwrap_or("")
}

fn check_entry(entry: &ParsedEntry, prev: &str, issues: &mut Vec<LogIssue>) {
    let canonical = str_field(&entry.value, "canonical");

    // The canonical field must itself be the canonical rendering of the
    // entry's own content fields; otherwise a tampered line could carry a
    // consistent transcript over fabricated content.
    let content = serde_json::json!({
        "id": entry.id,
        "itemId": entry.item_id,
        "ts": entry.ts,
        "action": str_field(&entry.value, "action"),
        "details": entry.value.get("details").cloned().unwrap_or(Value::Null),
    });
    if canonical_stringify(&content) != canonical {
        issues.push(LogIssue::CanonicalMismatch {
            event_id: entry.id.clone(),
        });
    }

    if str_field(&entry.value, "exportPrevHashSha256") != prev {
        issues.push(LogIssue::PrevHashMismatch {
            event_id: entry.id.clone(),
        });
    }

    if transcript_hash(prev, canonical) != str_field(&entry.value, "exportHashSha256") {
        issues.push(LogIssue::HashMismatch {
            event_id: entry.id.clone(),
        });
    }

    let hash = entry.value.get("hash").and_then(Value::as_str);
    let signature = entry.value.get("signature").and_then(Value::as_str);
    let public_key = entry.value.get("publicKey").and_then(Value::as_str);
    if let (Some(hash), Some(signature), Some(public_key)) = (hash, signature, public_key) {
        if verify_hash_signature(public_key, hash, signature).is_err() {
            issues.push(LogIssue::SignatureInvalid {
                event_id: entry.id.clone(),
            });
        }
    }
}

/// Replay the custody-log transcript. Malformed lines are flagged and
/// skipped; they never abort the run.
pub fn verify_custody_log(text: &str) -> CustodyLogReport {
    let mut report = CustodyLogReport::default();
    let mut by_item: BTreeMap<String, Vec<ParsedEntry>> = BTreeMap::new();

    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(index + 1, line) {
            Ok(entry) => by_item.entry(entry.item_id.clone()).or_default().push(entry),
            Err(KernelError::MalformedLogEntry { line, reason }) => {
                report.malformed.push(LogIssue::MalformedLine { line, reason });
            }
            Err(other) => report.malformed.push(LogIssue::MalformedLine {
                line: index + 1,
                reason: other.to_string(),
            }),
        }
    }

    for (item_id, mut entries) in by_item {
        entries.sort_by_key(|entry| entry.ts);
        let mut issues = Vec::new();
        let mut prev = String::new();
        for entry in &entries {
            check_entry(entry, &prev, &mut issues);
            prev = str_field(&entry.value, "exportHashSha256").to_string();
        }
        if issues.is_empty() {
            report.items_ok += 1;
        } else {
            report.items_failed += 1;
        }
        report.items.push(ItemReport {
            item_id,
            events: entries.len(),
            issues,
        });
    }

    report
}
