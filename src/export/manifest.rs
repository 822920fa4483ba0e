//! Export manifest builder, dual mode.
//!
//! Review mode hashes decrypted plaintext so a reviewer can check files they
//! received in the clear. Encrypted mode hashes the canonicalized encrypted
//! payload so a bundle can be checked for integrity without the vault key.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::canonical::canonical_stringify;
use crate::crypto::blob::{decrypt_blob, EncryptedBlob};
use crate::crypto::VaultKey;
use crate::error::KernelError;
use crate::iso8601;
use crate::types::{EncryptedPayload, EvidenceItem, ItemLocation};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    Review,
    Encrypted,
}

impl OutputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::Review => "review",
            OutputMode::Encrypted => "encrypted",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    Original,
    Redacted,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Original => "original",
            Variant::Redacted => "redacted",
        }
    }
}

fn extension_from_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "video/webm" | "audio/webm" => "webm",
        "audio/mpeg" => "mp3",
        "audio/wav" => "wav",
        "audio/ogg" => "ogg",
        "application/json" => "json",
        _ => "bin",
    }
}

/// Deterministic export filename for one variant of one item.
pub fn export_filename(item_id: &str, variant: Variant, mode: OutputMode, mime: &str) -> String {
    let base = format!("item-{}-{}", item_id, variant.as_str());
    match mode {
        OutputMode::Encrypted => format!("{base}.enc.json"),
        OutputMode::Review => format!("{base}.{}", extension_from_mime(mime)),
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestLocation {
    pub lat: f64,
    pub lon: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    /// ISO-8601, unlike the epoch-ms timestamp stored on the item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestFileEntry {
    pub filename: String,
    pub sha256: String,
    pub captured_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub what: Option<String>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub location_desc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<ManifestLocation>,
    pub custody_log: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportManifest {
    pub export_id: String,
    pub created_at: String,
    pub output_mode: OutputMode,
    pub include_originals: bool,
    pub include_redacted: bool,
    pub include_metadata: bool,
    pub files: Vec<ManifestFileEntry>,
}

pub struct BuildManifestInput<'a> {
    pub export_id: &'a str,
    pub items: &'a [EvidenceItem],
    pub include_originals: bool,
    pub include_redacted: bool,
    pub include_metadata: bool,
    pub output_mode: OutputMode,
    pub vault_key: Option<&'a VaultKey>,
}

#[derive(Debug)]
pub struct ManifestBuild {
    pub manifest: ExportManifest,
    pub json: String,
    pub csv: String,
}

pub(crate) struct ResolvedVariant<'a> {
    pub payload: &'a EncryptedPayload,
    pub mime: &'a str,
    pub size: u64,
}

/// The encrypted payload, mime and size for a variant, or `None` when the
/// item has no such variant.
pub(crate) fn resolve_variant(item: &EvidenceItem, variant: Variant) -> Option<ResolvedVariant<'_>> {
    match variant {
        Variant::Original => Some(ResolvedVariant {
            payload: &item.encrypted_blob,
            mime: &item.blob_mime,
            size: item.blob_size,
        }),
        Variant::Redacted => item.redacted_blob.as_ref().map(|payload| ResolvedVariant {
            payload,
            mime: item.redacted_mime.as_deref().unwrap_or(&item.blob_mime),
            size: item.redacted_size.unwrap_or(item.blob_size),
        }),
    }
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Canonical bytes of an encrypted payload as placed in encrypted-mode
/// bundles and hashed for encrypted-mode manifests.
pub(crate) fn encrypted_payload_bytes(resolved: &ResolvedVariant<'_>) -> Vec<u8> {
    let canonical = canonical_stringify(&json!({
        "nonce": resolved.payload.nonce,
        "cipher": resolved.payload.cipher,
        "mime": resolved.mime,
        "size": resolved.size,
    }));
    canonical.into_bytes()
}

/// Resolve one variant's exportable bytes and their manifest hash.
///
/// Review mode decrypts and hashes the plaintext; encrypted mode hashes the
/// canonical payload without touching the vault key.
pub(crate) fn resolve_content(
    item: &EvidenceItem,
    variant: Variant,
    mode: OutputMode,
    vault_key: Option<&VaultKey>,
) -> Result<Option<(String, Vec<u8>, String)>> {
    let Some(resolved) = resolve_variant(item, variant) else {
        return Ok(None);
    };
    let filename = export_filename(&item.id, variant, mode, resolved.mime);

    let (bytes, sha256) = match mode {
        OutputMode::Review => {
            let key = vault_key.ok_or(KernelError::MissingVaultKey)?;
            let blob = EncryptedBlob::from_payload(resolved.payload, resolved.mime, resolved.size);
            let plaintext = decrypt_blob(key, &blob)?;
            let hash = sha256_hex(&plaintext);
            (plaintext, hash)
        }
        OutputMode::Encrypted => {
            let bytes = encrypted_payload_bytes(&resolved);
            let hash = sha256_hex(&bytes);
            (bytes, hash)
        }
    };

    Ok(Some((filename, bytes, sha256)))
}

fn manifest_location(location: &ItemLocation) -> ManifestLocation {
    ManifestLocation {
        lat: location.lat,
        lon: location.lon,
        accuracy: location.accuracy,
        ts: location.ts.map(iso8601),
    }
}

fn custody_pointer(item_id: &str) -> String {
    format!("custody/{item_id}.json")
}

fn manifest_entry(
    item: &EvidenceItem,
    filename: String,
    sha256: String,
    input: &BuildManifestInput<'_>,
) -> ManifestFileEntry {
    let metadata = input.include_metadata.then_some(&item.metadata);
    let location = if input.include_metadata {
        item.location.as_ref().map(manifest_location)
    } else {
        None
    };

    ManifestFileEntry {
        filename,
        sha256,
        captured_at: iso8601(item.captured_at),
        what: metadata.and_then(|m| m.what.clone()),
        location_desc: metadata.and_then(|m| m.r#where.clone()),
        notes: metadata.and_then(|m| m.notes.clone()),
        location,
        custody_log: custody_pointer(&item.id),
    }
}

fn escape_csv(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_opt(value: Option<&str>) -> String {
    value.map_or_else(String::new, escape_csv)
}

fn csv_num(value: Option<f64>) -> String {
    value.map_or_else(String::new, |n| n.to_string())
}

/// Fixed column order; fields with commas, quotes or newlines are quoted.
pub fn manifest_to_csv(files: &[ManifestFileEntry]) -> String {
    let mut lines = vec![
        "filename,sha256,capturedAt,what,where,notes,location_lat,location_lon,location_accuracy,location_ts,custody_log".to_string(),
    ];
    for file in files {
        let location = file.location.as_ref();
        lines.push(
            [
                escape_csv(&file.filename),
                escape_csv(&file.sha256),
                escape_csv(&file.captured_at),
                csv_opt(file.what.as_deref()),
                csv_opt(file.location_desc.as_deref()),
                csv_opt(file.notes.as_deref()),
                csv_num(location.map(|l| l.lat)),
                csv_num(location.map(|l| l.lon)),
                csv_num(location.and_then(|l| l.accuracy)),
                csv_opt(location.and_then(|l| l.ts.as_deref())),
                escape_csv(&file.custody_log),
            ]
            .join(","),
        );
    }
    lines.join("\n")
}

/// Build the manifest for the selected items in both JSON and CSV renderings.
pub fn build_export_manifest(input: BuildManifestInput<'_>) -> Result<ManifestBuild> {
    let (build, _) = build_manifest_with_media(input)?;
    Ok(build)
}

/// Build the manifest together with the exportable media bytes, resolving
/// (and in review mode decrypting) each variant exactly once.
pub(crate) fn build_manifest_with_media(
    input: BuildManifestInput<'_>,
) -> Result<(ManifestBuild, Vec<(String, Vec<u8>)>)> {
    let mut files = Vec::new();
    let mut media = Vec::new();
    for item in input.items {
        let mut variants = Vec::new();
        if input.include_originals {
            variants.push(Variant::Original);
        }
        if input.include_redacted {
            variants.push(Variant::Redacted);
        }
        for variant in variants {
            if let Some((filename, bytes, sha256)) =
                resolve_content(item, variant, input.output_mode, input.vault_key)?
            {
                files.push(manifest_entry(item, filename.clone(), sha256, &input));
                media.push((filename, bytes));
            }
        }
    }

    let manifest = ExportManifest {
        export_id: input.export_id.to_string(),
        created_at: iso8601(crate::now_ms()?),
        output_mode: input.output_mode,
        include_originals: input.include_originals,
        include_redacted: input.include_redacted,
        include_metadata: input.include_metadata,
        files,
    };

    let json = serde_json::to_string_pretty(&manifest)?;
    let csv = manifest_to_csv(&manifest.files);
    Ok((
        ManifestBuild {
            manifest,
            json,
            csv,
        },
        media,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::blob::encrypt_blob;
    use crate::types::{ItemMetadata, ItemType};

    fn test_key() -> VaultKey {
        VaultKey::from_bytes([7u8; 32])
    }

    fn photo_item(id: &str, plaintext: &[u8]) -> EvidenceItem {
        let blob = encrypt_blob(&test_key(), plaintext.to_vec(), Some("image/jpeg")).unwrap();
        EvidenceItem {
            id: id.to_string(),
            item_type: ItemType::Photo,
            created_at: 1_700_000_000_000,
            captured_at: 1_700_000_000_000,
            encrypted_blob: blob.payload(),
            blob_mime: blob.mime.clone(),
            blob_size: blob.size,
            redacted_blob: None,
            redacted_mime: None,
            redacted_size: None,
            metadata: ItemMetadata::default(),
            location: None,
            redaction: None,
            ai_suggestions: None,
            updated_at: None,
        }
    }

    fn build(items: &[EvidenceItem], mode: OutputMode, key: Option<&VaultKey>) -> Result<ManifestBuild> {
        build_export_manifest(BuildManifestInput {
            export_id: "exp-1",
            items,
            include_originals: true,
            include_redacted: true,
            include_metadata: true,
            output_mode: mode,
            vault_key: key,
        })
    }

    #[test]
    fn review_mode_hashes_plaintext() {
        let key = test_key();
        let plaintext = b"known plaintext bytes";
        let items = vec![photo_item("a1", plaintext)];
        let built = build(&items, OutputMode::Review, Some(&key)).unwrap();
        assert_eq!(built.manifest.files.len(), 1);
        let entry = &built.manifest.files[0];
        assert_eq!(entry.filename, "item-a1-original.jpg");
        assert_eq!(entry.sha256, sha256_hex(plaintext));
        assert_eq!(entry.custody_log, "custody/a1.json");
    }

    #[test]
    fn encrypted_mode_hashes_canonical_payload_without_key() {
        let items = vec![photo_item("a1", b"bytes")];
        let built = build(&items, OutputMode::Encrypted, None).unwrap();
        let entry = &built.manifest.files[0];
        assert_eq!(entry.filename, "item-a1-original.enc.json");
        let resolved = resolve_variant(&items[0], Variant::Original).unwrap();
        let expected = sha256_hex(&encrypted_payload_bytes(&resolved));
        assert_eq!(entry.sha256, expected);
    }

    #[test]
    fn review_mode_without_key_is_refused() {
        let items = vec![photo_item("a1", b"bytes")];
        let err = build(&items, OutputMode::Review, None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<KernelError>(),
            Some(KernelError::MissingVaultKey)
        ));
    }

    #[test]
    fn missing_redacted_variant_is_skipped() {
        let key = test_key();
        let items = vec![photo_item("a1", b"bytes")];
        let built = build(&items, OutputMode::Review, Some(&key)).unwrap();
        assert_eq!(built.manifest.files.len(), 1);
    }

    #[test]
    fn redacted_variant_gets_its_own_entry() {
        let key = test_key();
        let mut item = photo_item("a1", b"bytes");
        let redacted = encrypt_blob(&key, b"pixelated".to_vec(), Some("image/png")).unwrap();
        item.redacted_blob = Some(redacted.payload());
        item.redacted_mime = Some(redacted.mime.clone());
        item.redacted_size = Some(redacted.size);
        let built = build(&[item], OutputMode::Review, Some(&key)).unwrap();
        let names: Vec<&str> = built
            .manifest
            .files
            .iter()
            .map(|f| f.filename.as_str())
            .collect();
        assert_eq!(names, ["item-a1-original.jpg", "item-a1-redacted.png"]);
    }

    #[test]
    fn metadata_is_omitted_when_not_requested() {
        let key = test_key();
        let mut item = photo_item("a1", b"bytes");
        item.metadata.notes = Some("sensitive".to_string());
        let built = build_export_manifest(BuildManifestInput {
            export_id: "exp-1",
            items: std::slice::from_ref(&item),
            include_originals: true,
            include_redacted: false,
            include_metadata: false,
            output_mode: OutputMode::Review,
            vault_key: Some(&key),
        })
        .unwrap();
        assert!(built.manifest.files[0].notes.is_none());
        assert!(!built.json.contains("sensitive"));
    }

    #[test]
    fn csv_escapes_commas_and_quotes() {
        let key = test_key();
        let mut item = photo_item("a1", b"bytes");
        item.metadata.notes = Some("has, comma and \"quote\"".to_string());
        let built = build(&[item], OutputMode::Review, Some(&key)).unwrap();
        assert!(built
            .csv
            .contains("\"has, comma and \"\"quote\"\"\""));
        assert!(built.csv.starts_with("filename,sha256,capturedAt,"));
    }

    #[test]
    fn media_bytes_ride_along_with_their_entries() {
        let key = test_key();
        let plaintext = b"decrypted exactly once";
        let items = vec![photo_item("a1", plaintext)];
        let (built, media) = build_manifest_with_media(BuildManifestInput {
            export_id: "exp-1",
            items: &items,
            include_originals: true,
            include_redacted: false,
            include_metadata: false,
            output_mode: OutputMode::Review,
            vault_key: Some(&key),
        })
        .unwrap();
        assert_eq!(media.len(), built.manifest.files.len());
        assert_eq!(media[0].0, built.manifest.files[0].filename);
        assert_eq!(media[0].1, plaintext);
        assert_eq!(built.manifest.files[0].sha256, sha256_hex(&media[0].1));
    }

    #[test]
    fn unknown_mime_falls_back_to_bin() {
        assert_eq!(
            export_filename("x", Variant::Original, OutputMode::Review, "application/x-weird"),
            "item-x-original.bin"
        );
    }
}
