//! End-to-end scenarios over a real SQLite store.

use anyhow::Result;
use serde_json::json;

use evidence_kernel::crypto::blob::{decrypt_blob, encrypt_blob, EncryptedBlob};
use evidence_kernel::crypto::vault::create_vault_with_params;
use evidence_kernel::export::{
    verify_custody_log, verify_manifest_files, BuildExportInput, OutputMode,
};
use evidence_kernel::types::{ItemMetadata, ItemType, KdfParams};
use evidence_kernel::{
    append_custody_event, build_export_bundle, new_id, unlock_vault, verify_custody_chain,
    write_bundle_dir, AppendCustodyEvent, CustodyAction, EvidenceItem, EvidenceStore,
    KernelError, SqliteEvidenceStore, VaultKey,
};

fn cheap_kdf() -> KdfParams {
    KdfParams {
        alg: "argon2id".to_string(),
        m_cost_kib: 8,
        t_cost: 1,
        parallelism: 1,
        salt_bytes: 16,
        key_bytes: 32,
    }
}

fn item_from_blob(id: &str, blob: &EncryptedBlob, notes: Option<&str>) -> EvidenceItem {
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
        metadata: ItemMetadata {
            what: None,
            r#where: None,
            notes: notes.map(str::to_string),
        },
        location: None,
        redaction: None,
        ai_suggestions: None,
        updated_at: None,
    }
}

#[test]
fn capture_redact_verify_then_detect_tampering() -> Result<()> {
    let mut store = SqliteEvidenceStore::open_in_memory()?;
    create_vault_with_params(&mut store, "case vault", "correct-horse", cheap_kdf())?;
    let (_, vault_key) = unlock_vault(&store, "correct-horse")?;

    let blob = encrypt_blob(&vault_key, b"8 bytes!".to_vec(), Some("image/jpeg"))?;
    assert_eq!(decrypt_blob(&vault_key, &blob)?, b"8 bytes!");

    let item = item_from_blob("case-1", &blob, None);
    store.put_item(&item)?;

    for (action, details) in [
        (CustodyAction::Capture, json!({"source": "camera"})),
        (CustodyAction::Redact, json!({"method": "pixelate"})),
    ] {
        append_custody_event(
            &mut store,
            AppendCustodyEvent {
                item_id: "case-1",
                action,
                details: Some(details),
                vault_key: &vault_key,
            },
        )?;
    }

    let mut events = store.custody_events_for_item("case-1")?;
    assert_eq!(events.len(), 2);
    assert!(events[0].prev_hash.is_none());
    assert_eq!(events[1].prev_hash, events[0].hash);
    assert!(verify_custody_chain(&events));

    events[1].details = Some(json!({"method": "forged"}));
    assert!(!verify_custody_chain(&events));
    Ok(())
}

#[test]
fn wrong_passphrase_is_rejected_uniformly() -> Result<()> {
    let mut store = SqliteEvidenceStore::open_in_memory()?;
    create_vault_with_params(&mut store, "v", "correct-horse", cheap_kdf())?;

    let err = unlock_vault(&store, "incorrect-horse").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<KernelError>(),
        Some(KernelError::InvalidPassphrase)
    ));
    Ok(())
}

#[test]
fn review_export_bundle_is_offline_verifiable() -> Result<()> {
    let mut store = SqliteEvidenceStore::open_in_memory()?;
    create_vault_with_params(&mut store, "v", "pw", cheap_kdf())?;
    let (_, vault_key) = unlock_vault(&store, "pw")?;

    let original = encrypt_blob(&vault_key, b"original pixels".to_vec(), Some("image/jpeg"))?;
    let redacted = encrypt_blob(&vault_key, b"blurred pixels".to_vec(), Some("image/png"))?;
    let mut item = item_from_blob("pic-1", &original, Some("near the gate, \"north\" side"));
    item.redacted_blob = Some(redacted.payload());
    item.redacted_mime = Some(redacted.mime.clone());
    item.redacted_size = Some(redacted.size);
    store.put_item(&item)?;

    for (action, details) in [
        (CustodyAction::Capture, json!({"source": "camera"})),
        (CustodyAction::Redact, json!({"method": "pixelate"})),
    ] {
        append_custody_event(
            &mut store,
            AppendCustodyEvent {
                item_id: "pic-1",
                action,
                details: Some(details),
                vault_key: &vault_key,
            },
        )?;
    }

    let bundle = build_export_bundle(
        &store,
        BuildExportInput {
            export_id: &new_id(),
            item_ids: &["pic-1"],
            include_originals: true,
            include_redacted: true,
            include_metadata: true,
            output_mode: OutputMode::Review,
            vault_key: Some(&vault_key),
        },
    )?;

    let root = &bundle.root_dir;
    let paths: Vec<&str> = bundle.files.iter().map(|(p, _)| p.as_str()).collect();
    for expected in [
        format!("{root}/README.txt"),
        format!("{root}/manifest.json"),
        format!("{root}/manifest.csv"),
        format!("{root}/custody_log.jsonl"),
        format!("{root}/verify/verify.html"),
        format!("{root}/verify/verify.js"),
        format!("{root}/media/item-pic-1-original.jpg"),
        format!("{root}/media/item-pic-1-redacted.png"),
    ] {
        assert!(paths.contains(&expected.as_str()), "missing {expected}");
    }
    assert_eq!(paths.len(), 8);

    // every media file hashes to its manifest entry
    let media: Vec<(String, Vec<u8>)> = bundle
        .files
        .iter()
        .filter(|(p, _)| p.contains("/media/"))
        .map(|(p, b)| (p.rsplit('/').next().unwrap().to_string(), b.clone()))
        .collect();
    let file_report = verify_manifest_files(&bundle.manifest, &media);
    assert!(file_report.all_ok());
    assert_eq!(file_report.ok, 2);

    // two stored events, exactly two log lines, building appended nothing
    assert_eq!(bundle.custody_log.lines().count(), 2);
    assert_eq!(store.custody_events_for_item("pic-1")?.len(), 2);
    let log_report = verify_custody_log(&bundle.custody_log);
    assert!(log_report.all_ok());
    for line in bundle.custody_log.lines() {
        let value: serde_json::Value = serde_json::from_str(line)?;
        assert!(!value["exportHashSha256"].as_str().unwrap().is_empty());
    }

    // CSV quoting survives the comma and quote in notes
    assert!(bundle
        .manifest_csv
        .contains("\"near the gate, \"\"north\"\" side\""));

    // and the tree materializes on disk
    let dir = tempfile::tempdir()?;
    let written_root = write_bundle_dir(&bundle, dir.path())?;
    assert_eq!(
        std::fs::read(written_root.join("media/item-pic-1-original.jpg"))?,
        b"original pixels"
    );
    Ok(())
}

#[test]
fn encrypted_export_needs_no_vault_key() -> Result<()> {
    let mut store = SqliteEvidenceStore::open_in_memory()?;
    create_vault_with_params(&mut store, "v", "pw", cheap_kdf())?;
    let (_, vault_key) = unlock_vault(&store, "pw")?;

    let blob = encrypt_blob(&vault_key, b"sealed".to_vec(), Some("image/jpeg"))?;
    store.put_item(&item_from_blob("pic-1", &blob, None))?;
    append_custody_event(
        &mut store,
        AppendCustodyEvent {
            item_id: "pic-1",
            action: CustodyAction::Capture,
            details: None,
            vault_key: &vault_key,
        },
    )?;
    drop(vault_key);

    let bundle = build_export_bundle(
        &store,
        BuildExportInput {
            export_id: "exp-locked",
            item_ids: &["pic-1"],
            include_originals: true,
            include_redacted: false,
            include_metadata: false,
            output_mode: OutputMode::Encrypted,
            vault_key: None,
        },
    )?;

    let paths: Vec<&str> = bundle.files.iter().map(|(p, _)| p.as_str()).collect();
    assert!(paths
        .iter()
        .any(|p| p.ends_with("media/item-pic-1-original.enc.json")));
    // the encrypted payload file verifies against the manifest without a key
    let media: Vec<(String, Vec<u8>)> = bundle
        .files
        .iter()
        .filter(|(p, _)| p.contains("/media/"))
        .map(|(p, b)| (p.rsplit('/').next().unwrap().to_string(), b.clone()))
        .collect();
    assert!(verify_manifest_files(&bundle.manifest, &media).all_ok());
    Ok(())
}

#[test]
fn vault_key_round_trips_through_sqlite_reopen() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("evidence.db");
    let db = db_path.to_string_lossy().to_string();

    let first_key: VaultKey;
    {
        let mut store = SqliteEvidenceStore::open(&db)?;
        let created = create_vault_with_params(&mut store, "v", "pw", cheap_kdf())?;
        first_key = created.vault_key;
    }

    let store = SqliteEvidenceStore::open(&db)?;
    let (meta, reopened_key) = unlock_vault(&store, "pw")?;
    assert_eq!(first_key.as_bytes(), reopened_key.as_bytes());
    assert_eq!(meta.kdf_params.m_cost_kib, 8);
    Ok(())
}
