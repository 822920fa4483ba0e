//! vaultctl - operator CLI for the evidence vault
//!
//! Capture, redact and testimony write encrypted items and custody events;
//! verify replays the stored chains; export builds an offline-verifiable
//! bundle on disk.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

use evidence_kernel::config::EvidenceConfig;
use evidence_kernel::crypto::blob::encrypt_blob;
use evidence_kernel::crypto::signing::verify_hash_signature;
use evidence_kernel::crypto::vault::create_vault_with_params;
use evidence_kernel::export::{BuildExportInput, OutputMode};
use evidence_kernel::types::{
    ItemMetadata, ItemRedaction, ItemType, RedactionRect,
};
use evidence_kernel::{
    append_custody_event, build_export_bundle, iso8601, new_id, now_ms, unlock_vault,
    verify_custody_chain, write_bundle_dir, AppendCustodyEvent, CustodyAction, EvidenceItem,
    EvidenceStore, SqliteEvidenceStore, VaultKey,
};

#[derive(Parser, Debug)]
#[command(name = "vaultctl", about = "Evidence vault operations")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the vault
    Init {
        #[arg(long, default_value = "evidence vault")]
        name: String,
        #[arg(long, env = "EVIDENCE_PASSPHRASE")]
        passphrase: String,
    },

    /// Encrypt a media file into the vault and open its custody chain
    Capture {
        #[arg(long)]
        file: PathBuf,
        #[arg(long, value_parser = parse_item_type, default_value = "photo")]
        r#type: ItemType,
        #[arg(long)]
        mime: Option<String>,
        #[arg(long)]
        what: Option<String>,
        #[arg(long = "where")]
        location_desc: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long, env = "EVIDENCE_PASSPHRASE")]
        passphrase: String,
    },

    /// Record written testimony as an encrypted item
    Testimony {
        #[arg(long)]
        text: String,
        #[arg(long)]
        what: Option<String>,
        #[arg(long, env = "EVIDENCE_PASSPHRASE")]
        passphrase: String,
    },

    /// Attach an externally redacted copy to an item
    Redact {
        #[arg(long)]
        item: String,
        /// Redacted media produced by the pixelation tool
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        mime: Option<String>,
        /// Redacted regions as `x,y,w,h` (repeatable)
        #[arg(long = "rect", value_parser = parse_rect)]
        rects: Vec<RedactionRect>,
        #[arg(long, env = "EVIDENCE_PASSPHRASE")]
        passphrase: String,
    },

    /// List items
    Items,

    /// Remove an item, leaving its custody chain as a tombstone
    Delete {
        #[arg(long)]
        item: String,
        #[arg(long)]
        reason: Option<String>,
        #[arg(long, env = "EVIDENCE_PASSPHRASE")]
        passphrase: String,
    },

    /// Verify custody chains and signatures
    Verify {
        /// Restrict to one item
        #[arg(long)]
        item: Option<String>,
        /// Record a `verify` custody event on each verified item
        #[arg(long)]
        record: bool,
        #[arg(short, long)]
        verbose: bool,
        #[arg(long, env = "EVIDENCE_PASSPHRASE")]
        passphrase: Option<String>,
    },

    /// Build an export bundle on disk
    Export {
        /// Item ids to export (all items when omitted)
        #[arg(long = "item")]
        items: Vec<String>,
        #[arg(long, value_parser = parse_output_mode, default_value = "review")]
        mode: OutputMode,
        /// Leave original blobs out of the bundle
        #[arg(long)]
        skip_originals: bool,
        /// Include redacted copies
        #[arg(long)]
        redacted: bool,
        /// Leave what/where/notes/location out of the manifest
        #[arg(long)]
        skip_metadata: bool,
        /// Output directory (config export_dir when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, env = "EVIDENCE_PASSPHRASE")]
        passphrase: Option<String>,
    },
}

fn parse_item_type(value: &str) -> Result<ItemType, String> {
    match value {
        "photo" => Ok(ItemType::Photo),
        "video" => Ok(ItemType::Video),
        "audio" => Ok(ItemType::Audio),
        "testimony" => Ok(ItemType::Testimony),
        other => Err(format!("unknown item type: {other}")),
    }
}

fn parse_output_mode(value: &str) -> Result<OutputMode, String> {
    match value {
        "review" => Ok(OutputMode::Review),
        "encrypted" => Ok(OutputMode::Encrypted),
        other => Err(format!("unknown output mode: {other}")),
    }
}

fn parse_rect(value: &str) -> Result<RedactionRect, String> {
    let parts: Vec<f64> = value
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| format!("rect must be x,y,w,h: {value}"))?;
    if parts.len() != 4 {
        return Err(format!("rect must be x,y,w,h: {value}"));
    }
    Ok(RedactionRect {
        x: parts[0],
        y: parts[1],
        width: parts[2],
        height: parts[3],
    })
}

fn open_store(cfg: &EvidenceConfig) -> Result<SqliteEvidenceStore> {
    SqliteEvidenceStore::open(&cfg.db_path)
}

fn unlock(store: &SqliteEvidenceStore, passphrase: &str) -> Result<VaultKey> {
    let (_, key) = unlock_vault(store, passphrase)?;
    Ok(key)
}

fn capture_item(
    store: &mut SqliteEvidenceStore,
    vault_key: &VaultKey,
    item_type: ItemType,
    plaintext: Vec<u8>,
    mime: Option<&str>,
    metadata: ItemMetadata,
    source: &str,
) -> Result<EvidenceItem> {
    let blob = encrypt_blob(vault_key, plaintext, mime)?;
    let now = now_ms()?;
    let item = EvidenceItem {
        id: new_id(),
        item_type,
        created_at: now,
        captured_at: now,
        encrypted_blob: blob.payload(),
        blob_mime: blob.mime.clone(),
        blob_size: blob.size,
        redacted_blob: None,
        redacted_mime: None,
        redacted_size: None,
        metadata,
        location: None,
        redaction: None,
        ai_suggestions: None,
        updated_at: None,
    };
    store.put_item(&item)?;
    append_custody_event(
        store,
        AppendCustodyEvent {
            item_id: &item.id,
            action: CustodyAction::Capture,
            details: Some(json!({
                "source": source,
                "mime": blob.mime,
                "size": blob.size,
            })),
            vault_key,
        },
    )?;
    Ok(item)
}

fn guess_mime(path: &Path) -> Option<&'static str> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("jpg") | Some("jpeg") => Some("image/jpeg"),
        Some("png") => Some("image/png"),
        Some("webp") => Some("image/webp"),
        Some("mp4") => Some("video/mp4"),
        Some("webm") => Some("video/webm"),
        Some("mp3") => Some("audio/mpeg"),
        Some("wav") => Some("audio/wav"),
        Some("ogg") => Some("audio/ogg"),
        _ => None,
    }
}

fn run(args: Args, cfg: EvidenceConfig) -> Result<()> {
    match args.command {
        Command::Init { name, passphrase } => {
            let mut store = open_store(&cfg)?;
            if store.vault_meta()?.is_some() {
                return Err(anyhow!("vault already exists in {}", cfg.db_path));
            }
            let created =
                create_vault_with_params(&mut store, &name, &passphrase, cfg.kdf_params.clone())?;
            println!("created vault {} in {}", created.meta.vault_name, cfg.db_path);
        }

        Command::Capture {
            file,
            r#type,
            mime,
            what,
            location_desc,
            notes,
            passphrase,
        } => {
            let mut store = open_store(&cfg)?;
            let vault_key = unlock(&store, &passphrase)?;
            let plaintext = std::fs::read(&file)
                .map_err(|e| anyhow!("failed to read {}: {}", file.display(), e))?;
            let mime = mime.as_deref().or_else(|| guess_mime(&file));
            let metadata = ItemMetadata {
                what,
                r#where: location_desc,
                notes,
            };
            let item = capture_item(
                &mut store,
                &vault_key,
                r#type,
                plaintext,
                mime,
                metadata,
                &file.display().to_string(),
            )?;
            println!("captured {} ({}, {} bytes)", item.id, item.blob_mime, item.blob_size);
        }

        Command::Testimony {
            text,
            what,
            passphrase,
        } => {
            let mut store = open_store(&cfg)?;
            let vault_key = unlock(&store, &passphrase)?;
            let metadata = ItemMetadata {
                what,
                r#where: None,
                notes: None,
            };
            let item = capture_item(
                &mut store,
                &vault_key,
                ItemType::Testimony,
                text.into_bytes(),
                Some("text/plain"),
                metadata,
                "testimony",
            )?;
            println!("recorded testimony {}", item.id);
        }

        Command::Redact {
            item,
            file,
            mime,
            rects,
            passphrase,
        } => {
            let mut store = open_store(&cfg)?;
            let vault_key = unlock(&store, &passphrase)?;
            let mut existing = store
                .item(&item)?
                .ok_or_else(|| anyhow!("no such item: {item}"))?;
            let plaintext = std::fs::read(&file)
                .map_err(|e| anyhow!("failed to read {}: {}", file.display(), e))?;
            let mime = mime.as_deref().or_else(|| guess_mime(&file));
            let blob = encrypt_blob(&vault_key, plaintext, mime)?;
            let now = now_ms()?;
            existing.redacted_blob = Some(blob.payload());
            existing.redacted_mime = Some(blob.mime.clone());
            existing.redacted_size = Some(blob.size);
            existing.redaction = Some(ItemRedaction {
                method: "pixelate".to_string(),
                rects: rects.clone(),
                created_at: now,
            });
            existing.updated_at = Some(now);
            store.put_item(&existing)?;
            append_custody_event(
                &mut store,
                AppendCustodyEvent {
                    item_id: &item,
                    action: CustodyAction::Redact,
                    details: Some(json!({
                        "method": "pixelate",
                        "regions": rects.len(),
                        "mime": blob.mime,
                    })),
                    vault_key: &vault_key,
                },
            )?;
            println!("redacted {} ({} regions)", item, rects.len());
        }

        Command::Items => {
            let store = open_store(&cfg)?;
            let items = store.items()?;
            if items.is_empty() {
                println!("no items");
            }
            for item in items {
                let redacted = if item.redacted_blob.is_some() {
                    " redacted"
                } else {
                    ""
                };
                println!(
                    "{}  {:?}  {}  {} bytes{}",
                    item.id,
                    item.item_type,
                    iso8601(item.captured_at),
                    item.blob_size,
                    redacted
                );
            }
        }

        Command::Delete {
            item,
            reason,
            passphrase,
        } => {
            let mut store = open_store(&cfg)?;
            let vault_key = unlock(&store, &passphrase)?;
            if store.item(&item)?.is_none() {
                return Err(anyhow!("no such item: {item}"));
            }
            // The delete event goes on the chain first; the chain survives
            // the item it describes.
            append_custody_event(
                &mut store,
                AppendCustodyEvent {
                    item_id: &item,
                    action: CustodyAction::Delete,
                    details: reason.map(|r| json!({"reason": r})),
                    vault_key: &vault_key,
                },
            )?;
            store.delete_item(&item)?;
            println!("deleted {item} (custody chain retained)");
        }

        Command::Verify {
            item,
            record,
            verbose,
            passphrase,
        } => {
            let mut store = open_store(&cfg)?;
            let vault_key = match (record, &passphrase) {
                (true, Some(p)) => Some(unlock(&store, p)?),
                (true, None) => return Err(anyhow!("--record requires --passphrase")),
                (false, _) => None,
            };
            let public_key = store.vault_meta()?.and_then(|m| m.signing_public_key);
            let items = match item {
                Some(id) => vec![store
                    .item(&id)?
                    .ok_or_else(|| anyhow!("no such item: {id}"))?],
                None => store.items()?,
            };
            let mut failed = 0usize;
            for item in &items {
                let events = store.custody_events_for_item(&item.id)?;
                let chain_ok = verify_custody_chain(&events);
                let mut signatures_ok = true;
                if let Some(public_key) = public_key.as_deref() {
                    for event in &events {
                        if let (Some(hash), Some(signature)) =
                            (event.hash.as_deref(), event.signature.as_deref())
                        {
                            if verify_hash_signature(public_key, hash, signature).is_err() {
                                signatures_ok = false;
                                if verbose {
                                    println!("  event {}: signature invalid", event.id);
                                }
                            }
                        }
                    }
                }
                let ok = chain_ok && signatures_ok;
                if !ok {
                    failed += 1;
                } else if let Some(vault_key) = vault_key.as_ref() {
                    append_custody_event(
                        &mut store,
                        AppendCustodyEvent {
                            item_id: &item.id,
                            action: CustodyAction::Verify,
                            details: Some(json!({
                                "result": "ok",
                                "events": events.len(),
                            })),
                            vault_key,
                        },
                    )?;
                }
                println!(
                    "{}: {} ({} events{})",
                    item.id,
                    if ok { "OK" } else { "FAIL" },
                    events.len(),
                    if chain_ok { "" } else { ", chain broken" },
                );
            }
            if failed > 0 {
                return Err(anyhow!("{failed} item(s) failed verification"));
            }
            println!("OK: all chains verified.");
        }

        Command::Export {
            items,
            mode,
            skip_originals,
            redacted,
            skip_metadata,
            out,
            passphrase,
        } => {
            let mut store = open_store(&cfg)?;
            let vault_key = match (&passphrase, mode) {
                (Some(p), _) => Some(unlock(&store, p)?),
                (None, OutputMode::Encrypted) => None,
                (None, OutputMode::Review) => {
                    return Err(anyhow!("review-mode export requires --passphrase"))
                }
            };
            let ids: Vec<String> = if items.is_empty() {
                store.items()?.into_iter().map(|i| i.id).collect()
            } else {
                items
            };
            let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
            let export_id = new_id();
            // Record the export on each item's chain before composing the
            // bundle, so the bundled custody log includes this export.
            // Signing needs the vault key, so a locked encrypted-mode
            // export leaves no event behind.
            if let Some(vault_key) = vault_key.as_ref() {
                for &id in &id_refs {
                    if store.item(id)?.is_none() {
                        continue;
                    }
                    append_custody_event(
                        &mut store,
                        AppendCustodyEvent {
                            item_id: id,
                            action: CustodyAction::Export,
                            details: Some(json!({
                                "exportId": export_id,
                                "outputMode": mode.as_str(),
                            })),
                            vault_key,
                        },
                    )?;
                }
            }
            let bundle = build_export_bundle(
                &store,
                BuildExportInput {
                    export_id: &export_id,
                    item_ids: &id_refs,
                    include_originals: !skip_originals,
                    include_redacted: redacted,
                    include_metadata: !skip_metadata,
                    output_mode: mode,
                    vault_key: vault_key.as_ref(),
                },
            )?;
            let dest = out.unwrap_or_else(|| PathBuf::from(&cfg.export_dir));
            let root = write_bundle_dir(&bundle, &dest)?;
            println!(
                "exported {} file(s) to {}",
                bundle.manifest.files.len(),
                root.display()
            );
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let cfg = EvidenceConfig::load()?;
    run(args, cfg)
}
