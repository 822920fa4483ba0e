//! Export bundle composition.
//!
//! A bundle is a deterministic tree of files under a dated root directory:
//! README, manifest (JSON + CSV), custody-log transcript, media files and
//! the offline verifier. Archive packaging is left to the caller; the
//! bundle is a filename-to-bytes mapping plus a directory writer.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use log::info;

use crate::crypto::VaultKey;
use crate::export::custody_log::build_custody_log;
use crate::export::manifest::{
    build_manifest_with_media, BuildManifestInput, ExportManifest, OutputMode,
};
use crate::export::templates::{VERIFY_HTML, VERIFY_JS};
use crate::store::EvidenceStore;
use crate::types::EvidenceItem;

pub struct BuildExportInput<'a> {
    pub export_id: &'a str,
    pub item_ids: &'a [&'a str],
    pub include_originals: bool,
    pub include_redacted: bool,
    pub include_metadata: bool,
    pub output_mode: OutputMode,
    pub vault_key: Option<&'a VaultKey>,
}

pub struct ExportBundle {
    /// `EvidenceVault_Export_<YYYYMMDD>`, the root of every path in `files`.
    pub root_dir: String,
    /// Relative path (including `root_dir`) to file bytes, in a stable
    /// order. Hand this to an archive writer or to [`write_bundle_dir`].
    pub files: Vec<(String, Vec<u8>)>,
    pub manifest: ExportManifest,
    pub manifest_json: String,
    pub manifest_csv: String,
    pub custody_log: String,
}

fn readme_text(manifest: &ExportManifest) -> String {
    format!(
        "Evidence Vault export bundle\n\
         \n\
         Export ID: {}\n\
         Generated: {}\n\
         Output mode: {}\n\
         \n\
         Contents\n\
         - manifest.json / manifest.csv: file listing with SHA-256 hashes and metadata.\n\
         - custody_log.jsonl: chain-of-custody events (one JSON object per line).\n\
         - media/: original and/or redacted evidence files.\n\
         - verify/: offline verifier (open verify.html in a browser).\n\
         \n\
         Notes\n\
         - Keep originals secure. Redacted copies are irreversible in exports unless originals are included.\n\
         - Follow local laws for consent and handling sensitive data.\n",
        manifest.export_id,
        manifest.created_at,
        manifest.output_mode.as_str(),
    )
}

fn load_items(store: &dyn EvidenceStore, item_ids: &[&str]) -> Result<Vec<EvidenceItem>> {
    let mut items = Vec::new();
    for &id in item_ids {
        if let Some(item) = store.item(id)? {
            items.push(item);
        }
    }
    Ok(items)
}

/// Build a complete export bundle.
///
/// Pure composition: the builder reads the store and produces files, never
/// writing back. Recording the export itself on each item's custody chain
/// is the caller's responsibility and must happen before building, or the
/// bundled custody log will not mention this export.
pub fn build_export_bundle(
    store: &dyn EvidenceStore,
    input: BuildExportInput<'_>,
) -> Result<ExportBundle> {
    let items = load_items(store, input.item_ids)?;

    let (built, media) = build_manifest_with_media(BuildManifestInput {
        export_id: input.export_id,
        items: &items,
        include_originals: input.include_originals,
        include_redacted: input.include_redacted,
        include_metadata: input.include_metadata,
        output_mode: input.output_mode,
        vault_key: input.vault_key,
    })?;

    let ids: Vec<&str> = items.iter().map(|item| item.id.as_str()).collect();
    let custody_log = build_custody_log(store, &ids)?;

    let root_dir = format!("EvidenceVault_Export_{}", Utc::now().format("%Y%m%d"));
    let mut files: Vec<(String, Vec<u8>)> = Vec::new();
    files.push((
        format!("{root_dir}/README.txt"),
        readme_text(&built.manifest).into_bytes(),
    ));
    files.push((
        format!("{root_dir}/manifest.json"),
        built.json.clone().into_bytes(),
    ));
    files.push((
        format!("{root_dir}/manifest.csv"),
        built.csv.clone().into_bytes(),
    ));
    files.push((
        format!("{root_dir}/custody_log.jsonl"),
        custody_log.clone().into_bytes(),
    ));
    files.push((
        format!("{root_dir}/verify/verify.html"),
        VERIFY_HTML.as_bytes().to_vec(),
    ));
    files.push((
        format!("{root_dir}/verify/verify.js"),
        VERIFY_JS.as_bytes().to_vec(),
    ));

    for (filename, bytes) in media {
        files.push((format!("{root_dir}/media/{filename}"), bytes));
    }

    info!(
        "built export {} ({} items, {} files, {} mode)",
        input.export_id,
        items.len(),
        files.len(),
        input.output_mode.as_str()
    );

    Ok(ExportBundle {
        root_dir,
        files,
        manifest: built.manifest,
        manifest_json: built.json,
        manifest_csv: built.csv,
        custody_log,
    })
}

/// Write the bundle tree under `dest` and return the root directory path.
pub fn write_bundle_dir(bundle: &ExportBundle, dest: &Path) -> Result<PathBuf> {
    for (relative, bytes) in &bundle.files {
        let path = dest.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(dest.join(&bundle.root_dir))
}
