//! export_verify - offline verifier for exported evidence bundles
//!
//! Proves, from the exported files alone:
//! - every media file's SHA-256 matches its manifest entry
//! - the custody-log transcript chain replays per item
//! - each custody event's signature checks against the bundled public key
//!
//! No database, vault key or network access is needed.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::Parser;

use evidence_kernel::export::{
    verify_custody_log, verify_manifest_files, ExportManifest, FileStatus,
};

#[derive(Parser, Debug)]
#[command(
    name = "export_verify",
    about = "Verify an evidence export bundle (manifest hashes + custody log)"
)]
struct Args {
    /// Bundle root directory (the EvidenceVault_Export_* folder)
    #[arg(long, conflicts_with_all = ["manifest", "custody_log"])]
    bundle: Option<PathBuf>,

    /// Path to manifest.json
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Path to custody_log.jsonl
    #[arg(long)]
    custody_log: Option<PathBuf>,

    /// Media files to check against the manifest
    #[arg(long = "file")]
    files: Vec<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

struct Located {
    manifest: Option<PathBuf>,
    custody_log: Option<PathBuf>,
    files: Vec<PathBuf>,
}

fn locate(args: &Args) -> Result<Located> {
    if let Some(root) = &args.bundle {
        let manifest = root.join("manifest.json");
        let custody_log = root.join("custody_log.jsonl");
        let mut files = Vec::new();
        let media = root.join("media");
        if media.is_dir() {
            for entry in std::fs::read_dir(&media)? {
                let path = entry?.path();
                if path.is_file() {
                    files.push(path);
                }
            }
            files.sort();
        }
        return Ok(Located {
            manifest: manifest.is_file().then_some(manifest),
            custody_log: custody_log.is_file().then_some(custody_log),
            files,
        });
    }
    Ok(Located {
        manifest: args.manifest.clone(),
        custody_log: args.custody_log.clone(),
        files: args.files.clone(),
    })
}

fn relative_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn run(args: Args) -> Result<()> {
    let located = locate(&args)?;
    if located.manifest.is_none() && located.custody_log.is_none() {
        return Err(anyhow!(
            "nothing to verify: provide --bundle, or --manifest / --custody-log"
        ));
    }

    let mut failures = 0usize;

    if let Some(manifest_path) = &located.manifest {
        println!("=== Manifest files ===");
        let raw = std::fs::read_to_string(manifest_path)
            .map_err(|e| anyhow!("failed to read {}: {}", manifest_path.display(), e))?;
        let manifest: ExportManifest = serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid manifest {}: {}", manifest_path.display(), e))?;

        let mut supplied = Vec::new();
        for path in &located.files {
            let bytes = std::fs::read(path)
                .map_err(|e| anyhow!("failed to read {}: {}", path.display(), e))?;
            supplied.push((relative_name(path), bytes));
        }

        let report = verify_manifest_files(&manifest, &supplied);
        for check in &report.checks {
            match check.status {
                FileStatus::Ok => {
                    if args.verbose {
                        println!("  {}: OK", check.path);
                    }
                }
                FileStatus::Mismatch => println!("  {}: MISMATCH", check.path),
                FileStatus::NotInManifest => println!("  {}: no matching entry", check.path),
            }
        }
        println!(
            "checked {} file(s): {} OK, {} mismatched, {} unmatched",
            report.checks.len(),
            report.ok,
            report.mismatched,
            report.unmatched
        );
        if !report.all_ok() {
            failures += report.mismatched + report.unmatched;
        }
        println!();
    }

    if let Some(log_path) = &located.custody_log {
        println!("=== Custody log ===");
        let text = std::fs::read_to_string(log_path)
            .map_err(|e| anyhow!("failed to read {}: {}", log_path.display(), e))?;
        let report = verify_custody_log(&text);
        for issue in &report.malformed {
            println!("  {}", issue);
        }
        for item in &report.items {
            if item.ok() {
                println!("  item {}: OK ({} events)", item.item_id, item.events);
            } else {
                println!("  item {}: FAIL", item.item_id);
                for issue in &item.issues {
                    println!("    {}", issue);
                }
            }
        }
        println!(
            "checked {} item(s): {} OK, {} failed, {} malformed line(s)",
            report.items.len(),
            report.items_ok,
            report.items_failed,
            report.malformed.len()
        );
        if !report.all_ok() {
            failures += report.items_failed + report.malformed.len();
        }
        println!();
    }

    if failures > 0 {
        return Err(anyhow!("{failures} verification failure(s)"));
    }
    println!("OK: bundle verified.");
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    run(Args::parse())
}
