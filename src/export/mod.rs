//! Export protocol: manifest, custody-log transcript, bundle, verifier.
//!
//! An export is designed to be checked by someone who has nothing but the
//! bundle. Review mode ships decrypted media whose plaintext hashes appear
//! in the manifest; encrypted mode ships canonical encrypted payloads so
//! integrity is checkable without the vault key. The custody log is an
//! independent transcript chain, replayable from the exported lines alone.

pub mod bundle;
pub mod custody_log;
pub mod manifest;
pub mod templates;
pub mod verify;

pub use bundle::{build_export_bundle, write_bundle_dir, BuildExportInput, ExportBundle};
pub use custody_log::{build_custody_log, CustodyLogEntry};
pub use manifest::{
    build_export_manifest, export_filename, manifest_to_csv, BuildManifestInput, ExportManifest,
    ManifestBuild, ManifestFileEntry, OutputMode, Variant,
};
pub use verify::{
    verify_custody_log, verify_manifest_files, CustodyLogReport, FileStatus, ItemReport, LogIssue,
    ManifestReport,
};
