//! `local`: the gated import against a SQLite-backed drive.

use std::path::PathBuf;

use serde::Serialize;
use tracing::info;

use crate::cli::LocalArgs;
use crate::config::{resolve_db_path, ImportConfig};
use crate::error::{Error, Result};
use crate::gate::run_gated;
use crate::normalize::{load_raw_records, normalize_records};
use crate::storage::SqliteDriveStore;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LocalOutput {
    db_path: String,
    drive_id: String,
    folders: usize,
    documents: usize,
}

/// Execute the local command.
///
/// # Errors
///
/// Returns configuration, dataset, or storage errors, or any fatal error
/// from the gated import.
pub fn execute(args: &LocalArgs, config_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let config = ImportConfig::load(&args.import.overrides(config_path, None))?;

    let db_path = resolve_db_path(args.db.as_deref())
        .ok_or_else(|| Error::Config("Could not determine database path; pass --db".into()))?;
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let raw = load_raw_records(&args.import.input)?;
    let report = normalize_records(&raw);
    super::warn_rejections(&report);

    let store = SqliteDriveStore::open(&db_path, &args.drive_id)?;
    info!(db = %db_path.display(), drive_id = %args.drive_id, "Opened local drive");

    let rt = super::runtime()?;
    let stats = rt.block_on(run_gated(&store, &config, report))?;

    let output = LocalOutput {
        db_path: db_path.display().to_string(),
        drive_id: args.drive_id.clone(),
        folders: store.folder_count()?,
        documents: store.document_count()?,
    };
    super::print_summary(&stats, output, json)
}
