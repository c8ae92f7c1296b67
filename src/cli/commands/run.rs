//! `run`: import into the remote drive once it reports sync.

use std::path::PathBuf;

use serde::Serialize;
use tracing::info;

use crate::cli::RunArgs;
use crate::config::ImportConfig;
use crate::error::Result;
use crate::gate::run_gated;
use crate::normalize::{load_raw_records, normalize_records};
use crate::remote::HttpDriveStore;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunOutput<'a> {
    drive_url: &'a str,
}

/// Execute the run command.
///
/// The drive URL is checked before the dataset is read, so a missing URL
/// fails with nothing touched.
///
/// # Errors
///
/// Returns `MissingDriveUrl` or `Config` for bad configuration, I/O or JSON
/// errors for a bad dataset, and any fatal error from the gated import.
pub fn execute(args: &RunArgs, config_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let config = ImportConfig::load(&args.import.overrides(config_path, args.drive_url.as_deref()))?;
    let drive_url = config.require_drive_url()?;

    let raw = load_raw_records(&args.import.input)?;
    let report = normalize_records(&raw);
    super::warn_rejections(&report);
    info!(
        valid = report.records.len(),
        rejected = report.rejected.len(),
        "Normalized dataset"
    );

    let store = HttpDriveStore::new(
        drive_url,
        config.auth_token.clone(),
        config.request_timeout,
        config.poll_interval(),
    )?;

    let rt = super::runtime()?;
    let stats = rt.block_on(run_gated(&store, &config, report))?;

    super::print_summary(&stats, RunOutput { drive_url }, json)
}
