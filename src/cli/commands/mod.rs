//! Command implementations.

pub mod completions;
pub mod local;
pub mod normalize;
pub mod run;
pub mod version;

use colored::Colorize;
use serde::Serialize;
use tracing::warn;

use crate::error::{Error, Result};
use crate::import::ImportStats;
use crate::normalize::NormalizeReport;

/// Runtime for the async store calls of one command.
fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))
}

fn warn_rejections(report: &NormalizeReport) {
    for rejection in &report.rejected {
        warn!(
            index = rejection.index,
            name = rejection.name.as_deref().unwrap_or("<unnamed>"),
            reason = %rejection.reason,
            "Excluded grant record"
        );
    }
}

#[derive(Serialize)]
struct SummaryOutput<'a, T: Serialize> {
    stats: &'a ImportStats,
    #[serde(flatten)]
    extra: T,
}

/// Print the final counts of an import run.
fn print_summary<T: Serialize>(stats: &ImportStats, extra: T, json: bool) -> Result<()> {
    if json {
        let payload = serde_json::to_string(&SummaryOutput { stats, extra })?;
        println!("{payload}");
        return Ok(());
    }

    let headline = if stats.is_clean() {
        "Import complete".green().bold()
    } else {
        "Import complete with skipped records".yellow().bold()
    };
    println!("{headline}");
    println!(
        "  Folders:     {} created, {} existing",
        stats.folders.created, stats.folders.existing
    );
    println!(
        "  Documents:   {} created, {} existing",
        stats.documents.created, stats.documents.existing
    );
    println!("  Initialized: {}", stats.initialized);
    println!("  Records:     {} submitted", stats.records_submitted);
    if stats.rejected > 0 {
        println!("  Rejected:    {}", stats.rejected.to_string().yellow());
    }
    if stats.failed > 0 {
        println!("  Failed:      {}", stats.failed.to_string().red());
    }
    Ok(())
}
