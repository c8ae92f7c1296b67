//! `normalize`: dry run of the normalizer.

use colored::Colorize;
use serde::Serialize;

use crate::bucket::Bucket;
use crate::cli::NormalizeArgs;
use crate::error::Result;
use crate::model::GrantRecordNormalized;
use crate::normalize::{load_raw_records, normalize_records, Rejection};

#[derive(Serialize)]
struct NormalizeOutput<'a> {
    records: &'a [GrantRecordNormalized],
    rejected: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    rejections: Option<&'a [Rejection]>,
}

/// Execute the normalize command.
///
/// # Errors
///
/// Returns an error if the dataset cannot be read or is not a JSON array.
pub fn execute(args: &NormalizeArgs, json: bool) -> Result<()> {
    let raw = load_raw_records(&args.input)?;
    let report = normalize_records(&raw);

    if json {
        let output = NormalizeOutput {
            records: &report.records,
            rejected: report.rejected.len(),
            rejections: args.show_rejected.then_some(report.rejected.as_slice()),
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    for record in &report.records {
        let bucket = Bucket::for_name(&record.grantee_name)
            .map_or_else(|_| "-".dimmed().to_string(), |b| b.label().to_string());
        println!(
            "{:<4} {}  size {}  editors {}",
            bucket,
            record.grantee_name.bold(),
            record.grant_size,
            record.authorized_signer_addresses.len()
        );
    }
    println!(
        "{} valid, {} rejected",
        report.records.len().to_string().green(),
        report.rejected.len().to_string().yellow()
    );

    if args.show_rejected {
        for rejection in &report.rejected {
            println!(
                "  #{} {}: {}",
                rejection.index,
                rejection.name.as_deref().unwrap_or("<unnamed>"),
                rejection.reason.dimmed()
            );
        }
    }
    Ok(())
}
