//! `grantdrive version`: build info plus where local state lives.

use std::path::{Path, PathBuf};

use colored::Colorize;
use serde::Serialize;

use crate::config::{default_config_path, resolve_db_path};
use crate::error::Result;
use crate::storage::schema::CURRENT_SCHEMA_VERSION;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VersionOutput {
    name: &'static str,
    version: &'static str,
    build: &'static str,
    schema_version: i32,
    config_path: Option<PathBuf>,
    db_path: Option<PathBuf>,
}

impl VersionOutput {
    fn collect(config: Option<&PathBuf>) -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            build: if cfg!(debug_assertions) { "dev" } else { "release" },
            schema_version: CURRENT_SCHEMA_VERSION,
            config_path: config.cloned().or_else(default_config_path),
            db_path: resolve_db_path(None),
        }
    }
}

fn display(path: Option<&Path>) -> String {
    path.map_or_else(|| "<no home directory>".to_string(), |p| p.display().to_string())
}

/// Execute the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(config: Option<&PathBuf>, json: bool) -> Result<()> {
    let output = VersionOutput::collect(config);

    if json {
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!(
        "{} {} ({})",
        output.name.bold(),
        output.version,
        output.build
    );
    println!("  Local store schema: v{}", output.schema_version);
    println!("  Config:             {}", display(output.config_path.as_deref()));
    println!("  Local database:     {}", display(output.db_path.as_deref()));
    Ok(())
}
