//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ConfigOverrides;

pub mod commands;

/// grantdrive - bulk-import grant records into a document drive
#[derive(Parser, Debug)]
#[command(name = "grantdrive", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ~/.grantdrive/config.json)
    #[arg(long, global = true, env = "GRANTDRIVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Attach the remote drive, wait for sync, and import the dataset
    Run(RunArgs),

    /// Import into a local SQLite drive instead of a remote one
    Local(LocalArgs),

    /// Normalize the dataset and print the result without importing
    Normalize(NormalizeArgs),

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Settings shared by the importing commands.
#[derive(Args, Debug, Clone, Default)]
pub struct ImportArgs {
    /// Dataset: a JSON array of grant objects
    #[arg(long, short)]
    pub input: PathBuf,

    /// Pause between grants, in milliseconds (default 500)
    #[arg(long)]
    pub record_delay_ms: Option<u64>,

    /// Tries per submission for transport failures (default 3)
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// HTTP request timeout, in milliseconds (default 30000)
    #[arg(long)]
    pub request_timeout_ms: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub import: ImportArgs,

    /// Remote drive URL (overrides REMOTE_DOCUMENT_DRIVE)
    #[arg(long)]
    pub drive_url: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct LocalArgs {
    #[command(flatten)]
    pub import: ImportArgs,

    /// Database path (default: ~/.grantdrive/data/drive.db)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Id of the local drive
    #[arg(long, default_value = "grants")]
    pub drive_id: String,
}

#[derive(Args, Debug, Clone)]
pub struct NormalizeArgs {
    /// Dataset: a JSON array of grant objects
    #[arg(long, short)]
    pub input: PathBuf,

    /// Also list every excluded record and why
    #[arg(long)]
    pub show_rejected: bool,
}

impl ImportArgs {
    /// Flag layer of the configuration.
    #[must_use]
    pub fn overrides(&self, config: Option<&PathBuf>, drive_url: Option<&str>) -> ConfigOverrides {
        ConfigOverrides {
            config_path: config.cloned(),
            drive_url: drive_url.map(str::to_string),
            record_delay_ms: self.record_delay_ms,
            max_attempts: self.max_attempts,
            request_timeout_ms: self.request_timeout_ms,
        }
    }
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}
