//! Configuration management.
//!
//! An [`ImportConfig`] is assembled from four layers, highest priority
//! first:
//!
//! 1. Command-line flags ([`ConfigOverrides`])
//! 2. Environment: `REMOTE_DOCUMENT_DRIVE`, `DRIVE_AUTH_TOKEN`, `GRANTDRIVE_*`
//! 3. JSON config file: `--config`, `GRANTDRIVE_CONFIG`, or
//!    `~/.grantdrive/config.json`
//! 4. Built-in defaults
//!
//! Everything is validated before any store is touched.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::import::RetryPolicy;
use crate::model::DriveAttachConfig;

pub const ENV_DRIVE_URL: &str = "REMOTE_DOCUMENT_DRIVE";
pub const ENV_AUTH_TOKEN: &str = "DRIVE_AUTH_TOKEN";
pub const ENV_CONFIG: &str = "GRANTDRIVE_CONFIG";
pub const ENV_DB: &str = "GRANTDRIVE_DB";
pub const ENV_RECORD_DELAY_MS: &str = "GRANTDRIVE_RECORD_DELAY_MS";
pub const ENV_MAX_ATTEMPTS: &str = "GRANTDRIVE_MAX_ATTEMPTS";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "GRANTDRIVE_REQUEST_TIMEOUT_MS";
pub const ENV_POLL_INTERVAL_MS: &str = "GRANTDRIVE_POLL_INTERVAL_MS";

const DEFAULT_RECORD_DELAY_MS: u64 = 500;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Contents of the JSON config file. Every field is optional.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    pub drive_url: Option<String>,
    pub auth_token: Option<String>,
    pub record_delay_ms: Option<u64>,
    pub max_attempts: Option<u32>,
    pub request_timeout_ms: Option<u64>,
    /// Attach settings: listeners, sharing type, offline flag, poll interval
    pub attach: Option<DriveAttachConfig>,
}

/// Values given on the command line. `None` means not given.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub drive_url: Option<String>,
    pub record_delay_ms: Option<u64>,
    pub max_attempts: Option<u32>,
    pub request_timeout_ms: Option<u64>,
}

/// Fully resolved settings for one import run.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportConfig {
    /// Remote drive URL; only `run` requires it
    pub drive_url: Option<String>,
    pub auth_token: Option<String>,
    /// Pause between successive grants
    pub record_delay: Duration,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub attach: DriveAttachConfig,
}

impl ImportConfig {
    /// Resolve from flags, the process environment, and the config file.
    ///
    /// # Errors
    ///
    /// Returns `Config` if an environment value or the config file is
    /// malformed, or if validation fails.
    pub fn load(overrides: &ConfigOverrides) -> Result<Self> {
        Self::resolve(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve with an explicit environment lookup.
    ///
    /// # Errors
    ///
    /// See [`ImportConfig::load`].
    pub fn resolve<F>(overrides: &ConfigOverrides, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let file = match overrides
            .config_path
            .clone()
            .or_else(|| env(ENV_CONFIG).map(PathBuf::from))
        {
            Some(path) => read_config_file(&path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => read_config_file(&path)?,
                _ => FileConfig::default(),
            },
        };

        let mut attach = file.attach.unwrap_or_default();
        if let Some(ms) = parse_env(&env, ENV_POLL_INTERVAL_MS)? {
            attach.poll_interval_ms = ms;
        }

        let config = Self {
            drive_url: overrides
                .drive_url
                .clone()
                .or_else(|| env(ENV_DRIVE_URL))
                .or(file.drive_url)
                .map(|u| u.trim().to_string()),
            auth_token: env(ENV_AUTH_TOKEN).or(file.auth_token),
            record_delay: Duration::from_millis(
                overrides
                    .record_delay_ms
                    .or(parse_env(&env, ENV_RECORD_DELAY_MS)?)
                    .or(file.record_delay_ms)
                    .unwrap_or(DEFAULT_RECORD_DELAY_MS),
            ),
            request_timeout: Duration::from_millis(
                overrides
                    .request_timeout_ms
                    .or(parse_env(&env, ENV_REQUEST_TIMEOUT_MS)?)
                    .or(file.request_timeout_ms)
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
            ),
            retry: RetryPolicy {
                max_attempts: overrides
                    .max_attempts
                    .or(parse_env(&env, ENV_MAX_ATTEMPTS)?)
                    .or(file.max_attempts)
                    .unwrap_or(RetryPolicy::default().max_attempts),
                ..RetryPolicy::default()
            },
            attach,
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks that hold for every command.
    ///
    /// # Errors
    ///
    /// Returns `Config` describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.attach.poll_interval_ms == 0 {
            return Err(Error::Config("poll interval must be greater than zero".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("max attempts must be at least 1".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::Config("request timeout must be greater than zero".into()));
        }
        if let Some(url) = &self.drive_url {
            validate_drive_url(url)?;
        }
        Ok(())
    }

    /// The remote drive URL, required by `run`.
    ///
    /// # Errors
    ///
    /// Returns `MissingDriveUrl` if no layer supplied one.
    pub fn require_drive_url(&self) -> Result<&str> {
        self.drive_url.as_deref().ok_or(Error::MissingDriveUrl)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.attach.poll_interval_ms)
    }
}

fn parse_env<T, F>(env: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    env(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| Error::Config(format!("{key} is not a valid number: {raw:?}")))
        })
        .transpose()
}

fn validate_drive_url(url: &str) -> Result<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| Error::Config(format!("drive URL must start with http:// or https://: {url}")))?;
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() || host.contains(char::is_whitespace) {
        return Err(Error::Config(format!("drive URL has no host: {url}")));
    }
    Ok(())
}

fn read_config_file(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {e}", path.display()))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {e}", path.display()))
    })
}

/// `~/.grantdrive`, if a home directory can be determined.
#[must_use]
pub fn global_grantdrive_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".grantdrive"))
}

#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    global_grantdrive_dir().map(|dir| dir.join("config.json"))
}

/// Resolve the local drive database path.
///
/// Priority: explicit `--db`, then `GRANTDRIVE_DB`, then
/// `~/.grantdrive/data/drive.db`.
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Ok(db_path) = std::env::var(ENV_DB) {
        if !db_path.trim().is_empty() {
            return Some(PathBuf::from(db_path));
        }
    }

    global_grantdrive_dir().map(|dir| dir.join("data").join("drive.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn isolated() -> (tempfile::TempDir, ConfigOverrides) {
        // Point at an empty config file so the user's real one is never read.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{}").unwrap();
        let overrides = ConfigOverrides {
            config_path: Some(path),
            ..ConfigOverrides::default()
        };
        (dir, overrides)
    }

    #[test]
    fn test_defaults() {
        let (_dir, overrides) = isolated();
        let config = ImportConfig::resolve(&overrides, env_of(&[])).unwrap();
        assert_eq!(config.drive_url, None);
        assert_eq!(config.record_delay, Duration::from_millis(500));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.attach, DriveAttachConfig::default());
        assert!(matches!(config.require_drive_url(), Err(Error::MissingDriveUrl)));
    }

    #[test]
    fn test_flag_beats_env_beats_file() {
        let (dir, mut overrides) = isolated();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"driveUrl":"http://file.example/d/x","recordDelayMs":10,"maxAttempts":7}"#,
        )
        .unwrap();

        let env = env_of(&[
            (ENV_DRIVE_URL, "https://env.example/d/grants"),
            (ENV_RECORD_DELAY_MS, "20"),
        ]);
        let config = ImportConfig::resolve(&overrides, &env).unwrap();
        assert_eq!(config.drive_url.as_deref(), Some("https://env.example/d/grants"));
        assert_eq!(config.record_delay, Duration::from_millis(20));
        assert_eq!(config.retry.max_attempts, 7);

        overrides.drive_url = Some("http://flag.example/d/grants".into());
        overrides.record_delay_ms = Some(0);
        let config = ImportConfig::resolve(&overrides, &env).unwrap();
        assert_eq!(config.drive_url.as_deref(), Some("http://flag.example/d/grants"));
        assert!(config.record_delay.is_zero());
    }

    #[test]
    fn test_invalid_settings_fail_fast() {
        let (_dir, overrides) = isolated();
        for env in [
            env_of(&[(ENV_DRIVE_URL, "ftp://nope")]),
            env_of(&[(ENV_DRIVE_URL, "http://")]),
            env_of(&[(ENV_MAX_ATTEMPTS, "0")]),
            env_of(&[(ENV_MAX_ATTEMPTS, "three")]),
            env_of(&[(ENV_POLL_INTERVAL_MS, "0")]),
        ] {
            let err = ImportConfig::resolve(&overrides, env).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{err}");
            assert_eq!(err.exit_code(), 7);
        }
    }

    #[test]
    fn test_blank_env_is_ignored() {
        let (_dir, overrides) = isolated();
        let config = ImportConfig::resolve(&overrides, env_of(&[(ENV_DRIVE_URL, "  ")])).unwrap();
        assert!(config.drive_url.is_none());
    }

    #[test]
    fn test_attach_settings_from_file() {
        let (dir, overrides) = isolated();
        fs::write(
            dir.path().join("config.json"),
            r#"{"attach":{"sharingType":"PUBLIC","pollIntervalMs":250,
                "listeners":[{"listenerId":"importer","block":false}]}}"#,
        )
        .unwrap();

        let config = ImportConfig::resolve(&overrides, env_of(&[])).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.attach.listeners.len(), 1);
        assert!(config.attach.available_offline);
    }

    #[test]
    fn test_missing_explicit_config_file_is_an_error() {
        let overrides = ConfigOverrides {
            config_path: Some(PathBuf::from("/nonexistent/grantdrive.json")),
            ..ConfigOverrides::default()
        };
        assert!(matches!(
            ImportConfig::resolve(&overrides, env_of(&[])),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_resolve_db_path_with_explicit() {
        let explicit = PathBuf::from("/custom/drive.db");
        assert_eq!(resolve_db_path(Some(&explicit)), Some(explicit));
    }
}
