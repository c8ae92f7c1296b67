//! Error types for grantdrive.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=storage, 3=not_found, 4=validation, etc.)
//! - Retryability flags for the submission client
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use thiserror::Error;

/// Result type alias for grantdrive operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Storage (exit 2)
    DatabaseError,

    // Not Found (exit 3)
    DocumentNotFound,
    DriveNotFound,

    // Validation (exit 4)
    InvalidArgument,
    InvalidName,
    InvalidAction,

    // Ordering (exit 5)
    OrderingViolation,

    // Remote (exit 6)
    SubmissionRejected,
    RemoteError,
    TransportError,
    SyncError,

    // Config (exit 7)
    ConfigError,
    MissingDriveUrl,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::DatabaseError => "DATABASE_ERROR",
            Self::DocumentNotFound => "DOCUMENT_NOT_FOUND",
            Self::DriveNotFound => "DRIVE_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::InvalidName => "INVALID_NAME",
            Self::InvalidAction => "INVALID_ACTION",
            Self::OrderingViolation => "ORDERING_VIOLATION",
            Self::SubmissionRejected => "SUBMISSION_REJECTED",
            Self::RemoteError => "REMOTE_ERROR",
            Self::TransportError => "TRANSPORT_ERROR",
            Self::SyncError => "SYNC_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::MissingDriveUrl => "MISSING_DRIVE_URL",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::DatabaseError => 2,
            Self::DocumentNotFound | Self::DriveNotFound => 3,
            Self::InvalidArgument | Self::InvalidName | Self::InvalidAction => 4,
            Self::OrderingViolation => 5,
            Self::SubmissionRejected | Self::RemoteError | Self::TransportError | Self::SyncError => {
                6
            }
            Self::ConfigError | Self::MissingDriveUrl => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether repeating the same request unchanged may succeed.
    ///
    /// Only transport failures qualify. Rejections and ordering violations
    /// fail the same way every time.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransportError)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in grantdrive operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Remote drive address is not configured")]
    MissingDriveUrl,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Document not found: {id}")]
    DocumentNotFound { id: String },

    #[error("Drive not found: {id}")]
    DriveNotFound { id: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Name has no alphabetic first character: {name:?}")]
    InvalidName { name: String },

    #[error("Invalid action on {target}: {reason}")]
    InvalidAction { target: String, reason: String },

    #[error("Ordering violation: node {child} references folder {parent} before it exists")]
    OrderingViolation { child: String, parent: String },

    #[error("Submission to {target} rejected ({status}): {message}")]
    Rejected {
        target: String,
        status: String,
        message: String,
    },

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Remote unavailable ({status}) at {url}")]
    Unavailable { status: u16, url: String },

    #[error("Sync notification channel closed before the drive reported success")]
    SyncChannelClosed,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingDriveUrl => ErrorCode::MissingDriveUrl,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::DocumentNotFound { .. } => ErrorCode::DocumentNotFound,
            Self::DriveNotFound { .. } => ErrorCode::DriveNotFound,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::InvalidName { .. } => ErrorCode::InvalidName,
            Self::InvalidAction { .. } => ErrorCode::InvalidAction,
            Self::OrderingViolation { .. } => ErrorCode::OrderingViolation,
            Self::Rejected { .. } => ErrorCode::SubmissionRejected,
            Self::Remote(_) => ErrorCode::RemoteError,
            Self::Transport(_) | Self::Unavailable { .. } => ErrorCode::TransportError,
            Self::SyncChannelClosed => ErrorCode::SyncError,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// True for the "not found" fetch result that authorizes creation.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::DocumentNotFound { .. })
    }

    /// Errors that must stop the whole run instead of one record.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::OrderingViolation { .. } | Self::MissingDriveUrl | Self::Config(_)
        )
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::MissingDriveUrl => Some(
                "Set REMOTE_DOCUMENT_DRIVE (or pass --drive-url) to the drive URL.\n  \
                 To rehearse without a remote, use: grantdrive local --db <path>"
                    .to_string(),
            ),

            Self::DriveNotFound { id } => Some(format!(
                "The remote has no drive '{id}'. Check the drive URL."
            )),

            Self::OrderingViolation { parent, .. } => Some(format!(
                "Folder '{parent}' must be acknowledged by the store before documents are added to it. \
                 Re-running will create missing folders first."
            )),

            Self::Rejected { status, .. } if status == "CONFLICT" => Some(
                "The target log moved since it was fetched. Re-run the import; existing nodes are skipped."
                    .to_string(),
            ),

            Self::Transport(_) | Self::Unavailable { .. } => {
                Some("Check that the remote drive is reachable from this machine.".to_string())
            }

            Self::SyncChannelClosed => Some(
                "The drive never reported SUCCESS. Check the remote sync status endpoint.".to_string(),
            ),

            Self::Config(_)
            | Self::DocumentNotFound { .. }
            | Self::InvalidArgument(_)
            | Self::InvalidName { .. }
            | Self::InvalidAction { .. }
            | Self::Rejected { .. }
            | Self::Remote(_)
            | Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_drive_url_is_config_exit() {
        let err = Error::MissingDriveUrl;
        assert_eq!(err.exit_code(), 7);
        assert!(err.is_fatal());
        assert!(err.hint().unwrap().contains("REMOTE_DOCUMENT_DRIVE"));
    }

    #[test]
    fn test_not_found_is_not_fatal() {
        let err = Error::DocumentNotFound { id: "doc-1".into() };
        assert!(err.is_not_found());
        assert!(!err.is_fatal());
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_ordering_violation_is_fatal_and_not_retryable() {
        let err = Error::OrderingViolation {
            child: "doc-1".into(),
            parent: "bucket-a-f".into(),
        };
        assert!(err.is_fatal());
        assert!(!err.error_code().is_retryable());
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn test_unavailable_is_retryable_transport() {
        let err = Error::Unavailable {
            status: 503,
            url: "http://localhost:4001/d/grants/operations".into(),
        };
        assert_eq!(err.error_code(), ErrorCode::TransportError);
        assert!(err.error_code().is_retryable());
        assert!(!err.is_fatal());
        assert_eq!(err.exit_code(), 6);
    }

    #[test]
    fn test_structured_json() {
        let err = Error::Remote("boom".into());
        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "REMOTE_ERROR");
        assert_eq!(json["error"]["exit_code"], 6);
        assert_eq!(json["error"]["retryable"], false);
        assert!(json["error"].get("hint").is_none());
    }
}
