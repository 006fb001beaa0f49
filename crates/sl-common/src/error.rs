//! Error types for sensorlog.
//!
//! Each crate keeps its own `thiserror` enum for the failures it raises and
//! converts into this unified [`Error`] at the binary boundary, which adds:
//! - Stable error codes for machine parsing
//! - Category classification for grouping
//! - Recoverability hints
//! - Remediation suggestions for humans
//!
//! # Agent-Facing Output
//!
//! ```json
//! {
//!   "code": 21,
//!   "category": "storage",
//!   "message": "failed to write active file logs/sensors_20250101.csv: No space left on device",
//!   "recoverable": true,
//!   "context": { "path": "logs/sensors_20250101.csv" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for sensorlog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration loading and validation.
    Config,
    /// Opening or writing the active file.
    Storage,
    /// Compressing or relocating rotated files.
    Archive,
    /// Reading stored records back.
    Query,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Storage => write!(f, "storage"),
            ErrorCategory::Archive => write!(f, "archive"),
            ErrorCategory::Query => write!(f, "query"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for sensorlog.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid value for {field}: {message}")]
    InvalidConfig { field: String, message: String },

    // Storage errors (20-29)
    #[error("failed to open active file {path}: {message}")]
    StorageOpen { path: String, message: String },

    #[error("failed to write active file {path}: {message}")]
    StorageWrite { path: String, message: String },

    // Archive errors (30-39)
    #[error("archival failed: {0}")]
    Archive(String),

    #[error("retention sweep failed: {0}")]
    Retention(String),

    // Query errors (40-49)
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Storage errors
    /// - 30-39: Archive errors
    /// - 40-49: Query errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidConfig { .. } => 11,
            Error::StorageOpen { .. } => 20,
            Error::StorageWrite { .. } => 21,
            Error::Archive(_) => 30,
            Error::Retention(_) => 31,
            Error::InvalidQuery(_) => 40,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidConfig { .. } => ErrorCategory::Config,
            Error::StorageOpen { .. } | Error::StorageWrite { .. } => ErrorCategory::Storage,
            Error::Archive(_) | Error::Retention(_) => ErrorCategory::Archive,
            Error::InvalidQuery(_) => ErrorCategory::Query,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable.
    ///
    /// Storage errors are usually transient (disk full, permissions) and the
    /// ingestion caller may resubmit; configuration errors need a fix first.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) | Error::InvalidConfig { .. } => false,
            Error::StorageOpen { .. } | Error::StorageWrite { .. } => true,
            Error::Archive(_) | Error::Retention(_) => true,
            Error::InvalidQuery(_) => false,
            Error::Io(_) => true,
            Error::Json(_) => false,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => "Check the config file syntax and that it is readable.",
            Error::InvalidConfig { .. } => {
                "Fix the named option in the config file; unset thresholds disable their trigger."
            }
            Error::StorageOpen { .. } => {
                "Check that log_dir exists and is writable by the current user."
            }
            Error::StorageWrite { .. } => {
                "Check free disk space and permissions on log_dir, then resubmit the reading."
            }
            Error::Archive(_) => {
                "Check permissions on log_dir/archive. Stranded files are picked up on the next start."
            }
            Error::Retention(_) => "Check permissions on log_dir/archive and remove the entry manually.",
            Error::InvalidQuery(_) => {
                "Use ISO-8601 timestamps (YYYY-MM-DDTHH:MM:SS) with start <= end."
            }
            Error::Io(_) => "Check disk space, permissions, and that directories exist. Retry.",
            Error::Json(_) => "Invalid JSON. Check syntax with 'jq .' or restore from backup.",
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::InvalidConfig { .. } => "Invalid Configuration",
            Error::StorageOpen { .. } => "Cannot Open Active File",
            Error::StorageWrite { .. } => "Write Failed",
            Error::Archive(_) => "Archival Failed",
            Error::Retention(_) => "Retention Sweep Failed",
            Error::InvalidQuery(_) => "Invalid Query",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Error",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Additional structured context (e.g. file path).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::StorageOpen { path, .. } | Error::StorageWrite { path, .. } => {
                context.insert("path".to_string(), serde_json::json!(path));
            }
            Error::InvalidConfig { field, .. } => {
                context.insert("field".to_string(), serde_json::json!(field));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            context,
        }
    }
}

impl StructuredError {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}

/// Format an error for human-readable stderr output.
///
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        headline = err.headline(),
        message = err,
        remediation = err.remediation(),
    )
}
