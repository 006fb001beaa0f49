//! Error types for the storage engine.
//!
//! Only failures on the active file surface to callers. Archival, retention
//! and query failures are recovered or logged where they happen.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to open active file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write active file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid filename pattern {pattern:?}: {message}")]
    Pattern { pattern: String, message: String },

    #[error("Invalid configuration: {0}")]
    Config(#[from] sl_config::ValidationError),
}

impl StorageError {
    /// Path of the file involved, if any.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            StorageError::Open { path, .. }
            | StorageError::Write { path, .. }
            | StorageError::CreateDir { path, .. } => Some(path),
            StorageError::Pattern { .. } | StorageError::Config(_) => None,
        }
    }
}

impl From<StorageError> for sl_common::Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Open { path, source } | StorageError::CreateDir { path, source } => {
                sl_common::Error::StorageOpen {
                    path: path.display().to_string(),
                    message: source.to_string(),
                }
            }
            StorageError::Write { path, source } => sl_common::Error::StorageWrite {
                path: path.display().to_string(),
                message: source.to_string(),
            },
            StorageError::Pattern { pattern, message } => sl_common::Error::InvalidConfig {
                field: "filename_pattern".to_string(),
                message: format!("{pattern:?}: {message}"),
            },
            StorageError::Config(sl_config::ValidationError::InvalidValue { field, message }) => {
                sl_common::Error::InvalidConfig { field, message }
            }
        }
    }
}

/// Result alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
