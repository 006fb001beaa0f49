//! Directory and naming conventions.
//!
//! Active files live directly under `log_dir`, named by formatting the local
//! time with `filename_pattern`. Archive entries live under `log_dir/archive`
//! and are either plain files with the pattern's extension or `.zip`
//! containers.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use sl_config::{pattern_affixes, LoggerConfig, PatternAffixes};

use crate::error::{Result, StorageError};

/// Extension of compressed archive entries.
pub const COMPRESSED_EXTENSION: &str = ".zip";

/// Resolved storage layout for one logger instance.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    log_dir: PathBuf,
    archive_dir: PathBuf,
    pattern: String,
    affixes: PatternAffixes,
    plain_extension: String,
}

impl StorageLayout {
    /// Build the layout described by a configuration.
    pub fn new(config: &LoggerConfig) -> Result<Self> {
        let pattern = config.filename_pattern.clone();
        let affixes = pattern_affixes(&pattern).map_err(|e| StorageError::Pattern {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        let plain_extension = affixes
            .extension()
            .ok_or_else(|| StorageError::Pattern {
                pattern: pattern.clone(),
                message: "no literal file extension".to_string(),
            })?
            .to_string();

        Ok(StorageLayout {
            log_dir: config.log_dir.clone(),
            archive_dir: config.archive_dir(),
            pattern,
            affixes,
            plain_extension,
        })
    }

    /// Create `log_dir` and `log_dir/archive` if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.log_dir, &self.archive_dir] {
            fs::create_dir_all(dir).map_err(|source| StorageError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    /// Extension shared by active files and plain archive entries (`.csv`).
    pub fn plain_extension(&self) -> &str {
        &self.plain_extension
    }

    /// Active file name for a point in time.
    pub fn active_file_name(&self, at: &DateTime<Local>) -> Result<String> {
        let mut name = String::new();
        write!(name, "{}", at.format(&self.pattern)).map_err(|_| StorageError::Pattern {
            pattern: self.pattern.clone(),
            message: "pattern could not be formatted".to_string(),
        })?;
        Ok(name)
    }

    /// Full path of the active file for a point in time.
    pub fn active_path(&self, at: &DateTime<Local>) -> Result<PathBuf> {
        Ok(self.log_dir.join(self.active_file_name(at)?))
    }

    /// Whether a file in `log_dir` follows the active naming convention.
    pub fn is_active_file_name(&self, name: &str) -> bool {
        self.affixes.matches(name)
    }

    /// Whether an archive entry is a plain text file.
    pub fn is_plain_entry(&self, name: &str) -> bool {
        name.ends_with(&self.plain_extension)
    }

    /// Whether an archive entry is a compressed container.
    pub fn is_compressed_entry(&self, name: &str) -> bool {
        name.ends_with(COMPRESSED_EXTENSION)
    }
}
