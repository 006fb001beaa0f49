//! Logger configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the archive directory under `log_dir`.
pub const ARCHIVE_DIR_NAME: &str = "archive";

/// Default flush threshold.
pub const DEFAULT_BUFFER_SIZE: usize = 10;

/// Default active file name pattern.
pub const DEFAULT_FILENAME_PATTERN: &str = "sensors_%Y%m%d.csv";

/// Options controlling storage, rotation and retention.
///
/// Every rotation threshold is independently optional; leaving one unset
/// disables that trigger. Resolved once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Root directory for active files; archives live in `log_dir/archive`.
    pub log_dir: PathBuf,

    /// strftime template for active file names.
    pub filename_pattern: String,

    /// Number of buffered readings that triggers a flush.
    pub buffer_size: usize,

    /// Rotate once the active file has been open this long.
    pub rotate_every_hours: Option<f64>,

    /// Rotate once the active file reaches this size (MiB).
    pub max_size_mb: Option<f64>,

    /// Rotate once the active file holds this many lines, header included.
    pub rotate_after_lines: Option<u64>,

    /// Delete archive entries older than this many days.
    pub retention_days: Option<f64>,

    /// Zip rotated files instead of moving them as plain text.
    pub compress_archive: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig {
            log_dir: PathBuf::from("./logs"),
            filename_pattern: DEFAULT_FILENAME_PATTERN.to_string(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            rotate_every_hours: None,
            max_size_mb: None,
            rotate_after_lines: None,
            retention_days: None,
            compress_archive: true,
        }
    }
}

impl LoggerConfig {
    /// Default configuration rooted at `log_dir`.
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        LoggerConfig {
            log_dir: log_dir.into(),
            ..Default::default()
        }
    }

    /// Parse a configuration from JSON text.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Directory holding archive entries.
    pub fn archive_dir(&self) -> PathBuf {
        self.log_dir.join(ARCHIVE_DIR_NAME)
    }

    /// Whether any automatic rotation trigger is configured.
    pub fn rotation_enabled(&self) -> bool {
        self.rotate_every_hours.is_some()
            || self.max_size_mb.is_some()
            || self.rotate_after_lines.is_some()
    }

    pub fn with_log_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.log_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_filename_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.filename_pattern = pattern.into();
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    pub fn with_rotate_every_hours(mut self, hours: f64) -> Self {
        self.rotate_every_hours = Some(hours);
        self
    }

    pub fn with_max_size_mb(mut self, mb: f64) -> Self {
        self.max_size_mb = Some(mb);
        self
    }

    pub fn with_rotate_after_lines(mut self, lines: u64) -> Self {
        self.rotate_after_lines = Some(lines);
        self
    }

    pub fn with_retention_days(mut self, days: f64) -> Self {
        self.retention_days = Some(days);
        self
    }

    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress_archive = enabled;
        self
    }
}
