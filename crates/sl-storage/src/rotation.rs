//! Rotation policy.
//!
//! Triggers are evaluated in a fixed order: elapsed time, file size, line
//! count. The first one that fires wins.

use std::fmt;
use std::io;
use std::time::Duration;

use serde::Serialize;
use sl_config::LoggerConfig;
use tracing::warn;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Why a rotation happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationTrigger {
    Time,
    Size,
    Lines,
    Manual,
}

impl fmt::Display for RotationTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotationTrigger::Time => write!(f, "time"),
            RotationTrigger::Size => write!(f, "size"),
            RotationTrigger::Lines => write!(f, "lines"),
            RotationTrigger::Manual => write!(f, "manual"),
        }
    }
}

/// Thresholds that close the active file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RotationPolicy {
    pub max_age: Option<Duration>,
    pub max_bytes: Option<u64>,
    pub max_lines: Option<u64>,
}

impl RotationPolicy {
    pub fn from_config(config: &LoggerConfig) -> Self {
        RotationPolicy {
            max_age: config
                .rotate_every_hours
                .and_then(|h| Duration::try_from_secs_f64(h * 3600.0).ok()),
            max_bytes: config.max_size_mb.map(|mb| (mb * BYTES_PER_MIB).ceil() as u64),
            max_lines: config.rotate_after_lines,
        }
    }

    /// Whether any trigger is configured.
    pub fn is_enabled(&self) -> bool {
        self.max_age.is_some() || self.max_bytes.is_some() || self.max_lines.is_some()
    }

    /// Decide whether to rotate.
    ///
    /// `size` is only consulted when a size limit is set and the time
    /// trigger did not fire. A missing file counts as no trigger; other stat
    /// failures are logged and also count as no trigger.
    pub fn evaluate(
        &self,
        elapsed: Duration,
        lines: u64,
        size: impl FnOnce() -> io::Result<u64>,
    ) -> Option<RotationTrigger> {
        if self.max_age.is_some_and(|max| elapsed >= max) {
            return Some(RotationTrigger::Time);
        }

        if let Some(max) = self.max_bytes {
            match size() {
                Ok(bytes) if bytes >= max => return Some(RotationTrigger::Size),
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(error = %e, "Failed to stat active file for rotation check"),
            }
        }

        if self.max_lines.is_some_and(|max| lines >= max) {
            return Some(RotationTrigger::Lines);
        }

        None
    }
}
