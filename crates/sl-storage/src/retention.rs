//! Archive retention enforcement.
//!
//! Every entry in the archive directory whose modification time is older
//! than `retention_days` is deleted. Each deletion is logged as a
//! [`RetentionEvent`]; a failed deletion is logged and the sweep continues.
//! Sweeping never fails as a whole.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::layout::COMPRESSED_EXTENSION;

const SECS_PER_DAY: f64 = 86_400.0;

/// Record of one pruned (or, in a dry run, prunable) archive entry.
#[derive(Debug, Clone, Serialize)]
pub struct RetentionEvent {
    pub timestamp: DateTime<Utc>,
    pub file_path: String,
    pub size_bytes: u64,
    pub age_days: f64,
    pub dry_run: bool,
}

/// An entry that should have been pruned but could not be.
#[derive(Debug, Clone, Serialize)]
pub struct RetentionFailure {
    pub file_path: String,
    pub error: String,
}

/// Result of one sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub events: Vec<RetentionEvent>,
    pub failures: Vec<RetentionFailure>,
}

impl SweepReport {
    pub fn pruned(&self) -> usize {
        self.events.len()
    }

    pub fn bytes_freed(&self) -> u64 {
        self.events.iter().map(|e| e.size_bytes).sum()
    }

    /// Summary error when any deletion failed.
    pub fn failure_error(&self) -> Option<sl_common::Error> {
        let first = self.failures.first()?;
        Some(sl_common::Error::Retention(format!(
            "{} of {} expired entries could not be deleted (first: {}: {})",
            self.failures.len(),
            self.failures.len() + self.events.len(),
            first.file_path,
            first.error
        )))
    }
}

/// One file in the archive directory.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub size_bytes: u64,
}

impl ArchiveEntry {
    /// Age relative to `now`; zero for entries dated in the future.
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.modified).unwrap_or_default()
    }

    pub fn is_compressed(&self) -> bool {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(COMPRESSED_EXTENSION))
    }
}

/// Summary of archive contents.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArchiveStatus {
    pub entries: usize,
    pub compressed_entries: usize,
    pub total_bytes: u64,
    pub oldest_age_days: Option<f64>,
    /// Entries a sweep would delete now; 0 when retention is disabled.
    pub expired_entries: usize,
}

/// Deletes archive entries past the retention window.
#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    archive_dir: PathBuf,
    max_age: Option<Duration>,
}

impl RetentionSweeper {
    pub fn new(archive_dir: impl Into<PathBuf>, retention_days: Option<f64>) -> Self {
        RetentionSweeper {
            archive_dir: archive_dir.into(),
            max_age: retention_days.and_then(|d| Duration::try_from_secs_f64(d * SECS_PER_DAY).ok()),
        }
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    pub fn is_enabled(&self) -> bool {
        self.max_age.is_some()
    }

    /// Entries older than this are expired.
    pub fn cutoff(&self, now: SystemTime) -> Option<SystemTime> {
        let max_age = self.max_age?;
        // A window reaching before the epoch expires nothing.
        now.checked_sub(max_age)
    }

    /// List files in the archive directory.
    ///
    /// A missing directory is empty. Entries whose metadata cannot be read
    /// are logged and skipped.
    pub fn scan(&self) -> Vec<ArchiveEntry> {
        let read_dir = match fs::read_dir(&self.archive_dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(
                    "Failed to list archive directory {}: {}",
                    self.archive_dir.display(),
                    e
                );
                return Vec::new();
            }
        };

        let mut entries = Vec::new();
        for dir_entry in read_dir.flatten() {
            let path = dir_entry.path();
            let metadata = match dir_entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    warn!("Failed to stat {}: {}", path.display(), e);
                    continue;
                }
            };
            if !metadata.is_file() {
                debug!("Skipping non-file archive entry {}", path.display());
                continue;
            }
            let modified = match metadata.modified() {
                Ok(t) => t,
                Err(e) => {
                    warn!("Failed to read mtime of {}: {}", path.display(), e);
                    continue;
                }
            };
            entries.push(ArchiveEntry {
                path,
                modified,
                size_bytes: metadata.len(),
            });
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }

    /// Delete expired entries.
    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(SystemTime::now(), false)
    }

    /// Report what a sweep would delete without deleting anything.
    pub fn preview(&self) -> SweepReport {
        self.sweep_at(SystemTime::now(), true)
    }

    /// Sweep relative to an explicit clock.
    pub fn sweep_at(&self, now: SystemTime, dry_run: bool) -> SweepReport {
        let mut report = SweepReport::default();
        let Some(cutoff) = self.cutoff(now) else {
            return report;
        };

        let timestamp = Utc::now();
        for entry in self.scan() {
            if entry.modified >= cutoff {
                continue;
            }

            let age_days = entry.age(now).as_secs_f64() / SECS_PER_DAY;
            let file_path = entry.path.display().to_string();

            if dry_run {
                info!(
                    "[DRY-RUN] Would prune: {} ({} bytes, {:.1} days old)",
                    file_path, entry.size_bytes, age_days
                );
            } else {
                info!(
                    "Pruning: {} ({} bytes, {:.1} days old)",
                    file_path, entry.size_bytes, age_days
                );
                if let Err(e) = fs::remove_file(&entry.path) {
                    warn!("Failed to delete {}: {}", file_path, e);
                    report.failures.push(RetentionFailure {
                        file_path,
                        error: e.to_string(),
                    });
                    continue;
                }
            }

            report.events.push(RetentionEvent {
                timestamp,
                file_path,
                size_bytes: entry.size_bytes,
                age_days,
                dry_run,
            });
        }

        if !report.events.is_empty() && !dry_run {
            info!(
                pruned = report.pruned(),
                bytes = report.bytes_freed(),
                failures = report.failures.len(),
                "Retention sweep complete"
            );
        }

        report
    }

    /// Summarize the archive directory.
    pub fn status(&self) -> ArchiveStatus {
        self.status_at(SystemTime::now())
    }

    pub fn status_at(&self, now: SystemTime) -> ArchiveStatus {
        let entries = self.scan();
        let cutoff = self.cutoff(now);

        ArchiveStatus {
            entries: entries.len(),
            compressed_entries: entries.iter().filter(|e| e.is_compressed()).count(),
            total_bytes: entries.iter().map(|e| e.size_bytes).sum(),
            oldest_age_days: entries
                .iter()
                .map(|e| e.age(now).as_secs_f64() / SECS_PER_DAY)
                .reduce(f64::max),
            expired_entries: cutoff
                .map(|c| entries.iter().filter(|e| e.modified < c).count())
                .unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn create_aged_file(path: &Path, size_bytes: usize, age_secs: u64) -> std::io::Result<()> {
        let mut file = fs::File::create(path)?;
        file.write_all(&vec![b'x'; size_bytes])?;
        file.sync_all()?;

        let mtime = SystemTime::now() - Duration::from_secs(age_secs);
        let ft = filetime::FileTime::from_system_time(mtime);
        filetime::set_file_times(path, ft, ft)?;
        Ok(())
    }

    const DAY: u64 = 86_400;

    #[test]
    fn test_disabled_sweeper_deletes_nothing() {
        let dir = tempdir().unwrap();
        let old = dir.path().join("old.csv");
        create_aged_file(&old, 10, 100 * DAY).unwrap();

        let sweeper = RetentionSweeper::new(dir.path(), None);
        assert!(!sweeper.is_enabled());
        assert_eq!(sweeper.sweep().pruned(), 0);
        assert!(old.exists());
    }

    #[test]
    fn test_sweep_deletes_only_expired() {
        let dir = tempdir().unwrap();
        let old = dir.path().join("old.csv.zip");
        let fresh = dir.path().join("fresh.csv");
        create_aged_file(&old, 100, 2 * DAY).unwrap();
        create_aged_file(&fresh, 50, 60).unwrap();

        let sweeper = RetentionSweeper::new(dir.path(), Some(1.0));
        let report = sweeper.sweep();

        assert_eq!(report.pruned(), 1);
        assert_eq!(report.bytes_freed(), 100);
        assert!(report.failures.is_empty());
        assert!(!report.events[0].dry_run);
        assert!(report.events[0].age_days > 1.9);
        assert!(!old.exists());
        assert!(fresh.exists());
    }

    #[test]
    fn test_fractional_days() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.csv");
        create_aged_file(&file, 1, 2 * 3600).unwrap();

        // One hour window.
        let sweeper = RetentionSweeper::new(dir.path(), Some(1.0 / 24.0));
        assert_eq!(sweeper.sweep().pruned(), 1);
    }

    #[test]
    fn test_preview_keeps_files() {
        let dir = tempdir().unwrap();
        let old = dir.path().join("old.csv");
        create_aged_file(&old, 10, 3 * DAY).unwrap();

        let sweeper = RetentionSweeper::new(dir.path(), Some(1.0));
        let report = sweeper.preview();
        assert_eq!(report.pruned(), 1);
        assert!(report.events[0].dry_run);
        assert!(old.exists());
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let sweeper = RetentionSweeper::new(dir.path().join("absent"), Some(1.0));
        assert!(sweeper.scan().is_empty());
        assert_eq!(sweeper.sweep().pruned(), 0);
    }

    #[test]
    fn test_subdirectories_are_ignored() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        let sweeper = RetentionSweeper::new(dir.path(), Some(0.0));
        assert!(sweeper.scan().is_empty());
    }

    #[test]
    fn test_status_summary() {
        let dir = tempdir().unwrap();
        create_aged_file(&dir.path().join("a.csv.zip"), 10, 5 * DAY).unwrap();
        create_aged_file(&dir.path().join("b.csv"), 20, DAY / 2).unwrap();

        let sweeper = RetentionSweeper::new(dir.path(), Some(2.0));
        let status = sweeper.status();
        assert_eq!(status.entries, 2);
        assert_eq!(status.compressed_entries, 1);
        assert_eq!(status.total_bytes, 30);
        assert_eq!(status.expired_entries, 1);
        assert!(status.oldest_age_days.unwrap() > 4.9);
    }

    #[test]
    fn test_event_serialization() {
        let event = RetentionEvent {
            timestamp: Utc::now(),
            file_path: "/logs/archive/a.csv.zip".to_string(),
            size_bytes: 42,
            age_days: 3.5,
            dry_run: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["file_path"], "/logs/archive/a.csv.zip");
        assert_eq!(json["size_bytes"], 42);
        assert_eq!(json["dry_run"], false);
    }

    #[test]
    fn test_failure_error_summarizes_failures() {
        let mut report = SweepReport::default();
        assert!(report.failure_error().is_none());

        report.failures.push(RetentionFailure {
            file_path: "/logs/archive/a.csv.zip".to_string(),
            error: "Permission denied".to_string(),
        });
        let err = report.failure_error().unwrap();
        assert_eq!(err.code(), 31);
        let message = err.to_string();
        assert!(message.contains("1 of 1"));
        assert!(message.contains("a.csv.zip: Permission denied"));
    }
}
