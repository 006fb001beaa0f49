//! The sensor logger: ingestion, rotation and retrieval behind one handle.

use std::path::Path;
use std::time::Instant;

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use sl_common::Reading;
use sl_config::{validate_config, LoggerConfig};
use tracing::{debug, info, warn};

use crate::archive::{ArchiveManager, ArchiveOutcome};
use crate::error::Result;
use crate::layout::StorageLayout;
use crate::query::{LogIter, LogQuery};
use crate::retention::{ArchiveStatus, RetentionSweeper, SweepReport};
use crate::rotation::{RotationPolicy, RotationTrigger};
use crate::writer::{ActiveFile, ReadingBuffer};

/// Lifetime counters for one logger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoggerStats {
    pub readings_accepted: u64,
    pub rows_flushed: u64,
    pub flushes: u64,
    pub rotations: u64,
    pub archives_compressed: u64,
    pub archives_relocated: u64,
    pub archives_stranded: u64,
    pub entries_pruned: u64,
}

impl LoggerStats {
    fn record_outcome(&mut self, outcome: &ArchiveOutcome) {
        match outcome {
            ArchiveOutcome::Compressed { .. } => self.archives_compressed += 1,
            ArchiveOutcome::Relocated { .. } => self.archives_relocated += 1,
            ArchiveOutcome::Stranded { .. } => self.archives_stranded += 1,
            ArchiveOutcome::Missing => {}
        }
    }
}

/// Buffered, rotating CSV logger for sensor readings.
///
/// Owns at most one open active file. All work happens on the caller's
/// thread; wrap in a `Mutex` to share.
pub struct SensorLogger {
    config: LoggerConfig,
    layout: StorageLayout,
    policy: RotationPolicy,
    archiver: ArchiveManager,
    sweeper: RetentionSweeper,
    buffer: ReadingBuffer,
    active: Option<ActiveFile>,
    rotation_clock: Instant,
    stats: LoggerStats,
}

impl SensorLogger {
    /// Validate the configuration and create the storage directories.
    pub fn new(config: LoggerConfig) -> Result<Self> {
        validate_config(&config)?;
        let layout = StorageLayout::new(&config)?;
        layout.ensure_dirs()?;

        Ok(SensorLogger {
            policy: RotationPolicy::from_config(&config),
            archiver: ArchiveManager::new(&layout, config.compress_archive),
            sweeper: RetentionSweeper::new(layout.archive_dir(), config.retention_days),
            buffer: ReadingBuffer::new(config.buffer_size),
            active: None,
            rotation_clock: Instant::now(),
            stats: LoggerStats::default(),
            layout,
            config,
        })
    }

    /// Open the active file for the current time, closing any open one first.
    pub fn start(&mut self) -> Result<()> {
        if self.active.is_some() {
            self.stop()?;
        }

        let path = self.layout.active_path(&Local::now())?;
        let file = ActiveFile::open(&path)?;
        info!(path = %path.display(), lines = file.lines(), "Opened active file");

        self.active = Some(file);
        self.rotation_clock = Instant::now();
        Ok(())
    }

    /// Flush the buffer and close the active file.
    ///
    /// The handle is released even when the flush fails; unflushed readings
    /// stay buffered and are written after the next start.
    pub fn stop(&mut self) -> Result<()> {
        let flushed = self.flush();
        let closed = match self.active.take() {
            Some(file) => file.close().map(|path| {
                debug!(path = %path.display(), "Closed active file");
            }),
            None => Ok(()),
        };
        flushed.and(closed)
    }

    pub fn is_started(&self) -> bool {
        self.active.is_some()
    }

    /// Accept one reading, flushing and rotating as configured.
    pub fn log_reading(
        &mut self,
        sensor_id: &str,
        timestamp: NaiveDateTime,
        value: f64,
        unit: &str,
    ) -> Result<()> {
        self.log(Reading::new(sensor_id, timestamp, value, unit))
    }

    /// Accept one reading.
    pub fn log(&mut self, reading: Reading) -> Result<()> {
        if self.active.is_none() {
            self.start()?;
        }

        self.stats.readings_accepted += 1;
        if self.buffer.push(reading) {
            self.flush()?;
        }

        if let Some(trigger) = self.evaluate_rotation() {
            debug!(trigger = %trigger, "Rotation triggered");
            self.rotate_with(trigger)?;
        }
        Ok(())
    }

    /// Write every buffered reading to the active file and sync it.
    ///
    /// A no-op when nothing is buffered or no file is open. On failure the
    /// buffer is left intact.
    pub fn flush(&mut self) -> Result<()> {
        let Some(file) = self.active.as_mut() else {
            return Ok(());
        };
        if self.buffer.is_empty() {
            return Ok(());
        }

        let written = file.append(self.buffer.pending())?;
        self.buffer.consume(written);
        self.stats.rows_flushed += written as u64;
        self.stats.flushes += 1;
        debug!(rows = written, lines = file.lines(), "Flushed buffer");
        Ok(())
    }

    fn evaluate_rotation(&self) -> Option<RotationTrigger> {
        let file = self.active.as_ref()?;
        if !self.policy.is_enabled() {
            return None;
        }
        self.policy
            .evaluate(self.rotation_clock.elapsed(), file.lines(), || file.size_bytes())
    }

    /// Force a rotation now.
    pub fn rotate(&mut self) -> Result<ArchiveOutcome> {
        self.rotate_with(RotationTrigger::Manual)
    }

    fn rotate_with(&mut self, trigger: RotationTrigger) -> Result<ArchiveOutcome> {
        let closed = self.active.as_ref().map(|f| f.path().to_path_buf());
        self.stop()?;

        let outcome = match &closed {
            Some(path) => self.archiver.archive(path),
            None => ArchiveOutcome::Missing,
        };
        self.stats.record_outcome(&outcome);

        let report = self.sweeper.sweep();
        self.stats.entries_pruned += report.pruned() as u64;

        self.stats.rotations += 1;
        info!(
            trigger = %trigger,
            archived = ?outcome.archived_path(),
            pruned = report.pruned(),
            "Rotation complete"
        );

        self.start()?;
        Ok(outcome)
    }

    /// Delete expired archive entries outside of a rotation.
    pub fn sweep_retention(&self) -> SweepReport {
        self.sweeper.sweep()
    }

    /// List expired archive entries without deleting them.
    pub fn preview_retention(&self) -> SweepReport {
        self.sweeper.preview()
    }

    pub fn archive_status(&self) -> ArchiveStatus {
        self.sweeper.status()
    }

    /// Readings in `[start, end]`, optionally for one sensor.
    ///
    /// Only flushed readings are visible.
    pub fn read_logs(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        sensor_id: Option<&str>,
    ) -> LogIter {
        let mut query = LogQuery::new(start, end);
        query.sensor_id = sensor_id.map(str::to_string);
        self.query(query)
    }

    pub fn query(&self, query: LogQuery) -> LogIter {
        LogIter::new(&self.layout, self.active_path(), query)
    }

    pub fn stats(&self) -> LoggerStats {
        self.stats
    }

    pub fn active_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|f| f.path())
    }

    /// Lines in the active file, header included.
    pub fn active_lines(&self) -> Option<u64> {
        self.active.as_ref().map(|f| f.lines())
    }

    /// Number of readings waiting to be flushed.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }
}

impl Drop for SensorLogger {
    fn drop(&mut self) {
        // Best-effort flush and close on drop
        if self.active.is_some() {
            if let Err(e) = self.stop() {
                warn!(error = %e, buffered = self.buffer.len(), "Failed to stop logger on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use std::fs;
    use tempfile::TempDir;

    fn ts(secs: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::seconds(secs)
    }

    fn logger(config: LoggerConfig) -> SensorLogger {
        SensorLogger::new(config).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let tmp = TempDir::new().unwrap();
        let config = LoggerConfig::new(tmp.path()).with_buffer_size(0);
        assert!(SensorLogger::new(config).is_err());
    }

    #[test]
    fn test_log_reading_auto_starts() {
        let tmp = TempDir::new().unwrap();
        let mut log = logger(LoggerConfig::new(tmp.path()));
        assert!(!log.is_started());
        log.log_reading("s1", ts(0), 1.0, "C").unwrap();
        assert!(log.is_started());
        assert_eq!(log.buffered(), 1);
        assert_eq!(log.active_lines(), Some(1));
    }

    #[test]
    fn test_buffer_flushes_at_capacity() {
        let tmp = TempDir::new().unwrap();
        let mut log = logger(LoggerConfig::new(tmp.path()).with_buffer_size(3));
        for i in 0..3 {
            log.log_reading("s1", ts(i), 1.0, "C").unwrap();
            assert!(log.buffered() < 3);
        }
        assert_eq!(log.buffered(), 0);
        assert_eq!(log.active_lines(), Some(4));
        assert_eq!(log.stats().flushes, 1);
    }

    #[test]
    fn test_manual_rotation_archives_and_reopens() {
        let tmp = TempDir::new().unwrap();
        let mut log = logger(LoggerConfig::new(tmp.path()));
        log.log_reading("s1", ts(0), 1.0, "C").unwrap();

        let outcome = log.rotate().unwrap();
        let archived = outcome.archived_path().unwrap().to_path_buf();
        assert!(archived.exists());
        assert!(matches!(outcome, ArchiveOutcome::Compressed { .. }));

        assert_eq!(log.active_lines(), Some(1));
        assert_eq!(log.stats().rotations, 1);
        assert_eq!(log.stats().archives_compressed, 1);
    }

    #[test]
    fn test_rotate_before_start_archives_nothing() {
        let tmp = TempDir::new().unwrap();
        let mut log = logger(LoggerConfig::new(tmp.path()));
        assert_eq!(log.rotate().unwrap(), ArchiveOutcome::Missing);
        assert!(log.is_started());
    }

    #[test]
    fn test_queries_do_not_see_buffered_readings() {
        let tmp = TempDir::new().unwrap();
        let mut log = logger(LoggerConfig::new(tmp.path()));
        log.log_reading("s1", ts(0), 1.0, "C").unwrap();
        assert_eq!(log.read_logs(ts(-1), ts(1), None).count(), 0);
        log.flush().unwrap();
        assert_eq!(log.read_logs(ts(-1), ts(1), None).count(), 1);
    }

    #[test]
    fn test_drop_flushes() {
        let tmp = TempDir::new().unwrap();
        let path = {
            let mut log = logger(LoggerConfig::new(tmp.path()));
            log.log_reading("s1", ts(0), 1.0, "C").unwrap();
            log.active_path().unwrap().to_path_buf()
        };
        assert_eq!(fs::read_to_string(path).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let mut log = logger(LoggerConfig::new(tmp.path()));
        log.stop().unwrap();
        log.start().unwrap();
        log.stop().unwrap();
        log.stop().unwrap();
        assert!(!log.is_started());
    }
}
