//! Range and sensor queries over stored readings.
//!
//! A query scans, in path order, the current active file, every file in the
//! log directory that follows the active naming convention, and every plain
//! or zip entry in the archive directory. Matching readings are yielded
//! lazily. Plain files are streamed. Zip members are visited one at a time:
//! each is decompressed into an anonymous temp file when the query reaches
//! it, so memory use does not grow with member size.
//!
//! Queries see flushed data only. Files that vanish between listing and
//! reading are skipped silently; unreadable files and malformed rows are
//! logged and skipped. A query never fails as a whole.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use sl_common::Reading;
use tracing::{debug, trace, warn};
use zip::ZipArchive;

use crate::layout::StorageLayout;
use crate::row::{split_record, ColumnMap, RecordReader};

/// Time range plus optional sensor filter. Both bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub sensor_id: Option<String>,
}

impl LogQuery {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        LogQuery {
            start,
            end,
            sensor_id: None,
        }
    }

    pub fn with_sensor(mut self, sensor_id: impl Into<String>) -> Self {
        self.sensor_id = Some(sensor_id.into());
        self
    }

    pub fn matches(&self, reading: &Reading) -> bool {
        reading.matches(self.start, self.end, self.sensor_id.as_deref())
    }
}

/// Counters accumulated while a query runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryStats {
    pub sources_scanned: usize,
    pub sources_failed: usize,
    pub rows_matched: usize,
    pub rows_skipped: usize,
}

/// Collect the files a query must scan, deduplicated and sorted.
pub fn candidate_files(layout: &StorageLayout, active: Option<&Path>) -> Vec<PathBuf> {
    let mut files = BTreeSet::new();

    if let Some(path) = active {
        match fs::metadata(path) {
            Ok(m) if m.is_file() && m.len() > 0 => {
                files.insert(path.to_path_buf());
            }
            _ => {}
        }
    }

    for path in list_files(layout.log_dir()) {
        if file_name(&path).is_some_and(|n| layout.is_active_file_name(n)) {
            files.insert(path);
        }
    }

    for path in list_files(layout.archive_dir()) {
        if file_name(&path).is_some_and(|n| layout.is_plain_entry(n) || layout.is_compressed_entry(n)) {
            files.insert(path);
        }
    }

    files.into_iter().collect()
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

fn list_files(dir: &Path) -> Vec<PathBuf> {
    match fs::read_dir(dir) {
        Ok(rd) => rd
            .flatten()
            .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
            .map(|e| e.path())
            .collect(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Failed to list directory for query");
            Vec::new()
        }
    }
}

type BoxedReader = Box<dyn BufRead + Send>;

struct SourceScan {
    label: String,
    records: RecordReader<BoxedReader>,
    columns: ColumnMap,
}

/// A zip container whose members are still being visited.
struct ContainerScan {
    label: String,
    archive: ZipArchive<BufReader<File>>,
    next: usize,
}

/// Lazy iterator over readings matching a [`LogQuery`].
pub struct LogIter {
    query: LogQuery,
    plain_extension: String,
    files: std::vec::IntoIter<PathBuf>,
    container: Option<ContainerScan>,
    current: Option<SourceScan>,
    stats: QueryStats,
}

impl LogIter {
    /// Start a query over the stores described by `layout`.
    pub fn new(layout: &StorageLayout, active: Option<&Path>, query: LogQuery) -> Self {
        let files = candidate_files(layout, active);
        debug!(
            files = files.len(),
            start = %query.start,
            end = %query.end,
            sensor = query.sensor_id.as_deref().unwrap_or("*"),
            "Starting log query"
        );
        LogIter {
            query,
            plain_extension: layout.plain_extension().to_string(),
            files: files.into_iter(),
            container: None,
            current: None,
            stats: QueryStats::default(),
        }
    }

    pub fn query(&self) -> &LogQuery {
        &self.query
    }

    /// Counters so far; complete once the iterator is exhausted.
    pub fn stats(&self) -> QueryStats {
        self.stats
    }

    fn begin(&mut self, label: String, reader: BoxedReader) {
        self.stats.sources_scanned += 1;
        let mut records = RecordReader::new(reader);
        match records.next() {
            None => trace!(source = %label, "Empty source"),
            Some(Err(e)) => {
                self.stats.sources_failed += 1;
                warn!(source = %label, error = %e, "Failed to read log source");
            }
            Some(Ok(header)) => {
                let columns = ColumnMap::from_header(&split_record(&header));
                self.current = Some(SourceScan {
                    label,
                    records,
                    columns,
                });
            }
        }
    }

    fn open_path(&mut self, path: &Path) {
        let label = path.display().to_string();
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                trace!(source = %label, "Source vanished before reading");
                return;
            }
            Err(e) => {
                self.stats.sources_failed += 1;
                warn!(source = %label, error = %e, "Failed to open log source");
                return;
            }
        };

        if file_name(path).is_some_and(|n| n.ends_with(crate::layout::COMPRESSED_EXTENSION)) {
            match ZipArchive::new(BufReader::new(file)) {
                Ok(archive) => {
                    self.container = Some(ContainerScan {
                        label,
                        archive,
                        next: 0,
                    })
                }
                Err(e) => {
                    self.stats.sources_failed += 1;
                    warn!(source = %label, error = %e, "Failed to read archive");
                }
            }
        } else {
            self.begin(label, Box::new(BufReader::new(file)));
        }
    }

    /// Begin the next plain member of the open container.
    ///
    /// Returns false once the container is exhausted. An error on any member
    /// abandons the remaining members; members already visited stay counted.
    fn advance_container(&mut self) -> bool {
        let Some(container) = self.container.as_mut() else {
            return false;
        };

        let spooled = loop {
            if container.next >= container.archive.len() {
                break Ok(None);
            }
            let index = container.next;
            container.next += 1;
            match spool_member(&mut container.archive, index, &self.plain_extension) {
                Ok(None) => continue,
                other => break other,
            }
        };

        match spooled {
            Ok(Some((name, file))) => {
                let label = format!("{}:{}", container.label, name);
                self.begin(label, Box::new(BufReader::new(file)));
                true
            }
            Ok(None) => {
                self.container = None;
                false
            }
            Err(e) => {
                self.stats.sources_failed += 1;
                warn!(source = %container.label, error = %e, "Failed to read archive member");
                self.container = None;
                false
            }
        }
    }
}

/// Decompress member `index` into an anonymous temp file, rewound to the start.
/// Directories and members without the plain extension yield `None`.
fn spool_member(
    archive: &mut ZipArchive<BufReader<File>>,
    index: usize,
    extension: &str,
) -> zip::result::ZipResult<Option<(String, File)>> {
    let mut member = archive.by_index(index)?;
    if member.is_dir() || !member.name().ends_with(extension) {
        return Ok(None);
    }
    let name = member.name().to_string();
    let mut spool = tempfile::tempfile()?;
    io::copy(&mut member, &mut spool)?;
    spool.seek(SeekFrom::Start(0))?;
    Ok(Some((name, spool)))
}

impl Iterator for LogIter {
    type Item = Reading;

    fn next(&mut self) -> Option<Reading> {
        loop {
            if let Some(scan) = self.current.as_mut() {
                match scan.records.next() {
                    Some(Ok(record)) => match scan.columns.decode(&split_record(&record)) {
                        Ok(reading) => {
                            if self.query.matches(&reading) {
                                self.stats.rows_matched += 1;
                                return Some(reading);
                            }
                        }
                        Err(e) => {
                            self.stats.rows_skipped += 1;
                            debug!(source = %scan.label, error = %e, "Skipping malformed row");
                        }
                    },
                    Some(Err(e)) => {
                        self.stats.sources_failed += 1;
                        warn!(source = %scan.label, error = %e, "Failed reading log source; skipping remainder");
                        self.current = None;
                    }
                    None => self.current = None,
                }
                continue;
            }

            if self.advance_container() {
                continue;
            }

            let path = self.files.next()?;
            self.open_path(&path);
        }
    }
}
