//! Active file writer and the in-memory reading buffer.
//!
//! Provides buffered appends with a durable flush: every flush writes the
//! pending rows in one call and syncs file data before returning.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use sl_common::Reading;
use tracing::{debug, warn};

use crate::error::{Result, StorageError};
use crate::row::{complete_prefix_len, count_records, encode_reading, header_line};

/// Readings accepted but not yet written, in arrival order.
#[derive(Debug, Clone)]
pub struct ReadingBuffer {
    pending: Vec<Reading>,
    capacity: usize,
}

impl ReadingBuffer {
    /// Create a buffer that reports full at `capacity` readings.
    pub fn new(capacity: usize) -> Self {
        ReadingBuffer {
            pending: Vec::with_capacity(capacity.min(4096)),
            capacity: capacity.max(1),
        }
    }

    /// Queue a reading. Returns true when the buffer has reached capacity.
    pub fn push(&mut self, reading: Reading) -> bool {
        self.pending.push(reading);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.pending.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pending readings, oldest first.
    pub fn pending(&self) -> &[Reading] {
        &self.pending
    }

    /// Drop the first `n` readings once they are durably written.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.pending.len());
        self.pending.drain(..n);
    }
}

/// The file currently receiving appends.
///
/// Line count covers the header plus every record written through this
/// handle or found on disk when an existing file was reopened.
#[derive(Debug)]
pub struct ActiveFile {
    path: PathBuf,
    file: File,
    lines: u64,
}

impl ActiveFile {
    /// Open `path` for appending.
    ///
    /// A new or empty file gets the header written and synced immediately.
    /// An existing non-empty file loses any torn final record, then its
    /// records are counted so that line-based rotation stays accurate across
    /// restarts.
    pub fn open(path: &Path) -> Result<Self> {
        let open_err = |source| StorageError::Open {
            path: path.to_path_buf(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)
            .map_err(open_err)?;
        let mut size = file.metadata().map_err(open_err)?.len();
        if size > 0 {
            size = Self::truncate_torn_tail(&file, path, size)?;
        }

        let lines = if size == 0 {
            let write_err = |source| StorageError::Write {
                path: path.to_path_buf(),
                source,
            };
            file.write_all(header_line().as_bytes()).map_err(write_err)?;
            file.sync_data().map_err(write_err)?;
            1
        } else {
            let reader = File::open(path).map_err(open_err)?;
            let lines = count_records(BufReader::new(reader)).map_err(open_err)?;
            debug!(path = %path.display(), lines, "Reopened existing active file");
            lines
        };

        Ok(ActiveFile {
            path: path.to_path_buf(),
            file,
            lines,
        })
    }

    /// Cut the file back to its last complete record.
    ///
    /// A crash mid-flush can leave a partial row, possibly inside an open
    /// quoted field. Left in place it would swallow every later row into one
    /// malformed record. Returns the new size.
    fn truncate_torn_tail(file: &File, path: &Path, size: u64) -> Result<u64> {
        let reader = File::open(path).map_err(|source| StorageError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let keep = complete_prefix_len(BufReader::new(reader)).map_err(|source| {
            StorageError::Open {
                path: path.to_path_buf(),
                source,
            }
        })?;

        if keep < size {
            warn!(
                path = %path.display(),
                torn_bytes = size - keep,
                "Active file ends mid-record; truncating the partial row"
            );
            file.set_len(keep).map_err(|source| StorageError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Ok(keep)
    }

    /// Append readings in one write and sync them to disk.
    ///
    /// On error nothing is counted; the caller keeps the readings.
    pub fn append(&mut self, readings: &[Reading]) -> Result<usize> {
        if readings.is_empty() {
            return Ok(0);
        }

        let mut out = String::with_capacity(readings.len() * 64);
        for reading in readings {
            encode_reading(reading, &mut out);
        }

        let write_err = |source| StorageError::Write {
            path: self.path.clone(),
            source,
        };
        self.file.write_all(out.as_bytes()).map_err(write_err)?;
        self.file.sync_data().map_err(write_err)?;

        self.lines += readings.len() as u64;
        Ok(readings.len())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines in the file, header included.
    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// Current size on disk. `NotFound` if the file was removed underneath us.
    pub fn size_bytes(&self) -> io::Result<u64> {
        fs::metadata(&self.path).map(|m| m.len())
    }

    /// Sync and release the handle.
    pub fn close(self) -> Result<PathBuf> {
        self.file.sync_all().map_err(|source| StorageError::Write {
            path: self.path.clone(),
            source,
        })?;
        Ok(self.path)
    }
}
