//! Archival of closed active files.
//!
//! A closed file is either compressed into `<name>.zip` (one entry named
//! `<name>`) or moved as-is into the archive directory. Compression failure
//! falls back to a plain move; if that fails too the file stays where it
//! was. Existing archive entries are never overwritten: a collision gets a
//! numeric suffix before the extension (`sensors_20250101.1.csv`).

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

use crate::layout::{StorageLayout, COMPRESSED_EXTENSION};

/// Errors from a single archival attempt.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("no free archive name for {0}")]
    NameExhausted(String),
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> ArchiveError + '_ {
    move |source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// What happened to a closed active file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ArchiveOutcome {
    /// Stored as a zip container in the archive directory.
    Compressed { path: PathBuf },
    /// Moved uncompressed into the archive directory.
    Relocated { path: PathBuf },
    /// Could not be archived; still at its original location.
    Stranded { path: PathBuf },
    /// There was no file to archive.
    Missing,
}

impl ArchiveOutcome {
    /// Location of the archived data, if it reached the archive directory.
    pub fn archived_path(&self) -> Option<&Path> {
        match self {
            ArchiveOutcome::Compressed { path } | ArchiveOutcome::Relocated { path } => Some(path),
            ArchiveOutcome::Stranded { .. } | ArchiveOutcome::Missing => None,
        }
    }

    /// The failure to report for a stranded file, for callers that must fail on it.
    pub fn stranded_error(&self) -> Option<sl_common::Error> {
        match self {
            ArchiveOutcome::Stranded { path } => Some(sl_common::Error::Archive(format!(
                "{} could not be archived and was left in place",
                path.display()
            ))),
            _ => None,
        }
    }
}

/// Moves closed files into the archive directory.
#[derive(Debug, Clone)]
pub struct ArchiveManager {
    archive_dir: PathBuf,
    plain_extension: String,
    compress: bool,
}

impl ArchiveManager {
    pub fn new(layout: &StorageLayout, compress: bool) -> Self {
        ArchiveManager {
            archive_dir: layout.archive_dir().to_path_buf(),
            plain_extension: layout.plain_extension().to_string(),
            compress,
        }
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    /// Archive a closed file. Never fails; the outcome says where it ended up.
    pub fn archive(&self, source: &Path) -> ArchiveOutcome {
        self.archive_with(source, write_zip)
    }

    /// [`archive`](Self::archive) with the container body written by `write`.
    fn archive_with<W>(&self, source: &Path, write: W) -> ArchiveOutcome
    where
        W: FnOnce(File, File, &Path, &str) -> Result<(), ArchiveError>,
    {
        if !source.is_file() {
            debug!(path = %source.display(), "Nothing to archive");
            return ArchiveOutcome::Missing;
        }

        let base_name = match source.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => {
                warn!(path = %source.display(), "Active file name is not valid UTF-8; leaving in place");
                return ArchiveOutcome::Stranded {
                    path: source.to_path_buf(),
                };
            }
        };

        if self.compress {
            match self.compress_into_archive(source, &base_name, write) {
                Ok(path) => {
                    info!(
                        source = %source.display(),
                        archive = %path.display(),
                        "Archived active file"
                    );
                    return ArchiveOutcome::Compressed { path };
                }
                Err(e) => {
                    warn!(
                        source = %source.display(),
                        error = %e,
                        "Compression failed; falling back to plain move"
                    );
                }
            }
        }

        match self.relocate(source, &base_name) {
            Ok(path) => {
                info!(
                    source = %source.display(),
                    archive = %path.display(),
                    "Moved active file to archive"
                );
                ArchiveOutcome::Relocated { path }
            }
            Err(e) => {
                error!(
                    source = %source.display(),
                    error = %e,
                    "Failed to archive active file; leaving in place"
                );
                ArchiveOutcome::Stranded {
                    path: source.to_path_buf(),
                }
            }
        }
    }

    fn compress_into_archive<W>(
        &self,
        source: &Path,
        base_name: &str,
        write: W,
    ) -> Result<PathBuf, ArchiveError>
    where
        W: FnOnce(File, File, &Path, &str) -> Result<(), ArchiveError>,
    {
        let target = self.unique_target(base_name, true)?;
        let input = File::open(source).map_err(io_err(source))?;
        let output = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .map_err(io_err(&target))?;

        let result = write(input, output, source, base_name)
            .and_then(|()| fs::remove_file(source).map_err(io_err(source)));

        if let Err(e) = result {
            // Leave no partial or duplicate container behind.
            if let Err(cleanup) = fs::remove_file(&target) {
                warn!(path = %target.display(), error = %cleanup, "Failed to remove partial archive");
            }
            return Err(e);
        }

        Ok(target)
    }

    fn relocate(&self, source: &Path, base_name: &str) -> Result<PathBuf, ArchiveError> {
        let target = self.unique_target(base_name, false)?;
        move_file(source, &target).map_err(io_err(source))?;
        Ok(target)
    }

    /// First archive path for `base_name` that does not exist yet.
    pub fn unique_target(&self, base_name: &str, compressed: bool) -> Result<PathBuf, ArchiveError> {
        let stem = base_name
            .strip_suffix(self.plain_extension.as_str())
            .unwrap_or(base_name);
        let ext = if base_name.len() == stem.len() {
            ""
        } else {
            self.plain_extension.as_str()
        };

        for n in 0..=u16::MAX {
            let mut name = if n == 0 {
                base_name.to_string()
            } else {
                format!("{stem}.{n}{ext}")
            };
            if compressed {
                name.push_str(COMPRESSED_EXTENSION);
            }
            let candidate = self.archive_dir.join(name);
            if !candidate.exists() {
                return Ok(candidate);
            }
        }

        Err(ArchiveError::NameExhausted(base_name.to_string()))
    }
}

fn write_zip(mut input: File, output: File, source: &Path, entry_name: &str) -> Result<(), ArchiveError> {
    let mut zip = ZipWriter::new(output);

    let options: FileOptions<'_, ()> = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    zip.start_file(entry_name, options)?;
    io::copy(&mut input, &mut zip).map_err(io_err(source))?;

    let output = zip.finish()?;
    output.sync_all().map_err(io_err(source))?;
    Ok(())
}

/// Rename, falling back to copy + remove across filesystems.
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            debug!(from = %from.display(), to = %to.display(), error = %rename_err, "Rename failed; copying");
            if let Err(e) = fs::copy(from, to) {
                let _ = fs::remove_file(to);
                return Err(e);
            }
            if let Err(e) = fs::remove_file(from) {
                let _ = fs::remove_file(to);
                return Err(e);
            }
            Ok(())
        }
    }
}
