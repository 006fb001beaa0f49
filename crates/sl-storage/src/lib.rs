//! sensorlog storage engine.
//!
//! This crate provides:
//! - Buffered CSV writing to a date-named active file
//! - Rotation by elapsed time, file size or line count
//! - Archival into zip containers with a plain-move fallback
//! - Age-based retention of archive entries
//! - Lazy time-range and sensor queries across live and archived files
//!
//! [`SensorLogger`] ties these together; the individual pieces are public
//! for tools that only need one of them.

pub mod archive;
pub mod error;
pub mod layout;
pub mod logger;
pub mod query;
pub mod retention;
pub mod rotation;
pub mod row;
pub mod writer;

pub use archive::{ArchiveError, ArchiveManager, ArchiveOutcome};
pub use error::{Result, StorageError};
pub use layout::{StorageLayout, COMPRESSED_EXTENSION};
pub use logger::{LoggerStats, SensorLogger};
pub use query::{candidate_files, LogIter, LogQuery, QueryStats};
pub use retention::{ArchiveStatus, RetentionEvent, RetentionFailure, RetentionSweeper, SweepReport};
pub use rotation::{RotationPolicy, RotationTrigger};
pub use writer::{ActiveFile, ReadingBuffer};
