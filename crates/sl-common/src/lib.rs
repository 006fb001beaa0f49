//! sensorlog common types and errors.
//!
//! This crate provides foundational types shared across the sensorlog crates:
//! - The [`Reading`] record and its timestamp encoding
//! - The unified error taxonomy with stable codes

pub mod error;
pub mod reading;

pub use error::{format_error_human, Error, ErrorCategory, Result, StructuredError};
pub use reading::{format_timestamp, parse_timestamp, Reading};

/// CSV header written as the first line of every active file.
pub const CSV_HEADER: [&str; 4] = ["timestamp", "sensor_id", "value", "unit"];
