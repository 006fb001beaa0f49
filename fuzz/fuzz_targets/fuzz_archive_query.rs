//! Fuzz target for queries over damaged archive entries.
//!
//! Writes arbitrary bytes into the archive directory under a valid entry
//! name and runs a full-range query. Corrupt zips and malformed rows must be
//! skipped, never panic.

#![no_main]

use arbitrary::Arbitrary;
use chrono::NaiveDateTime;
use libfuzzer_sys::fuzz_target;
use sl_config::LoggerConfig;
use sl_storage::{LogIter, LogQuery, StorageLayout};

#[derive(Debug, Arbitrary)]
struct Input {
    compressed: bool,
    sensor: Option<String>,
    data: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let Ok(dir) = tempfile::tempdir() else {
        return;
    };
    let config = LoggerConfig::new(dir.path());
    let Ok(layout) = StorageLayout::new(&config) else {
        return;
    };
    if layout.ensure_dirs().is_err() {
        return;
    }

    let name = if input.compressed {
        "sensors_20250101.zip"
    } else {
        "sensors_20250101.csv"
    };
    if std::fs::write(layout.archive_dir().join(name), &input.data).is_err() {
        return;
    }

    let mut query = LogQuery::new(NaiveDateTime::MIN, NaiveDateTime::MAX);
    if let Some(sensor) = input.sensor {
        query = query.with_sensor(sensor);
    }
    for _ in LogIter::new(&layout, None, query) {}
});
