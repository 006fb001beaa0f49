//! Fuzz target for `sensorlog record` input lines.

#![no_main]

use chrono::NaiveDate;
use libfuzzer_sys::fuzz_target;
use sl_core::ingest::parse_line;

fuzz_target!(|line: &str| {
    let Some(now) = NaiveDate::from_ymd_opt(2025, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
    else {
        return;
    };
    let _ = parse_line(line, now);
});
