//! The sensor reading record and its timestamp encoding.

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Timestamp layouts accepted when parsing stored rows, most common first.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// One accepted sensor data point.
///
/// Timestamps are local wall-clock times without an offset, as produced by
/// the ingestion source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: NaiveDateTime,
    pub sensor_id: String,
    pub value: f64,
    pub unit: String,
}

impl Reading {
    /// Create a reading.
    pub fn new(
        sensor_id: impl Into<String>,
        timestamp: NaiveDateTime,
        value: f64,
        unit: impl Into<String>,
    ) -> Self {
        Reading {
            timestamp,
            sensor_id: sensor_id.into(),
            value,
            unit: unit.into(),
        }
    }

    /// Whether this reading falls in `[start, end]` and matches the optional sensor filter.
    pub fn matches(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        sensor_id: Option<&str>,
    ) -> bool {
        start <= self.timestamp
            && self.timestamp <= end
            && sensor_id.is_none_or(|id| id == self.sensor_id)
    }
}

/// Format a timestamp as ISO-8601 with fractional seconds only when non-zero.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

/// Parse a stored timestamp.
///
/// Accepts `YYYY-MM-DDTHH:MM:SS[.f]`, the same with a space separator, and
/// RFC 3339 strings carrying an offset (converted to local time).
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts);
        }
    }

    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Local).naive_local())
}
