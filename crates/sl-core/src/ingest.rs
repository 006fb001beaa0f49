//! Line-oriented ingestion for `sensorlog record`.
//!
//! Each input line is `sensor_id,value,unit[,timestamp]`, using the same CSV
//! quoting as stored files. A missing timestamp means "now" in local time.
//! Blank lines and lines starting with `#` are ignored.

use chrono::NaiveDateTime;
use serde::Serialize;
use sl_common::{parse_timestamp, Reading};
use sl_storage::row::split_record;
use thiserror::Error;

/// Why an input line was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IngestError {
    #[error("expected sensor_id,value,unit[,timestamp], got {0} fields")]
    FieldCount(usize),

    #[error("empty sensor_id")]
    EmptySensor,

    #[error("unparsable value {0:?}")]
    BadValue(String),

    #[error("unparsable timestamp {0:?}")]
    BadTimestamp(String),
}

/// Parse one input line. `Ok(None)` for lines that carry no reading.
pub fn parse_line(line: &str, now: NaiveDateTime) -> Result<Option<Reading>, IngestError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let fields = split_record(trimmed);
    if !(3..=4).contains(&fields.len()) {
        return Err(IngestError::FieldCount(fields.len()));
    }

    let sensor_id = fields[0].trim();
    if sensor_id.is_empty() {
        return Err(IngestError::EmptySensor);
    }

    let value = fields[1]
        .trim()
        .parse::<f64>()
        .map_err(|_| IngestError::BadValue(fields[1].clone()))?;

    let timestamp = match fields.get(3).map(|s| s.trim()) {
        Some(raw) if !raw.is_empty() => {
            parse_timestamp(raw).ok_or_else(|| IngestError::BadTimestamp(raw.to_string()))?
        }
        _ => now,
    };

    Ok(Some(Reading::new(sensor_id, timestamp, value, fields[2].trim())))
}

/// Summary printed by `sensorlog record`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestSummary {
    pub accepted: u64,
    pub rejected: u64,
    pub rotations: u64,
    pub archived: u64,
    pub stranded: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 4, 2)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_line_without_timestamp_uses_now() {
        let reading = parse_line("temp_1, 21.5 ,C", now()).unwrap().unwrap();
        assert_eq!(reading, Reading::new("temp_1", now(), 21.5, "C"));
    }

    #[test]
    fn test_line_with_timestamp() {
        let reading = parse_line("hum,40,%,2025-01-01 00:00:01", now())
            .unwrap()
            .unwrap();
        assert_eq!(reading.timestamp.to_string(), "2025-01-01 00:00:01");
    }

    #[test]
    fn test_quoted_fields() {
        let reading = parse_line("\"rack 3, slot 1\",1.5,\"kW\"", now())
            .unwrap()
            .unwrap();
        assert_eq!(reading.sensor_id, "rack 3, slot 1");
    }

    #[test]
    fn test_skippable_lines() {
        assert_eq!(parse_line("", now()), Ok(None));
        assert_eq!(parse_line("   ", now()), Ok(None));
        assert_eq!(parse_line("# comment", now()), Ok(None));
    }

    #[test]
    fn test_rejections() {
        assert_eq!(parse_line("a,1", now()), Err(IngestError::FieldCount(2)));
        assert_eq!(
            parse_line("a,1,C,2025-01-01,extra", now()),
            Err(IngestError::FieldCount(5))
        );
        assert_eq!(parse_line(" ,1,C", now()), Err(IngestError::EmptySensor));
        assert_eq!(
            parse_line("a,hot,C", now()),
            Err(IngestError::BadValue("hot".to_string()))
        );
        assert_eq!(
            parse_line("a,1,C,soon", now()),
            Err(IngestError::BadTimestamp("soon".to_string()))
        );
    }
}
