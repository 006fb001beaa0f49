//! Rendering query results to stdout.

use std::io::{self, Write};

use clap::ValueEnum;
use sl_common::Reading;
use sl_storage::row::{encode_reading, header_line};

/// Output format for `sensorlog query`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum QueryFormat {
    /// One JSON object per line
    #[default]
    Jsonl,
    /// CSV with the storage header
    Csv,
    /// A single JSON array
    Json,
}

/// Stream `readings` to `out` in `format`, returning how many were written.
pub fn write_readings<I, W>(format: QueryFormat, readings: I, out: &mut W) -> io::Result<usize>
where
    I: IntoIterator<Item = Reading>,
    W: Write,
{
    let mut count = 0;
    match format {
        QueryFormat::Jsonl => {
            for reading in readings {
                serde_json::to_writer(&mut *out, &reading)?;
                out.write_all(b"\n")?;
                count += 1;
            }
        }
        QueryFormat::Csv => {
            out.write_all(header_line().as_bytes())?;
            let mut line = String::new();
            for reading in readings {
                line.clear();
                encode_reading(&reading, &mut line);
                out.write_all(line.as_bytes())?;
                count += 1;
            }
        }
        QueryFormat::Json => {
            out.write_all(b"[")?;
            for reading in readings {
                if count > 0 {
                    out.write_all(b",")?;
                }
                serde_json::to_writer(&mut *out, &reading)?;
                count += 1;
            }
            out.write_all(b"]\n")?;
        }
    }
    out.flush()?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> Vec<Reading> {
        let ts = NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        vec![
            Reading::new("temp", ts, 20.5, "C"),
            Reading::new("hum", ts, 41.0, "%"),
        ]
    }

    fn render(format: QueryFormat, readings: Vec<Reading>) -> (usize, String) {
        let mut out = Vec::new();
        let n = write_readings(format, readings, &mut out).unwrap();
        (n, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_jsonl() {
        let (n, text) = render(QueryFormat::Jsonl, sample());
        assert_eq!(n, 2);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Reading = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first, sample()[0]);
    }

    #[test]
    fn test_csv_has_header() {
        let (n, text) = render(QueryFormat::Csv, sample());
        assert_eq!(n, 2);
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("timestamp,sensor_id,value,unit"));
        assert_eq!(lines.count(), 2);
    }

    #[test]
    fn test_json_array() {
        let (_, text) = render(QueryFormat::Json, sample());
        let parsed: Vec<Reading> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, sample());

        let (n, empty) = render(QueryFormat::Json, Vec::new());
        assert_eq!(n, 0);
        assert_eq!(empty.trim(), "[]");
    }
}
