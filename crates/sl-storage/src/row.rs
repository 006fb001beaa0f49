//! CSV row encoding and quote-aware record reading.
//!
//! Rows follow RFC 4180 quoting: a field containing a comma, quote, CR or LF
//! is wrapped in double quotes and embedded quotes are doubled. A quoted
//! field may span physical lines, so record boundaries are tracked by quote
//! parity rather than by newline.

use std::io::{self, BufRead};

use sl_common::{format_timestamp, parse_timestamp, Reading, CSV_HEADER};
use thiserror::Error;

/// Header line written at the top of every active file.
pub fn header_line() -> String {
    let mut line = CSV_HEADER.join(",");
    line.push('\n');
    line
}

/// Append one encoded reading, newline included.
pub fn encode_reading(reading: &Reading, out: &mut String) {
    push_field(out, &format_timestamp(&reading.timestamp));
    out.push(',');
    push_field(out, &reading.sensor_id);
    out.push(',');
    push_field(out, &reading.value.to_string());
    out.push(',');
    push_field(out, &reading.unit);
    out.push('\n');
}

fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\n', '\r']) {
        out.push('"');
        for c in field.chars() {
            if c == '"' {
                out.push('"');
            }
            out.push(c);
        }
        out.push('"');
    } else {
        out.push_str(field);
    }
}

/// Split one logical record into fields.
///
/// Lenient about malformed quoting: a quote in the middle of an unquoted
/// field is kept literally, and an unterminated quoted field runs to the end
/// of the record.
pub fn split_record(record: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut at_field_start = true;
    let mut chars = record.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
            continue;
        }

        match c {
            ',' => {
                fields.push(std::mem::take(&mut current));
                at_field_start = true;
                continue;
            }
            '"' if at_field_start => in_quotes = true,
            _ => current.push(c),
        }
        at_field_start = false;
    }

    fields.push(current);
    fields
}

/// Iterator over logical CSV records from a buffered reader.
///
/// Yields record text with the trailing line terminator removed. Blank lines
/// are skipped.
pub struct RecordReader<R> {
    inner: R,
    line: String,
    first: bool,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        RecordReader {
            inner,
            line: String::new(),
            first: true,
        }
    }

    fn read_record(&mut self) -> io::Result<Option<String>> {
        let mut record = String::new();
        let mut quotes = 0usize;

        loop {
            self.line.clear();
            let n = self.inner.read_line(&mut self.line)?;
            if n == 0 {
                // EOF; an unterminated quoted record is returned as-is.
                return Ok(if record.is_empty() { None } else { Some(record) });
            }

            let mut chunk = self.line.as_str();
            if self.first {
                chunk = chunk.strip_prefix('\u{feff}').unwrap_or(chunk);
                self.first = false;
            }
            quotes += chunk.matches('"').count();
            record.push_str(chunk);

            if quotes % 2 == 0 {
                trim_line_end(&mut record);
                if record.is_empty() {
                    continue;
                }
                return Ok(Some(record));
            }
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

fn trim_line_end(record: &mut String) {
    if record.ends_with('\n') {
        record.pop();
        if record.ends_with('\r') {
            record.pop();
        }
    }
}

/// Count logical records, header included.
pub fn count_records<R: BufRead>(reader: R) -> io::Result<u64> {
    let mut count = 0;
    for record in RecordReader::new(reader) {
        record?;
        count += 1;
    }
    Ok(count)
}

/// Length in bytes of the leading run of complete records.
///
/// A record is complete once it ends in a newline outside any quoted field.
/// Anything after the returned offset is a partial record.
pub fn complete_prefix_len<R: BufRead>(mut reader: R) -> io::Result<u64> {
    let mut chunk = Vec::new();
    let mut offset = 0u64;
    let mut boundary = 0u64;
    let mut quotes = 0usize;

    loop {
        chunk.clear();
        let n = reader.read_until(b'\n', &mut chunk)?;
        if n == 0 {
            return Ok(boundary);
        }
        offset += n as u64;
        quotes += chunk.iter().filter(|&&b| b == b'"').count();
        if chunk.last() == Some(&b'\n') && quotes % 2 == 0 {
            boundary = offset;
            quotes = 0;
        }
    }
}

/// Reasons a stored row cannot be turned into a [`Reading`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("missing timestamp")]
    MissingTimestamp,

    #[error("unparsable timestamp {0:?}")]
    BadTimestamp(String),

    #[error("missing value")]
    MissingValue,

    #[error("unparsable value {0:?}")]
    BadValue(String),
}

/// Column positions resolved from a file's header record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    timestamp: Option<usize>,
    sensor_id: Option<usize>,
    value: Option<usize>,
    unit: Option<usize>,
}

impl ColumnMap {
    /// Resolve positions by name; unknown columns are ignored.
    pub fn from_header(fields: &[String]) -> Self {
        let position = |name: &str| fields.iter().position(|f| f.trim() == name);
        ColumnMap {
            timestamp: position(CSV_HEADER[0]),
            sensor_id: position(CSV_HEADER[1]),
            value: position(CSV_HEADER[2]),
            unit: position(CSV_HEADER[3]),
        }
    }

    /// Decode one row. Missing text columns decode as empty strings.
    pub fn decode(&self, fields: &[String]) -> Result<Reading, RowError> {
        let get = |idx: Option<usize>| idx.and_then(|i| fields.get(i)).map(String::as_str);

        let raw_ts = get(self.timestamp)
            .filter(|s| !s.trim().is_empty())
            .ok_or(RowError::MissingTimestamp)?;
        let timestamp =
            parse_timestamp(raw_ts).ok_or_else(|| RowError::BadTimestamp(raw_ts.to_string()))?;

        let raw_value = get(self.value)
            .filter(|s| !s.trim().is_empty())
            .ok_or(RowError::MissingValue)?;
        let value = raw_value
            .trim()
            .parse::<f64>()
            .map_err(|_| RowError::BadValue(raw_value.to_string()))?;

        Ok(Reading {
            timestamp,
            sensor_id: get(self.sensor_id).unwrap_or_default().to_string(),
            value,
            unit: get(self.unit).unwrap_or_default().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Cursor;

    fn ts() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 5)
            .unwrap()
    }

    fn records(input: &str) -> Vec<String> {
        RecordReader::new(Cursor::new(input))
            .collect::<io::Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_header_line() {
        assert_eq!(header_line(), "timestamp,sensor_id,value,unit\n");
    }

    #[test]
    fn test_encode_plain_reading() {
        let mut out = String::new();
        encode_reading(&Reading::new("temp_1", ts(), 23.5, "C"), &mut out);
        assert_eq!(out, "2025-03-01T12:00:05,temp_1,23.5,C\n");
    }

    #[test]
    fn test_encode_quotes_special_fields() {
        let mut out = String::new();
        encode_reading(&Reading::new("a,b", ts(), 1.0, "say \"hi\""), &mut out);
        assert_eq!(out, "2025-03-01T12:00:05,\"a,b\",1,\"say \"\"hi\"\"\"\n");
    }

    #[test]
    fn test_split_handles_quotes() {
        assert_eq!(
            split_record(r#"x,"a,b","say ""hi""",z"#),
            vec!["x", "a,b", "say \"hi\"", "z"]
        );
        assert_eq!(split_record(""), vec![""]);
        assert_eq!(split_record("a,,c"), vec!["a", "", "c"]);
        // Stray quote inside an unquoted field is literal.
        assert_eq!(split_record(r#"ab"c,d"#), vec!["ab\"c", "d"]);
    }

    #[test]
    fn test_record_reader_joins_multiline_fields() {
        let got = records("h1,h2\n\"line one\nline two\",x\r\n\nlast,row");
        assert_eq!(got, vec!["h1,h2", "\"line one\nline two\",x", "last,row"]);
    }

    #[test]
    fn test_record_reader_strips_bom() {
        let got = records("\u{feff}timestamp,value\n");
        assert_eq!(got, vec!["timestamp,value"]);
    }

    #[test]
    fn test_count_records_matches_written_rows() {
        let mut content = header_line();
        encode_reading(&Reading::new("a\nb", ts(), 1.0, "C"), &mut content);
        encode_reading(&Reading::new("c", ts(), 2.0, "C"), &mut content);
        assert_eq!(count_records(Cursor::new(content)).unwrap(), 3);
    }

    #[test]
    fn test_complete_prefix_len() {
        let len = |s: &str| complete_prefix_len(Cursor::new(s.as_bytes())).unwrap();
        assert_eq!(len(""), 0);
        assert_eq!(len("h\nrow"), 2);
        assert_eq!(len("h\n\"a\nb\",1\n"), 10);
        // Newline inside an open quote is not a boundary.
        assert_eq!(len("h\nx,\"c,d\n9"), 2);
        assert_eq!(len("h\r\nrow\r\n"), 8);
    }

    #[test]
    fn test_decode_roundtrip() {
        let reading = Reading::new("hum,2", ts(), -4.25, "%");
        let mut content = header_line();
        encode_reading(&reading, &mut content);

        let got = records(&content);
        let columns = ColumnMap::from_header(&split_record(&got[0]));
        assert_eq!(columns.decode(&split_record(&got[1])).unwrap(), reading);
    }

    #[test]
    fn test_decode_reordered_and_missing_columns() {
        let header = split_record("value,timestamp");
        let columns = ColumnMap::from_header(&header);
        let reading = columns
            .decode(&split_record("7.5,2025-03-01 12:00:05"))
            .unwrap();
        assert_eq!(reading.value, 7.5);
        assert_eq!(reading.timestamp, ts());
        assert_eq!(reading.sensor_id, "");
        assert_eq!(reading.unit, "");
    }

    #[test]
    fn test_decode_errors() {
        let columns = ColumnMap::from_header(&split_record("timestamp,sensor_id,value,unit"));
        assert_eq!(
            columns.decode(&split_record(",s,1,C")),
            Err(RowError::MissingTimestamp)
        );
        assert_eq!(
            columns.decode(&split_record("yesterday,s,1,C")),
            Err(RowError::BadTimestamp("yesterday".to_string()))
        );
        assert_eq!(
            columns.decode(&split_record("2025-03-01T12:00:05,s,,C")),
            Err(RowError::MissingValue)
        );
        assert_eq!(
            columns.decode(&split_record("2025-03-01T12:00:05,s")),
            Err(RowError::MissingValue)
        );
        assert_eq!(
            columns.decode(&split_record("2025-03-01T12:00:05,s,warm,C")),
            Err(RowError::BadValue("warm".to_string()))
        );
    }
}
