//! Fuzz target for reading stored CSV records.
//!
//! Tests that record framing, field splitting and row decoding handle
//! arbitrary bytes without panicking.

#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use sl_storage::row::{split_record, ColumnMap, RecordReader};

fuzz_target!(|data: &[u8]| {
    let mut records = RecordReader::new(Cursor::new(data));
    let columns = match records.next() {
        Some(Ok(header)) => ColumnMap::from_header(&split_record(&header)),
        _ => return,
    };
    for record in records {
        match record {
            Ok(line) => {
                let _ = columns.decode(&split_record(&line));
            }
            Err(_) => break,
        }
    }
});
