//! Fuzz target for config.json parsing and validation.
//!
//! Tests that config parsing and semantic validation handle arbitrary input
//! without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sl_config::{validate_config, LoggerConfig};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = LoggerConfig::from_json(text) {
        let _ = validate_config(&config);
    }
});
