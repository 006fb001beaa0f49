//! sensorlog command-line front end.
//!
//! The binary lives in `main.rs`; this library holds the pieces it is built
//! from so they can be tested on their own:
//! - [`exit_codes`]: the stable process exit contract
//! - [`ingest`]: parsing input lines into readings
//! - [`logging`]: tracing subscriber setup
//! - [`output`]: rendering query results

pub mod exit_codes;
pub mod ingest;
pub mod logging;
pub mod output;

pub use exit_codes::ExitCode;
