//! Exit codes for the sensorlog CLI.
//!
//! Exit code ranges:
//! - 0: Success
//! - 10-19: User/environment errors (recoverable by user action)
//! - 20-29: Internal and I/O errors

use sl_common::Error;

/// Exit codes for sensorlog operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Clean = 0,

    /// Invalid arguments (including unparsable query bounds)
    ArgsError = 10,

    /// Configuration file missing, malformed or semantically invalid
    ConfigError = 11,

    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error on the active file or archive
    IoError = 21,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Clean
    }

    /// User/environment error (codes 10-19).
    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }

    /// Map a library error to the exit code reported for it.
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::Config(_) | Error::InvalidConfig { .. } => ExitCode::ConfigError,
            Error::InvalidQuery(_) => ExitCode::ArgsError,
            Error::StorageOpen { .. }
            | Error::StorageWrite { .. }
            | Error::Archive(_)
            | Error::Retention(_)
            | Error::Io(_) => ExitCode::IoError,
            Error::Json(_) => ExitCode::InternalError,
        }
    }

    /// Get the error code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
