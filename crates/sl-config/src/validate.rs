//! Configuration validation errors and semantic validation.

use thiserror::Error;

use crate::config::LoggerConfig;
use crate::pattern::pattern_affixes;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ValidationError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Name of the offending option.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::InvalidValue { field, .. } => field,
        }
    }
}

/// Validate a logger configuration semantically.
pub fn validate_config(config: &LoggerConfig) -> ValidationResult<()> {
    if config.log_dir.as_os_str().is_empty() {
        return Err(ValidationError::invalid("log_dir", "must not be empty"));
    }

    if config.buffer_size == 0 {
        return Err(ValidationError::invalid("buffer_size", "must be at least 1"));
    }

    let affixes = pattern_affixes(&config.filename_pattern)
        .map_err(|e| ValidationError::invalid("filename_pattern", e.to_string()))?;
    if affixes.extension().is_none() {
        return Err(ValidationError::invalid(
            "filename_pattern",
            "must end with a literal file extension such as .csv",
        ));
    }
    if affixes.suffix.ends_with(".zip") {
        return Err(ValidationError::invalid(
            "filename_pattern",
            ".zip is reserved for compressed archive entries",
        ));
    }

    validate_positive("rotate_every_hours", config.rotate_every_hours)?;
    validate_positive("max_size_mb", config.max_size_mb)?;

    if config.rotate_after_lines == Some(0) {
        return Err(ValidationError::invalid(
            "rotate_after_lines",
            "must be at least 1 (omit to disable)",
        ));
    }

    if let Some(days) = config.retention_days {
        if !days.is_finite() || days < 0.0 {
            return Err(ValidationError::invalid(
                "retention_days",
                format!("must be a non-negative number, got {}", days),
            ));
        }
    }

    Ok(())
}

fn validate_positive(field: &str, value: Option<f64>) -> ValidationResult<()> {
    match value {
        Some(v) if !v.is_finite() || v <= 0.0 => Err(ValidationError::invalid(
            field,
            format!("must be a positive number (omit to disable), got {}", v),
        )),
        _ => Ok(()),
    }
}
