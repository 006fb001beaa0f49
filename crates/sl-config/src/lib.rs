//! sensorlog configuration loading and validation.
//!
//! This crate provides:
//! - The typed [`LoggerConfig`] with documented defaults
//! - Config resolution (CLI → env → XDG → system → defaults)
//! - Semantic validation
//! - Filename pattern inspection shared with the storage layout

pub mod config;
pub mod pattern;
pub mod resolve;
pub mod validate;

pub use config::{LoggerConfig, ARCHIVE_DIR_NAME};
pub use pattern::{pattern_affixes, PatternAffixes, PatternError};
pub use resolve::{resolve_config_path, ConfigSource};
pub use validate::{validate_config, ValidationError, ValidationResult};

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Semantic validation failed: {0}")]
    Validation(#[from] ValidationError),
}

impl From<ConfigError> for sl_common::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation(ValidationError::InvalidValue { field, message }) => {
                sl_common::Error::InvalidConfig { field, message }
            }
            other => sl_common::Error::Config(other.to_string()),
        }
    }
}

/// Configuration resolution options.
#[derive(Debug, Default, Clone)]
pub struct ConfigOptions {
    /// Explicit config file path (highest priority).
    pub config_path: Option<PathBuf>,

    /// Override for `log_dir` applied after loading.
    pub log_dir: Option<PathBuf>,
}

/// Resolved configuration with provenance information.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The validated configuration.
    pub config: LoggerConfig,

    /// File the configuration was read from (None for defaults).
    pub path: Option<PathBuf>,

    /// How the file was found.
    pub source: ConfigSource,
}

/// Load and validate a configuration file.
pub fn load_config_file(path: &Path) -> Result<LoggerConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config = LoggerConfig::from_json(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    validate_config(&config)?;
    Ok(config)
}

/// Load configuration with the standard resolution order.
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig, ConfigError> {
    let (path, source) = resolve_config_path(options.config_path.as_deref());

    let mut config = match &path {
        Some(p) => load_config_file(p)?,
        None => LoggerConfig::default(),
    };

    if let Some(dir) = &options.log_dir {
        config.log_dir = dir.clone();
        validate_config(&config)?;
    }

    debug!(
        source = %source,
        path = ?path,
        log_dir = %config.log_dir.display(),
        "Configuration resolved"
    );

    Ok(ResolvedConfig {
        config,
        path,
        source,
    })
}
