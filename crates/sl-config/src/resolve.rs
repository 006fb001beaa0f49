//! Configuration resolution and path discovery.
//!
//! Resolution order: CLI argument → environment variables → XDG path → system path → defaults.

use std::path::{Path, PathBuf};

/// Where the configuration file was found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// Found in XDG config directory.
    XdgConfig,

    /// Found in /etc/sensorlog/.
    SystemConfig,

    /// Using built-in defaults.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::SystemConfig => write!(f, "system config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Environment variable naming a config file directly.
pub const ENV_CONFIG_PATH: &str = "SENSORLOG_CONFIG";

/// Environment variable naming a directory containing `config.json`.
pub const ENV_CONFIG_DIR: &str = "SENSORLOG_CONFIG_DIR";

/// Standard config file name.
pub const CONFIG_FILENAME: &str = "config.json";

/// Application name for XDG directories.
const APP_NAME: &str = "sensorlog";

/// Resolve the configuration file path.
///
/// An explicit CLI path is returned even if it does not exist, so that a
/// typo surfaces as a load error instead of silently falling back to
/// defaults. Every other source is only used when the file exists.
///
/// 1. Explicit CLI path
/// 2. `SENSORLOG_CONFIG`
/// 3. `SENSORLOG_CONFIG_DIR` + `config.json`
/// 4. XDG config directory (`~/.config/sensorlog/config.json`)
/// 5. System config (`/etc/sensorlog/config.json`)
/// 6. Built-in defaults (None)
pub fn resolve_config_path(cli_path: Option<&Path>) -> (Option<PathBuf>, ConfigSource) {
    if let Some(path) = cli_path {
        return (Some(path.to_path_buf()), ConfigSource::CliArgument);
    }

    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return (Some(path), ConfigSource::Environment);
        }
    }

    if let Ok(config_dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = PathBuf::from(config_dir).join(CONFIG_FILENAME);
        if path.exists() {
            return (Some(path), ConfigSource::Environment);
        }
    }

    if let Some(dir) = xdg_config_dir() {
        let path = dir.join(CONFIG_FILENAME);
        if path.exists() {
            return (Some(path), ConfigSource::XdgConfig);
        }
    }

    let system_path = system_config_dir().join(CONFIG_FILENAME);
    if system_path.exists() {
        return (Some(system_path), ConfigSource::SystemConfig);
    }

    (None, ConfigSource::BuiltinDefault)
}

/// Get the XDG config directory for sensorlog.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Get the system config directory.
pub fn system_config_dir() -> PathBuf {
    PathBuf::from("/etc").join(APP_NAME)
}
