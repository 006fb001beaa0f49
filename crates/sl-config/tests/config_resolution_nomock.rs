//! No-mock configuration resolution + validation tests.
//!
//! Covers:
//! - Resolution order (CLI > SENSORLOG_CONFIG > SENSORLOG_CONFIG_DIR)
//! - Defaults when nothing is configured
//! - Real JSON files with every recognised option

use sl_config::resolve::{ENV_CONFIG_DIR, ENV_CONFIG_PATH};
use sl_config::{load_config, ConfigError, ConfigOptions, ConfigSource, LoggerConfig};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tempfile::TempDir;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

struct EnvGuard {
    keys: Vec<String>,
    saved: Vec<Option<String>>,
}

impl EnvGuard {
    fn new(keys: &[&str]) -> Self {
        let saved = keys.iter().map(|k| env::var(k).ok()).collect();
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            saved,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, saved) in self.keys.iter().zip(self.saved.iter()) {
            match saved {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }
}

fn with_env_lock<T>(f: impl FnOnce() -> T) -> T {
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .expect("env lock poisoned");
    f()
}

fn write_config(path: &Path, json: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create config parent");
    }
    fs::write(path, json).expect("write config");
}

const FULL_CONFIG: &str = r#"{
    "log_dir": "/var/lib/sensorlog",
    "filename_pattern": "testlog_%Y%m%d.csv",
    "buffer_size": 2,
    "rotate_every_hours": 0.001,
    "max_size_mb": 1,
    "rotate_after_lines": 5,
    "retention_days": 1,
    "compress_archive": true
}"#;

#[test]
fn test_full_config_file_loads_every_option() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    write_config(&path, FULL_CONFIG);

    let resolved = load_config(&ConfigOptions {
        config_path: Some(path),
        log_dir: None,
    })
    .expect("load full config");

    let config = resolved.config;
    assert_eq!(config.log_dir, PathBuf::from("/var/lib/sensorlog"));
    assert_eq!(config.filename_pattern, "testlog_%Y%m%d.csv");
    assert_eq!(config.buffer_size, 2);
    assert_eq!(config.rotate_every_hours, Some(0.001));
    assert_eq!(config.max_size_mb, Some(1.0));
    assert_eq!(config.rotate_after_lines, Some(5));
    assert_eq!(config.retention_days, Some(1.0));
    assert!(config.compress_archive);
}

#[test]
fn test_env_path_used_when_no_cli() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(&[ENV_CONFIG_PATH, ENV_CONFIG_DIR]);
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("from-env.json");
        write_config(&path, r#"{"buffer_size": 42}"#);

        env::set_var(ENV_CONFIG_PATH, &path);
        env::remove_var(ENV_CONFIG_DIR);

        let resolved = load_config(&ConfigOptions::default()).unwrap();
        assert_eq!(resolved.source, ConfigSource::Environment);
        assert_eq!(resolved.config.buffer_size, 42);
    });
}

#[test]
fn test_env_config_dir_used_when_path_unset() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(&[ENV_CONFIG_PATH, ENV_CONFIG_DIR]);
        let dir = TempDir::new().unwrap();
        write_config(&dir.path().join("config.json"), r#"{"buffer_size": 7}"#);

        env::remove_var(ENV_CONFIG_PATH);
        env::set_var(ENV_CONFIG_DIR, dir.path());

        let resolved = load_config(&ConfigOptions::default()).unwrap();
        assert_eq!(resolved.source, ConfigSource::Environment);
        assert_eq!(resolved.config.buffer_size, 7);
    });
}

#[test]
fn test_cli_beats_env() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(&[ENV_CONFIG_PATH, ENV_CONFIG_DIR]);
        let dir = TempDir::new().unwrap();
        let env_path = dir.path().join("env.json");
        let cli_path = dir.path().join("cli.json");
        write_config(&env_path, r#"{"buffer_size": 1}"#);
        write_config(&cli_path, r#"{"buffer_size": 99}"#);

        env::set_var(ENV_CONFIG_PATH, &env_path);

        let resolved = load_config(&ConfigOptions {
            config_path: Some(cli_path),
            log_dir: None,
        })
        .unwrap();
        assert_eq!(resolved.source, ConfigSource::CliArgument);
        assert_eq!(resolved.config.buffer_size, 99);
    });
}

#[test]
fn test_env_path_pointing_nowhere_is_skipped() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(&[ENV_CONFIG_PATH, ENV_CONFIG_DIR]);
        env::set_var(ENV_CONFIG_PATH, "/nonexistent/sensorlog/config.json");
        env::remove_var(ENV_CONFIG_DIR);

        let resolved = load_config(&ConfigOptions::default()).unwrap();
        assert_ne!(resolved.source, ConfigSource::Environment);
    });
}

#[test]
fn test_invalid_threshold_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    write_config(&path, r#"{"max_size_mb": -3}"#);

    let err = load_config(&ConfigOptions {
        config_path: Some(path),
        log_dir: None,
    })
    .unwrap_err();

    match err {
        ConfigError::Validation(e) => assert_eq!(e.field(), "max_size_mb"),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn test_default_config_roundtrips_through_json() {
    let json = serde_json::to_string(&LoggerConfig::default()).unwrap();
    let parsed = LoggerConfig::from_json(&json).unwrap();
    assert_eq!(parsed, LoggerConfig::default());
}
