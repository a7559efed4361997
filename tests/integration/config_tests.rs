//! Integration tests for configuration layering: defaults, TOML file and
//! environment variable overrides.

use super::support::{clear_env, ENV_MUTEX};
use figment::providers::{Format, Serialized, Toml};
use figment::Figment;
use hashsync::config::Config;
use hashsync::hashing::HashType;
use hashsync::sync::BackoffPolicy;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_config_load_from_toml() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    let toml_content = r#"
recheck_interval_days = 7
hash_type = "md5"
progress = false

[validation]
check_date = false

[backoff]
min_wait_seconds = 1
max_wait_seconds = 2
"#;
    fs::write(&config_path, toml_content).unwrap();

    let config = Config::load(Some(&config_path)).unwrap();

    assert_eq!(config.recheck_interval_days, 7);
    assert_eq!(config.hash_type, HashType::Md5);
    assert!(!config.progress);
    assert!(!config.validation.check_date);
    assert!(config.validation.compute_hash);
    assert_eq!(config.backoff.min_wait_seconds, 1);
    assert_eq!(config.backoff.max_wait_seconds, 2);
    assert_eq!(config.backoff.stale_sidecar_minutes, 10);
}

#[test]
fn test_env_overrides_file() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "recheck_interval_days = 7\n").unwrap();

    std::env::set_var("HASHSYNC_RECHECK_INTERVAL_DAYS", "3");
    std::env::set_var("HASHSYNC_BACKOFF__STALE_SIDECAR_MINUTES", "30");
    let config = Config::load(Some(&config_path));
    clear_env();

    let config = config.unwrap();
    assert_eq!(config.recheck_interval_days, 3);
    assert_eq!(config.backoff.stale_sidecar_minutes, 30);
}

#[test]
fn test_missing_explicit_file_is_error() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let temp_dir = tempdir().unwrap();

    assert!(Config::load(Some(&temp_dir.path().join("nope.toml"))).is_err());
}

#[test]
fn test_invalid_values_are_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    fs::write(&config_path, "hash_type = \"blake3\"\n").unwrap();
    assert!(Config::load(Some(&config_path)).is_err());

    fs::write(
        &config_path,
        "[backoff]\nmin_wait_seconds = 30\nmax_wait_seconds = 15\n",
    )
    .unwrap();
    assert!(Config::load(Some(&config_path)).is_err());

    fs::write(
        &config_path,
        "[backoff]\nmegabytes_per_extra_second = 1e-310\n",
    )
    .unwrap();
    assert!(Config::load(Some(&config_path)).is_err());
}

#[test]
fn test_config_invalid_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "recheck_interval_days = = 3").unwrap();

    let figment =
        Figment::from(Serialized::defaults(Config::default())).merge(Toml::file(&config_path));
    let result: Result<Config, _> = figment.extract();
    assert!(result.is_err());
}

#[test]
fn test_config_save_toml_round_trips_backoff() {
    let mut config = Config::default();
    config.backoff = BackoffPolicy {
        megabytes_per_extra_second: 25.0,
        ..BackoffPolicy::default()
    };

    let content = toml::to_string_pretty(&config).unwrap();
    assert!(content.contains("megabytes_per_extra_second = 25.0"));

    let parsed: Config = toml::from_str(&content).unwrap();
    assert_eq!(parsed, config);
}
