//! End-to-end runs of the command dispatcher.

use super::support::{clear_env, payload, write_file, ENV_MUTEX};
use clap::Parser;
use hashsync::cli::Cli;
use hashsync::error::ExitCode;
use hashsync::hashing::hashcheck_path;
use hashsync::run_app;
use hashsync::sync::last_used_path;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn run(config: &Path, args: &[&str]) -> anyhow::Result<ExitCode> {
    let mut argv = vec!["hashsync", "-q", "--config", config.to_str().unwrap()];
    argv.extend_from_slice(args);
    run_app(Cli::try_parse_from(argv).unwrap())
}

#[test]
fn test_copy_validate_hash_touch() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let config = write_file(dir.path(), "config.toml", b"progress = false\n");
    let source = write_file(&dir.path().join("share"), "A.bin", &payload(4096, 9));
    let cache = dir.path().join("cache");
    let local = cache.join("A.bin");

    let code = run(
        &config,
        &["copy", source.to_str().unwrap(), cache.to_str().unwrap()],
    )
    .unwrap();
    assert_eq!(code, ExitCode::Success);
    assert_eq!(fs::read(&local).unwrap(), fs::read(&source).unwrap());

    let code = run(
        &config,
        &["validate", local.to_str().unwrap(), "--require-hashcheck"],
    )
    .unwrap();
    assert_eq!(code, ExitCode::Success);

    fs::remove_file(last_used_path(&local)).unwrap();
    let code = run(&config, &["touch", local.to_str().unwrap()]).unwrap();
    assert_eq!(code, ExitCode::Success);
    assert!(last_used_path(&local).exists());

    let code = run(
        &config,
        &["hash", local.to_str().unwrap(), "--hash-type", "crc32"],
    )
    .unwrap();
    assert_eq!(code, ExitCode::Success);
    assert!(fs::read_to_string(hashcheck_path(&local))
        .unwrap()
        .contains("hashtype=crc32"));
}

#[test]
fn test_validation_failure_exit_code() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let config = write_file(dir.path(), "config.toml", b"");
    let data = write_file(dir.path(), "A.bin", b"hello world");

    let err = run(
        &config,
        &[
            "validate",
            data.to_str().unwrap(),
            "--expected-hash",
            "0000000000000000000000000000000000000000",
        ],
    )
    .unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::ValidationFailed);
}

#[test]
fn test_not_found_exit_code() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let config = write_file(dir.path(), "config.toml", b"");
    let missing = dir.path().join("missing.bin");

    for args in [
        vec!["touch", missing.to_str().unwrap()],
        vec!["hash", missing.to_str().unwrap()],
        vec!["validate", missing.to_str().unwrap()],
    ] {
        let err = run(&config, &args).unwrap_err();
        assert_eq!(ExitCode::for_error(&err), ExitCode::NotFound, "{:?}", args);
    }
}

#[test]
fn test_bad_config_is_general_error() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let config = write_file(dir.path(), "config.toml", b"hash_type = \"undefined\"\n");
    let data = write_file(dir.path(), "A.bin", b"x");

    let err = run(&config, &["touch", data.to_str().unwrap()]).unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::GeneralError);
}
