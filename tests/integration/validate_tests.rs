use super::support::{set_age, write_file, CreateBehavior, ScriptedHashProvider};
use chrono::{DateTime, Utc};
use hashsync::hashing::{
    hashcheck_path, write_hashcheck, FileHashProvider, HashRecord, HashType,
};
use hashsync::notify::MemoryNotifier;
use hashsync::sync::{last_used_path, ErrorKind, SyncError, ValidationOptions, Validator};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

const HELLO_SHA1: &str = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";

fn validator() -> (Validator, Arc<MemoryNotifier>) {
    let notifier = Arc::new(MemoryNotifier::new());
    let validator = Validator::new(Arc::new(FileHashProvider::new()), notifier.clone());
    (validator, notifier)
}

fn record_for(path: &Path, hash_value: &str, hash_type: HashType, file_size: u64) -> HashRecord {
    let modified = fs::metadata(path).unwrap().modified().unwrap();
    HashRecord {
        hash_value: hash_value.to_string(),
        hash_type,
        file_size,
        file_date_utc: Some(DateTime::<Utc>::from(modified)),
    }
}

#[test]
fn test_first_use_creates_sidecar() {
    let dir = tempdir().unwrap();
    let data = write_file(dir.path(), "A.bin", b"hello world");
    let (validator, notifier) = validator();

    validator
        .validate(&data, &HashRecord::default(), &ValidationOptions::default())
        .unwrap();

    let sidecar = fs::read_to_string(hashcheck_path(&data)).unwrap();
    assert!(sidecar.starts_with("# Hashcheck file created "));
    assert!(sidecar.contains(&format!("hash={}", HELLO_SHA1)));
    assert!(sidecar.contains("size=11"));
    assert!(sidecar.contains("hashtype=sha1"));
    assert!(last_used_path(&data).exists());
    assert!(notifier.warnings().is_empty());
}

#[test]
fn test_first_use_with_wrong_expectation_still_writes_sidecar() {
    let dir = tempdir().unwrap();
    let data = write_file(dir.path(), "A.bin", b"hello world");
    let (validator, notifier) = validator();

    let err = validator
        .validate(
            &data,
            &HashRecord::expecting("deadbeef", HashType::Crc32),
            &ValidationOptions::default(),
        )
        .unwrap_err();

    match &err {
        SyncError::HashMismatch {
            expected, actual, ..
        } => {
            assert_eq!(expected, "deadbeef");
            assert_eq!(actual, "0d4a1185");
        }
        other => panic!("Expected HashMismatch, got {:?}", other),
    }
    assert!(hashcheck_path(&data).exists());
    assert_eq!(notifier.warnings(), vec![err.to_string()]);
}

#[test]
fn test_size_mismatch_against_sidecar() {
    let dir = tempdir().unwrap();
    let data = write_file(dir.path(), "A.bin", &[0u8; 50]);
    write_hashcheck(
        &data,
        &hashcheck_path(&data),
        &record_for(&data, "x", HashType::Sha1, 100),
    )
    .unwrap();
    let (validator, notifier) = validator();

    let err = validator
        .validate(&data, &HashRecord::default(), &ValidationOptions::default())
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SizeMismatch);
    assert_eq!(
        notifier.warnings(),
        vec!["File size mismatch for A.bin: expected 100 bytes but actually 50 bytes"]
    );
}

#[test]
fn test_date_check_only_without_hashing() {
    let dir = tempdir().unwrap();
    let data = write_file(dir.path(), "A.bin", b"hello world");
    write_hashcheck(
        &data,
        &hashcheck_path(&data),
        &record_for(&data, "not-a-real-hash", HashType::Sha1, 11),
    )
    .unwrap();
    let (validator, _) = validator();

    // The bogus digest is never recomputed
    validator
        .validate(
            &data,
            &HashRecord::default(),
            &ValidationOptions::size_and_date_only(),
        )
        .unwrap();

    set_age(&data, Duration::from_secs(3600));
    let err = validator
        .validate(
            &data,
            &HashRecord::default(),
            &ValidationOptions::size_and_date_only(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DateMismatch);

    // With hashing on, the date is ignored and the digest decides
    let err = validator
        .validate(&data, &HashRecord::default(), &ValidationOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HashMismatch);
}

#[test]
fn test_undefined_hash_type_cannot_recompute() {
    let dir = tempdir().unwrap();
    let data = write_file(dir.path(), "A.bin", b"hello world");
    fs::write(
        hashcheck_path(&data),
        format!("hash={}\nsize=11\n", HELLO_SHA1),
    )
    .unwrap();
    let (validator, _) = validator();

    let err = validator
        .validate(&data, &HashRecord::default(), &ValidationOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UndefinedHashType);

    // A strict check may assume the algorithm
    validator
        .validate_existing(&data, None, &ValidationOptions::default(), HashType::Sha1)
        .unwrap();
}

#[test]
fn test_remote_expectation_is_cross_checked_without_hashing() {
    let dir = tempdir().unwrap();
    let data = write_file(dir.path(), "A.bin", b"hello world");
    write_hashcheck(
        &data,
        &hashcheck_path(&data),
        &record_for(&data, HELLO_SHA1, HashType::Sha1, 11),
    )
    .unwrap();
    let (validator, _) = validator();
    let options = ValidationOptions::default().with_recheck_interval(30);

    validator
        .validate(&data, &HashRecord::expecting(HELLO_SHA1, HashType::Sha1), &options)
        .unwrap();

    let err = validator
        .validate(&data, &HashRecord::expecting("feed", HashType::Sha1), &options)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HashMismatch);
}

#[test]
fn test_explicit_sidecar_location() {
    let dir = tempdir().unwrap();
    let data = write_file(dir.path(), "A.bin", b"hello world");
    let elsewhere = dir.path().join("manifests/A.check");
    fs::create_dir_all(elsewhere.parent().unwrap()).unwrap();
    write_hashcheck(
        &data,
        &elsewhere,
        &record_for(&data, HELLO_SHA1, HashType::Sha1, 11),
    )
    .unwrap();
    let (validator, _) = validator();

    validator
        .validate_with_hashcheck(
            &data,
            &elsewhere,
            &HashRecord::default(),
            &ValidationOptions::always_recheck(),
        )
        .unwrap();
    assert!(!hashcheck_path(&data).exists());
}

#[test]
fn test_strict_validation_requires_sidecar() {
    let dir = tempdir().unwrap();
    let data = write_file(dir.path(), "A.bin", b"hello world");
    let (validator, notifier) = validator();

    let err = validator
        .validate_existing(&data, None, &ValidationOptions::default(), HashType::Sha1)
        .unwrap_err();

    assert!(matches!(err, SyncError::MissingHashcheck { .. }));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!hashcheck_path(&data).exists());
    assert_eq!(notifier.warnings().len(), 1);
}

#[test]
fn test_missing_or_directory_path_is_not_found() {
    let dir = tempdir().unwrap();
    let (validator, _) = validator();

    for path in [dir.path().join("missing.bin"), dir.path().to_path_buf()] {
        let err = validator
            .validate(&path, &HashRecord::default(), &ValidationOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}

#[test]
fn test_first_use_hashing_failure_is_reported_not_raised() {
    let dir = tempdir().unwrap();
    let data = write_file(dir.path(), "A.bin", b"hello world");
    let notifier = Arc::new(MemoryNotifier::new());
    let validator = Validator::new(
        Arc::new(ScriptedHashProvider::new(dir.path(), CreateBehavior::Fail)),
        notifier.clone(),
    );

    let err = validator
        .validate(&data, &HashRecord::default(), &ValidationOptions::default())
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransientIo);
    assert_eq!(notifier.warnings().len(), 1);
    assert!(notifier.warnings()[0].contains("share is read-only"));
    assert!(!hashcheck_path(&data).exists());
    assert!(!last_used_path(&data).exists());
}
