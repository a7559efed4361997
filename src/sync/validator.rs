//! Validation of cached files against their `.hashcheck` sidecars.
//!
//! # Overview
//!
//! [`Validator::validate`] answers "is this local copy trustworthy right now?":
//!
//! 1. A missing data file fails with `NotFound`.
//! 2. A missing sidecar is first use, not failure: the file is hashed, a
//!    sidecar is written, and the digest is compared to the caller's
//!    expectation only if one was given (trust-on-first-use).
//! 3. Otherwise the sidecar is read and, depending on [`ValidationOptions`],
//!    cross-checked against the expectation, the file size, the file date,
//!    and (when the sidecar is older than the recheck interval) a freshly
//!    computed digest.
//!
//! Every failure is returned as a [`SyncError`] and also sent to the
//! [`Notifier`] as a warning. Every success refreshes the `.LastUsed` sidecar.

use std::fs::{self, Metadata};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::last_used::update_last_used;
use super::{SyncError, SyncResult};
use crate::hashing::{format_timestamp, hashcheck_path, HashProvider, HashRecord, HashType};
use crate::notify::Notifier;

/// Allowed drift between the recorded and actual modification time.
const DATE_TOLERANCE_MILLIS: i64 = 2_000;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Which checks [`Validator::validate`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    /// Compare the file's modification time to the sidecar (only when no hash is computed).
    pub check_date: bool,
    /// Recompute the digest once the sidecar is older than `recheck_interval_days`.
    pub compute_hash: bool,
    /// Compare the file length to the sidecar.
    pub check_size: bool,
    /// Days a sidecar may be trusted before the digest is recomputed; 0 means always.
    pub recheck_interval_days: i32,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            check_date: true,
            compute_hash: true,
            check_size: true,
            recheck_interval_days: 0,
        }
    }
}

impl ValidationOptions {
    /// All checks, recomputing the digest on every call.
    #[must_use]
    pub fn always_recheck() -> Self {
        Self::default()
    }

    /// Size and date checks only; the digest is never recomputed.
    #[must_use]
    pub fn size_and_date_only() -> Self {
        Self {
            compute_hash: false,
            ..Self::default()
        }
    }

    /// Set the recheck interval in days.
    #[must_use]
    pub fn with_recheck_interval(mut self, days: i32) -> Self {
        self.recheck_interval_days = days;
        self
    }
}

/// Validates local files against `.hashcheck` sidecars.
#[derive(Clone)]
pub struct Validator {
    hasher: Arc<dyn HashProvider>,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("hasher", &"<hash provider>")
            .field("notifier", &"<notifier>")
            .finish()
    }
}

impl Validator {
    /// Create a validator.
    ///
    /// # Arguments
    ///
    /// * `hasher` - Computes digests and reads/writes sidecars
    /// * `notifier` - Receives a warning for every failed validation
    #[must_use]
    pub fn new(hasher: Arc<dyn HashProvider>, notifier: Arc<dyn Notifier>) -> Self {
        Self { hasher, notifier }
    }

    /// Validate `local_path` against `<local_path>.hashcheck` and `expected`.
    ///
    /// Creates the sidecar when it is missing. Pass `HashRecord::default()`
    /// to accept any content on first use.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use hashsync::hashing::{FileHashProvider, HashRecord};
    /// use hashsync::notify::LogNotifier;
    /// use hashsync::sync::{ValidationOptions, Validator};
    /// use std::path::Path;
    /// use std::sync::Arc;
    ///
    /// let validator = Validator::new(Arc::new(FileHashProvider::new()), Arc::new(LogNotifier));
    /// let options = ValidationOptions::default().with_recheck_interval(7);
    /// let valid = validator
    ///     .validate(Path::new("/cache/A.bin"), &HashRecord::default(), &options)
    ///     .is_ok();
    /// ```
    pub fn validate(
        &self,
        local_path: &Path,
        expected: &HashRecord,
        options: &ValidationOptions,
    ) -> SyncResult {
        self.validate_with_hashcheck(local_path, &hashcheck_path(local_path), expected, options)
    }

    /// Like [`validate`](Self::validate), with the sidecar at an explicit path.
    ///
    /// When `hashcheck` is missing, the newly created sidecar is written to
    /// the default `<local_path>.hashcheck` location.
    pub fn validate_with_hashcheck(
        &self,
        local_path: &Path,
        hashcheck: &Path,
        expected: &HashRecord,
        options: &ValidationOptions,
    ) -> SyncResult {
        let result = self.run(local_path, |metadata| {
            if hashcheck.exists() {
                self.check_against_sidecar(
                    local_path,
                    metadata,
                    hashcheck,
                    expected,
                    options,
                    HashType::Undefined,
                )
            } else {
                self.trust_on_first_use(local_path, expected)
            }
        });
        self.report(result)
    }

    /// Strict validation that requires an existing sidecar.
    ///
    /// Never creates a sidecar. When `options.compute_hash` is set the digest
    /// is always recomputed. `assumed_hash_type` is used when the sidecar
    /// carries no `hashtype` entry.
    pub fn validate_existing(
        &self,
        local_path: &Path,
        hashcheck: Option<&Path>,
        options: &ValidationOptions,
        assumed_hash_type: HashType,
    ) -> SyncResult {
        let hashcheck = hashcheck.map_or_else(|| hashcheck_path(local_path), Path::to_path_buf);
        let options = options.with_recheck_interval(0);

        let result = self.run(local_path, |metadata| {
            if !hashcheck.exists() {
                return Err(SyncError::MissingHashcheck {
                    data_file: local_path.to_path_buf(),
                    hashcheck: hashcheck.clone(),
                });
            }
            self.check_against_sidecar(
                local_path,
                metadata,
                &hashcheck,
                &HashRecord::default(),
                &options,
                assumed_hash_type,
            )
        });
        self.report(result)
    }

    fn run(
        &self,
        local_path: &Path,
        check: impl FnOnce(&Metadata) -> SyncResult,
    ) -> SyncResult {
        let metadata = match fs::metadata(local_path) {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Err(SyncError::NotFound(local_path.to_path_buf())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SyncError::NotFound(local_path.to_path_buf()))
            }
            Err(e) => return Err(unexpected(local_path, e)),
        };
        check(&metadata)
    }

    fn trust_on_first_use(&self, local_path: &Path, expected: &HashRecord) -> SyncResult {
        let hash_type = if expected.hash_type.is_defined() {
            expected.hash_type
        } else {
            HashType::Sha1
        };

        log::debug!(
            "No .hashcheck file for {}; computing {} hash",
            local_path.display(),
            hash_type
        );
        let created = self
            .hasher
            .create_hash_record(local_path, hash_type)
            .map_err(|e| SyncError::hash(local_path, e))?;

        if let Some(warning) = &created.warning {
            self.notifier.warning(warning);
        }

        if expected.has_value() && created.hash_value != expected.hash_value {
            return Err(SyncError::HashMismatch {
                file: display_name(local_path),
                expected: expected.hash_value.clone(),
                actual: created.hash_value,
            });
        }

        update_last_used(local_path);
        Ok(())
    }

    fn check_against_sidecar(
        &self,
        local_path: &Path,
        metadata: &Metadata,
        hashcheck: &Path,
        expected: &HashRecord,
        options: &ValidationOptions,
        assumed_hash_type: HashType,
    ) -> SyncResult {
        let record = self
            .hasher
            .read_hash_record(hashcheck)
            .map_err(|e| SyncError::hash(hashcheck, e))?;

        // Cross-check against a remote-sourced expectation
        if expected.hash_type.is_defined() && record.hash_value != expected.hash_value {
            return Err(SyncError::HashMismatch {
                file: display_name(local_path),
                expected: expected.hash_value.clone(),
                actual: record.hash_value,
            });
        }

        if options.check_size && metadata.len() != record.file_size {
            return Err(SyncError::SizeMismatch {
                file: display_name(local_path),
                expected: record.file_size,
                actual: metadata.len(),
            });
        }

        // The digest is authoritative; dates only matter when it is not recomputed
        if !options.compute_hash && options.check_date {
            let actual = modified_utc(local_path, metadata)?;
            let within_tolerance = record.file_date_utc.is_some_and(|recorded| {
                (actual - recorded).num_milliseconds().abs() <= DATE_TOLERANCE_MILLIS
            });
            if !within_tolerance {
                return Err(SyncError::DateMismatch {
                    file: display_name(local_path),
                    expected: record
                        .file_date_utc
                        .map_or_else(|| "(none)".to_string(), format_timestamp),
                    actual: format_timestamp(actual),
                });
            }
        }

        if options.compute_hash {
            let last_checked = fs::metadata(hashcheck)
                .and_then(|m| m.modified())
                .map_err(|e| unexpected(hashcheck, e))?;
            let age_days = (Utc::now() - DateTime::<Utc>::from(last_checked)).num_milliseconds()
                as f64
                / MILLIS_PER_DAY;

            if options.recheck_interval_days <= 0
                || age_days > f64::from(options.recheck_interval_days)
            {
                let hash_type = if record.hash_type.is_defined() {
                    record.hash_type
                } else {
                    assumed_hash_type
                };
                if !hash_type.is_defined() {
                    return Err(SyncError::UndefinedHashType);
                }

                let actual = self
                    .hasher
                    .compute_file_hash(local_path, hash_type)
                    .map_err(|e| SyncError::hash(local_path, e))?;

                if actual != record.hash_value {
                    return Err(SyncError::HashMismatch {
                        file: display_name(local_path),
                        expected: record.hash_value,
                        actual,
                    });
                }
                log::trace!("Hash verified for {}", local_path.display());
            } else {
                log::trace!(
                    "Trusting {} ({:.2} days old) for {}",
                    hashcheck.display(),
                    age_days,
                    local_path.display()
                );
            }
        }

        update_last_used(local_path);
        Ok(())
    }

    fn report(&self, result: SyncResult) -> SyncResult {
        if let Err(e) = &result {
            self.notifier.warning(&e.to_string());
        }
        result
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().to_string())
}

fn modified_utc(path: &Path, metadata: &Metadata) -> SyncResult<DateTime<Utc>> {
    metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .map_err(|e| unexpected(path, e))
}

fn unexpected(path: &Path, source: std::io::Error) -> SyncError {
    SyncError::unhandled(
        format!("Error validating {} against the expected hash", path.display()),
        source,
    )
}
