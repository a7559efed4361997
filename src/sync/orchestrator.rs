//! Copying shared files into a local cache.
//!
//! [`FileSync::copy_file_to_local`] is the entry point. The cheap path is a
//! cache hit that validates against its `.hashcheck` file and returns without
//! touching the source. A miss copies the file and validates the copy. A hit
//! that fails validation waits (see [`BackoffPolicy`]) to give a concurrent
//! repair the chance to finish, checks again, and only then re-copies.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use super::backoff::{BackoffPolicy, Sleeper, ThreadSleeper};
use super::validator::{ValidationOptions, Validator};
use super::{SyncError, SyncResult};
use crate::hashing::{hashcheck_path, FileHashProvider, HashProvider, HashRecord, HashType};
use crate::notify::Notifier;
use crate::progress::ProgressCallback;
use crate::transfer::{FileTransferService, LocalFileTransfer};

/// Synchronizes files from shared storage into a local cache directory.
pub struct FileSync {
    transfer: Arc<dyn FileTransferService>,
    hasher: Arc<dyn HashProvider>,
    notifier: Arc<dyn Notifier>,
    validator: Validator,
    backoff: BackoffPolicy,
    sleeper: Arc<dyn Sleeper>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for FileSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSync")
            .field("backoff", &self.backoff)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish_non_exhaustive()
    }
}

impl FileSync {
    /// Create an orchestrator from its collaborators.
    ///
    /// Uses the default [`BackoffPolicy`] and really sleeps while backing off.
    #[must_use]
    pub fn new(
        transfer: Arc<dyn FileTransferService>,
        hasher: Arc<dyn HashProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let validator = Validator::new(Arc::clone(&hasher), Arc::clone(&notifier));
        Self {
            transfer,
            hasher,
            notifier,
            validator,
            backoff: BackoffPolicy::default(),
            sleeper: Arc::new(ThreadSleeper),
            progress_callback: None,
        }
    }

    /// Orchestrator wired to [`LocalFileTransfer`] and [`FileHashProvider`].
    #[must_use]
    pub fn local(notifier: Arc<dyn Notifier>) -> Self {
        Self::new(
            Arc::new(LocalFileTransfer::new()),
            Arc::new(FileHashProvider::new()),
            notifier,
        )
    }

    /// Set the backoff policy.
    #[must_use]
    pub fn with_backoff(mut self, policy: BackoffPolicy) -> Self {
        self.backoff = policy;
        self
    }

    /// Set the sleeper used while backing off.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Set the progress callback (notified before backing off).
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Make sure `target_dir` holds a valid copy of `source`, copying only when needed.
    ///
    /// # Arguments
    ///
    /// * `source` - File on shared storage
    /// * `target_dir` - Local cache directory (created if missing)
    /// * `recheck_interval_days` - Days a local `.hashcheck` file is trusted before the
    ///   local copy is re-hashed; 0 re-hashes on every call
    /// * `hash_type` - Algorithm for a newly created source `.hashcheck` file
    ///
    /// # Returns
    ///
    /// The path of the validated local copy.
    ///
    /// # Errors
    ///
    /// `NotFound` when the source is missing, `TransferFailed` when a copy
    /// fails, or the validation error of the final attempt.
    pub fn copy_file_to_local(
        &self,
        source: &Path,
        target_dir: &Path,
        recheck_interval_days: i32,
        hash_type: HashType,
    ) -> SyncResult<PathBuf> {
        let source_metadata = match fs::metadata(source) {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Err(self.fail(SyncError::NotFound(source.to_path_buf()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(self.fail(SyncError::NotFound(source.to_path_buf())))
            }
            Err(e) => return Err(self.fail(retrieval_error(source, e))),
        };

        let expected = self.expected_hash(source, &source_metadata, hash_type)?;

        fs::create_dir_all(target_dir).map_err(|e| self.fail(retrieval_error(source, e)))?;

        let file_name = source
            .file_name()
            .ok_or_else(|| self.fail(SyncError::NotFound(source.to_path_buf())))?;
        let target = target_dir.join(file_name);
        let options = ValidationOptions::default().with_recheck_interval(recheck_interval_days);

        if !target.exists() {
            log::debug!("Cache miss for {}", target.display());
            self.copy(source, &target)?;
            self.validator.validate(&target, &expected, &options)?;
            return Ok(target);
        }

        if self.validator.validate(&target, &expected, &options).is_ok() {
            log::debug!("Cache hit for {}", target.display());
            return Ok(target);
        }

        let recheck_now = options.with_recheck_interval(0);
        let sidecar_age = file_age(&hashcheck_path(&target));

        if self.backoff.skip_wait(sidecar_age) {
            log::debug!(
                "Local .hashcheck for {} is stale; re-copying without waiting",
                target.display()
            );
        } else {
            let wait = self
                .backoff
                .wait_for(source_metadata.len(), &mut rand::thread_rng());
            log::info!(
                "Waiting {:.1}s before re-checking {}",
                wait.as_secs_f64(),
                target.display()
            );
            if let Some(cb) = &self.progress_callback {
                cb.on_wait(wait);
            }
            self.sleeper.sleep(wait);

            if self
                .validator
                .validate(&target, &expected, &recheck_now)
                .is_ok()
            {
                log::debug!("{} was repaired by another process", target.display());
                return Ok(target);
            }
        }

        self.notifier.warning(&format!(
            "Hash for local file does not match the remote file; recopying {} to {}",
            source.display(),
            target_dir.display()
        ));

        self.copy(source, &target)?;
        if let Err(e) = self.validator.validate(&target, &expected, &recheck_now) {
            self.notifier.error(&format!(
                "Unable to obtain a valid copy of {} in {} after re-copying: {}",
                source.display(),
                target_dir.display(),
                e
            ));
            return Err(e);
        }
        Ok(target)
    }

    /// Read the source's `.hashcheck` file, or create one on a best-effort basis.
    fn expected_hash(
        &self,
        source: &Path,
        metadata: &fs::Metadata,
        hash_type: HashType,
    ) -> SyncResult<HashRecord> {
        let source_hashcheck = hashcheck_path(source);
        if source_hashcheck.exists() {
            return self
                .hasher
                .read_hash_record(&source_hashcheck)
                .map_err(|e| self.fail(SyncError::hash(&source_hashcheck, e)));
        }

        match self.hasher.create_hash_record(source, hash_type) {
            Ok(created) => {
                if let Some(warning) = &created.warning {
                    self.notifier.warning(warning);
                }
                Ok(HashRecord {
                    hash_value: created.hash_value,
                    hash_type,
                    file_size: metadata.len(),
                    file_date_utc: metadata.modified().ok().map(Into::into),
                })
            }
            Err(e) => {
                self.notifier.warning(&format!(
                    "Unable to create the .hashcheck file for source file {}: {}",
                    source.display(),
                    e
                ));
                Ok(HashRecord::default())
            }
        }
    }

    fn copy(&self, source: &Path, target: &Path) -> SyncResult {
        remove_hashcheck(target);
        self.transfer
            .copy_file(source, target, true)
            .map_err(|e| {
                let err = SyncError::TransferFailed {
                    from: source.to_path_buf(),
                    to: target.to_path_buf(),
                    source: e,
                };
                self.notifier.error(&err.to_string());
                err
            })
    }

    /// Report an error the validator has not already reported.
    fn fail(&self, e: SyncError) -> SyncError {
        self.notifier.warning(&e.to_string());
        e
    }
}

/// Delete the `.hashcheck` file of `data_file`, ignoring errors.
fn remove_hashcheck(data_file: &Path) {
    let sidecar = hashcheck_path(data_file);
    match fs::remove_file(&sidecar) {
        Ok(()) => log::trace!("Removed {}", sidecar.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::debug!("Unable to remove {}: {}", sidecar.display(), e),
    }
}

/// Time since `path` was last modified; `None` if it does not exist.
fn file_age(path: &Path) -> Option<Duration> {
    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(
        SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO),
    )
}

fn retrieval_error(source: &Path, e: std::io::Error) -> SyncError {
    SyncError::unhandled(
        format!("Error retrieving/validating {}", source.display()),
        e,
    )
}
