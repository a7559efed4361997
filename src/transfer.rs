//! Copying data files into the local cache.
//!
//! # Overview
//!
//! The sync core hands every byte-level copy to a [`FileTransferService`].
//! [`LocalFileTransfer`] is the bundled implementation:
//!
//! - holds a shared advisory lock on the source while reading it
//! - streams into a hidden temp file next to the destination
//! - flushes the temp file to disk and copies the source modification time
//! - renames the temp file over the destination
//!
//! A reader therefore sees either the old destination file or the complete
//! new one, never a partially written copy.
//!
//! # Example
//!
//! ```no_run
//! use hashsync::transfer::{FileTransferService, LocalFileTransfer};
//! use std::path::Path;
//!
//! let transfer = LocalFileTransfer::new();
//! transfer
//!     .copy_file(Path::new("/shared/A.bin"), Path::new("/cache/A.bin"), true)
//!     .unwrap();
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use filetime::FileTime;
use fs2::FileExt;
use thiserror::Error;

use crate::progress::ProgressCallback;

/// Copy buffer size (1 MiB).
const COPY_BUFFER_SIZE: usize = 1024 * 1024;

/// Error type for transfer operations.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The source file does not exist.
    #[error("source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// The destination exists and overwriting was not allowed.
    #[error("destination already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// An I/O error occurred while copying.
    #[error("I/O error for {}: {source}", .path.display())]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl TransferError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Performs blocking file copies.
///
/// A call either fully populates `destination` or fails.
pub trait FileTransferService: Send + Sync {
    /// Copy `source` to `destination`, replacing it when `overwrite` is set.
    fn copy_file(&self, source: &Path, destination: &Path, overwrite: bool)
        -> Result<(), TransferError>;
}

/// [`FileTransferService`] for locally mounted paths (including network shares).
#[derive(Default)]
pub struct LocalFileTransfer {
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for LocalFileTransfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFileTransfer")
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl LocalFileTransfer {
    /// Create a transfer service without progress reporting.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn copy_locked(&self, source: &Path, destination: &Path) -> Result<(), TransferError> {
        let mut input = File::open(source).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                TransferError::SourceNotFound(source.to_path_buf())
            } else {
                TransferError::io(source, e)
            }
        })?;
        let metadata = input.metadata().map_err(|e| TransferError::io(source, e))?;

        // Writers that take an exclusive lock on the source are kept out until we finish
        FileExt::lock_shared(&input).map_err(|e| TransferError::io(source, e))?;

        let temp_path = temp_path_for(destination);
        let result = self
            .stream_to(&mut input, &temp_path, metadata.len(), source)
            .and_then(|()| {
                let mtime = FileTime::from_last_modification_time(&metadata);
                filetime::set_file_mtime(&temp_path, mtime)
                    .map_err(|e| TransferError::io(&temp_path, e))
            })
            .and_then(|()| {
                fs::rename(&temp_path, destination).map_err(|e| TransferError::io(destination, e))
            });

        if let Err(e) = FileExt::unlock(&input) {
            log::debug!("Failed to release lock on {}: {}", source.display(), e);
        }

        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result
    }

    fn stream_to(
        &self,
        input: &mut File,
        temp_path: &Path,
        total_bytes: u64,
        source: &Path,
    ) -> Result<(), TransferError> {
        let mut output = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(temp_path)
            .map_err(|e| TransferError::io(temp_path, e))?;

        if let Some(cb) = &self.progress_callback {
            cb.on_transfer_start(&source.to_string_lossy(), total_bytes);
        }

        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        let outcome = loop {
            let n = match input.read(&mut buffer) {
                Ok(0) => break Ok(()),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => break Err(TransferError::io(source, e)),
            };
            if let Err(e) = output.write_all(&buffer[..n]) {
                break Err(TransferError::io(temp_path, e));
            }
            if let Some(cb) = &self.progress_callback {
                cb.on_bytes(n as u64);
            }
        }
        .and_then(|()| output.sync_all().map_err(|e| TransferError::io(temp_path, e)));

        if let Some(cb) = &self.progress_callback {
            cb.on_transfer_end(outcome.is_ok());
        }
        outcome
    }
}

impl FileTransferService for LocalFileTransfer {
    fn copy_file(
        &self,
        source: &Path,
        destination: &Path,
        overwrite: bool,
    ) -> Result<(), TransferError> {
        if !overwrite && destination.exists() {
            return Err(TransferError::AlreadyExists(destination.to_path_buf()));
        }

        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| TransferError::io(parent, e))?;
            }
        }

        log::debug!(
            "Copying {} to {}",
            source.display(),
            destination.display()
        );
        self.copy_locked(source, destination)
    }
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Hidden temp file in the destination directory, unique per process and call.
pub(crate) fn temp_path_for(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    destination.with_file_name(format!(".{}.{}.{}.tmp", name, std::process::id(), seq))
}
