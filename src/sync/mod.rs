//! Hash-validated synchronization of shared files into a local cache.
//!
//! This module provides functionality for:
//! - Validating a cached file against its `.hashcheck` sidecar ([`Validator`])
//! - Recording cache liveness in `.LastUsed` sidecars ([`last_used`])
//! - Copying files into the cache without stampeding the source ([`FileSync`])
//!
//! # Concurrency
//!
//! Everything here is blocking and lock-free. Many processes may validate or
//! repair the same cache entry at once; the data file and its two sidecars are
//! plain shared files and the last writer wins. A transient mismatch between a
//! data file and its sidecar heals on the next call, which recomputes the hash
//! and either passes or re-copies.
//!
//! # Example
//!
//! ```no_run
//! use hashsync::hashing::HashType;
//! use hashsync::notify::LogNotifier;
//! use hashsync::sync::FileSync;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let sync = FileSync::local(Arc::new(LogNotifier));
//! match sync.copy_file_to_local(Path::new("/shared/A.bin"), Path::new("/cache"), 0, HashType::Sha1) {
//!     Ok(local) => println!("ready: {}", local.display()),
//!     Err(e) => eprintln!("{} ({:?})", e, e.kind()),
//! }
//! ```

pub mod backoff;
pub mod last_used;
pub mod orchestrator;
pub mod validator;

use std::path::PathBuf;

use crate::hashing::HashError;
use crate::transfer::TransferError;

pub use backoff::{BackoffPolicy, Sleeper, ThreadSleeper};
pub use last_used::{last_used_path, try_update_last_used, update_last_used, LAST_USED_SUFFIX};
pub use orchestrator::FileSync;
pub use validator::{ValidationOptions, Validator};

/// Result of a sync or validation operation.
pub type SyncResult<T = ()> = Result<T, SyncError>;

/// Coarse classification of a [`SyncError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Source or local file absent.
    NotFound,
    /// Digest differs from the expected or recorded value.
    HashMismatch,
    /// File length differs from the `.hashcheck` record.
    SizeMismatch,
    /// Modification time differs from the `.hashcheck` record.
    DateMismatch,
    /// A hash must be recomputed but no algorithm is known.
    UndefinedHashType,
    /// Sidecar read/write failure, typically a lock held by another process.
    TransientIo,
    /// The file transfer itself failed.
    TransferFailed,
    /// Anything else caught at the outer boundary.
    Unhandled,
}

/// Errors reported by [`Validator`] and [`FileSync`].
///
/// The `Display` text is the human-readable message also sent to the
/// [`Notifier`](crate::notify::Notifier).
#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    /// The source or local data file does not exist.
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A strict validation found no `.hashcheck` file.
    #[error("Data file at {} does not have a corresponding .hashcheck file named {}", .data_file.display(), .hashcheck.display())]
    MissingHashcheck {
        /// Data file being validated
        data_file: PathBuf,
        /// Sidecar that was expected
        hashcheck: PathBuf,
    },

    /// Digest mismatch.
    #[error("Hash mismatch for {file}: expected {expected} but actually {actual}")]
    HashMismatch {
        /// File name
        file: String,
        /// Expected digest
        expected: String,
        /// Digest found
        actual: String,
    },

    /// Length mismatch against the `.hashcheck` record.
    #[error("File size mismatch for {file}: expected {expected} bytes but actually {actual} bytes")]
    SizeMismatch {
        /// File name
        file: String,
        /// Recorded length
        expected: u64,
        /// Actual length
        actual: u64,
    },

    /// Modification time mismatch against the `.hashcheck` record.
    #[error("File date mismatch for {file}: expected {expected} UTC but actually {actual} UTC")]
    DateMismatch {
        /// File name
        file: String,
        /// Recorded modification time
        expected: String,
        /// Actual modification time
        actual: String,
    },

    /// The `.hashcheck` record has no hash type.
    #[error("Hashtype is undefined; cannot compute the file hash to compare to the .hashcheck file")]
    UndefinedHashType,

    /// Hashing or sidecar access failed.
    #[error("Unable to compute the hash value for {}: {source}", .path.display())]
    Hash {
        /// File being hashed or sidecar being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: HashError,
    },

    /// The file transfer failed.
    #[error("Error copying {} to {}: {source}", .from.display(), .to.display())]
    TransferFailed {
        /// Source path
        from: PathBuf,
        /// Destination path
        to: PathBuf,
        /// Underlying error
        #[source]
        source: TransferError,
    },

    /// Unexpected I/O failure caught at the outer boundary.
    #[error("{context}: {source}")]
    Unhandled {
        /// What was being attempted
        context: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::MissingHashcheck { .. } => ErrorKind::NotFound,
            Self::HashMismatch { .. } => ErrorKind::HashMismatch,
            Self::SizeMismatch { .. } => ErrorKind::SizeMismatch,
            Self::DateMismatch { .. } => ErrorKind::DateMismatch,
            Self::UndefinedHashType => ErrorKind::UndefinedHashType,
            Self::Hash { source, .. } => match source {
                HashError::UndefinedHashType => ErrorKind::UndefinedHashType,
                HashError::NotFound(_) => ErrorKind::NotFound,
                HashError::Io { .. } => ErrorKind::TransientIo,
                HashError::UnknownHashType(_) | HashError::Parse { .. } => ErrorKind::Unhandled,
            },
            Self::TransferFailed { .. } => ErrorKind::TransferFailed,
            Self::Unhandled { .. } => ErrorKind::Unhandled,
        }
    }

    pub(crate) fn hash(path: impl Into<PathBuf>, source: HashError) -> Self {
        Self::Hash {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn unhandled(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Unhandled {
            context: context.into(),
            source,
        }
    }
}
