//! File hashing and `.hashcheck` sidecar records.
//!
//! This module provides functionality for:
//! - Streaming CRC32, MD5 and SHA1 digests of whole files
//! - Reading and writing `.hashcheck` sidecar files
//! - The [`HashProvider`] seam consumed by the validator and the sync orchestrator
//!
//! # Architecture
//!
//! - [`digest`]: streaming file digests
//! - [`hashcheck`]: the textual sidecar codec and [`FileHashProvider`]
//!
//! # Example
//!
//! ```no_run
//! use hashsync::hashing::{FileHashProvider, HashProvider, HashType};
//! use std::path::Path;
//!
//! let provider = FileHashProvider::new();
//! let created = provider
//!     .create_hash_record(Path::new("/data/A.bin"), HashType::Sha1)
//!     .unwrap();
//! println!("sha1 = {}", created.hash_value);
//! ```

pub mod digest;
pub mod hashcheck;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use digest::compute_file_hash;
pub use hashcheck::{
    format_timestamp, hashcheck_path, parse_hashcheck, parse_timestamp, render_hashcheck,
    write_hashcheck, FileHashProvider, DATE_TIME_FORMAT, HASHCHECK_SUFFIX,
};

/// Digest algorithm recorded in a `.hashcheck` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashType {
    /// No algorithm recorded; a hash cannot be recomputed.
    #[default]
    Undefined,
    /// CRC32 (IEEE), 8 hex characters.
    Crc32,
    /// MD5, 32 hex characters.
    Md5,
    /// SHA1, 40 hex characters.
    Sha1,
}

impl HashType {
    /// Whether an algorithm is known.
    #[must_use]
    pub fn is_defined(self) -> bool {
        self != Self::Undefined
    }

    /// Name used in the `hashtype=` line of a `.hashcheck` file.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Crc32 => "crc32",
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
        }
    }
}

impl fmt::Display for HashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashType {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "undefined" => Ok(Self::Undefined),
            "crc32" => Ok(Self::Crc32),
            "md5" => Ok(Self::Md5),
            "sha1" | "sha-1" => Ok(Self::Sha1),
            other => Err(HashError::UnknownHashType(other.to_string())),
        }
    }
}

/// The contents of a `.hashcheck` file, or a hash expectation built by a caller.
///
/// `HashRecord::default()` is the empty expectation: no algorithm, no value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HashRecord {
    /// Lowercase hex digest; empty when unknown
    pub hash_value: String,
    /// Algorithm that produced `hash_value`
    pub hash_type: HashType,
    /// Data file length in bytes at the time the hash was recorded
    pub file_size: u64,
    /// Data file modification time (UTC) at the time the hash was recorded
    pub file_date_utc: Option<DateTime<Utc>>,
}

impl HashRecord {
    /// Build an expectation carrying only a hash value and its algorithm.
    #[must_use]
    pub fn expecting(hash_value: impl Into<String>, hash_type: HashType) -> Self {
        Self {
            hash_value: hash_value.into(),
            hash_type,
            ..Self::default()
        }
    }

    /// Whether a non-blank hash value is present.
    #[must_use]
    pub fn has_value(&self) -> bool {
        !self.hash_value.trim().is_empty()
    }
}

/// Result of [`HashProvider::create_hash_record`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedHash {
    /// The freshly computed digest
    pub hash_value: String,
    /// Set when the hash was computed but the sidecar could not be written
    pub warning: Option<String>,
}

/// Computes digests and reads/writes `.hashcheck` sidecars.
///
/// The sync core only talks to this trait, so tests and embedding
/// applications can substitute their own implementation.
pub trait HashProvider: Send + Sync {
    /// Compute the digest of the whole file at `path`.
    fn compute_file_hash(&self, path: &Path, hash_type: HashType) -> Result<String, HashError>;

    /// Parse the `.hashcheck` file at `hashcheck_path`.
    fn read_hash_record(&self, hashcheck_path: &Path) -> Result<HashRecord, HashError>;

    /// Hash `data_file` and (re)write its `.hashcheck` sidecar.
    fn create_hash_record(
        &self,
        data_file: &Path,
        hash_type: HashType,
    ) -> Result<CreatedHash, HashError>;
}

/// Errors that can occur while hashing files or handling `.hashcheck` files.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A hash was requested without an algorithm.
    #[error("Hashtype is undefined; cannot compute the file hash")]
    UndefinedHashType,

    /// The `hashtype` value is not one of crc32, md5, sha1.
    #[error("Unknown hash type: {0}")]
    UnknownHashType(String),

    /// A `.hashcheck` line could not be parsed.
    #[error("Invalid .hashcheck file {}, line {line}: {message}", .path.display())]
    Parse {
        /// Sidecar being read
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// What was wrong with it
        message: String,
    },

    /// An I/O error occurred while reading or writing a file.
    #[error("I/O error for {}: {source}", .path.display())]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.to_path_buf())
        } else {
            Self::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}
