//! Streaming file digests.
//!
//! # Overview
//! Files are read in fixed-size chunks so that large cache entries can be
//! hashed without loading them into memory. All digests are rendered as
//! lowercase hex.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use md5::Md5;
use sha1::{Digest, Sha1};

use super::{HashError, HashType};

/// Read buffer size for hashing (64 KiB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Compute the digest of the whole file at `path`.
///
/// # Errors
///
/// - [`HashError::UndefinedHashType`] if `hash_type` is [`HashType::Undefined`]
/// - [`HashError::NotFound`] / [`HashError::Io`] if the file cannot be read
///
/// # Example
///
/// ```no_run
/// use hashsync::hashing::{compute_file_hash, HashType};
/// use std::path::Path;
///
/// let sha1 = compute_file_hash(Path::new("A.bin"), HashType::Sha1).unwrap();
/// assert_eq!(sha1.len(), 40);
/// ```
pub fn compute_file_hash(path: &Path, hash_type: HashType) -> Result<String, HashError> {
    let file = File::open(path).map_err(|e| HashError::io(path, e))?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);

    match hash_type {
        HashType::Undefined => Err(HashError::UndefinedHashType),
        HashType::Crc32 => {
            let mut hasher = crc32fast::Hasher::new();
            stream(&mut reader, path, |chunk| hasher.update(chunk))?;
            Ok(format!("{:08x}", hasher.finalize()))
        }
        HashType::Md5 => {
            let mut hasher = Md5::new();
            stream(&mut reader, path, |chunk| hasher.update(chunk))?;
            Ok(hex::encode(hasher.finalize()))
        }
        HashType::Sha1 => {
            let mut hasher = Sha1::new();
            stream(&mut reader, path, |chunk| hasher.update(chunk))?;
            Ok(hex::encode(hasher.finalize()))
        }
    }
}

fn stream<R: Read>(
    reader: &mut R,
    path: &Path,
    mut update: impl FnMut(&[u8]),
) -> Result<(), HashError> {
    let mut buffer = vec![0u8; BUFFER_SIZE];
    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(HashError::io(path, e)),
        };
        update(&buffer[..n]);
    }
}
