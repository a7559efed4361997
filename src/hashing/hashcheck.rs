//! The `.hashcheck` sidecar codec.
//!
//! A `.hashcheck` file sits next to its data file and records the digest,
//! size and modification time of the data file at the moment it was hashed.
//! The sidecar's own modification time is the "last checked" time used for
//! recheck-interval staleness.
//!
//! # Format
//!
//! ```text
//! # Hashcheck file created 2026-10-17 03:15:42 PM
//! filename=/data/A.bin
//! size=10485760
//! modification_date_utc=2026-10-17 03:14:10 PM
//! hash=3f786850e387550fdab836ed7e6dc881de23001b
//! hashtype=sha1
//! ```
//!
//! Keys are case-insensitive, blank lines and `#` comments are ignored, and
//! unknown keys are skipped so newer writers stay readable.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::transfer::temp_path_for;

use super::{compute_file_hash, CreatedHash, HashError, HashProvider, HashRecord, HashType};

/// Suffix appended to a data file path to name its hash sidecar.
pub const HASHCHECK_SUFFIX: &str = ".hashcheck";

/// Date/time format shared by every `.hashcheck` and `.LastUsed` writer and reader.
///
/// Equivalent to `yyyy-MM-dd hh:mm:ss tt`; values are always UTC.
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %I:%M:%S %p";

/// 24-hour layout written by some older tools; accepted on read only.
const LEGACY_DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const KEY_FILENAME: &str = "filename";
const KEY_SIZE: &str = "size";
const KEY_MODIFICATION_DATE: &str = "modification_date_utc";
const KEY_HASH: &str = "hash";
const KEY_HASH_TYPE: &str = "hashtype";

/// Path of the `.hashcheck` sidecar for `data_file`.
#[must_use]
pub fn hashcheck_path(data_file: &Path) -> PathBuf {
    let mut name = OsString::from(data_file.as_os_str());
    name.push(HASHCHECK_SUFFIX);
    PathBuf::from(name)
}

/// Render a UTC timestamp in [`DATE_TIME_FORMAT`].
#[must_use]
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format(DATE_TIME_FORMAT).to_string()
}

/// Parse a timestamp written in [`DATE_TIME_FORMAT`] (or the legacy 24-hour form).
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    [DATE_TIME_FORMAT, LEGACY_DATE_TIME_FORMAT]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Parse the text of a `.hashcheck` file.
///
/// `path` is only used to label errors.
pub fn parse_hashcheck(path: &Path, content: &str) -> Result<HashRecord, HashError> {
    let mut record = HashRecord::default();

    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parse_error = |message: String| HashError::Parse {
            path: path.to_path_buf(),
            line: index + 1,
            message,
        };

        let Some((key, value)) = line.split_once('=') else {
            return Err(parse_error(format!("expected key=value, found '{}'", line)));
        };
        let value = value.trim();

        match key.trim().to_ascii_lowercase().as_str() {
            KEY_SIZE => {
                record.file_size = value
                    .parse()
                    .map_err(|_| parse_error(format!("invalid size '{}'", value)))?;
            }
            KEY_MODIFICATION_DATE if value.is_empty() => record.file_date_utc = None,
            KEY_MODIFICATION_DATE => {
                record.file_date_utc = Some(
                    parse_timestamp(value)
                        .ok_or_else(|| parse_error(format!("invalid date '{}'", value)))?,
                );
            }
            KEY_HASH => record.hash_value = value.to_string(),
            KEY_HASH_TYPE => {
                record.hash_type = value
                    .parse()
                    .map_err(|e: HashError| parse_error(e.to_string()))?;
            }
            // filename is informational; the sidecar location identifies the data file
            KEY_FILENAME => {}
            other => log::trace!("Ignoring unknown .hashcheck key '{}' in {}", other, path.display()),
        }
    }

    Ok(record)
}

/// Render a [`HashRecord`] as `.hashcheck` text.
#[must_use]
pub fn render_hashcheck(data_file: &Path, record: &HashRecord) -> String {
    let file_date = record
        .file_date_utc
        .map(format_timestamp)
        .unwrap_or_default();

    format!(
        "# Hashcheck file created {}\n\
         {KEY_FILENAME}={}\n\
         {KEY_SIZE}={}\n\
         {KEY_MODIFICATION_DATE}={}\n\
         {KEY_HASH}={}\n\
         {KEY_HASH_TYPE}={}\n",
        format_timestamp(Utc::now()),
        data_file.display(),
        record.file_size,
        file_date,
        record.hash_value,
        record.hash_type,
    )
}

/// Replace the sidecar at `hashcheck` with `record`.
///
/// The text goes to a temp file in the same directory that is then renamed
/// over `hashcheck`, so readers never see a truncated sidecar.
pub fn write_hashcheck(
    data_file: &Path,
    hashcheck: &Path,
    record: &HashRecord,
) -> Result<(), HashError> {
    let content = render_hashcheck(data_file, record);
    let temp_path = temp_path_for(hashcheck);

    let result = File::create(&temp_path)
        .and_then(|mut file| file.write_all(content.as_bytes()))
        .map_err(|e| HashError::io(hashcheck, e))
        .and_then(|()| fs::rename(&temp_path, hashcheck).map_err(|e| HashError::io(hashcheck, e)));

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

/// [`HashProvider`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileHashProvider;

impl FileHashProvider {
    /// Create a new provider.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HashProvider for FileHashProvider {
    fn compute_file_hash(&self, path: &Path, hash_type: HashType) -> Result<String, HashError> {
        compute_file_hash(path, hash_type)
    }

    fn read_hash_record(&self, hashcheck_path: &Path) -> Result<HashRecord, HashError> {
        let content =
            fs::read_to_string(hashcheck_path).map_err(|e| HashError::io(hashcheck_path, e))?;
        parse_hashcheck(hashcheck_path, &content)
    }

    fn create_hash_record(
        &self,
        data_file: &Path,
        hash_type: HashType,
    ) -> Result<CreatedHash, HashError> {
        let metadata = fs::metadata(data_file).map_err(|e| HashError::io(data_file, e))?;
        let hash_value = compute_file_hash(data_file, hash_type)?;

        let record = HashRecord {
            hash_value: hash_value.clone(),
            hash_type,
            file_size: metadata.len(),
            file_date_utc: metadata.modified().ok().map(DateTime::<Utc>::from),
        };

        let sidecar = hashcheck_path(data_file);
        let warning = match write_hashcheck(data_file, &sidecar, &record) {
            Ok(()) => {
                log::debug!("Wrote {} ({} {})", sidecar.display(), hash_type, hash_value);
                None
            }
            Err(e) => Some(format!(
                "Unable to create the .hashcheck file {}: {}",
                sidecar.display(),
                e
            )),
        };

        Ok(CreatedHash {
            hash_value,
            warning,
        })
    }
}
