//! `.LastUsed` sidecars.
//!
//! Each successful validation or fresh copy rewrites `<data file>.LastUsed`
//! with the current UTC time. Nothing in this crate reads it back; it is a
//! liveness signal for whatever evicts old cache entries.

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::hashing::format_timestamp;

/// Suffix appended to a data file path to name its last-used sidecar.
pub const LAST_USED_SUFFIX: &str = ".LastUsed";

/// Path of the `.LastUsed` sidecar for `data_file`.
#[must_use]
pub fn last_used_path(data_file: &Path) -> PathBuf {
    let mut name = OsString::from(data_file.as_os_str());
    name.push(LAST_USED_SUFFIX);
    PathBuf::from(name)
}

/// Overwrite the `.LastUsed` sidecar for `data_file` with the current UTC time.
///
/// Returns the sidecar path on success.
pub fn try_update_last_used(data_file: &Path) -> io::Result<PathBuf> {
    let path = last_used_path(data_file);
    let mut file = File::create(&path)?;
    writeln!(file, "{}", format_timestamp(Utc::now()))?;
    Ok(path)
}

/// Best-effort [`try_update_last_used`].
///
/// Another process holding the sidecar open is expected, so failures are
/// only traced.
pub fn update_last_used(data_file: &Path) {
    if let Err(e) = try_update_last_used(data_file) {
        log::debug!(
            "Unable to update {}: {}",
            last_used_path(data_file).display(),
            e
        );
    }
}
