//! Progress reporting utilities using indicatif.
//!
//! This module provides the [`Progress`] struct which implements [`ProgressCallback`]
//! to display a byte-based progress bar while a file is copied into the local cache.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Progress callback for file transfers.
///
/// Implement this trait to receive progress updates while
/// [`LocalFileTransfer`](crate::transfer::LocalFileTransfer) copies a file.
pub trait ProgressCallback: Send + Sync {
    /// Called when a transfer starts.
    ///
    /// # Arguments
    ///
    /// * `path` - Source file being copied
    /// * `total_bytes` - Length of the source file
    fn on_transfer_start(&self, path: &str, total_bytes: u64);

    /// Called after each chunk is written.
    ///
    /// # Arguments
    ///
    /// * `bytes` - Number of bytes in the chunk
    fn on_bytes(&self, bytes: u64);

    /// Called when a transfer completes (successfully or not).
    fn on_transfer_end(&self, _success: bool) {}

    /// Called when the sync core waits before re-checking a cache entry.
    fn on_wait(&self, _wait: Duration) {}
}

/// Progress reporter using indicatif.
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, no progress bars will be displayed.
    ///
    /// # Examples
    ///
    /// ```
    /// use hashsync::progress::Progress;
    ///
    /// let progress = Progress::new(false);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            quiet,
        }
    }

    fn transfer_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg} {bytes_per_sec} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }

    fn bar(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProgressCallback for Progress {
    fn on_transfer_start(&self, path: &str, total_bytes: u64) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new(total_bytes);
        pb.set_style(Self::transfer_style());
        pb.set_message(truncate_path(path, 30));
        *self.bar() = Some(pb);
    }

    fn on_bytes(&self, bytes: u64) {
        if let Some(ref pb) = *self.bar() {
            pb.inc(bytes);
        }
    }

    fn on_transfer_end(&self, success: bool) {
        if let Some(pb) = self.bar().take() {
            if success {
                pb.finish_with_message("Copy complete");
            } else {
                pb.abandon_with_message("Copy failed");
            }
        }
    }

    fn on_wait(&self, wait: Duration) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.finish_with_message(format!(
            "Waiting {:.1}s for other processes to finish copying",
            wait.as_secs_f64()
        ));
    }
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.len() <= max_len {
        return path.to_string();
    }

    let path_buf = std::path::Path::new(path);
    let file_name = path_buf
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    if file_name.len() >= max_len {
        let tail: String = file_name
            .chars()
            .rev()
            .take(max_len - 3)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        return format!("...{}", tail);
    }

    format!(".../{}", file_name)
}
