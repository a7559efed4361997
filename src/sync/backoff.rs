//! Jittered backoff before repairing a cache entry.
//!
//! When a cached file fails validation, other processes sharing the cache
//! have probably noticed too and one of them may already be re-copying it.
//! Instead of every process starting its own copy at once, each waits a
//! random 5-15 seconds (plus one second per 50 MB of data) and checks again.
//! A `.hashcheck` file older than ten minutes means nobody is mid-repair, so
//! the wait is skipped.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Longest wait [`BackoffPolicy::wait_for`] will ever return.
pub const MAX_WAIT: Duration = Duration::from_secs(60 * 60);

/// Timing knobs for the anti-stampede wait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// A local sidecar older than this skips the wait entirely.
    pub stale_sidecar_minutes: u64,
    /// Lower bound of the random wait, inclusive.
    pub min_wait_seconds: u64,
    /// Upper bound of the random wait, exclusive.
    pub max_wait_seconds: u64,
    /// One extra second of waiting per this many megabytes of source file.
    pub megabytes_per_extra_second: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            stale_sidecar_minutes: 10,
            min_wait_seconds: 5,
            max_wait_seconds: 15,
            megabytes_per_extra_second: 50.0,
        }
    }
}

impl BackoffPolicy {
    /// Smallest non-zero `megabytes_per_extra_second` accepted from configuration.
    pub const MIN_MEGABYTES_PER_EXTRA_SECOND: f64 = 0.001;

    /// Age beyond which a local `.hashcheck` file is considered abandoned.
    #[must_use]
    pub fn stale_sidecar_age(&self) -> Duration {
        Duration::from_secs(self.stale_sidecar_minutes.saturating_mul(60))
    }

    /// Whether to re-copy immediately given the age of the local sidecar.
    ///
    /// `None` means the sidecar does not exist, which never skips the wait.
    #[must_use]
    pub fn skip_wait(&self, sidecar_age: Option<Duration>) -> bool {
        sidecar_age.is_some_and(|age| age > self.stale_sidecar_age())
    }

    /// Pick a wait for a source file of `file_size` bytes.
    ///
    /// Uniform in `[min_wait, max_wait)` seconds plus
    /// `file_size_mb / megabytes_per_extra_second` seconds, capped at [`MAX_WAIT`].
    pub fn wait_for<R: Rng + ?Sized>(&self, file_size: u64, rng: &mut R) -> Duration {
        let min = self.min_wait_seconds as f64;
        let max = self.max_wait_seconds as f64;
        let base = if max > min { rng.gen_range(min..max) } else { min };
        capped(base + self.extra_seconds(file_size))
    }

    /// Smallest and largest (exclusive) waits [`wait_for`](Self::wait_for) can return.
    #[must_use]
    pub fn wait_bounds(&self, file_size: u64) -> (Duration, Duration) {
        let extra = self.extra_seconds(file_size);
        let min = self.min_wait_seconds as f64;
        let max = (self.max_wait_seconds as f64).max(min);
        (capped(min + extra), capped(max + extra))
    }

    fn extra_seconds(&self, file_size: u64) -> f64 {
        if self.megabytes_per_extra_second > 0.0 {
            file_size as f64 / BYTES_PER_MB / self.megabytes_per_extra_second
        } else {
            0.0
        }
    }
}

fn capped(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds).map_or(MAX_WAIT, |wait| wait.min(MAX_WAIT))
}

/// Blocks the calling thread; injectable so tests do not really wait.
pub trait Sleeper: Send + Sync {
    /// Block for `duration`.
    fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
