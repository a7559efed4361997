//! Application configuration management.
//!
//! Settings are layered with figment, later sources winning:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. TOML file (`--config PATH`, or `config.toml` in the platform config directory)
//! 3. `HASHSYNC_*` environment variables, nested keys split on `__`
//!    (`HASHSYNC_BACKOFF__MIN_WAIT_SECONDS=2`)
//!
//! CLI flags are applied on top by the binary.
//!
//! ```toml
//! recheck_interval_days = 7
//! hash_type = "sha1"
//! progress = true
//!
//! [validation]
//! check_date = true
//! check_size = true
//! compute_hash = true
//!
//! [backoff]
//! stale_sidecar_minutes = 10
//! min_wait_seconds = 5
//! max_wait_seconds = 15
//! megabytes_per_extra_second = 50.0
//! ```

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::hashing::HashType;
use crate::sync::{BackoffPolicy, ValidationOptions};

/// Prefix of environment variables that override configuration keys.
pub const ENV_PREFIX: &str = "HASHSYNC_";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Days a local `.hashcheck` file is trusted before re-hashing; 0 means always.
    pub recheck_interval_days: i32,
    /// Algorithm for newly created `.hashcheck` files.
    pub hash_type: HashType,
    /// Checks performed by `validate`.
    pub validation: ValidationOptions,
    /// Anti-stampede wait before re-copying.
    pub backoff: BackoffPolicy,
    /// Show a progress bar while copying.
    pub progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recheck_interval_days: 0,
            hash_type: HashType::Sha1,
            validation: ValidationOptions::default(),
            backoff: BackoffPolicy::default(),
            progress: true,
        }
    }
}

impl Config {
    /// Build the layered figment without extracting it.
    ///
    /// `path` overrides the default config file location. A missing file is
    /// not an error; its layer is simply empty.
    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = path.map(Path::to_path_buf).or_else(Self::config_path) {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and check the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when `path` is given but missing, when a layer
    /// cannot be parsed, or when values are out of range.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            if !p.is_file() {
                bail!("Config file not found: {}", p.display());
            }
        }

        let config: Self = Self::figment(path)
            .extract()
            .context("Invalid configuration")?;
        config.check()?;
        log::debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// Validation options with the configured recheck interval applied.
    #[must_use]
    pub fn validation_options(&self) -> ValidationOptions {
        self.validation.with_recheck_interval(self.recheck_interval_days)
    }

    fn check(&self) -> Result<()> {
        if !self.hash_type.is_defined() {
            bail!("hash_type must be one of: crc32, md5, sha1");
        }
        let backoff = &self.backoff;
        if backoff.max_wait_seconds < backoff.min_wait_seconds {
            bail!(
                "backoff.max_wait_seconds ({}) is less than backoff.min_wait_seconds ({})",
                backoff.max_wait_seconds,
                backoff.min_wait_seconds
            );
        }
        let rate = backoff.megabytes_per_extra_second;
        if !rate.is_finite()
            || (rate != 0.0 && rate < BackoffPolicy::MIN_MEGABYTES_PER_EXTRA_SECOND)
        {
            bail!(
                "backoff.megabytes_per_extra_second must be 0 or a finite value of at least {} (got {})",
                BackoffPolicy::MIN_MEGABYTES_PER_EXTRA_SECOND,
                rate
            );
        }
        Ok(())
    }

    /// Default platform-specific configuration path.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "hashsync", "hashsync")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
