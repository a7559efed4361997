//! hashsync - hash-validated file sync into a local cache
//!
//! Copies files from shared storage into a local directory and keeps them
//! honest with `.hashcheck` sidecars. A cached copy is reused while it still
//! matches; when it does not, processes sharing the cache back off with
//! jitter before re-copying so a corrupted entry is not repaired by all of
//! them at once.

pub mod cli;
pub mod config;
pub mod error;
pub mod hashing;
pub mod logging;
pub mod notify;
pub mod progress;
pub mod sync;
pub mod transfer;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cli::{Cli, Commands, CopyArgs, HashArgs, TouchArgs, ValidateArgs};
use crate::config::Config;
use crate::error::ExitCode;
use crate::hashing::{FileHashProvider, HashProvider, HashRecord};
use crate::notify::{LogNotifier, Notifier};
use crate::progress::{Progress, ProgressCallback};
use crate::sync::{try_update_last_used, FileSync, SyncError, ValidationOptions, Validator};
use crate::transfer::LocalFileTransfer;

/// Run the parsed command line.
///
/// Initializes logging, loads the configuration and dispatches the
/// subcommand.
///
/// # Errors
///
/// Returns configuration errors, or the [`SyncError`] of a failed command
/// (use [`ExitCode::for_error`] to classify it).
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let config = Config::load(cli.config.as_deref())?;
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);

    match cli.command {
        Commands::Copy(args) => run_copy(&args, &config, notifier, cli.quiet),
        Commands::Validate(args) => run_validate(&args, &config, notifier),
        Commands::Hash(args) => run_hash(&args, &config, notifier.as_ref()),
        Commands::Touch(args) => run_touch(&args),
    }
}

fn run_copy(
    args: &CopyArgs,
    config: &Config,
    notifier: Arc<dyn Notifier>,
    quiet: bool,
) -> Result<ExitCode> {
    let recheck_days = args.recheck_days.unwrap_or(config.recheck_interval_days);
    let hash_type = args.hash_type.unwrap_or(config.hash_type);

    let mut transfer = LocalFileTransfer::new();
    let mut progress: Option<Arc<dyn ProgressCallback>> = None;
    if config.progress && !quiet {
        let callback: Arc<dyn ProgressCallback> = Arc::new(Progress::new(false));
        transfer = transfer.with_progress_callback(Arc::clone(&callback));
        progress = Some(callback);
    }

    let mut file_sync = FileSync::new(
        Arc::new(transfer),
        Arc::new(FileHashProvider::new()),
        notifier,
    )
    .with_backoff(config.backoff);
    if let Some(callback) = progress {
        file_sync = file_sync.with_progress_callback(callback);
    }

    log::debug!(
        "Syncing {} into {} (recheck every {} days, {})",
        args.source.display(),
        args.target_dir.display(),
        recheck_days,
        hash_type
    );
    let local =
        file_sync.copy_file_to_local(&args.source, &args.target_dir, recheck_days, hash_type)?;
    println!("{}", local.display());
    Ok(ExitCode::Success)
}

fn run_validate(
    args: &ValidateArgs,
    config: &Config,
    notifier: Arc<dyn Notifier>,
) -> Result<ExitCode> {
    let options = validate_options(args, config);
    let hash_type = args.hash_type.unwrap_or(config.hash_type);
    let validator = Validator::new(Arc::new(FileHashProvider::new()), notifier);

    if args.require_hashcheck {
        validator.validate_existing(&args.path, args.hashcheck.as_deref(), &options, hash_type)?;
    } else {
        let expected = args
            .expected_hash
            .as_ref()
            .map_or_else(HashRecord::default, |h| HashRecord::expecting(h.as_str(), hash_type));
        match &args.hashcheck {
            Some(hashcheck) => {
                validator.validate_with_hashcheck(&args.path, hashcheck, &expected, &options)?;
            }
            None => validator.validate(&args.path, &expected, &options)?,
        }
    }

    println!("{}: OK", args.path.display());
    Ok(ExitCode::Success)
}

/// Configured validation options with the command-line switches applied on top.
fn validate_options(args: &ValidateArgs, config: &Config) -> ValidationOptions {
    let mut options = config.validation_options();
    if let Some(days) = args.recheck_days {
        options = options.with_recheck_interval(days);
    }
    options.check_date &= !args.no_date;
    options.compute_hash &= !args.no_hash;
    options.check_size &= !args.no_size;
    options
}

fn run_hash(args: &HashArgs, config: &Config, notifier: &dyn Notifier) -> Result<ExitCode> {
    let hash_type = args.hash_type.unwrap_or(config.hash_type);
    let created = FileHashProvider::new()
        .create_hash_record(&args.path, hash_type)
        .map_err(|e| SyncError::hash(&args.path, e))?;
    if let Some(warning) = &created.warning {
        notifier.warning(warning);
    }

    println!("{}  {}", created.hash_value, args.path.display());
    Ok(ExitCode::Success)
}

fn run_touch(args: &TouchArgs) -> Result<ExitCode> {
    if !args.path.is_file() {
        return Err(SyncError::NotFound(args.path.clone()).into());
    }
    let sidecar = try_update_last_used(&args.path)
        .with_context(|| format!("Unable to update last-used time of {}", args.path.display()))?;
    log::debug!("Updated {}", sidecar.display());
    Ok(ExitCode::Success)
}
