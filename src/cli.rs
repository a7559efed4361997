//! Command-line interface definitions for hashsync.
//!
//! This module defines all CLI arguments and subcommands using the clap derive API.
//! Global options (verbosity, config file, JSON errors) apply to every subcommand.
//!
//! # Example
//!
//! ```bash
//! # Copy a shared file into a local cache directory
//! hashsync copy /mnt/share/A.bin /var/cache/models
//!
//! # Trust the local .hashcheck file for a week before re-hashing
//! hashsync copy /mnt/share/A.bin /var/cache/models --recheck-days 7
//!
//! # Validate a file against a known digest
//! hashsync validate ./A.bin --expected-hash 2aae6c35c94fcfb415dbe95f408b9ce91ee846ed
//!
//! # Write or refresh a .hashcheck file
//! hashsync -v hash ./A.bin --hash-type md5
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::hashing::HashType;

/// Hash-validated file sync into a local cache.
///
/// hashsync copies files from shared storage into a local directory, records
/// their digests in `.hashcheck` files, and re-copies only when the local copy
/// no longer matches.
#[derive(Debug, Parser)]
#[command(name = "hashsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (TOML); defaults to the platform config directory
    #[arg(long, value_name = "PATH", global = true, env = "HASHSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Report errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for hashsync.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Copy a file into a local directory unless a valid copy is already there
    Copy(CopyArgs),
    /// Validate a local file against its .hashcheck file or an expected digest
    Validate(ValidateArgs),
    /// Hash a file and write its .hashcheck file
    Hash(HashArgs),
    /// Update the .LastUsed file of a cached file
    Touch(TouchArgs),
}

/// Arguments for the copy subcommand.
#[derive(Debug, Args)]
pub struct CopyArgs {
    /// File on shared storage
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Local cache directory (created if missing)
    #[arg(value_name = "TARGET_DIR")]
    pub target_dir: PathBuf,

    /// Days to trust the local .hashcheck file before re-hashing (0 = always)
    #[arg(long, value_name = "DAYS")]
    pub recheck_days: Option<i32>,

    /// Algorithm for a newly created source .hashcheck file
    #[arg(long, value_name = "TYPE", value_parser = parse_hash_type)]
    pub hash_type: Option<HashType>,
}

/// Arguments for the validate subcommand.
#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Local data file
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Digest the file must have
    #[arg(long, value_name = "HASH")]
    pub expected_hash: Option<String>,

    /// Algorithm of the expected digest, or assumed for a .hashcheck file without one
    #[arg(long, value_name = "TYPE", value_parser = parse_hash_type)]
    pub hash_type: Option<HashType>,

    /// .hashcheck file to validate against instead of <PATH>.hashcheck
    #[arg(long, value_name = "FILE")]
    pub hashcheck: Option<PathBuf>,

    /// Fail when the .hashcheck file is missing instead of creating it
    #[arg(long, conflicts_with = "expected_hash")]
    pub require_hashcheck: bool,

    /// Skip recomputing the digest
    #[arg(long)]
    pub no_hash: bool,

    /// Skip the file size check
    #[arg(long)]
    pub no_size: bool,

    /// Skip the modification date check
    #[arg(long)]
    pub no_date: bool,

    /// Days to trust the .hashcheck file before re-hashing (0 = always)
    #[arg(long, value_name = "DAYS")]
    pub recheck_days: Option<i32>,
}

/// Arguments for the hash subcommand.
#[derive(Debug, Args)]
pub struct HashArgs {
    /// File to hash
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Hash algorithm (crc32, md5, sha1)
    #[arg(long, value_name = "TYPE", value_parser = parse_hash_type)]
    pub hash_type: Option<HashType>,
}

/// Arguments for the touch subcommand.
#[derive(Debug, Args)]
pub struct TouchArgs {
    /// Cached data file
    #[arg(value_name = "PATH")]
    pub path: PathBuf,
}

/// Parse a hash algorithm name, rejecting `undefined`.
///
/// # Errors
///
/// Returns an error message for unknown or undefined algorithms.
pub fn parse_hash_type(s: &str) -> Result<HashType, String> {
    match s.parse::<HashType>() {
        Ok(HashType::Undefined) => Err("hash type must be one of: crc32, md5, sha1".to_string()),
        Ok(t) => Ok(t),
        Err(e) => Err(e.to_string()),
    }
}
