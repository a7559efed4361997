//! Structured error handling and exit codes.

use serde::Serialize;

use crate::sync::{ErrorKind, SyncError};

/// Exit codes for the hashsync binary.
///
/// - 0: Success (file copied, validated or hashed)
/// - 1: General error (unexpected failure, bad configuration, transfer failure)
/// - 2: Validation failed (hash, size or date mismatch)
/// - 3: Not found (source, local file or required `.hashcheck` missing)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: the command completed.
    Success = 0,
    /// General error: an unexpected error occurred.
    GeneralError = 1,
    /// Validation failed: the file does not match its expected state.
    ValidationFailed = 2,
    /// Not found: a required file does not exist.
    NotFound = 3,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "HS000",
            Self::GeneralError => "HS001",
            Self::ValidationFailed => "HS002",
            Self::NotFound => "HS003",
        }
    }

    /// Exit code for a failed sync or validation.
    #[must_use]
    pub fn for_sync_error(err: &SyncError) -> Self {
        match err.kind() {
            ErrorKind::NotFound => Self::NotFound,
            ErrorKind::HashMismatch
            | ErrorKind::SizeMismatch
            | ErrorKind::DateMismatch
            | ErrorKind::UndefinedHashType => Self::ValidationFailed,
            ErrorKind::TransientIo | ErrorKind::TransferFailed | ErrorKind::Unhandled => {
                Self::GeneralError
            }
        }
    }

    /// Exit code for any error surfaced by [`run_app`](crate::run_app).
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        err.downcast_ref::<SyncError>()
            .map_or(Self::GeneralError, Self::for_sync_error)
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "HS002")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Error classification when the failure came from the sync core
    pub kind: Option<String>,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            kind: err
                .downcast_ref::<SyncError>()
                .map(|e| format!("{:?}", e.kind())),
        }
    }
}
