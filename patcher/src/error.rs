//! Error types for the assisted patching workflow.
//!
//! Only failures that stop a command outright live here. Per-asset download
//! failures, verification failures, patch failures and probe failures are
//! recorded in the run report instead of being raised.

use camino::Utf8PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that abort a command.
#[derive(Debug, Error)]
pub enum PatcherError {
    /// The configuration file named on the command line does not exist.
    #[error("configuration file {path} not found")]
    ConfigNotFound {
        /// Path that was requested.
        path: Utf8PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("invalid configuration in {path}: {reason}")]
    InvalidConfig {
        /// Path of the offending file.
        path: Utf8PathBuf,
        /// Description of the parse error.
        reason: String,
    },

    /// A path handed to the tool is not valid UTF-8.
    #[error("path is not valid UTF-8: {path}")]
    NonUtf8Path {
        /// Lossy rendering of the rejected path.
        path: String,
    },

    /// An external command did not finish within its time limit.
    #[error("{program} timed out after {limit:?}")]
    CommandTimedOut {
        /// Program that was killed.
        program: String,
        /// The limit that was exceeded.
        limit: Duration,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The artifact store could not be scanned.
    #[error("failed to scan artifact store {path}")]
    ScanFailed {
        /// Store root that was being scanned.
        path: Utf8PathBuf,
        /// The underlying error that caused the scan to fail.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write output.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },

    /// A report could not be serialised.
    #[error("failed to serialise report")]
    SerializeFailed {
        /// The underlying serialisation error.
        #[source]
        source: serde_json::Error,
    },

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

/// Result type alias using [`PatcherError`].
pub type Result<T> = std::result::Result<T, PatcherError>;
