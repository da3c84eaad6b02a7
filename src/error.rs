//! Error types for media-dl
//!
//! This module provides the error taxonomy for the library:
//! - Input validation failures surfaced to the caller before admission or start
//! - Download/queue errors carrying the item and path involved
//! - Fetch errors describing why the external extraction tool failed
//!
//! Fetch errors never reach the coordinator as values. Workers convert them to
//! the item's `last_error` string at the worker boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "pause_poll_interval")
        key: Option<String>,
    },

    /// Malformed or unsupported input (URL, quality selection, destination)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Download/queue related error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// External fetch tool error
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Shutdown in progress - not accepting new items
    #[error("shutdown in progress: not accepting new downloads")]
    ShuttingDown,

    /// Operation not supported (missing binary, not implemented, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),
}

/// Download-related errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Destination directory cannot receive the download
    #[error("invalid destination {path}: {reason}")]
    InvalidDestination {
        /// The destination directory that was rejected
        path: PathBuf,
        /// Why it was rejected (missing, not a directory, read-only)
        reason: String,
    },

    /// The fetch reported success but no output file could be located
    #[error("no output file found for template {template}")]
    OutputNotFound {
        /// The output template that was handed to the fetcher
        template: PathBuf,
    },
}

/// Errors raised by a [`MediaFetcher`](crate::fetcher::MediaFetcher) implementation
#[derive(Debug, Error)]
pub enum FetchError {
    /// The external tool could not be launched
    #[error("failed to launch {tool}: {reason}")]
    Spawn {
        /// Tool name or path
        tool: String,
        /// Underlying OS error message
        reason: String,
    },

    /// The external tool ran but exited unsuccessfully
    #[error("{tool} exited with status {code:?}: {stderr}")]
    Exited {
        /// Tool name or path
        tool: String,
        /// Exit code, if the process was not killed by a signal
        code: Option<i32>,
        /// Last lines of the tool's stderr
        stderr: String,
    },

    /// The progress hook asked the fetch to stop (cancellation)
    #[error("fetch aborted")]
    Aborted,

    /// The tool's output could not be understood
    #[error("unexpected output: {0}")]
    Parse(String),
}

impl Error {
    /// Machine-readable error code, stable across releases
    ///
    /// Suitable for UI layers that want to branch on the kind of failure without
    /// matching the full enum.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::InvalidInput(_) => "invalid_input",
            Error::Download(e) => match e {
                DownloadError::InvalidDestination { .. } => "invalid_destination",
                DownloadError::OutputNotFound { .. } => "output_not_found",
            },
            Error::Fetch(e) => match e {
                FetchError::Spawn { .. } => "fetch_spawn_failed",
                FetchError::Exited { .. } => "fetch_failed",
                FetchError::Aborted => "fetch_aborted",
                FetchError::Parse(_) => "fetch_parse_error",
            },
            Error::Io(_) => "io_error",
            Error::ShuttingDown => "shutting_down",
            Error::NotSupported(_) => "not_supported",
        }
    }

    /// Whether this error represents a cooperative abort rather than a failure
    pub fn is_aborted(&self) -> bool {
        matches!(self, Error::Fetch(FetchError::Aborted))
    }
}
