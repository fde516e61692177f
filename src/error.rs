//! Error types for sbom-convert
//!
//! This module provides the error handling for the library, including:
//! - Domain-specific error types (Download, Conversion, Database)
//! - Stable machine-readable error codes
//! - The structured descriptor persisted on failed jobs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for sbom-convert operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for sbom-convert
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
        /// The configuration key that caused the error (e.g., "converter.binary_path")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Artifact download failed
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// SBOM conversion failed
    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// Task dispatch failed (queue closed, worker pool gone)
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// The submitted URL is empty or cannot be fetched over HTTP(S)
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Job not found
    #[error("job not found: {0}")]
    NotFound(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// External tool execution failed (cannot be launched)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, not implemented, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),
}

/// Artifact download errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The server answered with a status outside the accepted set
    #[error("unexpected HTTP status {status} fetching {url}")]
    UnexpectedStatus {
        /// The requested URL
        url: String,
        /// The HTTP status code that was returned
        status: u16,
    },

    /// The transfer did not finish within the configured deadline
    #[error("download of {url} timed out after {timeout:?}")]
    Timeout {
        /// The requested URL
        url: String,
        /// The deadline that was exceeded
        timeout: Duration,
    },

    /// The body exceeded the configured size limit
    #[error("artifact at {url} exceeds the {limit} byte limit")]
    TooLarge {
        /// The requested URL
        url: String,
        /// The configured limit in bytes
        limit: u64,
    },

    /// No usable file name can be derived from the URL path
    #[error("cannot derive an artifact file name from {url}")]
    InvalidFileName {
        /// The requested URL
        url: String,
    },
}

/// SBOM conversion errors
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The converter exited with a non-zero status
    #[error("converter failed producing {format} (exit code {code:?}): {stderr}")]
    ExitFailure {
        /// Requested output format
        format: String,
        /// Process exit code, `None` when terminated by a signal
        code: Option<i32>,
        /// Trimmed standard error of the converter
        stderr: String,
    },

    /// The converter did not exit within the configured deadline
    #[error("converter timed out after {timeout:?}")]
    Timeout {
        /// The deadline that was exceeded
        timeout: Duration,
    },

    /// The requested output format is not one the converter produces
    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),

    /// The converter succeeded but its output cannot be used
    #[error("invalid {format} output from converter: {reason}")]
    InvalidOutput {
        /// Requested output format
        format: String,
        /// Why the output was rejected
        reason: String,
    },

    /// The artifact handed to the converter does not exist
    #[error("artifact not found at {path}")]
    ArtifactMissing {
        /// The expected artifact path
        path: PathBuf,
    },
}

impl Error {
    /// Machine-readable error code, stable across releases
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) => "database_error",
            Error::Sqlx(_) => "database_error",
            Error::Download(e) => match e {
                DownloadError::UnexpectedStatus { .. } => "fetch_failed",
                DownloadError::Timeout { .. } => "download_timeout",
                DownloadError::TooLarge { .. } => "artifact_too_large",
                DownloadError::InvalidFileName { .. } => "invalid_file_name",
            },
            Error::Conversion(e) => match e {
                ConversionError::ExitFailure { .. } => "conversion_failed",
                ConversionError::Timeout { .. } => "conversion_timeout",
                ConversionError::UnsupportedFormat(_) => "unsupported_format",
                ConversionError::InvalidOutput { .. } => "invalid_output",
                ConversionError::ArtifactMissing { .. } => "artifact_missing",
            },
            Error::Dispatch(_) => "dispatch_error",
            Error::InvalidUrl(_) => "invalid_url",
            Error::NotFound(_) => "not_found",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ShuttingDown => "shutting_down",
            Error::ExternalTool(_) => "external_tool_error",
            Error::NotSupported(_) => "not_supported",
            Error::Other(_) => "internal_error",
        }
    }

    /// Whether the error is a deadline expiry (download or conversion)
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Download(DownloadError::Timeout { .. }) => true,
            Error::Conversion(ConversionError::Timeout { .. }) => true,
            Error::Network(e) => e.is_timeout(),
            _ => false,
        }
    }
}

/// Failure payload persisted in a job's `results` column
///
/// # Example JSON
///
/// ```json
/// {
///   "error": "download error: unexpected HTTP status 404 fetching https://example.com/a.zip",
///   "code": "fetch_failed"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    /// Human-readable description, never empty
    pub error: String,
    /// Machine-readable error code
    pub code: String,
}

impl ErrorDescriptor {
    /// Create a descriptor from a code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            error: if message.trim().is_empty() {
                "unknown error".to_string()
            } else {
                message
            },
            code: code.into(),
        }
    }

    /// Serialize into the JSON value stored on the job
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.error,
            "code": self.code,
        })
    }
}

impl From<&Error> for ErrorDescriptor {
    fn from(error: &Error) -> Self {
        ErrorDescriptor::new(error.error_code(), error.to_string())
    }
}
