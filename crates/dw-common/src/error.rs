//! Error types for Docker Watcher.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification matching the watcher's failure taxonomy
//! - Recoverability hints for the watch loop
//!
//! # Taxonomy
//!
//! - **Query** failures (the runtime cannot be reached, a list or inspect
//!   call fails) abort the current pass. The next pass retries.
//! - **Removal** failures are local to one item and never abort a batch.
//! - **Data** errors (unparsable timestamps, missing fields) mean "age
//!   unknown" and resolve toward keeping the record.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration and argument errors.
    Config,
    /// Runtime connectivity and inventory query errors.
    Query,
    /// Removal command errors.
    Removal,
    /// Malformed runtime data.
    Data,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Query => write!(f, "query"),
            ErrorCategory::Removal => write!(f, "removal"),
            ErrorCategory::Data => write!(f, "data"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for Docker Watcher.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    // Query errors (20-29)
    #[error("runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    #[error("inventory query failed: {0}")]
    Query(String),

    #[error("runtime call timed out after {seconds}s: {command}")]
    Timeout { command: String, seconds: u64 },

    // Removal errors (30-39)
    #[error("failed to remove {kind} {id}: {message}")]
    RemovalFailed {
        kind: String,
        id: String,
        message: String,
    },

    // Data errors (40-49)
    #[error("malformed {field} on {id}: {value}")]
    MalformedData {
        id: String,
        field: String,
        value: String,
    },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Query errors
    /// - 30-39: Removal errors
    /// - 40-49: Data errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidValue { .. } => 11,
            Error::RuntimeUnavailable(_) => 20,
            Error::Query(_) => 21,
            Error::Timeout { .. } => 22,
            Error::RemovalFailed { .. } => 30,
            Error::MalformedData { .. } => 40,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidValue { .. } => ErrorCategory::Config,
            Error::RuntimeUnavailable(_) | Error::Query(_) | Error::Timeout { .. } => {
                ErrorCategory::Query
            }
            Error::RemovalFailed { .. } => ErrorCategory::Removal,
            Error::MalformedData { .. } => ErrorCategory::Data,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Whether waiting for the next pass may resolve the error.
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Config errors need an operator to fix the config
            Error::Config(_) | Error::InvalidValue { .. } => false,

            // Daemon restarts, network blips, slow calls
            Error::RuntimeUnavailable(_) => true,
            Error::Query(_) => true,
            Error::Timeout { .. } => true,

            // The item is retried on the next pass
            Error::RemovalFailed { .. } => true,

            // Treated as "age unknown", never fatal
            Error::MalformedData { .. } => true,

            Error::Io(_) => true,
            Error::Json(_) => false,
        }
    }
}
