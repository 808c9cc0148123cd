//! Custom error types for xload.
//!
//! Distinguishes the per-line failures that the batch driver skips from
//! the per-record failures that abort one record's transaction.

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for xload operations.
#[derive(Error, Debug)]
pub enum LoadError {
    // =========================================================================
    // Input Errors
    // =========================================================================
    /// A line could not be decoded into a post record. The line is
    /// skipped; the rest of the batch continues.
    #[error("Failed to decode record: {reason}")]
    Decode { reason: String },

    /// Input archive not found at the specified path.
    #[error("Input not found at '{path}'")]
    InputNotFound { path: PathBuf },

    /// Archive exists but cannot be read as a zip file.
    #[error("Failed to read archive '{path}': {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// A natural-key resolution produced neither an insert nor a lookup
    /// hit after a retry. Aborts the containing record's transaction.
    #[error("Could not resolve link row for url '{url}'")]
    Resolution { url: String },

    /// A storage-level integrity violation or other database failure.
    /// Aborts the containing record's transaction.
    #[error("Database error: {0}")]
    Constraint(#[from] rusqlite::Error),

    // =========================================================================
    // IO / Configuration Errors
    // =========================================================================
    /// File read/write error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file parsing error.
    #[error("Invalid configuration in '{path}': {reason}")]
    Config { path: PathBuf, reason: String },
}

/// Result type alias for xload operations.
pub type Result<T> = std::result::Result<T, LoadError>;

impl LoadError {
    /// Create a decode error.
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    /// Create a resolution error.
    pub fn resolution(url: impl Into<String>) -> Self {
        Self::Resolution { url: url.into() }
    }

    /// Create an input-not-found error.
    pub fn input_not_found(path: impl Into<PathBuf>) -> Self {
        Self::InputNotFound { path: path.into() }
    }

    /// True when the error only invalidates a single input line, not
    /// the batch.
    #[must_use]
    pub const fn is_line_local(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}
