//! xload - normalized loader for X/Twitter streaming archives
//!
//! This library turns batches of newline-delimited JSON post records
//! into rows in a normalized `SQLite` schema, under idempotency and
//! referential-integrity guarantees.
//!
//! # Modules
//!
//! - [`archive`] - Input enumeration and decompression
//! - [`cli`] - Command-line interface definitions
//! - [`config`] - Layered TOML configuration
//! - [`error`] - Custom error types
//! - [`geo`] - Geometry normalization
//! - [`loader`] - Transactional upsert coordinator
//! - [`model`] - Canonical record models
//! - [`normalize`] - Raw record to canonical record reduction
//! - [`sanitize`] - Text sanitization for storage
//! - [`storage`] - `SQLite` storage layer

pub mod archive;
pub mod cli;
pub mod config;
pub mod error;
pub mod geo;
pub mod loader;
pub mod model;
pub mod normalize;
pub mod sanitize;
pub mod storage;

pub use cli::*;
pub use error::{LoadError, Result};
pub use loader::{load_lines, load_record, LoadOutcome, LoadStats};
pub use model::*;
pub use normalize::normalize;
pub use storage::Storage;

/// Default database filename
pub const DEFAULT_DB_NAME: &str = "xload.db";

/// Get the default data directory for xload
#[must_use]
pub fn default_data_dir() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("xload")
}

/// Get the default database path
#[must_use]
pub fn default_db_path() -> std::path::PathBuf {
    default_data_dir().join(DEFAULT_DB_NAME)
}
