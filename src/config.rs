//! Configuration system for xload.
//!
//! Layered configuration from multiple sources:
//!
//! 1. **Compiled defaults**
//! 2. **User config file** - `~/.config/xload/config.toml`
//! 3. **Environment variables** - `XLOAD_*` prefix
//! 4. **CLI arguments** - highest priority, always wins
//!
//! # Example Configuration File
//!
//! ```toml
//! [paths]
//! db = "~/.local/share/xload/xload.db"
//!
//! [load]
//! print_every = 1000
//!
//! [output]
//! colors = true
//! quiet = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Main configuration structure for xload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path-related configuration.
    pub paths: PathsConfig,
    /// Load behavior configuration.
    pub load: LoadConfig,
    /// Output formatting configuration.
    pub output: OutputConfig,
}

/// Path configuration for the database location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Path to the `SQLite` database file.
    /// Environment variable: `XLOAD_DB`
    pub db: Option<PathBuf>,
}

/// Load behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Emit a progress line every N records.
    /// Environment variable: `XLOAD_PRINT_EVERY`
    pub print_every: u64,
}

/// Output formatting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Enable colored output.
    pub colors: bool,

    /// Suppress non-essential output (progress bars, etc.).
    pub quiet: bool,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self { print_every: 1000 }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            colors: true,
            quiet: false,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. User config file (`~/.config/xload/config.toml`)
    /// 3. Compiled defaults
    #[must_use]
    pub fn load() -> Self {
        let mut config = Self::config_file_path()
            .filter(|p| p.exists())
            .and_then(|path| match std::fs::read_to_string(&path) {
                Ok(content) => Self::parse(&content, &path),
                Err(e) => {
                    warn!("Could not read config file {}: {e}", path.display());
                    None
                }
            })
            .unwrap_or_default();

        config.apply_env();
        config
    }

    /// Default location of the user config file.
    #[must_use]
    pub fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("xload").join("config.toml"))
    }

    fn parse(content: &str, path: &std::path::Path) -> Option<Self> {
        match toml::from_str(content) {
            Ok(config) => {
                debug!("Loaded config from {}", path.display());
                Some(config)
            }
            Err(e) => {
                warn!("Invalid config file {}: {e}", path.display());
                None
            }
        }
    }

    fn apply_env(&mut self) {
        if let Ok(db) = std::env::var("XLOAD_DB") {
            self.paths.db = Some(PathBuf::from(db));
        }
        if let Ok(value) = std::env::var("XLOAD_PRINT_EVERY") {
            match value.parse() {
                Ok(n) => self.load.print_every = n,
                Err(_) => warn!("Ignoring non-numeric XLOAD_PRINT_EVERY: {value}"),
            }
        }
    }
}
