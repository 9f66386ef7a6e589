//! Error types for compdb-build.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for compdb-build operations.
pub type Result<T> = std::result::Result<T, BuildError>;

/// Errors that can occur while maintaining a compilation database.
#[derive(Error, Debug)]
pub enum BuildError {
    /// The database exists but could not be read.
    #[error("Failed to read database {path}: {source}")]
    ReadDatabase {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The database could not be written.
    #[error("Failed to write database {path}: {source}")]
    WriteDatabase {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The lock file could not be opened or locked.
    #[error("Failed to lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to read configuration file.
    #[error("Failed to read config file {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML configuration.
    #[error("Failed to parse TOML config: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// Failed to parse or serialize JSON (compile_commands.json).
    #[error("Failed to parse JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    /// Configuration validation error.
    #[error("Config validation error: {0}")]
    Validation(String),
}
