//! Recorder configuration (compdb.toml format).

use crate::compile_commands::UpdateMode;
use crate::error::BuildError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default file name of the compilation database.
pub const DEFAULT_DATABASE_NAME: &str = "compile_commands.json";

/// Settings for one recorder run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecorderConfig {
    /// File name of the database inside the output directory.
    pub database_name: String,

    /// How a new record is merged into existing ones.
    pub mode: UpdateMode,

    /// Hold an advisory lock on `<database>.lock` for the whole update.
    pub lock: bool,

    /// Replace the database through a temp file and rename.
    pub atomic_write: bool,

    /// Create the output directory when it does not exist.
    pub create_dirs: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            mode: UpdateMode::Supersede,
            lock: true,
            atomic_write: true,
            create_dirs: false,
        }
    }
}

impl RecorderConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| BuildError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml: &str) -> crate::Result<Self> {
        let config: RecorderConfig = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the database name is a plain file name.
    pub fn validate(&self) -> crate::Result<()> {
        let name = Path::new(&self.database_name);
        if self.database_name.is_empty() || name.file_name() != Some(name.as_os_str()) {
            return Err(BuildError::Validation(format!(
                "database_name must be a plain file name, got {:?}",
                self.database_name
            )));
        }
        Ok(())
    }

    pub fn with_mode(mut self, mode: UpdateMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = name.into();
        self
    }

    pub fn with_lock(mut self, lock: bool) -> Self {
        self.lock = lock;
        self
    }

    pub fn with_atomic_write(mut self, atomic_write: bool) -> Self {
        self.atomic_write = atomic_write;
        self
    }

    pub fn with_create_dirs(mut self, create_dirs: bool) -> Self {
        self.create_dirs = create_dirs;
        self
    }
}
