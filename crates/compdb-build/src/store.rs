//! On-disk compile_commands.json with locked read-modify-write updates.
//!
//! Build systems run one recorder per compiled file, often in parallel, all
//! targeting the same database. An update therefore holds an exclusive
//! advisory lock on `<database>.lock` while it reads, merges and rewrites the
//! file, and the rewrite goes through a temp file in the same directory that
//! is renamed over the database, so readers never see a truncated array.

use crate::compile_commands::{CompileDatabase, CompileRecord, UpdateOutcome};
use crate::config::RecorderConfig;
use crate::error::BuildError;
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Result of reading a database file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Loaded {
    /// No file at the path yet.
    Missing,
    /// The file exists but is not JSON, or not a JSON array.
    Corrupt(String),
    /// The file parsed.
    Parsed(CompileDatabase),
}

impl Loaded {
    /// The loaded database, or an empty one when missing or corrupt.
    pub fn into_database(self) -> CompileDatabase {
        match self {
            Loaded::Parsed(db) => db,
            Loaded::Missing | Loaded::Corrupt(_) => CompileDatabase::new(),
        }
    }
}

/// A compile_commands.json file at an explicit path.
#[derive(Debug, Clone)]
pub struct DatabaseStore {
    path: PathBuf,
    config: RecorderConfig,
}

impl DatabaseStore {
    pub fn new(path: impl Into<PathBuf>, config: RecorderConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the sibling lock file.
    pub fn lock_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Read the database without locking.
    pub fn load(&self) -> crate::Result<Loaded> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Loaded::Missing),
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Ok(Loaded::Corrupt(e.to_string()))
            }
            Err(source) => {
                return Err(BuildError::ReadDatabase {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        match CompileDatabase::from_str(&content) {
            Ok(db) => Ok(Loaded::Parsed(db)),
            Err(e) => Ok(Loaded::Corrupt(e.to_string())),
        }
    }

    /// Merge `record` into the database file.
    ///
    /// The file is left untouched when the outcome is
    /// [`UpdateOutcome::Unchanged`].
    pub fn update(&self, record: CompileRecord) -> crate::Result<UpdateOutcome> {
        if self.config.create_dirs {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|source| BuildError::WriteDatabase {
                    path: self.path.clone(),
                    source,
                })?;
            }
        }

        let _guard = if self.config.lock {
            Some(LockGuard::acquire(&self.lock_path())?)
        } else {
            None
        };

        let mut db = match self.load()? {
            Loaded::Missing => {
                tracing::debug!(path = %self.path.display(), "no existing database");
                CompileDatabase::new()
            }
            Loaded::Corrupt(reason) => {
                tracing::warn!(
                    path = %self.path.display(),
                    %reason,
                    "existing database is not a valid compile_commands.json, starting from empty"
                );
                CompileDatabase::new()
            }
            Loaded::Parsed(db) => db,
        };

        let file = record.file.clone();
        let outcome = db.apply(record, self.config.mode);
        match outcome {
            UpdateOutcome::Unchanged => {
                tracing::debug!(%file, "record already present, skipping write");
                return Ok(outcome);
            }
            UpdateOutcome::Added => tracing::debug!(%file, "appending record"),
            UpdateOutcome::Superseded { removed } => {
                tracing::debug!(%file, removed, "replacing stale records")
            }
        }

        self.write(&db)?;
        tracing::info!(
            path = %self.path.display(),
            records = db.len(),
            "wrote compilation database"
        );
        Ok(outcome)
    }

    /// Serialize `db` and replace the database file with it.
    pub fn write(&self, db: &CompileDatabase) -> crate::Result<()> {
        let json = db.to_json()?;
        let result = if self.config.atomic_write {
            self.replace_atomically(json.as_bytes())
        } else {
            fs::write(&self.path, json.as_bytes())
        };
        result.map_err(|source| BuildError::WriteDatabase {
            path: self.path.clone(),
            source,
        })
    }

    fn replace_atomically(&self, data: &[u8]) -> std::io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::Builder::new()
            .prefix(".compile_commands")
            .suffix(".tmp")
            .tempfile_in(dir)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;

        // Temp files are created 0600; keep the database readable like a plain write would.
        let permissions = match fs::metadata(&self.path) {
            Ok(meta) => Some(meta.permissions()),
            Err(_) => default_permissions(),
        };
        if let Some(permissions) = permissions {
            tmp.as_file().set_permissions(permissions)?;
        }

        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}

/// Exclusive advisory lock, released on drop.
struct LockGuard {
    file: File,
}

impl LockGuard {
    fn acquire(path: &Path) -> crate::Result<Self> {
        let lock_err = |source| BuildError::Lock {
            path: path.to_path_buf(),
            source,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(lock_err)?;
        file.lock_exclusive().map_err(lock_err)?;
        tracing::trace!(path = %path.display(), "acquired database lock");

        Ok(Self { file })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::trace!(error = %e, "unlock failed, lock is released on close");
        }
    }
}
