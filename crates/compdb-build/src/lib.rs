//! compile_commands.json maintenance for build systems.
//!
//! This crate provides:
//! - The compilation database model and its merge rules
//! - Locked, atomic updates of the database file
//! - Recorder configuration (`compdb.toml`)
//!
//! # Example
//!
//! ```toml
//! # compdb.toml
//! database_name = "compile_commands.json"
//! mode = "supersede"
//! lock = true
//! atomic_write = true
//! create_dirs = false
//! ```

mod compile_commands;
mod config;
mod error;
mod recorder;
mod store;

pub use compile_commands::{CompileDatabase, CompileRecord, Entry, UpdateMode, UpdateOutcome};
pub use config::{RecorderConfig, DEFAULT_DATABASE_NAME};
pub use error::{BuildError, Result};
pub use recorder::{Invocation, Recorder};
pub use store::{DatabaseStore, Loaded};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documented_config() {
        let toml = r#"
database_name = "compile_commands.json"
mode = "supersede"
lock = true
atomic_write = true
create_dirs = false
        "#;

        let config = RecorderConfig::from_toml(toml).expect("Failed to parse config");
        assert_eq!(config, RecorderConfig::default());
    }
}
