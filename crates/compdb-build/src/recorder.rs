//! Records one compiler invocation into an output directory's database.

use crate::compile_commands::{CompileRecord, UpdateOutcome};
use crate::config::RecorderConfig;
use crate::store::DatabaseStore;
use std::path::{Path, PathBuf};

/// A compiler invocation as handed over by the build system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Directory the compiler runs in.
    pub build_directory: String,
    /// Directory holding the shared database.
    pub output_directory: PathBuf,
    /// Source file being compiled.
    pub file: String,
    /// Compiler command line.
    pub args: Vec<String>,
}

impl Invocation {
    pub fn to_record(&self) -> CompileRecord {
        CompileRecord::from_invocation(&self.file, &self.build_directory, &self.args)
    }
}

/// Compile command recorder.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    config: RecorderConfig,
}

impl Recorder {
    pub fn new(config: RecorderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Location of the database for `output_dir`.
    pub fn database_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(&self.config.database_name)
    }

    /// Store for the database in `output_dir`.
    pub fn store(&self, output_dir: &Path) -> DatabaseStore {
        DatabaseStore::new(self.database_path(output_dir), self.config.clone())
    }

    /// Merge `record` into the database in `output_dir`.
    pub fn record(&self, output_dir: &Path, record: CompileRecord) -> crate::Result<UpdateOutcome> {
        self.config.validate()?;
        self.store(output_dir).update(record)
    }

    /// Record a full invocation.
    pub fn record_invocation(&self, invocation: &Invocation) -> crate::Result<UpdateOutcome> {
        self.record(&invocation.output_directory, invocation.to_record())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile_commands::UpdateMode;
    use crate::error::BuildError;

    fn invocation(out: &Path, file: &str, args: &[&str]) -> Invocation {
        Invocation {
            build_directory: "/build".to_string(),
            output_directory: out.to_path_buf(),
            file: file.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_database_path() {
        let recorder = Recorder::default();
        assert_eq!(
            recorder.database_path(Path::new("/out")),
            PathBuf::from("/out/compile_commands.json")
        );

        let recorder = Recorder::new(RecorderConfig::default().with_database_name("db.json"));
        assert_eq!(recorder.database_path(Path::new("/out")), PathBuf::from("/out/db.json"));
    }

    #[test]
    fn test_record_invocation() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::default();

        let outcome = recorder
            .record_invocation(&invocation(dir.path(), "main.c", &["gcc", "-c", "main.c"]))
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Added);

        let db = recorder.store(dir.path()).load().unwrap().into_database();
        let records: Vec<_> = db.records().cloned().collect();
        assert_eq!(records, vec![CompileRecord::new("main.c", "/build", "gcc -c main.c")]);
    }

    #[test]
    fn test_append_mode_records_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(RecorderConfig::default().with_mode(UpdateMode::Append));
        let inv = invocation(dir.path(), "main.c", &["gcc", "-c", "main.c"]);

        recorder.record_invocation(&inv).unwrap();
        recorder.record_invocation(&inv).unwrap();

        let db = recorder.store(dir.path()).load().unwrap().into_database();
        assert_eq!(db.len(), 2);
    }

    #[test]
    fn test_invalid_database_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(RecorderConfig::default().with_database_name("../escape.json"));

        let err = recorder
            .record_invocation(&invocation(dir.path(), "main.c", &["gcc"]))
            .unwrap_err();
        assert!(matches!(err, BuildError::Validation(_)));
    }
}
