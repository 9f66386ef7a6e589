//! compile_commands.json records and the in-memory database.
//!
//! The database is a flat JSON array. Records written here always use the
//! `command` string form. Entries already on disk are kept as the JSON values
//! they were read as, so extra keys, key order and entries this model does not
//! understand (array-form `arguments`, missing fields, non-objects) all
//! survive a rewrite. Only the `file`, `directory` and `command` strings are
//! looked at for matching.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// A single entry of compile_commands.json.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileRecord {
    /// The source file path, stored verbatim.
    pub file: String,

    /// The working directory for compilation.
    pub directory: String,

    /// The full compilation command (space-separated).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// The compilation arguments (array form).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<String>>,

    /// Output file (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl CompileRecord {
    pub fn new(
        file: impl Into<String>,
        directory: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            directory: directory.into(),
            command: Some(command.into()),
            arguments: None,
            output: None,
        }
    }

    /// Build a record from a compiler invocation.
    ///
    /// The arguments are joined with single spaces and nothing is quoted, so
    /// an argument containing a space cannot be told apart afterwards.
    pub fn from_invocation<I, S>(file: impl Into<String>, directory: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let command = args
            .into_iter()
            .map(|arg| arg.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(" ");
        Self::new(file, directory, command)
    }

    /// Whether both records describe the same `(file, directory)` pair.
    pub fn is_same_entry(&self, other: &CompileRecord) -> bool {
        self.file == other.file && self.directory == other.directory
    }

    /// Whether both records describe the same pair with the same command.
    pub fn is_identical(&self, other: &CompileRecord) -> bool {
        self.is_same_entry(other) && self.command.is_some() && self.command == other.command
    }

    /// Get the compilation arguments as a vector.
    pub fn args(&self) -> Vec<String> {
        if let Some(args) = &self.arguments {
            args.clone()
        } else if let Some(cmd) = &self.command {
            cmd.split_whitespace().map(|s| s.to_string()).collect()
        } else {
            Vec::new()
        }
    }

    /// JSON object with the keys in `file`, `directory`, `command` order.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("file".to_string(), Value::String(self.file.clone()));
        map.insert("directory".to_string(), Value::String(self.directory.clone()));
        if let Some(command) = &self.command {
            map.insert("command".to_string(), Value::String(command.clone()));
        }
        if let Some(arguments) = &self.arguments {
            let arguments = arguments.iter().cloned().map(Value::String).collect();
            map.insert("arguments".to_string(), Value::Array(arguments));
        }
        if let Some(output) = &self.output {
            map.insert("output".to_string(), Value::String(output.clone()));
        }
        Value::Object(map)
    }
}

/// One element of the database array, kept as it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    value: Value,
    record: Option<CompileRecord>,
}

impl Entry {
    pub fn from_value(value: Value) -> Self {
        let record = CompileRecord::deserialize(&value).ok();
        Self { value, record }
    }

    pub fn from_record(record: CompileRecord) -> Self {
        Self {
            value: record.to_value(),
            record: Some(record),
        }
    }

    /// The raw JSON value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Typed view, when the entry has string `file` and `directory` and
    /// otherwise well-typed known fields.
    pub fn record(&self) -> Option<&CompileRecord> {
        self.record.as_ref()
    }

    pub fn file(&self) -> Option<&str> {
        self.str_field("file")
    }

    pub fn directory(&self) -> Option<&str> {
        self.str_field("directory")
    }

    pub fn command(&self) -> Option<&str> {
        self.str_field("command")
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(Value::as_str)
    }

    /// Whether this entry is for the same `(file, directory)` pair as `record`.
    pub fn is_same_entry(&self, record: &CompileRecord) -> bool {
        self.file() == Some(record.file.as_str())
            && self.directory() == Some(record.directory.as_str())
    }

    /// Whether this entry already holds exactly `record`'s command.
    pub fn is_identical(&self, record: &CompileRecord) -> bool {
        self.is_same_entry(record)
            && record.command.is_some()
            && self.command() == record.command.as_deref()
    }
}

impl Serialize for Entry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

/// How a new record is merged into the database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    /// Replace older records for the same `(file, directory)` pair and skip
    /// the update entirely when the record is already present.
    #[default]
    Supersede,
    /// Always append, accumulating duplicates.
    Append,
}

/// What an update did to the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The exact record was already present; nothing changed.
    Unchanged,
    /// The record was appended and nothing was removed.
    Added,
    /// The record was appended after dropping stale records for the pair.
    Superseded { removed: usize },
}

impl UpdateOutcome {
    /// Whether the database must be written back.
    pub fn is_changed(self) -> bool {
        self != UpdateOutcome::Unchanged
    }
}

/// Ordered collection of compile_commands.json entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileDatabase {
    entries: Vec<Entry>,
}

impl CompileDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a database from a JSON string.
    ///
    /// Fails only when the input is not JSON or not an array; elements of
    /// any shape are accepted.
    pub fn from_str(json: &str) -> crate::Result<Self> {
        let values: Vec<Value> = serde_json::from_str(json)?;
        Ok(Self {
            entries: values.into_iter().map(Entry::from_value).collect(),
        })
    }

    /// Serialize as a JSON array with 2-space indentation and no trailing newline.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Entries that fit the record model, in insertion order.
    pub fn records(&self) -> impl Iterator<Item = &CompileRecord> {
        self.entries.iter().filter_map(Entry::record)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the first entry for a `(file, directory)` pair.
    pub fn find(&self, file: &str, directory: &str) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|entry| entry.file() == Some(file) && entry.directory() == Some(directory))
    }

    /// Merge `record` into the database.
    pub fn apply(&mut self, record: CompileRecord, mode: UpdateMode) -> UpdateOutcome {
        match mode {
            UpdateMode::Append => {
                self.entries.push(Entry::from_record(record));
                UpdateOutcome::Added
            }
            UpdateMode::Supersede => {
                if self.entries.iter().any(|entry| entry.is_identical(&record)) {
                    return UpdateOutcome::Unchanged;
                }

                let before = self.entries.len();
                self.entries.retain(|entry| !entry.is_same_entry(&record));
                let removed = before - self.entries.len();
                self.entries.push(Entry::from_record(record));

                if removed == 0 {
                    UpdateOutcome::Added
                } else {
                    UpdateOutcome::Superseded { removed }
                }
            }
        }
    }
}

impl From<Vec<CompileRecord>> for CompileDatabase {
    fn from(records: Vec<CompileRecord>) -> Self {
        Self {
            entries: records.into_iter().map(Entry::from_record).collect(),
        }
    }
}
