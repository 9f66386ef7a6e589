use clap::{ArgAction, Parser};
use compdb_build::{Invocation, Recorder, RecorderConfig, UpdateMode, UpdateOutcome};
use miette::Result;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter directive.
const LOG_ENV: &str = "COMPDB_LOG";

#[derive(Parser, Debug)]
#[command(name = "compdb")]
#[command(
    author,
    version,
    about = "Record a compiler invocation into compile_commands.json"
)]
struct Cli {
    /// Always append, keeping older records for the same file
    #[arg(long)]
    append: bool,

    /// Database file name inside OUTPUT_DIR
    #[arg(long, value_name = "NAME")]
    database_name: Option<String>,

    /// Do not take the advisory lock on the database
    #[arg(long)]
    no_lock: bool,

    /// Overwrite the database in place instead of renaming a temp file over it
    #[arg(long)]
    no_atomic: bool,

    /// Create OUTPUT_DIR if it does not exist
    #[arg(long)]
    create_dirs: bool,

    /// Recorder configuration file (TOML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Directory the compiler runs in
    #[arg(value_name = "BUILD_DIR")]
    build_directory: String,

    /// Directory holding compile_commands.json
    #[arg(value_name = "OUTPUT_DIR")]
    output_directory: PathBuf,

    /// Source file being compiled
    file: String,

    /// Compiler command line
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

impl Cli {
    /// Configuration file values with command-line flags applied on top.
    fn recorder_config(&self) -> Result<RecorderConfig> {
        let mut config = match &self.config {
            Some(path) => {
                RecorderConfig::from_file(path).map_err(|e| miette::miette!("{}", e))?
            }
            None => RecorderConfig::default(),
        };

        if self.append {
            config = config.with_mode(UpdateMode::Append);
        }
        if let Some(name) = &self.database_name {
            config = config.with_database_name(name.clone());
        }
        if self.no_lock {
            config = config.with_lock(false);
        }
        if self.no_atomic {
            config = config.with_atomic_write(false);
        }
        if self.create_dirs {
            config = config.with_create_dirs(true);
        }

        config.validate().map_err(|e| miette::miette!("{}", e))?;
        Ok(config)
    }

    fn invocation(&self) -> Invocation {
        Invocation {
            build_directory: self.build_directory.clone(),
            output_directory: self.output_directory.clone(),
            file: self.file.clone(),
            args: self.command.clone(),
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let recorder = Recorder::new(cli.recorder_config()?);
    let invocation = cli.invocation();

    let outcome = recorder
        .record_invocation(&invocation)
        .map_err(|e| miette::miette!("{}", e))?;

    match outcome {
        UpdateOutcome::Unchanged => tracing::debug!(file = %invocation.file, "already up to date"),
        UpdateOutcome::Added => tracing::info!(file = %invocation.file, "recorded"),
        UpdateOutcome::Superseded { removed } => {
            tracing::info!(file = %invocation.file, removed, "recorded, replacing stale entries")
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("compdb").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    #[test]
    fn test_positional_layout() {
        let cli = parse(&["/build", "/out", "main.c", "gcc", "-c", "main.c"]);

        assert_eq!(cli.build_directory, "/build");
        assert_eq!(cli.output_directory, PathBuf::from("/out"));
        assert_eq!(cli.file, "main.c");
        assert_eq!(cli.command, vec!["gcc", "-c", "main.c"]);
    }

    #[test]
    fn test_compiler_flags_are_not_ours() {
        let cli = parse(&["/build", "/out", "main.c", "gcc", "--append", "-v", "--help"]);

        assert!(!cli.append);
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.command, vec!["gcc", "--append", "-v", "--help"]);
    }

    #[test]
    fn test_options_before_positionals() {
        let cli = parse(&["--append", "-vv", "--no-lock", "/build", "/out", "main.c", "cc"]);

        assert!(cli.append);
        assert_eq!(cli.verbose, 2);

        let config = cli.recorder_config().unwrap();
        assert_eq!(config.mode, UpdateMode::Append);
        assert!(!config.lock);
        assert!(config.atomic_write);
    }

    #[test]
    fn test_empty_command_is_allowed() {
        let cli = parse(&["/build", "/out", "main.c"]);
        assert!(cli.command.is_empty());
        assert_eq!(cli.invocation().to_record().command.as_deref(), Some(""));
    }

    #[test]
    fn test_missing_positionals_is_an_error() {
        assert!(Cli::try_parse_from(["compdb", "/build", "/out"]).is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("compdb.toml");
        std::fs::write(&path, "mode = \"append\"\ndatabase_name = \"db.json\"\n").unwrap();

        let path_arg = path.to_str().unwrap();
        let cli = parse(&["--config", path_arg, "--database-name", "other.json", "/b", "/o", "f.c"]);
        let config = cli.recorder_config().unwrap();

        assert_eq!(config.mode, UpdateMode::Append);
        assert_eq!(config.database_name, "other.json");
    }

    #[test]
    fn test_invalid_database_name_flag() {
        let cli = parse(&["--database-name", "a/b.json", "/b", "/o", "f.c"]);
        assert!(cli.recorder_config().is_err());
    }
}
