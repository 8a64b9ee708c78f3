// holdings CLI - import records and clean up duplicates

mod dupes;
mod exit_codes;
mod import;
mod status;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use exit_codes::{EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "holdings")]
#[command(about = "Find and merge duplicate records in a holdings database")]
#[command(version)]
struct Cli {
    /// More log output on stderr (repeatable)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Less log output on stderr
    #[arg(long, short = 'q', global = true, action = clap::ArgAction::Count)]
    quiet: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load records or edges from CSV into a database
    #[command(subcommand)]
    Import(import::ImportCommands),

    /// Scan for and clean up duplicate records
    #[command(subcommand)]
    Dupes(dupes::DupesCommands),

    /// Show record counts per kind
    #[command(after_help = "\
Examples:
  holdings status holdings.db
  holdings status holdings.db --json")]
    Status {
        /// SQLite database file
        db: PathBuf,

        /// Output JSON to stdout instead of a table
        #[arg(long)]
        json: bool,
    },
}

/// Route library `log` records and our own events to stderr.
/// Default level is WARN; each -v raises it, -q silences warnings.
/// RUST_LOG directives are honored on top.
fn init_tracing(verbose: u8, quiet: u8) {
    let level = match (verbose, quiet) {
        (_, q) if q > 0 => Level::ERROR,
        (0, _) => Level::WARN,
        (1, _) => Level::INFO,
        (2, _) => Level::DEBUG,
        _ => Level::TRACE,
    };

    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    // try_init also installs the log -> tracing bridge
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Import(cmd) => import::cmd_import(cmd),
        Commands::Dupes(cmd) => dupes::cmd_dupes(cmd),
        Commands::Status { db, json } => status::cmd_status(db, json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Open an existing database. Commands that only read or clean refuse to
/// create an empty file for a mistyped path.
pub fn open_existing(db: &Path) -> Result<holdings_store::SqliteStore, CliError> {
    if !db.exists() {
        return Err(CliError::new(EXIT_USAGE, format!("database not found: {}", db.display()))
            .with_hint("create it with `holdings import records <db> <csv> --kind <kind>`"));
    }
    holdings_store::SqliteStore::open(db)
        .map_err(|e| CliError::io(format!("cannot open {}: {e}", db.display())))
}
