//! `holdings dupes`: config-driven duplicate scan and cleanup.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use holdings_dedup::{diagnose, repair, DedupConfig};

use crate::exit_codes::{
    EXIT_DUPES_FOUND, EXIT_DUPES_INVALID_CONFIG, EXIT_DUPES_PARTIAL, EXIT_DUPES_SCAN_INCOMPLETE,
};
use crate::CliError;

#[derive(Subcommand)]
pub enum DupesCommands {
    /// Report duplicate groups without changing anything
    #[command(after_help = "\
Examples:
  holdings dupes scan holdings.db household.dedup.toml
  holdings dupes scan holdings.db household.dedup.toml --json
  holdings dupes scan holdings.db household.dedup.toml --kind tag
  holdings dupes scan holdings.db household.dedup.toml --output report.json

Exit codes: 0 clean, 3 duplicates found, 4 a kind could not be scanned")]
    Scan {
        /// SQLite database file
        db: PathBuf,

        /// Path to the .dedup.toml config file
        config: PathBuf,

        /// Only scan this kind
        #[arg(long)]
        kind: Option<String>,

        /// Output JSON to stdout instead of human summary
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Merge every duplicate group into its first record
    #[command(after_help = "\
Examples:
  holdings dupes clean holdings.db household.dedup.toml
  holdings dupes clean holdings.db household.dedup.toml --kind category --json

Exit codes: 0 all groups merged, 5 some groups or the commit failed")]
    Clean {
        /// SQLite database file
        db: PathBuf,

        /// Path to the .dedup.toml config file
        config: PathBuf,

        /// Only clean this kind
        #[arg(long)]
        kind: Option<String>,

        /// Output JSON to stdout instead of human summary
        #[arg(long)]
        json: bool,
    },

    /// Validate a dedup config without touching a database
    #[command(after_help = "\
Examples:
  holdings dupes validate household.dedup.toml")]
    Validate {
        /// Path to the .dedup.toml config file
        config: PathBuf,
    },
}

pub fn cmd_dupes(cmd: DupesCommands) -> Result<(), CliError> {
    match cmd {
        DupesCommands::Scan { db, config, kind, json, output } => {
            cmd_dupes_scan(&db, &config, kind.as_deref(), json, output)
        }
        DupesCommands::Clean { db, config, kind, json } => {
            cmd_dupes_clean(&db, &config, kind.as_deref(), json)
        }
        DupesCommands::Validate { config } => cmd_dupes_validate(&config),
    }
}

fn dupes_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError::new(code, msg)
}

/// Read and validate the config, narrowed to one kind when asked.
fn load_config(path: &Path, only_kind: Option<&str>) -> Result<DedupConfig, CliError> {
    let config_str = std::fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("cannot read config: {e}")))?;
    let mut config = DedupConfig::from_toml(&config_str)
        .map_err(|e| dupes_err(EXIT_DUPES_INVALID_CONFIG, e.to_string()))?;

    if let Some(kind) = only_kind {
        config.kind(kind).map_err(|e| {
            let known: Vec<&str> = config.kinds.keys().map(String::as_str).collect();
            dupes_err(EXIT_DUPES_INVALID_CONFIG, e.to_string())
                .with_hint(format!("configured kinds: {}", known.join(", ")))
        })?;
        config.kinds.retain(|name, _| name == kind);
    }

    log::debug!("loaded config '{}' with {} kind(s)", config.name, config.kinds.len());
    Ok(config)
}

fn write_json<T: serde::Serialize>(
    value: &T,
    json_output: bool,
    output_file: Option<&Path>,
) -> Result<(), CliError> {
    if !json_output && output_file.is_none() {
        return Ok(());
    }
    let json_str = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;

    if let Some(path) = output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| CliError::io(format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }
    Ok(())
}

fn cmd_dupes_scan(
    db: &Path,
    config_path: &Path,
    only_kind: Option<&str>,
    json_output: bool,
    output_file: Option<PathBuf>,
) -> Result<(), CliError> {
    let config = load_config(config_path, only_kind)?;
    let store = crate::open_existing(db)?;

    let report = diagnose(&store, &config);
    write_json(&report, json_output, output_file.as_deref())?;

    // Human summary to stderr
    for kind in &report.kinds {
        eprintln!("  {}: {} (of {} record(s))", kind.kind, kind.summary, kind.result.total_count);
        if let Some(ref diagnostic) = kind.result.diagnostic {
            eprintln!("    scan failed: {diagnostic}");
        }
    }
    eprintln!("{}", report.summary());

    if report.has_diagnostics() {
        return Err(dupes_err(EXIT_DUPES_SCAN_INCOMPLETE, "some kinds could not be scanned"));
    }
    if report.total_groups() > 0 {
        return Err(dupes_err(EXIT_DUPES_FOUND, "duplicates found")
            .with_hint(format!(
                "merge them with `holdings dupes clean {} {}`",
                db.display(),
                config_path.display()
            )));
    }
    Ok(())
}

fn cmd_dupes_clean(
    db: &Path,
    config_path: &Path,
    only_kind: Option<&str>,
    json_output: bool,
) -> Result<(), CliError> {
    let config = load_config(config_path, only_kind)?;
    let mut store = crate::open_existing(db)?;

    let report = repair(&mut store, &config);
    write_json(&report, json_output, None)?;

    for kind in &report.kinds {
        eprintln!(
            "  {}: {} from {} group(s)",
            kind.kind,
            kind.outcome.summary(),
            kind.groups
        );
        for error in &kind.outcome.errors {
            eprintln!("    {error}");
        }
    }
    eprintln!("{}", report.summary());

    if !report.is_success() {
        let failed = report.errors().len();
        return Err(dupes_err(EXIT_DUPES_PARTIAL, format!("cleanup finished with {failed} error(s)"))
            .with_hint("groups that failed were left unchanged; re-run `holdings dupes scan` to see what remains"));
    }
    Ok(())
}

fn cmd_dupes_validate(config_path: &Path) -> Result<(), CliError> {
    let config = load_config(config_path, None)?;
    let kinds: Vec<String> = config
        .kinds
        .iter()
        .map(|(kind, kc)| format!("{kind} by '{}'", kc.key_field))
        .collect();
    eprintln!(
        "valid: dedup '{}' with {} kind(s): {}",
        config.name,
        config.kinds.len(),
        kinds.join(", ")
    );
    Ok(())
}
