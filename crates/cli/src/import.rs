//! `holdings import`: load CSV into a database.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use holdings_store::{load_csv_edges, load_csv_records, RecordColumns, SqliteStore};

use crate::exit_codes::{import_exit_code, EXIT_IMPORT_CONSTRAINT, EXIT_USAGE};
use crate::CliError;

#[derive(Subcommand)]
pub enum ImportCommands {
    /// Import records of one kind; every non-id column becomes a field
    #[command(after_help = "\
Examples:
  holdings import records holdings.db tags.csv --kind tag
  holdings import records holdings.db products.csv --kind product --id-column sku
  holdings import records holdings.db items.csv --kind item --created-at-column added")]
    Records {
        /// SQLite database file (created if missing)
        db: PathBuf,

        /// CSV file with a header row
        csv: PathBuf,

        /// Kind assigned to every imported record
        #[arg(long)]
        kind: String,

        /// Column holding the record id
        #[arg(long, default_value = "id")]
        id_column: String,

        /// Column holding the creation time (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        created_at_column: Option<String>,
    },

    /// Import edges from a CSV with relation,source,target columns
    #[command(after_help = "\
Examples:
  holdings import edges holdings.db links.csv")]
    Edges {
        /// SQLite database file
        db: PathBuf,

        /// CSV file with relation, source and target columns
        csv: PathBuf,
    },
}

pub fn cmd_import(cmd: ImportCommands) -> Result<(), CliError> {
    match cmd {
        ImportCommands::Records { db, csv, kind, id_column, created_at_column } => {
            let columns = RecordColumns { id: id_column, created_at: created_at_column };
            cmd_import_records(&db, &csv, &kind, &columns)
        }
        ImportCommands::Edges { db, csv } => cmd_import_edges(&db, &csv),
    }
}

fn read_csv(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("cannot read {}: {e}", path.display())))
}

fn import_err(path: &Path, e: holdings_dedup::StoreError) -> CliError {
    CliError::new(import_exit_code(&e), format!("{}: {e}", path.display()))
}

fn cmd_import_records(db: &Path, csv: &Path, kind: &str, columns: &RecordColumns) -> Result<(), CliError> {
    if kind.trim().is_empty() {
        return Err(CliError::new(EXIT_USAGE, "--kind must not be empty"));
    }
    let data = read_csv(csv)?;
    let records = load_csv_records(kind, &data, columns).map_err(|e| import_err(csv, e))?;

    let mut store = SqliteStore::open(db)
        .map_err(|e| CliError::io(format!("cannot open {}: {e}", db.display())))?;
    let count = store.import_records(&records).map_err(|e| {
        let err = import_err(csv, e);
        if err.code == EXIT_IMPORT_CONSTRAINT {
            err.with_hint("record ids must be unique across the whole database")
        } else {
            err
        }
    })?;

    eprintln!("imported {count} '{kind}' record(s) into {}", db.display());
    Ok(())
}

fn cmd_import_edges(db: &Path, csv: &Path) -> Result<(), CliError> {
    let data = read_csv(csv)?;
    let edges = load_csv_edges(&data).map_err(|e| import_err(csv, e))?;

    let mut store = crate::open_existing(db)?;
    let inserted = store.import_edges(&edges).map_err(|e| {
        let err = import_err(csv, e);
        if err.code == EXIT_IMPORT_CONSTRAINT {
            err.with_hint("import the records an edge refers to before the edge itself")
        } else {
            err
        }
    })?;

    let skipped = edges.len() - inserted;
    if skipped > 0 {
        eprintln!("imported {inserted} edge(s) into {}, {skipped} already present", db.display());
    } else {
        eprintln!("imported {inserted} edge(s) into {}", db.display());
    }
    Ok(())
}
