//! `holdings-store`: persistent backing store for the duplicate engine.
//!
//! [`SqliteStore`] implements [`holdings_dedup::RecordStore`] on a single
//! SQLite file; [`import`] loads records and edges from CSV.

pub mod import;
pub mod sqlite;

pub use import::{load_csv_edges, load_csv_records, EdgeRow, RecordColumns};
pub use sqlite::SqliteStore;
