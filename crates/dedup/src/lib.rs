//! `holdings-dedup`: duplicate detection and reconciliation engine.
//!
//! Pure engine crate: receives records (or a [`RecordStore`] to fetch them
//! from), groups them by a normalized key, and merges each duplicate group
//! into a single survivor. No CLI or file IO dependencies.

pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod memory;
pub mod model;
pub mod normalize;
pub mod reconcile;
pub mod store;

pub use config::{DedupConfig, KindConfig};
pub use detect::{detect, field_key};
pub use engine::{diagnose, repair, scan, DiagnosticsReport, RepairReport};
pub use error::{DedupError, StoreError};
pub use memory::MemoryStore;
pub use model::{
    CleanupOutcome, DetectionResult, DuplicateGroup, Edge, EdgeId, Predicate, Record, RecordId,
};
pub use normalize::{normalize, NormalizationPolicy};
pub use reconcile::{reconcile, reconcile_in_store};
pub use store::{Checkpoint, RecordStore};
