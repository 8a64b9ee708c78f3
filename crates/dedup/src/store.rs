use crate::error::StoreError;
use crate::model::{Edge, Predicate, Record, RecordId};

/// Marker for a point inside the pending mutation set that a store can
/// roll back to without discarding earlier mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(pub usize);

/// Backing store the engine reads records from and mutates during cleanup.
///
/// Mutations (`retarget`, `remove`) stay pending until `commit`. Reads see
/// pending mutations. Callers serialize access: one reconciliation at a
/// time per store.
pub trait RecordStore {
    /// All records of `kind` in insertion order, optionally filtered.
    fn fetch_all(&self, kind: &str, predicate: Option<&Predicate>) -> Result<Vec<Record>, StoreError>;

    /// Every edge that has `id` as source or target.
    fn edges(&self, id: &RecordId) -> Result<Vec<Edge>, StoreError>;

    /// Re-point the endpoint(s) of `edge` equal to `from` at `to`.
    ///
    /// A no-op when the edge no longer references `from`. When the moved
    /// edge would duplicate an existing link, the edge is dropped instead.
    fn retarget(&mut self, edge: &Edge, from: &RecordId, to: &RecordId) -> Result<(), StoreError>;

    /// Delete a record. Fails with [`StoreError::Constraint`] while any
    /// edge still references it.
    fn remove(&mut self, id: &RecordId) -> Result<(), StoreError>;

    /// Open a checkpoint nested inside any still-open ones.
    fn checkpoint(&mut self) -> Result<Checkpoint, StoreError>;

    /// Undo every pending mutation made after `checkpoint`. The checkpoint
    /// and any opened after it are closed.
    fn rollback_to(&mut self, checkpoint: Checkpoint) -> Result<(), StoreError>;

    /// Keep the mutations made since `checkpoint` and close it, along with
    /// any opened after it. They stay pending until `commit`.
    fn release(&mut self, checkpoint: Checkpoint) -> Result<(), StoreError>;

    /// Persist all pending mutations atomically.
    fn commit(&mut self) -> Result<(), StoreError>;
}
