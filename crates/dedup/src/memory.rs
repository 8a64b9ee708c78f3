//! In-memory [`RecordStore`]: a committed image plus a working copy that
//! receives pending mutations.

use std::collections::HashSet;

use crate::error::StoreError;
use crate::model::{Edge, EdgeId, Predicate, Record, RecordId};
use crate::store::{Checkpoint, RecordStore};

#[derive(Debug, Clone, Default, PartialEq)]
struct Image {
    records: Vec<Record>,
    edges: Vec<Edge>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    committed: Image,
    working: Image,
    checkpoints: Vec<Image>,
    next_edge_id: i64,
    fail_retarget: HashSet<RecordId>,
    fail_commit: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a committed record. Insertion order is fetch order.
    pub fn insert(&mut self, record: Record) {
        self.committed.records.push(record.clone());
        self.working.records.push(record);
    }

    /// Seed a committed edge.
    pub fn link(&mut self, relation: &str, source: &str, target: &str) -> EdgeId {
        self.next_edge_id += 1;
        let edge = Edge {
            id: EdgeId(self.next_edge_id),
            relation: relation.to_string(),
            source: RecordId::new(source),
            target: RecordId::new(target),
        };
        self.committed.edges.push(edge.clone());
        self.working.edges.push(edge);
        EdgeId(self.next_edge_id)
    }

    /// Make every `retarget` away from `id` fail.
    pub fn fail_retarget_for(&mut self, id: &str) {
        self.fail_retarget.insert(RecordId::new(id));
    }

    /// Make the next `commit` fail with `reason`.
    pub fn fail_commit(&mut self, reason: &str) {
        self.fail_commit = Some(reason.to_string());
    }

    pub fn has_pending_changes(&self) -> bool {
        self.working != self.committed
    }

    /// Records as of the last successful commit.
    pub fn committed_records(&self) -> &[Record] {
        &self.committed.records
    }

    pub fn committed_edges(&self) -> &[Edge] {
        &self.committed.edges
    }

    /// Current view, pending mutations included.
    pub fn records(&self) -> &[Record] {
        &self.working.records
    }

    pub fn all_edges(&self) -> &[Edge] {
        &self.working.edges
    }

    pub fn contains(&self, id: &str) -> bool {
        self.working.records.iter().any(|r| r.id.as_str() == id)
    }

    /// Checkpoints not yet released or rolled back.
    pub fn open_checkpoints(&self) -> usize {
        self.checkpoints.len()
    }
}

impl RecordStore for MemoryStore {
    fn fetch_all(&self, kind: &str, predicate: Option<&Predicate>) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .working
            .records
            .iter()
            .filter(|r| r.kind == kind)
            .filter(|r| predicate.map_or(true, |p| p.matches(r)))
            .cloned()
            .collect())
    }

    fn edges(&self, id: &RecordId) -> Result<Vec<Edge>, StoreError> {
        Ok(self.working.edges.iter().filter(|e| e.touches(id)).cloned().collect())
    }

    fn retarget(&mut self, edge: &Edge, from: &RecordId, to: &RecordId) -> Result<(), StoreError> {
        if self.fail_retarget.contains(from) {
            return Err(StoreError::Injected(format!("retarget away from '{from}'")));
        }
        if !self.working.records.iter().any(|r| r.id == *to) {
            return Err(StoreError::NotFound(format!("record '{to}'")));
        }
        let pos = self
            .working
            .edges
            .iter()
            .position(|e| e.id == edge.id)
            .ok_or_else(|| StoreError::NotFound(format!("edge {}", edge.id.0)))?;

        let current = &self.working.edges[pos];
        if !current.touches(from) {
            return Ok(());
        }
        let moved = current.redirected(from, to);
        let duplicate = self
            .working
            .edges
            .iter()
            .any(|e| e.id != moved.id && e.same_link(&moved));
        if duplicate {
            self.working.edges.remove(pos);
        } else {
            self.working.edges[pos] = moved;
        }
        Ok(())
    }

    fn remove(&mut self, id: &RecordId) -> Result<(), StoreError> {
        if self.working.edges.iter().any(|e| e.touches(id)) {
            return Err(StoreError::Constraint(format!("record '{id}' is still referenced")));
        }
        let pos = self
            .working
            .records
            .iter()
            .position(|r| r.id == *id)
            .ok_or_else(|| StoreError::NotFound(format!("record '{id}'")))?;
        self.working.records.remove(pos);
        Ok(())
    }

    fn checkpoint(&mut self) -> Result<Checkpoint, StoreError> {
        self.checkpoints.push(self.working.clone());
        Ok(Checkpoint(self.checkpoints.len() - 1))
    }

    fn rollback_to(&mut self, checkpoint: Checkpoint) -> Result<(), StoreError> {
        if checkpoint.0 >= self.checkpoints.len() {
            return Err(StoreError::NotFound(format!("checkpoint {}", checkpoint.0)));
        }
        self.checkpoints.truncate(checkpoint.0 + 1);
        if let Some(image) = self.checkpoints.pop() {
            self.working = image;
        }
        Ok(())
    }

    fn release(&mut self, checkpoint: Checkpoint) -> Result<(), StoreError> {
        if checkpoint.0 >= self.checkpoints.len() {
            return Err(StoreError::NotFound(format!("checkpoint {}", checkpoint.0)));
        }
        self.checkpoints.truncate(checkpoint.0);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        if let Some(reason) = self.fail_commit.take() {
            return Err(StoreError::Injected(reason));
        }
        self.committed = self.working.clone();
        self.checkpoints.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.insert(Record::new("t1", "tag").with_field("name", "Kitchen"));
        store.insert(Record::new("t2", "tag").with_field("name", "kitchen"));
        store.insert(Record::new("p1", "product").with_field("name", "Kettle"));
        store.link("tagged", "p1", "t1");
        store.link("tagged", "p1", "t2");
        store
    }

    #[test]
    fn fetch_filters_by_kind_and_predicate() {
        let mut store = seeded();
        store.insert(Record::new("t3", "tag").with_field("name", "Garage").with_field("archived", "true"));
        assert_eq!(store.fetch_all("tag", None).unwrap().len(), 3);
        let p = Predicate { field: "archived".into(), values: vec!["true".into()] };
        let hits = store.fetch_all("tag", Some(&p)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id.as_str(), "t3");
    }

    #[test]
    fn retarget_onto_existing_link_collapses() {
        let mut store = seeded();
        let edges = store.edges(&"t2".into()).unwrap();
        assert_eq!(edges.len(), 1);
        store.retarget(&edges[0], &"t2".into(), &"t1".into()).unwrap();
        // p1 was already tagged with t1; the moved edge folds into it.
        assert_eq!(store.all_edges().len(), 1);
        assert_eq!(store.all_edges()[0].target.as_str(), "t1");
    }

    #[test]
    fn retarget_is_idempotent() {
        let mut store = seeded();
        let edge = store.edges(&"t1".into()).unwrap().remove(0);
        store.retarget(&edge, &"t2".into(), &"t1".into()).unwrap();
        store.retarget(&edge, &"t2".into(), &"t1".into()).unwrap();
        assert_eq!(store.all_edges().len(), 2);
    }

    #[test]
    fn remove_referenced_record_is_rejected() {
        let mut store = seeded();
        let err = store.remove(&"t2".into()).unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
        assert!(store.contains("t2"));
    }

    #[test]
    fn mutations_pending_until_commit() {
        let mut store = seeded();
        let edge = store.edges(&"t2".into()).unwrap().remove(0);
        store.retarget(&edge, &"t2".into(), &"t1".into()).unwrap();
        store.remove(&"t2".into()).unwrap();
        assert!(store.has_pending_changes());
        assert_eq!(store.committed_records().len(), 3);

        store.commit().unwrap();
        assert!(!store.has_pending_changes());
        assert_eq!(store.committed_records().len(), 2);
    }

    #[test]
    fn rollback_keeps_earlier_mutations() {
        let mut store = seeded();
        store.insert(Record::new("t9", "tag"));
        let edge = store.edges(&"t2".into()).unwrap().remove(0);
        store.retarget(&edge, &"t2".into(), &"t1".into()).unwrap();

        let cp = store.checkpoint().unwrap();
        store.remove(&"t2".into()).unwrap();
        store.remove(&"t9".into()).unwrap();
        store.rollback_to(cp).unwrap();

        assert!(store.contains("t2"));
        assert!(store.contains("t9"));
        // The retarget made before the checkpoint survives.
        assert_eq!(store.all_edges().len(), 1);
    }

    #[test]
    fn injected_commit_failure_leaves_committed_image() {
        let mut store = seeded();
        let edge = store.edges(&"t2".into()).unwrap().remove(0);
        store.retarget(&edge, &"t2".into(), &"t1".into()).unwrap();
        store.remove(&"t2".into()).unwrap();
        store.fail_commit("disk full");

        let err = store.commit().unwrap_err();
        assert_eq!(err.to_string(), "injected failure: disk full");
        assert_eq!(store.committed_records().len(), 3);
        assert_eq!(store.committed_edges().len(), 2);
        // A retry goes through.
        store.commit().unwrap();
        assert_eq!(store.committed_records().len(), 2);
    }

    #[test]
    fn release_keeps_mutations_and_closes_checkpoint() {
        let mut store = seeded();
        let outer = store.checkpoint().unwrap();
        let edge = store.edges(&"t2".into()).unwrap().remove(0);
        store.retarget(&edge, &"t2".into(), &"t1".into()).unwrap();
        let inner = store.checkpoint().unwrap();
        store.remove(&"t2".into()).unwrap();
        assert_eq!(store.open_checkpoints(), 2);

        store.release(inner).unwrap();
        assert_eq!(store.open_checkpoints(), 1);
        assert!(!store.contains("t2"));

        store.release(outer).unwrap();
        assert_eq!(store.open_checkpoints(), 0);
        assert!(store.release(outer).is_err());
        assert!(store.has_pending_changes());
    }

    #[test]
    fn release_closes_nested_checkpoints() {
        let mut store = seeded();
        let outer = store.checkpoint().unwrap();
        store.checkpoint().unwrap();
        store.checkpoint().unwrap();
        store.release(outer).unwrap();
        assert_eq!(store.open_checkpoints(), 0);
    }
}

