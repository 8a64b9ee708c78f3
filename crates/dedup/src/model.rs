use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Stable identity of a record in its backing store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A storage-agnostic record of some kind ("category", "tag", "product", ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub kind: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Record {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(id),
            kind: kind.into(),
            fields: BTreeMap::new(),
            created_at: None,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub i64);

/// A relationship between two records, e.g. `product --tagged--> tag`.
///
/// Edges are a set per `(relation, source, target)`: the same link never
/// exists twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub relation: String,
    pub source: RecordId,
    pub target: RecordId,
}

impl Edge {
    /// True when `id` is either endpoint.
    pub fn touches(&self, id: &RecordId) -> bool {
        self.source == *id || self.target == *id
    }

    /// Same link as `other`, ignoring edge identity.
    pub fn same_link(&self, other: &Edge) -> bool {
        self.relation == other.relation && self.source == other.source && self.target == other.target
    }

    /// Copy of this edge with every endpoint equal to `from` replaced by `to`.
    pub fn redirected(&self, from: &RecordId, to: &RecordId) -> Edge {
        let swap = |end: &RecordId| if end == from { to.clone() } else { end.clone() };
        Edge {
            id: self.id,
            relation: self.relation.clone(),
            source: swap(&self.source),
            target: swap(&self.target),
        }
    }
}

// ---------------------------------------------------------------------------
// Fetch predicate
// ---------------------------------------------------------------------------

/// Field filter applied when fetching records: keeps records whose `field`
/// equals one of `values`. A record without the field never matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    pub values: Vec<String>,
}

impl Predicate {
    pub fn matches(&self, record: &Record) -> bool {
        match record.field(&self.field) {
            Some(value) => self.values.iter().any(|v| v == value),
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Detection output
// ---------------------------------------------------------------------------

/// Records sharing one normalized key, in first-seen order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup<R> {
    pub key: String,
    pub members: Vec<R>,
}

impl<R> DuplicateGroup<R> {
    pub fn count(&self) -> usize {
        self.members.len()
    }

    /// The member kept on reconciliation: the first one seen during the scan.
    pub fn survivor(&self) -> Option<&R> {
        self.members.first()
    }

    /// Members removed on reconciliation (everything after the survivor).
    pub fn redundant(&self) -> &[R] {
        self.members.get(1..).unwrap_or(&[])
    }
}

/// Snapshot produced by one scan. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult<R> {
    pub duplicates: Vec<DuplicateGroup<R>>,
    /// Records with a usable key, singletons included.
    pub total_count: usize,
    /// Sum of the sizes of all duplicate groups.
    pub duplicate_count: usize,
    /// Records skipped because they had no key or an empty one.
    pub excluded_count: usize,
    /// Set when the scan could not read its input; the result is then empty
    /// and should be treated as unknown rather than clean.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl<R> DetectionResult<R> {
    pub fn empty() -> Self {
        Self {
            duplicates: Vec::new(),
            total_count: 0,
            duplicate_count: 0,
            excluded_count: 0,
            diagnostic: None,
        }
    }

    /// Empty result carrying the cause of a failed fetch.
    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            diagnostic: Some(diagnostic.into()),
            ..Self::empty()
        }
    }

    pub fn group_count(&self) -> usize {
        self.duplicates.len()
    }

    pub fn is_clean(&self) -> bool {
        self.duplicates.is_empty() && self.diagnostic.is_none()
    }

    /// Human-readable one-liner for status banners.
    pub fn summary(&self) -> String {
        if self.duplicates.is_empty() {
            return "No duplicates found".to_string();
        }
        let groups = self.group_count();
        format!(
            "Found {} duplicates across {} {}",
            self.duplicate_count,
            groups,
            if groups == 1 { "group" } else { "groups" },
        )
    }
}

// ---------------------------------------------------------------------------
// Cleanup output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupOutcome {
    /// Records removed across all successfully processed groups.
    pub cleaned: usize,
    /// One message per failed group, plus one for a failed commit.
    pub errors: Vec<String>,
}

impl CleanupOutcome {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn summary(&self) -> String {
        let noun = if self.cleaned == 1 { "record" } else { "records" };
        match self.errors.len() {
            0 => format!("Removed {} {noun}", self.cleaned),
            1 => format!("Removed {} {noun} with 1 error", self.cleaned),
            n => format!("Removed {} {noun} with {n} errors", self.cleaned),
        }
    }
}
