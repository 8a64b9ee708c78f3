use serde::Serialize;

use crate::config::{DedupConfig, KindConfig};
use crate::detect::{detect, field_key};
use crate::model::{CleanupOutcome, DetectionResult, Record};
use crate::reconcile::reconcile_in_store;
use crate::store::RecordStore;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ReportMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
}

impl ReportMeta {
    fn for_config(config: &DedupConfig) -> Self {
        Self {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KindReport {
    pub kind: String,
    pub summary: String,
    pub result: DetectionResult<Record>,
}

/// Duplicate scan across every configured kind.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsReport {
    pub meta: ReportMeta,
    pub kinds: Vec<KindReport>,
}

impl DiagnosticsReport {
    pub fn total_duplicates(&self) -> usize {
        self.kinds.iter().map(|k| k.result.duplicate_count).sum()
    }

    pub fn total_groups(&self) -> usize {
        self.kinds.iter().map(|k| k.result.group_count()).sum()
    }

    /// True when at least one kind could not be scanned.
    pub fn has_diagnostics(&self) -> bool {
        self.kinds.iter().any(|k| k.result.diagnostic.is_some())
    }

    pub fn is_clean(&self) -> bool {
        self.kinds.iter().all(|k| k.result.is_clean())
    }

    pub fn summary(&self) -> String {
        let groups = self.total_groups();
        if groups == 0 {
            return "No duplicates found".to_string();
        }
        format!(
            "Found {} duplicates across {} {}",
            self.total_duplicates(),
            groups,
            if groups == 1 { "group" } else { "groups" },
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KindRepair {
    pub kind: String,
    pub groups: usize,
    pub outcome: CleanupOutcome,
}

/// Scan-and-clean across every configured kind.
#[derive(Debug, Clone, Serialize)]
pub struct RepairReport {
    pub meta: ReportMeta,
    pub kinds: Vec<KindRepair>,
}

impl RepairReport {
    pub fn cleaned(&self) -> usize {
        self.kinds.iter().map(|k| k.outcome.cleaned).sum()
    }

    /// Every error, prefixed with the kind it came from.
    pub fn errors(&self) -> Vec<String> {
        self.kinds
            .iter()
            .flat_map(|k| k.outcome.errors.iter().map(move |e| format!("{}: {e}", k.kind)))
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.kinds.iter().all(|k| k.outcome.is_success())
    }

    pub fn summary(&self) -> String {
        let outcome = CleanupOutcome {
            cleaned: self.cleaned(),
            errors: self.errors(),
        };
        outcome.summary()
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Fetch one kind from the store and detect its duplicates.
///
/// A failed fetch does not propagate: the result is empty and carries the
/// cause in `diagnostic`.
pub fn scan<S>(store: &S, kind: &str, kind_config: &KindConfig) -> DetectionResult<Record>
where
    S: RecordStore + ?Sized,
{
    let records = match store.fetch_all(kind, kind_config.filter.as_ref()) {
        Ok(records) => records,
        Err(e) => {
            log::warn!("duplicate scan of '{kind}' could not fetch records: {e}");
            return DetectionResult::failed(e.to_string());
        }
    };

    let result = detect(records, field_key(&kind_config.key_field), &kind_config.policy);
    log::info!(
        "scanned {} '{kind}' record(s): {}",
        result.total_count,
        result.summary()
    );
    result
}

/// Scan every configured kind.
pub fn diagnose<S>(store: &S, config: &DedupConfig) -> DiagnosticsReport
where
    S: RecordStore + ?Sized,
{
    let kinds = config
        .kinds
        .iter()
        .map(|(kind, kind_config)| {
            let result = scan(store, kind, kind_config);
            KindReport {
                kind: kind.clone(),
                summary: result.summary(),
                result,
            }
        })
        .collect();

    DiagnosticsReport {
        meta: ReportMeta::for_config(config),
        kinds,
    }
}

/// Scan and clean every configured kind, one commit per kind.
///
/// A kind whose scan failed is not cleaned; its diagnostic is reported as
/// an error instead.
pub fn repair<S>(store: &mut S, config: &DedupConfig) -> RepairReport
where
    S: RecordStore + ?Sized,
{
    let mut kinds = Vec::with_capacity(config.kinds.len());

    for (kind, kind_config) in &config.kinds {
        let result = scan(&*store, kind, kind_config);

        let outcome = match result.diagnostic {
            Some(ref cause) => CleanupOutcome {
                cleaned: 0,
                errors: vec![format!("scan failed, nothing cleaned: {cause}")],
            },
            None if result.duplicates.is_empty() => CleanupOutcome::default(),
            None => reconcile_in_store(store, &result),
        };

        if outcome.is_success() {
            log::info!("'{kind}': {}", outcome.summary());
        } else {
            log::warn!("'{kind}': {}", outcome.summary());
        }

        kinds.push(KindRepair {
            kind: kind.clone(),
            groups: result.group_count(),
            outcome,
        });
    }

    RepairReport {
        meta: ReportMeta::for_config(config),
        kinds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::memory::MemoryStore;
    use crate::model::{Edge, Predicate, RecordId};
    use crate::store::Checkpoint;

    /// Store whose reads always fail.
    struct Unreachable;

    impl RecordStore for Unreachable {
        fn fetch_all(&self, _: &str, _: Option<&Predicate>) -> Result<Vec<Record>, StoreError> {
            Err(StoreError::Backend("database is locked".into()))
        }
        fn edges(&self, _: &RecordId) -> Result<Vec<Edge>, StoreError> {
            Err(StoreError::Backend("database is locked".into()))
        }
        fn retarget(&mut self, _: &Edge, _: &RecordId, _: &RecordId) -> Result<(), StoreError> {
            unreachable!("no mutation without a successful scan")
        }
        fn remove(&mut self, _: &RecordId) -> Result<(), StoreError> {
            unreachable!("no mutation without a successful scan")
        }
        fn checkpoint(&mut self) -> Result<Checkpoint, StoreError> {
            Ok(Checkpoint(0))
        }
        fn rollback_to(&mut self, _: Checkpoint) -> Result<(), StoreError> {
            Ok(())
        }
        fn release(&mut self, _: Checkpoint) -> Result<(), StoreError> {
            Ok(())
        }
        fn commit(&mut self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    const CONFIG: &str = r#"
name = "Test"

[kinds.category]
key_field = "title"

[kinds.tag]
key_field = "name"
"#;

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.insert(Record::new("c1", "category").with_field("title", "Appliances"));
        store.insert(Record::new("c2", "category").with_field("title", "Tools"));
        store.insert(Record::new("t1", "tag").with_field("name", "warranty"));
        store.insert(Record::new("t2", "tag").with_field("name", "Warranty"));
        store.insert(Record::new("t3", "tag").with_field("name", " WARRANTY "));
        store.insert(Record::new("p1", "product").with_field("name", "Drill"));
        store.link("tagged", "p1", "t3");
        store.link("category", "p1", "c2");
        store
    }

    #[test]
    fn scan_fails_soft() {
        let result = scan(&Unreachable, "tag", &KindConfig::new("name"));
        assert!(result.duplicates.is_empty());
        assert_eq!(result.total_count, 0);
        assert_eq!(result.diagnostic.as_deref(), Some("storage error: database is locked"));
    }

    #[test]
    fn scan_applies_filter() {
        let mut store = store();
        store.insert(Record::new("t4", "tag").with_field("name", "warranty").with_field("archived", "true"));
        let mut kind_config = KindConfig::new("name");
        kind_config.filter = Some(Predicate { field: "archived".into(), values: vec!["true".into()] });
        let result = scan(&store, "tag", &kind_config);
        assert_eq!(result.total_count, 1);
        assert!(result.duplicates.is_empty());
    }

    #[test]
    fn diagnose_reports_each_kind() {
        let config = DedupConfig::from_toml(CONFIG).unwrap();
        let report = diagnose(&store(), &config);
        assert_eq!(report.kinds.len(), 2);
        assert_eq!(report.kinds[0].kind, "category");
        assert_eq!(report.kinds[0].summary, "No duplicates found");
        assert_eq!(report.kinds[1].kind, "tag");
        assert_eq!(report.kinds[1].summary, "Found 3 duplicates across 1 group");
        assert_eq!(report.total_duplicates(), 3);
        assert!(!report.is_clean());
        assert!(!report.has_diagnostics());
        assert_eq!(report.meta.config_name, "Test");
    }

    #[test]
    fn diagnose_surfaces_unreachable_store() {
        let config = DedupConfig::from_toml(CONFIG).unwrap();
        let report = diagnose(&Unreachable, &config);
        assert!(report.has_diagnostics());
        assert!(!report.is_clean());
        assert_eq!(report.summary(), "No duplicates found");
    }

    #[test]
    fn repair_then_rediagnose_is_clean() {
        let config = DedupConfig::from_toml(CONFIG).unwrap();
        let mut store = store();

        let report = repair(&mut store, &config);
        assert!(report.is_success(), "{:?}", report.errors());
        assert_eq!(report.cleaned(), 2);
        assert_eq!(report.summary(), "Removed 2 records");

        let again = diagnose(&store, &config);
        assert!(again.is_clean());
        // p1's tag edge followed t3 into t1.
        let tagged: Vec<_> = store
            .committed_edges()
            .iter()
            .filter(|e| e.relation == "tagged")
            .map(|e| e.target.as_str())
            .collect();
        assert_eq!(tagged, vec!["t1"]);
    }

    #[test]
    fn report_json_shape() {
        let config = DedupConfig::from_toml(CONFIG).unwrap();
        let report = diagnose(&store(), &config);
        let val = serde_json::to_value(&report).unwrap();

        assert_eq!(val["meta"]["config_name"], "Test");
        assert_eq!(val["kinds"][1]["kind"], "tag");
        let tag = &val["kinds"][1]["result"];
        assert_eq!(tag["total_count"], 3);
        assert_eq!(tag["excluded_count"], 0);
        assert!(tag["diagnostic"].is_null());
        assert_eq!(tag["duplicates"][0]["key"], "warranty");
        assert_eq!(tag["duplicates"][0]["members"][0]["id"], "t1");
    }

    #[test]
    fn repair_skips_unreachable_kinds() {
        let config = DedupConfig::from_toml(CONFIG).unwrap();
        let report = repair(&mut Unreachable, &config);
        assert!(!report.is_success());
        assert_eq!(report.cleaned(), 0);
        let errors = report.errors();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("category: scan failed"));
    }
}
