// Record store on SQLite

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use holdings_dedup::{Checkpoint, Edge, EdgeId, Predicate, Record, RecordId, RecordStore, StoreError};

use crate::import::EdgeRow;

const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS records (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    fields TEXT NOT NULL,       -- JSON object: field name -> value
    created_at TEXT             -- RFC 3339, NULL when unknown
);

CREATE INDEX IF NOT EXISTS records_by_kind ON records(kind);

CREATE TABLE IF NOT EXISTS edges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    relation TEXT NOT NULL,
    source_id TEXT NOT NULL REFERENCES records(id),
    target_id TEXT NOT NULL REFERENCES records(id),
    UNIQUE (relation, source_id, target_id)
);

CREATE INDEX IF NOT EXISTS edges_by_target ON edges(target_id);
"#;

/// SQLite-backed [`RecordStore`].
///
/// The first mutation opens a transaction; checkpoints are savepoints
/// inside it and `commit` ends it. Records fetch in insertion order.
pub struct SqliteStore {
    conn: Connection,
    savepoints: usize,
    /// Set between the `BEGIN` this store issued and its `COMMIT`.
    in_transaction: bool,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(store_err)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(store_err)?;
        Ok(Self { conn, savepoints: 0, in_transaction: false })
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// Savepoints opened by `checkpoint` and not yet released or rolled back.
    pub fn open_savepoints(&self) -> usize {
        self.savepoints
    }

    /// Insert records in one transaction. Returns the number inserted.
    pub fn import_records(&mut self, records: &[Record]) -> Result<usize, StoreError> {
        self.ensure_idle()?;
        let tx = self.conn.transaction().map_err(store_err)?;
        {
            let mut stmt = tx
                .prepare("INSERT INTO records (id, kind, fields, created_at) VALUES (?1, ?2, ?3, ?4)")
                .map_err(store_err)?;
            for record in records {
                let fields = serde_json::to_string(&record.fields)
                    .map_err(|e| StoreError::Backend(format!("cannot encode fields: {e}")))?;
                let created_at = record.created_at.map(|t| t.to_rfc3339());
                stmt.execute(params![record.id.as_str(), &record.kind, fields, created_at])
                    .map_err(store_err)?;
            }
        }
        tx.commit().map_err(store_err)?;
        log::info!("imported {} record(s)", records.len());
        Ok(records.len())
    }

    /// Insert edges in one transaction. Links that already exist are
    /// skipped. Returns the number actually inserted.
    pub fn import_edges(&mut self, edges: &[EdgeRow]) -> Result<usize, StoreError> {
        self.ensure_idle()?;
        let tx = self.conn.transaction().map_err(store_err)?;
        let mut inserted = 0;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO edges (relation, source_id, target_id) VALUES (?1, ?2, ?3)",
                )
                .map_err(store_err)?;
            for edge in edges {
                inserted += stmt
                    .execute(params![&edge.relation, edge.source.as_str(), edge.target.as_str()])
                    .map_err(store_err)?;
            }
        }
        tx.commit().map_err(store_err)?;
        log::info!("imported {inserted} edge(s), {} already present", edges.len() - inserted);
        Ok(inserted)
    }

    /// Record count per kind, ordered by kind.
    pub fn kind_counts(&self) -> Result<Vec<(String, usize)>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT kind, COUNT(*) FROM records GROUP BY kind ORDER BY kind")
            .map_err(store_err)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(store_err)?;
        let mut out = Vec::new();
        for row in rows {
            let (kind, count) = row.map_err(store_err)?;
            out.push((kind, count as usize));
        }
        Ok(out)
    }

    fn ensure_idle(&self) -> Result<(), StoreError> {
        if self.has_pending_changes() {
            return Err(StoreError::Backend(
                "pending changes must be committed before importing".into(),
            ));
        }
        Ok(())
    }

    fn ensure_transaction(&mut self) -> Result<(), StoreError> {
        self.check_transaction()?;
        if !self.in_transaction {
            self.conn.execute_batch("BEGIN IMMEDIATE").map_err(store_err)?;
            self.in_transaction = true;
            self.savepoints = 0;
        }
        Ok(())
    }

    /// SQLite ends a transaction on its own after some errors (a full disk,
    /// an interrupt); everything pending since `BEGIN` is then gone.
    fn check_transaction(&mut self) -> Result<(), StoreError> {
        if self.in_transaction && self.conn.is_autocommit() {
            self.in_transaction = false;
            self.savepoints = 0;
            log::error!("transaction was rolled back by the database");
            return Err(StoreError::Backend("transaction was rolled back by the database".into()));
        }
        Ok(())
    }

    fn load_edge(&self, id: EdgeId) -> Result<Option<Edge>, StoreError> {
        self.conn
            .query_row(
                "SELECT relation, source_id, target_id FROM edges WHERE id = ?1",
                params![id.0],
                |row| {
                    Ok(Edge {
                        id,
                        relation: row.get(0)?,
                        source: RecordId(row.get(1)?),
                        target: RecordId(row.get(2)?),
                    })
                },
            )
            .optional()
            .map_err(store_err)
    }
}

impl RecordStore for SqliteStore {
    fn fetch_all(&self, kind: &str, predicate: Option<&Predicate>) -> Result<Vec<Record>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, kind, fields, created_at FROM records WHERE kind = ?1 ORDER BY rowid")
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![kind], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })
            .map_err(store_err)?;

        let mut records = Vec::new();
        for row in rows {
            let (id, kind, fields, created_at) = row.map_err(store_err)?;
            let record = decode_record(id, kind, &fields, created_at)?;
            if predicate.map_or(true, |p| p.matches(&record)) {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn edges(&self, id: &RecordId) -> Result<Vec<Edge>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, relation, source_id, target_id FROM edges \
                 WHERE source_id = ?1 OR target_id = ?1 ORDER BY id",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![id.as_str()], |row| {
                Ok(Edge {
                    id: EdgeId(row.get(0)?),
                    relation: row.get(1)?,
                    source: RecordId(row.get(2)?),
                    target: RecordId(row.get(3)?),
                })
            })
            .map_err(store_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(store_err)
    }

    fn retarget(&mut self, edge: &Edge, from: &RecordId, to: &RecordId) -> Result<(), StoreError> {
        let current = self
            .load_edge(edge.id)?
            .ok_or_else(|| StoreError::NotFound(format!("edge {}", edge.id.0)))?;
        if !current.touches(from) {
            return Ok(());
        }
        self.ensure_transaction()?;

        let moved = current.redirected(from, to);
        let exists: bool = self
            .conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM edges \
                 WHERE relation = ?1 AND source_id = ?2 AND target_id = ?3 AND id <> ?4)",
                params![&moved.relation, moved.source.as_str(), moved.target.as_str(), moved.id.0],
                |row| row.get(0),
            )
            .map_err(store_err)?;

        if exists {
            self.conn
                .execute("DELETE FROM edges WHERE id = ?1", params![moved.id.0])
                .map_err(store_err)?;
        } else {
            self.conn
                .execute(
                    "UPDATE edges SET source_id = ?1, target_id = ?2 WHERE id = ?3",
                    params![moved.source.as_str(), moved.target.as_str(), moved.id.0],
                )
                .map_err(store_err)?;
        }
        Ok(())
    }

    fn remove(&mut self, id: &RecordId) -> Result<(), StoreError> {
        self.ensure_transaction()?;
        let deleted = self
            .conn
            .execute("DELETE FROM records WHERE id = ?1", params![id.as_str()])
            .map_err(store_err)?;
        if deleted == 0 {
            return Err(StoreError::NotFound(format!("record '{id}'")));
        }
        Ok(())
    }

    fn checkpoint(&mut self) -> Result<Checkpoint, StoreError> {
        self.ensure_transaction()?;
        let n = self.savepoints;
        self.conn
            .execute_batch(&format!("SAVEPOINT sp_{n}"))
            .map_err(store_err)?;
        self.savepoints += 1;
        Ok(Checkpoint(n))
    }

    fn rollback_to(&mut self, checkpoint: Checkpoint) -> Result<(), StoreError> {
        self.check_transaction()?;
        if !self.in_transaction || checkpoint.0 >= self.savepoints {
            return Err(StoreError::NotFound(format!("checkpoint {}", checkpoint.0)));
        }
        let n = checkpoint.0;
        self.conn
            .execute_batch(&format!("ROLLBACK TO sp_{n}; RELEASE sp_{n}"))
            .map_err(store_err)?;
        self.savepoints = n;
        log::debug!("rolled back to savepoint sp_{n}");
        Ok(())
    }

    fn release(&mut self, checkpoint: Checkpoint) -> Result<(), StoreError> {
        self.check_transaction()?;
        if !self.in_transaction || checkpoint.0 >= self.savepoints {
            return Err(StoreError::NotFound(format!("checkpoint {}", checkpoint.0)));
        }
        let n = checkpoint.0;
        self.conn
            .execute_batch(&format!("RELEASE sp_{n}"))
            .map_err(store_err)?;
        self.savepoints = n;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.check_transaction()?;
        if !self.in_transaction {
            return Ok(());
        }
        self.conn.execute_batch("COMMIT").map_err(store_err)?;
        self.in_transaction = false;
        self.savepoints = 0;
        Ok(())
    }
}

fn decode_record(
    id: String,
    kind: String,
    fields: &str,
    created_at: Option<String>,
) -> Result<Record, StoreError> {
    let fields: BTreeMap<String, String> = serde_json::from_str(fields)
        .map_err(|e| StoreError::Backend(format!("record '{id}': bad fields JSON: {e}")))?;
    let created_at = match created_at {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(&raw)
                .map_err(|_| StoreError::InvalidValue {
                    column: "created_at".into(),
                    record_id: id.clone(),
                    value: raw.clone(),
                })?
                .with_timezone(&Utc),
        ),
        None => None,
    };
    Ok(Record {
        id: RecordId(id),
        kind,
        fields,
        created_at,
    })
}

fn store_err(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::SqliteFailure(err, msg) if err.code == rusqlite::ErrorCode::ConstraintViolation => {
            StoreError::Constraint(msg.unwrap_or_else(|| err.to_string()))
        }
        other => StoreError::Backend(other.to_string()),
    }
}
