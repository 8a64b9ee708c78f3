// CSV import for records and edges

use chrono::{DateTime, NaiveDate, Utc};

use holdings_dedup::{Record, RecordId, StoreError};

/// Which CSV columns carry the record identity and creation time.
/// Every other column becomes a record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordColumns {
    pub id: String,
    pub created_at: Option<String>,
}

impl Default for RecordColumns {
    fn default() -> Self {
        Self {
            id: "id".into(),
            created_at: None,
        }
    }
}

/// One row of an edge CSV: `relation,source,target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRow {
    pub relation: String,
    pub source: RecordId,
    pub target: RecordId,
}

impl EdgeRow {
    pub fn new(relation: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            source: RecordId::new(source),
            target: RecordId::new(target),
        }
    }
}

fn read_headers(reader: &mut csv::Reader<&[u8]>) -> Result<Vec<String>, StoreError> {
    Ok(reader
        .headers()
        .map_err(|e| StoreError::Csv(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect())
}

fn column_index(headers: &[String], name: &str) -> Result<usize, StoreError> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| StoreError::MissingColumn { column: name.into() })
}

/// Load records of one kind from CSV text. Cells are kept verbatim;
/// normalization happens at detection time.
pub fn load_csv_records(
    kind: &str,
    csv_data: &str,
    columns: &RecordColumns,
) -> Result<Vec<Record>, StoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv_data.as_bytes());
    let headers = read_headers(&mut reader)?;

    let id_idx = column_index(&headers, &columns.id)?;
    let created_idx = match columns.created_at {
        Some(ref name) => Some(column_index(&headers, name)?),
        None => None,
    };

    let mut records = Vec::new();
    for (row_num, result) in reader.records().enumerate() {
        let row = result.map_err(|e| StoreError::Csv(e.to_string()))?;

        let id = row.get(id_idx).unwrap_or("").trim();
        if id.is_empty() {
            // header is line 1
            return Err(StoreError::InvalidValue {
                column: columns.id.clone(),
                record_id: format!("line {}", row_num + 2),
                value: String::new(),
            });
        }

        let mut record = Record::new(id, kind);
        for (i, header) in headers.iter().enumerate() {
            if i == id_idx || Some(i) == created_idx {
                continue;
            }
            record = record.with_field(header.as_str(), row.get(i).unwrap_or(""));
        }

        if let Some(idx) = created_idx {
            let raw = row.get(idx).unwrap_or("").trim();
            if !raw.is_empty() {
                record.created_at = Some(parse_timestamp(raw).ok_or_else(|| {
                    StoreError::InvalidValue {
                        column: headers[idx].clone(),
                        record_id: id.to_string(),
                        value: raw.to_string(),
                    }
                })?);
            }
        }

        records.push(record);
    }

    Ok(records)
}

/// Load edges from CSV text with `relation`, `source` and `target` columns.
pub fn load_csv_edges(csv_data: &str) -> Result<Vec<EdgeRow>, StoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv_data.as_bytes());
    let headers = read_headers(&mut reader)?;

    let relation_idx = column_index(&headers, "relation")?;
    let source_idx = column_index(&headers, "source")?;
    let target_idx = column_index(&headers, "target")?;

    let mut edges = Vec::new();
    for (row_num, result) in reader.records().enumerate() {
        let row = result.map_err(|e| StoreError::Csv(e.to_string()))?;
        let cell = |idx: usize| row.get(idx).unwrap_or("").trim().to_string();

        let edge = EdgeRow::new(cell(relation_idx), cell(source_idx), cell(target_idx));
        for (column, value) in [
            ("relation", edge.relation.as_str()),
            ("source", edge.source.as_str()),
            ("target", edge.target.as_str()),
        ] {
            if value.is_empty() {
                return Err(StoreError::InvalidValue {
                    column: column.into(),
                    record_id: format!("line {}", row_num + 2),
                    value: String::new(),
                });
            }
        }
        edges.push(edge);
    }

    Ok(edges)
}

/// RFC 3339 timestamp, or a bare `YYYY-MM-DD` date taken as midnight UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}
