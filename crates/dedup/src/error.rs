use std::fmt;

#[derive(Debug)]
pub enum DedupError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (no kinds, empty key field, bad threshold, etc.).
    ConfigValidation(String),
    /// A requested kind is not configured.
    UnknownKind(String),
}

impl fmt::Display for DedupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::UnknownKind(kind) => write!(f, "unknown kind: {kind}"),
        }
    }
}

impl std::error::Error for DedupError {}

/// Errors raised by a [`crate::RecordStore`] implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Record or edge does not exist.
    NotFound(String),
    /// Mutation rejected by an integrity rule (e.g. removing a record
    /// that is still referenced by an edge).
    Constraint(String),
    /// Underlying storage engine failure (query, transaction, ...).
    Backend(String),
    /// Missing required column in imported data.
    MissingColumn { column: String },
    /// A value in imported data could not be parsed.
    InvalidValue { column: String, record_id: String, value: String },
    /// Imported data is not well-formed CSV.
    Csv(String),
    /// Failure injected by a test store.
    Injected(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::Constraint(msg) => write!(f, "constraint violation: {msg}"),
            Self::Backend(msg) => write!(f, "storage error: {msg}"),
            Self::MissingColumn { column } => write!(f, "missing column '{column}'"),
            Self::InvalidValue { column, record_id, value } => {
                write!(f, "record '{record_id}': cannot parse {column} '{value}'")
            }
            Self::Csv(msg) => write!(f, "malformed CSV: {msg}"),
            Self::Injected(msg) => write!(f, "injected failure: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}
