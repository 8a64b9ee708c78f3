//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain    | Description                                   |
//! |---------|-----------|-----------------------------------------------|
//! | 0       | Universal | Success                                       |
//! | 1       | Universal | General error (storage, IO)                   |
//! | 2       | Universal | Usage error or invalid dedup config           |
//! | 3-9     | dupes     | Scan and cleanup outcomes                     |
//! | 10-19   | import    | CSV import codes                              |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use holdings_dedup::StoreError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - storage or filesystem failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments. clap exits with the same code.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Dupes (3-9, plus 2 for config errors)
// =============================================================================

/// Config could not be parsed, failed validation, or names an unknown kind.
pub const EXIT_DUPES_INVALID_CONFIG: u8 = 2;

/// `scan` found at least one duplicate group.
pub const EXIT_DUPES_FOUND: u8 = 3;

/// `scan` could not read at least one kind; the report is incomplete.
/// Takes precedence over EXIT_DUPES_FOUND.
pub const EXIT_DUPES_SCAN_INCOMPLETE: u8 = 4;

/// `clean` removed what it could but some groups or a commit failed.
pub const EXIT_DUPES_PARTIAL: u8 = 5;

// =============================================================================
// Import (10-19)
// =============================================================================

/// CSV is missing a required column or holds an unparseable value.
pub const EXIT_IMPORT_INVALID: u8 = 10;

/// Rows rejected by the database (duplicate id, edge to unknown record).
pub const EXIT_IMPORT_CONSTRAINT: u8 = 11;

// =============================================================================
// Store Error Mapping
// =============================================================================

/// Map a StoreError raised during import to its exit code.
pub fn import_exit_code(err: &StoreError) -> u8 {
    match err {
        StoreError::Csv(_) | StoreError::MissingColumn { .. } | StoreError::InvalidValue { .. } => {
            EXIT_IMPORT_INVALID
        }
        StoreError::Constraint(_) => EXIT_IMPORT_CONSTRAINT,
        StoreError::NotFound(_) | StoreError::Backend(_) | StoreError::Injected(_) => EXIT_ERROR,
    }
}
