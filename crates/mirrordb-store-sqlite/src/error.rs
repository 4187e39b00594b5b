// crates/mirrordb-store-sqlite/src/error.rs
// ============================================================================
// Module: SQLite Store Errors
// Description: Error type shared by the durable, memory, and log stores.
// Purpose: Carry engine messages as owned strings.
// Dependencies: thiserror
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - `Db` messages are the engine's own text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored data could not be decoded.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store input.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// A shared connection lock was poisoned.
    #[error("sqlite store lock poisoned")]
    Poisoned,
}

