// crates/mirrordb-core/src/registry.rs
// ============================================================================
// Module: Table Registry
// Description: Registry rows and runtime variables kept in the durable store.
// Purpose: Name the internal tables shared by generated triggers and stores.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every user table gets one [`TableRegistryEntry`] in `__tables`. Runtime
//! flags live in `__variables` keyed by [`Variable`]. The names are defined
//! here because generated trigger bodies reference them directly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Internal Tables
// ============================================================================

/// Table registry.
pub const TABLES_TABLE: &str = "__tables";
/// Runtime variables.
pub const VARIABLES_TABLE: &str = "__variables";
/// Commit ids whose durable transaction committed.
pub const APPLIED_TABLE: &str = "__applied";

// ============================================================================
// SECTION: Types
// ============================================================================

/// One registry row.
///
/// # Invariants
/// - `name` is lower-cased.
/// - `change_count` is zero between statements (tared after each read).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRegistryEntry {
    /// Lower-cased table name.
    pub name: String,
    /// Declared key columns.
    pub keys: Vec<String>,
    /// Auto-increment key columns.
    pub auto_keys: Vec<String>,
    /// Table is mirrored in memory.
    pub is_memory: bool,
    /// Captured changes since the last tare.
    pub change_count: i64,
}

/// Runtime variable names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variable {
    /// Triggers capture row changes when `1`.
    IsDiff,
    /// Database mirrors tables in memory when `1`.
    IsMemory,
    /// Captured changes since the last tare.
    ChangeCount,
    /// Unix milliseconds of the most recent submission.
    LastAccess,
}

impl Variable {
    /// Every variable, in seeding order.
    pub const ALL: [Self; 4] = [Self::IsDiff, Self::IsMemory, Self::ChangeCount, Self::LastAccess];

    /// Stored variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IsDiff => "isDiff",
            Self::IsMemory => "isMemory",
            Self::ChangeCount => "changeCount",
            Self::LastAccess => "lastAccess",
        }
    }
}
