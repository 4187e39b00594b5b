// crates/mirrordb-core/src/identifiers.rs
// ============================================================================
// Module: Identifiers
// Description: Quoting, normalization, and generated object names.
// Purpose: Keep generated SQL names deterministic and collision-free.
// Dependencies: none
// ============================================================================

//! ## Overview
//! Companion tables and triggers are named from the lower-cased source table
//! plus a fixed suffix. Names beginning with `__` or `sqlite_`, and names
//! ending in a companion suffix, are reserved: user statements may read them
//! but never write them.

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Prefix shared by every internal table.
pub const INTERNAL_PREFIX: &str = "__";
/// Prefix SQLite reserves for its own objects.
const SQLITE_PREFIX: &str = "sqlite_";

// ============================================================================
// SECTION: Change Kinds
// ============================================================================

/// Row change captured by a companion table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeKind {
    /// Inserted rows.
    Add,
    /// Updated rows (new image).
    Set,
    /// Deleted rows (old image).
    Del,
}

impl ChangeKind {
    /// All kinds in memory-apply order.
    pub const APPLY_ORDER: [Self; 3] = [Self::Del, Self::Add, Self::Set];

    /// Companion table suffix.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Add => "__add",
            Self::Set => "__set",
            Self::Del => "__del",
        }
    }

    /// Trigger name suffix for the event feeding this companion.
    #[must_use]
    pub const fn trigger_suffix(self) -> &'static str {
        match self {
            Self::Add => "__on_insert",
            Self::Set => "__on_update",
            Self::Del => "__on_delete",
        }
    }
}

// ============================================================================
// SECTION: Naming
// ============================================================================

/// Lower-cases a table name for registry and set membership.
#[must_use]
pub fn normalize(name: &str) -> String {
    name.to_lowercase()
}

/// Quotes an identifier with double quotes.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quotes a string literal with single quotes.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Name of the companion table of `table` for `kind`.
#[must_use]
pub fn companion_table(table: &str, kind: ChangeKind) -> String {
    format!("{}{}", normalize(table), kind.suffix())
}

/// Name of the change-capture trigger of `table` for `kind`.
#[must_use]
pub fn trigger_name(table: &str, kind: ChangeKind) -> String {
    format!("{}{}", normalize(table), kind.trigger_suffix())
}

/// Returns true when user statements must not write `name`.
#[must_use]
pub fn is_reserved_table(name: &str) -> bool {
    let name = normalize(name);
    name.starts_with(INTERNAL_PREFIX)
        || name.starts_with(SQLITE_PREFIX)
        || [ChangeKind::Add, ChangeKind::Set, ChangeKind::Del]
            .iter()
            .any(|kind| name.ends_with(kind.suffix()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn companion_names_are_lowercase_and_suffixed() {
        assert_eq!(companion_table("Users", ChangeKind::Add), "users__add");
        assert_eq!(trigger_name("Users", ChangeKind::Del), "users__on_delete");
    }

    #[test]
    fn reserved_names_cover_internal_and_companion_tables() {
        assert!(is_reserved_table("__tables"));
        assert!(is_reserved_table("orders__SET"));
        assert!(is_reserved_table("sqlite_sequence"));
        assert!(!is_reserved_table("orders"));
        assert!(!is_reserved_table("my__table"));
    }

    #[test]
    fn quoting_escapes_embedded_quotes() {
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(quote_literal("it's"), "'it''s'");
    }
}
