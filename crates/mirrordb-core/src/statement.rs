// crates/mirrordb-core/src/statement.rs
// ============================================================================
// Module: Classified Statements
// Description: Parameter values, statement kinds, and classified statements.
// Purpose: Carry one statement's text, parameters, and extracted metadata.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`Statement`] is produced once by the classifier and never mutated. It
//! carries the trimmed text, its positional [`Value`] parameters, its
//! [`StatementKind`], the lower-cased table names it reads and writes, and,
//! for table-modify statements, a [`SchemaChange`] describing what the diff
//! generator must rebuild.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Values
// ============================================================================

/// Positional parameter or cell value.
///
/// # Invariants
/// - Serializes untagged: `null`, integers, reals, strings, and byte arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// 64-bit integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Blob(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

// ============================================================================
// SECTION: Kinds
// ============================================================================

/// Statement classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatementKind {
    /// `BEGIN` / `START TRANSACTION`.
    BeginTransaction,
    /// `ROLLBACK`.
    RollbackTransaction,
    /// `COMMIT` / `END`.
    CommitTransaction,
    /// `CREATE TABLE`.
    CreateTable,
    /// `ALTER TABLE ... RENAME TO`.
    RenameTable,
    /// `ALTER TABLE` column changes.
    ModifyTableColumns,
    /// `DROP TABLE`.
    DropTable,
    /// `INSERT` / `REPLACE`.
    Insert,
    /// `UPDATE`.
    Update,
    /// `DELETE`.
    Delete,
    /// Queries.
    Select,
    /// Everything else (indexes, views, triggers, pragmas, savepoints).
    Other,
}

impl StatementKind {
    /// Returns true for kinds that never change data or schema.
    #[must_use]
    pub const fn is_read_only(self) -> bool {
        matches!(
            self,
            Self::Select | Self::BeginTransaction | Self::CommitTransaction | Self::RollbackTransaction
        )
    }

    /// Returns true for table-modify kinds handled by the diff generator.
    #[must_use]
    pub const fn is_table_modify(self) -> bool {
        matches!(
            self,
            Self::CreateTable | Self::RenameTable | Self::ModifyTableColumns | Self::DropTable
        )
    }

    /// Returns true for row-modifying kinds.
    #[must_use]
    pub const fn is_data_modify(self) -> bool {
        matches!(self, Self::Insert | Self::Update | Self::Delete)
    }

    /// Returns true for kinds that end a transaction.
    #[must_use]
    pub const fn is_transaction_end(self) -> bool {
        matches!(self, Self::CommitTransaction | Self::RollbackTransaction)
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BeginTransaction => "begin transaction",
            Self::RollbackTransaction => "rollback transaction",
            Self::CommitTransaction => "commit transaction",
            Self::CreateTable => "create table",
            Self::RenameTable => "rename table",
            Self::ModifyTableColumns => "modify table columns",
            Self::DropTable => "drop table",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Select => "select",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}

// ============================================================================
// SECTION: Table Definitions
// ============================================================================

/// Column of a table definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name as declared.
    pub name: String,
    /// Declared type text, if any.
    pub data_type: Option<String>,
}

/// Table shape extracted from a `CREATE TABLE` statement.
///
/// # Invariants
/// - `name` is lower-cased.
/// - Every entry of `primary_keys` and `auto_increment` names a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Lower-cased table name.
    pub name: String,
    /// Temporary tables get no diff infrastructure.
    pub temporary: bool,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDefinition>,
    /// Primary key columns in key order.
    pub primary_keys: Vec<String>,
    /// Auto-increment columns.
    pub auto_increment: Vec<String>,
}

impl TableDefinition {
    /// Returns the column names in declaration order.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Schema effect of a table-modify statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
    /// A table was created. `definition` is `None` for `CREATE TABLE AS`.
    Create {
        /// Lower-cased table name.
        table: String,
        /// Temporary table.
        temporary: bool,
        /// Parsed definition when columns were declared.
        definition: Option<TableDefinition>,
    },
    /// A table was renamed.
    Rename {
        /// Old lower-cased name.
        from: String,
        /// New lower-cased name.
        to: String,
    },
    /// Columns were added, dropped, or renamed.
    Modify {
        /// Lower-cased table name.
        table: String,
    },
    /// A table was dropped.
    Drop {
        /// Lower-cased table name.
        table: String,
        /// `IF EXISTS` was given.
        if_exists: bool,
    },
}

impl SchemaChange {
    /// Returns the table whose schema ends up affected.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::Create {
                table, ..
            }
            | Self::Modify {
                table,
            }
            | Self::Drop {
                table, ..
            } => table,
            Self::Rename {
                to, ..
            } => to,
        }
    }
}

// ============================================================================
// SECTION: Statement
// ============================================================================

/// One classified statement.
///
/// # Invariants
/// - `query` is trimmed and keeps its terminating `;` when one was present.
/// - Table names in `tables_read`/`tables_write` are lower-cased.
/// - `params.len()` equals the number of `?` placeholders in `query`.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Statement text.
    pub query: String,
    /// Positional parameters.
    pub params: Vec<Value>,
    /// Classification.
    pub kind: StatementKind,
    /// Statement reads data (queries, or writes embedding a query).
    pub is_read: bool,
    /// Tables read.
    pub tables_read: BTreeSet<String>,
    /// Tables written.
    pub tables_write: BTreeSet<String>,
    /// Columns named by the statement (defined, inserted, or assigned).
    pub columns: Vec<String>,
    /// Auto-increment columns of a defined table.
    pub auto_increment: Vec<String>,
    /// Primary key columns of a defined table.
    pub primary_keys: Vec<String>,
    /// Schema effect for table-modify kinds.
    pub schema_change: Option<SchemaChange>,
    /// Statement was synthesized by the assembler rather than submitted.
    pub synthesized: bool,
}

/// Text of a synthesized begin statement.
pub const SYNTHETIC_BEGIN: &str = "BEGIN TRANSACTION;";
/// Text of a synthesized commit statement.
pub const SYNTHETIC_COMMIT: &str = "COMMIT TRANSACTION;";

impl Statement {
    /// Creates a metadata-free statement of the given kind.
    #[must_use]
    pub fn bare(query: impl Into<String>, params: Vec<Value>, kind: StatementKind) -> Self {
        Self {
            query: query.into(),
            params,
            kind,
            is_read: kind == StatementKind::Select,
            tables_read: BTreeSet::new(),
            tables_write: BTreeSet::new(),
            columns: Vec::new(),
            auto_increment: Vec::new(),
            primary_keys: Vec::new(),
            schema_change: None,
            synthesized: false,
        }
    }

    /// Returns the assembler's synthesized `BEGIN TRANSACTION;`.
    #[must_use]
    pub fn synthesized_begin() -> Self {
        Self {
            synthesized: true,
            ..Self::bare(SYNTHETIC_BEGIN, Vec::new(), StatementKind::BeginTransaction)
        }
    }

    /// Returns the assembler's synthesized `COMMIT TRANSACTION;`.
    #[must_use]
    pub fn synthesized_commit() -> Self {
        Self {
            synthesized: true,
            ..Self::bare(SYNTHETIC_COMMIT, Vec::new(), StatementKind::CommitTransaction)
        }
    }

    /// Returns true when text and parameters both match `other`.
    #[must_use]
    pub fn same_submission(&self, other: &Self) -> bool {
        self.query == other.query && self.params == other.params
    }
}
