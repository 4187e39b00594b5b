// crates/mirrordb-store-sqlite/src/memory.rs
// ============================================================================
// Module: Memory Target
// Description: In-memory SQLite mirror of the memory-designated tables.
// Purpose: Serve fast reads and receive replayed commit deltas.
// Dependencies: mirrordb-core, rusqlite, tracing
// ============================================================================

//! ## Overview
//! The mirror is a single in-memory connection shared behind a mutex. Workers
//! read through [`MemoryStore::query`]; only the saver writes, through
//! [`MemoryStore::apply`], which replays schema changes and row deltas in one
//! transaction.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;

use mirrordb_core::ChangeKind;
use mirrordb_core::RowSet;
use mirrordb_core::TableRows;
use mirrordb_core::Value;
use mirrordb_core::identifiers::normalize;
use mirrordb_core::identifiers::quote_identifier;
use rusqlite::Connection;

use crate::connection::open_memory;
use crate::error::SqliteStoreError;
use crate::value;

// ============================================================================
// SECTION: Schema Changes
// ============================================================================

/// Schema change replayed on the mirror.
#[derive(Debug, Clone, PartialEq)]
pub enum MemorySchemaChange {
    /// (Re)create a table from durable DDL and load its rows.
    Create {
        /// Lower-cased table name.
        table: String,
        /// `CREATE TABLE` text from the durable catalog.
        sql: String,
        /// Rows to load after creation.
        rows: RowSet,
    },
    /// Drop a table.
    Drop {
        /// Lower-cased table name.
        table: String,
    },
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Shared in-memory mirror.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    /// Mirror connection.
    connection: Arc<Mutex<Connection>>,
}

impl MemoryStore {
    /// Opens an empty mirror.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] when the connection cannot be opened.
    pub fn open() -> Result<Self, SqliteStoreError> {
        Ok(Self {
            connection: Arc::new(Mutex::new(open_memory()?)),
        })
    }

    /// Executes a read against the mirror.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] on engine failure or a poisoned lock.
    pub fn query(&self, sql: &str, params: &[Value]) -> Result<Option<RowSet>, SqliteStoreError> {
        let guard = self.connection.lock().map_err(|_| SqliteStoreError::Poisoned)?;
        value::execute(&guard, sql, params)
    }

    /// Names of the tables present in the mirror.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] on engine failure or a poisoned lock.
    pub fn tables(&self) -> Result<BTreeSet<String>, SqliteStoreError> {
        let guard = self.connection.lock().map_err(|_| SqliteStoreError::Poisoned)?;
        mirrored_tables(&guard)
    }

    /// Applies schema changes, then row deltas, in one transaction.
    ///
    /// Row deltas for tables absent from the mirror are skipped. Returns the
    /// number of rows applied.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] on engine failure or a poisoned lock; the
    /// transaction is rolled back.
    pub fn apply(
        &self,
        schema: &[MemorySchemaChange],
        changes: &[(ChangeKind, TableRows)],
    ) -> Result<usize, SqliteStoreError> {
        let mut guard = self.connection.lock().map_err(|_| SqliteStoreError::Poisoned)?;
        let tx = guard.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        for change in schema {
            apply_schema(&tx, change)?;
        }
        let present = mirrored_tables(&tx)?;
        let mut applied = 0;
        for (kind, rows) in changes {
            if !present.contains(&rows.table) {
                continue;
            }
            applied += apply_rows(&tx, *kind, rows)?;
        }
        tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(applied)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Lists user tables in the mirror.
fn mirrored_tables(connection: &Connection) -> Result<BTreeSet<String>, SqliteStoreError> {
    let rows = value::query(
        connection,
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        &[],
    )?;
    Ok(rows
        .rows
        .into_iter()
        .filter_map(|row| match row.into_iter().next() {
            Some(Value::Text(name)) => Some(normalize(&name)),
            _ => None,
        })
        .collect())
}

/// Replays one schema change.
fn apply_schema(connection: &Connection, change: &MemorySchemaChange) -> Result<(), SqliteStoreError> {
    match change {
        MemorySchemaChange::Create {
            table,
            sql,
            rows,
        } => {
            connection
                .execute_batch(&format!("DROP TABLE IF EXISTS {};", quote_identifier(table)))
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            connection.execute_batch(sql).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            if !rows.rows.is_empty() {
                let insert = insert_sql(table, &rows.columns, false);
                for row in &rows.rows {
                    value::execute(connection, &insert, row)?;
                }
            }
            tracing::debug!(table = %table, rows = rows.rows.len(), "memory table created");
        }
        MemorySchemaChange::Drop {
            table,
        } => {
            connection
                .execute_batch(&format!("DROP TABLE IF EXISTS {};", quote_identifier(table)))
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tracing::debug!(table = %table, "memory table dropped");
        }
    }
    Ok(())
}

/// Applies rows of one change kind to one table.
fn apply_rows(connection: &Connection, kind: ChangeKind, rows: &TableRows) -> Result<usize, SqliteStoreError> {
    let key_positions: Vec<usize> = rows
        .keys
        .iter()
        .filter_map(|key| rows.columns.iter().position(|c| c.eq_ignore_ascii_case(key)))
        .collect();
    let keyed = !rows.keys.is_empty() && key_positions.len() == rows.keys.len();
    match kind {
        ChangeKind::Add | ChangeKind::Set => {
            let insert = insert_sql(&rows.table, &rows.columns, keyed);
            for row in &rows.rows {
                value::execute(connection, &insert, row)?;
            }
        }
        ChangeKind::Del if keyed => {
            let predicate = match_predicate(key_positions.iter().map(|i| &rows.columns[*i]));
            let delete = format!("DELETE FROM {} WHERE {predicate}", quote_identifier(&rows.table));
            for row in &rows.rows {
                let key: Vec<Value> = key_positions.iter().filter_map(|i| row.get(*i).cloned()).collect();
                value::execute(connection, &delete, &key)?;
            }
        }
        ChangeKind::Del => {
            let table = quote_identifier(&rows.table);
            let predicate = match_predicate(rows.columns.iter());
            let delete = format!(
                "DELETE FROM {table} WHERE rowid IN (SELECT rowid FROM {table} WHERE {predicate} LIMIT 1)"
            );
            for row in &rows.rows {
                value::execute(connection, &delete, row)?;
            }
        }
    }
    Ok(rows.rows.len())
}

/// `INSERT [OR REPLACE] INTO t (cols) VALUES (?, ...)`.
fn insert_sql(table: &str, columns: &[String], replace: bool) -> String {
    let verb = if replace { "INSERT OR REPLACE INTO" } else { "INSERT INTO" };
    let names: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
    let slots = vec!["?"; columns.len()].join(", ");
    format!("{verb} {} ({}) VALUES ({slots})", quote_identifier(table), names.join(", "))
}

/// `"a" IS ? AND "b" IS ?` over the given columns.
fn match_predicate<'a>(columns: impl Iterator<Item = &'a String>) -> String {
    columns.map(|c| format!("{} IS ?", quote_identifier(c))).collect::<Vec<_>>().join(" AND ")
}
