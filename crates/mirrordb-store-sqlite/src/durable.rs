// crates/mirrordb-store-sqlite/src/durable.rs
// ============================================================================
// Module: Durable Target
// Description: File-backed SQLite target with registry, variables, capture.
// Purpose: Execute commits durably and expose captured row changes.
// Dependencies: mirrordb-core, rusqlite, serde_json, tracing
// ============================================================================

//! ## Overview
//! [`DurableStore`] owns the database path and initializes the internal
//! tables once; every worker then opens its own [`DurableConnection`].
//! Transactions are driven explicitly so an interactive transaction can stay
//! open across calls.
//!
//! Internal tables:
//! - `__tables`: one registry row per user table
//! - `__variables`: `isDiff`, `isMemory`, `changeCount`, `lastAccess`
//! - `__applied`: commit ids whose durable transaction committed
//! - `__store_meta`: schema version

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;

use mirrordb_core::ChangeKind;
use mirrordb_core::CommitId;
use mirrordb_core::DiffError;
use mirrordb_core::GeneratedSql;
use mirrordb_core::RowSet;
use mirrordb_core::SchemaCatalog;
use mirrordb_core::TableRegistryEntry;
use mirrordb_core::TableRows;
use mirrordb_core::Value;
use mirrordb_core::Variable;
use mirrordb_core::identifiers::companion_table;
use mirrordb_core::identifiers::quote_identifier;
use mirrordb_core::registry::APPLIED_TABLE;
use mirrordb_core::registry::TABLES_TABLE;
use mirrordb_core::registry::VARIABLES_TABLE;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;

use crate::config::SqliteStoreConfig;
use crate::connection::enable_recursive_triggers;
use crate::connection::ensure_parent_dir;
use crate::connection::open_file;
use crate::connection::validate_store_path;
use crate::error::SqliteStoreError;
use crate::value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Durable schema version.
const SCHEMA_VERSION: i64 = 1;

// ============================================================================
// SECTION: Store
// ============================================================================

/// Durable target factory.
///
/// # Invariants
/// - The internal tables exist once [`DurableStore::open`] returns.
#[derive(Debug, Clone)]
pub struct DurableStore {
    /// Database file.
    path: PathBuf,
    /// Connection settings.
    config: SqliteStoreConfig,
}

impl DurableStore {
    /// Opens the durable database, creating internal tables as needed.
    ///
    /// `is_memory` seeds the `isMemory` variable.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is invalid, the database
    /// cannot be opened, or its schema version is unsupported.
    pub fn open(
        path: impl Into<PathBuf>,
        config: SqliteStoreConfig,
        is_memory: bool,
    ) -> Result<Self, SqliteStoreError> {
        let path = path.into();
        validate_store_path(&path)?;
        ensure_parent_dir(&path)?;
        let mut connection = open_file(&path, &config)?;
        initialize_schema(&mut connection, is_memory)?;
        tracing::debug!(path = %path.display(), "durable store initialized");
        Ok(Self {
            path,
            config,
        })
    }

    /// Database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens a new connection for one worker.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] when the connection cannot be opened.
    pub fn connect(&self) -> Result<DurableConnection, SqliteStoreError> {
        let connection = open_file(&self.path, &self.config)?;
        enable_recursive_triggers(&connection)?;
        Ok(DurableConnection {
            connection,
        })
    }
}

/// Creates internal tables and checks the schema version.
fn initialize_schema(connection: &mut Connection, is_memory: bool) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS __store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM __store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO __store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {TABLES_TABLE} (
                    name TEXT PRIMARY KEY,
                    keys TEXT NOT NULL,
                    auto_keys TEXT NOT NULL,
                    is_memory INTEGER NOT NULL DEFAULT 0,
                    change_count INTEGER NOT NULL DEFAULT 0
                );
                CREATE TABLE IF NOT EXISTS {VARIABLES_TABLE} (
                    name TEXT PRIMARY KEY,
                    value
                );
                CREATE TABLE IF NOT EXISTS {APPLIED_TABLE} (
                    id INTEGER PRIMARY KEY
                );"
            ))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    for variable in Variable::ALL {
        tx.execute(
            &format!("INSERT OR IGNORE INTO {VARIABLES_TABLE} (name, value) VALUES (?1, 0)"),
            params![variable.as_str()],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    }
    tx.execute(
        &format!("UPDATE {VARIABLES_TABLE} SET value = ?1 WHERE name = ?2"),
        params![i64::from(is_memory), Variable::IsMemory.as_str()],
    )
    .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute(
        &format!("UPDATE {VARIABLES_TABLE} SET value = 0 WHERE name = ?1"),
        params![Variable::IsDiff.as_str()],
    )
    .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

// ============================================================================
// SECTION: Connection
// ============================================================================

/// One worker's connection to the durable target.
#[derive(Debug)]
pub struct DurableConnection {
    /// Underlying connection.
    connection: Connection,
}

impl DurableConnection {
    /// Returns true while an explicit transaction is open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        !self.connection.is_autocommit()
    }

    /// Opens a transaction. Write transactions take the write lock at `BEGIN`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] when `BEGIN` fails.
    pub fn begin(&self, write: bool) -> Result<(), SqliteStoreError> {
        let sql = if write { "BEGIN IMMEDIATE;" } else { "BEGIN DEFERRED;" };
        self.connection.execute_batch(sql).map_err(|err| SqliteStoreError::Db(err.to_string()))
    }

    /// Commits the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] when `COMMIT` fails.
    pub fn commit(&self) -> Result<(), SqliteStoreError> {
        self.connection
            .execute_batch("COMMIT;")
            .map_err(|err| SqliteStoreError::Db(err.to_string()))
    }

    /// Rolls back the open transaction, if any.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] when `ROLLBACK` fails.
    pub fn rollback(&self) -> Result<(), SqliteStoreError> {
        if !self.in_transaction() {
            return Ok(());
        }
        self.connection
            .execute_batch("ROLLBACK;")
            .map_err(|err| SqliteStoreError::Db(err.to_string()))
    }

    /// Executes a user statement.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] with the engine message on failure.
    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<Option<RowSet>, SqliteStoreError> {
        value::execute(&self.connection, sql, params)
    }

    /// Executes generated diff SQL in order.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] on the first failing statement.
    pub fn run_generated(&self, statements: &[GeneratedSql]) -> Result<(), SqliteStoreError> {
        for statement in statements {
            value::execute(&self.connection, &statement.sql, &statement.params)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Variables
    // ------------------------------------------------------------------------

    /// Reads a runtime variable.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] when the read fails.
    pub fn variable(&self, variable: Variable) -> Result<Value, SqliteStoreError> {
        let rows = value::query(
            &self.connection,
            &format!("SELECT value FROM {VARIABLES_TABLE} WHERE name = ?"),
            &[Value::from(variable.as_str())],
        )?;
        Ok(rows.rows.into_iter().next().and_then(|row| row.into_iter().next()).unwrap_or(Value::Null))
    }

    /// Writes a runtime variable.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] when the write fails.
    pub fn set_variable(&self, variable: Variable, value: Value) -> Result<(), SqliteStoreError> {
        value::execute(
            &self.connection,
            &format!("INSERT OR REPLACE INTO {VARIABLES_TABLE} (name, value) VALUES (?, ?)"),
            &[Value::from(variable.as_str()), value],
        )
        .map(|_| ())
    }

    /// Turns change capture on or off.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] when the write fails.
    pub fn set_diff(&self, enabled: bool) -> Result<(), SqliteStoreError> {
        self.set_variable(Variable::IsDiff, Value::Integer(i64::from(enabled)))
    }

    // ------------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------------

    /// Lists every registry row.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the read fails or a key list is not
    /// valid JSON.
    pub fn registry(&self) -> Result<Vec<TableRegistryEntry>, SqliteStoreError> {
        self.registry_where("1 = 1")
    }

    /// Names of tables flagged for the memory mirror.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the registry cannot be read.
    pub fn memory_tables(&self) -> Result<BTreeSet<String>, SqliteStoreError> {
        Ok(self.registry_where("is_memory = 1")?.into_iter().map(|entry| entry.name).collect())
    }

    /// Flags the configured tables for the memory mirror.
    ///
    /// Flags already set are kept, so a memory table renamed by an earlier
    /// commit stays mirrored under its new name.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] when the update fails.
    pub fn flag_memory_tables(&self, tables: &BTreeSet<String>) -> Result<(), SqliteStoreError> {
        for entry in self.registry()? {
            if !entry.is_memory && tables.contains(&entry.name) {
                value::execute(
                    &self.connection,
                    &format!("UPDATE {TABLES_TABLE} SET is_memory = 1 WHERE name = ?"),
                    &[Value::Text(entry.name)],
                )?;
            }
        }
        Ok(())
    }

    /// Reads registry rows matching a fixed filter.
    fn registry_where(&self, filter: &str) -> Result<Vec<TableRegistryEntry>, SqliteStoreError> {
        let mut statement = self
            .connection
            .prepare(&format!(
                "SELECT name, keys, auto_keys, is_memory, change_count FROM {TABLES_TABLE} \
                 WHERE {filter} ORDER BY name"
            ))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = statement
            .query_map(params![], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut entries = Vec::new();
        for row in rows {
            let (name, keys, auto_keys, is_memory, change_count) =
                row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            entries.push(TableRegistryEntry {
                name,
                keys: serde_json::from_str(&keys)
                    .map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?,
                auto_keys: serde_json::from_str(&auto_keys)
                    .map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?,
                is_memory: is_memory != 0,
                change_count,
            });
        }
        Ok(entries)
    }

    // ------------------------------------------------------------------------
    // Change Capture
    // ------------------------------------------------------------------------

    /// Reads and tares captured rows of every table with pending changes.
    ///
    /// Rows come back per table in delete, insert, update order.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when a companion table cannot be read or
    /// cleared.
    pub fn capture_changes(&self) -> Result<Vec<(ChangeKind, TableRows)>, SqliteStoreError> {
        let pending = self.variable(Variable::ChangeCount)?;
        if matches!(pending, Value::Integer(0) | Value::Null) {
            return Ok(Vec::new());
        }
        let mut captured = Vec::new();
        for entry in self.registry_where("change_count > 0")? {
            for kind in ChangeKind::APPLY_ORDER {
                let rows = value::query(
                    &self.connection,
                    &format!("SELECT * FROM {}", quote_identifier(&companion_table(&entry.name, kind))),
                    &[],
                )?;
                if !rows.rows.is_empty() {
                    captured.push((kind, TableRows {
                        table: entry.name.clone(),
                        columns: rows.columns,
                        keys: entry.keys.clone(),
                        rows: rows.rows,
                    }));
                }
            }
        }
        self.tare()?;
        Ok(captured)
    }

    /// Clears companion tables and change counters.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] when a clear fails.
    pub fn tare(&self) -> Result<(), SqliteStoreError> {
        for entry in self.registry_where("change_count > 0")? {
            for kind in ChangeKind::APPLY_ORDER {
                self.connection
                    .execute_batch(&format!(
                        "DELETE FROM {};",
                        quote_identifier(&companion_table(&entry.name, kind))
                    ))
                    .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            }
        }
        self.connection
            .execute_batch(&format!(
                "UPDATE {TABLES_TABLE} SET change_count = 0 WHERE change_count > 0;
                 UPDATE {VARIABLES_TABLE} SET value = 0 WHERE name = '{}';",
                Variable::ChangeCount.as_str()
            ))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))
    }

    // ------------------------------------------------------------------------
    // Applied Commits
    // ------------------------------------------------------------------------

    /// Records that `id` is being committed in the open transaction.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] when the insert fails.
    pub fn record_applied(&self, id: CommitId) -> Result<(), SqliteStoreError> {
        self.connection
            .execute(&format!("INSERT OR IGNORE INTO {APPLIED_TABLE} (id) VALUES (?1)"), params![id.0])
            .map(|_| ())
            .map_err(|err| SqliteStoreError::Db(err.to_string()))
    }

    /// Returns true when `id` committed durably.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] when the read fails.
    pub fn is_applied(&self, id: CommitId) -> Result<bool, SqliteStoreError> {
        self.connection
            .query_row(&format!("SELECT 1 FROM {APPLIED_TABLE} WHERE id = ?1"), params![id.0], |_| Ok(()))
            .optional()
            .map(|found| found.is_some())
            .map_err(|err| SqliteStoreError::Db(err.to_string()))
    }

    /// Forgets every applied id.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] when the delete fails.
    pub fn clear_applied(&self) -> Result<(), SqliteStoreError> {
        self.connection
            .execute_batch(&format!("DELETE FROM {APPLIED_TABLE};"))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))
    }

    /// Highest applied id, if any.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] when the read fails.
    pub fn max_applied(&self) -> Result<Option<CommitId>, SqliteStoreError> {
        self.connection
            .query_row(&format!("SELECT MAX(id) FROM {APPLIED_TABLE}"), params![], |row| {
                row.get::<_, Option<i64>>(0)
            })
            .map(|id| id.map(CommitId))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))
    }

    // ------------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------------

    /// Schema catalog view over this connection.
    #[must_use]
    pub const fn catalog(&self) -> SqliteCatalog<'_> {
        SqliteCatalog {
            connection: &self.connection,
        }
    }

    /// Reads every row of `table` for mirroring.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] when the read fails.
    pub fn table_rows(&self, table: &str) -> Result<RowSet, SqliteStoreError> {
        value::query(&self.connection, &format!("SELECT * FROM {}", quote_identifier(table)), &[])
    }
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// `sqlite_master` view implementing [`SchemaCatalog`].
#[derive(Debug, Clone, Copy)]
pub struct SqliteCatalog<'a> {
    /// Connection the catalog is read through.
    connection: &'a Connection,
}

impl SqliteCatalog<'_> {
    /// Returns the `CREATE TABLE` text of `table`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] when the catalog cannot be read.
    pub fn read_table_sql(&self, table: &str) -> Result<Option<String>, SqliteStoreError> {
        self.connection
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND lower(name) = lower(?1)",
                params![table],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()
            .map(Option::flatten)
            .map_err(|err| SqliteStoreError::Db(err.to_string()))
    }
}

impl SchemaCatalog for SqliteCatalog<'_> {
    fn table_sql(&self, table: &str) -> Result<Option<String>, DiffError> {
        self.read_table_sql(table).map_err(|err| DiffError::Catalog(err.to_string()))
    }
}
