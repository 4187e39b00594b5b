// crates/mirrordb-store-sqlite/src/log.rs
// ============================================================================
// Module: Pending Commit Log
// Description: SQLite-backed log of allocated, not-yet-saved commits.
// Purpose: Allocate commit ids and keep enough to replay after a crash.
// Dependencies: mirrordb-core, rusqlite, serde_json, tracing
// ============================================================================

//! ## Overview
//! The log lives in its own database file. `__queue_meta` holds the next id
//! to allocate; `__commits` holds one row per allocated commit with its
//! statements and parameters as JSON. Only the queue actor writes the log.
//!
//! # Invariants
//! - Ids are allocated in contiguous blocks and never reused: `next_id` only
//!   grows, including across restarts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use mirrordb_core::CommitId;
use mirrordb_core::Value;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;

use crate::config::SqliteStoreConfig;
use crate::connection::ensure_parent_dir;
use crate::connection::open_file;
use crate::connection::validate_store_path;
use crate::error::SqliteStoreError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Statements of one commit as written to the log.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PendingEntry {
    /// Statement texts.
    pub queries: Vec<String>,
    /// Parameters per statement.
    pub params: Vec<Vec<Value>>,
}

/// One row of the pending log.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRow {
    /// Commit id.
    pub id: CommitId,
    /// Worker that allocated the id.
    pub worker_id: u64,
    /// Logged statements.
    pub entry: PendingEntry,
    /// Saver acknowledged the commit.
    pub is_saved: bool,
    /// Commit held the long lock.
    pub is_long: bool,
}

// ============================================================================
// SECTION: Log
// ============================================================================

/// Pending-commit log.
#[derive(Debug)]
pub struct PendingLog {
    /// Log connection.
    connection: Connection,
}

impl PendingLog {
    /// Opens the log, creating its tables as needed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is invalid or the database
    /// cannot be opened.
    pub fn open(path: &Path, config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(path)?;
        ensure_parent_dir(path)?;
        let mut connection = open_file(path, config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection,
        })
    }

    /// Next id that [`PendingLog::append`] will allocate.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] when the read fails.
    pub fn next_id(&self) -> Result<CommitId, SqliteStoreError> {
        self.connection
            .query_row("SELECT next_id FROM __queue_meta LIMIT 1", params![], |row| row.get(0))
            .map(CommitId)
            .map_err(|err| SqliteStoreError::Db(err.to_string()))
    }

    /// Allocates one id per entry and appends unsaved rows.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when encoding or writing fails; nothing
    /// is allocated in that case.
    pub fn append(
        &mut self,
        worker_id: u64,
        entries: &[PendingEntry],
        is_long: bool,
    ) -> Result<Vec<CommitId>, SqliteStoreError> {
        let tx = self.connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let first: i64 = tx
            .query_row("SELECT next_id FROM __queue_meta LIMIT 1", params![], |row| row.get(0))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let worker = i64::try_from(worker_id)
            .map_err(|_| SqliteStoreError::Invalid("worker id out of range".to_string()))?;
        let mut ids = Vec::with_capacity(entries.len());
        let mut id = first;
        for entry in entries {
            let (queries, params_json) = encode(entry)?;
            tx.execute(
                "INSERT INTO __commits (id, worker_id, queries, params, is_saved, is_long) \
                 VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                params![id, worker, queries, params_json, i64::from(is_long)],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            ids.push(CommitId(id));
            id += 1;
        }
        tx.execute("UPDATE __queue_meta SET next_id = ?1", params![id])
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(ids)
    }

    /// Rewrites the statements of a pending row.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Invalid`] when the row does not exist.
    pub fn amend(&self, id: CommitId, entry: &PendingEntry) -> Result<(), SqliteStoreError> {
        let (queries, params_json) = encode(entry)?;
        let updated = self
            .connection
            .execute(
                "UPDATE __commits SET queries = ?1, params = ?2 WHERE id = ?3",
                params![queries, params_json, id.0],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        if updated == 0 {
            return Err(SqliteStoreError::Invalid(format!("no pending commit {id}")));
        }
        Ok(())
    }

    /// Marks a row saved.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] when the update fails.
    pub fn mark_saved(&self, id: CommitId) -> Result<(), SqliteStoreError> {
        self.connection
            .execute("UPDATE __commits SET is_saved = 1 WHERE id = ?1", params![id.0])
            .map(|_| ())
            .map_err(|err| SqliteStoreError::Db(err.to_string()))
    }

    /// Removes rows.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] when a delete fails.
    pub fn delete(&mut self, ids: &[CommitId]) -> Result<(), SqliteStoreError> {
        let tx = self.connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        for id in ids {
            tx.execute("DELETE FROM __commits WHERE id = ?1", params![id.0])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))
    }

    /// Removes saved rows below the lowest unsaved id and returns how many
    /// were removed.
    ///
    /// Saved rows above an unsaved one stay so recovery can tell a deleted
    /// id from a saved one.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] when the delete fails.
    pub fn prune_saved(&self) -> Result<usize, SqliteStoreError> {
        self.connection
            .execute(
                "DELETE FROM __commits WHERE is_saved = 1 AND id < COALESCE(
                    (SELECT MIN(id) FROM __commits WHERE is_saved = 0),
                    (SELECT next_id FROM __queue_meta LIMIT 1))",
                params![],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))
    }

    /// Unsaved rows in ascending id order.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the read fails or a row does not
    /// decode.
    pub fn unsaved(&self) -> Result<Vec<PendingRow>, SqliteStoreError> {
        self.rows("WHERE is_saved = 0")
    }

    /// Every row in ascending id order.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the read fails or a row does not
    /// decode.
    pub fn all(&self) -> Result<Vec<PendingRow>, SqliteStoreError> {
        self.rows("")
    }

    /// Highest id in the log, if any.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] when the read fails.
    pub fn max_id(&self) -> Result<Option<CommitId>, SqliteStoreError> {
        self.connection
            .query_row("SELECT MAX(id) FROM __commits", params![], |row| row.get::<_, Option<i64>>(0))
            .map(|id| id.map(CommitId))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))
    }

    /// Removes every row.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] when the delete fails.
    pub fn clear(&self) -> Result<(), SqliteStoreError> {
        self.connection
            .execute_batch("DELETE FROM __commits;")
            .map_err(|err| SqliteStoreError::Db(err.to_string()))
    }

    /// Raises `next_id` to at least `floor`; never lowers it.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] when the update fails.
    pub fn reseed(&self, floor: CommitId) -> Result<CommitId, SqliteStoreError> {
        self.connection
            .execute("UPDATE __queue_meta SET next_id = MAX(next_id, ?1)", params![floor.0])
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        self.next_id()
    }

    /// Reads rows with an optional fixed filter.
    fn rows(&self, filter: &str) -> Result<Vec<PendingRow>, SqliteStoreError> {
        let mut statement = self
            .connection
            .prepare(&format!(
                "SELECT id, worker_id, queries, params, is_saved, is_long FROM __commits {filter} ORDER BY id"
            ))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = statement
            .query_map(params![], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut out = Vec::new();
        for row in rows {
            let (id, worker_id, queries, params_json, is_saved, is_long) =
                row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            out.push(PendingRow {
                id: CommitId(id),
                worker_id: u64::try_from(worker_id)
                    .map_err(|_| SqliteStoreError::Corrupt(format!("negative worker id in commit {id}")))?,
                entry: PendingEntry {
                    queries: serde_json::from_str(&queries)
                        .map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?,
                    params: serde_json::from_str(&params_json)
                        .map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?,
                },
                is_saved: is_saved != 0,
                is_long: is_long != 0,
            });
        }
        Ok(out)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Creates the log tables and seeds `next_id`.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS __commits (
            id INTEGER PRIMARY KEY,
            worker_id INTEGER NOT NULL,
            queries TEXT NOT NULL,
            params TEXT NOT NULL,
            is_saved INTEGER NOT NULL DEFAULT 0,
            is_long INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS __queue_meta (next_id INTEGER NOT NULL);",
    )
    .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let seeded: Option<i64> = tx
        .query_row("SELECT next_id FROM __queue_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    if seeded.is_none() {
        tx.execute("INSERT INTO __queue_meta (next_id) VALUES (1)", params![])
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tracing::debug!("pending log initialized");
    Ok(())
}

/// Encodes an entry's statements and parameters as JSON.
fn encode(entry: &PendingEntry) -> Result<(String, String), SqliteStoreError> {
    if entry.queries.len() != entry.params.len() {
        return Err(SqliteStoreError::Invalid(
            "pending entry has mismatched query and parameter lists".to_string(),
        ));
    }
    let queries =
        serde_json::to_string(&entry.queries).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    let params =
        serde_json::to_string(&entry.params).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    Ok((queries, params))
}
