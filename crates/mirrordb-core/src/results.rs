// crates/mirrordb-core/src/results.rs
// ============================================================================
// Module: Result Lists
// Description: Per-commit results and the running change set of a commit.
// Purpose: Report what a commit changed and read, and merge captured diffs.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A [`ResultList`] is produced once per commit. Its `resultsAdd`,
//! `resultsSet`, and `resultsDel` entries come from a [`ChangeSet`], which
//! merges the companion-table rows captured after each data-modify statement
//! into the net effect per key:
//! - an insert supersedes earlier updates and deletes of the same key,
//! - an update of a row inserted in the same commit stays an insert,
//! - a delete cancels earlier inserts and updates of the same key.
//!
//! Keyless tables are treated as bags: a delete first cancels one identical
//! row inserted or updated in the same commit before being recorded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::ChangeKind;
use crate::statement::Value;

// ============================================================================
// SECTION: Identifiers
// ============================================================================

/// Globally ordered commit identifier.
///
/// # Invariants
/// - Queue-allocated ids are positive and strictly increasing.
/// - [`CommitId::SNAPSHOT`] marks read-only results that bypassed the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(pub i64);

impl CommitId {
    /// Id of read-only snapshot results and limit errors.
    pub const SNAPSHOT: Self = Self(-1);

    /// Returns true for the snapshot id.
    #[must_use]
    pub const fn is_snapshot(self) -> bool {
        self.0 == Self::SNAPSHOT.0
    }

    /// Returns the next id in sequence.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Target that served a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// The persistent store.
    #[default]
    Durable,
    /// The in-memory mirror.
    Memory,
}

// ============================================================================
// SECTION: Result Types
// ============================================================================

/// Rows of one table in one change category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRows {
    /// Lower-cased table name.
    pub table: String,
    /// Column names, matching each row's order.
    pub columns: Vec<String>,
    /// Key columns (empty for keyless tables).
    pub keys: Vec<String>,
    /// Row images.
    pub rows: Vec<Vec<Value>>,
}

/// Rows returned by one row-returning statement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RowSet {
    /// Column names.
    pub columns: Vec<String>,
    /// Rows.
    pub rows: Vec<Vec<Value>>,
}

/// Output of one commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultList {
    /// Commit id, or `-1` for snapshots and limit errors.
    pub id: CommitId,
    /// Target that served the commit.
    pub target: Target,
    /// Inserted rows.
    pub results_add: Vec<TableRows>,
    /// Deleted rows.
    pub results_del: Vec<TableRows>,
    /// Updated rows.
    pub results_set: Vec<TableRows>,
    /// Query results, one per row-returning statement.
    pub results_get: Vec<RowSet>,
    /// Engine message when the commit failed.
    pub error: Option<String>,
    /// The client rolled the commit back.
    pub is_cancel: bool,
    /// The commit is an open interactive transaction.
    pub is_wait: bool,
}

impl ResultList {
    /// Creates an empty result for `id` served by `target`.
    #[must_use]
    pub const fn new(id: CommitId, target: Target) -> Self {
        Self {
            id,
            target,
            results_add: Vec::new(),
            results_del: Vec::new(),
            results_set: Vec::new(),
            results_get: Vec::new(),
            error: None,
            is_cancel: false,
            is_wait: false,
        }
    }

    /// Creates the sentinel result returned when a script exceeds a limit.
    #[must_use]
    pub fn limit_error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::new(CommitId::SNAPSHOT, Target::Durable)
        }
    }

    /// Returns true when the commit failed.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Returns true when any row changed.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        [&self.results_add, &self.results_set, &self.results_del]
            .iter()
            .any(|tables| tables.iter().any(|t| !t.rows.is_empty()))
    }

    /// Returns the change rows for `kind`.
    #[must_use]
    pub fn changes(&self, kind: ChangeKind) -> &[TableRows] {
        match kind {
            ChangeKind::Add => &self.results_add,
            ChangeKind::Set => &self.results_set,
            ChangeKind::Del => &self.results_del,
        }
    }

    /// Replaces the change rows with the contents of `changes`.
    pub fn apply_changes(&mut self, changes: &ChangeSet) {
        self.results_add = changes.rows(ChangeKind::Add);
        self.results_set = changes.rows(ChangeKind::Set);
        self.results_del = changes.rows(ChangeKind::Del);
    }
}

// ============================================================================
// SECTION: Change Set
// ============================================================================

/// Row images of one change category, in capture order.
#[derive(Debug, Clone, Default)]
struct RowBag {
    /// Rows by merge key with their capture sequence.
    rows: BTreeMap<String, (u64, Vec<Value>)>,
}

impl RowBag {
    /// Inserts or replaces a row.
    fn put(&mut self, key: String, sequence: u64, row: Vec<Value>) {
        self.rows.insert(key, (sequence, row));
    }

    /// Removes a row by key, returning whether it existed.
    fn remove(&mut self, key: &str) -> bool {
        self.rows.remove(key).is_some()
    }

    /// Removes one row equal to `row`, returning whether one existed.
    fn remove_equal(&mut self, row: &[Value]) -> bool {
        let found = self.rows.iter().find(|(_, (_, r))| r.as_slice() == row).map(|(k, _)| k.clone());
        found.is_some_and(|key| self.rows.remove(&key).is_some())
    }

    /// Returns rows in capture order.
    fn ordered(&self) -> Vec<Vec<Value>> {
        let mut entries: Vec<&(u64, Vec<Value>)> = self.rows.values().collect();
        entries.sort_by_key(|(sequence, _)| *sequence);
        entries.into_iter().map(|(_, row)| row.clone()).collect()
    }
}

/// Net changes of one table within a commit.
#[derive(Debug, Clone)]
struct TableDelta {
    /// Column names.
    columns: Vec<String>,
    /// Key columns.
    keys: Vec<String>,
    /// Positions of key columns within `columns`.
    key_positions: Vec<usize>,
    /// Inserted rows.
    add: RowBag,
    /// Updated rows.
    set: RowBag,
    /// Deleted rows.
    del: RowBag,
}

impl TableDelta {
    /// Creates an empty delta for a table shape.
    fn new(columns: Vec<String>, keys: Vec<String>) -> Self {
        let key_positions = keys
            .iter()
            .filter_map(|key| columns.iter().position(|c| c.eq_ignore_ascii_case(key)))
            .collect::<Vec<_>>();
        let key_positions = if key_positions.len() == keys.len() { key_positions } else { Vec::new() };
        Self {
            columns,
            keys,
            key_positions,
            add: RowBag::default(),
            set: RowBag::default(),
            del: RowBag::default(),
        }
    }

    /// Returns the merge key of a keyed row.
    fn key_of(&self, row: &[Value]) -> String {
        let key: Vec<&Value> = self.key_positions.iter().filter_map(|i| row.get(*i)).collect();
        serde_json::to_string(&key).unwrap_or_default()
    }

    /// Merges one captured row.
    fn merge(&mut self, kind: ChangeKind, row: Vec<Value>, sequence: u64) {
        if self.key_positions.is_empty() {
            self.merge_keyless(kind, row, sequence);
            return;
        }
        let key = self.key_of(&row);
        match kind {
            ChangeKind::Add => {
                self.del.remove(&key);
                self.set.remove(&key);
                self.add.put(key, sequence, row);
            }
            ChangeKind::Set => {
                if self.add.rows.contains_key(&key) {
                    self.add.put(key, sequence, row);
                } else {
                    self.set.put(key, sequence, row);
                }
            }
            ChangeKind::Del => {
                self.add.remove(&key);
                self.set.remove(&key);
                self.del.put(key, sequence, row);
            }
        }
    }

    /// Merges one captured row of a keyless table.
    fn merge_keyless(&mut self, kind: ChangeKind, row: Vec<Value>, sequence: u64) {
        let key = format!("#{sequence:020}");
        match kind {
            ChangeKind::Add => self.add.put(key, sequence, row),
            ChangeKind::Set => self.set.put(key, sequence, row),
            ChangeKind::Del => {
                if !(self.add.remove_equal(&row) || self.set.remove_equal(&row)) {
                    self.del.put(key, sequence, row);
                }
            }
        }
    }

    /// Returns the bag for `kind`.
    const fn bag(&self, kind: ChangeKind) -> &RowBag {
        match kind {
            ChangeKind::Add => &self.add,
            ChangeKind::Set => &self.set,
            ChangeKind::Del => &self.del,
        }
    }
}

/// Running net change set of one commit.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Deltas by lower-cased table name.
    tables: BTreeMap<String, TableDelta>,
    /// Next capture sequence number.
    sequence: u64,
}

impl ChangeSet {
    /// Creates an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges rows captured from one companion table.
    pub fn merge(&mut self, kind: ChangeKind, captured: TableRows) {
        let TableRows {
            table,
            columns,
            keys,
            rows,
        } = captured;
        let delta = self.tables.entry(table).or_insert_with(|| TableDelta::new(columns, keys));
        for row in rows {
            self.sequence += 1;
            delta.merge(kind, row, self.sequence);
        }
    }

    /// Forgets a table, used when it is dropped within the commit.
    pub fn forget(&mut self, table: &str) {
        self.tables.remove(table);
    }

    /// Returns true when no rows are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.values().all(|delta| {
            delta.add.rows.is_empty() && delta.set.rows.is_empty() && delta.del.rows.is_empty()
        })
    }

    /// Returns the non-empty table rows for `kind`.
    #[must_use]
    pub fn rows(&self, kind: ChangeKind) -> Vec<TableRows> {
        self.tables
            .iter()
            .filter_map(|(table, delta)| {
                let rows = delta.bag(kind).ordered();
                (!rows.is_empty()).then(|| TableRows {
                    table: table.clone(),
                    columns: delta.columns.clone(),
                    keys: delta.keys.clone(),
                    rows,
                })
            })
            .collect()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
