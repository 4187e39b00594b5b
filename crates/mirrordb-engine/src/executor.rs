// crates/mirrordb-engine/src/executor.rs
// ============================================================================
// Module: Commit Executor
// Description: Runs one commit's statements against the durable target and
//              the memory mirror.
// Purpose: Route reads, capture row changes, and maintain capture DDL.
// Dependencies: mirrordb-core, mirrordb-store-sqlite, tracing
// ============================================================================

//! ## Overview
//! [`Executor`] borrows a worker's durable connection for one call and
//! drives a [`CommitRun`] statement by statement:
//! - selects over memory tables the commit has not written go to the mirror
//! - everything else runs durably inside a lazily opened transaction
//! - row writes run with `isDiff` on; captured rows are merged and tared
//! - schema changes are wrapped with the diff generator's DDL and, for memory
//!   tables, recorded as mirror schema changes
//!
//! Transaction control statements are left to the caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use mirrordb_core::ChangeKind;
use mirrordb_core::ChangeSet;
use mirrordb_core::CommitId;
use mirrordb_core::ResultList;
use mirrordb_core::RowSet;
use mirrordb_core::SchemaChange;
use mirrordb_core::SchemaDiffGenerator;
use mirrordb_core::Statement;
use mirrordb_core::StatementKind;
use mirrordb_core::Target;
use mirrordb_core::Value;
use mirrordb_core::Variable;
use mirrordb_store_sqlite::DurableConnection;
use mirrordb_store_sqlite::MemorySchemaChange;
use mirrordb_store_sqlite::MemoryStore;

use crate::error::WorkerError;
use crate::saver::SaveRequest;

// ============================================================================
// SECTION: Commit State
// ============================================================================

/// Completion of one commit across the two targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkItem {
    /// The durable transaction committed.
    pub durable_done: bool,
    /// The saver acknowledged the mirror apply.
    pub memory_done: bool,
}

/// How a run of statements ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ending {
    /// A commit statement was reached.
    Commit,
    /// A rollback statement was reached.
    Rollback,
    /// The statements ran out with the transaction still open.
    Open,
}

/// State of one commit in flight.
#[derive(Debug)]
pub(crate) struct CommitRun {
    /// Commit id, or the snapshot id.
    pub(crate) id: CommitId,
    /// Open the durable transaction for writing.
    write: bool,
    /// Rows returned so far.
    results_get: Vec<RowSet>,
    /// Net row changes.
    changes: ChangeSet,
    /// Mirror schema changes, in statement order.
    schema: Vec<MemorySchemaChange>,
    /// Tables written so far.
    written: BTreeSet<String>,
    /// Tables made memory tables by this commit.
    new_memory: BTreeSet<String>,
    /// Some statement ran durably.
    used_durable: bool,
    /// Reads served by the mirror.
    pub(crate) memory_reads: u64,
    /// A table schema changed.
    pub(crate) schema_changed: bool,
    /// Completion tracking.
    pub(crate) work: WorkItem,
}

impl CommitRun {
    /// Starts a run for `id`.
    pub(crate) fn new(id: CommitId, write: bool) -> Self {
        Self {
            id,
            write,
            results_get: Vec::new(),
            changes: ChangeSet::new(),
            schema: Vec::new(),
            written: BTreeSet::new(),
            new_memory: BTreeSet::new(),
            used_durable: false,
            memory_reads: 0,
            schema_changed: false,
            work: WorkItem::default(),
        }
    }

    /// Target that served the run so far.
    const fn target(&self) -> Target {
        if !self.used_durable && self.memory_reads > 0 { Target::Memory } else { Target::Durable }
    }

    /// Result for the statements run since the last call, without changes.
    pub(crate) fn take_partial(&mut self) -> ResultList {
        let mut result = ResultList::new(self.id, self.target());
        result.results_get = std::mem::take(&mut self.results_get);
        result
    }

    /// Final result with net changes.
    pub(crate) fn into_result(mut self) -> ResultList {
        let mut result = self.take_partial();
        result.apply_changes(&self.changes);
        result
    }

    /// Builds the mirror request.
    ///
    /// Every net change is shipped; the saver skips tables the mirror does
    /// not hold when it applies them, after earlier schema changes landed.
    pub(crate) fn save_request(&self) -> SaveRequest {
        let mut changes = Vec::new();
        for kind in ChangeKind::APPLY_ORDER {
            changes.extend(self.changes.rows(kind).into_iter().map(|rows| (kind, rows)));
        }
        SaveRequest {
            id: self.id,
            schema: self.schema.clone(),
            changes,
        }
    }

    /// Drops pending changes after a rollback.
    fn discard(&mut self) {
        self.changes = ChangeSet::new();
        self.schema.clear();
        self.written.clear();
        self.new_memory.clear();
        self.schema_changed = false;
    }
}

// ============================================================================
// SECTION: Executor
// ============================================================================

/// Statement router over one durable connection.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Executor<'a> {
    /// Worker's durable connection.
    connection: &'a DurableConnection,
    /// Mirror for fast-path reads; `None` when the mirror is off.
    memory: Option<&'a MemoryStore>,
    /// Memory tables the worker routes reads to.
    memory_tables: &'a BTreeSet<String>,
    /// Tables configured as memory tables when created.
    designated: &'a BTreeSet<String>,
}

impl<'a> Executor<'a> {
    /// Creates an executor for one call.
    pub(crate) const fn new(
        connection: &'a DurableConnection,
        memory: Option<&'a MemoryStore>,
        memory_tables: &'a BTreeSet<String>,
        designated: &'a BTreeSet<String>,
    ) -> Self {
        Self {
            connection,
            memory,
            memory_tables,
            designated,
        }
    }

    /// Runs statements until a transaction end or the end of the slice.
    pub(crate) fn run(&self, run: &mut CommitRun, statements: &[Statement]) -> Result<Ending, WorkerError> {
        for statement in statements {
            match statement.kind {
                StatementKind::CommitTransaction => return Ok(Ending::Commit),
                StatementKind::RollbackTransaction => return Ok(Ending::Rollback),
                StatementKind::BeginTransaction => {}
                _ => self.execute(run, statement)?,
            }
        }
        Ok(Ending::Open)
    }

    /// Executes one non-transaction statement.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError`] when the statement or its capture work fails;
    /// the transaction is left for the caller to roll back.
    pub(crate) fn execute(&self, run: &mut CommitRun, statement: &Statement) -> Result<(), WorkerError> {
        if let Some(memory) = self.memory_route(run, statement) {
            if let Some(rows) = memory.query(&statement.query, &statement.params)? {
                run.results_get.push(rows);
            }
            run.memory_reads += 1;
            return Ok(());
        }
        if !self.connection.in_transaction() {
            self.connection.begin(run.write)?;
        }
        run.used_durable = true;
        let rows = if let Some(change) = &statement.schema_change {
            self.execute_schema(run, statement, change)?
        } else if statement.kind.is_data_modify() {
            self.execute_data(run, statement)?
        } else {
            self.connection.execute(&statement.query, &statement.params)?
        };
        if let Some(rows) = rows {
            run.results_get.push(rows);
        }
        run.written.extend(statement.tables_write.iter().cloned());
        Ok(())
    }

    /// Returns the mirror when `statement` can be served from it.
    fn memory_route(&self, run: &CommitRun, statement: &Statement) -> Option<&'a MemoryStore> {
        let memory = self.memory?;
        let eligible = statement.kind == StatementKind::Select
            && !statement.tables_read.is_empty()
            && statement.tables_read.iter().all(|t| self.memory_tables.contains(t) && !run.written.contains(t));
        eligible.then_some(memory)
    }

    /// Runs a row write with capture on and merges what it captured.
    fn execute_data(&self, run: &mut CommitRun, statement: &Statement) -> Result<Option<RowSet>, WorkerError> {
        self.connection.set_diff(true)?;
        let outcome = self.connection.execute(&statement.query, &statement.params);
        let reset = self.connection.set_diff(false);
        let rows = outcome?;
        reset?;
        for (kind, captured) in self.connection.capture_changes()? {
            run.changes.merge(kind, captured);
        }
        Ok(rows)
    }

    /// Runs a table-modify statement wrapped in capture DDL.
    fn execute_schema(
        &self,
        run: &mut CommitRun,
        statement: &Statement,
        change: &SchemaChange,
    ) -> Result<Option<RowSet>, WorkerError> {
        let generator = SchemaDiffGenerator;
        let is_memory = self.is_memory(run, change)?;
        self.connection.run_generated(&generator.before(change))?;
        let rows = self.connection.execute(&statement.query, &statement.params)?;
        let after = generator.after(change, &self.connection.catalog(), is_memory)?;
        self.connection.run_generated(&after)?;
        run.schema_changed = true;
        self.track_mirror_schema(run, change, is_memory)?;
        Ok(rows)
    }

    /// Returns true when `change` concerns a memory table.
    ///
    /// Existing tables are looked up in the durable registry, inside the open
    /// transaction, rather than in the worker's routing cache.
    fn is_memory(&self, run: &CommitRun, change: &SchemaChange) -> Result<bool, WorkerError> {
        let existing = match change {
            SchemaChange::Create {
                table,
                temporary,
                ..
            } => return Ok(!temporary && self.designated.contains(table)),
            SchemaChange::Rename {
                from, ..
            } => from,
            SchemaChange::Modify {
                table,
            }
            | SchemaChange::Drop {
                table, ..
            } => table,
        };
        Ok(run.new_memory.contains(existing) || self.connection.memory_tables()?.contains(existing))
    }

    /// Records the mirror side of a schema change.
    fn track_mirror_schema(
        &self,
        run: &mut CommitRun,
        change: &SchemaChange,
        is_memory: bool,
    ) -> Result<(), WorkerError> {
        match change {
            SchemaChange::Create {
                table, ..
            } => {
                if is_memory {
                    run.new_memory.insert(table.clone());
                    let create = self.mirror_create(table)?;
                    run.schema.push(create);
                }
            }
            SchemaChange::Rename {
                from,
                to,
            } => {
                run.changes.forget(from);
                if is_memory {
                    run.new_memory.remove(from);
                    run.new_memory.insert(to.clone());
                    run.schema.push(MemorySchemaChange::Drop {
                        table: from.clone(),
                    });
                    let create = self.mirror_create(to)?;
                    run.schema.push(create);
                }
            }
            SchemaChange::Modify {
                table,
            } => {
                if is_memory {
                    run.changes.forget(table);
                    let create = self.mirror_create(table)?;
                    run.schema.push(create);
                }
            }
            SchemaChange::Drop {
                table, ..
            } => {
                run.changes.forget(table);
                if is_memory {
                    run.new_memory.remove(table);
                    run.schema.push(MemorySchemaChange::Drop {
                        table: table.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Builds a mirror create with the table's current durable rows.
    fn mirror_create(&self, table: &str) -> Result<MemorySchemaChange, WorkerError> {
        let sql = self
            .connection
            .catalog()
            .read_table_sql(table)?
            .ok_or_else(|| WorkerError::Execution(format!("table {table} missing from catalog")))?;
        let rows = self.connection.table_rows(table)?;
        Ok(MemorySchemaChange::Create {
            table: table.to_string(),
            sql,
            rows,
        })
    }

    /// Commits the durable transaction, recording the commit id.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError`] when the commit fails; the caller rolls back.
    pub(crate) fn commit(&self, run: &mut CommitRun) -> Result<(), WorkerError> {
        if self.connection.in_transaction() {
            if run.write {
                if run.id != CommitId::SNAPSHOT {
                    self.connection.record_applied(run.id)?;
                }
                self.connection.set_variable(Variable::LastAccess, Value::Integer(unix_millis()))?;
            }
            self.connection.commit()?;
        }
        run.work.durable_done = true;
        Ok(())
    }

    /// Rolls back and clears capture state; failures are logged.
    pub(crate) fn rollback(&self, run: &mut CommitRun) {
        if let Err(err) = self.connection.rollback() {
            tracing::warn!(commit_id = run.id.0, error = %err, "durable rollback failed");
        }
        let pending = self.connection.variable(Variable::ChangeCount);
        if !matches!(pending, Ok(Value::Integer(0) | Value::Null)) {
            if let Err(err) = self.connection.set_diff(false) {
                tracing::warn!(commit_id = run.id.0, error = %err, "failed to clear diff flag");
            }
            if let Err(err) = self.connection.tare() {
                tracing::warn!(commit_id = run.id.0, error = %err, "failed to tare capture tables");
            }
        }
        run.discard();
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Milliseconds since the Unix epoch.
fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}
