// crates/mirrordb-engine/src/worker.rs
// ============================================================================
// Module: Worker
// Description: Per-client script execution across the durable and memory
//              targets.
// Purpose: Turn scripts into committed, queued, and mirrored commits.
// Dependencies: mirrordb-core, mirrordb-store-sqlite, tracing
// ============================================================================

//! ## Overview
//! A [`Worker`] owns one durable connection and at most one open interactive
//! transaction. Each [`Worker::add`] call takes the worker's state lock, so
//! calls and [`Worker::cancel`] never interleave. A script goes down one of
//! four paths:
//! - continuation of an open interactive transaction
//! - a new interactive transaction (`BEGIN` without an end)
//! - a read-only snapshot, which bypasses the queue with id `-1`
//! - a batch of commits, each allocated a queue id, committed durably, then
//!   mirrored by the saver
//!
//! # Invariants
//! - A failed commit rolls back and abandons its id and every later id of
//!   the same script; earlier commits stay committed.
//! - An interactive transaction keeps its queue id and long lock from its
//!   first call until commit, rollback, or cancel.
//! - Saves reach the saver in durable commit order.
//! - A durable commit the mirror did not apply fails the call with
//!   [`WorkerError::Consistency`] and stops all mirror reads.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::Ordering;

use mirrordb_config::LimitsConfig;
use mirrordb_core::Commit;
use mirrordb_core::CommitId;
use mirrordb_core::CommitList;
use mirrordb_core::ResultList;
use mirrordb_core::Value;
use mirrordb_core::WaitCommit;
use mirrordb_core::WaitStep;
use mirrordb_store_sqlite::DurableConnection;
use mirrordb_store_sqlite::PendingEntry;

use crate::context::Shared;
use crate::error::EngineError;
use crate::error::WorkerError;
use crate::executor::CommitRun;
use crate::executor::Ending;
use crate::executor::Executor;
use crate::invalidation::MemoryTables;
use crate::invalidation::publish;
use crate::saver::PendingSave;

// ============================================================================
// SECTION: Worker
// ============================================================================

/// State guarded by the worker's task lock.
#[derive(Debug)]
struct WorkerState {
    /// Durable connection.
    connection: DurableConnection,
    /// Interactive transaction tracker.
    wait: WaitCommit,
    /// Commit of the open interactive transaction.
    open: Option<CommitRun>,
    /// Cached memory-table set.
    memory_tables: MemoryTables,
}

/// Script executor bound to one durable connection.
#[derive(Debug)]
pub struct Worker {
    /// Worker id, recorded in the pending log.
    id: u64,
    /// Database-wide state.
    shared: Arc<Shared>,
    /// Task lock.
    state: Mutex<WorkerState>,
}

impl Worker {
    /// Opens a connection and loads the memory-table set.
    pub(crate) fn new(id: u64, shared: Arc<Shared>) -> Result<Self, EngineError> {
        let connection = shared.durable.connect()?;
        let mut memory_tables = MemoryTables::new(shared.invalidation.subscribe());
        memory_tables.refresh(shared.memory())?;
        let wait = WaitCommit::new(shared.assembler);
        tracing::debug!(worker_id = id, "worker opened");
        Ok(Self {
            id,
            shared,
            state: Mutex::new(WorkerState {
                connection,
                wait,
                open: None,
                memory_tables,
            }),
        })
    }

    /// Worker id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Returns true while an interactive transaction is open.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Poisoned`] when the task lock is poisoned.
    pub fn is_waiting(&self) -> Result<bool, WorkerError> {
        let state = self.state.lock().map_err(|_| WorkerError::Poisoned)?;
        Ok(state.wait.is_open())
    }

    /// Runs a script and returns one result per commit.
    ///
    /// Scripts over the configured limits yield a single sentinel result
    /// with id `-1`. Execution failures are reported on the failing
    /// commit's result rather than as an error.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError`] when the script does not parse or validate
    /// (an open interactive transaction stays open), when the queue cannot
    /// allocate ids, when the task lock is poisoned, or with
    /// [`WorkerError::Consistency`] when a durable commit was not mirrored.
    pub fn add(&self, script: &str, params: Vec<Value>) -> Result<Vec<ResultList>, WorkerError> {
        if let Some(message) = limit_violation(&self.shared.limits, script, params.len()) {
            tracing::warn!(worker_id = self.id, reason = %message, "script rejected");
            return Ok(vec![ResultList::limit_error(message)]);
        }
        let mut guard = self.state.lock().map_err(|_| WorkerError::Poisoned)?;
        let state = &mut *guard;
        state.memory_tables.refresh(self.shared.memory())?;
        if state.wait.is_open() {
            return self.continue_interactive(state, script, params).map(|result| vec![result]);
        }
        let list = self.shared.assembler.assemble(script, params.clone(), false)?;
        if list.is_wait {
            return self.begin_interactive(state, script, params).map(|result| vec![result]);
        }
        if list.is_read_only {
            return Ok(self.run_snapshot(state, &list));
        }
        self.run_batch(state, &list)
    }

    /// Rolls back an open interactive transaction.
    ///
    /// Returns true when a transaction was open.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Poisoned`] when the task lock is poisoned.
    pub fn cancel(&self) -> Result<bool, WorkerError> {
        let mut guard = self.state.lock().map_err(|_| WorkerError::Poisoned)?;
        let state = &mut *guard;
        state.wait.reset();
        let Some(run) = state.open.take() else {
            return Ok(false);
        };
        let executor = self.executor(&state.connection, state.memory_tables.tables());
        let result = self.cancel_run(&executor, run);
        tracing::info!(worker_id = self.id, commit_id = result.id.0, "interactive transaction cancelled");
        Ok(true)
    }

    /// Builds an executor over the worker's connection.
    fn executor<'a>(
        &'a self,
        connection: &'a DurableConnection,
        memory_tables: &'a BTreeSet<String>,
    ) -> Executor<'a> {
        Executor::new(connection, self.shared.memory(), memory_tables, &self.shared.designated)
    }

    // ------------------------------------------------------------------------
    // Interactive transactions
    // ------------------------------------------------------------------------

    /// Opens an interactive transaction under the long lock.
    fn begin_interactive(
        &self,
        state: &mut WorkerState,
        script: &str,
        params: Vec<Value>,
    ) -> Result<ResultList, WorkerError> {
        let step = state.wait.append(script, params)?;
        let (query, values) = state.wait.save();
        let entry = PendingEntry {
            queries: vec![query],
            params: vec![values],
        };
        let ids = match self.shared.queue.get(self.id, vec![entry], true) {
            Ok(ids) => ids,
            Err(err) => {
                state.wait.reset();
                return Err(err.into());
            }
        };
        let Some(&id) = ids.first() else {
            state.wait.reset();
            return Err(WorkerError::Consistency("queue returned no id for an interactive transaction".to_string()));
        };
        tracing::debug!(worker_id = self.id, commit_id = id.0, "interactive transaction opened");
        self.step_interactive(state, CommitRun::new(id, true), &step)
    }

    /// Feeds a follow-up call into the open interactive transaction.
    fn continue_interactive(
        &self,
        state: &mut WorkerState,
        script: &str,
        params: Vec<Value>,
    ) -> Result<ResultList, WorkerError> {
        let step = state.wait.append(script, params)?;
        let Some(run) = state.open.take() else {
            state.wait.reset();
            return Err(WorkerError::Consistency("interactive transaction has no open commit".to_string()));
        };
        self.step_interactive(state, run, &step)
    }

    /// Runs one call's statements of an interactive transaction.
    fn step_interactive(
        &self,
        state: &mut WorkerState,
        mut run: CommitRun,
        step: &WaitStep,
    ) -> Result<ResultList, WorkerError> {
        let executor = self.executor(&state.connection, state.memory_tables.tables());
        let result = match executor.run(&mut run, &step.statements) {
            Ok(Ending::Open) => {
                let mut result = run.take_partial();
                result.is_wait = true;
                state.open = Some(run);
                result
            }
            Ok(Ending::Commit) => {
                let (query, values) = state.wait.finish();
                let entry = PendingEntry {
                    queries: vec![query],
                    params: vec![values],
                };
                if let Err(err) = self.shared.queue.amend(run.id, entry) {
                    return Ok(self.fail_run(&executor, run, err.into()));
                }
                self.commit_run(&executor, run)?
            }
            Ok(Ending::Rollback) => {
                state.wait.reset();
                self.cancel_run(&executor, run)
            }
            Err(err) => {
                state.wait.reset();
                self.fail_run(&executor, run, err)
            }
        };
        Ok(result)
    }

    // ------------------------------------------------------------------------
    // Batches
    // ------------------------------------------------------------------------

    /// Runs a read-only commit list without queue ids.
    fn run_snapshot(&self, state: &WorkerState, list: &CommitList) -> Vec<ResultList> {
        let executor = self.executor(&state.connection, state.memory_tables.tables());
        let mut results = Vec::with_capacity(list.len());
        for commit in &list.commits {
            let mut run = CommitRun::new(CommitId::SNAPSHOT, false);
            let result = match executor.run(&mut run, &commit.statements) {
                Ok(Ending::Rollback) => self.cancel_run(&executor, run),
                Ok(Ending::Commit | Ending::Open) => match executor.commit(&mut run) {
                    Ok(()) => {
                        let stats = &self.shared.stats;
                        stats.snapshots.fetch_add(1, Ordering::Relaxed);
                        stats.memory_reads.fetch_add(run.memory_reads, Ordering::Relaxed);
                        run.into_result()
                    }
                    Err(err) => self.fail_run(&executor, run, err),
                },
                Err(err) => self.fail_run(&executor, run, err),
            };
            let failed = result.is_error();
            results.push(result);
            if failed {
                break;
            }
        }
        results
    }

    /// Allocates ids for a commit list and runs its commits in order.
    fn run_batch(&self, state: &mut WorkerState, list: &CommitList) -> Result<Vec<ResultList>, WorkerError> {
        let entries = list
            .commits
            .iter()
            .map(|commit| PendingEntry {
                queries: commit.queries(),
                params: commit.params(),
            })
            .collect();
        let ids = self.shared.queue.get(self.id, entries, list.is_long_max)?;
        if ids.len() != list.len() {
            self.abandon(ids);
            return Err(WorkerError::Consistency("queue allocated the wrong number of ids".to_string()));
        }
        let later = |index: usize| ids.get(index + 1 ..).map(<[CommitId]>::to_vec).unwrap_or_default();
        let mut results = Vec::with_capacity(ids.len());
        for (index, (commit, id)) in list.commits.iter().zip(&ids).enumerate() {
            let result = match self.run_commit(state, commit, *id) {
                Ok(result) => result,
                Err(err) => {
                    self.abandon(later(index));
                    return Err(err);
                }
            };
            let failed = result.is_error();
            results.push(result);
            if failed {
                self.abandon(later(index));
                break;
            }
        }
        Ok(results)
    }

    /// Runs one queued commit to completion.
    fn run_commit(&self, state: &mut WorkerState, commit: &Commit, id: CommitId) -> Result<ResultList, WorkerError> {
        let mut run = CommitRun::new(id, true);
        let executor = self.executor(&state.connection, state.memory_tables.tables());
        let outcome = executor.run(&mut run, &commit.statements);
        let schema_changed = run.schema_changed;
        let result = match outcome {
            Ok(Ending::Commit | Ending::Open) => self.commit_run(&executor, run),
            Ok(Ending::Rollback) => Ok(self.cancel_run(&executor, run)),
            Err(err) => Ok(self.fail_run(&executor, run, err)),
        };
        // Later commits of the script must see tables this one created.
        if schema_changed && let Err(err) = state.memory_tables.refresh(self.shared.memory()) {
            tracing::warn!(worker_id = self.id, error = %err, "failed to reload memory tables");
        }
        result
    }

    // ------------------------------------------------------------------------
    // Commit endings
    // ------------------------------------------------------------------------

    /// Commits durably, then waits for the saver.
    ///
    /// The commit-order lock spans the durable commit and the save
    /// submission; the acknowledgement is awaited after it is released.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Consistency`] when the commit is durable but the
    /// mirror did not acknowledge it.
    fn commit_run(&self, executor: &Executor<'_>, mut run: CommitRun) -> Result<ResultList, WorkerError> {
        let order = self.shared.commit_order.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = executor.commit(&mut run) {
            drop(order);
            return Ok(self.fail_run(executor, run, err));
        }
        let submitted = self.shared.saver.submit(run.save_request());
        drop(order);

        let stats = &self.shared.stats;
        stats.commits.fetch_add(1, Ordering::Relaxed);
        stats.memory_reads.fetch_add(run.memory_reads, Ordering::Relaxed);
        let id = run.id;
        let schema_changed = run.schema_changed;
        let saved = submitted.and_then(PendingSave::wait);
        run.work.memory_done = saved.is_ok();
        let result = run.into_result();
        match saved {
            Ok(()) => {
                // Published once mirrored so refreshed caches see the change.
                if schema_changed {
                    publish(&self.shared.invalidation, self.id);
                }
                Ok(result)
            }
            Err(err) => {
                tracing::error!(worker_id = self.id, commit_id = id.0, error = %err, "committed change not mirrored");
                self.shared.mark_diverged();
                Err(WorkerError::Consistency(format!("commit {id} is durable but not mirrored: {err}")))
            }
        }
    }

    /// Rolls back a commit the client ended with `ROLLBACK`.
    fn cancel_run(&self, executor: &Executor<'_>, mut run: CommitRun) -> ResultList {
        executor.rollback(&mut run);
        self.abandon(vec![run.id]);
        self.shared.stats.rollbacks.fetch_add(1, Ordering::Relaxed);
        let mut result = run.into_result();
        result.is_cancel = true;
        result
    }

    /// Rolls back a failed commit and reports the failure on its result.
    fn fail_run(&self, executor: &Executor<'_>, mut run: CommitRun, err: WorkerError) -> ResultList {
        tracing::warn!(worker_id = self.id, commit_id = run.id.0, error = %err, "commit failed; rolling back");
        executor.rollback(&mut run);
        self.abandon(vec![run.id]);
        self.shared.stats.rollbacks.fetch_add(1, Ordering::Relaxed);
        let mut result = run.into_result();
        result.error = Some(err.to_string());
        result
    }

    /// Tells the queue that `ids` will never be saved.
    fn abandon(&self, mut ids: Vec<CommitId>) {
        ids.retain(|id| !id.is_snapshot());
        if let Err(err) = self.shared.queue.delete(ids) {
            tracing::warn!(worker_id = self.id, error = %err, "failed to abandon commit ids");
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Err(err) = self.cancel() {
            tracing::warn!(worker_id = self.id, error = %err, "failed to cancel on worker drop");
        }
    }
}

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Returns the limit message when a script is too large.
fn limit_violation(limits: &LimitsConfig, script: &str, params: usize) -> Option<String> {
    if script.len() > limits.max_script_bytes {
        return Some(format!(
            "script of {} bytes exceeds the limit of {} bytes",
            script.len(),
            limits.max_script_bytes
        ));
    }
    if params > limits.max_params {
        return Some(format!("{params} parameters exceed the limit of {}", limits.max_params));
    }
    None
}
