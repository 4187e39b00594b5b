// crates/mirrordb-engine/src/recovery.rs
// ============================================================================
// Module: Startup Recovery
// Description: Replays unsaved pending-log rows against the durable store.
// Purpose: Restore durable state after a crash and re-seed the id sequence.
// Dependencies: mirrordb-core, mirrordb-store-sqlite, serde, tracing
// ============================================================================

//! ## Overview
//! Recovery walks the pending log in ascending id order and stops at the
//! first id gap. For each unsaved row it either counts the commit as already
//! applied (its id is in the durable `__applied` table) or replays it
//! durably. Rows whose statements never reached a commit (an interactive
//! transaction interrupted mid-way, or a client rollback) are skipped.
//! Afterwards the log is cleared and the id sequence re-seeded above every
//! id seen.
//!
//! # Invariants
//! - Rows after the first gap are never replayed. Only deleted rows leave
//!   gaps, and when two long transactions were pending across a crash the
//!   later one's ordering relative to the deleted one is unknown.
//! - The next allocated id exceeds every id in the log and in `__applied`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use mirrordb_core::CommitAssembler;
use mirrordb_core::CommitId;
use mirrordb_core::Statement;
use mirrordb_core::StatementKind;
use mirrordb_store_sqlite::DurableConnection;
use mirrordb_store_sqlite::PendingLog;
use mirrordb_store_sqlite::PendingRow;
use mirrordb_store_sqlite::SqliteStoreError;
use serde::Serialize;

use crate::error::EngineError;
use crate::executor::CommitRun;
use crate::executor::Ending;
use crate::executor::Executor;

// ============================================================================
// SECTION: Report
// ============================================================================

/// Outcome of startup recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    /// Rows re-executed durably.
    pub replayed: usize,
    /// Rows whose commit was already durable.
    pub already_applied: usize,
    /// Rows without a terminating commit.
    pub skipped: usize,
    /// Rows whose replay failed and was rolled back.
    pub failed: usize,
    /// Rows after the first id gap.
    pub abandoned: usize,
    /// First id the queue allocates after recovery.
    pub next_id: CommitId,
}

// ============================================================================
// SECTION: Recovery
// ============================================================================

/// Replays the pending log and re-seeds the id sequence.
///
/// # Errors
///
/// Returns [`EngineError::Recovery`] when the log or the durable store cannot
/// be read or reset. Individual replay failures are counted, not returned.
pub fn recover(
    connection: &DurableConnection,
    log: &PendingLog,
    assembler: &CommitAssembler,
    designated: &BTreeSet<String>,
) -> Result<RecoveryReport, EngineError> {
    let rows = log.all().map_err(|err| EngineError::Recovery(err.to_string()))?;
    let mut report = RecoveryReport {
        replayed: 0,
        already_applied: 0,
        skipped: 0,
        failed: 0,
        abandoned: 0,
        next_id: CommitId(1),
    };
    let mut previous: Option<CommitId> = None;
    for (index, row) in rows.iter().enumerate() {
        if let Some(prev) = previous
            && row.id != prev.next()
        {
            report.abandoned = rows.len() - index;
            tracing::warn!(
                commit_id = row.id.0,
                abandoned = report.abandoned,
                "pending log gap; later commits are not replayed"
            );
            break;
        }
        previous = Some(row.id);
        if row.is_saved {
            continue;
        }
        let applied = connection.is_applied(row.id).map_err(|err| EngineError::Recovery(err.to_string()))?;
        if applied {
            report.already_applied += 1;
            continue;
        }
        match replay(connection, assembler, designated, row)? {
            Replay::Applied => report.replayed += 1,
            Replay::Skipped => report.skipped += 1,
            Replay::Failed => report.failed += 1,
        }
    }
    report.next_id = reseed(connection, log, previous)?;
    tracing::info!(
        replayed = report.replayed,
        already_applied = report.already_applied,
        skipped = report.skipped,
        failed = report.failed,
        abandoned = report.abandoned,
        next_id = report.next_id.0,
        "recovery complete"
    );
    Ok(report)
}

/// Outcome of one row's replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Replay {
    /// Committed durably.
    Applied,
    /// Not a complete commit.
    Skipped,
    /// Execution failed and was rolled back.
    Failed,
}

/// Replays one logged commit.
fn replay(
    connection: &DurableConnection,
    assembler: &CommitAssembler,
    designated: &BTreeSet<String>,
    row: &PendingRow,
) -> Result<Replay, EngineError> {
    let Some(statements) = logged_statements(assembler, row) else {
        return Ok(Replay::Skipped);
    };
    let ends_in_commit = statements.last().is_some_and(|s| s.kind == StatementKind::CommitTransaction);
    if !ends_in_commit || statements.iter().any(|s| s.kind == StatementKind::RollbackTransaction) {
        tracing::debug!(commit_id = row.id.0, "skipping uncommitted log row");
        return Ok(Replay::Skipped);
    }
    let memory_tables = connection.memory_tables().map_err(|err| EngineError::Recovery(err.to_string()))?;
    let executor = Executor::new(connection, None, &memory_tables, designated);
    let mut run = CommitRun::new(row.id, true);
    let outcome = executor.run(&mut run, &statements).and_then(|ending| match ending {
        Ending::Commit => executor.commit(&mut run).map(|()| true),
        Ending::Rollback | Ending::Open => Ok(false),
    });
    match outcome {
        Ok(true) => {
            tracing::info!(commit_id = row.id.0, worker_id = row.worker_id, "replayed pending commit");
            Ok(Replay::Applied)
        }
        Ok(false) => {
            executor.rollback(&mut run);
            Ok(Replay::Skipped)
        }
        Err(err) => {
            tracing::warn!(commit_id = row.id.0, error = %err, "pending commit replay failed");
            executor.rollback(&mut run);
            Ok(Replay::Failed)
        }
    }
}

/// Reparses a row's logged queries into one statement list.
///
/// Returns `None` when a query no longer parses.
fn logged_statements(assembler: &CommitAssembler, row: &PendingRow) -> Option<Vec<Statement>> {
    let mut statements = Vec::new();
    for (query, params) in row.entry.queries.iter().zip(&row.entry.params) {
        match assembler.split(query, params.clone()) {
            Ok((parsed, _)) => statements.extend(parsed),
            Err(err) => {
                tracing::warn!(commit_id = row.id.0, error = %err, "logged commit does not parse");
                return None;
            }
        }
    }
    Some(statements)
}

/// Clears the log and applied ids and raises the id sequence.
fn reseed(
    connection: &DurableConnection,
    log: &PendingLog,
    last_seen: Option<CommitId>,
) -> Result<CommitId, EngineError> {
    let to_recovery = |err: SqliteStoreError| EngineError::Recovery(err.to_string());
    let mut floor = log.next_id().map_err(to_recovery)?;
    let candidates = [
        log.max_id().map_err(to_recovery)?,
        connection.max_applied().map_err(to_recovery)?,
        last_seen,
    ];
    for id in candidates.into_iter().flatten() {
        floor = floor.max(id.next());
    }
    log.clear().map_err(to_recovery)?;
    let next_id = log.reseed(floor).map_err(to_recovery)?;
    connection.clear_applied().map_err(to_recovery)?;
    Ok(next_id)
}
