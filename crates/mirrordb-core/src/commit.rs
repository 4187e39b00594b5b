// crates/mirrordb-core/src/commit.rs
// ============================================================================
// Module: Commits
// Description: Atomic commits and the commit list assembled from a script.
// Purpose: Group classified statements into transactions with aggregates.
// Dependencies: crate::statement
// ============================================================================

//! ## Overview
//! A [`Commit`] is one transaction: it always starts with a begin statement
//! and, unless it is an open interactive transaction, ends with commit or
//! rollback. A [`CommitList`] is everything one script produced, plus the
//! aggregate flags the worker uses to pick a path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use crate::statement::Statement;
use crate::statement::StatementKind;
use crate::statement::Value;

// ============================================================================
// SECTION: Commit
// ============================================================================

/// One atomic unit of statements.
///
/// # Invariants
/// - `statements[0]` is a begin statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Commit {
    /// Statements in execution order.
    pub statements: Vec<Statement>,
}

impl Commit {
    /// Creates a commit from ordered statements.
    #[must_use]
    pub const fn new(statements: Vec<Statement>) -> Self {
        Self {
            statements,
        }
    }

    /// Returns true when the first statement was submitted, not synthesized.
    #[must_use]
    pub fn has_explicit_begin(&self) -> bool {
        self.statements
            .first()
            .is_some_and(|s| s.kind == StatementKind::BeginTransaction && !s.synthesized)
    }

    /// Returns true when the last statement ends the transaction.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.statements.last().is_some_and(|s| s.kind.is_transaction_end())
    }

    /// Returns true when the commit ends in a rollback.
    #[must_use]
    pub fn is_rollback(&self) -> bool {
        self.statements.last().is_some_and(|s| s.kind == StatementKind::RollbackTransaction)
    }

    /// Returns true when every statement is a read-only kind.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.statements.iter().all(|s| s.kind.is_read_only())
    }

    /// Returns the union of tables written.
    #[must_use]
    pub fn tables_write(&self) -> BTreeSet<String> {
        self.statements.iter().flat_map(|s| s.tables_write.iter().cloned()).collect()
    }

    /// Returns the statement texts, for the pending log.
    #[must_use]
    pub fn queries(&self) -> Vec<String> {
        self.statements.iter().map(|s| s.query.clone()).collect()
    }

    /// Returns per-statement parameters, for the pending log.
    #[must_use]
    pub fn params(&self) -> Vec<Vec<Value>> {
        self.statements.iter().map(|s| s.params.clone()).collect()
    }
}

// ============================================================================
// SECTION: Commit List
// ============================================================================

/// Commits assembled from one script, with aggregate flags.
///
/// # Invariants
/// - `tables_write` and `tables_read` are disjoint.
/// - `is_read_only` is false whenever `is_long_max` is true.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommitList {
    /// Commits in submission order.
    pub commits: Vec<Commit>,
    /// Every statement is a read-only kind.
    pub is_read_only: bool,
    /// Single open interactive transaction.
    pub is_wait: bool,
    /// Script exceeded a long threshold.
    pub is_long_max: bool,
    /// Tables read across all statements.
    pub tables_read: BTreeSet<String>,
    /// Tables written, excluding any also read.
    pub tables_write: BTreeSet<String>,
    /// Total submitted statement text length in bytes.
    pub text_len: usize,
    /// Total parameter count.
    pub param_count: usize,
}

impl CommitList {
    /// Returns every statement in order.
    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.commits.iter().flat_map(|c| c.statements.iter())
    }

    /// Number of commits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commits.len()
    }

    /// Returns true when the script produced no commits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Re-serializes submitted statements: texts joined by newlines and
    /// parameters concatenated in statement order.
    #[must_use]
    pub fn join(&self) -> (String, Vec<Value>) {
        join_statements(self.statements())
    }
}

/// Joins submitted (non-synthesized) statements into one script.
pub fn join_statements<'a>(statements: impl Iterator<Item = &'a Statement>) -> (String, Vec<Value>) {
    let mut texts = Vec::new();
    let mut params = Vec::new();
    for statement in statements.filter(|s| !s.synthesized) {
        texts.push(statement.query.as_str());
        params.extend(statement.params.iter().cloned());
    }
    (texts.join("\n"), params)
}
