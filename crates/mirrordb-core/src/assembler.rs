// crates/mirrordb-core/src/assembler.rs
// ============================================================================
// Module: Commit Assembler
// Description: Split a script into classified statements and group commits.
// Purpose: Synthesize transaction boundaries and aggregate script flags.
// Dependencies: crate::{classifier, commit, identifiers, sql, statement}
// ============================================================================

//! ## Overview
//! Assembly runs in four passes over one script:
//! 1. split at top-level semicolons and slice parameters to placeholders,
//! 2. classify each statement (kind-only once the long latch trips),
//! 3. group statements into commits on begin boundaries, synthesizing a
//!    begin where one is missing and, outside partial mode, a commit,
//! 4. aggregate read-only, wait, and table-set flags.
//!
//! The write set reported for the list excludes tables that also appear in
//! the read set. This under-reports write intent for statements that read
//! and write the same table and is kept as-is.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use thiserror::Error;

use crate::classifier::classify;
use crate::classifier::classify_kind;
use crate::commit::Commit;
use crate::commit::CommitList;
use crate::identifiers::is_reserved_table;
use crate::sql::ParseError;
use crate::sql::split_script;
use crate::statement::Statement;
use crate::statement::StatementKind;
use crate::statement::Value;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Assembly failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssembleError {
    /// A statement could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The call arguments are malformed.
    #[error("validation error: {0}")]
    Validation(String),
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Thresholds after which a script is flagged long.
///
/// # Invariants
/// - Exceeding either threshold latches `is_long_max` for the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongThresholds {
    /// Total statement text length in bytes.
    pub text_bytes: usize,
    /// Total parameter count.
    pub params: usize,
}

impl Default for LongThresholds {
    fn default() -> Self {
        Self {
            text_bytes: 1024 * 1024,
            params: 10_000,
        }
    }
}

// ============================================================================
// SECTION: Assembler
// ============================================================================

/// Script-to-commit assembler.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitAssembler {
    /// Long thresholds.
    thresholds: LongThresholds,
}

impl CommitAssembler {
    /// Creates an assembler with the given long thresholds.
    #[must_use]
    pub const fn new(thresholds: LongThresholds) -> Self {
        Self {
            thresholds,
        }
    }

    /// Splits and classifies `script` into statements without grouping.
    ///
    /// Returns the statements and whether the long latch tripped.
    ///
    /// # Errors
    ///
    /// Returns [`AssembleError::Parse`] when any statement fails to parse and
    /// [`AssembleError::Validation`] when placeholders and parameters do not
    /// line up or a statement writes a reserved table.
    pub fn split(
        &self,
        script: &str,
        params: Vec<Value>,
    ) -> Result<(Vec<Statement>, bool), AssembleError> {
        let raw = split_script(script)?;
        let placeholders: usize = raw.iter().map(|r| r.placeholders).sum();
        if placeholders != params.len() {
            return Err(AssembleError::Validation(format!(
                "script has {placeholders} placeholders but {} parameters were supplied",
                params.len()
            )));
        }
        let mut remaining = params.into_iter();
        let mut statements = Vec::with_capacity(raw.len());
        let mut text_len = 0usize;
        let mut param_count = 0usize;
        let mut is_long_max = false;
        for part in raw {
            let slice: Vec<Value> = remaining.by_ref().take(part.placeholders).collect();
            text_len += part.text.len();
            param_count += slice.len();
            if text_len > self.thresholds.text_bytes || param_count > self.thresholds.params {
                is_long_max = true;
            }
            let classified = if is_long_max {
                classify_kind(&part.text, slice)
            } else {
                classify(&part.text, slice)
            };
            let statement = classified.map_err(|err| err.offset_by(part.start))?;
            if let Some(table) = statement.tables_write.iter().find(|t| is_reserved_table(t)) {
                return Err(AssembleError::Validation(format!(
                    "statement writes reserved table '{table}'"
                )));
            }
            statements.push(statement);
        }
        Ok((statements, is_long_max))
    }

    /// Assembles `script` into a commit list.
    ///
    /// In partial mode unterminated commits are left open; otherwise every
    /// commit that does not end in commit/rollback gets a synthesized commit,
    /// except a single open interactive transaction, which is flagged
    /// `is_wait`.
    ///
    /// # Errors
    ///
    /// Returns [`AssembleError`] under the same conditions as
    /// [`CommitAssembler::split`], and [`AssembleError::Validation`] for a
    /// script without statements.
    pub fn assemble(
        &self,
        script: &str,
        params: Vec<Value>,
        partial: bool,
    ) -> Result<CommitList, AssembleError> {
        let (statements, is_long_max) = self.split(script, params)?;
        if statements.is_empty() {
            return Err(AssembleError::Validation("script contains no statements".to_string()));
        }
        let text_len = statements.iter().map(|s| s.query.len()).sum();
        let param_count = statements.iter().map(|s| s.params.len()).sum();
        let mut commits = group(statements);
        let is_wait = commits.len() == 1
            && commits.first().is_some_and(|c| c.has_explicit_begin() && !c.is_terminated());
        if !partial && !is_wait {
            for commit in &mut commits {
                if !commit.is_terminated() {
                    commit.statements.push(Statement::synthesized_commit());
                }
            }
        }
        let is_read_only = !is_long_max && commits.iter().all(Commit::is_read_only);
        let mut tables_read = BTreeSet::new();
        let mut tables_write = BTreeSet::new();
        for statement in commits.iter().flat_map(|c| c.statements.iter()) {
            tables_read.extend(statement.tables_read.iter().cloned());
            tables_write.extend(statement.tables_write.iter().cloned());
        }
        tables_write.retain(|table| !tables_read.contains(table));
        Ok(CommitList {
            commits,
            is_read_only,
            is_wait,
            is_long_max,
            tables_read,
            tables_write,
            text_len,
            param_count,
        })
    }
}

/// Groups statements into commits on begin boundaries.
fn group(statements: Vec<Statement>) -> Vec<Commit> {
    let mut commits = Vec::new();
    let mut current: Vec<Statement> = Vec::new();
    for statement in statements {
        let kind = statement.kind;
        if kind == StatementKind::BeginTransaction && !current.is_empty() {
            commits.push(Commit::new(std::mem::take(&mut current)));
        }
        if current.is_empty() && kind != StatementKind::BeginTransaction {
            current.push(Statement::synthesized_begin());
        }
        current.push(statement);
        if kind.is_transaction_end() {
            commits.push(Commit::new(std::mem::take(&mut current)));
        }
    }
    if !current.is_empty() {
        commits.push(Commit::new(current));
    }
    commits
}

// ============================================================================
// SECTION: Tests
// ============================================================================
