// crates/mirrordb-core/src/wait.rs
// ============================================================================
// Module: Wait Commit
// Description: Tracker for interactive transactions spanning several calls.
// Purpose: Return only the statements a follow-up call has not yet executed.
// Dependencies: crate::{assembler, commit, statement}
// ============================================================================

//! ## Overview
//! An interactive transaction arrives in pieces: `BEGIN; INSERT ...;` first,
//! then more statements, then `COMMIT;`. [`WaitCommit`] keeps the cumulative
//! script, reparses it in partial mode on every call and hands back the
//! statements after the last one already returned.
//!
//! The resume point is found by position first: the statement at the
//! previously returned count must match the last returned statement. Only
//! when that check fails does the tracker fall back to the first exact match
//! of text and parameters, then to the start of the buffer.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::assembler::AssembleError;
use crate::assembler::CommitAssembler;
use crate::commit::join_statements;
use crate::statement::Statement;
use crate::statement::Value;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Lifecycle of an interactive transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitState {
    /// No interactive transaction is open.
    #[default]
    Idle,
    /// Statements are being collected.
    Accumulating,
    /// Commit or rollback has been seen.
    Finalizing,
}

/// Statements to execute for one call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WaitStep {
    /// Statements not returned by an earlier call.
    pub statements: Vec<Statement>,
    /// The transaction ended in this call.
    pub finalizing: bool,
}

/// Interactive transaction tracker.
///
/// # Invariants
/// - `statements` holds the flattened, truncated parse of `script`.
/// - `returned <= statements.len()`.
#[derive(Debug, Clone, Default)]
pub struct WaitCommit {
    /// Assembler used for partial reparses.
    assembler: CommitAssembler,
    /// Cumulative script text.
    script: String,
    /// Cumulative parameters.
    params: Vec<Value>,
    /// Flattened statements of the last parse.
    statements: Vec<Statement>,
    /// Number of statements already returned.
    returned: usize,
    /// Current state.
    state: WaitState,
}

// ============================================================================
// SECTION: Tracker
// ============================================================================

impl WaitCommit {
    /// Creates an idle tracker.
    #[must_use]
    pub fn new(assembler: CommitAssembler) -> Self {
        Self {
            assembler,
            ..Self::default()
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> WaitState {
        self.state
    }

    /// Returns true while a transaction is open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        !matches!(self.state, WaitState::Idle)
    }

    /// Appends a script delta and returns the statements to run now.
    ///
    /// The buffer is left unchanged when the reparse fails.
    ///
    /// # Errors
    ///
    /// Returns [`AssembleError`] when the cumulative script does not parse or
    /// its placeholders and parameters disagree.
    pub fn append(&mut self, delta: &str, params: Vec<Value>) -> Result<WaitStep, AssembleError> {
        let mut script = self.script.clone();
        if !script.is_empty() {
            script.push('\n');
        }
        script.push_str(delta.trim());
        let mut all_params = self.params.clone();
        all_params.extend(params);

        let list = self.assembler.assemble(&script, all_params.clone(), true)?;
        let mut statements: Vec<Statement> = list.statements().cloned().collect();
        if let Some(end) = statements.iter().position(|s| s.kind.is_transaction_end()) {
            statements.truncate(end + 1);
        }
        let resume = self.resume_point(&statements);
        let finalizing = statements.last().is_some_and(|s| s.kind.is_transaction_end());
        let fresh = statements.get(resume ..).map(<[Statement]>::to_vec).unwrap_or_default();

        self.script = script;
        self.params = all_params;
        self.returned = statements.len();
        self.statements = statements;
        self.state = if finalizing { WaitState::Finalizing } else { WaitState::Accumulating };
        Ok(WaitStep {
            statements: fresh,
            finalizing,
        })
    }

    /// Index of the first statement not yet returned.
    fn resume_point(&self, statements: &[Statement]) -> usize {
        let Some(last) = self.returned.checked_sub(1).and_then(|i| self.statements.get(i)) else {
            return 0;
        };
        if statements.get(self.returned - 1).is_some_and(|s| s.same_submission(last)) {
            return self.returned;
        }
        statements.iter().position(|s| s.same_submission(last)).map_or(0, |i| i + 1)
    }

    /// Flattens the accumulated transaction into one script and parameters.
    #[must_use]
    pub fn save(&self) -> (String, Vec<Value>) {
        join_statements(self.statements.iter())
    }

    /// Returns the saved form and resets to idle.
    pub fn finish(&mut self) -> (String, Vec<Value>) {
        let saved = self.save();
        self.reset();
        saved
    }

    /// Discards the buffer and returns to idle.
    pub fn reset(&mut self) {
        self.script.clear();
        self.params.clear();
        self.statements.clear();
        self.returned = 0;
        self.state = WaitState::Idle;
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::*;

    fn texts(step: &WaitStep) -> Vec<&str> {
        step.statements.iter().map(|s| s.query.as_str()).collect()
    }

    #[test]
    fn repeated_identical_statements_are_not_skipped() {
        let mut wait = WaitCommit::default();
        let first = wait.append("BEGIN; INSERT INTO t VALUES (1);", Vec::new()).unwrap();
        assert_eq!(texts(&first), vec!["BEGIN;", "INSERT INTO t VALUES (1);"]);
        let second = wait.append("INSERT INTO t VALUES (1);", Vec::new()).unwrap();
        assert_eq!(texts(&second), vec!["INSERT INTO t VALUES (1);"]);
        assert_eq!(wait.state(), WaitState::Accumulating);
    }

    #[test]
    fn failed_reparse_keeps_buffer() {
        let mut wait = WaitCommit::default();
        wait.append("BEGIN;", Vec::new()).unwrap();
        assert!(wait.append("SELEKT;", Vec::new()).is_err());
        let step = wait.append("COMMIT;", Vec::new()).unwrap();
        assert_eq!(texts(&step), vec!["COMMIT;"]);
        assert!(step.finalizing);
        assert_eq!(wait.finish().0, "BEGIN;\nCOMMIT;");
        assert_eq!(wait.state(), WaitState::Idle);
    }
}
