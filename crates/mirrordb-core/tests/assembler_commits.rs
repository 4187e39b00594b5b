// crates/mirrordb-core/tests/assembler_commits.rs
// ============================================================================
// Module: Commit Assembler Tests
// Description: Scenario tests for grouping, validation, and table sets.
// Purpose: Pin the assembler's observable behavior on hand-written scripts.
// ============================================================================

//! ## Overview
//! Scenario tests for the commit assembler:
//! - begin/commit synthesis and wait detection
//! - placeholder/parameter validation and reserved-table rejection
//! - write-set exclusion of tables that are also read

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use mirrordb_core::AssembleError;
use mirrordb_core::CommitAssembler;
use mirrordb_core::LongThresholds;
use mirrordb_core::StatementKind;
use mirrordb_core::Value;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn texts(list: &mirrordb_core::CommitList) -> Vec<Vec<String>> {
    list.commits
        .iter()
        .map(|c| c.statements.iter().map(|s| s.query.clone()).collect())
        .collect()
}

// ============================================================================
// SECTION: Grouping
// ============================================================================

#[test]
fn unbalanced_select_gets_begin_and_commit() {
    let list = CommitAssembler::default().assemble("SELECT * FROM user;", Vec::new(), false).unwrap();
    assert_eq!(texts(&list), vec![vec![
        "BEGIN TRANSACTION;".to_string(),
        "SELECT * FROM user;".to_string(),
        "COMMIT TRANSACTION;".to_string(),
    ]]);
}

#[test]
fn begin_starts_a_new_commit() {
    let list = CommitAssembler::default()
        .assemble(
            "INSERT INTO a VALUES (1);\nBEGIN;\nINSERT INTO b VALUES (2);\nCOMMIT;\nSELECT * FROM c;",
            Vec::new(),
            false,
        )
        .unwrap();
    assert_eq!(list.commits.len(), 3);
    assert!(!list.commits[0].has_explicit_begin());
    assert!(list.commits[1].has_explicit_begin());
    assert!(list.commits.iter().all(mirrordb_core::Commit::is_terminated));
    assert!(!list.is_wait);
}

#[test]
fn open_explicit_transaction_is_wait() {
    let list = CommitAssembler::default()
        .assemble("BEGIN;\nINSERT INTO a VALUES (?);", vec![Value::Integer(1)], false)
        .unwrap();
    assert!(list.is_wait);
    assert_eq!(list.commits.len(), 1);
    assert!(!list.commits[0].is_terminated());
}

#[test]
fn open_implicit_transaction_is_not_wait() {
    let list = CommitAssembler::default().assemble("INSERT INTO a VALUES (1);", Vec::new(), false).unwrap();
    assert!(!list.is_wait);
    assert_eq!(list.commits[0].statements.last().unwrap().kind, StatementKind::CommitTransaction);
}

#[test]
fn rollback_ends_a_commit() {
    let list = CommitAssembler::default()
        .assemble("BEGIN;\nDELETE FROM a;\nROLLBACK;", Vec::new(), false)
        .unwrap();
    assert!(list.commits[0].is_rollback());
}

#[test]
fn trigger_bodies_stay_in_one_statement() {
    let script = "CREATE TRIGGER t_audit AFTER INSERT ON t BEGIN INSERT INTO audit VALUES (NEW.id); END;\nINSERT INTO t VALUES (1);";
    let list = CommitAssembler::default().assemble(script, Vec::new(), false).unwrap();
    let kinds: Vec<StatementKind> = list.statements().map(|s| s.kind).collect();
    assert_eq!(kinds, vec![
        StatementKind::BeginTransaction,
        StatementKind::Other,
        StatementKind::Insert,
        StatementKind::CommitTransaction,
    ]);
}

// ============================================================================
// SECTION: Validation
// ============================================================================

#[test]
fn placeholder_mismatch_is_validation_error() {
    let err = CommitAssembler::default()
        .assemble("INSERT INTO a VALUES (?, ?);", vec![Value::Integer(1)], false)
        .unwrap_err();
    assert!(matches!(err, AssembleError::Validation(_)));
}

#[test]
fn empty_script_is_validation_error() {
    let err = CommitAssembler::default().assemble("  -- nothing\n", Vec::new(), false).unwrap_err();
    assert!(matches!(err, AssembleError::Validation(_)));
}

#[test]
fn reserved_tables_cannot_be_written() {
    let assembler = CommitAssembler::default();
    for script in [
        "DELETE FROM __tables;",
        "INSERT INTO users__add VALUES (1);",
        "UPDATE __variables SET value = 0;",
        "ALTER TABLE users RENAME TO users__del;",
    ] {
        let err = assembler.assemble(script, Vec::new(), false).unwrap_err();
        assert!(matches!(err, AssembleError::Validation(_)), "{script}");
    }
}

#[test]
fn reserved_tables_stay_protected_past_the_long_latch() {
    let assembler = CommitAssembler::new(LongThresholds {
        text_bytes: 5,
        params: 10,
    });
    for script in [
        "UPDATE __variables SET value = 1 WHERE name = 'isDiff';",
        "SELECT 1; DELETE FROM account__add;",
        "UPDATE OR IGNORE main.\"__tables\" SET is_memory = 1;",
        "INSERT OR REPLACE INTO account__set (id) VALUES (1);",
        "WITH doomed AS (SELECT 1) DELETE FROM __applied;",
        "CREATE TRIGGER spy AFTER INSERT ON __commits BEGIN SELECT 1; END;",
    ] {
        let err = assembler.assemble(script, Vec::new(), false).unwrap_err();
        assert!(matches!(err, AssembleError::Validation(_)), "{script}");
    }
}

#[test]
fn long_scripts_keep_write_targets() {
    let assembler = CommitAssembler::new(LongThresholds {
        text_bytes: 5,
        params: 10,
    });
    let list = assembler
        .assemble("INSERT INTO Orders (id) VALUES (1); UPDATE main.accounts SET n = 2;", Vec::new(), false)
        .unwrap();
    assert!(list.is_long_max);
    assert!(list.tables_write.contains("orders"));
    assert!(list.tables_write.contains("accounts"));
}

#[test]
fn parse_error_aborts_script() {
    let err = CommitAssembler::default()
        .assemble("INSERT INTO a VALUES (1);\nINSERT INTO;", Vec::new(), false)
        .unwrap_err();
    assert!(matches!(err, AssembleError::Parse(_)));
}

// ============================================================================
// SECTION: Table Sets
// ============================================================================

#[test]
fn write_set_defers_to_read_set() {
    let list = CommitAssembler::default()
        .assemble(
            "UPDATE accounts SET flagged = 1 WHERE id IN (SELECT id FROM accounts WHERE balance < 0);",
            Vec::new(),
            false,
        )
        .unwrap();
    assert!(list.tables_read.contains("accounts"));
    assert!(!list.tables_write.contains("accounts"));
    assert!(!list.is_read_only);
}

#[test]
fn table_names_are_lowercased() {
    let list = CommitAssembler::default()
        .assemble("INSERT INTO Orders SELECT * FROM \"Staging\";", Vec::new(), false)
        .unwrap();
    assert!(list.tables_write.contains("orders"));
    assert!(list.tables_read.contains("staging"));
}

#[test]
fn totals_count_submitted_statements() {
    let script = "INSERT INTO a VALUES (?);\nSELECT * FROM a WHERE x = ? AND y = ?;";
    let list = CommitAssembler::default()
        .assemble(script, vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)], false)
        .unwrap();
    assert_eq!(list.param_count, 3);
    assert_eq!(list.text_len, script.len() - 1);
}
