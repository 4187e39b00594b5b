// crates/mirrordb-core/tests/classifier_statements.rs
// ============================================================================
// Module: Statement Classifier Tests
// Description: Kind, table-set, and definition extraction tests.
// Purpose: Validate classification across the supported statement shapes.
// ============================================================================

//! ## Overview
//! Classifier tests grouped by concern:
//! - kind selection for transaction control, DDL, DML, and other shapes
//! - read/write table extraction, including CTE exclusion
//! - table definitions: keys and auto-increment detection
//! - rejected placeholder styles

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

use std::collections::BTreeSet;

use mirrordb_core::SchemaChange;
use mirrordb_core::StatementKind;
use mirrordb_core::Value;
use mirrordb_core::classify;
use mirrordb_core::classify_kind;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| (*n).to_string()).collect()
}

// ============================================================================
// SECTION: Kinds
// ============================================================================

#[test]
fn transaction_control_kinds() {
    for (text, kind) in [
        ("BEGIN;", StatementKind::BeginTransaction),
        ("BEGIN IMMEDIATE TRANSACTION;", StatementKind::BeginTransaction),
        ("START TRANSACTION;", StatementKind::BeginTransaction),
        ("END;", StatementKind::CommitTransaction),
        ("COMMIT TRANSACTION;", StatementKind::CommitTransaction),
        ("ROLLBACK;", StatementKind::RollbackTransaction),
    ] {
        assert_eq!(classify(text, Vec::new()).unwrap().kind, kind, "{text}");
    }
}

#[test]
fn ddl_and_other_kinds() {
    for (text, kind) in [
        ("CREATE TABLE t (id INTEGER PRIMARY KEY);", StatementKind::CreateTable),
        ("ALTER TABLE t RENAME TO u;", StatementKind::RenameTable),
        ("ALTER TABLE t ADD COLUMN name TEXT;", StatementKind::ModifyTableColumns),
        ("ALTER TABLE t RENAME COLUMN a TO b;", StatementKind::ModifyTableColumns),
        ("ALTER TABLE t DROP COLUMN a;", StatementKind::ModifyTableColumns),
        ("DROP TABLE IF EXISTS t;", StatementKind::DropTable),
        ("CREATE UNIQUE INDEX t_name ON t (name);", StatementKind::Other),
        ("CREATE VIEW v AS SELECT * FROM t;", StatementKind::Other),
        ("PRAGMA foreign_keys = ON;", StatementKind::Other),
        ("REPLACE INTO t (id) VALUES (1);", StatementKind::Insert),
        ("WITH x AS (SELECT 1) SELECT * FROM x;", StatementKind::Select),
        ("VALUES (1), (2);", StatementKind::Select),
    ] {
        assert_eq!(classify(text, Vec::new()).unwrap().kind, kind, "{text}");
    }
}

#[test]
fn kind_only_matches_full_classification() {
    for text in [
        "SELECT * FROM t;",
        "WITH x AS (SELECT 1) INSERT INTO t SELECT * FROM x;",
        "UPDATE t SET a = 1;",
        "DELETE FROM t;",
        "BEGIN;",
        "COMMIT;",
        "ALTER TABLE t RENAME TO u;",
    ] {
        let full = classify(text, Vec::new()).unwrap();
        let reduced = classify_kind(text, Vec::new()).unwrap();
        assert_eq!(full.kind, reduced.kind, "{text}");
    }
}

// ============================================================================
// SECTION: Tables
// ============================================================================

#[test]
fn insert_select_reads_and_writes() {
    let statement = classify("INSERT INTO archive SELECT * FROM orders WHERE shipped = 1;", Vec::new()).unwrap();
    assert_eq!(statement.tables_write, set(&["archive"]));
    assert_eq!(statement.tables_read, set(&["orders"]));
    assert!(statement.is_read);
}

#[test]
fn cte_names_are_not_tables() {
    let statement = classify(
        "WITH recent AS (SELECT * FROM orders WHERE at > ?) SELECT r.id FROM recent r JOIN users u ON u.id = r.user_id;",
        vec![Value::Integer(1)],
    )
    .unwrap();
    assert_eq!(statement.tables_read, set(&["orders", "users"]));
}

#[test]
fn subqueries_in_predicates_are_read() {
    let statement = classify(
        "DELETE FROM sessions WHERE user_id NOT IN (SELECT id FROM users) AND EXISTS (SELECT 1 FROM flags);",
        Vec::new(),
    )
    .unwrap();
    assert_eq!(statement.tables_write, set(&["sessions"]));
    assert_eq!(statement.tables_read, set(&["flags", "users"]));
    assert!(statement.is_read);
}

#[test]
fn plain_update_is_not_a_read() {
    let statement = classify("UPDATE users SET name = ? WHERE id = ?;", vec!["a".into(), Value::Integer(1)]).unwrap();
    assert!(!statement.is_read);
    assert_eq!(statement.columns, vec!["name".to_string()]);
}

#[test]
fn rename_writes_both_names() {
    let statement = classify("ALTER TABLE Users RENAME TO Members;", Vec::new()).unwrap();
    assert_eq!(statement.tables_write, set(&["members", "users"]));
    assert_eq!(
        statement.schema_change,
        Some(SchemaChange::Rename {
            from: "users".to_string(),
            to: "members".to_string(),
        })
    );
}

// ============================================================================
// SECTION: Definitions
// ============================================================================

#[test]
fn integer_primary_key_is_auto_increment() {
    let statement = classify("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT NOT NULL);", Vec::new()).unwrap();
    assert_eq!(statement.primary_keys, vec!["id".to_string()]);
    assert_eq!(statement.auto_increment, vec!["id".to_string()]);
    assert_eq!(statement.columns, vec!["id".to_string(), "name".to_string()]);
}

#[test]
fn composite_keys_have_no_auto_increment() {
    let statement = classify(
        "CREATE TABLE member (team_id INTEGER, user_id INTEGER, role TEXT, PRIMARY KEY (team_id, user_id));",
        Vec::new(),
    )
    .unwrap();
    assert_eq!(statement.primary_keys, vec!["team_id".to_string(), "user_id".to_string()]);
    assert!(statement.auto_increment.is_empty());
}

#[test]
fn mysql_style_auto_increment_is_recognized() {
    let statement = classify("CREATE TABLE t (id INT PRIMARY KEY AUTO_INCREMENT, v TEXT);", Vec::new()).unwrap();
    assert_eq!(statement.auto_increment, vec!["id".to_string()]);
}

#[test]
fn create_as_select_has_no_definition() {
    let statement = classify("CREATE TABLE copy AS SELECT * FROM source;", Vec::new()).unwrap();
    assert!(statement.is_read);
    assert_eq!(statement.tables_read, set(&["source"]));
    assert!(matches!(
        statement.schema_change,
        Some(SchemaChange::Create {
            definition: None,
            ..
        })
    ));
}

// ============================================================================
// SECTION: Rejections
// ============================================================================

#[test]
fn named_and_numbered_placeholders_are_rejected() {
    for text in ["SELECT * FROM t WHERE id = :id;", "SELECT ?1;", "SELECT @x;", "SELECT $x;"] {
        assert!(classify(text, Vec::new()).is_err(), "{text}");
    }
}

#[test]
fn trailing_garbage_is_rejected() {
    assert!(classify("SELECT 1 2;", Vec::new()).is_err());
}
