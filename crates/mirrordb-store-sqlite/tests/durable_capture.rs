// crates/mirrordb-store-sqlite/tests/durable_capture.rs
// ============================================================================
// Module: Durable Capture Tests
// Description: Change capture through generated triggers on a real database.
// Purpose: Validate generated DDL, capture, tare, and catalog round trips.
// ============================================================================

//! ## Overview
//! Runs the diff generator's output against a durable `SQLite` file:
//! - insert/update/delete capture and tare
//! - `REPLACE` conflict deletes captured through recursive triggers
//! - capture gated by `isDiff`
//! - rename and column changes rebuilding capture from the catalog

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

use mirrordb_core::ChangeKind;
use mirrordb_core::ChangeSet;
use mirrordb_core::CommitId;
use mirrordb_core::SchemaDiffGenerator;
use mirrordb_core::Value;
use mirrordb_core::classify;
use mirrordb_store_sqlite::DurableConnection;
use mirrordb_store_sqlite::DurableStore;
use mirrordb_store_sqlite::SqliteStoreConfig;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn open() -> (TempDir, DurableConnection) {
    let dir = TempDir::new().unwrap();
    let store = DurableStore::open(dir.path().join("durable.db"), SqliteStoreConfig::default(), true).unwrap();
    let connection = store.connect().unwrap();
    (dir, connection)
}

fn ddl(connection: &DurableConnection, sql: &str) {
    let statement = classify(sql, Vec::new()).unwrap();
    let change = statement.schema_change.clone().unwrap();
    connection.run_generated(&SchemaDiffGenerator.before(&change)).unwrap();
    connection.execute(sql, &[]).unwrap();
    let after = SchemaDiffGenerator.after(&change, &connection.catalog(), false).unwrap();
    connection.run_generated(&after).unwrap();
}

fn captured(connection: &DurableConnection, sql: &str, params: &[Value]) -> ChangeSet {
    connection.set_diff(true).unwrap();
    connection.execute(sql, params).unwrap();
    connection.set_diff(false).unwrap();
    let mut changes = ChangeSet::new();
    for (kind, rows) in connection.capture_changes().unwrap() {
        changes.merge(kind, rows);
    }
    changes
}

// ============================================================================
// SECTION: Capture
// ============================================================================

#[test]
fn insert_update_delete_are_captured_and_tared() {
    let (_dir, connection) = open();
    ddl(&connection, "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);");

    let added = captured(&connection, "INSERT INTO users (id, name) VALUES (?, ?), (?, ?);", &[
        Value::Integer(1),
        "ada".into(),
        Value::Integer(2),
        "bob".into(),
    ]);
    let rows = added.rows(ChangeKind::Add);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].columns, vec!["id".to_string(), "name".to_string()]);
    assert_eq!(rows[0].keys, vec!["id".to_string()]);
    assert_eq!(rows[0].rows.len(), 2);

    let updated = captured(&connection, "UPDATE users SET name = 'eve' WHERE id = 2;", &[]);
    assert_eq!(updated.rows(ChangeKind::Set)[0].rows, vec![vec![Value::Integer(2), Value::from("eve")]]);
    assert!(updated.rows(ChangeKind::Del).is_empty());

    let deleted = captured(&connection, "DELETE FROM users WHERE id = 1;", &[]);
    assert_eq!(deleted.rows(ChangeKind::Del)[0].rows, vec![vec![Value::Integer(1), Value::from("ada")]]);

    assert!(connection.capture_changes().unwrap().is_empty());
    assert_eq!(connection.variable(mirrordb_core::Variable::ChangeCount).unwrap(), Value::Integer(0));
}

#[test]
fn key_change_records_old_row() {
    let (_dir, connection) = open();
    ddl(&connection, "CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT);");
    connection.execute("INSERT INTO t VALUES (1, 'a');", &[]).unwrap();
    let changes = captured(&connection, "UPDATE t SET id = 5 WHERE id = 1;", &[]);
    assert_eq!(changes.rows(ChangeKind::Set)[0].rows, vec![vec![Value::Integer(5), Value::from("a")]]);
    assert_eq!(changes.rows(ChangeKind::Del)[0].rows, vec![vec![Value::Integer(1), Value::from("a")]]);
}

#[test]
fn replace_conflict_nets_to_insert() {
    let (_dir, connection) = open();
    ddl(&connection, "CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT);");
    connection.execute("INSERT INTO t VALUES (1, 'a');", &[]).unwrap();
    let changes = captured(&connection, "REPLACE INTO t VALUES (1, 'b');", &[]);
    assert_eq!(changes.rows(ChangeKind::Add)[0].rows, vec![vec![Value::Integer(1), Value::from("b")]]);
    assert!(changes.rows(ChangeKind::Del).is_empty());
}

#[test]
fn capture_is_off_without_diff_flag() {
    let (_dir, connection) = open();
    ddl(&connection, "CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT);");
    connection.execute("INSERT INTO t VALUES (1, 'a');", &[]).unwrap();
    assert!(connection.capture_changes().unwrap().is_empty());
}

#[test]
fn rollback_discards_capture() {
    let (_dir, connection) = open();
    ddl(&connection, "CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT);");
    connection.begin(true).unwrap();
    connection.set_diff(true).unwrap();
    connection.execute("INSERT INTO t VALUES (1, 'a');", &[]).unwrap();
    connection.rollback().unwrap();
    assert!(!connection.in_transaction());
    assert!(connection.capture_changes().unwrap().is_empty());
    assert_eq!(connection.variable(mirrordb_core::Variable::IsDiff).unwrap(), Value::Integer(0));
}

// ============================================================================
// SECTION: Schema Changes
// ============================================================================

#[test]
fn rename_moves_registry_and_capture() {
    let (_dir, connection) = open();
    ddl(&connection, "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);");
    ddl(&connection, "ALTER TABLE users RENAME TO members;");
    let names: Vec<String> = connection.registry().unwrap().into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["members".to_string()]);
    assert!(connection.catalog().read_table_sql("users__add").unwrap().is_none());
    let changes = captured(&connection, "INSERT INTO members VALUES (1, 'x');", &[]);
    assert_eq!(changes.rows(ChangeKind::Add)[0].table, "members");
}

#[test]
fn dropping_a_captured_column_succeeds() {
    let (_dir, connection) = open();
    ddl(&connection, "CREATE TABLE t (id INTEGER PRIMARY KEY, a TEXT, b TEXT);");
    ddl(&connection, "ALTER TABLE t DROP COLUMN b;");
    let changes = captured(&connection, "INSERT INTO t VALUES (1, 'x');", &[]);
    assert_eq!(changes.rows(ChangeKind::Add)[0].columns, vec!["id".to_string(), "a".to_string()]);
}

#[test]
fn drop_removes_registry_row() {
    let (_dir, connection) = open();
    ddl(&connection, "CREATE TABLE t (id INTEGER PRIMARY KEY);");
    ddl(&connection, "DROP TABLE t;");
    assert!(connection.registry().unwrap().is_empty());
    assert!(connection.catalog().read_table_sql("t__del").unwrap().is_none());
}

#[test]
fn memory_flags_follow_configuration() {
    let (_dir, connection) = open();
    ddl(&connection, "CREATE TABLE a (id INTEGER PRIMARY KEY);");
    ddl(&connection, "CREATE TABLE b (id INTEGER PRIMARY KEY);");
    connection.flag_memory_tables(&["b".to_string()].into_iter().collect()).unwrap();
    let memory: Vec<String> = connection.memory_tables().unwrap().into_iter().collect();
    assert_eq!(memory, vec!["b".to_string()]);
}

#[test]
fn memory_flags_survive_reflagging_after_rename() {
    let (_dir, connection) = open();
    ddl(&connection, "CREATE TABLE b (id INTEGER PRIMARY KEY);");
    let configured: BTreeSet<String> = ["b".to_string()].into_iter().collect();
    connection.flag_memory_tables(&configured).unwrap();
    ddl(&connection, "ALTER TABLE b RENAME TO c;");
    connection.flag_memory_tables(&configured).unwrap();
    let memory: Vec<String> = connection.memory_tables().unwrap().into_iter().collect();
    assert_eq!(memory, vec!["c".to_string()]);
}

// ============================================================================
// SECTION: Applied Ids
// ============================================================================

#[test]
fn applied_ids_commit_with_the_transaction() {
    let (_dir, connection) = open();
    connection.begin(true).unwrap();
    connection.record_applied(CommitId(7)).unwrap();
    connection.rollback().unwrap();
    assert!(!connection.is_applied(CommitId(7)).unwrap());
    connection.begin(true).unwrap();
    connection.record_applied(CommitId(8)).unwrap();
    connection.commit().unwrap();
    assert!(connection.is_applied(CommitId(8)).unwrap());
    assert_eq!(connection.max_applied().unwrap(), Some(CommitId(8)));
    connection.clear_applied().unwrap();
    assert_eq!(connection.max_applied().unwrap(), None);
}
