// crates/mirrordb-store-sqlite/tests/memory_apply.rs
// ============================================================================
// Module: Memory Mirror Tests
// Description: Schema replay and row delta application on the mirror.
// Purpose: Validate keyed and keyless apply semantics.
// ============================================================================

//! Tests for the in-memory mirror.

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

use mirrordb_core::ChangeKind;
use mirrordb_core::RowSet;
use mirrordb_core::TableRows;
use mirrordb_core::Value;
use mirrordb_store_sqlite::MemorySchemaChange;
use mirrordb_store_sqlite::MemoryStore;

fn create(table: &str, sql: &str, rows: Vec<Vec<Value>>, columns: &[&str]) -> MemorySchemaChange {
    MemorySchemaChange::Create {
        table: table.to_string(),
        sql: sql.to_string(),
        rows: RowSet {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            rows,
        },
    }
}

fn table_rows(table: &str, keys: &[&str], rows: Vec<Vec<Value>>) -> TableRows {
    TableRows {
        table: table.to_string(),
        columns: vec!["id".to_string(), "v".to_string()],
        keys: keys.iter().map(|k| (*k).to_string()).collect(),
        rows,
    }
}

fn dump(store: &MemoryStore, table: &str) -> Vec<Vec<Value>> {
    store.query(&format!("SELECT * FROM {table} ORDER BY id, v"), &[]).unwrap().unwrap().rows
}

#[test]
fn keyed_changes_apply_in_order() {
    let store = MemoryStore::open().unwrap();
    let schema = [create("t", "CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)", vec![vec![Value::Integer(1), "a".into()]], &[
        "id", "v",
    ])];
    store.apply(&schema, &[]).unwrap();
    let applied = store
        .apply(&[], &[
            (ChangeKind::Del, table_rows("t", &["id"], vec![vec![Value::Integer(1), "a".into()]])),
            (ChangeKind::Add, table_rows("t", &["id"], vec![vec![Value::Integer(2), "b".into()]])),
            (ChangeKind::Set, table_rows("t", &["id"], vec![vec![Value::Integer(2), "c".into()]])),
        ])
        .unwrap();
    assert_eq!(applied, 3);
    assert_eq!(dump(&store, "t"), vec![vec![Value::Integer(2), Value::from("c")]]);
}

#[test]
fn keyless_delete_removes_one_matching_row() {
    let store = MemoryStore::open().unwrap();
    let rows = vec![vec![Value::Integer(1), "a".into()], vec![Value::Integer(1), "a".into()]];
    store.apply(&[create("k", "CREATE TABLE k (id, v)", rows, &["id", "v"])], &[]).unwrap();
    store.apply(&[], &[(ChangeKind::Del, table_rows("k", &[], vec![vec![Value::Integer(1), "a".into()]]))]).unwrap();
    assert_eq!(dump(&store, "k").len(), 1);
}

#[test]
fn changes_for_unmirrored_tables_are_skipped() {
    let store = MemoryStore::open().unwrap();
    let applied = store
        .apply(&[], &[(ChangeKind::Add, table_rows("absent", &["id"], vec![vec![Value::Integer(1), "a".into()]]))])
        .unwrap();
    assert_eq!(applied, 0);
    assert!(store.tables().unwrap().is_empty());
}

#[test]
fn drop_and_failed_apply_roll_back_together() {
    let store = MemoryStore::open().unwrap();
    store.apply(&[create("t", "CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT NOT NULL)", Vec::new(), &[])], &[]).unwrap();
    let result = store.apply(
        &[MemorySchemaChange::Drop {
            table: "t".to_string(),
        }],
        &[(ChangeKind::Add, table_rows("missing_column_table", &["id"], Vec::new()))],
    );
    assert!(result.is_ok());
    assert!(store.tables().unwrap().is_empty());

    store.apply(&[create("u", "CREATE TABLE u (id INTEGER PRIMARY KEY, v TEXT NOT NULL)", Vec::new(), &[])], &[]).unwrap();
    let failing = store.apply(
        &[create("w", "CREATE TABLE w (id)", Vec::new(), &[])],
        &[(ChangeKind::Add, table_rows("u", &["id"], vec![vec![Value::Integer(1), Value::Null]]))],
    );
    assert!(failing.is_err());
    assert!(!store.tables().unwrap().contains("w"));
}
