// crates/mirrordb-core/tests/diff_generation.rs
// ============================================================================
// Module: Schema Diff Generation Tests
// Description: Companion-table, trigger, and registry DDL tests.
// Purpose: Validate generated capture infrastructure per schema change.
// ============================================================================

//! ## Overview
//! Tests for the schema diff generator against an in-test catalog:
//! - three companion tables and three triggers per created table
//! - every column and key enumerated
//! - rename/modify/drop sequencing

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

use std::collections::HashMap;

use mirrordb_core::DiffError;
use mirrordb_core::GeneratedSql;
use mirrordb_core::SchemaCatalog;
use mirrordb_core::SchemaChange;
use mirrordb_core::SchemaDiffGenerator;
use mirrordb_core::Value;
use mirrordb_core::classify;
use proptest::prelude::*;

// ============================================================================
// SECTION: Helpers
// ============================================================================

#[derive(Default)]
struct MapCatalog(HashMap<String, String>);

impl MapCatalog {
    fn with(table: &str, sql: &str) -> Self {
        let mut map = HashMap::new();
        map.insert(table.to_string(), sql.to_string());
        Self(map)
    }
}

impl SchemaCatalog for MapCatalog {
    fn table_sql(&self, table: &str) -> Result<Option<String>, DiffError> {
        Ok(self.0.get(table).cloned())
    }
}

fn generate_create(sql: &str) -> Vec<GeneratedSql> {
    let statement = classify(sql, Vec::new()).unwrap();
    let change = statement.schema_change.unwrap();
    SchemaDiffGenerator.after(&change, &MapCatalog::default(), false).unwrap()
}

fn count(sql: &[GeneratedSql], needle: &str) -> usize {
    sql.iter().filter(|s| s.sql.starts_with(needle)).count()
}

// ============================================================================
// SECTION: Create
// ============================================================================

#[test]
fn create_table_generates_three_tables_and_triggers() {
    let sql = generate_create("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, email TEXT UNIQUE);");
    assert_eq!(count(&sql, "CREATE TABLE IF NOT EXISTS"), 3);
    assert_eq!(count(&sql, "CREATE TRIGGER"), 3);
    assert_eq!(count(&sql, "DROP TRIGGER IF EXISTS"), 3);
    for suffix in ["__add", "__set", "__del"] {
        let table = sql.iter().find(|s| s.sql.contains(&format!("\"users{suffix}\" ("))).unwrap();
        assert!(table.sql.contains("\"id\" INTEGER, \"name\" TEXT, \"email\" TEXT, PRIMARY KEY (\"id\")"));
    }
    for trigger in ["users__on_insert", "users__on_update", "users__on_delete"] {
        let ddl = sql.iter().find(|s| s.sql.starts_with(&format!("CREATE TRIGGER \"{trigger}\""))).unwrap();
        assert!(ddl.sql.contains("WHEN (SELECT value FROM __variables WHERE name = 'isDiff') = 1"));
        assert!(ddl.sql.contains("\"id\", \"name\", \"email\""));
        assert!(ddl.sql.contains("change_count = change_count + 1 WHERE name = 'users'"));
    }
}

#[test]
fn update_trigger_records_old_row_on_key_change() {
    let sql = generate_create("CREATE TABLE m (a INTEGER, b INTEGER, v TEXT, PRIMARY KEY (a, b));");
    let update = sql.iter().find(|s| s.sql.contains("AFTER UPDATE")).unwrap();
    assert!(update.sql.contains("WHERE OLD.\"a\" IS NOT NEW.\"a\" OR OLD.\"b\" IS NOT NEW.\"b\""));
}

#[test]
fn registry_upsert_is_last_and_parameterized() {
    let statement = classify("CREATE TABLE items (id INTEGER PRIMARY KEY AUTOINCREMENT, v);", Vec::new()).unwrap();
    let sql = SchemaDiffGenerator
        .after(&statement.schema_change.unwrap(), &MapCatalog::default(), true)
        .unwrap();
    let upsert = sql.last().unwrap();
    assert!(upsert.sql.starts_with("INSERT INTO __tables"));
    assert!(upsert.sql.contains("ON CONFLICT(name) DO UPDATE"));
    assert_eq!(upsert.params, vec![
        Value::Text("items".to_string()),
        Value::Text("[\"id\"]".to_string()),
        Value::Text("[\"id\"]".to_string()),
        Value::Integer(1),
    ]);
}

#[test]
fn create_as_select_reads_catalog() {
    let statement = classify("CREATE TABLE copy AS SELECT * FROM source;", Vec::new()).unwrap();
    let catalog = MapCatalog::with("copy", "CREATE TABLE copy(id INT, name TEXT)");
    let sql = SchemaDiffGenerator.after(&statement.schema_change.unwrap(), &catalog, false).unwrap();
    assert_eq!(count(&sql, "CREATE TRIGGER"), 3);
    let missing = classify("CREATE TABLE other AS SELECT 1;", Vec::new()).unwrap();
    let err = SchemaDiffGenerator
        .after(&missing.schema_change.unwrap(), &MapCatalog::default(), false)
        .unwrap_err();
    assert_eq!(err, DiffError::MissingTable("other".to_string()));
}

#[test]
fn temporary_tables_are_skipped() {
    assert!(generate_create("CREATE TEMP TABLE scratch (a, b);").is_empty());
}

// ============================================================================
// SECTION: Rename / Modify / Drop
// ============================================================================

#[test]
fn rename_drops_triggers_before_and_rebuilds_after() {
    let change = SchemaChange::Rename {
        from: "users".to_string(),
        to: "members".to_string(),
    };
    let before = SchemaDiffGenerator.before(&change);
    assert_eq!(before.len(), 3);
    assert!(before.iter().all(|s| s.sql.contains("\"users__on_")));

    let catalog = MapCatalog::with("members", "CREATE TABLE \"members\" (id INTEGER PRIMARY KEY, name TEXT)");
    let after = SchemaDiffGenerator.after(&change, &catalog, false).unwrap();
    assert!(after[.. 3].iter().all(|s| s.sql.starts_with("DROP TABLE IF EXISTS \"users__")));
    assert_eq!(after[3].sql, "UPDATE __tables SET name = ? WHERE name = ?");
    assert_eq!(after[3].params, vec![Value::Text("members".to_string()), Value::Text("users".to_string())]);
    assert!(after.iter().any(|s| s.sql.starts_with("CREATE TRIGGER \"members__on_insert\"")));
}

#[test]
fn modify_rereads_columns() {
    let change = SchemaChange::Modify {
        table: "users".to_string(),
    };
    let catalog = MapCatalog::with("users", "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)");
    let after = SchemaDiffGenerator.after(&change, &catalog, false).unwrap();
    let add = after.iter().find(|s| s.sql.contains("\"users__add\" (")).unwrap();
    assert!(add.sql.contains("\"age\" INTEGER"));
}

#[test]
fn drop_removes_companions_and_registry_row() {
    let change = SchemaChange::Drop {
        table: "users".to_string(),
        if_exists: true,
    };
    assert!(SchemaDiffGenerator.before(&change).is_empty());
    let after = SchemaDiffGenerator.after(&change, &MapCatalog::default(), false).unwrap();
    assert_eq!(after.len(), 4);
    assert_eq!(after[3].sql, "DELETE FROM __tables WHERE name = ?");
}

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    #[test]
    fn every_column_appears_in_every_trigger(
        columns in prop::collection::btree_set("[a-z]{1,6}", 1 .. 6),
        keyed in any::<bool>(),
    ) {
        let columns: Vec<String> = columns.into_iter().map(|c| format!("c_{c}")).collect();
        let mut defs: Vec<String> = columns.iter().map(|c| format!("{c} TEXT")).collect();
        if keyed {
            defs.push(format!("PRIMARY KEY ({})", columns[0]));
        }
        let sql = generate_create(&format!("CREATE TABLE prop ({});", defs.join(", ")));
        prop_assert_eq!(count(&sql, "CREATE TABLE IF NOT EXISTS"), 3);
        prop_assert_eq!(count(&sql, "CREATE TRIGGER"), 3);
        for statement in sql.iter().filter(|s| s.sql.starts_with("CREATE")) {
            for column in &columns {
                let quoted = format!("\"{column}\"");
                prop_assert!(statement.sql.contains(&quoted));
            }
        }
    }
}
