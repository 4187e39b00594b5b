// crates/mirrordb-engine/tests/worker_scripts.rs
// ============================================================================
// Module: Worker Script Tests
// Description: End-to-end script execution through a database handle.
// Purpose: Validate routing, commit ids, rollbacks, and mirroring.
// ============================================================================

//! Tests for worker script execution.

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

use std::thread;

use mirrordb_config::MirrorConfig;
use mirrordb_core::CommitId;
use mirrordb_core::ResultList;
use mirrordb_core::Target;
use mirrordb_core::Value;
use mirrordb_engine::Database;
use mirrordb_engine::DatabaseBuilder;
use mirrordb_engine::Worker;
use mirrordb_engine::WorkerError;
use mirrordb_store_sqlite::DurableStore;
use mirrordb_store_sqlite::SqliteStoreConfig;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn config(dir: &TempDir, memory: &[&str]) -> MirrorConfig {
    let mut config = MirrorConfig::with_durable_path(dir.path().join("durable.db"));
    config.memory.enabled = true;
    config.memory.tables = memory.iter().map(|t| (*t).to_string()).collect();
    config.pipeline.ack_timeout_ms = 5_000;
    config
}

fn run(worker: &Worker, script: &str) -> Vec<ResultList> {
    let results = worker.add(script, Vec::new()).unwrap();
    assert!(!results.is_empty());
    results
}

fn setup(dir: &TempDir) -> (Database, Worker) {
    let db = DatabaseBuilder::new(config(dir, &["account"])).unwrap().initialize().unwrap();
    let worker = db.worker().unwrap();
    let created = run(&worker, "CREATE TABLE account (id INTEGER PRIMARY KEY, name TEXT);");
    assert_eq!(created[0].error, None);
    (db, worker)
}

fn mirrored(db: &Database, sql: &str) -> Vec<Vec<Value>> {
    db.memory().unwrap().query(sql, &[]).unwrap().unwrap().rows
}

fn row(id: i64, name: &str) -> Vec<Value> {
    vec![Value::Integer(id), Value::from(name)]
}

// ============================================================================
// SECTION: Queued Commits
// ============================================================================

#[test]
fn insert_reports_added_row_under_queue_id() {
    let dir = TempDir::new().unwrap();
    let (db, worker) = setup(&dir);
    let expected = db.queue().status().unwrap().next_id;

    let results = worker
        .add("BEGIN; INSERT INTO account (id, name) VALUES (?, ?); COMMIT;", vec![
            Value::Integer(1),
            Value::from("ann"),
        ])
        .unwrap();

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.id, expected);
    assert_eq!(result.error, None);
    assert_eq!(result.target, Target::Durable);
    assert_eq!(result.results_add.len(), 1);
    assert_eq!(result.results_add[0].table, "account");
    assert_eq!(result.results_add[0].rows, vec![row(1, "ann")]);
    assert_eq!(mirrored(&db, "SELECT id, name FROM account;"), vec![row(1, "ann")]);

    let status = db.queue().status().unwrap();
    assert_eq!(status.next_id, expected.next());
    assert_eq!(status.in_flight, 0);
}

#[test]
fn memory_only_select_bypasses_queue_and_durable() {
    let dir = TempDir::new().unwrap();
    let (db, worker) = setup(&dir);
    run(&worker, "INSERT INTO account (id, name) VALUES (1, 'ann');");
    let next_id = db.queue().status().unwrap().next_id;
    let before = db.snapshot_stats();

    let results = run(&worker, "SELECT id, name FROM account;");

    assert_eq!(results[0].id, CommitId::SNAPSHOT);
    assert_eq!(results[0].target, Target::Memory);
    assert_eq!(results[0].results_get[0].rows, vec![row(1, "ann")]);
    let after = db.snapshot_stats();
    assert_eq!(after.memory_reads, before.memory_reads + 1);
    assert_eq!(after.snapshots, before.snapshots + 1);
    assert_eq!(after.commits, before.commits);
    assert_eq!(db.queue().status().unwrap().next_id, next_id);
}

#[test]
fn invalidated_worker_routes_memory_reads_without_durable_registry() {
    let dir = TempDir::new().unwrap();
    let (db, worker) = setup(&dir);
    run(&worker, "INSERT INTO account (id, name) VALUES (1, 'ann');");

    // Another worker's schema change marks this worker's cache stale.
    let other = db.worker().unwrap();
    assert_eq!(run(&other, "CREATE TABLE audit (id INTEGER PRIMARY KEY, note TEXT);")[0].error, None);
    // A durable registry read now fails.
    let durable = DurableStore::open(dir.path().join("durable.db"), SqliteStoreConfig::default(), true).unwrap();
    durable.connect().unwrap().execute("UPDATE __tables SET keys = 'not json' WHERE name = 'audit';", &[]).unwrap();

    let results = run(&worker, "SELECT id, name FROM account;");

    assert_eq!(results[0].error, None);
    assert_eq!(results[0].target, Target::Memory);
    assert_eq!(results[0].results_get[0].rows, vec![row(1, "ann")]);
}

#[test]
fn select_of_unmirrored_table_reads_durable() {
    let dir = TempDir::new().unwrap();
    let (db, worker) = setup(&dir);
    run(&worker, "CREATE TABLE audit (id INTEGER PRIMARY KEY, note TEXT); INSERT INTO audit VALUES (1, 'x');");
    let before = db.snapshot_stats();

    let results = run(&worker, "SELECT note FROM audit;");

    assert_eq!(results[0].id, CommitId::SNAPSHOT);
    assert_eq!(results[0].target, Target::Durable);
    assert_eq!(results[0].results_get[0].rows, vec![vec![Value::from("x")]]);
    assert_eq!(db.snapshot_stats().memory_reads, before.memory_reads);
    assert!(db.memory().unwrap().tables().unwrap().iter().all(|t| t != "audit"));
}

#[test]
fn read_after_write_in_same_commit_uses_durable() {
    let dir = TempDir::new().unwrap();
    let (_db, worker) = setup(&dir);

    let results = run(&worker, "BEGIN; INSERT INTO account (id, name) VALUES (4, 'dee'); SELECT name FROM account; COMMIT;");

    assert_eq!(results[0].target, Target::Durable);
    assert_eq!(results[0].results_get[0].rows, vec![vec![Value::from("dee")]]);
}

#[test]
fn client_rollback_is_cancel() {
    let dir = TempDir::new().unwrap();
    let (db, worker) = setup(&dir);
    let before = db.snapshot_stats();

    let results = run(&worker, "BEGIN; INSERT INTO account (id, name) VALUES (5, 'x'); ROLLBACK;");

    assert!(results[0].is_cancel);
    assert_eq!(results[0].error, None);
    assert!(results[0].results_add.is_empty());
    assert_eq!(db.snapshot_stats().rollbacks, before.rollbacks + 1);
    assert!(run(&worker, "SELECT id FROM account;")[0].results_get[0].rows.is_empty());
    assert_eq!(db.queue().status().unwrap().in_flight, 0);
}

#[test]
fn failure_rolls_back_and_skips_later_commits() {
    let dir = TempDir::new().unwrap();
    let (db, worker) = setup(&dir);
    run(&worker, "INSERT INTO account (id, name) VALUES (1, 'ann');");
    let next_id = db.queue().status().unwrap().next_id;

    let results = run(
        &worker,
        "BEGIN; INSERT INTO account (id, name) VALUES (2, 'bob'); COMMIT;
         BEGIN; INSERT INTO account (id, name) VALUES (1, 'dup'); COMMIT;
         BEGIN; INSERT INTO account (id, name) VALUES (3, 'cy'); COMMIT;",
    );

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].error, None);
    assert_eq!(results[0].id, next_id);
    assert!(results[1].error.is_some());
    assert!(results[1].results_add.is_empty());
    let status = db.queue().status().unwrap();
    assert_eq!(status.next_id, CommitId(next_id.0 + 3));
    assert_eq!(status.in_flight, 0);
    assert_eq!(status.long_holder, None);
    let expected = vec![row(1, "ann"), row(2, "bob")];
    assert_eq!(run(&worker, "SELECT id, name FROM account ORDER BY id;")[0].results_get[0].rows, expected);
    assert_eq!(mirrored(&db, "SELECT id, name FROM account ORDER BY id;"), expected);
}

#[test]
fn scripts_over_limits_return_sentinel() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir, &[]);
    config.limits.long_text_bytes = 16;
    config.limits.max_script_bytes = 32;
    config.limits.long_params = 1;
    config.limits.max_params = 2;
    let db = DatabaseBuilder::new(config).unwrap().initialize().unwrap();
    let worker = db.worker().unwrap();

    let results = run(&worker, &"SELECT 1;".repeat(10));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, CommitId::SNAPSHOT);
    assert!(results[0].error.as_deref().unwrap().contains("exceeds"));

    let params = vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)];
    let results = worker.add("SELECT ?, ?, ?;", params).unwrap();
    assert_eq!(results[0].id, CommitId::SNAPSHOT);
    assert!(results[0].error.is_some());
}

#[test]
fn parse_errors_are_returned() {
    let dir = TempDir::new().unwrap();
    let (_db, worker) = setup(&dir);
    let err = worker.add("SELECT FROM WHERE;", Vec::new()).unwrap_err();
    assert!(matches!(err, WorkerError::Assemble(_)));
}

// ============================================================================
// SECTION: Interactive Transactions
// ============================================================================

#[test]
fn interactive_transaction_spans_calls() {
    let dir = TempDir::new().unwrap();
    let (db, worker) = setup(&dir);

    let first = worker
        .add("BEGIN; INSERT INTO account (id, name) VALUES (?, ?);", vec![Value::Integer(1), Value::from("ann")])
        .unwrap();
    assert_eq!(first.len(), 1);
    assert!(first[0].is_wait);
    let id = first[0].id;
    assert!(id.0 > 0);
    assert!(worker.is_waiting().unwrap());
    assert_eq!(db.queue().status().unwrap().long_holder, Some(id));

    let second = run(&worker, "INSERT INTO account (id, name) VALUES (2, 'bob');");
    assert!(second[0].is_wait);
    assert_eq!(second[0].id, id);

    let err = worker.add("INSERT INTO account (id, name) VALUES (?, ?);", Vec::new()).unwrap_err();
    assert!(matches!(err, WorkerError::Assemble(_)));
    assert!(worker.is_waiting().unwrap());

    let last = run(&worker, "COMMIT;");
    assert!(!last[0].is_wait);
    assert_eq!(last[0].id, id);
    assert_eq!(last[0].error, None);
    assert_eq!(last[0].results_add[0].rows, vec![row(1, "ann"), row(2, "bob")]);
    assert!(!worker.is_waiting().unwrap());

    let status = db.queue().status().unwrap();
    assert_eq!(status.long_holder, None);
    assert_eq!(status.in_flight, 0);
    assert_eq!(mirrored(&db, "SELECT id, name FROM account ORDER BY id;"), vec![row(1, "ann"), row(2, "bob")]);
}

#[test]
fn interactive_rollback_is_cancel() {
    let dir = TempDir::new().unwrap();
    let (db, worker) = setup(&dir);
    run(&worker, "BEGIN; INSERT INTO account (id, name) VALUES (1, 'ann');");
    let results = run(&worker, "ROLLBACK;");
    assert!(results[0].is_cancel);
    assert!(!worker.is_waiting().unwrap());
    assert_eq!(db.queue().status().unwrap().long_holder, None);
    assert!(mirrored(&db, "SELECT id FROM account;").is_empty());
}

#[test]
fn cancel_rolls_back_open_transaction() {
    let dir = TempDir::new().unwrap();
    let (db, worker) = setup(&dir);
    run(&worker, "BEGIN; INSERT INTO account (id, name) VALUES (7, 'z');");

    assert!(worker.cancel().unwrap());
    assert!(!worker.cancel().unwrap());
    assert!(!worker.is_waiting().unwrap());
    let status = db.queue().status().unwrap();
    assert_eq!(status.long_holder, None);
    assert_eq!(status.in_flight, 0);

    let other = db.worker().unwrap();
    let results = run(&other, "INSERT INTO account (id, name) VALUES (7, 'again');");
    assert_eq!(results[0].error, None);
}

#[test]
fn dropping_worker_releases_long_lock() {
    let dir = TempDir::new().unwrap();
    let (db, worker) = setup(&dir);
    run(&worker, "BEGIN; INSERT INTO account (id, name) VALUES (8, 'w');");
    drop(worker);
    assert_eq!(db.queue().status().unwrap().long_holder, None);
    let other = db.worker().unwrap();
    assert_eq!(run(&other, "INSERT INTO account (id, name) VALUES (8, 'v');")[0].error, None);
}

// ============================================================================
// SECTION: Schema Changes
// ============================================================================

#[test]
fn altered_memory_table_is_rebuilt_in_mirror() {
    let dir = TempDir::new().unwrap();
    let (db, worker) = setup(&dir);
    run(&worker, "INSERT INTO account (id, name) VALUES (1, 'ann');");

    let altered = run(&worker, "ALTER TABLE account ADD COLUMN email TEXT;");
    assert_eq!(altered[0].error, None);
    run(&worker, "INSERT INTO account (id, name, email) VALUES (2, 'bob', 'b@x');");

    assert_eq!(mirrored(&db, "SELECT id, email FROM account ORDER BY id;"), vec![
        vec![Value::Integer(1), Value::Null],
        vec![Value::Integer(2), Value::from("b@x")],
    ]);
}

#[test]
fn memory_table_created_mid_script_mirrors_later_commits() {
    let dir = TempDir::new().unwrap();
    let db = DatabaseBuilder::new(config(&dir, &["item"])).unwrap().initialize().unwrap();
    let worker = db.worker().unwrap();

    let results = run(
        &worker,
        "BEGIN; CREATE TABLE item (id INTEGER PRIMARY KEY, label TEXT); COMMIT;
         BEGIN; INSERT INTO item (id, label) VALUES (1, 'one'); COMMIT;",
    );

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.error.is_none()));
    assert_eq!(mirrored(&db, "SELECT id, label FROM item;"), vec![row(1, "one")]);
}

#[test]
fn dropped_memory_table_leaves_mirror() {
    let dir = TempDir::new().unwrap();
    let (db, worker) = setup(&dir);
    run(&worker, "DROP TABLE account;");
    assert!(!db.memory().unwrap().tables().unwrap().contains("account"));
}

// ============================================================================
// SECTION: Mirror Consistency
// ============================================================================

#[test]
fn unmirrored_commit_fails_the_call_and_stops_mirror_reads() {
    let dir = TempDir::new().unwrap();
    let (db, worker) = setup(&dir);
    run(&worker, "INSERT INTO account (id, name) VALUES (1, 'ann');");
    db.memory()
        .unwrap()
        .query(
            "CREATE TRIGGER reject_insert BEFORE INSERT ON account \
             BEGIN SELECT RAISE(ABORT, 'mirror rejects inserts'); END;",
            &[],
        )
        .unwrap();
    let before = db.snapshot_stats();

    let err = worker
        .add(
            "INSERT INTO account (id, name) VALUES (2, 'bob'); COMMIT; INSERT INTO account (id, name) VALUES (3, 'cy');",
            Vec::new(),
        )
        .unwrap_err();

    assert!(matches!(err, WorkerError::Consistency(_)), "{err}");
    assert!(db.is_mirror_diverged());
    assert!(db.memory().is_none());
    assert_eq!(db.queue().status().unwrap().in_flight, 0);

    let results = run(&worker, "SELECT id FROM account ORDER BY id;");
    assert_eq!(results[0].target, Target::Durable);
    assert_eq!(results[0].results_get[0].rows, vec![vec![Value::Integer(1)], vec![Value::Integer(2)]]);
    assert_eq!(db.snapshot_stats().memory_reads, before.memory_reads);
}

#[test]
fn concurrent_updates_reach_mirror_in_commit_order() {
    let dir = TempDir::new().unwrap();
    let (db, worker) = setup(&dir);
    run(&worker, "INSERT INTO account (id, name) VALUES (1, 'start');");

    thread::scope(|scope| {
        for writer in 0 .. 4 {
            let db = &db;
            scope.spawn(move || {
                let worker = db.worker().unwrap();
                for step in 0 .. 50 {
                    let name = Value::from(format!("w{writer}-{step}"));
                    let results = worker.add("UPDATE account SET name = ? WHERE id = 1;", vec![name]).unwrap();
                    assert_eq!(results[0].error, None);
                }
            });
        }
    });

    let durable = run(&worker, "UPDATE account SET name = name WHERE id = 0; SELECT id, name FROM account;");
    assert_eq!(durable[0].target, Target::Durable);
    assert_eq!(mirrored(&db, "SELECT id, name FROM account;"), durable[0].results_get[0].rows);
    assert!(!db.is_mirror_diverged());
}
