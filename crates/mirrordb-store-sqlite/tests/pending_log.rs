// crates/mirrordb-store-sqlite/tests/pending_log.rs
// ============================================================================
// Module: Pending Log Tests
// Description: Id allocation, amendment, and persistence of the commit log.
// Purpose: Validate the id sequence survives restarts and never repeats.
// ============================================================================

//! Tests for the pending-commit log.

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

use mirrordb_core::CommitId;
use mirrordb_core::Value;
use mirrordb_store_sqlite::PendingEntry;
use mirrordb_store_sqlite::PendingLog;
use mirrordb_store_sqlite::SqliteStoreConfig;
use mirrordb_store_sqlite::SqliteStoreError;
use proptest::prelude::*;
use tempfile::TempDir;

fn entry(query: &str) -> PendingEntry {
    PendingEntry {
        queries: vec![query.to_string()],
        params: vec![vec![Value::Integer(1), Value::Blob(vec![0, 255]), Value::Real(1.5)]],
    }
}

#[test]
fn ids_are_contiguous_and_persist() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("log.db");
    {
        let mut log = PendingLog::open(&path, &SqliteStoreConfig::default()).unwrap();
        let first = log.append(1, &[entry("a"), entry("b")], false).unwrap();
        assert_eq!(first, vec![CommitId(1), CommitId(2)]);
        let second = log.append(2, &[entry("c")], true).unwrap();
        assert_eq!(second, vec![CommitId(3)]);
    }
    let mut log = PendingLog::open(&path, &SqliteStoreConfig::default()).unwrap();
    assert_eq!(log.next_id().unwrap(), CommitId(4));
    let rows = log.unsaved().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2].worker_id, 2);
    assert!(rows[2].is_long);
    assert_eq!(rows[0].entry, entry("a"));
    log.delete(&[CommitId(3)]).unwrap();
    assert_eq!(log.append(1, &[entry("d")], false).unwrap(), vec![CommitId(4)]);
}

#[test]
fn saved_rows_leave_unsaved_list() {
    let dir = TempDir::new().unwrap();
    let mut log = PendingLog::open(&dir.path().join("log.db"), &SqliteStoreConfig::default()).unwrap();
    log.append(1, &[entry("a"), entry("b")], false).unwrap();
    log.mark_saved(CommitId(1)).unwrap();
    let unsaved: Vec<CommitId> = log.unsaved().unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(unsaved, vec![CommitId(2)]);
    assert_eq!(log.all().unwrap().len(), 2);
    assert_eq!(log.max_id().unwrap(), Some(CommitId(2)));
}

#[test]
fn prune_keeps_saved_rows_above_an_unsaved_one() {
    let dir = TempDir::new().unwrap();
    let mut log = PendingLog::open(&dir.path().join("log.db"), &SqliteStoreConfig::default()).unwrap();
    log.append(1, &[entry("a"), entry("b"), entry("c"), entry("d")], false).unwrap();
    log.mark_saved(CommitId(1)).unwrap();
    log.mark_saved(CommitId(3)).unwrap();
    assert_eq!(log.prune_saved().unwrap(), 1);
    let ids: Vec<CommitId> = log.all().unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![CommitId(2), CommitId(3), CommitId(4)]);
    log.mark_saved(CommitId(2)).unwrap();
    log.mark_saved(CommitId(4)).unwrap();
    assert_eq!(log.prune_saved().unwrap(), 3);
    assert!(log.all().unwrap().is_empty());
}

#[test]
fn amend_rewrites_statements() {
    let dir = TempDir::new().unwrap();
    let mut log = PendingLog::open(&dir.path().join("log.db"), &SqliteStoreConfig::default()).unwrap();
    let ids = log.append(1, &[entry("BEGIN;")], true).unwrap();
    let amended = PendingEntry {
        queries: vec!["BEGIN;".to_string(), "COMMIT;".to_string()],
        params: vec![Vec::new(), Vec::new()],
    };
    log.amend(ids[0], &amended).unwrap();
    assert_eq!(log.unsaved().unwrap()[0].entry, amended);
    assert!(matches!(log.amend(CommitId(99), &amended), Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn reseed_never_lowers() {
    let dir = TempDir::new().unwrap();
    let mut log = PendingLog::open(&dir.path().join("log.db"), &SqliteStoreConfig::default()).unwrap();
    assert_eq!(log.reseed(CommitId(10)).unwrap(), CommitId(10));
    assert_eq!(log.reseed(CommitId(3)).unwrap(), CommitId(10));
    log.clear().unwrap();
    assert_eq!(log.append(1, &[entry("a")], false).unwrap(), vec![CommitId(10)]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn blocks_never_overlap(sizes in prop::collection::vec(1usize .. 5, 1 .. 8)) {
        let dir = TempDir::new().unwrap();
        let mut log = PendingLog::open(&dir.path().join("log.db"), &SqliteStoreConfig::default()).unwrap();
        let mut last = 0;
        for size in sizes {
            let entries: Vec<PendingEntry> = (0 .. size).map(|_| entry("x")).collect();
            let ids = log.append(1, &entries, false).unwrap();
            prop_assert_eq!(ids.len(), size);
            for id in ids {
                prop_assert_eq!(id.0, last + 1);
                last = id.0;
            }
        }
    }
}
