// crates/mirrordb-engine/tests/queue_actor.rs
// ============================================================================
// Module: Queue Actor Tests
// Description: Id allocation and long-lock scheduling through the queue.
// Purpose: Validate contiguous ids across sequential and concurrent callers.
// ============================================================================

//! Tests for the queue actor.

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
use std::time::Duration;
use std::time::Instant;

use mirrordb_core::CommitId;
use mirrordb_engine::QueueError;
use mirrordb_engine::QueueHandle;
use mirrordb_store_sqlite::PendingEntry;
use mirrordb_store_sqlite::PendingLog;
use mirrordb_store_sqlite::SqliteStoreConfig;
use proptest::prelude::*;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn spawn(dir: &TempDir, timeout: Duration) -> QueueHandle {
    let log = PendingLog::open(&dir.path().join("log.db"), &SqliteStoreConfig::default()).unwrap();
    QueueHandle::spawn(log, 16, timeout).unwrap()
}

fn entries(count: usize) -> Vec<PendingEntry> {
    (0 .. count)
        .map(|index| PendingEntry {
            queries: vec![format!("INSERT INTO t VALUES ({index});")],
            params: vec![Vec::new()],
        })
        .collect()
}

fn wait_for_deferred(queue: &QueueHandle, count: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while queue.status().unwrap().deferred < count {
        assert!(Instant::now() < deadline, "request never deferred");
        thread::sleep(Duration::from_millis(5));
    }
}

fn assert_contiguous(blocks: &[Vec<CommitId>], total: usize) {
    for block in blocks {
        for pair in block.windows(2) {
            assert_eq!(pair[1], pair[0].next());
        }
    }
    let mut all: Vec<i64> = blocks.iter().flatten().map(|id| id.0).collect();
    all.sort_unstable();
    let expected: Vec<i64> = (1 ..= i64::try_from(total).unwrap()).collect();
    assert_eq!(all, expected);
}

// ============================================================================
// SECTION: Allocation
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn sequential_blocks_are_contiguous(sizes in prop::collection::vec(1usize .. 6, 1 .. 10)) {
        let dir = TempDir::new().unwrap();
        let queue = spawn(&dir, Duration::from_secs(5));
        let mut blocks = Vec::new();
        for size in &sizes {
            let ids = queue.get(1, entries(*size), false).unwrap();
            prop_assert_eq!(ids.len(), *size);
            blocks.push(ids);
        }
        assert_contiguous(&blocks, sizes.iter().sum());
    }
}

#[test]
fn concurrent_blocks_never_overlap() {
    let dir = TempDir::new().unwrap();
    let queue = spawn(&dir, Duration::from_secs(5));
    let blocks: Vec<Vec<CommitId>> = thread::scope(|scope| {
        let handles: Vec<_> = (1 ..= 4u64)
            .map(|worker_id| {
                let queue = queue.clone();
                scope.spawn(move || {
                    (1 ..= 5usize)
                        .map(|size| queue.get(worker_id, entries(size), false).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().flat_map(|handle| handle.join().unwrap()).collect()
    });
    assert_contiguous(&blocks, 4 * 15);
    assert_eq!(queue.status().unwrap().in_flight, 60);
}

#[test]
fn saved_and_deleted_ids_leave_flight() {
    let dir = TempDir::new().unwrap();
    let queue = spawn(&dir, Duration::from_secs(5));
    let ids = queue.get(1, entries(3), false).unwrap();
    queue.delete(ids).unwrap();
    queue.delete(Vec::new()).unwrap();
    let status = queue.status().unwrap();
    assert_eq!(status.in_flight, 0);
    assert_eq!(status.next_id, CommitId(4));
}

#[test]
fn amend_of_unknown_id_fails() {
    let dir = TempDir::new().unwrap();
    let queue = spawn(&dir, Duration::from_secs(5));
    let err = queue.amend(CommitId(42), entries(1).remove(0)).unwrap_err();
    assert!(matches!(err, QueueError::Store(_)));
}

// ============================================================================
// SECTION: Long Lock
// ============================================================================

#[test]
fn long_block_defers_later_requests_until_released() {
    let dir = TempDir::new().unwrap();
    let queue = spawn(&dir, Duration::from_secs(5));
    let long = queue.get(1, entries(2), true).unwrap();
    assert_eq!(queue.status().unwrap().long_holder, Some(long[1]));

    let waiter = {
        let queue = queue.clone();
        thread::spawn(move || queue.get(2, entries(1), false).unwrap())
    };
    wait_for_deferred(&queue, 1);

    // Releasing only the first id keeps the lock.
    queue.delete(vec![long[0]]).unwrap();
    assert_eq!(queue.status().unwrap().deferred, 1);

    queue.delete(vec![long[1]]).unwrap();
    let ids = waiter.join().unwrap();
    assert_eq!(ids, vec![CommitId(3)]);
    let status = queue.status().unwrap();
    assert_eq!(status.long_holder, None);
    assert_eq!(status.deferred, 0);
}

#[test]
fn deferred_request_times_out_and_its_block_is_discarded() {
    let dir = TempDir::new().unwrap();
    let queue = spawn(&dir, Duration::from_millis(50));
    let long = queue.get(1, entries(1), true).unwrap();

    let err = queue.get(2, entries(1), false).unwrap_err();
    assert_eq!(err, QueueError::Timeout);

    queue.delete(long).unwrap();
    let status = queue.status().unwrap();
    assert_eq!(status.long_holder, None);
    assert_eq!(status.in_flight, 0);
    assert_eq!(status.next_id, CommitId(3));
    assert_eq!(queue.get(3, entries(1), false).unwrap(), vec![CommitId(3)]);
}
