// crates/mirrordb-core/tests/proptest_assembler.rs
// ============================================================================
// Module: Commit Assembler Property-Based Tests
// Description: Property tests for commit framing, round trip, and flags.
// Purpose: Check assembler invariants across random statement sequences.
// ============================================================================

//! Property-based tests for commit assembly invariants.

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

use mirrordb_core::CommitAssembler;
use mirrordb_core::StatementKind;
use mirrordb_core::Value;
use proptest::prelude::*;

/// Statement pool: text and placeholder count.
const POOL: &[(&str, usize)] = &[
    ("SELECT * FROM users WHERE id = ?;", 1),
    ("SELECT 1;", 0),
    ("INSERT INTO users (id, name) VALUES (?, ?);", 2),
    ("UPDATE users SET name = ? WHERE id = ?;", 2),
    ("DELETE FROM orders WHERE id = ?;", 1),
    ("BEGIN;", 0),
    ("BEGIN TRANSACTION;", 0),
    ("COMMIT;", 0),
    ("ROLLBACK;", 0),
];

fn script_strategy() -> impl Strategy<Value = (String, Vec<Value>)> {
    prop::collection::vec(0 .. POOL.len(), 1 .. 12).prop_map(|picks| {
        let mut texts = Vec::new();
        let mut params = Vec::new();
        for (n, pick) in picks.into_iter().enumerate() {
            let (text, count) = POOL[pick];
            texts.push(text);
            for offset in 0 .. count {
                params.push(Value::Integer(i64::try_from(n * 10 + offset).unwrap()));
            }
        }
        (texts.join("\n"), params)
    })
}

proptest! {
    #[test]
    fn every_commit_is_framed((script, params) in script_strategy()) {
        let list = CommitAssembler::default().assemble(&script, params, false).unwrap();
        for commit in &list.commits {
            prop_assert_eq!(commit.statements[0].kind, StatementKind::BeginTransaction);
            if !list.is_wait {
                prop_assert!(commit.is_terminated());
            }
        }
        if list.is_wait {
            prop_assert_eq!(list.commits.len(), 1);
            prop_assert!(list.commits[0].has_explicit_begin());
        }
    }

    #[test]
    fn partial_mode_never_synthesizes_commit((script, params) in script_strategy()) {
        let list = CommitAssembler::default().assemble(&script, params, true).unwrap();
        let synthesized_commits = list
            .statements()
            .filter(|s| s.synthesized && s.kind == StatementKind::CommitTransaction)
            .count();
        prop_assert_eq!(synthesized_commits, 0);
    }

    #[test]
    fn join_reproduces_script((script, params) in script_strategy()) {
        let list = CommitAssembler::default().assemble(&script, params.clone(), false).unwrap();
        let (joined, joined_params) = list.join();
        prop_assert_eq!(joined, script);
        prop_assert_eq!(joined_params, params);
    }

    #[test]
    fn read_only_iff_every_kind_is_read_only((script, params) in script_strategy()) {
        let list = CommitAssembler::default().assemble(&script, params, false).unwrap();
        let expected = list.statements().all(|s| s.kind.is_read_only());
        prop_assert_eq!(list.is_read_only, expected);
    }
}

#[test]
fn one_write_flips_read_only() {
    let assembler = CommitAssembler::default();
    let reads = assembler.assemble("SELECT * FROM a;\nSELECT * FROM b;", Vec::new(), false).unwrap();
    assert!(reads.is_read_only);
    let mixed = assembler
        .assemble("SELECT * FROM a;\nDELETE FROM c;\nSELECT * FROM b;", Vec::new(), false)
        .unwrap();
    assert!(!mixed.is_read_only);
}

#[test]
fn long_scripts_are_never_read_only() {
    let assembler = CommitAssembler::new(mirrordb_core::LongThresholds {
        text_bytes: 10,
        params: 100,
    });
    let list = assembler.assemble("SELECT * FROM a;\nSELECT * FROM b;", Vec::new(), false).unwrap();
    assert!(list.is_long_max);
    assert!(!list.is_read_only);
}
