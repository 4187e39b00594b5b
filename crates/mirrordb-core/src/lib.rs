// crates/mirrordb-core/src/lib.rs
// ============================================================================
// Module: mirrordb Core Library
// Description: Public API surface for statement analysis and commit assembly.
// Purpose: Expose the storage-agnostic types shared by stores and the engine.
// Dependencies: crate::{sql, classifier, assembler, diff, wait, results}
// ============================================================================

//! ## Overview
//! mirrordb core turns raw SQL scripts into classified statements and atomic
//! commits, generates the change-capture DDL that shadows every durable
//! table, and tracks interactive transactions across calls. Nothing here
//! touches a database: storage access goes through the [`SchemaCatalog`]
//! seam and the engine crate.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod assembler;
pub mod classifier;
pub mod commit;
pub mod diff;
pub mod identifiers;
pub mod registry;
pub mod results;
pub mod sql;
pub mod statement;
pub mod wait;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use assembler::AssembleError;
pub use assembler::CommitAssembler;
pub use assembler::LongThresholds;
pub use classifier::classify;
pub use classifier::classify_kind;
pub use commit::Commit;
pub use commit::CommitList;
pub use commit::join_statements;
pub use diff::DiffError;
pub use diff::GeneratedSql;
pub use diff::SchemaCatalog;
pub use diff::SchemaDiffGenerator;
pub use identifiers::ChangeKind;
pub use registry::TableRegistryEntry;
pub use registry::Variable;
pub use results::ChangeSet;
pub use results::CommitId;
pub use results::ResultList;
pub use results::RowSet;
pub use results::TableRows;
pub use results::Target;
pub use sql::ParseError;
pub use statement::SchemaChange;
pub use statement::Statement;
pub use statement::StatementKind;
pub use statement::TableDefinition;
pub use statement::Value;
pub use wait::WaitCommit;
pub use wait::WaitState;
pub use wait::WaitStep;
