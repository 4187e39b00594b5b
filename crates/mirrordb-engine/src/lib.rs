// crates/mirrordb-engine/src/lib.rs
// ============================================================================
// Module: mirrordb Engine
// Description: Workers, queue and saver actors, recovery, and the database
//              context.
// Purpose: Execute scripts consistently across the durable store and the
//          memory mirror.
// Dependencies: mirrordb-config, mirrordb-core, mirrordb-store-sqlite, tokio
// ============================================================================

//! ## Overview
//! Build a [`Database`] with [`DatabaseBuilder`], then run scripts through
//! [`Worker::add`]. Each queued commit is committed durably, logged under a
//! globally ordered [`mirrordb_core::CommitId`], and mirrored by the saver
//! before its result is returned.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod context;
pub mod error;
mod executor;
pub mod invalidation;
pub mod queue;
pub mod recovery;
pub mod saver;
pub mod worker;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use context::Database;
pub use context::DatabaseBuilder;
pub use context::StatsSnapshot;
pub use error::EngineError;
pub use error::QueueError;
pub use error::SaverError;
pub use error::WorkerError;
pub use executor::WorkItem;
pub use invalidation::Invalidation;
pub use queue::QueueHandle;
pub use queue::QueueStatus;
pub use recovery::RecoveryReport;
pub use recovery::recover;
pub use saver::PendingSave;
pub use saver::SaveRequest;
pub use saver::SaverHandle;
pub use worker::Worker;
