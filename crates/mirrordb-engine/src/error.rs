// crates/mirrordb-engine/src/error.rs
// ============================================================================
// Module: Engine Errors
// Description: Error types for workers, the queue, the saver, and startup.
// Purpose: Carry engine messages across actor boundaries as plain strings.
// Dependencies: mirrordb-core, mirrordb-store-sqlite, thiserror
// ============================================================================

//! ## Overview
//! Errors cross thread boundaries on reply channels, so every variant is
//! `Clone` and carries its message as a `String`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use mirrordb_core::AssembleError;
use mirrordb_core::DiffError;
use mirrordb_store_sqlite::SqliteStoreError;
use thiserror::Error;

// ============================================================================
// SECTION: Queue
// ============================================================================

/// Queue actor errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue thread has stopped.
    #[error("queue unavailable")]
    Unavailable,
    /// No reply arrived within the acknowledgement timeout.
    #[error("queue reply timed out")]
    Timeout,
    /// The pending log rejected the request.
    #[error("queue store error: {0}")]
    Store(String),
}

impl From<SqliteStoreError> for QueueError {
    fn from(err: SqliteStoreError) -> Self {
        Self::Store(err.to_string())
    }
}

// ============================================================================
// SECTION: Saver
// ============================================================================

/// Saver actor errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaverError {
    /// The saver thread has stopped.
    #[error("saver unavailable")]
    Unavailable,
    /// No acknowledgement arrived within the timeout.
    #[error("saver acknowledgement timed out")]
    Timeout,
    /// The memory mirror could not apply a durably committed change.
    #[error("memory mirror diverged: {0}")]
    Consistency(String),
}

// ============================================================================
// SECTION: Worker
// ============================================================================

/// Errors raised while a worker runs a script.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerError {
    /// The script could not be assembled.
    #[error(transparent)]
    Assemble(#[from] AssembleError),
    /// A statement failed in the engine.
    #[error("execution error: {0}")]
    Execution(String),
    /// Change-capture DDL could not be generated.
    #[error("diff error: {0}")]
    Diff(String),
    /// Queue failure.
    #[error(transparent)]
    Queue(#[from] QueueError),
    /// Saver failure.
    #[error(transparent)]
    Saver(#[from] SaverError),
    /// Durable and memory work disagree.
    #[error("consistency error: {0}")]
    Consistency(String),
    /// The worker state lock was poisoned.
    #[error("worker state lock poisoned")]
    Poisoned,
}

impl From<SqliteStoreError> for WorkerError {
    fn from(err: SqliteStoreError) -> Self {
        Self::Execution(err.to_string())
    }
}

impl From<DiffError> for WorkerError {
    fn from(err: DiffError) -> Self {
        Self::Diff(err.to_string())
    }
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Errors raised while building or initializing a database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Configuration is invalid.
    #[error("engine config error: {0}")]
    Config(String),
    /// A store could not be opened or read.
    #[error("engine store error: {0}")]
    Store(String),
    /// Startup recovery failed.
    #[error("recovery error: {0}")]
    Recovery(String),
    /// An actor thread could not be spawned.
    #[error("engine io error: {0}")]
    Io(String),
}

impl From<SqliteStoreError> for EngineError {
    fn from(err: SqliteStoreError) -> Self {
        Self::Store(err.to_string())
    }
}
