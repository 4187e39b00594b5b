// crates/mirrordb-store-sqlite/src/lib.rs
// ============================================================================
// Module: mirrordb SQLite Stores
// Description: Durable target, memory mirror, and pending log on SQLite.
// Purpose: Provide every storage surface the mirrordb engine drives.
// Dependencies: mirrordb-core, rusqlite
// ============================================================================

//! ## Overview
//! Three SQLite-backed stores:
//! - [`DurableStore`]: the persistent target, with change-capture tables
//! - [`MemoryStore`]: the in-memory mirror of memory-designated tables
//! - [`PendingLog`]: the commit id sequence and replay log
//!
//! Security posture: statement text comes from callers and runs as given;
//! internal names are quoted and internal values are bound as parameters.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
mod connection;
pub mod durable;
pub mod error;
pub mod log;
pub mod memory;
pub mod value;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::SqliteStoreConfig;
pub use config::SqliteStoreMode;
pub use config::SqliteSyncMode;
pub use durable::DurableConnection;
pub use durable::DurableStore;
pub use durable::SqliteCatalog;
pub use error::SqliteStoreError;
pub use log::PendingEntry;
pub use log::PendingLog;
pub use log::PendingRow;
pub use memory::MemorySchemaChange;
pub use memory::MemoryStore;
