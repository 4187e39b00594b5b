// crates/mirrordb-engine/src/invalidation.rs
// ============================================================================
// Module: Memory Table Invalidation
// Description: Broadcast of schema changes and per-worker memory-table cache.
// Purpose: Let workers refresh memory-table membership lazily.
// Dependencies: mirrordb-store-sqlite, tokio
// ============================================================================

//! ## Overview
//! After a commit that changed table schemas has been mirrored, its worker
//! publishes an [`Invalidation`]. Every worker holds a receiver and, before
//! its next script, drains it; any message or a lagged receiver marks its
//! cached memory-table set stale, and the set is re-read from the mirror's
//! own catalog. Routing a memory-only read therefore never touches the
//! durable store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use mirrordb_store_sqlite::MemoryStore;
use mirrordb_store_sqlite::SqliteStoreError;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

// ============================================================================
// SECTION: Messages
// ============================================================================

/// Memory-table membership may have changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invalidation {
    /// Worker whose commit changed schemas.
    pub worker_id: u64,
}

/// Publishes an invalidation; having no subscribers is not an error.
pub(crate) fn publish(sender: &broadcast::Sender<Invalidation>, worker_id: u64) {
    let receivers = sender.send(Invalidation {
        worker_id,
    });
    tracing::debug!(worker_id, receivers = receivers.unwrap_or(0), "memory tables invalidated");
}

// ============================================================================
// SECTION: Cache
// ============================================================================

/// One worker's cached memory-table set.
#[derive(Debug)]
pub(crate) struct MemoryTables {
    /// Invalidation subscription.
    receiver: broadcast::Receiver<Invalidation>,
    /// Cached lower-cased table names.
    tables: BTreeSet<String>,
    /// The cache must be reloaded before use.
    stale: bool,
}

impl MemoryTables {
    /// Creates a cache that loads on first use.
    pub(crate) const fn new(receiver: broadcast::Receiver<Invalidation>) -> Self {
        Self {
            receiver,
            tables: BTreeSet::new(),
            stale: true,
        }
    }

    /// Drains pending invalidations and reloads the set when stale.
    ///
    /// Without a usable mirror the set is empty.
    pub(crate) fn refresh(&mut self, memory: Option<&MemoryStore>) -> Result<(), SqliteStoreError> {
        loop {
            match self.receiver.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => self.stale = true,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        if self.stale {
            self.tables = match memory {
                Some(memory) => memory.tables()?,
                None => BTreeSet::new(),
            };
            self.stale = false;
        }
        Ok(())
    }

    /// Cached set; call [`MemoryTables::refresh`] first.
    pub(crate) const fn tables(&self) -> &BTreeSet<String> {
        &self.tables
    }
}
