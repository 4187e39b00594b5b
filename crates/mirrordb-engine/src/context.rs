// crates/mirrordb-engine/src/context.rs
// ============================================================================
// Module: Database Context
// Description: Builder and handle owning stores, actors, and channels.
// Purpose: Validate configuration, recover, and hand out workers.
// Dependencies: mirrordb-config, mirrordb-core, mirrordb-store-sqlite, tokio
// ============================================================================

//! ## Overview
//! [`DatabaseBuilder::new`] validates a [`MirrorConfig`];
//! [`DatabaseBuilder::initialize`] opens the durable store and pending log,
//! runs recovery, loads memory tables into the mirror, and spawns the queue
//! and saver actors. The resulting [`Database`] owns every channel and
//! injects them into the [`Worker`]s it creates.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use mirrordb_config::LimitsConfig;
use mirrordb_config::MirrorConfig;
use mirrordb_core::CommitAssembler;
use mirrordb_store_sqlite::DurableConnection;
use mirrordb_store_sqlite::DurableStore;
use mirrordb_store_sqlite::MemorySchemaChange;
use mirrordb_store_sqlite::MemoryStore;
use mirrordb_store_sqlite::PendingLog;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::EngineError;
use crate::invalidation::Invalidation;
use crate::queue::QueueHandle;
use crate::recovery::RecoveryReport;
use crate::recovery::recover;
use crate::saver::SaverHandle;
use crate::worker::Worker;

// ============================================================================
// SECTION: Statistics
// ============================================================================

/// Engine-wide counters.
#[derive(Debug, Default)]
pub(crate) struct EngineStats {
    /// Queued commits committed durably.
    pub(crate) commits: AtomicU64,
    /// Commits rolled back by the client or after a failure.
    pub(crate) rollbacks: AtomicU64,
    /// Statements served by the memory mirror.
    pub(crate) memory_reads: AtomicU64,
    /// Read-only commits that bypassed the queue.
    pub(crate) snapshots: AtomicU64,
}

/// Point-in-time copy of the engine counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatsSnapshot {
    /// Queued commits committed durably.
    pub commits: u64,
    /// Commits rolled back.
    pub rollbacks: u64,
    /// Statements served by the memory mirror.
    pub memory_reads: u64,
    /// Read-only commits that bypassed the queue.
    pub snapshots: u64,
}

// ============================================================================
// SECTION: Shared State
// ============================================================================

/// State shared by the database handle and its workers.
#[derive(Debug)]
pub(crate) struct Shared {
    /// Database name.
    pub(crate) name: String,
    /// Durable store workers connect to.
    pub(crate) durable: DurableStore,
    /// Memory mirror; empty when the mirror is disabled.
    memory: MemoryStore,
    /// Serve reads from the mirror.
    memory_enabled: bool,
    /// The mirror missed a durable commit and must not serve reads.
    diverged: AtomicBool,
    /// Held from durable commit until the commit's save is enqueued.
    pub(crate) commit_order: Mutex<()>,
    /// Tables created as memory tables.
    pub(crate) designated: BTreeSet<String>,
    /// Script assembler.
    pub(crate) assembler: CommitAssembler,
    /// Script limits.
    pub(crate) limits: LimitsConfig,
    /// Queue actor.
    pub(crate) queue: QueueHandle,
    /// Saver actor.
    pub(crate) saver: SaverHandle,
    /// Memory-table invalidation channel.
    pub(crate) invalidation: broadcast::Sender<Invalidation>,
    /// Counters.
    pub(crate) stats: EngineStats,
    /// Next worker id.
    next_worker: AtomicU64,
}

impl Shared {
    /// Mirror for reads, when enabled and in step with the durable store.
    pub(crate) fn memory(&self) -> Option<&MemoryStore> {
        let usable = self.memory_enabled && !self.diverged.load(Ordering::Acquire);
        usable.then_some(&self.memory)
    }

    /// Stops mirror reads until the database is reinitialized.
    pub(crate) fn mark_diverged(&self) {
        if !self.diverged.swap(true, Ordering::AcqRel) {
            tracing::error!(database = %self.name, "memory mirror diverged; reads fall back to durable");
        }
    }
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Validated configuration awaiting initialization.
#[derive(Debug, Clone)]
pub struct DatabaseBuilder {
    /// Validated configuration.
    config: MirrorConfig,
}

impl DatabaseBuilder {
    /// Validates `config`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] when validation fails.
    pub fn new(mut config: MirrorConfig) -> Result<Self, EngineError> {
        config.validate().map_err(|err| EngineError::Config(err.to_string()))?;
        Ok(Self {
            config,
        })
    }

    /// Validated configuration.
    #[must_use]
    pub const fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// Opens stores, recovers the pending log, and starts the actors.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when a store cannot be opened, recovery fails,
    /// the mirror cannot be loaded, or an actor thread cannot be spawned.
    pub fn initialize(self) -> Result<Database, EngineError> {
        let config = self.config;
        let enabled = config.memory.enabled;
        let designated = config.memory.table_set();
        let assembler = CommitAssembler::new(config.limits.long_thresholds());

        let durable = DurableStore::open(&config.database.durable_path, config.store, enabled)?;
        let connection = durable.connect()?;
        connection.flag_memory_tables(&designated)?;

        let log = PendingLog::open(&config.database.log_path(), &config.store)?;
        let recovery = recover(&connection, &log, &assembler, &designated)?;

        let memory = MemoryStore::open()?;
        if enabled {
            bootstrap_memory(&connection, &memory)?;
        }
        drop(connection);

        let timeout = config.pipeline.ack_timeout();
        let queue = QueueHandle::spawn(log, config.pipeline.queue_capacity, timeout)?;
        let saver = SaverHandle::spawn(memory.clone(), queue.clone(), config.pipeline.saver_capacity, timeout)?;
        let (invalidation, _) = broadcast::channel(config.pipeline.invalidation_capacity);

        tracing::info!(
            database = %config.database.name,
            path = %durable.path().display(),
            memory = enabled,
            next_id = recovery.next_id.0,
            "database initialized"
        );
        Ok(Database {
            shared: Arc::new(Shared {
                name: config.database.name,
                durable,
                memory,
                memory_enabled: enabled,
                diverged: AtomicBool::new(false),
                commit_order: Mutex::new(()),
                designated,
                assembler,
                limits: config.limits,
                queue,
                saver,
                invalidation,
                stats: EngineStats::default(),
                next_worker: AtomicU64::new(1),
            }),
            recovery,
        })
    }
}

/// Copies every memory-flagged table and its rows into the mirror.
fn bootstrap_memory(connection: &DurableConnection, memory: &MemoryStore) -> Result<(), EngineError> {
    let catalog = connection.catalog();
    let mut schema = Vec::new();
    for table in connection.memory_tables()? {
        let Some(sql) = catalog.read_table_sql(&table)? else {
            tracing::warn!(table = %table, "memory table missing from catalog");
            continue;
        };
        let rows = connection.table_rows(&table)?;
        schema.push(MemorySchemaChange::Create {
            table,
            sql,
            rows,
        });
    }
    let tables = schema.len();
    memory.apply(&schema, &[])?;
    tracing::debug!(tables, "memory mirror loaded");
    Ok(())
}

// ============================================================================
// SECTION: Database
// ============================================================================

/// Initialized database handle.
#[derive(Debug, Clone)]
pub struct Database {
    /// State shared with workers.
    shared: Arc<Shared>,
    /// Startup recovery outcome.
    recovery: RecoveryReport,
}

impl Database {
    /// Creates a worker with its own durable connection.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] when the connection cannot be opened.
    pub fn worker(&self) -> Result<Worker, EngineError> {
        let id = self.shared.next_worker.fetch_add(1, Ordering::Relaxed);
        Worker::new(id, Arc::clone(&self.shared))
    }

    /// Database name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Startup recovery outcome.
    #[must_use]
    pub const fn recovery_report(&self) -> &RecoveryReport {
        &self.recovery
    }

    /// Queue handle, for diagnostics.
    #[must_use]
    pub fn queue(&self) -> &QueueHandle {
        &self.shared.queue
    }

    /// Memory mirror, when enabled and not diverged.
    #[must_use]
    pub fn memory(&self) -> Option<&MemoryStore> {
        self.shared.memory()
    }

    /// Returns true once a durable commit failed to reach the mirror.
    ///
    /// The mirror is rebuilt from the durable store on the next
    /// [`DatabaseBuilder::initialize`].
    #[must_use]
    pub fn is_mirror_diverged(&self) -> bool {
        self.shared.diverged.load(Ordering::Acquire)
    }

    /// Copies the engine counters.
    #[must_use]
    pub fn snapshot_stats(&self) -> StatsSnapshot {
        let stats = &self.shared.stats;
        StatsSnapshot {
            commits: stats.commits.load(Ordering::Relaxed),
            rollbacks: stats.rollbacks.load(Ordering::Relaxed),
            memory_reads: stats.memory_reads.load(Ordering::Relaxed),
            snapshots: stats.snapshots.load(Ordering::Relaxed),
        }
    }
}
