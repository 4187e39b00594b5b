// crates/mirrordb-engine/src/saver.rs
// ============================================================================
// Module: Saver
// Description: Actor that applies committed deltas to the memory mirror.
// Purpose: Keep the mirror in commit order and acknowledge each commit.
// Dependencies: mirrordb-core, mirrordb-store-sqlite, tracing
// ============================================================================

//! ## Overview
//! Workers hand the saver one request per durably committed commit. The
//! saver applies its schema changes and rows to the mirror in one
//! transaction, tells the queue the commit is saved (or deletes its row when
//! there was nothing to save), then acknowledges the worker.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::mpsc;
use std::sync::mpsc::RecvTimeoutError;
use std::sync::mpsc::SyncSender;
use std::thread;
use std::time::Duration;

use mirrordb_core::ChangeKind;
use mirrordb_core::CommitId;
use mirrordb_core::TableRows;
use mirrordb_store_sqlite::MemorySchemaChange;
use mirrordb_store_sqlite::MemoryStore;

use crate::error::EngineError;
use crate::error::SaverError;
use crate::queue::QueueHandle;

// ============================================================================
// SECTION: Requests
// ============================================================================

/// One committed commit to mirror.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    /// Commit id.
    pub id: CommitId,
    /// Schema changes, applied first.
    pub schema: Vec<MemorySchemaChange>,
    /// Net row changes in apply order.
    pub changes: Vec<(ChangeKind, TableRows)>,
}

impl SaveRequest {
    /// Returns true when there is nothing to mirror.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schema.is_empty() && self.changes.iter().all(|(_, rows)| rows.rows.is_empty())
    }
}

/// Queued save with its acknowledgement channel.
#[derive(Debug)]
struct SaverCommand {
    /// Work to apply.
    request: SaveRequest,
    /// Acknowledgement channel.
    response: mpsc::Sender<Result<(), SaverError>>,
}

// ============================================================================
// SECTION: Handle
// ============================================================================

/// Sending side of the saver actor.
#[derive(Debug, Clone)]
pub struct SaverHandle {
    /// Command channel.
    sender: SyncSender<SaverCommand>,
    /// Acknowledgement wait bound.
    timeout: Duration,
}

impl SaverHandle {
    /// Spawns the saver thread.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Io`] when the thread cannot be spawned.
    pub fn spawn(
        memory: MemoryStore,
        queue: QueueHandle,
        capacity: usize,
        timeout: Duration,
    ) -> Result<Self, EngineError> {
        let (sender, receiver) = mpsc::sync_channel(capacity);
        thread::Builder::new()
            .name("mirrordb-saver".to_string())
            .spawn(move || saver_loop(&memory, &queue, &receiver))
            .map_err(|err| EngineError::Io(format!("failed to spawn saver thread: {err}")))?;
        Ok(Self {
            sender,
            timeout,
        })
    }

    /// Mirrors a commit and waits for the acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns [`SaverError`] when the saver is gone, the acknowledgement
    /// times out, or the mirror rejected the change.
    pub fn save(&self, request: SaveRequest) -> Result<(), SaverError> {
        self.submit(request)?.wait()
    }

    /// Enqueues a commit without waiting for it to be applied.
    ///
    /// Requests are applied in submission order, so callers that must order
    /// their commits submit under their own lock and wait outside it.
    ///
    /// # Errors
    ///
    /// Returns [`SaverError::Unavailable`] when the saver thread has stopped.
    pub fn submit(&self, request: SaveRequest) -> Result<PendingSave, SaverError> {
        let (response, reply) = mpsc::channel();
        self.sender
            .send(SaverCommand {
                request,
                response,
            })
            .map_err(|_| SaverError::Unavailable)?;
        Ok(PendingSave {
            reply,
            timeout: self.timeout,
        })
    }
}

/// Acknowledgement of one submitted save.
#[derive(Debug)]
pub struct PendingSave {
    /// Acknowledgement channel.
    reply: mpsc::Receiver<Result<(), SaverError>>,
    /// Acknowledgement wait bound.
    timeout: Duration,
}

impl PendingSave {
    /// Waits for the saver to apply the request.
    ///
    /// # Errors
    ///
    /// Returns [`SaverError`] when the saver is gone, the acknowledgement
    /// times out, or the mirror rejected the change.
    pub fn wait(self) -> Result<(), SaverError> {
        self.reply.recv_timeout(self.timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => SaverError::Timeout,
            RecvTimeoutError::Disconnected => SaverError::Unavailable,
        })?
    }
}

// ============================================================================
// SECTION: Actor
// ============================================================================

/// Runs the saver until every handle is dropped.
fn saver_loop(memory: &MemoryStore, queue: &QueueHandle, receiver: &mpsc::Receiver<SaverCommand>) {
    tracing::debug!("saver started");
    while let Ok(command) = receiver.recv() {
        let result = save(memory, queue, &command.request);
        let _ = command.response.send(result);
    }
    tracing::debug!("saver stopped");
}

/// Applies one request and notifies the queue.
fn save(memory: &MemoryStore, queue: &QueueHandle, request: &SaveRequest) -> Result<(), SaverError> {
    let id = request.id;
    if request.is_empty() {
        queue.delete(vec![id]).map_err(|err| SaverError::Consistency(err.to_string()))?;
        return Ok(());
    }
    let applied = memory.apply(&request.schema, &request.changes);
    // The durable commit already happened; the row is saved either way.
    queue.saved(id).map_err(|err| SaverError::Consistency(err.to_string()))?;
    match applied {
        Ok(rows) => {
            tracing::debug!(commit_id = id.0, rows, "commit mirrored");
            Ok(())
        }
        Err(err) => {
            tracing::error!(commit_id = id.0, error = %err, "memory mirror rejected a committed change");
            Err(SaverError::Consistency(err.to_string()))
        }
    }
}
