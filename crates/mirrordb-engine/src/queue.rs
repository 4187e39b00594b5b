// crates/mirrordb-engine/src/queue.rs
// ============================================================================
// Module: Commit Queue
// Description: Actor that allocates commit ids and owns the pending log.
// Purpose: Serialize id allocation and bound concurrent long transactions.
// Dependencies: mirrordb-core, mirrordb-store-sqlite, tracing
// ============================================================================

//! ## Overview
//! The queue runs on a dedicated thread fed by a bounded channel. Workers ask
//! it for id blocks; the saver tells it when a commit is saved; workers tell
//! it when ids are abandoned. Every reply travels on a per-request channel.
//!
//! # Invariants
//! - Ids are allocated in contiguous, strictly increasing blocks.
//! - At most one long block is in flight. While it is, further `get`
//!   requests wait in FIFO order and are served when the block's last id is
//!   saved or deleted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::mpsc::RecvTimeoutError;
use std::sync::mpsc::SyncSender;
use std::thread;
use std::time::Duration;

use mirrordb_core::CommitId;
use mirrordb_store_sqlite::PendingEntry;
use mirrordb_store_sqlite::PendingLog;

use crate::error::EngineError;
use crate::error::QueueError;

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Requests handled by the queue thread.
#[derive(Debug)]
enum QueueCommand {
    /// Allocate one id per entry.
    Get(GetRequest),
    /// Rewrite a pending row.
    Amend {
        /// Row to rewrite.
        id: CommitId,
        /// New statements.
        entry: PendingEntry,
        /// Result channel.
        response: mpsc::Sender<Result<(), QueueError>>,
    },
    /// The saver finished a commit.
    Saved {
        /// Saved id.
        id: CommitId,
    },
    /// Ids were abandoned or had nothing to save.
    Delete {
        /// Ids to discard.
        ids: Vec<CommitId>,
    },
    /// Report queue state.
    Status {
        /// Result channel.
        response: mpsc::Sender<Result<QueueStatus, QueueError>>,
    },
}

/// Pending id allocation request.
#[derive(Debug)]
struct GetRequest {
    /// Requesting worker.
    worker_id: u64,
    /// One entry per commit.
    entries: Vec<PendingEntry>,
    /// Hold the long lock until the block's last id completes.
    is_long: bool,
    /// Result channel.
    response: mpsc::Sender<Result<Vec<CommitId>, QueueError>>,
}

/// Snapshot of the queue's bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStatus {
    /// Next id to allocate.
    pub next_id: CommitId,
    /// Last id of the long block holding the lock, if any.
    pub long_holder: Option<CommitId>,
    /// Requests waiting for the long lock.
    pub deferred: usize,
    /// Allocated ids not yet saved or deleted.
    pub in_flight: usize,
}

// ============================================================================
// SECTION: Handle
// ============================================================================

/// Sending side of the queue actor.
#[derive(Debug, Clone)]
pub struct QueueHandle {
    /// Command channel.
    sender: SyncSender<QueueCommand>,
    /// Reply wait bound.
    timeout: Duration,
}

impl QueueHandle {
    /// Spawns the queue thread over an opened pending log.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Io`] when the thread cannot be spawned.
    pub fn spawn(log: PendingLog, capacity: usize, timeout: Duration) -> Result<Self, EngineError> {
        let (sender, receiver) = mpsc::sync_channel(capacity);
        thread::Builder::new()
            .name("mirrordb-queue".to_string())
            .spawn(move || queue_loop(log, &receiver))
            .map_err(|err| EngineError::Io(format!("failed to spawn queue thread: {err}")))?;
        Ok(Self {
            sender,
            timeout,
        })
    }

    /// Allocates a contiguous block of ids, one per entry, and logs them.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] when the queue is gone, the reply times out
    /// (for example while another long block holds the lock), or the log
    /// write fails.
    pub fn get(
        &self,
        worker_id: u64,
        entries: Vec<PendingEntry>,
        is_long: bool,
    ) -> Result<Vec<CommitId>, QueueError> {
        let (response, reply) = mpsc::channel();
        self.send(QueueCommand::Get(GetRequest {
            worker_id,
            entries,
            is_long,
            response,
        }))?;
        self.wait(&reply)?
    }

    /// Rewrites the logged statements of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] when the queue is gone, the reply times out, or
    /// the row does not exist.
    pub fn amend(&self, id: CommitId, entry: PendingEntry) -> Result<(), QueueError> {
        let (response, reply) = mpsc::channel();
        self.send(QueueCommand::Amend {
            id,
            entry,
            response,
        })?;
        self.wait(&reply)?
    }

    /// Discards ids that will never be saved.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Unavailable`] when the queue is gone.
    pub fn delete(&self, ids: Vec<CommitId>) -> Result<(), QueueError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.send(QueueCommand::Delete {
            ids,
        })
    }

    /// Reports that `id` was saved.
    pub(crate) fn saved(&self, id: CommitId) -> Result<(), QueueError> {
        self.send(QueueCommand::Saved {
            id,
        })
    }

    /// Returns the queue's current bookkeeping.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] when the queue is gone or the reply times out.
    pub fn status(&self) -> Result<QueueStatus, QueueError> {
        let (response, reply) = mpsc::channel();
        self.send(QueueCommand::Status {
            response,
        })?;
        self.wait(&reply)?
    }

    /// Enqueues a command, blocking while the channel is full.
    fn send(&self, command: QueueCommand) -> Result<(), QueueError> {
        self.sender.send(command).map_err(|_| QueueError::Unavailable)
    }

    /// Waits for a reply within the timeout.
    fn wait<T>(&self, reply: &mpsc::Receiver<T>) -> Result<T, QueueError> {
        reply.recv_timeout(self.timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => QueueError::Timeout,
            RecvTimeoutError::Disconnected => QueueError::Unavailable,
        })
    }
}

// ============================================================================
// SECTION: Actor
// ============================================================================

/// Queue thread state.
struct QueueActor {
    /// Pending-commit log.
    log: PendingLog,
    /// Last id of the long block in flight.
    long_holder: Option<CommitId>,
    /// Requests waiting for the long lock.
    deferred: VecDeque<GetRequest>,
    /// Allocated ids not yet saved or deleted.
    in_flight: BTreeSet<CommitId>,
}

/// Runs the queue until every handle is dropped.
fn queue_loop(log: PendingLog, receiver: &mpsc::Receiver<QueueCommand>) {
    let mut actor = QueueActor {
        log,
        long_holder: None,
        deferred: VecDeque::new(),
        in_flight: BTreeSet::new(),
    };
    tracing::debug!("queue started");
    while let Ok(command) = receiver.recv() {
        actor.handle(command);
    }
    tracing::debug!(deferred = actor.deferred.len(), "queue stopped");
}

impl QueueActor {
    /// Dispatches one command.
    fn handle(&mut self, command: QueueCommand) {
        match command {
            QueueCommand::Get(request) => {
                if self.long_holder.is_some() {
                    tracing::debug!(worker_id = request.worker_id, "id request deferred behind long lock");
                    self.deferred.push_back(request);
                } else {
                    self.allocate(request);
                }
            }
            QueueCommand::Amend {
                id,
                entry,
                response,
            } => {
                let result = self.log.amend(id, &entry).map_err(QueueError::from);
                let _ = response.send(result);
            }
            QueueCommand::Saved {
                id,
            } => {
                if let Err(err) = self.log.mark_saved(id) {
                    tracing::warn!(commit_id = id.0, error = %err, "failed to mark commit saved");
                }
                if let Err(err) = self.log.prune_saved() {
                    tracing::warn!(error = %err, "failed to prune saved commits");
                }
                self.in_flight.remove(&id);
                self.release(&[id]);
            }
            QueueCommand::Delete {
                ids,
            } => {
                if let Err(err) = self.log.delete(&ids) {
                    tracing::warn!(error = %err, "failed to delete abandoned commits");
                }
                for id in &ids {
                    self.in_flight.remove(id);
                }
                self.release(&ids);
            }
            QueueCommand::Status {
                response,
            } => {
                let status = self.log.next_id().map_err(QueueError::from).map(|next_id| QueueStatus {
                    next_id,
                    long_holder: self.long_holder,
                    deferred: self.deferred.len(),
                    in_flight: self.in_flight.len(),
                });
                let _ = response.send(status);
            }
        }
    }

    /// Allocates and logs a block, taking the long lock when asked.
    fn allocate(&mut self, request: GetRequest) {
        let GetRequest {
            worker_id,
            entries,
            is_long,
            response,
        } = request;
        let ids = match self.log.append(worker_id, &entries, is_long) {
            Ok(ids) => ids,
            Err(err) => {
                tracing::warn!(worker_id, error = %err, "id allocation failed");
                let _ = response.send(Err(QueueError::from(err)));
                return;
            }
        };
        if response.send(Ok(ids.clone())).is_err() {
            tracing::warn!(worker_id, "worker left before receiving ids; discarding block");
            if let Err(err) = self.log.delete(&ids) {
                tracing::warn!(error = %err, "failed to delete orphaned commits");
            }
            return;
        }
        self.in_flight.extend(ids.iter().copied());
        if is_long && let Some(last) = ids.last() {
            tracing::debug!(worker_id, commit_id = last.0, "long lock held");
            self.long_holder = Some(*last);
        }
    }

    /// Releases the long lock when `ids` contains its last id, then serves
    /// deferred requests until one takes the lock again.
    fn release(&mut self, ids: &[CommitId]) {
        let Some(holder) = self.long_holder else {
            return;
        };
        if !ids.contains(&holder) {
            return;
        }
        tracing::debug!(commit_id = holder.0, "long lock released");
        self.long_holder = None;
        while self.long_holder.is_none()
            && let Some(request) = self.deferred.pop_front()
        {
            self.allocate(request);
        }
    }
}
