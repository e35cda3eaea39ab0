//! Optimistic sync queue: apply a change locally right away, persist it in
//! the background, roll it back if delivery ultimately fails.
//!
//! One queue exists per business session. A single worker task consumes a
//! channel strictly FIFO, so write ordering and single-flight are properties
//! of the structure rather than of a lock discipline. A remote update is
//! attempted up to [`MAX_ATTEMPTS`] times with exponential backoff; after
//! that the operation's rollback runs (best effort), the operation lands on
//! the bounded failed list, and a [`SyncNotice`] is broadcast so the UI can
//! surface it. Nothing is ever silently dropped: every submitted operation
//! terminates completed or failed.

use std::{
    collections::HashSet,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use tokio::sync::{broadcast, mpsc, watch};
use uuid::Uuid;

use crate::LedgerError;

/// Attempt budget per delivery (first try plus retries).
pub const MAX_ATTEMPTS: u32 = 3;

/// Most failed operations kept for inspection; past this the oldest is
/// dropped.
pub const FAILED_LIST_CAP: usize = 50;

type RemoteFuture = Pin<Box<dyn Future<Output = Result<(), LedgerError>> + Send>>;

/// Factory for one delivery attempt; invoked once per attempt, and again
/// after a manual resubmission.
pub type RemoteUpdate = Box<dyn Fn() -> RemoteFuture + Send + Sync>;

/// Compensating local update. May run more than once across resubmissions.
pub type Rollback = Box<dyn Fn() -> Result<(), LedgerError> + Send + Sync>;

/// Operation tag for logs and failure notices.
#[derive(Clone, Debug)]
pub struct SyncMetadata {
    pub kind: String,
    pub description: String,
}

impl SyncMetadata {
    pub fn new(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            description: description.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Failed,
}

/// Read-only view of a failed operation.
#[derive(Clone, Debug)]
pub struct FailedOperation {
    pub id: Uuid,
    pub kind: String,
    pub description: String,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Broadcast to subscribers when delivery is abandoned.
#[derive(Clone, Debug)]
pub enum SyncNotice {
    OperationFailed { id: Uuid, description: String },
    RollbackFailed { id: Uuid, description: String },
}

struct SyncOperation {
    id: Uuid,
    remote_update: RemoteUpdate,
    rollback: Rollback,
    metadata: SyncMetadata,
    attempts: u32,
    last_error: Option<String>,
}

#[derive(Default)]
struct Registry {
    pending: HashSet<Uuid>,
    failed: Vec<SyncOperation>,
}

struct Shared {
    registry: Mutex<Registry>,
    depth: watch::Sender<usize>,
    notices: broadcast::Sender<SyncNotice>,
}

impl Shared {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        match self.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// The delivery-guarantee layer all remote mutations go through.
///
/// Cloning is cheap and shares the same queue; drop every clone and the
/// worker drains what is left, then exits.
#[derive(Clone)]
pub struct OptimisticSyncQueue {
    sender: mpsc::UnboundedSender<SyncOperation>,
    shared: Arc<Shared>,
}

impl OptimisticSyncQueue {
    /// Creates the queue and spawns its worker task on the current runtime.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (depth, _) = watch::channel(0usize);
        let (notices, _) = broadcast::channel(32);
        let shared = Arc::new(Shared {
            registry: Mutex::new(Registry::default()),
            depth,
            notices,
        });

        tokio::spawn(worker(receiver, Arc::clone(&shared)));

        Self { sender, shared }
    }

    /// Applies `local_update` synchronously, then schedules `remote_update`
    /// for background delivery. The UI reflects the change before this call
    /// returns; it never blocks on network I/O.
    pub fn submit(
        &self,
        local_update: impl FnOnce(),
        remote_update: RemoteUpdate,
        rollback: Rollback,
        metadata: SyncMetadata,
    ) -> Uuid {
        local_update();

        let operation = SyncOperation {
            id: Uuid::new_v4(),
            remote_update,
            rollback,
            metadata,
            attempts: 0,
            last_error: None,
        };
        let id = operation.id;

        tracing::debug!(operation = %operation.metadata.kind, %id, "queued for sync");
        self.enqueue(operation);
        id
    }

    /// Moves all failed operations back to the queue tail, original order
    /// preserved, attempts reset.
    pub fn retry_failed_operations(&self) {
        let drained: Vec<SyncOperation> = self.shared.registry().failed.drain(..).collect();
        if drained.is_empty() {
            return;
        }

        tracing::info!(count = drained.len(), "resubmitting failed operations");
        for mut operation in drained {
            operation.attempts = 0;
            operation.last_error = None;
            self.enqueue(operation);
        }
    }

    /// Operations whose delivery was abandoned, oldest first.
    pub fn failed_operations(&self) -> Vec<FailedOperation> {
        self.shared
            .registry()
            .failed
            .iter()
            .map(|op| FailedOperation {
                id: op.id,
                kind: op.metadata.kind.clone(),
                description: op.metadata.description.clone(),
                attempts: op.attempts,
                last_error: op.last_error.clone(),
            })
            .collect()
    }

    /// Where an operation currently stands. Completed operations are
    /// removed, so `None` means unknown-or-completed.
    pub fn status(&self, id: Uuid) -> Option<OperationStatus> {
        let registry = self.shared.registry();
        if registry.pending.contains(&id) {
            Some(OperationStatus::Pending)
        } else if registry.failed.iter().any(|op| op.id == id) {
            Some(OperationStatus::Failed)
        } else {
            None
        }
    }

    pub fn pending_count(&self) -> usize {
        *self.shared.depth.borrow()
    }

    pub fn has_pending_operations(&self) -> bool {
        self.pending_count() > 0
    }

    /// Subscribes to terminal-failure notices (for toasts).
    pub fn subscribe(&self) -> broadcast::Receiver<SyncNotice> {
        self.shared.notices.subscribe()
    }

    /// Waits until every queued operation has terminated. Callers that must
    /// observe durability (day-close confirmation screens, tests) await
    /// this.
    pub async fn wait_idle(&self) {
        let mut depth = self.shared.depth.subscribe();
        while *depth.borrow_and_update() > 0 {
            if depth.changed().await.is_err() {
                return;
            }
        }
    }

    fn enqueue(&self, operation: SyncOperation) {
        let id = operation.id;
        {
            let mut registry = self.shared.registry();
            registry.pending.insert(id);
        }
        self.shared.depth.send_modify(|depth| *depth += 1);
        if self.sender.send(operation).is_err() {
            // Worker gone; can only happen while the runtime shuts down.
            // Settle the id anyway so wait_idle on a surviving clone does
            // not hang on a count that will never drain.
            tracing::error!("sync worker is gone, operation dropped at shutdown");
            settle(&self.shared, id);
        }
    }
}

impl Default for OptimisticSyncQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Single worker: strictly FIFO, one operation in flight at a time. A later
/// operation never jumps ahead of a retrying head.
async fn worker(mut receiver: mpsc::UnboundedReceiver<SyncOperation>, shared: Arc<Shared>) {
    while let Some(operation) = receiver.recv().await {
        process(operation, &shared).await;
    }
    tracing::debug!("sync worker drained and stopped");
}

async fn process(mut operation: SyncOperation, shared: &Arc<Shared>) {
    loop {
        operation.attempts += 1;
        tracing::debug!(
            operation = %operation.metadata.kind,
            id = %operation.id,
            attempt = operation.attempts,
            max = MAX_ATTEMPTS,
            "delivering"
        );

        match (operation.remote_update)().await {
            Ok(()) => {
                tracing::debug!(
                    operation = %operation.metadata.kind,
                    id = %operation.id,
                    "delivered"
                );
                settle(shared, operation.id);
                return;
            }
            Err(err) => {
                operation.last_error = Some(err.to_string());

                if operation.attempts >= MAX_ATTEMPTS {
                    abandon(operation, shared);
                    return;
                }

                // 2s, 4s after the first and second failures.
                let delay = Duration::from_secs(1 << operation.attempts);
                tracing::warn!(
                    operation = %operation.metadata.kind,
                    id = %operation.id,
                    attempt = operation.attempts,
                    error = %err,
                    retry_in = ?delay,
                    "delivery failed, will retry"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

fn abandon(mut operation: SyncOperation, shared: &Arc<Shared>) {
    tracing::error!(
        operation = %operation.metadata.kind,
        id = %operation.id,
        error = operation.last_error.as_deref().unwrap_or("unknown"),
        "delivery abandoned after {MAX_ATTEMPTS} attempts, rolling back"
    );

    if let Err(rollback_err) = (operation.rollback)() {
        // Local and remote state may now disagree; flagged for manual
        // reconciliation rather than auto-retried.
        tracing::error!(
            operation = %operation.metadata.kind,
            id = %operation.id,
            error = %rollback_err,
            "rollback failed, state needs manual reconciliation"
        );
        let _ = shared.notices.send(SyncNotice::RollbackFailed {
            id: operation.id,
            description: operation.metadata.description.clone(),
        });
    }

    let _ = shared.notices.send(SyncNotice::OperationFailed {
        id: operation.id,
        description: operation.metadata.description.clone(),
    });

    let id = operation.id;
    {
        let mut registry = shared.registry();
        registry.failed.push(operation);
        if registry.failed.len() > FAILED_LIST_CAP {
            let dropped = registry.failed.remove(0);
            tracing::warn!(
                operation = %dropped.metadata.kind,
                id = %dropped.id,
                "failed list full, dropping oldest entry"
            );
        }
    }
    settle(shared, id);
}

fn settle(shared: &Arc<Shared>, id: Uuid) {
    shared.registry().pending.remove(&id);
    shared.depth.send_modify(|depth| *depth -= 1);
}
