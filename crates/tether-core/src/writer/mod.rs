//! # Database Writer
//!
//! Writes to the store from places where opening a write transaction
//! directly would deadlock, most importantly from inside a commit hook.
//!
//! redb admits one write transaction at a time and a commit hook runs while
//! the committing transaction still holds that lock. A writer accepts the
//! work as a task and runs it later, in its own transaction, on its own
//! thread.
//!
//! ## Outcomes
//!
//! - [`DatabaseWriter::write`] / [`DatabaseWriter::write_with_id`]: fire and
//!   forget. Failures are logged, never returned.
//! - [`DatabaseWriter::write_and_wait`]: `Some(value)` once the task's
//!   transaction committed, `None` if the task failed or did not commit
//!   within the wait. `None` means "unknown", not "failed".

mod single_threaded;

pub use single_threaded::SingleThreadedWriter;

use crate::primitives::UNNAMED_TASK;
use crate::storage::Transaction;
use crate::TetherError;
use parking_lot::Mutex;
use std::sync::mpsc::{self, SyncSender};
use std::sync::Arc;
use std::time::Duration;

/// Work executed inside a writer-owned transaction.
pub type WriteTask =
    Box<dyn FnOnce(&mut Transaction<'_>) -> Result<(), TetherError> + Send + 'static>;

/// A task together with its log id and an optional commit notification.
pub struct WriteRequest {
    id: String,
    task: WriteTask,
    committed: Option<SyncSender<()>>,
}

impl std::fmt::Debug for WriteRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteRequest")
            .field("id", &self.id)
            .field("notify", &self.committed.is_some())
            .finish_non_exhaustive()
    }
}

impl WriteRequest {
    /// A fire-and-forget request.
    #[must_use]
    pub fn new(id: impl Into<String>, task: WriteTask) -> Self {
        Self {
            id: id.into(),
            task,
            committed: None,
        }
    }

    /// Signal `committed` once the task's transaction has committed.
    #[must_use]
    pub fn notify(mut self, committed: SyncSender<()>) -> Self {
        self.committed = Some(committed);
        self
    }

    /// Id used in logs.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Split into the task and its notification channel.
    pub(crate) fn into_parts(self) -> (String, WriteTask, Option<SyncSender<()>>) {
        (self.id, self.task, self.committed)
    }
}

/// A writer that runs tasks in transactions it owns.
pub trait DatabaseWriter: Send + Sync {
    /// Start accepting and executing tasks.
    fn start(&self) -> Result<(), TetherError>;

    /// Execute what is already queued, then stop. Later tasks are dropped.
    fn stop(&self);

    /// Queue a request. Implementations may drop it (with a warning) when
    /// they are stopped or saturated.
    fn submit(&self, request: WriteRequest);

    /// Fire-and-forget write.
    fn write(&self, task: WriteTask) {
        self.write_with_id(task, UNNAMED_TASK);
    }

    /// Fire-and-forget write with an id for logs.
    fn write_with_id(&self, task: WriteTask, id: &str) {
        self.submit(WriteRequest::new(id, task));
    }

    /// Write and wait up to `wait` for the result.
    ///
    /// Calling this from a commit hook waits on the writer, which in turn
    /// waits on the hook's transaction: it returns `None` after `wait`.
    fn write_and_wait<T, F>(&self, task: F, id: &str, wait: Duration) -> Option<T>
    where
        Self: Sized,
        T: Send + 'static,
        F: FnOnce(&mut Transaction<'_>) -> Result<T, TetherError> + Send + 'static,
    {
        let slot = Arc::new(Mutex::new(None));
        let task_slot = Arc::clone(&slot);
        let (committed_tx, committed_rx) = mpsc::sync_channel(1);

        let request = WriteRequest::new(
            id,
            Box::new(move |tx: &mut Transaction<'_>| {
                let value = task(tx)?;
                *task_slot.lock() = Some(value);
                Ok(())
            }),
        )
        .notify(committed_tx);
        self.submit(request);

        committed_rx.recv_timeout(wait).ok()?;
        slot.lock().take()
    }
}
