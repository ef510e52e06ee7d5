//! Single worker thread draining a bounded queue, one transaction per task.
//!
//! The writer holds only a weak reference to the database so that a
//! database owning the writer (through a commit hook) can still be dropped.

use crate::storage::GraphDatabase;
use crate::writer::{DatabaseWriter, WriteRequest};
use crate::{TetherError, types::storage_err};
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const WORKER_NAME: &str = "tether-writer";

enum Job {
    Write(WriteRequest),
    Stop,
}

#[derive(Default)]
struct WorkerState {
    sender: Option<SyncSender<Job>>,
    worker: Option<JoinHandle<()>>,
}

/// [`DatabaseWriter`] executing tasks sequentially on one named thread.
///
/// Tasks submitted while the writer is stopped, or while its queue is full,
/// are dropped with a warning.
pub struct SingleThreadedWriter {
    database: Weak<GraphDatabase>,
    capacity: usize,
    state: Mutex<WorkerState>,
}

impl std::fmt::Debug for SingleThreadedWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleThreadedWriter")
            .field("capacity", &self.capacity)
            .field("running", &self.is_running())
            .finish()
    }
}

impl SingleThreadedWriter {
    /// Create a stopped writer for `database` with a queue of `capacity` tasks.
    #[must_use]
    pub fn new(database: &Arc<GraphDatabase>, capacity: usize) -> Self {
        Self {
            database: Arc::downgrade(database),
            capacity: capacity.max(1),
            state: Mutex::new(WorkerState::default()),
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.lock().sender.is_some()
    }

    /// Wait until every task queued before this call has been executed.
    ///
    /// Returns `false` if the writer is stopped or the wait elapsed.
    pub fn flush(&self, wait: Duration) -> bool {
        self.write_and_wait(|_tx| Ok(()), "flush", wait).is_some()
    }

    fn run(database: Weak<GraphDatabase>, jobs: Receiver<Job>) {
        tracing::debug!("writer started");
        while let Ok(job) = jobs.recv() {
            match job {
                Job::Write(request) => Self::execute(&database, request),
                Job::Stop => break,
            }
        }
        tracing::debug!("writer stopped");
    }

    fn execute(database: &Weak<GraphDatabase>, request: WriteRequest) {
        let (id, task, committed) = request.into_parts();
        let Some(db) = database.upgrade() else {
            tracing::warn!(task = %id, "database closed, write task dropped");
            return;
        };

        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| db.in_transaction(task)));
        match outcome {
            Ok(Ok(())) => {
                tracing::debug!(task = %id, "write task committed");
                if let Some(committed) = committed {
                    let _ = committed.try_send(());
                }
            }
            Ok(Err(e)) => tracing::warn!(task = %id, error = %e, "write task failed"),
            Err(_) => tracing::error!(task = %id, "write task panicked"),
        }
    }
}

impl DatabaseWriter for SingleThreadedWriter {
    fn start(&self) -> Result<(), TetherError> {
        let mut state = self.state.lock();
        if state.sender.is_some() {
            return Ok(());
        }

        let (sender, receiver) = mpsc::sync_channel(self.capacity);
        let database = self.database.clone();
        let worker = thread::Builder::new()
            .name(WORKER_NAME.into())
            .spawn(move || Self::run(database, receiver))
            .map_err(storage_err)?;

        state.sender = Some(sender);
        state.worker = Some(worker);
        Ok(())
    }

    fn stop(&self) {
        let (sender, worker) = {
            let mut state = self.state.lock();
            (state.sender.take(), state.worker.take())
        };
        if let Some(sender) = sender {
            // Blocks while the queue is full; everything queued runs first.
            let _ = sender.send(Job::Stop);
        }
        if let Some(worker) = worker {
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                tracing::error!("writer thread terminated abnormally");
            }
        }
    }

    fn submit(&self, request: WriteRequest) {
        let sender = self.state.lock().sender.clone();
        let Some(sender) = sender else {
            tracing::warn!(task = %request.id(), "writer not running, write task dropped");
            return;
        };
        match sender.try_send(Job::Write(request)) {
            Ok(()) => {}
            Err(TrySendError::Full(job)) => {
                if let Job::Write(request) = job {
                    tracing::warn!(
                        task = %request.id(),
                        capacity = self.capacity,
                        "writer queue full, write task dropped"
                    );
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::warn!("writer stopped, write task dropped");
            }
        }
    }
}

impl Drop for SingleThreadedWriter {
    fn drop(&mut self) {
        self.stop();
    }
}

// =============================================================================
// TESTS
// =============================================================================
