//! # Runtime
//!
//! The module lifecycle facade.
//!
//! ```text
//! register_module* ──► start / start_with(skip) ──► commits dispatched ──► shutdown
//!                         (one atomic pass)
//! ```
//!
//! - Modules register before the first successful start; the registry closes
//!   afterwards.
//! - The startup pass runs at most once per runtime. Concurrent `start`
//!   calls are serialized and all but the first return `Ok(None)`.
//! - A failed pass persists nothing and leaves the runtime not started, so
//!   `start` may be retried.

mod coordinator;
mod dispatcher;
mod metadata;
mod module;
mod registry;

pub use coordinator::{ModuleDecision, ReinitReason, StartupReport};
pub use dispatcher::TransactionHookDispatcher;
pub use metadata::{FingerprintStore, StoredValue};
pub use module::{HookError, InclusionPolicy, Module, ModuleConfiguration, RuntimeConfigured};
pub use registry::ModuleRegistry;

use crate::config::RuntimeConfig;
use crate::storage::{GraphDatabase, HookHandle};
use crate::writer::{DatabaseWriter, SingleThreadedWriter};
use crate::TetherError;
use parking_lot::Mutex;
use std::sync::Arc;

/// Lifecycle state of a [`Runtime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    /// Accepting registrations; no pass has succeeded yet.
    NotStarted,
    /// The startup pass committed; commits are dispatched.
    Started,
    /// Modules were shut down and the dispatcher detached.
    ShutDown,
}

struct Lifecycle {
    registry: ModuleRegistry,
    state: RuntimeState,
}

/// The runtime attached to one [`GraphDatabase`].
pub struct Runtime {
    database: Arc<GraphDatabase>,
    config: RuntimeConfig,
    store: FingerprintStore,
    writer: Arc<SingleThreadedWriter>,
    dispatcher: Arc<TransactionHookDispatcher>,
    hook: HookHandle,
    lifecycle: Mutex<Lifecycle>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lifecycle = self.lifecycle.lock();
        f.debug_struct("Runtime")
            .field("namespace", &self.config.namespace)
            .field("state", &lifecycle.state)
            .field("registry", &lifecycle.registry)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// Attach a runtime to `database`.
    ///
    /// Installs the commit hook dispatcher right away; it stays idle until
    /// the first successful start.
    pub fn new(database: Arc<GraphDatabase>, config: RuntimeConfig) -> Result<Self, TetherError> {
        config.validate()?;

        let store = FingerprintStore::new(config.clone());
        let writer = Arc::new(SingleThreadedWriter::new(
            &database,
            config.writer_queue_capacity,
        ));
        let dispatcher = Arc::new(TransactionHookDispatcher::new(
            store.clone(),
            config.hook_failure_policy,
            writer.clone(),
        ));
        let hook = database.register_commit_hook(dispatcher.clone());

        Ok(Self {
            database,
            config,
            store,
            writer,
            dispatcher,
            hook,
            lifecycle: Mutex::new(Lifecycle {
                registry: ModuleRegistry::new(),
                state: RuntimeState::NotStarted,
            }),
        })
    }

    /// Register a module. Fails once the runtime has started.
    pub fn register_module(&self, module: Arc<dyn Module>) -> Result<(), TetherError> {
        self.lifecycle.lock().registry.register(module, &self.config)
    }

    /// Run the startup pass with initialization enabled.
    pub fn start(&self) -> Result<Option<StartupReport>, TetherError> {
        self.start_with(false)
    }

    /// Run the startup pass.
    ///
    /// With `skip_initialization` no module is initialized or reinitialized
    /// and no bookkeeping of a registered module is touched; only modules
    /// whose stored fingerprint is already current are started. Keys of
    /// unregistered modules are pruned either way.
    ///
    /// Returns `Ok(None)` if the runtime already started.
    pub fn start_with(
        &self,
        skip_initialization: bool,
    ) -> Result<Option<StartupReport>, TetherError> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state != RuntimeState::NotStarted {
            tracing::debug!(state = ?lifecycle.state, "runtime already started");
            return Ok(None);
        }

        tracing::info!(
            modules = lifecycle.registry.len(),
            skip_initialization,
            "starting runtime"
        );
        let mut tx = self.database.begin()?;
        let (report, started) = coordinator::run_startup_pass(
            &mut tx,
            &self.store,
            lifecycle.registry.modules(),
            skip_initialization,
        )?;
        tx.commit()?;

        // Deferred markers from the first dispatched commit need a running writer.
        self.writer.start()?;
        self.database.protect_label(self.config.root_label());
        self.dispatcher.set_started(started);
        lifecycle.registry.close();
        lifecycle.state = RuntimeState::Started;

        tracing::info!(
            root = %report.root,
            root_created = report.root_created,
            started = self.dispatcher.started_ids().len(),
            pruned = report.pruned.len(),
            "runtime started"
        );
        Ok(Some(report))
    }

    /// Shut started modules down, stop the writer and detach the dispatcher.
    ///
    /// Idempotent. A runtime that never started only detaches.
    pub fn shutdown(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state == RuntimeState::ShutDown {
            return;
        }

        for entry in self.dispatcher.take_started() {
            tracing::debug!(module = entry.module().id(), "shutting down module");
            entry.module().shutdown();
        }
        self.writer.stop();
        self.database.unregister_commit_hook(self.hook);
        lifecycle.state = RuntimeState::ShutDown;
        tracing::info!("runtime shut down");
    }

    #[must_use]
    pub fn state(&self) -> RuntimeState {
        self.lifecycle.lock().state
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.state() == RuntimeState::Started
    }

    /// Ids of registered modules, in registration order.
    #[must_use]
    pub fn registered_ids(&self) -> Vec<String> {
        self.lifecycle.lock().registry.ids()
    }

    /// Ids of modules receiving commits, in registration order.
    #[must_use]
    pub fn started_ids(&self) -> Vec<String> {
        self.dispatcher.started_ids()
    }

    #[must_use]
    pub fn database(&self) -> &Arc<GraphDatabase> {
        &self.database
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The bookkeeping store, for inspection and operator tooling.
    #[must_use]
    pub fn fingerprints(&self) -> &FingerprintStore {
        &self.store
    }

    /// The writer used for deferred writes. Running once the runtime started.
    #[must_use]
    pub fn writer(&self) -> &Arc<SingleThreadedWriter> {
        &self.writer
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.shutdown();
    }
}
