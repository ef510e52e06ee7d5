//! # Transaction Hook Dispatcher
//!
//! The commit hook the runtime installs on the store. On every commit it
//! forwards the business part of the change set to each started module whose
//! inclusion policy accepts it, in registration order, inside the committing
//! transaction.
//!
//! A module answering `NeedsInitialization` does not fail the commit. The
//! dispatcher records a `FORCE_INIT` marker for it instead, through the
//! writer, because the committing thread still holds the store's write lock.

use crate::config::HookFailurePolicy;
use crate::primitives::now_millis;
use crate::runtime::metadata::FingerprintStore;
use crate::runtime::{HookError, InclusionPolicy, Module};
use crate::storage::{ChangeSet, CommitHook, Transaction};
use crate::writer::DatabaseWriter;
use crate::TetherError;
use parking_lot::RwLock;
use std::sync::Arc;

/// A module the startup pass handed over for dispatch, with the inclusion
/// policy it was started with.
#[derive(Clone)]
pub(crate) struct StartedModule {
    module: Arc<dyn Module>,
    inclusion: InclusionPolicy,
}

impl StartedModule {
    pub(crate) fn new(module: Arc<dyn Module>, inclusion: InclusionPolicy) -> Self {
        Self { module, inclusion }
    }

    pub(crate) fn module(&self) -> &Arc<dyn Module> {
        &self.module
    }
}

/// Per-commit driver of started modules.
pub struct TransactionHookDispatcher {
    store: FingerprintStore,
    policy: HookFailurePolicy,
    writer: Arc<dyn DatabaseWriter>,
    started: RwLock<Vec<StartedModule>>,
}

impl std::fmt::Debug for TransactionHookDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionHookDispatcher")
            .field("policy", &self.policy)
            .field("started", &self.started_ids())
            .finish_non_exhaustive()
    }
}

impl TransactionHookDispatcher {
    /// Create a dispatcher with no started modules.
    #[must_use]
    pub fn new(
        store: FingerprintStore,
        policy: HookFailurePolicy,
        writer: Arc<dyn DatabaseWriter>,
    ) -> Self {
        Self {
            store,
            policy,
            writer,
            started: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn set_started(&self, modules: Vec<StartedModule>) {
        *self.started.write() = modules;
    }

    /// Stop dispatching, returning the modules that were started.
    pub(crate) fn take_started(&self) -> Vec<StartedModule> {
        std::mem::take(&mut *self.started.write())
    }

    /// Ids of the modules currently dispatched to, in order.
    #[must_use]
    pub fn started_ids(&self) -> Vec<String> {
        self.started
            .read()
            .iter()
            .map(|s| s.module.id().to_string())
            .collect()
    }

    /// Queue a `FORCE_INIT` marker for `module_id` unless the in-flight
    /// transaction already shows one.
    fn defer_reinitialization(&self, tx: &Transaction<'_>, module_id: &str) {
        let already_marked = match self.store.locate_root(tx) {
            Ok(Some(root)) => matches!(
                self.store.read(tx, root, module_id),
                Ok(Some(value)) if value.is_force_reinit()
            ),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(module = module_id, error = %e, "cannot inspect runtime root");
                false
            }
        };
        if already_marked {
            tracing::debug!(module = module_id, "reinitialization already scheduled");
            return;
        }

        let since_millis = now_millis();
        let store = self.store.clone();
        let id = module_id.to_string();
        self.writer.write_with_id(
            Box::new(move |tx: &mut Transaction<'_>| {
                store
                    .mark_for_reinitialization(tx, &id, since_millis)
                    .map(|_| ())
            }),
            &format!("force-reinit:{module_id}"),
        );
        tracing::warn!(
            module = module_id,
            "module needs initialization, scheduled for next start"
        );
    }
}

impl CommitHook for TransactionHookDispatcher {
    fn before_commit(
        &self,
        changes: &ChangeSet,
        tx: &mut Transaction<'_>,
    ) -> Result<(), TetherError> {
        let started = self.started.read().clone();
        if started.is_empty() {
            return Ok(());
        }

        let business = changes.without_label(&self.store.config().root_label());
        if business.is_empty() {
            return Ok(());
        }

        for entry in &started {
            if !entry.inclusion.accepts(&business) {
                continue;
            }
            let id = entry.module.id();
            tracing::debug!(module = id, changes = business.len(), "dispatching commit");

            match entry.module.before_commit(&business, tx) {
                Ok(()) => {}
                Err(HookError::NeedsInitialization) => self.defer_reinitialization(tx, id),
                Err(HookError::Failed(reason)) => match self.policy {
                    HookFailurePolicy::Abort => {
                        return Err(TetherError::HookFailed {
                            module: id.to_string(),
                            reason,
                        });
                    }
                    HookFailurePolicy::Log => {
                        tracing::warn!(module = id, %reason, "commit hook failed, continuing");
                    }
                    HookFailurePolicy::Defer => {
                        tracing::warn!(module = id, %reason, "commit hook failed");
                        self.defer_reinitialization(tx, id);
                    }
                },
            }
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
