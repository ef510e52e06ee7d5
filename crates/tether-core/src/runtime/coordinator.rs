//! # Startup Pass
//!
//! One-shot reconciliation of the registered modules against their stored
//! fingerprints, executed inside a single transaction.
//!
//! | Stored value            | normal start                 | skip initialization |
//! |-------------------------|------------------------------|---------------------|
//! | absent                  | initialize, store fingerprint | untouched          |
//! | current fingerprint     | untouched                    | untouched           |
//! | `FORCE_INIT` marker     | reinitialize, store fingerprint | untouched        |
//! | other fingerprint       | reinitialize, store fingerprint | untouched        |
//! | anything else           | fail with `CorruptMetadata`  | untouched           |
//!
//! Keys of unregistered modules are removed in every case.

use crate::runtime::dispatcher::StartedModule;
use crate::runtime::metadata::{FingerprintStore, StoredValue};
use crate::runtime::Module;
use crate::storage::Transaction;
use crate::{NodeId, TetherError};
use std::sync::Arc;

// =============================================================================
// DECISIONS
// =============================================================================

/// Why a module was reinitialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReinitReason {
    /// The stored fingerprint differs from the current one.
    ConfigurationChanged,
    /// A `FORCE_INIT` marker was present.
    Forced {
        /// Time of the first failure recorded by the marker.
        since_millis: u64,
    },
}

/// What the startup pass did with one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleDecision {
    /// No stored value; `initialize` ran.
    Initialized,
    /// `reinitialize` ran.
    Reinitialized(ReinitReason),
    /// The stored fingerprint is current.
    Unchanged,
    /// Initialization was skipped and the stored value left untouched.
    Skipped,
}

impl ModuleDecision {
    /// Check whether the module receives commits after this decision.
    #[must_use]
    pub fn is_started(&self) -> bool {
        !matches!(self, ModuleDecision::Skipped)
    }
}

impl std::fmt::Display for ModuleDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleDecision::Initialized => write!(f, "initialized"),
            ModuleDecision::Reinitialized(ReinitReason::ConfigurationChanged) => {
                write!(f, "reinitialized (configuration changed)")
            }
            ModuleDecision::Reinitialized(ReinitReason::Forced { since_millis }) => {
                write!(f, "reinitialized (forced since {since_millis})")
            }
            ModuleDecision::Unchanged => write!(f, "unchanged"),
            ModuleDecision::Skipped => write!(f, "skipped"),
        }
    }
}

/// Outcome of a successful startup pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupReport {
    /// The runtime root node.
    pub root: NodeId,
    /// Whether this pass created the root node.
    pub root_created: bool,
    /// Decision per module, in registration order.
    pub decisions: Vec<(String, ModuleDecision)>,
    /// Ids whose bookkeeping was removed.
    pub pruned: Vec<String>,
}

impl StartupReport {
    /// Decision taken for `module_id`, if it is registered.
    #[must_use]
    pub fn decision(&self, module_id: &str) -> Option<ModuleDecision> {
        self.decisions
            .iter()
            .find(|(id, _)| id == module_id)
            .map(|(_, decision)| *decision)
    }
}

// =============================================================================
// PASS
// =============================================================================

/// Run the startup pass inside `tx`. Nothing is committed here; an error
/// leaves `tx` to be dropped by the caller.
pub(crate) fn run_startup_pass(
    tx: &mut Transaction<'_>,
    store: &FingerprintStore,
    modules: &[Arc<dyn Module>],
    skip_initialization: bool,
) -> Result<(StartupReport, Vec<StartedModule>), TetherError> {
    let (root, root_created) = store.locate_or_create_root(tx)?;

    let mut decisions = Vec::with_capacity(modules.len());
    let mut started = Vec::with_capacity(modules.len());
    for module in modules {
        let id = module.id();
        let configuration = module.configuration();
        let fingerprint = configuration.fingerprint()?;
        let stored = store.read(tx, root, id)?;

        let decision = if skip_initialization {
            match stored {
                Some(StoredValue::Fingerprint(ref fp)) if *fp == fingerprint => {
                    ModuleDecision::Unchanged
                }
                _ => ModuleDecision::Skipped,
            }
        } else {
            match stored {
                None => {
                    module.initialize(tx)?;
                    ModuleDecision::Initialized
                }
                Some(StoredValue::Fingerprint(fp)) if fp == fingerprint => ModuleDecision::Unchanged,
                Some(StoredValue::Fingerprint(_)) => {
                    module.reinitialize(tx)?;
                    ModuleDecision::Reinitialized(ReinitReason::ConfigurationChanged)
                }
                Some(StoredValue::ForceReinit { since_millis }) => {
                    module.reinitialize(tx)?;
                    ModuleDecision::Reinitialized(ReinitReason::Forced { since_millis })
                }
                Some(StoredValue::Corrupt(value)) => {
                    return Err(TetherError::CorruptMetadata {
                        module: id.to_string(),
                        value,
                    });
                }
            }
        };

        if matches!(
            decision,
            ModuleDecision::Initialized | ModuleDecision::Reinitialized(_)
        ) {
            store.write(tx, root, id, &StoredValue::Fingerprint(fingerprint))?;
        }
        tracing::info!(module = id, decision = %decision, "startup decision");

        if decision.is_started() {
            started.push(StartedModule::new(Arc::clone(module), configuration.inclusion));
        }
        decisions.push((id.to_string(), decision));
    }

    let pruned = prune_unregistered(tx, store, root, modules)?;

    Ok((
        StartupReport {
            root,
            root_created,
            decisions,
            pruned,
        },
        started,
    ))
}

/// Remove bookkeeping of every module id that is not registered.
fn prune_unregistered(
    tx: &mut Transaction<'_>,
    store: &FingerprintStore,
    root: NodeId,
    modules: &[Arc<dyn Module>],
) -> Result<Vec<String>, TetherError> {
    let mut pruned = Vec::new();
    for id in store.list_module_ids(tx, root)? {
        if modules.iter().any(|m| m.id() == id) {
            continue;
        }
        store.delete(tx, root, &id)?;
        tracing::info!(module = %id, "removed bookkeeping of unregistered module");
        pruned.push(id);
    }
    Ok(pruned)
}
