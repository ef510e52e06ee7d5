//! # Module Contract
//!
//! What an extension module must provide to be driven by the runtime:
//! an id, a configuration whose serialized form is the module's
//! fingerprint, initialization entry points, and an optional commit hook.

use crate::config::RuntimeConfig;
use crate::primitives::CONFIG_TAG;
use crate::storage::{ChangeSet, Transaction};
use crate::TetherError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

// =============================================================================
// HOOK ERRORS
// =============================================================================

/// Outcome of a failed [`Module::before_commit`].
#[derive(Debug, Error)]
pub enum HookError {
    /// The module's derived data is out of sync and must be rebuilt on the
    /// next start. The current commit proceeds.
    #[error("module needs initialization")]
    NeedsInitialization,

    /// Any other failure. Handled according to the runtime's
    /// [`HookFailurePolicy`](crate::config::HookFailurePolicy).
    #[error("{0}")]
    Failed(String),
}

impl From<TetherError> for HookError {
    fn from(e: TetherError) -> Self {
        HookError::Failed(e.to_string())
    }
}

// =============================================================================
// INCLUSION POLICY
// =============================================================================

/// Which commits a module wants to see.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InclusionPolicy {
    /// Every commit with at least one business change.
    #[default]
    All,
    /// No commits; the module only initializes.
    None,
    /// Commits touching a node with one of these labels.
    Labels(BTreeSet<String>),
    /// Commits creating or deleting a relationship of one of these types.
    RelationshipTypes(BTreeSet<String>),
}

impl InclusionPolicy {
    /// Check whether a change set is of interest.
    #[must_use]
    pub fn accepts(&self, changes: &ChangeSet) -> bool {
        match self {
            InclusionPolicy::All => !changes.is_empty(),
            InclusionPolicy::None => false,
            InclusionPolicy::Labels(labels) => {
                labels.iter().any(|label| changes.touches_label(label))
            }
            InclusionPolicy::RelationshipTypes(types) => types
                .iter()
                .any(|rel_type| changes.touches_relationship_type(rel_type)),
        }
    }
}

// =============================================================================
// MODULE CONFIGURATION
// =============================================================================

/// Configuration of a module.
///
/// Both fields serialize in a stable order, so two equal configurations
/// always produce the same fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfiguration {
    /// Commits the module's hook is called for.
    pub inclusion: InclusionPolicy,
    /// Free-form module settings.
    pub settings: BTreeMap<String, String>,
}

impl ModuleConfiguration {
    /// Configuration with the given inclusion policy and no settings.
    #[must_use]
    pub fn with_inclusion(inclusion: InclusionPolicy) -> Self {
        Self {
            inclusion,
            settings: BTreeMap::new(),
        }
    }

    /// Builder-style setter for one setting.
    #[must_use]
    pub fn setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Serialized fingerprint: `CONFIG` followed by the JSON form.
    pub fn fingerprint(&self) -> Result<String, TetherError> {
        let json =
            serde_json::to_string(self).map_err(|e| TetherError::SerializationError(e.to_string()))?;
        Ok(format!("{CONFIG_TAG}{json}"))
    }
}

// =============================================================================
// MODULE TRAIT
// =============================================================================

/// Capability of modules that want the runtime configuration.
pub trait RuntimeConfigured {
    /// Called once, synchronously, when the module is registered.
    fn configuration_changed(&self, config: &RuntimeConfig);
}

/// An extension module driven by the runtime.
///
/// `initialize` and `reinitialize` run inside the startup transaction; an
/// error from either aborts the whole startup pass.
pub trait Module: Send + Sync {
    /// Unique id of this module, used in bookkeeping keys.
    fn id(&self) -> &str;

    /// Current configuration. Its fingerprint is compared to the stored one
    /// on every start.
    fn configuration(&self) -> ModuleConfiguration {
        ModuleConfiguration::default()
    }

    /// Build the module's derived data for the first time.
    fn initialize(&self, tx: &mut Transaction<'_>) -> Result<(), TetherError>;

    /// Rebuild derived data after a configuration change or a failure marker.
    fn reinitialize(&self, tx: &mut Transaction<'_>) -> Result<(), TetherError> {
        self.initialize(tx)
    }

    /// Called inside every accepted commit, before it becomes durable.
    fn before_commit(
        &self,
        _changes: &ChangeSet,
        _tx: &mut Transaction<'_>,
    ) -> Result<(), HookError> {
        Ok(())
    }

    /// The runtime-configured capability, if the module has it.
    fn runtime_configured(&self) -> Option<&dyn RuntimeConfigured> {
        None
    }

    /// Release resources. Called once when the runtime shuts down.
    fn shutdown(&self) {}
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Node, NodeId, Relationship, RelationshipId};

    fn changes_with_label(label: &str) -> ChangeSet {
        let mut changes = ChangeSet::new();
        changes.record_node_created(Node::new(NodeId(1), [label]));
        changes
    }

    #[test]
    fn fingerprint_starts_with_tag() {
        let fp = ModuleConfiguration::default().fingerprint().expect("fp");
        assert!(fp.starts_with(CONFIG_TAG));
    }

    #[test]
    fn equal_configurations_share_fingerprint() {
        let a = ModuleConfiguration::default()
            .setting("b", "2")
            .setting("a", "1");
        let b = ModuleConfiguration::default()
            .setting("a", "1")
            .setting("b", "2");
        assert_eq!(a.fingerprint().expect("a"), b.fingerprint().expect("b"));
    }

    #[test]
    fn inclusion_is_part_of_fingerprint() {
        let all = ModuleConfiguration::default();
        let none = ModuleConfiguration::with_inclusion(InclusionPolicy::None);
        assert_ne!(all.fingerprint().expect("all"), none.fingerprint().expect("none"));
    }

    #[test]
    fn all_rejects_empty_change_set() {
        assert!(!InclusionPolicy::All.accepts(&ChangeSet::new()));
        assert!(InclusionPolicy::All.accepts(&changes_with_label("Person")));
    }

    #[test]
    fn label_policy_filters() {
        let policy = InclusionPolicy::Labels(BTreeSet::from(["Person".to_string()]));
        assert!(policy.accepts(&changes_with_label("Person")));
        assert!(!policy.accepts(&changes_with_label("City")));
        assert!(!InclusionPolicy::None.accepts(&changes_with_label("Person")));
    }

    #[test]
    fn relationship_type_policy_filters() {
        let mut changes = ChangeSet::new();
        changes.record_relationship_created(Relationship::new(
            RelationshipId(0),
            NodeId(0),
            NodeId(1),
            "FOLLOWS",
        ));
        let policy = InclusionPolicy::RelationshipTypes(BTreeSet::from(["FOLLOWS".to_string()]));
        assert!(policy.accepts(&changes));
        assert!(!policy.accepts(&changes_with_label("Person")));
    }

    #[test]
    fn tether_error_becomes_failed() {
        let err: HookError = TetherError::NodeNotFound(NodeId(3)).into();
        assert!(matches!(err, HookError::Failed(msg) if msg.contains("node#3")));
    }
}
