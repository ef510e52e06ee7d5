//! # Fingerprint Store
//!
//! Durable per-module bookkeeping kept as string properties of the single
//! runtime root node.
//!
//! ## Layout
//!
//! ```text
//! (:_TETHER_ROOT {
//!     _TETHER_RUNTIME_timetree: "CONFIG{\"inclusion\":\"all\",\"settings\":{}}",
//!     _TETHER_RUNTIME_uuid:     "FORCE_INIT1700000000000"
//! })
//! ```
//!
//! Every operation works inside a caller-supplied [`Transaction`]; the store
//! never begins or commits one itself.

use crate::config::RuntimeConfig;
use crate::primitives::{CONFIG_TAG, FORCE_INIT_TAG};
use crate::storage::Transaction;
use crate::{NodeId, TetherError};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// STORED VALUE
// =============================================================================

/// Decoded bookkeeping value of one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredValue {
    /// A serialized configuration, `CONFIG...`.
    Fingerprint(String),
    /// A pending reinitialization request, `FORCE_INIT<epoch-millis>`.
    ForceReinit {
        /// When the first failure was recorded.
        since_millis: u64,
    },
    /// Anything else.
    Corrupt(String),
}

impl StoredValue {
    /// Decode a raw property value.
    ///
    /// The marker tag is checked first; a marker whose suffix is not a
    /// decimal timestamp is corrupt, not a fingerprint.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if let Some(suffix) = raw.strip_prefix(FORCE_INIT_TAG) {
            let digits = !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit());
            return match suffix.parse::<u64>() {
                Ok(since_millis) if digits => StoredValue::ForceReinit { since_millis },
                _ => StoredValue::Corrupt(raw.to_string()),
            };
        }
        if raw.starts_with(CONFIG_TAG) {
            StoredValue::Fingerprint(raw.to_string())
        } else {
            StoredValue::Corrupt(raw.to_string())
        }
    }

    /// Encode for storage.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            StoredValue::Fingerprint(fp) => fp.clone(),
            StoredValue::ForceReinit { since_millis } => format!("{FORCE_INIT_TAG}{since_millis}"),
            StoredValue::Corrupt(raw) => raw.clone(),
        }
    }

    #[must_use]
    pub fn is_force_reinit(&self) -> bool {
        matches!(self, StoredValue::ForceReinit { .. })
    }
}

impl std::fmt::Display for StoredValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

// =============================================================================
// FINGERPRINT STORE
// =============================================================================

/// Reads and writes module bookkeeping on the root node.
#[derive(Debug, Clone)]
pub struct FingerprintStore {
    config: RuntimeConfig,
}

impl FingerprintStore {
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }

    /// The configuration keys are derived from.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Find the root node through the label index.
    ///
    /// Fails with `DuplicateRoot` if more than one node carries the root label.
    pub fn locate_root(&self, tx: &Transaction<'_>) -> Result<Option<NodeId>, TetherError> {
        let roots = tx.nodes_with_label(&self.config.root_label())?;
        match roots.as_slice() {
            [] => Ok(None),
            [root] => Ok(Some(*root)),
            _ => Err(TetherError::DuplicateRoot),
        }
    }

    /// Find the root node by scanning every node, bypassing the label index.
    ///
    /// Same outcome as [`locate_root`](Self::locate_root) on a consistent
    /// store; used to cross-check the index.
    pub fn scan_for_root(&self, tx: &Transaction<'_>) -> Result<Option<NodeId>, TetherError> {
        let label = self.config.root_label();
        let roots: Vec<NodeId> = tx
            .all_nodes()?
            .into_iter()
            .filter(|node| node.has_label(&label))
            .map(|node| node.id)
            .collect();
        match roots.as_slice() {
            [] => Ok(None),
            [root] => Ok(Some(*root)),
            _ => Err(TetherError::DuplicateRoot),
        }
    }

    /// Create the root node. Fails with `DuplicateRoot` if one exists.
    pub fn create_root(&self, tx: &mut Transaction<'_>) -> Result<NodeId, TetherError> {
        if self.locate_root(tx)?.is_some() {
            return Err(TetherError::DuplicateRoot);
        }
        let root = tx.create_node([self.config.root_label()])?;
        tracing::info!(root = %root, "runtime root node created");
        Ok(root)
    }

    /// Locate the root node, creating it if absent. The flag tells whether
    /// it was created.
    pub fn locate_or_create_root(
        &self,
        tx: &mut Transaction<'_>,
    ) -> Result<(NodeId, bool), TetherError> {
        match self.locate_root(tx)? {
            Some(root) => Ok((root, false)),
            None => Ok((self.create_root(tx)?, true)),
        }
    }

    /// Stored value of a module, if any.
    pub fn read(
        &self,
        tx: &Transaction<'_>,
        root: NodeId,
        module_id: &str,
    ) -> Result<Option<StoredValue>, TetherError> {
        Ok(tx
            .property(root, &self.config.module_key(module_id))?
            .map(|raw| StoredValue::parse(&raw)))
    }

    /// Overwrite the stored value of a module.
    pub fn write(
        &self,
        tx: &mut Transaction<'_>,
        root: NodeId,
        module_id: &str,
        value: &StoredValue,
    ) -> Result<(), TetherError> {
        tx.set_property(root, &self.config.module_key(module_id), &value.encode())
    }

    /// Remove the stored value of a module. Returns whether one existed.
    pub fn delete(
        &self,
        tx: &mut Transaction<'_>,
        root: NodeId,
        module_id: &str,
    ) -> Result<bool, TetherError> {
        Ok(tx
            .remove_property(root, &self.config.module_key(module_id))?
            .is_some())
    }

    /// Ids of all modules with bookkeeping on the root node.
    pub fn list_module_ids(
        &self,
        tx: &Transaction<'_>,
        root: NodeId,
    ) -> Result<BTreeSet<String>, TetherError> {
        Ok(tx
            .property_keys(root)?
            .iter()
            .filter_map(|key| self.config.module_id_of(key))
            .map(str::to_string)
            .collect())
    }

    /// All bookkeeping entries, decoded, by module id.
    pub fn entries(
        &self,
        tx: &Transaction<'_>,
        root: NodeId,
    ) -> Result<BTreeMap<String, StoredValue>, TetherError> {
        Ok(tx
            .properties(root)?
            .iter()
            .filter_map(|(key, raw)| {
                self.config
                    .module_id_of(key)
                    .map(|id| (id.to_string(), StoredValue::parse(raw)))
            })
            .collect())
    }

    /// Schedule a module for reinitialization on the next start.
    ///
    /// An existing marker is kept so the recorded time is that of the first
    /// request. Returns whether a marker was written.
    pub fn mark_for_reinitialization(
        &self,
        tx: &mut Transaction<'_>,
        module_id: &str,
        since_millis: u64,
    ) -> Result<bool, TetherError> {
        let (root, _) = self.locate_or_create_root(tx)?;
        if self
            .read(tx, root, module_id)?
            .is_some_and(|existing| existing.is_force_reinit())
        {
            tracing::debug!(module = module_id, "reinitialization already scheduled");
            return Ok(false);
        }
        self.write(tx, root, module_id, &StoredValue::ForceReinit { since_millis })?;
        tracing::info!(module = module_id, since_millis, "module scheduled for reinitialization");
        Ok(true)
    }
}

// =============================================================================
// TESTS
// =============================================================================
