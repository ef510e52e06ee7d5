//! # Change Sets
//!
//! The description of pending changes a transaction hands to commit hooks.
//!
//! Entries are keyed by id in `BTreeMap`s so iteration order is deterministic.
//! A node created and deleted in the same transaction leaves no trace.

use crate::{Node, NodeId, Relationship, RelationshipId};
use std::collections::BTreeMap;

/// Pending changes of one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    created_nodes: BTreeMap<NodeId, Node>,
    updated_nodes: BTreeMap<NodeId, Node>,
    deleted_nodes: BTreeMap<NodeId, Node>,
    created_relationships: BTreeMap<RelationshipId, Relationship>,
    deleted_relationships: BTreeMap<RelationshipId, Relationship>,
}

impl ChangeSet {
    /// Create an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created_nodes.is_empty()
            && self.updated_nodes.is_empty()
            && self.deleted_nodes.is_empty()
            && self.created_relationships.is_empty()
            && self.deleted_relationships.is_empty()
    }

    /// Total number of changed entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.created_nodes.len()
            + self.updated_nodes.len()
            + self.deleted_nodes.len()
            + self.created_relationships.len()
            + self.deleted_relationships.len()
    }

    /// Nodes created in this transaction.
    pub fn created_nodes(&self) -> impl Iterator<Item = &Node> {
        self.created_nodes.values()
    }

    /// Pre-existing nodes whose labels or properties changed.
    pub fn updated_nodes(&self) -> impl Iterator<Item = &Node> {
        self.updated_nodes.values()
    }

    /// Nodes deleted in this transaction, as they were before deletion.
    pub fn deleted_nodes(&self) -> impl Iterator<Item = &Node> {
        self.deleted_nodes.values()
    }

    /// Relationships created in this transaction.
    pub fn created_relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.created_relationships.values()
    }

    /// Relationships deleted in this transaction.
    pub fn deleted_relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.deleted_relationships.values()
    }

    /// Check whether any changed node carries `label`.
    #[must_use]
    pub fn touches_label(&self, label: &str) -> bool {
        self.created_nodes()
            .chain(self.updated_nodes())
            .chain(self.deleted_nodes())
            .any(|node| node.has_label(label))
    }

    /// Check whether any changed relationship has type `rel_type`.
    #[must_use]
    pub fn touches_relationship_type(&self, rel_type: &str) -> bool {
        self.created_relationships()
            .chain(self.deleted_relationships())
            .any(|rel| rel.rel_type == rel_type)
    }

    /// A copy of this change set without nodes carrying `label`.
    #[must_use]
    pub fn without_label(&self, label: &str) -> ChangeSet {
        let keep = |map: &BTreeMap<NodeId, Node>| -> BTreeMap<NodeId, Node> {
            map.iter()
                .filter(|(_, node)| !node.has_label(label))
                .map(|(id, node)| (*id, node.clone()))
                .collect()
        };
        ChangeSet {
            created_nodes: keep(&self.created_nodes),
            updated_nodes: keep(&self.updated_nodes),
            deleted_nodes: keep(&self.deleted_nodes),
            created_relationships: self.created_relationships.clone(),
            deleted_relationships: self.deleted_relationships.clone(),
        }
    }

    // -------------------------------------------------------------------------
    // Recording (used by `Transaction`)
    // -------------------------------------------------------------------------

    pub(crate) fn record_node_created(&mut self, node: Node) {
        self.created_nodes.insert(node.id, node);
    }

    /// Record a label or property change on `node` (post-change snapshot).
    pub(crate) fn record_node_updated(&mut self, node: Node) {
        if let Some(created) = self.created_nodes.get_mut(&node.id) {
            *created = node;
        } else {
            self.updated_nodes.insert(node.id, node);
        }
    }

    pub(crate) fn record_node_deleted(&mut self, node: Node) {
        if self.created_nodes.remove(&node.id).is_some() {
            return;
        }
        self.updated_nodes.remove(&node.id);
        self.deleted_nodes.insert(node.id, node);
    }

    pub(crate) fn record_relationship_created(&mut self, rel: Relationship) {
        self.created_relationships.insert(rel.id, rel);
    }

    pub(crate) fn record_relationship_deleted(&mut self, rel: Relationship) {
        if self.created_relationships.remove(&rel.id).is_some() {
            return;
        }
        self.deleted_relationships.insert(rel.id, rel);
    }
}

// =============================================================================
// TESTS
// =============================================================================
