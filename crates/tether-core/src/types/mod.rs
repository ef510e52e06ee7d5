//! # Core Type Definitions
//!
//! This module contains the shared types of the Tether runtime:
//! - Graph identifiers (`NodeId`, `RelationshipId`)
//! - Stored graph entities (`Node`, `Relationship`)
//! - Error types (`TetherError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`
//! - Keep labels in a `BTreeSet` so serialized nodes are byte-stable

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

// =============================================================================
// GRAPH IDENTIFIERS
// =============================================================================

/// Unique identifier for a node in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Unique identifier for a relationship in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelationshipId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

impl std::fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rel#{}", self.0)
    }
}

// =============================================================================
// NODE
// =============================================================================

/// A node as stored in the graph: an id and its labels.
///
/// Properties live in their own table and are not part of the node record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// The node identifier.
    pub id: NodeId,
    /// Labels carried by this node.
    pub labels: BTreeSet<String>,
}

impl Node {
    /// Create a new node with the given labels.
    #[must_use]
    pub fn new<I, S>(id: NodeId, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id,
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Check whether the node carries `label`.
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }
}

// =============================================================================
// RELATIONSHIP
// =============================================================================

/// A directed, typed relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// The relationship identifier.
    pub id: RelationshipId,
    /// Start node.
    pub start: NodeId,
    /// End node.
    pub end: NodeId,
    /// Relationship type name.
    pub rel_type: String,
}

impl Relationship {
    /// Create a new relationship.
    #[must_use]
    pub fn new(id: RelationshipId, start: NodeId, end: NodeId, rel_type: impl Into<String>) -> Self {
        Self {
            id,
            start,
            end,
            rel_type: rel_type.into(),
        }
    }

    /// The node at the other end of this relationship, seen from `node`.
    ///
    /// Returns `None` if `node` is not an endpoint. Self-loops return `node`.
    #[must_use]
    pub fn other_node(&self, node: NodeId) -> Option<NodeId> {
        if self.start == node {
            Some(self.end)
        } else if self.end == node {
            Some(self.start)
        } else {
            None
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Tether runtime.
///
/// - No silent failures
/// - Use `Result<T, TetherError>` for fallible operations
/// - Writer timeouts are not errors; they surface as `None`
#[derive(Debug, Error)]
pub enum TetherError {
    /// The module instance, or another module with the same id, is already registered.
    #[error("Module already registered: {0}")]
    DuplicateRegistration(String),

    /// Registration was attempted after the runtime started.
    #[error("Runtime already started, cannot register module {0}")]
    ClosedRegistry(String),

    /// A registered module's bookkeeping value is not a fingerprint or a marker.
    #[error("Corrupt metadata for module {module}: {value:?}")]
    CorruptMetadata {
        /// Id of the affected module.
        module: String,
        /// The unrecognized stored value.
        value: String,
    },

    /// Attempt to delete a node carrying a protected label.
    #[error("Node {0} is protected and cannot be deleted")]
    ProtectedEntity(NodeId),

    /// More than one runtime root node exists, or one already exists on create.
    #[error("Runtime root node already exists")]
    DuplicateRoot,

    /// A module's commit hook failed and the failure policy aborts the commit.
    #[error("Commit hook of module {module} failed: {reason}")]
    HookFailed {
        /// Id of the failing module.
        module: String,
        /// Reason reported by the module.
        reason: String,
    },

    /// The requested node does not exist.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// The requested relationship does not exist.
    #[error("Relationship not found: {0}")]
    RelationshipNotFound(RelationshipId),

    /// The node still has relationships and cannot be deleted.
    #[error("Node {0} still has relationships")]
    NodeInUse(NodeId),

    /// The runtime configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O or storage engine error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

/// Map a storage engine error into `TetherError::IoError`.
pub(crate) fn storage_err<E: std::fmt::Display>(e: E) -> TetherError {
    TetherError::IoError(e.to_string())
}

// =============================================================================
// TESTS
// =============================================================================
