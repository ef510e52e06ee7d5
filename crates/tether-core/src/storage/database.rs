//! # redb-backed Graph Database
//!
//! The host store the runtime is embedded in, built on the redb embedded
//! database:
//! - ACID write transactions (one writer at a time, copy-on-write B-trees)
//! - Labelled nodes with a label index, string properties, typed relationships
//! - Commit hooks that see the pending [`ChangeSet`] and run inside the
//!   committing transaction before it is made durable
//! - Protected labels: nodes carrying one cannot be deleted
//!
//! ## Writer lock
//!
//! redb admits a single write transaction at a time. A commit hook that calls
//! [`GraphDatabase::begin`] on the committing thread blocks forever on that
//! lock. Deferred writes from hooks go through
//! [`DatabaseWriter`](crate::writer::DatabaseWriter) instead.

use crate::storage::ChangeSet;
use crate::types::storage_err;
use crate::{Node, NodeId, Relationship, RelationshipId, TetherError};
use parking_lot::RwLock;
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition, WriteTransaction};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Table for nodes: NodeId(u64) -> serialized Node bytes
const NODES: TableDefinition<u64, &[u8]> = TableDefinition::new("nodes");

/// Table for relationships: RelationshipId(u64) -> serialized Relationship bytes
const RELATIONSHIPS: TableDefinition<u64, &[u8]> = TableDefinition::new("relationships");

/// Adjacency index: (node_id, relationship_id) for both endpoints
const ADJACENCY: TableDefinition<(u64, u64), ()> = TableDefinition::new("adjacency");

/// Label index: (label, node_id)
const LABEL_INDEX: TableDefinition<(&str, u64), ()> = TableDefinition::new("label_index");

/// Node properties: (node_id, key) -> value
const PROPERTIES: TableDefinition<(u64, &str), &str> = TableDefinition::new("properties");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_NODE_ID: &str = "next_node_id";
const NEXT_RELATIONSHIP_ID: &str = "next_relationship_id";

// =============================================================================
// COMMIT HOOKS
// =============================================================================

/// A callback run by every transaction right before it commits.
///
/// Hooks run synchronously on the committing thread, in registration order.
/// Writes a hook makes through `tx` become part of the same commit. An error
/// aborts the commit; nothing of the transaction is persisted.
pub trait CommitHook: Send + Sync {
    /// Inspect (and optionally extend) the transaction about to commit.
    fn before_commit(&self, changes: &ChangeSet, tx: &mut Transaction<'_>)
    -> Result<(), TetherError>;
}

/// Handle returned by [`GraphDatabase::register_commit_hook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HookHandle(u64);

// =============================================================================
// DATABASE
// =============================================================================

/// A disk-backed graph database using redb.
pub struct GraphDatabase {
    /// The redb database handle.
    db: Database,
    /// Registered commit hooks, in registration order.
    hooks: RwLock<Vec<(HookHandle, Arc<dyn CommitHook>)>>,
    next_hook: AtomicU64,
    /// Labels whose nodes cannot be deleted.
    protected_labels: RwLock<BTreeSet<String>>,
    started_transactions: AtomicU64,
    committed_transactions: AtomicU64,
}

impl std::fmt::Debug for GraphDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphDatabase")
            .field("hooks", &self.hooks.read().len())
            .field("protected_labels", &*self.protected_labels.read())
            .field("started_transactions", &self.started_transactions())
            .field("committed_transactions", &self.committed_transactions())
            .finish_non_exhaustive()
    }
}

impl GraphDatabase {
    /// Open or create a graph database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TetherError> {
        let db = Database::create(path.as_ref()).map_err(storage_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(storage_err)?;
            let _ = write_txn.open_table(NODES).map_err(storage_err)?;
            let _ = write_txn.open_table(RELATIONSHIPS).map_err(storage_err)?;
            let _ = write_txn.open_table(ADJACENCY).map_err(storage_err)?;
            let _ = write_txn.open_table(LABEL_INDEX).map_err(storage_err)?;
            let _ = write_txn.open_table(PROPERTIES).map_err(storage_err)?;
            let _ = write_txn.open_table(METADATA).map_err(storage_err)?;
            write_txn.commit().map_err(storage_err)?;
        }

        Ok(Self {
            db,
            hooks: RwLock::new(Vec::new()),
            next_hook: AtomicU64::new(0),
            protected_labels: RwLock::new(BTreeSet::new()),
            started_transactions: AtomicU64::new(0),
            committed_transactions: AtomicU64::new(0),
        })
    }

    /// Begin a write transaction.
    ///
    /// Blocks while another write transaction is open.
    pub fn begin(&self) -> Result<Transaction<'_>, TetherError> {
        let inner = self.db.begin_write().map_err(storage_err)?;
        self.started_transactions.fetch_add(1, Ordering::Relaxed);
        Ok(Transaction {
            database: self,
            inner,
            changes: ChangeSet::new(),
        })
    }

    /// Run `work` in a fresh transaction and commit it if `work` succeeds.
    pub fn in_transaction<T>(
        &self,
        work: impl FnOnce(&mut Transaction<'_>) -> Result<T, TetherError>,
    ) -> Result<T, TetherError> {
        let mut tx = self.begin()?;
        let value = work(&mut tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Register a hook run before every commit.
    pub fn register_commit_hook(&self, hook: Arc<dyn CommitHook>) -> HookHandle {
        let handle = HookHandle(self.next_hook.fetch_add(1, Ordering::Relaxed));
        self.hooks.write().push((handle, hook));
        handle
    }

    /// Remove a previously registered hook. Unknown handles are ignored.
    pub fn unregister_commit_hook(&self, handle: HookHandle) {
        self.hooks.write().retain(|(h, _)| *h != handle);
    }

    fn commit_hooks(&self) -> Vec<Arc<dyn CommitHook>> {
        self.hooks.read().iter().map(|(_, hook)| Arc::clone(hook)).collect()
    }

    /// Forbid deletion of every node carrying `label`.
    pub fn protect_label(&self, label: impl Into<String>) {
        self.protected_labels.write().insert(label.into());
    }

    /// Check whether `label` is protected.
    #[must_use]
    pub fn is_protected(&self, label: &str) -> bool {
        self.protected_labels.read().contains(label)
    }

    /// Number of write transactions begun since this handle was opened.
    #[must_use]
    pub fn started_transactions(&self) -> u64 {
        self.started_transactions.load(Ordering::Relaxed)
    }

    /// Number of write transactions committed since this handle was opened.
    #[must_use]
    pub fn committed_transactions(&self) -> u64 {
        self.committed_transactions.load(Ordering::Relaxed)
    }
}

// =============================================================================
// TRANSACTION
// =============================================================================

/// A write transaction over a [`GraphDatabase`].
///
/// Dropping a transaction without calling [`Transaction::commit`] discards
/// every change made through it.
pub struct Transaction<'db> {
    database: &'db GraphDatabase,
    inner: WriteTransaction,
    changes: ChangeSet,
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("pending_changes", &self.changes.len())
            .finish_non_exhaustive()
    }
}

impl Transaction<'_> {
    /// Changes recorded so far in this transaction.
    #[must_use]
    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    /// The database this transaction belongs to.
    #[must_use]
    pub fn database(&self) -> &GraphDatabase {
        self.database
    }

    /// Run the commit hooks, then make the transaction durable.
    ///
    /// Hooks see the changes recorded before the commit started; changes
    /// they make themselves are committed but not re-dispatched.
    pub fn commit(mut self) -> Result<(), TetherError> {
        let hooks = self.database.commit_hooks();
        if !hooks.is_empty() {
            let changes = std::mem::take(&mut self.changes);
            for hook in &hooks {
                hook.before_commit(&changes, &mut self)?;
            }
        }
        let database = self.database;
        self.inner.commit().map_err(storage_err)?;
        database.committed_transactions.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Discard every change made in this transaction.
    pub fn rollback(self) -> Result<(), TetherError> {
        self.inner.abort().map_err(storage_err)
    }

    fn next_id(&self, key: &str) -> Result<u64, TetherError> {
        let mut meta_table = self.inner.open_table(METADATA).map_err(storage_err)?;
        let current = meta_table
            .get(key)
            .map_err(storage_err)?
            .map(|v| v.value())
            .unwrap_or(0);
        meta_table
            .insert(key, current.saturating_add(1))
            .map_err(storage_err)?;
        Ok(current)
    }

    // -------------------------------------------------------------------------
    // Nodes
    // -------------------------------------------------------------------------

    /// Create a node with the given labels.
    pub fn create_node<I, S>(&mut self, labels: I) -> Result<NodeId, TetherError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let node = Node::new(NodeId(self.next_id(NEXT_NODE_ID)?), labels);
        self.put_node(&node)?;
        {
            let mut label_table = self.inner.open_table(LABEL_INDEX).map_err(storage_err)?;
            for label in &node.labels {
                label_table
                    .insert((label.as_str(), node.id.0), ())
                    .map_err(storage_err)?;
            }
        }
        let id = node.id;
        self.changes.record_node_created(node);
        Ok(id)
    }

    fn put_node(&self, node: &Node) -> Result<(), TetherError> {
        let bytes = postcard::to_allocvec(node)
            .map_err(|e| TetherError::SerializationError(e.to_string()))?;
        let mut nodes_table = self.inner.open_table(NODES).map_err(storage_err)?;
        nodes_table
            .insert(node.id.0, bytes.as_slice())
            .map_err(storage_err)?;
        Ok(())
    }

    /// Lookup a node by id.
    pub fn node(&self, id: NodeId) -> Result<Option<Node>, TetherError> {
        let nodes_table = self.inner.open_table(NODES).map_err(storage_err)?;
        match nodes_table.get(id.0).map_err(storage_err)? {
            Some(data) => {
                let node: Node = postcard::from_bytes(data.value())
                    .map_err(|e| TetherError::DeserializationError(e.to_string()))?;
                Ok(Some(node))
            }
            None => Ok(None),
        }
    }

    fn require_node(&self, id: NodeId) -> Result<Node, TetherError> {
        self.node(id)?.ok_or(TetherError::NodeNotFound(id))
    }

    /// Add a label to an existing node. Adding a present label is a no-op.
    pub fn add_label(&mut self, id: NodeId, label: &str) -> Result<(), TetherError> {
        let mut node = self.require_node(id)?;
        if !node.labels.insert(label.to_string()) {
            return Ok(());
        }
        self.put_node(&node)?;
        {
            let mut label_table = self.inner.open_table(LABEL_INDEX).map_err(storage_err)?;
            label_table.insert((label, id.0), ()).map_err(storage_err)?;
        }
        self.changes.record_node_updated(node);
        Ok(())
    }

    /// Ids of all nodes carrying `label`, via the label index.
    pub fn nodes_with_label(&self, label: &str) -> Result<Vec<NodeId>, TetherError> {
        let label_table = self.inner.open_table(LABEL_INDEX).map_err(storage_err)?;
        let mut ids = Vec::new();
        for entry in label_table
            .range((label, 0u64)..=(label, u64::MAX))
            .map_err(storage_err)?
        {
            let (key, _) = entry.map_err(storage_err)?;
            ids.push(NodeId(key.value().1));
        }
        Ok(ids)
    }

    /// Every node in the store, in id order. Full scan.
    pub fn all_nodes(&self) -> Result<Vec<Node>, TetherError> {
        let nodes_table = self.inner.open_table(NODES).map_err(storage_err)?;
        let mut nodes = Vec::new();
        for entry in nodes_table.iter().map_err(storage_err)? {
            let (_, value) = entry.map_err(storage_err)?;
            let node: Node = postcard::from_bytes(value.value())
                .map_err(|e| TetherError::DeserializationError(e.to_string()))?;
            nodes.push(node);
        }
        Ok(nodes)
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> Result<u64, TetherError> {
        let nodes_table = self.inner.open_table(NODES).map_err(storage_err)?;
        nodes_table.len().map_err(storage_err)
    }

    /// Delete a node and its properties.
    ///
    /// Fails with `ProtectedEntity` if the node carries a protected label and
    /// with `NodeInUse` if it still has relationships. On failure nothing is
    /// changed.
    pub fn delete_node(&mut self, id: NodeId) -> Result<(), TetherError> {
        let node = self.require_node(id)?;
        if node.labels.iter().any(|label| self.database.is_protected(label)) {
            return Err(TetherError::ProtectedEntity(id));
        }
        if !self.relationship_ids(id)?.is_empty() {
            return Err(TetherError::NodeInUse(id));
        }

        let keys = self.property_keys(id)?;
        {
            let mut props_table = self.inner.open_table(PROPERTIES).map_err(storage_err)?;
            for key in &keys {
                props_table.remove((id.0, key.as_str())).map_err(storage_err)?;
            }
        }
        {
            let mut label_table = self.inner.open_table(LABEL_INDEX).map_err(storage_err)?;
            for label in &node.labels {
                label_table
                    .remove((label.as_str(), id.0))
                    .map_err(storage_err)?;
            }
        }
        {
            let mut nodes_table = self.inner.open_table(NODES).map_err(storage_err)?;
            nodes_table.remove(id.0).map_err(storage_err)?;
        }
        self.changes.record_node_deleted(node);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Properties
    // -------------------------------------------------------------------------

    /// Read a string property of a node.
    pub fn property(&self, id: NodeId, key: &str) -> Result<Option<String>, TetherError> {
        let props_table = self.inner.open_table(PROPERTIES).map_err(storage_err)?;
        Ok(props_table
            .get((id.0, key))
            .map_err(storage_err)?
            .map(|v| v.value().to_string()))
    }

    /// All properties of a node, ordered by key.
    pub fn properties(&self, id: NodeId) -> Result<BTreeMap<String, String>, TetherError> {
        let props_table = self.inner.open_table(PROPERTIES).map_err(storage_err)?;
        let mut props = BTreeMap::new();
        for entry in props_table.range((id.0, "")..).map_err(storage_err)? {
            let (key, value) = entry.map_err(storage_err)?;
            let (node_id, name) = key.value();
            if node_id != id.0 {
                break;
            }
            props.insert(name.to_string(), value.value().to_string());
        }
        Ok(props)
    }

    /// Keys of all properties of a node, ordered.
    pub fn property_keys(&self, id: NodeId) -> Result<Vec<String>, TetherError> {
        Ok(self.properties(id)?.into_keys().collect())
    }

    /// Set a string property on an existing node.
    pub fn set_property(&mut self, id: NodeId, key: &str, value: &str) -> Result<(), TetherError> {
        let node = self.require_node(id)?;
        {
            let mut props_table = self.inner.open_table(PROPERTIES).map_err(storage_err)?;
            props_table.insert((id.0, key), value).map_err(storage_err)?;
        }
        self.changes.record_node_updated(node);
        Ok(())
    }

    /// Remove a property, returning its previous value.
    pub fn remove_property(&mut self, id: NodeId, key: &str) -> Result<Option<String>, TetherError> {
        let node = self.require_node(id)?;
        let previous = {
            let mut props_table = self.inner.open_table(PROPERTIES).map_err(storage_err)?;
            let removed = props_table.remove((id.0, key)).map_err(storage_err)?;
            removed.map(|v| v.value().to_string())
        };
        if previous.is_some() {
            self.changes.record_node_updated(node);
        }
        Ok(previous)
    }

    // -------------------------------------------------------------------------
    // Relationships
    // -------------------------------------------------------------------------

    /// Create a relationship between two existing nodes.
    pub fn create_relationship(
        &mut self,
        start: NodeId,
        end: NodeId,
        rel_type: &str,
    ) -> Result<RelationshipId, TetherError> {
        self.require_node(start)?;
        self.require_node(end)?;

        let rel = Relationship::new(
            RelationshipId(self.next_id(NEXT_RELATIONSHIP_ID)?),
            start,
            end,
            rel_type,
        );
        let bytes = postcard::to_allocvec(&rel)
            .map_err(|e| TetherError::SerializationError(e.to_string()))?;
        {
            let mut rels_table = self.inner.open_table(RELATIONSHIPS).map_err(storage_err)?;
            rels_table
                .insert(rel.id.0, bytes.as_slice())
                .map_err(storage_err)?;
        }
        {
            let mut adjacency = self.inner.open_table(ADJACENCY).map_err(storage_err)?;
            adjacency.insert((start.0, rel.id.0), ()).map_err(storage_err)?;
            adjacency.insert((end.0, rel.id.0), ()).map_err(storage_err)?;
        }
        let id = rel.id;
        self.changes.record_relationship_created(rel);
        Ok(id)
    }

    /// Lookup a relationship by id.
    pub fn relationship(&self, id: RelationshipId) -> Result<Option<Relationship>, TetherError> {
        let rels_table = self.inner.open_table(RELATIONSHIPS).map_err(storage_err)?;
        match rels_table.get(id.0).map_err(storage_err)? {
            Some(data) => {
                let rel: Relationship = postcard::from_bytes(data.value())
                    .map_err(|e| TetherError::DeserializationError(e.to_string()))?;
                Ok(Some(rel))
            }
            None => Ok(None),
        }
    }

    fn relationship_ids(&self, node: NodeId) -> Result<Vec<RelationshipId>, TetherError> {
        let adjacency = self.inner.open_table(ADJACENCY).map_err(storage_err)?;
        let mut ids = Vec::new();
        for entry in adjacency
            .range((node.0, 0u64)..=(node.0, u64::MAX))
            .map_err(storage_err)?
        {
            let (key, _) = entry.map_err(storage_err)?;
            ids.push(RelationshipId(key.value().1));
        }
        Ok(ids)
    }

    /// All relationships incident to `node`, in either direction, by id.
    ///
    /// A self-loop is returned once.
    pub fn relationships(&self, node: NodeId) -> Result<Vec<Relationship>, TetherError> {
        let mut rels = Vec::new();
        for id in self.relationship_ids(node)? {
            rels.push(self.relationship(id)?.ok_or(TetherError::RelationshipNotFound(id))?);
        }
        Ok(rels)
    }

    /// Total number of relationships.
    pub fn relationship_count(&self) -> Result<u64, TetherError> {
        let rels_table = self.inner.open_table(RELATIONSHIPS).map_err(storage_err)?;
        rels_table.len().map_err(storage_err)
    }

    /// Delete a relationship.
    pub fn delete_relationship(&mut self, id: RelationshipId) -> Result<(), TetherError> {
        let rel = self
            .relationship(id)?
            .ok_or(TetherError::RelationshipNotFound(id))?;
        {
            let mut adjacency = self.inner.open_table(ADJACENCY).map_err(storage_err)?;
            adjacency.remove((rel.start.0, id.0)).map_err(storage_err)?;
            adjacency.remove((rel.end.0, id.0)).map_err(storage_err)?;
        }
        {
            let mut rels_table = self.inner.open_table(RELATIONSHIPS).map_err(storage_err)?;
            rels_table.remove(id.0).map_err(storage_err)?;
        }
        self.changes.record_relationship_deleted(rel);
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tempfile::tempdir;

    fn open_temp() -> (tempfile::TempDir, GraphDatabase) {
        let temp = tempdir().expect("temp dir");
        let db = GraphDatabase::open(temp.path().join("test.redb")).expect("open db");
        (temp, db)
    }

    #[test]
    fn create_and_lookup_node() {
        let (_temp, db) = open_temp();
        let id = db
            .in_transaction(|tx| tx.create_node(["Person"]))
            .expect("create");

        let node = db.in_transaction(|tx| tx.node(id)).expect("lookup");
        assert_eq!(node, Some(Node::new(id, ["Person"])));
    }

    #[test]
    fn label_index_finds_nodes() {
        let (_temp, db) = open_temp();
        db.in_transaction(|tx| {
            tx.create_node(["Person"])?;
            tx.create_node(["City"])?;
            tx.create_node(["Person", "Admin"])?;
            Ok(())
        })
        .expect("create");

        let people = db
            .in_transaction(|tx| tx.nodes_with_label("Person"))
            .expect("index");
        assert_eq!(people, vec![NodeId(0), NodeId(2)]);
    }

    #[test]
    fn add_label_updates_index() {
        let (_temp, db) = open_temp();
        let id = db
            .in_transaction(|tx| tx.create_node(Vec::<String>::new()))
            .expect("create");
        db.in_transaction(|tx| tx.add_label(id, "Tagged")).expect("label");

        let tagged = db
            .in_transaction(|tx| tx.nodes_with_label("Tagged"))
            .expect("index");
        assert_eq!(tagged, vec![id]);
    }

    #[test]
    fn properties_roundtrip_and_remove() {
        let (_temp, db) = open_temp();
        let id = db.in_transaction(|tx| tx.create_node(["A"])).expect("create");
        db.in_transaction(|tx| {
            tx.set_property(id, "name", "Alice")?;
            tx.set_property(id, "city", "Paris")
        })
        .expect("set");

        db.in_transaction(|tx| {
            assert_eq!(tx.property(id, "name")?, Some("Alice".to_string()));
            assert_eq!(tx.property_keys(id)?, vec!["city", "name"]);
            assert_eq!(tx.remove_property(id, "city")?, Some("Paris".to_string()));
            assert_eq!(tx.remove_property(id, "city")?, None);
            Ok(())
        })
        .expect("read");
    }

    #[test]
    fn properties_do_not_leak_between_nodes() {
        let (_temp, db) = open_temp();
        db.in_transaction(|tx| {
            let a = tx.create_node(["A"])?;
            let b = tx.create_node(["B"])?;
            tx.set_property(a, "x", "1")?;
            tx.set_property(b, "y", "2")?;
            assert_eq!(tx.property_keys(a)?, vec!["x"]);
            assert_eq!(tx.property_keys(b)?, vec!["y"]);
            Ok(())
        })
        .expect("tx");
    }

    #[test]
    fn set_property_on_missing_node_fails() {
        let (_temp, db) = open_temp();
        let result = db.in_transaction(|tx| tx.set_property(NodeId(42), "k", "v"));
        assert!(matches!(result, Err(TetherError::NodeNotFound(NodeId(42)))));
    }

    #[test]
    fn rollback_discards_changes() {
        let (_temp, db) = open_temp();
        let mut tx = db.begin().expect("begin");
        tx.create_node(["Ghost"]).expect("create");
        tx.rollback().expect("rollback");

        assert_eq!(db.in_transaction(|tx| tx.node_count()).expect("count"), 0);
    }

    #[test]
    fn dropped_transaction_discards_changes() {
        let (_temp, db) = open_temp();
        {
            let mut tx = db.begin().expect("begin");
            tx.create_node(["Ghost"]).expect("create");
        }
        assert_eq!(db.in_transaction(|tx| tx.node_count()).expect("count"), 0);
    }

    #[test]
    fn protected_node_cannot_be_deleted() {
        let (_temp, db) = open_temp();
        let id = db
            .in_transaction(|tx| tx.create_node(["_TETHER_ROOT"]))
            .expect("create");
        assert!(!db.is_protected("_TETHER_ROOT"));
        db.protect_label("_TETHER_ROOT");
        assert!(db.is_protected("_TETHER_ROOT"));

        let result = db.in_transaction(|tx| tx.delete_node(id));
        assert!(matches!(result, Err(TetherError::ProtectedEntity(n)) if n == id));
        assert!(db.in_transaction(|tx| tx.node(id)).expect("lookup").is_some());
    }

    #[test]
    fn unprotected_node_deletes_with_properties() {
        let (_temp, db) = open_temp();
        let id = db
            .in_transaction(|tx| {
                let id = tx.create_node(["Temp"])?;
                tx.set_property(id, "k", "v")?;
                Ok(id)
            })
            .expect("create");

        db.in_transaction(|tx| tx.delete_node(id)).expect("delete");
        db.in_transaction(|tx| {
            assert!(tx.node(id)?.is_none());
            assert!(tx.property_keys(id)?.is_empty());
            assert!(tx.nodes_with_label("Temp")?.is_empty());
            Ok(())
        })
        .expect("verify");
    }

    #[test]
    fn node_with_relationships_is_in_use() {
        let (_temp, db) = open_temp();
        let (a, b) = db
            .in_transaction(|tx| {
                let a = tx.create_node(["A"])?;
                let b = tx.create_node(["B"])?;
                tx.create_relationship(a, b, "LINKS")?;
                Ok((a, b))
            })
            .expect("create");

        let result = db.in_transaction(|tx| tx.delete_node(b));
        assert!(matches!(result, Err(TetherError::NodeInUse(n)) if n == b));
        let rels = db.in_transaction(|tx| tx.relationships(a)).expect("rels");
        assert_eq!(rels.len(), 1);
    }

    #[test]
    fn relationships_seen_from_both_ends() {
        let (_temp, db) = open_temp();
        db.in_transaction(|tx| {
            let a = tx.create_node(["A"])?;
            let b = tx.create_node(["B"])?;
            let c = tx.create_node(["C"])?;
            tx.create_relationship(a, b, "X")?;
            tx.create_relationship(c, a, "Y")?;
            tx.create_relationship(a, a, "SELF")?;

            assert_eq!(tx.relationships(a)?.len(), 3);
            assert_eq!(tx.relationships(b)?.len(), 1);
            assert_eq!(tx.relationship_count()?, 3);
            Ok(())
        })
        .expect("tx");
    }

    #[test]
    fn delete_relationship_clears_adjacency() {
        let (_temp, db) = open_temp();
        db.in_transaction(|tx| {
            let a = tx.create_node(["A"])?;
            let b = tx.create_node(["B"])?;
            let rel = tx.create_relationship(a, b, "X")?;
            tx.delete_relationship(rel)?;
            assert!(tx.relationships(a)?.is_empty());
            assert!(tx.relationships(b)?.is_empty());
            tx.delete_node(b)
        })
        .expect("tx");
    }

    struct RecordingHook {
        seen: Mutex<Vec<usize>>,
    }

    impl CommitHook for RecordingHook {
        fn before_commit(
            &self,
            changes: &ChangeSet,
            _tx: &mut Transaction<'_>,
        ) -> Result<(), TetherError> {
            self.seen.lock().push(changes.len());
            Ok(())
        }
    }

    #[test]
    fn hooks_see_pending_changes() {
        let (_temp, db) = open_temp();
        let hook = Arc::new(RecordingHook {
            seen: Mutex::new(Vec::new()),
        });
        db.register_commit_hook(hook.clone());

        db.in_transaction(|tx| {
            tx.create_node(["A"])?;
            tx.create_node(["B"])?;
            Ok(())
        })
        .expect("tx");

        assert_eq!(*hook.seen.lock(), vec![2]);
    }

    #[test]
    fn unregistered_hook_is_not_called() {
        let (_temp, db) = open_temp();
        let hook = Arc::new(RecordingHook {
            seen: Mutex::new(Vec::new()),
        });
        let handle = db.register_commit_hook(hook.clone());
        db.unregister_commit_hook(handle);

        db.in_transaction(|tx| tx.create_node(["A"])).expect("tx");
        assert!(hook.seen.lock().is_empty());
    }

    struct FailingHook;

    impl CommitHook for FailingHook {
        fn before_commit(
            &self,
            _changes: &ChangeSet,
            _tx: &mut Transaction<'_>,
        ) -> Result<(), TetherError> {
            Err(TetherError::HookFailed {
                module: "failing".into(),
                reason: "no".into(),
            })
        }
    }

    #[test]
    fn failing_hook_aborts_commit() {
        let (_temp, db) = open_temp();
        let handle = db.register_commit_hook(Arc::new(FailingHook));

        let result = db.in_transaction(|tx| tx.create_node(["A"]));
        assert!(matches!(result, Err(TetherError::HookFailed { .. })));

        db.unregister_commit_hook(handle);
        assert_eq!(db.in_transaction(|tx| tx.node_count()).expect("count"), 0);
    }

    #[test]
    fn transaction_counters_advance() {
        let (_temp, db) = open_temp();
        db.in_transaction(|tx| tx.create_node(["A"])).expect("tx");
        let _ = db.begin().expect("begin");

        assert_eq!(db.started_transactions(), 2);
        assert_eq!(db.committed_transactions(), 1);
    }

    #[test]
    fn data_persists_after_reopen() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("test.redb");
        let id;
        {
            let db = GraphDatabase::open(&path).expect("open db");
            id = db
                .in_transaction(|tx| {
                    let id = tx.create_node(["Person"])?;
                    tx.set_property(id, "name", "Alice")?;
                    Ok(id)
                })
                .expect("create");
        }
        {
            let db = GraphDatabase::open(&path).expect("reopen db");
            db.in_transaction(|tx| {
                assert_eq!(tx.property(id, "name")?, Some("Alice".to_string()));
                assert_eq!(tx.nodes_with_label("Person")?, vec![id]);
                let next = tx.create_node(["Person"])?;
                assert!(next.0 > id.0);
                Ok(())
            })
            .expect("verify");
        }
    }
}
