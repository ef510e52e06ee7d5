//! Integration tests for the operator commands against real stores.

use std::sync::Arc;
use tempfile::TempDir;
use tether::cli::{
    apply_force_reinit, apply_reset, collect_entries, collect_status, collect_walk,
    open_database,
};
use tether_core::{
    FingerprintStore, GraphDatabase, Module, NodeId, Runtime, RuntimeConfig, TetherError,
    Transaction,
};

struct Counter {
    id: &'static str,
}

impl Module for Counter {
    fn id(&self) -> &str {
        self.id
    }

    fn initialize(&self, tx: &mut Transaction<'_>) -> Result<(), TetherError> {
        tx.create_node(["Counter"])?;
        Ok(())
    }
}

fn setup() -> (TempDir, Arc<GraphDatabase>) {
    let dir = tempfile::tempdir().expect("temp dir");
    let db = open_database(&dir.path().join("cli.redb")).expect("open db");
    (dir, db)
}

fn start_with_modules(db: &Arc<GraphDatabase>, ids: &[&'static str]) {
    let runtime = Runtime::new(Arc::clone(db), RuntimeConfig::default()).expect("runtime");
    for id in ids {
        runtime
            .register_module(Arc::new(Counter { id: *id }))
            .expect("register");
    }
    runtime.start().expect("start");
}

// =============================================================================
// STATUS / INSPECT
// =============================================================================

#[test]
fn status_of_empty_store() {
    let (_dir, db) = setup();
    let report = collect_status(&db, &RuntimeConfig::default()).expect("status");

    assert_eq!(report.root, None);
    assert!(report.root_index_consistent);
    assert_eq!(report.modules, 0);
    assert_eq!(report.nodes, 0);
    assert!(collect_entries(&db, &RuntimeConfig::default()).expect("entries").is_empty());
}

#[test]
fn status_counts_modules_after_start() {
    let (_dir, db) = setup();
    start_with_modules(&db, &["alpha", "beta"]);

    let report = collect_status(&db, &RuntimeConfig::default()).expect("status");
    assert!(report.root.is_some());
    assert!(report.root_index_consistent);
    assert_eq!(report.modules, 2);
    assert_eq!(report.scheduled_reinit, 0);
    // root + one node per module
    assert_eq!(report.nodes, 3);

    let entries = collect_entries(&db, &RuntimeConfig::default()).expect("entries");
    let ids: Vec<&str> = entries.iter().map(|e| e.module.as_str()).collect();
    assert_eq!(ids, ["alpha", "beta"]);
    assert!(entries.iter().all(|e| e.kind == "fingerprint"));
}

#[test]
fn other_namespace_sees_nothing() {
    let (_dir, db) = setup();
    start_with_modules(&db, &["alpha"]);

    let other = RuntimeConfig {
        namespace: "_OTHER_".to_string(),
        ..RuntimeConfig::default()
    };
    let report = collect_status(&db, &other).expect("status");
    assert_eq!(report.root, None);
    assert!(report.root_index_consistent);
    assert_eq!(report.modules, 0);
}

// =============================================================================
// FORCE-REINIT
// =============================================================================

#[test]
fn force_reinit_keeps_first_marker() {
    let (_dir, db) = setup();
    start_with_modules(&db, &["alpha"]);
    let config = RuntimeConfig::default();

    assert!(apply_force_reinit(&db, &config, "alpha").expect("mark"));
    let first = collect_entries(&db, &config).expect("entries");
    assert_eq!(first[0].kind, "force_reinit");

    assert!(!apply_force_reinit(&db, &config, "alpha").expect("mark again"));
    let second = collect_entries(&db, &config).expect("entries");
    assert_eq!(first, second);
}

#[test]
fn forced_module_reinitializes_on_next_start() {
    let (_dir, db) = setup();
    start_with_modules(&db, &["alpha"]);
    apply_force_reinit(&db, &RuntimeConfig::default(), "alpha").expect("mark");

    start_with_modules(&db, &["alpha"]);
    let entries = collect_entries(&db, &RuntimeConfig::default()).expect("entries");
    assert_eq!(entries[0].kind, "fingerprint");
    assert_eq!(collect_status(&db, &RuntimeConfig::default()).expect("status").nodes, 3);
}

// =============================================================================
// RESET
// =============================================================================

#[test]
fn reset_prunes_every_entry() {
    let (_dir, db) = setup();
    start_with_modules(&db, &["alpha", "beta"]);

    let pruned = apply_reset(&db, &RuntimeConfig::default()).expect("reset");
    assert_eq!(pruned, ["alpha", "beta"]);
    assert!(collect_entries(&db, &RuntimeConfig::default()).expect("entries").is_empty());

    // business data stays
    let report = collect_status(&db, &RuntimeConfig::default()).expect("status");
    assert_eq!(report.nodes, 3);
    assert!(report.root.is_some());
}

#[test]
fn reset_then_start_initializes_again() {
    let (_dir, db) = setup();
    start_with_modules(&db, &["alpha"]);
    apply_reset(&db, &RuntimeConfig::default()).expect("reset");
    start_with_modules(&db, &["alpha"]);

    let store = FingerprintStore::new(RuntimeConfig::default());
    let tx = db.begin().expect("begin");
    let root = store.locate_root(&tx).expect("locate").expect("root");
    assert!(store.read(&tx, root, "alpha").expect("read").is_some());
    tx.rollback().expect("rollback");

    // a second Counter node was created
    assert_eq!(collect_status(&db, &RuntimeConfig::default()).expect("status").nodes, 3);
}

// =============================================================================
// WALK
// =============================================================================

#[test]
fn walk_follows_chain() {
    let (_dir, db) = setup();
    let (a, c) = db
        .in_transaction(|tx| {
            let a = tx.create_node(["Stop"])?;
            let b = tx.create_node(["Stop"])?;
            let c = tx.create_node(["Stop"])?;
            tx.create_relationship(a, b, "NEXT")?;
            tx.create_relationship(b, c, "NEXT")?;
            Ok((a, c))
        })
        .expect("graph");

    let path = collect_walk(&db, &RuntimeConfig::default(), a, 1).expect("walk");
    assert_eq!(path.len(), 2);
    assert_eq!(path[0], a);

    let isolated = collect_walk(&db, &RuntimeConfig::default(), c, 0).expect("walk");
    assert_eq!(isolated, [c]);
}

#[test]
fn walk_from_missing_node_fails() {
    let (_dir, db) = setup();
    let result = collect_walk(&db, &RuntimeConfig::default(), NodeId(42), 3);
    assert!(matches!(result, Err(TetherError::NodeNotFound(NodeId(42)))));
}
