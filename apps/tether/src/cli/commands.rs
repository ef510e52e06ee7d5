//! # CLI Command Implementations
//!
//! Every command is split into a `collect`/`apply` function that returns a
//! serializable report, and a `cmd_*` wrapper that prints it.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tether_core::primitives::now_millis;
use tether_core::{
    FingerprintStore, GraphDatabase, IncludeAllBusinessRelationships, NodeId,
    RandomRelationshipSelector, RelationshipSelector, Runtime, RuntimeConfig, StoredValue,
    TetherError, Transaction,
};

/// Maximum size of a configuration file (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// SETUP
// =============================================================================

/// Load the runtime configuration, or the defaults without a file.
pub fn load_config(path: Option<&Path>) -> Result<RuntimeConfig, TetherError> {
    let Some(path) = path else {
        return Ok(RuntimeConfig::default());
    };

    let metadata = std::fs::metadata(path)
        .map_err(|e| TetherError::IoError(format!("Cannot read {}: {}", path.display(), e)))?;
    if metadata.len() > MAX_CONFIG_FILE_SIZE {
        return Err(TetherError::InvalidConfig(format!(
            "Config file {} exceeds {} bytes",
            path.display(),
            MAX_CONFIG_FILE_SIZE
        )));
    }

    let text = std::fs::read_to_string(path)
        .map_err(|e| TetherError::IoError(format!("Cannot read {}: {}", path.display(), e)))?;
    parse_config(&text)
}

/// Parse and validate a TOML configuration.
pub fn parse_config(text: &str) -> Result<RuntimeConfig, TetherError> {
    let config: RuntimeConfig =
        toml::from_str(text).map_err(|e| TetherError::InvalidConfig(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

pub fn open_database(path: &Path) -> Result<Arc<GraphDatabase>, TetherError> {
    Ok(Arc::new(GraphDatabase::open(path)?))
}

/// Run `read` in a transaction that is rolled back afterwards.
fn read_only<T>(
    database: &GraphDatabase,
    read: impl FnOnce(&Transaction<'_>) -> Result<T, TetherError>,
) -> Result<T, TetherError> {
    let tx = database.begin()?;
    let value = read(&tx)?;
    tx.rollback()?;
    Ok(value)
}

fn print_json<T: Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Overview of the runtime bookkeeping in a store.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub namespace: String,
    pub root: Option<u64>,
    /// Whether a full node scan finds the same root as the label index.
    pub root_index_consistent: bool,
    pub modules: usize,
    pub scheduled_reinit: usize,
    pub corrupt: usize,
    pub nodes: u64,
    pub relationships: u64,
}

pub fn collect_status(
    database: &GraphDatabase,
    config: &RuntimeConfig,
) -> Result<StatusReport, TetherError> {
    let store = FingerprintStore::new(config.clone());
    read_only(database, |tx| {
        let root = store.locate_root(tx)?;
        let scanned = store.scan_for_root(tx)?;
        let entries = match root {
            Some(root) => store.entries(tx, root)?,
            None => Default::default(),
        };
        Ok(StatusReport {
            namespace: config.namespace.clone(),
            root: root.map(|id| id.0),
            root_index_consistent: root == scanned,
            modules: entries.len(),
            scheduled_reinit: entries.values().filter(|v| v.is_force_reinit()).count(),
            corrupt: entries
                .values()
                .filter(|v| matches!(v, StoredValue::Corrupt(_)))
                .count(),
            nodes: tx.node_count()?,
            relationships: tx.relationship_count()?,
        })
    })
}

/// Show the runtime root and store counters.
pub fn cmd_status(
    database: &GraphDatabase,
    config: &RuntimeConfig,
    db_path: &Path,
    json_mode: bool,
) -> Result<(), TetherError> {
    let report = collect_status(database, config)?;

    if json_mode {
        print_json(&report);
        return Ok(());
    }

    println!("Tether Runtime Status");
    println!("=====================");
    println!("Database:  {}", db_path.display());
    println!("Namespace: {}", report.namespace);
    match report.root {
        Some(root) => println!("Root:      {}", NodeId(root)),
        None => println!("Root:      (none)"),
    }
    if !report.root_index_consistent {
        println!("Warning:   label index disagrees with a full node scan");
    }
    println!();
    println!("Modules:          {}", report.modules);
    println!("Scheduled reinit: {}", report.scheduled_reinit);
    println!("Corrupt entries:  {}", report.corrupt);
    println!("Nodes:            {}", report.nodes);
    println!("Relationships:    {}", report.relationships);

    Ok(())
}

// =============================================================================
// INSPECT COMMAND
// =============================================================================

/// One decoded bookkeeping entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryReport {
    pub module: String,
    pub kind: &'static str,
    pub since_millis: Option<u64>,
    pub value: String,
}

impl EntryReport {
    fn new(module: String, value: &StoredValue) -> Self {
        let (kind, since_millis) = match value {
            StoredValue::Fingerprint(_) => ("fingerprint", None),
            StoredValue::ForceReinit { since_millis } => ("force_reinit", Some(*since_millis)),
            StoredValue::Corrupt(_) => ("corrupt", None),
        };
        Self {
            module,
            kind,
            since_millis,
            value: value.encode(),
        }
    }
}

/// Decoded bookkeeping entries, ordered by module id.
pub fn collect_entries(
    database: &GraphDatabase,
    config: &RuntimeConfig,
) -> Result<Vec<EntryReport>, TetherError> {
    let store = FingerprintStore::new(config.clone());
    read_only(database, |tx| {
        let Some(root) = store.locate_root(tx)? else {
            return Ok(Vec::new());
        };
        Ok(store
            .entries(tx, root)?
            .into_iter()
            .map(|(module, value)| EntryReport::new(module, &value))
            .collect())
    })
}

/// List module bookkeeping entries.
pub fn cmd_inspect(
    database: &GraphDatabase,
    config: &RuntimeConfig,
    json_mode: bool,
) -> Result<(), TetherError> {
    let entries = collect_entries(database, config)?;

    if json_mode {
        print_json(&entries);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No module bookkeeping.");
        return Ok(());
    }
    for entry in &entries {
        match entry.since_millis {
            Some(since) => println!("{:<24} {:<12} since {}", entry.module, entry.kind, since),
            None => println!("{:<24} {:<12} {}", entry.module, entry.kind, entry.value),
        }
    }

    Ok(())
}

// =============================================================================
// FORCE-REINIT COMMAND
// =============================================================================

/// Schedule `module` for reinitialization. Returns whether a new marker was
/// written; an existing marker keeps its original timestamp.
pub fn apply_force_reinit(
    database: &GraphDatabase,
    config: &RuntimeConfig,
    module: &str,
) -> Result<bool, TetherError> {
    let store = FingerprintStore::new(config.clone());
    database.in_transaction(|tx| store.mark_for_reinitialization(tx, module, now_millis()))
}

/// Schedule a module for reinitialization on the next start.
pub fn cmd_force_reinit(
    database: &GraphDatabase,
    config: &RuntimeConfig,
    module: &str,
    json_mode: bool,
) -> Result<(), TetherError> {
    let marked = apply_force_reinit(database, config, module)?;

    if json_mode {
        print_json(&serde_json::json!({ "module": module, "marked": marked }));
    } else if marked {
        println!("Module {} will reinitialize on the next start.", module);
    } else {
        println!("Module {} is already scheduled for reinitialization.", module);
    }

    Ok(())
}

// =============================================================================
// RESET COMMAND
// =============================================================================

/// Remove every module's bookkeeping by running a startup pass with an empty
/// registry and initialization disabled. Returns the pruned module ids.
pub fn apply_reset(
    database: &Arc<GraphDatabase>,
    config: &RuntimeConfig,
) -> Result<Vec<String>, TetherError> {
    let runtime = Runtime::new(Arc::clone(database), config.clone())?;
    let report = runtime.start_with(true)?;
    runtime.shutdown();
    Ok(report.map(|r| r.pruned).unwrap_or_default())
}

/// Remove the bookkeeping of every module.
pub fn cmd_reset(
    database: &Arc<GraphDatabase>,
    config: &RuntimeConfig,
    json_mode: bool,
) -> Result<(), TetherError> {
    let pruned = apply_reset(database, config)?;

    if json_mode {
        print_json(&serde_json::json!({ "pruned": pruned }));
        return Ok(());
    }

    if pruned.is_empty() {
        println!("Nothing to reset.");
    } else {
        println!("Removed bookkeeping of {} module(s):", pruned.len());
        for id in &pruned {
            println!("  {}", id);
        }
    }

    Ok(())
}

// =============================================================================
// WALK COMMAND
// =============================================================================

/// Random walk over business relationships from `start`.
pub fn collect_walk(
    database: &GraphDatabase,
    config: &RuntimeConfig,
    start: NodeId,
    steps: usize,
) -> Result<Vec<NodeId>, TetherError> {
    let selector =
        RandomRelationshipSelector::new(IncludeAllBusinessRelationships::new(config.clone()));
    read_only(database, |tx| {
        if tx.node(start)?.is_none() {
            return Err(TetherError::NodeNotFound(start));
        }
        selector.walk(tx, start, steps)
    })
}

/// Random walk from a node.
pub fn cmd_walk(
    database: &GraphDatabase,
    config: &RuntimeConfig,
    start: u64,
    steps: usize,
    json_mode: bool,
) -> Result<(), TetherError> {
    let path = collect_walk(database, config, NodeId(start), steps)?;

    if json_mode {
        let ids: Vec<u64> = path.iter().map(|n| n.0).collect();
        print_json(&serde_json::json!({ "start": start, "steps": steps, "path": ids }));
        return Ok(());
    }

    let rendered: Vec<String> = path.iter().map(ToString::to_string).collect();
    println!("{}", rendered.join(" -> "));
    if path.len() <= steps {
        println!("(stopped after {} step(s): no further relationship)", path.len() - 1);
    }

    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
