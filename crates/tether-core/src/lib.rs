//! # tether-core
//!
//! An extension runtime embedded in a redb-backed graph store.
//!
//! Independently developed modules attach behavior to every write
//! transaction. Each module's configuration fingerprint is kept inside the
//! store itself, so restarts, upgrades and configuration changes are
//! detected and reconciled automatically on the next start.
//!
//! ## Lifecycle
//!
//! - Modules register with a [`Runtime`] before it starts
//! - `start` runs one atomic pass deciding, per module, between initialize,
//!   reinitialize and leave untouched, and removes stale bookkeeping
//! - Every later commit is dispatched to the started modules
//! - A module reporting `NeedsInitialization` is marked through the
//!   [`writer`] and rebuilt on the next start
//!
//! ## Architectural Constraints
//!
//! - No async, no network dependencies (pure Rust)
//! - Persisted bookkeeping is ordered (`BTreeMap`/`BTreeSet`), never hashed
//! - A commit hook never opens a write transaction on its own thread

// =============================================================================
// MODULES
// =============================================================================

pub mod config;
pub mod monitor;
pub mod primitives;
pub mod runtime;
pub mod storage;
pub mod types;
pub mod walk;
pub mod writer;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{Node, NodeId, Relationship, RelationshipId, TetherError};

// =============================================================================
// RE-EXPORTS: Runtime
// =============================================================================

pub use config::{HookFailurePolicy, RuntimeConfig};
pub use runtime::{
    FingerprintStore, HookError, InclusionPolicy, Module, ModuleConfiguration, ModuleDecision,
    ModuleRegistry, ReinitReason, Runtime, RuntimeConfigured, RuntimeState, StartupReport,
    StoredValue, TransactionHookDispatcher,
};
pub use storage::{ChangeSet, CommitHook, GraphDatabase, HookHandle, Transaction};
pub use writer::{DatabaseWriter, SingleThreadedWriter, WriteRequest, WriteTask};

// =============================================================================
// RE-EXPORTS: Utilities
// =============================================================================

pub use monitor::{
    DatabaseLoadMonitor, RunningWindowAverage, StartedTxLoadMonitor, SystemTimeSource, TimeSource,
};
pub use walk::{
    IncludeAllBusinessRelationships, IncludeRelationshipTypes, RandomRelationshipSelector,
    RelationshipInclusion, RelationshipSelector, ReservoirSampler,
};
