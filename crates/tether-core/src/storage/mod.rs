//! # Storage Module
//!
//! The embedded graph store the runtime lives in.
//!
//! - [`GraphDatabase`]: redb-backed store with labelled nodes, string
//!   properties, relationships and commit hooks
//! - [`Transaction`]: a single write transaction
//! - [`ChangeSet`]: pending changes handed to commit hooks

mod changes;
mod database;

pub use changes::ChangeSet;
pub use database::{CommitHook, GraphDatabase, HookHandle, Transaction};
