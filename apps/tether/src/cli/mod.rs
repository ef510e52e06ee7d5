//! # Tether CLI Module
//!
//! This module implements the CLI interface for Tether.
//!
//! ## Available Commands
//!
//! - `status` - Show the runtime root and store counters
//! - `inspect` - List every module bookkeeping entry
//! - `force-reinit` - Schedule a module for reinitialization
//! - `reset` - Remove all module bookkeeping
//! - `walk` - Random walk over business relationships

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tether_core::TetherError;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Tether - module runtime for an embedded graph store
///
/// Inspect and maintain the bookkeeping modules keep inside the store.
#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the graph database
    #[arg(short = 'D', long, global = true, default_value = "tether.redb")]
    pub database: PathBuf,

    /// Runtime configuration file (TOML)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the runtime root and store counters
    Status,

    /// List module bookkeeping entries
    Inspect,

    /// Schedule a module for reinitialization on the next start
    ForceReinit {
        /// Module id
        module: String,
    },

    /// Remove the bookkeeping of every module
    Reset,

    /// Random walk from a node
    Walk {
        /// Start node ID
        #[arg(short, long)]
        node: u64,

        /// Maximum number of steps
        #[arg(short, long, default_value = "10")]
        steps: usize,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), TetherError> {
    let config = load_config(cli.config.as_deref())?;
    if cli.verbose {
        tracing::info!(database = %cli.database.display(), namespace = %config.namespace, "opening store");
    }
    let database = open_database(&cli.database)?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Status) | None => cmd_status(&database, &config, &cli.database, json_mode),
        Some(Commands::Inspect) => cmd_inspect(&database, &config, json_mode),
        Some(Commands::ForceReinit { module }) => {
            cmd_force_reinit(&database, &config, &module, json_mode)
        }
        Some(Commands::Reset) => cmd_reset(&database, &config, json_mode),
        Some(Commands::Walk { node, steps }) => {
            cmd_walk(&database, &config, node, steps, json_mode)
        }
    }
}
