//! # Tether - Operator CLI
//!
//! The command-line front end of the Tether module runtime.
//!
//! ## Usage
//!
//! ```bash
//! # Show the runtime root and its bookkeeping
//! tether status
//! tether inspect --json-mode
//!
//! # Force a module to rebuild on the next start
//! tether force-reinit audit
//!
//! # Drop all bookkeeping without initializing anything
//! tether reset
//!
//! # Explore a store
//! tether walk --node 3 --steps 10
//! ```

use clap::Parser;
use tether::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // TETHER_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("TETHER_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tether=info,tether_core=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
