//! stackctl - CLI for the stackops control-plane front end.
//!
//! Plain CRUD over networks, routers, instances and keypairs, plus the two
//! orchestrated operations: floating-IP assignment and pool scaling.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;
mod error;
mod output;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    // Run the command
    if let Err(e) = cli.run().await {
        // Print error in a user-friendly way
        error::print_error(&e);
        std::process::exit(1);
    }

    Ok(())
}

/// Logs go to stderr so command output stays machine-readable.
/// Prefer RUST_LOG, fall back to STACKOPS_LOG_LEVEL.
fn init_tracing() {
    let level = std::env::var("STACKOPS_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string());
    let json = std::env::var("STACKOPS_LOG_JSON")
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();
}
