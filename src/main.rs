//! themedev - local theme and extension development sessions.

mod actor;
mod asset;
mod cli;
mod config;
mod core;
mod error;
mod logger;
mod proxy;
mod reload;
mod sync;
mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::DevConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = Arc::new(DevConfig::load(&cli)?);

    match &cli.command {
        Commands::Dev { .. } => run_dev(config),
    }
}

// =============================================================================
// Dev Command
// =============================================================================

/// Run one dev session to completion.
fn run_dev(config: Arc<DevConfig>) -> Result<()> {
    log!("dev"; "{} (theme {})", config.store.domain, config.store.theme_id);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    let result = runtime.block_on(actor::Coordinator::with_config(config).run());
    // Blocking reader threads may still sit in a read; do not wait on them
    runtime.shutdown_timeout(std::time::Duration::from_millis(500));
    result
}
