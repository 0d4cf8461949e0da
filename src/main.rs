//! activity-probe - evaluate the configured activity checks once.
//!
//! Prints the reason of every active check and exits with an error if the
//! checks could not be configured or a check failed severely.

use activity_probe::{Config, Host, execute_checks, set_up_checks};

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Check whether this host is currently in use.
#[derive(Parser, Debug)]
#[command(name = "activity-probe")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Evaluate all checks instead of stopping at the first active one.
    #[arg(long)]
    all: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("activity-probe v{} starting", env!("CARGO_PKG_VERSION"));

    let config =
        Config::load_or_default(args.config.as_deref()).context("Failed to load configuration")?;

    let mut checks =
        set_up_checks(&config, &Host::local()).context("Failed to set up activity checks")?;
    info!("{} checks configured", checks.len());

    let outcomes = execute_checks(&mut checks, args.all)
        .await
        .context("Activity checks failed")?;

    let mut active = false;
    for outcome in &outcomes {
        if let Some(reason) = outcome.evaluation.reason() {
            active = true;
            println!("{}: {}", outcome.name, reason);
        }
    }

    if !active {
        info!("No activity detected");
    }

    Ok(())
}

/// Initialize logging with the specified level.
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(format!("activity_probe={level}"))
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Invalid log level")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
