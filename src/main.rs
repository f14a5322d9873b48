//! Salesforge: sales analytics CLI
//!
//! This is the main entrypoint that orchestrates data loading, cleaning,
//! metric computation and report rendering.

use anyhow::{Context, Result};
use clap::Parser;
use salesforge::{insights, pipeline, Args};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    init_logging(args.log_level());

    let config = args.to_config();
    let start_time = Instant::now();

    info!("Input file: {}", config.input.display());
    info!("Output directory: {}", config.output_dir.display());

    let outcome = pipeline::run(&config)
        .with_context(|| format!("analysis of {} failed", config.input.display()))?;

    if !args.quiet {
        println!("{}", insights::summary(&outcome.reports, &outcome.cleaning));
        println!("Reports written:");
        for path in &outcome.artifacts {
            println!("  {}", path.display());
        }
    }

    info!(
        "Pipeline complete in {:.2}s",
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}

/// `RUST_LOG` wins over the level implied by --verbose / --quiet
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
