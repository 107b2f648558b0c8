//! churn-trainer - offline training of the churn classifier
//!
//! Config file resolution: `--config` argument, then `CHURN_CONFIG`, then
//! `config.toml` in the working directory.

use std::path::PathBuf;

use anyhow::Result;
use churn_common::config::{resolve_config_path, CONFIG_ENV_VAR};
use churn_trainer::TrainingPipeline;
use clap::Parser;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "churn-trainer", version, about = "Train the employee churn classifier")]
struct Args {
    /// Path of the TOML training config
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(
        "Starting churn-trainer v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR);
    let pipeline = TrainingPipeline::from_config_file(&config_path).map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    let report = pipeline.run().map_err(|e| {
        error!("Training failed: {}", e);
        e
    })?;

    info!(
        "Trained on {} rows ({} after oversampling), features: {}",
        report.source_rows,
        report.training_rows,
        report.selected_features.join(", ")
    );
    Ok(())
}
