//! churn-api - employee churn inference service
//!
//! Loads the model artifact once and serves `POST /predict` and `GET /health`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use churn_api::{build_router, AppState};
use churn_common::TrainedModel;
use clap::Parser;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "churn-api", version, about = "Serve churn predictions over HTTP")]
struct Args {
    /// Model artifact written by churn-trainer
    #[arg(long, env = "CHURN_MODEL", default_value = "clf.json")]
    model: PathBuf,

    /// Listen address
    #[arg(long, env = "CHURN_BIND", default_value = "127.0.0.1:5000")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(
        "Starting churn-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let model = match TrainedModel::load(&args.model) {
        Ok(model) => model,
        Err(e) => {
            error!("Failed to load model {}: {}", args.model.display(), e);
            return Err(e.into());
        }
    };
    info!(
        "Model trained {} expects: {}",
        model.metadata().trained_at.to_rfc3339(),
        model.feature_names().join(", ")
    );

    let app = build_router(AppState::new(Arc::new(model)));

    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    info!("Listening on http://{}", args.bind);
    info!("Health check: http://{}/health", args.bind);

    axum::serve(listener, app).await?;

    Ok(())
}
