//! churn-api library - employee churn inference service
//!
//! Serves predictions from a model artifact produced by churn-trainer.
//! The model is loaded once at startup and shared read-only by every request.

use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use churn_common::inference::InferenceAdapter;
use churn_common::TrainedModel;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Feature derivation bound to the loaded model
    pub adapter: Arc<InferenceAdapter>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Create new application state
    pub fn new(model: Arc<TrainedModel>) -> Self {
        Self {
            adapter: Arc::new(InferenceAdapter::new(model)),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::predict_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
