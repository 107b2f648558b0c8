//! Prediction endpoint
//!
//! `POST /predict` takes one raw employee record as a flat JSON object and
//! answers `{"prediction": 0|1}` (1 = likely to leave).

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{ApiResult, AppState};

/// Prediction response
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PredictResponse {
    pub prediction: u8,
}

/// POST /predict
pub async fn predict(
    State(state): State<AppState>,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> ApiResult<Json<PredictResponse>> {
    let Json(record) = body?;
    let prediction = state.adapter.predict(&record)?;

    let enrollee_id = record.get("enrollee_id").unwrap_or(&Value::Null);
    debug!("Predicted {} for enrollee {}", prediction, enrollee_id);
    Ok(Json(PredictResponse { prediction }))
}

/// Build prediction routes
pub fn predict_routes() -> Router<AppState> {
    Router::new().route("/predict", post(predict))
}
