//! Inference-time feature derivation
//!
//! Rebuilds the feature vector a [`TrainedModel`] expects from one raw,
//! flat JSON record. The required raw keys come from the artifact's bound
//! columns, so a retrained model with a different selected set needs no code
//! change here.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::encode::{ColumnSource, ColumnSpec};
use crate::normalize::{self, NOT_SPECIFIED};
use crate::record::{NominalField, OrdinalField};
use crate::{Error, Result, TrainedModel};

/// Columns kept by the default training configuration, in model order
pub const SERVING_FEATURES: [&str; 4] = [
    "city_development_index",
    "experience",
    "city_21",
    "company_type_not_specified",
];

/// Raw record to prediction, bound to one loaded model
#[derive(Debug, Clone)]
pub struct InferenceAdapter {
    model: Arc<TrainedModel>,
}

impl InferenceAdapter {
    pub fn new(model: Arc<TrainedModel>) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    /// Raw keys a request must carry, in first-use order
    pub fn required_keys(&self) -> Vec<&'static str> {
        let mut keys: Vec<&'static str> = Vec::new();
        for spec in self.model.features() {
            let key = raw_key(spec);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// Feature vector in the model's bound column order
    pub fn features(&self, input: &Map<String, Value>) -> Result<Vec<f64>> {
        self.model
            .features()
            .iter()
            .map(|spec| derive(spec, input))
            .collect()
    }

    /// Predicted class (0 stays, 1 leaves) of one raw record
    pub fn predict(&self, input: &Map<String, Value>) -> Result<u8> {
        let row = self.features(input)?;
        self.model.predict(&row)
    }
}

fn raw_key(spec: &ColumnSpec) -> &'static str {
    match &spec.source {
        ColumnSource::Ordinal { field } => field.column_name(),
        ColumnSource::Indicator { field, .. } => field.column_name(),
    }
}

fn derive(spec: &ColumnSpec, input: &Map<String, Value>) -> Result<f64> {
    let key = raw_key(spec);
    let value = input
        .get(key)
        .ok_or_else(|| Error::InputSchema(format!("missing required key '{}'", key)))?;

    match &spec.source {
        ColumnSource::Ordinal { field } => ordinal_value(*field, value),
        ColumnSource::Indicator { field, level } => {
            let observed = nominal_level(*field, value)?;
            Ok(if observed == *level { 1.0 } else { 0.0 })
        }
    }
}

fn ordinal_value(field: OrdinalField, value: &Value) -> Result<f64> {
    let key = field.column_name();
    let text = scalar_text(key, value)?;

    let code = match field {
        OrdinalField::CityDevelopmentIndex | OrdinalField::TrainingHours => {
            let raw = normalize::present(text.as_deref())
                .ok_or_else(|| Error::InputSchema(format!("'{}' must not be empty", key)))?;
            return raw
                .parse::<f64>()
                .map_err(|_| Error::InputSchema(format!("'{}' must be a number, got {:?}", key, raw)));
        }
        OrdinalField::Experience => normalize::experience(text.as_deref())?,
        OrdinalField::CompanySize => normalize::company_size(text.as_deref())?,
        OrdinalField::LastNewJob => normalize::last_new_job(text.as_deref())?,
        OrdinalField::EducationLevel => normalize::education_level(text.as_deref())?,
    };
    Ok(code as f64)
}

/// Normalized category level, `not_specified` for null or empty values
fn nominal_level(field: NominalField, value: &Value) -> Result<String> {
    let text = scalar_text(field.column_name(), value)?;
    let Some(raw) = normalize::present(text.as_deref()) else {
        return Ok(NOT_SPECIFIED.to_string());
    };
    match field {
        NominalField::City => Ok(normalize::city(raw)?.to_string()),
        _ => Ok(raw.to_string()),
    }
}

/// Text form of a JSON scalar; `None` for null
fn scalar_text(key: &str, value: &Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Some(i.to_string()))
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                        Ok(Some((f as i64).to_string()))
                    }
                    _ => Ok(Some(n.to_string())),
                }
            }
        }
        other => Err(Error::InputSchema(format!(
            "'{}' must be a string, number or null, got {}",
            key, other
        ))),
    }
}
