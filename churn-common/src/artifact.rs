//! Persisted model artifact
//!
//! The fitted tree travels with the ordered list of columns it was trained
//! on and the frozen one-hot vocabulary, so an inference consumer can
//! rebuild the exact input vector without knowing the training pipeline.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::encode::{ColumnSpec, Vocabulary};
use crate::model_select::CrossValidationReport;
use crate::tree::DecisionTree;
use crate::{Error, Result};

/// Bumped whenever the serialized layout changes incompatibly
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// How the model was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub trained_at: DateTime<Utc>,
    /// Rows read from the dataset
    pub source_rows: usize,
    /// Rows after oversampling (equal to `source_rows` when disabled)
    pub training_rows: usize,
    pub oversampling: bool,
    pub seed: u64,
    pub max_depth: usize,
}

/// Immutable trained classifier bound to its feature columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    format_version: u32,
    tree: DecisionTree,
    features: Vec<ColumnSpec>,
    vocabulary: Vocabulary,
    report: CrossValidationReport,
    metadata: TrainingMetadata,
}

impl TrainedModel {
    pub fn new(
        tree: DecisionTree,
        features: Vec<ColumnSpec>,
        vocabulary: Vocabulary,
        report: CrossValidationReport,
        metadata: TrainingMetadata,
    ) -> Result<Self> {
        if tree.n_features() != features.len() {
            return Err(Error::Training(format!(
                "tree uses {} features but {} names were bound",
                tree.n_features(),
                features.len()
            )));
        }
        Ok(Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            tree,
            features,
            vocabulary,
            report,
            metadata,
        })
    }

    /// Bound columns, in the order `predict` expects them
    pub fn features(&self) -> &[ColumnSpec] {
        &self.features
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn report(&self) -> &CrossValidationReport {
        &self.report
    }

    pub fn metadata(&self) -> &TrainingMetadata {
        &self.metadata
    }

    pub fn tree(&self) -> &DecisionTree {
        &self.tree
    }

    /// Class of one feature vector laid out as [`TrainedModel::features`]
    pub fn predict(&self, row: &[f64]) -> Result<u8> {
        self.tree.predict_row(row)
    }

    /// Write the artifact atomically (temp file + rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| Error::ModelPersistence(format!("Serialize model failed: {}", e)))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ModelPersistence(format!("Create {} failed: {}", parent.display(), e))
            })?;
        }

        let temp_path = temp_path_for(path);
        std::fs::write(&temp_path, json).map_err(|e| {
            Error::ModelPersistence(format!("Write {} failed: {}", temp_path.display(), e))
        })?;
        if let Err(e) = std::fs::rename(&temp_path, path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(Error::ModelPersistence(format!(
                "Rename to {} failed: {}",
                path.display(),
                e
            )));
        }

        info!("Model written to {}", path.display());
        Ok(())
    }

    /// Read an artifact written by [`TrainedModel::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            Error::ModelPersistence(format!("Read {} failed: {}", path.display(), e))
        })?;
        let model: TrainedModel = serde_json::from_slice(&bytes)
            .map_err(|e| Error::ModelPersistence(format!("Decode model failed: {}", e)))?;

        if model.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(Error::ModelPersistence(format!(
                "artifact format {} is not supported (expected {})",
                model.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        if model.tree.n_features() != model.features.len() {
            return Err(Error::ModelPersistence(format!(
                "artifact binds {} features to a tree using {}",
                model.features.len(),
                model.tree.n_features()
            )));
        }
        model.tree.check_structure()?;

        info!(
            "Loaded model from {} ({} features: {})",
            path.display(),
            model.features.len(),
            model.feature_names().join(", ")
        );
        Ok(model)
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "model".into());
    name.push(".tmp");
    path.with_file_name(name)
}
