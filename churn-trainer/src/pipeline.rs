//! Training pipeline orchestration
//!
//! Stages run strictly in order, each consuming the previous stage's output:
//! load, normalize, encode, rebalance, select, cross-validate, persist.
//! The first failing stage aborts the run.

use std::path::{Path, PathBuf};

use chrono::Utc;
use churn_common::artifact::TrainingMetadata;
use churn_common::balance::ClassBalancer;
use churn_common::config::Scoring;
use churn_common::dataset;
use churn_common::encode::FeatureEncoder;
use churn_common::model_select::ModelSelector;
use churn_common::select::FeatureSelector;
use churn_common::{Result, TrainedModel, TrainingConfig};
use serde::Serialize;
use tracing::info;

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    /// Best fold score as a percentage, in the configured metric
    pub accuracy_percent: f64,
    pub scoring: Scoring,
    pub fold_scores: Vec<f64>,
    pub best_fold: usize,
    pub selected_features: Vec<String>,
    pub model_path: PathBuf,
    pub source_rows: usize,
    pub training_rows: usize,
}

/// One configured training run
#[derive(Debug, Clone)]
pub struct TrainingPipeline {
    config: TrainingConfig,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Load the config before touching any data
    pub fn from_config_file(path: &Path) -> Result<Self> {
        Ok(Self::new(TrainingConfig::load(path)?))
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Run every stage and persist the winning model
    pub fn run(&self) -> Result<PipelineReport> {
        let config = &self.config;

        info!("Stage 1/6: loading {}", config.csv_path.display());
        let raw = dataset::load_csv(&config.csv_path)?;

        info!("Stage 2/6: normalizing {} rows", raw.len());
        let employees = dataset::normalize_all(&raw)?;
        let source_rows = employees.len();

        info!("Stage 3/6: encoding categorical features");
        let (encoder, encoded) = FeatureEncoder::fit_transform(&employees)?;
        info!(
            "Encoded {} rows into {} columns",
            encoded.n_rows(),
            encoded.n_cols()
        );

        let balancer = ClassBalancer::new(config.oversampling, config.seed);
        let balanced = if balancer.is_enabled() {
            info!("Stage 4/6: oversampling the minority class");
            balancer
                .with_k_neighbors(config.k_neighbors)?
                .apply(encoded)?
        } else {
            info!(
                "Stage 4/6: oversampling disabled, class counts {:?}",
                encoded.class_counts()
            );
            encoded
        };
        let training_rows = balanced.n_rows();

        info!(
            "Stage 5/6: selecting {} features by ANOVA F-test",
            config.num_features_clf
        );
        let (selected, reduced) =
            FeatureSelector::new(config.num_features_clf).fit_transform(&balanced)?;

        info!(
            "Stage 6/6: {}-fold cross-validation, max depth {}, scoring {}",
            config.cv_folds,
            config.max_depth,
            config.scoring.name()
        );
        let selection = ModelSelector::from_config(config).select(&reduced)?;

        let metadata = TrainingMetadata {
            trained_at: Utc::now(),
            source_rows,
            training_rows,
            oversampling: config.oversampling,
            seed: config.seed,
            max_depth: config.max_depth,
        };
        let model = TrainedModel::new(
            selection.tree,
            selected.columns.clone(),
            encoder.vocabulary().clone(),
            selection.report,
            metadata,
        )?;
        model.save(&config.model_path)?;

        let report = model.report();
        let accuracy_percent = report.best_score * 100.0;

        let summary = PipelineReport {
            accuracy_percent,
            scoring: report.scoring,
            fold_scores: report.fold_scores.clone(),
            best_fold: report.best_fold,
            selected_features: selected.names().into_iter().map(String::from).collect(),
            model_path: config.model_path.clone(),
            source_rows,
            training_rows,
        };
        info!("{}", summary.headline());
        Ok(summary)
    }
}

impl PipelineReport {
    /// `<Metric> achieved: 97.25 %`
    pub fn headline(&self) -> String {
        format!(
            "{} achieved: {:.2} %",
            self.scoring.label(),
            self.accuracy_percent
        )
    }
}
