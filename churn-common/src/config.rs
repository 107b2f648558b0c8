//! Training configuration loading and config file resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable consulted when no config path is given on the command line
pub const CONFIG_ENV_VAR: &str = "CHURN_CONFIG";

/// Config file looked up in the working directory as the last resort
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Scoring metric used to rank cross-validation folds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    /// Fraction of correctly classified rows
    Accuracy,
    /// Mean of per-class recall
    BalancedAccuracy,
}

impl Scoring {
    pub fn name(&self) -> &'static str {
        match self {
            Scoring::Accuracy => "accuracy",
            Scoring::BalancedAccuracy => "balanced_accuracy",
        }
    }

    /// Human-readable metric name for reports
    pub fn label(&self) -> &'static str {
        match self {
            Scoring::Accuracy => "Accuracy",
            Scoring::BalancedAccuracy => "Balanced accuracy",
        }
    }
}

/// How rows are partitioned into cross-validation folds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CvStrategy {
    /// Per-class contiguous chunks, preserving class proportions per fold
    #[default]
    Stratified,
    /// Contiguous blocks in row order
    Sequential,
}

/// Training pipeline configuration
///
/// Loaded once at pipeline start; immutable thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainingConfig {
    /// Path of the training CSV
    pub csv_path: PathBuf,
    /// Apply synthetic minority oversampling before feature selection
    pub oversampling: bool,
    /// Metric used to score held-out folds
    pub scoring: Scoring,
    /// Maximum decision tree depth
    pub max_depth: usize,
    /// Number of features kept by ANOVA selection
    pub num_features_clf: usize,
    /// Seed threaded through the resampler, the fold splitter and the tree
    #[serde(default)]
    pub seed: u64,
    /// Destination of the model artifact
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    /// Number of cross-validation folds
    #[serde(default = "default_cv_folds")]
    pub cv_folds: usize,
    #[serde(default)]
    pub cv_strategy: CvStrategy,
    /// Neighbours considered when synthesizing minority rows
    #[serde(default = "default_k_neighbors")]
    pub k_neighbors: usize,
}

fn default_model_path() -> PathBuf {
    PathBuf::from("clf.json")
}

fn default_cv_folds() -> usize {
    5
}

fn default_k_neighbors() -> usize {
    5
}

impl TrainingConfig {
    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TrainingConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no pipeline stage can run with
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(Error::Config("max_depth must be a positive integer".to_string()));
        }
        if self.num_features_clf == 0 {
            return Err(Error::Config(
                "num_features_clf must be a positive integer".to_string(),
            ));
        }
        if self.cv_folds < 2 {
            return Err(Error::Config(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if self.oversampling && self.k_neighbors == 0 {
            return Err(Error::Config(
                "k_neighbors must be positive when oversampling is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

/// Config file resolution, in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. `config.toml` in the working directory (fallback)
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: working directory default
    PathBuf::from(DEFAULT_CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    const MINIMAL: &str = r#"
csv_path = "data/aug_train.csv"
oversampling = false
scoring = "accuracy"
max_depth = 5
num_features_clf = 4
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = TrainingConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.csv_path, PathBuf::from("data/aug_train.csv"));
        assert!(!config.oversampling);
        assert_eq!(config.scoring, Scoring::Accuracy);
        assert_eq!(config.max_depth, 5);
        assert_eq!(config.num_features_clf, 4);
        assert_eq!(config.seed, 0);
        assert_eq!(config.model_path, PathBuf::from("clf.json"));
        assert_eq!(config.cv_folds, 5);
        assert_eq!(config.cv_strategy, CvStrategy::Stratified);
        assert_eq!(config.k_neighbors, 5);
    }

    #[test]
    fn test_missing_required_key_is_config_error() {
        let content = MINIMAL.replace("max_depth = 5\n", "");
        let err = TrainingConfig::from_toml_str(&content).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("max_depth")));
    }

    #[test]
    fn test_unsupported_scoring_is_config_error() {
        let content = MINIMAL.replace("\"accuracy\"", "\"roc_auc\"");
        let err = TrainingConfig::from_toml_str(&content).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_zero_depth_rejected() {
        let content = MINIMAL.replace("max_depth = 5", "max_depth = 0");
        assert!(matches!(
            TrainingConfig::from_toml_str(&content),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_negative_feature_count_rejected() {
        let content = MINIMAL.replace("num_features_clf = 4", "num_features_clf = -4");
        assert!(matches!(
            TrainingConfig::from_toml_str(&content),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_single_fold_rejected() {
        let content = format!("{}cv_folds = 1\n", MINIMAL);
        assert!(matches!(
            TrainingConfig::from_toml_str(&content),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}seed = 42\ncv_strategy = \"sequential\"\n", MINIMAL).unwrap();

        let config = TrainingConfig::load(file.path()).unwrap();
        assert_eq!(config.seed, 42);
        assert_eq!(config.cv_strategy, CvStrategy::Sequential);
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = TrainingConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    #[serial]
    fn test_cli_argument_overrides_env() {
        std::env::set_var("CHURN_TEST_CONFIG_A", "/from/env.toml");
        let path = resolve_config_path(Some(Path::new("/from/cli.toml")), "CHURN_TEST_CONFIG_A");
        assert_eq!(path, PathBuf::from("/from/cli.toml"));
        std::env::remove_var("CHURN_TEST_CONFIG_A");
    }

    #[test]
    #[serial]
    fn test_env_fallback_then_default() {
        std::env::set_var("CHURN_TEST_CONFIG_B", "/from/env.toml");
        assert_eq!(
            resolve_config_path(None, "CHURN_TEST_CONFIG_B"),
            PathBuf::from("/from/env.toml")
        );
        std::env::remove_var("CHURN_TEST_CONFIG_B");
        assert_eq!(
            resolve_config_path(None, "CHURN_TEST_CONFIG_B"),
            PathBuf::from(DEFAULT_CONFIG_FILE)
        );
    }
}
