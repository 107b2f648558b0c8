//! # Churn Common Library
//!
//! Shared code for the churn trainer and the inference service:
//! - Error taxonomy and configuration loading
//! - Record model and CSV dataset loading
//! - Categorical normalization and one-hot feature encoding
//! - Minority oversampling and ANOVA feature selection
//! - Decision tree, cross-validated model selection and the model artifact
//! - Inference-time feature derivation

pub mod artifact;
pub mod balance;
pub mod config;
pub mod dataset;
pub mod encode;
pub mod error;
pub mod inference;
pub mod model_select;
pub mod normalize;
pub mod record;
pub mod select;
pub mod tree;

pub use artifact::TrainedModel;
pub use config::TrainingConfig;
pub use error::{Error, Result};
