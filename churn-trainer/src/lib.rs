//! churn-trainer library
//!
//! Batch training of the churn classifier: reads the configured dataset,
//! runs every preparation stage, cross-validates and writes the model artifact.

pub mod pipeline;

pub use pipeline::{PipelineReport, TrainingPipeline};
