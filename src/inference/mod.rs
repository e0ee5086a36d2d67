//! Inference module for model evaluation
//!
//! - Evaluator: dataset split, model restore, test-set inference
//! - EvaluationReport: per-feature statistics and written figures

mod pipeline;

pub use pipeline::{EvaluationReport, Evaluator, InferenceOutput, Loaders};
