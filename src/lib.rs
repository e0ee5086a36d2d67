//! # edgenet-eval
//!
//! Evaluates a trained EdgeNet graph autoencoder on particle collision
//! events and produces reconstruction diagnostics.
//!
//! ## Pipeline
//!
//! - Load graph-structured events and split them into train/validation/test
//! - Restore trained model parameters from safetensors
//! - Reconstruct the test events batch by batch
//! - Histogram input vs. output for `px`, `py`, `pz`, `E`
//! - Report mean and percentile spread of the relative differences
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use edgenet_eval::{EvalConfig, Evaluator};
//!
//! let evaluator = Evaluator::new(EvalConfig::default())?;
//! let report = evaluator.gen_plots("EdgeNet_v1")?;
//! for summary in &report.summaries {
//!     println!("{:?}", summary);
//! }
//! ```

pub mod analysis;
pub mod config;
pub mod data;
pub mod debug;
pub mod inference;
pub mod models;
pub mod plotting;

// Re-exports for convenience
pub use config::EvalConfig;
pub use inference::{EvaluationReport, Evaluator};
pub use models::EdgeNet;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Events per inference batch
pub const DEFAULT_BATCH_SIZE: usize = 4;
