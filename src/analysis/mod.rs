//! Reconstruction analysis
//!
//! - Feature table (column, labels, bin edges)
//! - Per-feature input/output/relative-difference columns
//! - Mean and percentile-based spread
//! - Fixed-edge histograms

mod columns;
mod features;
mod histogram;
mod stats;

pub use columns::{column, concat, relative_difference, FeatureArrays, FeatureColumns};
pub use features::Feature;
pub use histogram::{linspace, Histogram};
pub use stats::{
    finite_only, iqr_spread, mean, percentile, FeatureSummary, SPREAD_HIGH_PERCENTILE,
    SPREAD_LOW_PERCENTILE,
};
