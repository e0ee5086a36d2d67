//! Debug utilities
//!
//! - Parameter file name coverage before restoring a model

mod weight_diagnostics;

pub use weight_diagnostics::{tensor_names, ParameterReport, WeightDiagnostics};
