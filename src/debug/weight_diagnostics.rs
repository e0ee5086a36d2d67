//! Parameter file diagnostics
//!
//! Exported state dicts drift: renamed layers, a converter that drops the
//! batch-norm buffers, extra bookkeeping tensors. Before restoring a model
//! this compares the tensor names in the file against the names the model
//! reads, so a mismatch is reported by name instead of as a shape error.

use anyhow::{Context, Result};
use candle_core::safetensors::MmapedSafetensors;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Name coverage of one component's parameter file
#[derive(Debug, Clone)]
pub struct ParameterReport {
    /// Component name (e.g., "EdgeNet")
    pub component_name: String,
    /// Path of the parameter file
    pub file_path: String,
    /// Every tensor name present in the file
    pub available_keys: Vec<String>,
    /// Names the component reads
    pub expected_keys: HashSet<String>,
    pub found_keys: HashSet<String>,
    pub missing_keys: HashSet<String>,
    /// Present but never read (e.g., `num_batches_tracked`)
    pub extra_keys: HashSet<String>,
}

impl ParameterReport {
    /// Compare available against expected names
    pub fn new(
        component_name: &str,
        file_path: &str,
        available_keys: Vec<String>,
        expected_keys: HashSet<String>,
    ) -> Self {
        let available: HashSet<String> = available_keys.iter().cloned().collect();
        let found_keys = expected_keys.intersection(&available).cloned().collect();
        let missing_keys = expected_keys.difference(&available).cloned().collect();
        let extra_keys = available.difference(&expected_keys).cloned().collect();

        Self {
            component_name: component_name.to_string(),
            file_path: file_path.to_string(),
            available_keys,
            expected_keys,
            found_keys,
            missing_keys,
            extra_keys,
        }
    }

    /// Fraction of expected tensors present in the file
    pub fn success_rate(&self) -> f32 {
        if self.expected_keys.is_empty() {
            return 1.0;
        }
        self.found_keys.len() as f32 / self.expected_keys.len() as f32
    }

    pub fn is_complete(&self) -> bool {
        self.missing_keys.is_empty()
    }

    /// Missing names, sorted for stable output
    pub fn sorted_missing(&self) -> Vec<&str> {
        sorted(&self.missing_keys)
    }

    /// Unused names, sorted for stable output
    pub fn sorted_extra(&self) -> Vec<&str> {
        sorted(&self.extra_keys)
    }

    fn log(&self, verbose: bool) {
        if self.is_complete() {
            debug!(
                "{}: {}/{} parameters present in {}",
                self.component_name,
                self.found_keys.len(),
                self.expected_keys.len(),
                self.file_path
            );
        } else {
            warn!(
                "{}: {} of {} parameters missing from {}: {:?}",
                self.component_name,
                self.missing_keys.len(),
                self.expected_keys.len(),
                self.file_path,
                self.sorted_missing()
            );
        }
        if !self.extra_keys.is_empty() {
            debug!("{}: unused tensors {:?}", self.component_name, self.sorted_extra());
        }
        if verbose {
            debug!("{}: found tensors {:?}", self.component_name, sorted(&self.found_keys));
        }
    }
}

fn sorted(keys: &HashSet<String>) -> Vec<&str> {
    let mut names: Vec<&str> = keys.iter().map(String::as_str).collect();
    names.sort_unstable();
    names
}

/// Tensor names of a memory-mapped parameter file, sorted
pub fn tensor_names(params: &MmapedSafetensors) -> Vec<String> {
    let mut names: Vec<String> = params.tensors().into_iter().map(|(name, _)| name).collect();
    names.sort_unstable();
    names
}

/// Collects parameter reports across components
pub struct WeightDiagnostics {
    verbose: bool,
    reports: Vec<ParameterReport>,
}

impl WeightDiagnostics {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            reports: Vec::new(),
        }
    }

    /// Read the tensor names of a safetensors file and record them
    pub fn inspect<P: AsRef<Path>>(
        &mut self,
        component_name: &str,
        path: P,
        expected_keys: HashSet<String>,
    ) -> Result<&ParameterReport> {
        let path = path.as_ref();
        let params = unsafe { MmapedSafetensors::new(path) }
            .with_context(|| format!("Failed to read parameter file: {:?}", path))?;

        Ok(self.record(
            component_name,
            &path.display().to_string(),
            tensor_names(&params),
            expected_keys,
        ))
    }

    /// Record a comparison made elsewhere
    pub fn record(
        &mut self,
        component_name: &str,
        file_path: &str,
        available_keys: Vec<String>,
        expected_keys: HashSet<String>,
    ) -> &ParameterReport {
        let report = ParameterReport::new(component_name, file_path, available_keys, expected_keys);
        report.log(self.verbose);
        self.reports.push(report);
        &self.reports[self.reports.len() - 1]
    }

    /// Log one line per recorded component
    pub fn log_final_summary(&self) {
        for report in &self.reports {
            let status = if report.is_complete() { "OK" } else { "MISSING" };
            info!(
                "[{}] {}: {:.0}% of parameters present ({}/{})",
                status,
                report.component_name,
                report.success_rate() * 100.0,
                report.found_keys.len(),
                report.expected_keys.len()
            );
        }
    }

    pub fn reports(&self) -> &[ParameterReport] {
        &self.reports
    }

    /// True when no component is missing a tensor
    pub fn all_loaded(&self) -> bool {
        self.reports.iter().all(ParameterReport::is_complete)
    }

    pub fn total_missing(&self) -> usize {
        self.reports.iter().map(|r| r.missing_keys.len()).sum()
    }
}
