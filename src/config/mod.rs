//! Evaluation configuration
//!
//! Paths and run parameters for an evaluation pass. Defaults reproduce the
//! fixed layout of the analysis machine; a YAML file and CLI flags can
//! override any of them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::NormMode;
use crate::DEFAULT_BATCH_SIZE;

/// Suffix appended to a model name to form its parameter file name
pub const MODEL_FILE_SUFFIX: &str = ".best.safetensors";

/// Evaluation run configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EvalConfig {
    /// Dataset root (chunks live under `processed/`)
    pub data_root: PathBuf,
    /// Directory holding `<name>.best.safetensors` parameter files
    pub models_dir: PathBuf,
    /// Directory figures are written to
    pub output_dir: PathBuf,
    /// Events per batch
    pub batch_size: usize,
    /// Fraction of events assigned to each of validation and test
    pub tv_frac: f64,
    /// Seed for the split permutation and train shuffling
    pub seed: u64,
    /// Run on CUDA device 0 when available
    pub use_gpu: bool,
    /// Input batch norm statistics: `running` (stored) or `batch` (per batch)
    pub norm_mode: NormMode,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("/anomalyvol/data/gnn_node_global_merge"),
            models_dir: PathBuf::from("/anomalyvol/models/"),
            output_dir: PathBuf::from("figures"),
            batch_size: DEFAULT_BATCH_SIZE,
            tv_frac: 0.10,
            seed: 0,
            use_gpu: true,
            norm_mode: NormMode::Running,
        }
    }
}

impl EvalConfig {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {:?}", path))?;
        Self::from_yaml(&text).with_context(|| format!("Failed to parse config: {:?}", path))
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            anyhow::bail!("batch_size must be at least 1");
        }
        if !(0.0..=0.5).contains(&self.tv_frac) {
            anyhow::bail!("tv_frac must be within [0, 0.5], got {}", self.tv_frac);
        }
        Ok(())
    }

    /// Path of the parameter file for `model_name`
    pub fn model_path(&self, model_name: &str) -> PathBuf {
        self.models_dir.join(format!("{}{}", model_name, MODEL_FILE_SUFFIX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_config_default() {
        let config = EvalConfig::default();
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.seed, 0);
        assert!((config.tv_frac - 0.10).abs() < 1e-12);
        assert_eq!(config.output_dir, PathBuf::from("figures"));
    }

    #[test]
    fn test_model_path() {
        let config = EvalConfig::default();
        assert_eq!(
            config.model_path("EdgeNet_v1"),
            PathBuf::from("/anomalyvol/models/EdgeNet_v1.best.safetensors")
        );
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = EvalConfig::from_yaml("batch_size: 16\noutput_dir: plots\n").unwrap();
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.output_dir, PathBuf::from("plots"));
        assert_eq!(config.models_dir, EvalConfig::default().models_dir);
        assert!(config.use_gpu);
        assert_eq!(config.norm_mode, NormMode::Running);
    }

    #[test]
    fn test_norm_mode_from_yaml() {
        let config = EvalConfig::from_yaml("norm_mode: batch\n").unwrap();
        assert_eq!(config.norm_mode, NormMode::Batch);
        assert!(EvalConfig::from_yaml("norm_mode: train\n").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(EvalConfig::from_yaml("batch_size: 0\n").is_err());
        assert!(EvalConfig::from_yaml("tv_frac: 0.7\n").is_err());
    }
}
