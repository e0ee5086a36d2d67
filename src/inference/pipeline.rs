//! Evaluation pipeline
//!
//! Orchestrates one evaluation pass:
//! 1. Load the dataset and split it into train/validation/test loaders
//! 2. Restore the model parameters
//! 3. Run inference over the test batches
//! 4. Collect per-feature input, output and relative-difference columns
//! 5. Write histograms and summarize the relative differences

use anyhow::{Context, Result};
use candle_core::Device;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::analysis::{Feature, FeatureArrays, FeatureColumns, FeatureSummary};
use crate::config::EvalConfig;
use crate::data::{random_split, DataLoader, GraphDataset};
use crate::models::{EdgeNet, EdgeNetConfig};
use crate::plotting::{FeaturePlots, FigureWriter};

/// Partition loaders and their sizes
pub struct Loaders<'a> {
    pub train: DataLoader<'a>,
    pub valid: DataLoader<'a>,
    pub test: DataLoader<'a>,
    pub train_samples: usize,
    pub valid_samples: usize,
    pub test_samples: usize,
}

/// Node features in and out of the model, one row-major (n, 4) matrix per batch
#[derive(Debug, Clone, Default)]
pub struct InferenceOutput {
    pub inputs: Vec<Vec<f32>>,
    pub outputs: Vec<Vec<f32>>,
}

impl InferenceOutput {
    pub fn num_batches(&self) -> usize {
        self.inputs.len()
    }

    /// Per-feature columns, concatenated over batches
    pub fn feature_arrays(&self) -> Result<Vec<FeatureArrays>> {
        Feature::ALL
            .iter()
            .map(|&feature| {
                let mut columns = FeatureColumns::new(feature);
                for (output, input) in self.outputs.iter().zip(&self.inputs) {
                    columns.append(output, input)?;
                }
                Ok(columns.concat())
            })
            .collect()
    }
}

/// Result of an evaluation pass
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub model_name: String,
    pub test_samples: usize,
    pub summaries: Vec<FeatureSummary>,
    pub plots: Vec<FeaturePlots>,
}

/// Evaluates trained EdgeNet models on the test partition
pub struct Evaluator {
    device: Device,
    config: EvalConfig,
}

impl Evaluator {
    /// Create an evaluator, selecting the device from the config
    pub fn new(config: EvalConfig) -> Result<Self> {
        config.validate()?;
        let device = if config.use_gpu {
            Device::cuda_if_available(0)?
        } else {
            Device::Cpu
        };
        debug!("Using device {:?}", device);
        Ok(Self { device, config })
    }

    /// Restore `<models_dir>/<model_name>.best.safetensors`
    ///
    /// The outermost error message is `Model not found at: <path>`.
    pub fn get_model(&self, model_name: &str) -> Result<EdgeNet> {
        let path = self.config.model_path(model_name);
        let model_config = EdgeNetConfig {
            norm_mode: self.config.norm_mode,
            ..Default::default()
        };
        let model = EdgeNet::load(&path, model_config, &self.device)
            .with_context(|| format!("Model not found at: {}", path.display()))?;
        info!("Loaded model {} from {:?}", model_name, path);
        Ok(model)
    }

    /// Read the dataset from the configured root
    pub fn load_dataset(&self) -> Result<GraphDataset> {
        GraphDataset::open(&self.config.data_root)
    }

    /// Split `dataset` and build the three loaders
    ///
    /// Only the train loader shuffles.
    pub fn get_data<'a>(&self, dataset: &'a GraphDataset) -> Result<Loaders<'a>> {
        let split = random_split(dataset.len(), self.config.tv_frac, self.config.seed)?;
        let batch_size = self.config.batch_size;

        let loaders = Loaders {
            train_samples: split.train.len(),
            valid_samples: split.valid.len(),
            test_samples: split.test.len(),
            train: DataLoader::new(dataset, split.train, batch_size)?.shuffled(self.config.seed),
            valid: DataLoader::new(dataset, split.valid, batch_size)?,
            test: DataLoader::new(dataset, split.test, batch_size)?,
        };
        info!(
            "Split {} events: {} train / {} valid / {} test",
            dataset.len(),
            loaders.train_samples,
            loaders.valid_samples,
            loaders.test_samples
        );
        Ok(loaders)
    }

    /// Run the model over every batch of `loader`
    pub fn run_inference(
        &self,
        model: &EdgeNet,
        loader: &mut DataLoader,
    ) -> Result<InferenceOutput> {
        let pb = ProgressBar::new(loader.num_batches() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} batches ({eta})")?
                .progress_chars("=> "),
        );

        let mut result = InferenceOutput::default();
        for batch in loader.iter() {
            let output: Vec<f32> = model
                .forward(&batch)?
                .to_device(&Device::Cpu)?
                .flatten_all()?
                .to_vec1()?;
            if output.len() != batch.x.len() {
                anyhow::bail!(
                    "Model returned {} values for {} input values",
                    output.len(),
                    batch.x.len()
                );
            }
            result.inputs.push(batch.x);
            result.outputs.push(output);
            pb.inc(1);
        }
        pb.finish_and_clear();

        debug!("Ran inference over {} batches", result.num_batches());
        Ok(result)
    }

    /// Evaluate an already restored model on the test partition
    pub fn evaluate(&self, model: &EdgeNet, model_name: &str) -> Result<EvaluationReport> {
        let dataset = self.load_dataset()?;
        let mut loaders = self.get_data(&dataset)?;
        let inference = self.run_inference(model, &mut loaders.test)?;

        let writer = FigureWriter::new(&self.config.output_dir, model_name);
        let mut summaries = Vec::with_capacity(Feature::ALL.len());
        let mut plots = Vec::with_capacity(Feature::ALL.len());

        for arrays in inference.feature_arrays()? {
            if arrays.dropped > 0 {
                warn!(
                    "{}: dropped {} non-finite relative difference(s)",
                    arrays.feature, arrays.dropped
                );
            }
            plots.push(writer.write_feature(&arrays)?);
            summaries.push(FeatureSummary::from_diff(arrays.feature, &arrays.diff));
        }
        info!("Wrote {} figures to {:?}", plots.len() * 2, self.config.output_dir);

        Ok(EvaluationReport {
            model_name: model_name.to_string(),
            test_samples: loaders.test_samples,
            summaries,
            plots,
        })
    }

    /// Restore `model_name` and evaluate it
    pub fn gen_plots(&self, model_name: &str) -> Result<EvaluationReport> {
        let model = self.get_model(model_name)?;
        self.evaluate(&model, model_name)
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::GraphEvent;
    use crate::models::NormMode;

    fn cpu_config() -> EvalConfig {
        EvalConfig {
            use_gpu: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_feature_arrays_from_batches() {
        let output = InferenceOutput {
            inputs: vec![vec![1.0, 2.0, 4.0, 8.0], vec![2.0, 0.0, 1.0, 1.0, 3.0, 3.0, 3.0, 3.0]],
            outputs: vec![vec![2.0, 2.0, 2.0, 8.0], vec![2.0, 1.0, 1.0, 2.0, 3.0, 3.0, 6.0, 3.0]],
        };
        let arrays = output.feature_arrays().unwrap();
        assert_eq!(arrays.len(), 4);

        assert_eq!(arrays[0].feature, Feature::Px);
        assert_eq!(arrays[0].input, vec![1.0, 2.0, 3.0]);
        assert_eq!(arrays[0].diff, vec![1.0, 0.0, 0.0]);
        // py has a zero input in batch two
        assert_eq!(arrays[1].dropped, 1);
        assert_eq!(arrays[2].diff, vec![-0.5, 0.0, 1.0]);
        assert_eq!(arrays[3].output, vec![8.0, 2.0, 3.0]);
    }

    #[test]
    fn test_get_model_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = EvalConfig {
            models_dir: dir.path().to_path_buf(),
            ..cpu_config()
        };
        let evaluator = Evaluator::new(config).unwrap();
        let err = evaluator.get_model("nope").err().unwrap();
        assert!(err.to_string().starts_with("Model not found at: "));
        assert!(err.to_string().ends_with("nope.best.safetensors"));
    }

    #[test]
    fn test_get_model_uses_configured_norm_mode() {
        let dir = tempfile::tempdir().unwrap();
        let config = EvalConfig {
            models_dir: dir.path().to_path_buf(),
            norm_mode: NormMode::Batch,
            ..cpu_config()
        };
        let varmap = candle_nn::VarMap::new();
        let vb = candle_nn::VarBuilder::from_varmap(&varmap, candle_core::DType::F32, &Device::Cpu);
        EdgeNet::new(EdgeNetConfig::default(), vb).unwrap();
        varmap.save(config.model_path("bn")).unwrap();

        let evaluator = Evaluator::new(config).unwrap();
        let model = evaluator.get_model("bn").unwrap();
        assert_eq!(model.config().norm_mode, NormMode::Batch);
    }

    #[test]
    fn test_run_inference_collects_every_batch() {
        let dataset = GraphDataset::from_events(
            (0..7)
                .map(|i| GraphEvent::fully_connected(vec![i as f32 + 1.0; 12], 3).unwrap())
                .collect(),
        );
        let evaluator = Evaluator::new(cpu_config()).unwrap();
        let model = EdgeNet::new_random(&Device::Cpu).unwrap();
        let mut loader = DataLoader::new(&dataset, (0..7).collect(), 3).unwrap();

        let out = evaluator.run_inference(&model, &mut loader).unwrap();
        assert_eq!(out.num_batches(), 3);
        assert_eq!(out.inputs[0].len(), 3 * 3 * 4);
        assert_eq!(out.inputs[2].len(), 3 * 4);
        for (i, o) in out.inputs.iter().zip(&out.outputs) {
            assert_eq!(i.len(), o.len());
        }
    }

    #[test]
    fn test_get_data_sizes() {
        let dataset = GraphDataset::from_events(
            (0..20)
                .map(|_| GraphEvent::fully_connected(vec![1.0; 8], 2).unwrap())
                .collect(),
        );
        let evaluator = Evaluator::new(cpu_config()).unwrap();
        let loaders = evaluator.get_data(&dataset).unwrap();
        assert_eq!(loaders.train_samples, 16);
        assert_eq!(loaders.valid_samples, 2);
        assert_eq!(loaders.test_samples, 2);
        assert_eq!(loaders.test.num_batches(), 1);
        assert_eq!(loaders.train.num_batches(), 4);
        assert_eq!(loaders.valid.len(), 2);
    }
}
