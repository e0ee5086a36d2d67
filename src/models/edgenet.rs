//! EdgeNet graph autoencoder (inference only)
//!
//! Architecture:
//! - Batch normalization of the raw node features, from the stored running
//!   statistics or from the statistics of each batch (see [`NormMode`])
//! - Encoder EdgeConv: 2*4 -> 32 -> 32 -> 2, ReLU after every layer
//! - Decoder EdgeConv: 2*2 -> 32 -> 32 -> 4, no activation on the output
//!
//! EdgeConv computes, for each node i, the mean over incoming edges (j -> i)
//! of `h(x_i || x_j - x_i)`.

use anyhow::{Context, Result};
use candle_core::safetensors::MmapedSafetensors;
use candle_core::{DType, Device, Tensor};
use candle_nn::{Init, Linear, Module, VarBuilder, VarMap};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use crate::data::GraphBatch;
use crate::debug::{tensor_names, WeightDiagnostics};

/// Statistics the input batch norm normalizes with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum NormMode {
    /// Stored `running_mean` / `running_var`; outputs do not depend on batch peers
    #[default]
    Running,
    /// Mean and biased variance over the nodes of the current batch, as a
    /// module left in training mode computes them
    Batch,
}

/// EdgeNet dimensions
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeNetConfig {
    /// Node feature width
    pub input_dim: usize,
    /// Width of the hidden MLP layers
    pub big_dim: usize,
    /// Latent width per node
    pub hidden_dim: usize,
    /// Batch norm epsilon
    pub eps: f64,
    pub norm_mode: NormMode,
}

impl Default for EdgeNetConfig {
    fn default() -> Self {
        Self {
            input_dim: 4,
            big_dim: 32,
            hidden_dim: 2,
            eps: 1e-5,
            norm_mode: NormMode::Running,
        }
    }
}

/// BatchNorm1d for inference; statistics are never updated
struct BatchNorm {
    weight: Tensor,
    bias: Tensor,
    running_mean: Tensor,
    running_var: Tensor,
    eps: f64,
    mode: NormMode,
}

impl BatchNorm {
    fn new(dim: usize, eps: f64, mode: NormMode, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            weight: vb.get_with_hints(dim, "weight", Init::Const(1.0))?,
            bias: vb.get_with_hints(dim, "bias", Init::Const(0.0))?,
            running_mean: vb.get_with_hints(dim, "running_mean", Init::Const(0.0))?,
            running_var: vb.get_with_hints(dim, "running_var", Init::Const(1.0))?,
            eps,
            mode,
        })
    }

    /// Input: (num_nodes, dim)
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (mean, var) = match self.mode {
            NormMode::Running => (self.running_mean.clone(), self.running_var.clone()),
            NormMode::Batch => {
                let mean = x.mean(0)?;
                let var = x.broadcast_sub(&mean)?.sqr()?.mean(0)?;
                (mean, var)
            }
        };
        let std = (var + self.eps)?.sqrt()?;
        let x = x.broadcast_sub(&mean)?.broadcast_div(&std)?;
        x.broadcast_mul(&self.weight)?
            .broadcast_add(&self.bias)
            .map_err(Into::into)
    }
}

/// Linear stack with ReLU between layers
///
/// Parameter names follow a torch `Sequential` with interleaved ReLUs,
/// so linear layers sit at indices 0, 2, 4.
struct Mlp {
    layers: Vec<Linear>,
    final_relu: bool,
}

impl Mlp {
    fn new(dims: &[usize], final_relu: bool, vb: VarBuilder) -> Result<Self> {
        let layers = dims
            .windows(2)
            .enumerate()
            .map(|(i, w)| candle_nn::linear(w[0], w[1], vb.pp((2 * i).to_string())))
            .collect::<candle_core::Result<Vec<_>>>()?;
        Ok(Self { layers, final_relu })
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let last = self.layers.len() - 1;
        let mut x = x.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.forward(&x)?;
            if i < last || self.final_relu {
                x = x.relu()?;
            }
        }
        Ok(x)
    }
}

/// Edge convolution with mean aggregation
struct EdgeConv {
    nn: Mlp,
    out_dim: usize,
}

impl EdgeConv {
    fn new(
        in_dim: usize,
        big_dim: usize,
        out_dim: usize,
        final_relu: bool,
        vb: VarBuilder,
    ) -> Result<Self> {
        let dims = [2 * in_dim, big_dim, big_dim, out_dim];
        let nn = Mlp::new(&dims, final_relu, vb.pp("nn"))?;
        Ok(Self { nn, out_dim })
    }

    /// # Arguments
    /// * `x` - Node features (num_nodes, in_dim)
    /// * `sources` / `targets` - Edge endpoints (num_edges,), u32
    /// * `degree` - Incoming edge count per node, at least 1, (num_nodes, 1)
    fn forward(
        &self,
        x: &Tensor,
        sources: &Tensor,
        targets: &Tensor,
        degree: &Tensor,
    ) -> Result<Tensor> {
        let num_nodes = x.dim(0)?;
        let aggregated = Tensor::zeros((num_nodes, self.out_dim), x.dtype(), x.device())?;
        if sources.dim(0)? == 0 {
            return Ok(aggregated);
        }

        let x_i = x.index_select(targets, 0)?;
        let x_j = x.index_select(sources, 0)?;
        let messages = Tensor::cat(&[&x_i, &(&x_j - &x_i)?], 1)?;
        let messages = self.nn.forward(&messages)?;

        aggregated
            .index_add(targets, &messages, 0)?
            .broadcast_div(degree)
            .map_err(Into::into)
    }
}

/// EdgeNet autoencoder
pub struct EdgeNet {
    device: Device,
    config: EdgeNetConfig,
    batchnorm: BatchNorm,
    encoder: EdgeConv,
    decoder: EdgeConv,
}

impl EdgeNet {
    /// Build from a variable builder (`batchnorm.*`, `encoder.nn.*`, `decoder.nn.*`)
    pub fn new(config: EdgeNetConfig, vb: VarBuilder) -> Result<Self> {
        let batchnorm = BatchNorm::new(
            config.input_dim,
            config.eps,
            config.norm_mode,
            vb.pp("batchnorm"),
        )?;
        let encoder = EdgeConv::new(
            config.input_dim,
            config.big_dim,
            config.hidden_dim,
            true,
            vb.pp("encoder"),
        )?;
        let decoder = EdgeConv::new(
            config.hidden_dim,
            config.big_dim,
            config.input_dim,
            false,
            vb.pp("decoder"),
        )?;

        Ok(Self {
            device: vb.device().clone(),
            config,
            batchnorm,
            encoder,
            decoder,
        })
    }

    /// Randomly initialized model, for runs without trained parameters
    pub fn new_random(device: &Device) -> Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        Self::new(EdgeNetConfig::default(), vb)
    }

    /// Load trained parameters from a safetensors file
    ///
    /// Fails if the file is absent or lacks any expected tensor.
    pub fn load<P: AsRef<Path>>(path: P, config: EdgeNetConfig, device: &Device) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Parameter file does not exist: {:?}", path);
        }

        let params = unsafe { MmapedSafetensors::new(path) }
            .with_context(|| format!("Failed to read parameter file: {:?}", path))?;

        let mut diagnostics = WeightDiagnostics::new(false);
        diagnostics.record(
            "EdgeNet",
            &path.display().to_string(),
            tensor_names(&params),
            Self::parameter_names(),
        );
        diagnostics.log_final_summary();
        if !diagnostics.all_loaded() {
            anyhow::bail!(
                "{} parameter tensor(s) missing from {:?}",
                diagnostics.total_missing(),
                path
            );
        }

        let vb = VarBuilder::from_backend(Box::new(params), DType::F32, device.clone());
        let model = Self::new(config, vb)
            .with_context(|| format!("Incompatible parameters in {:?}", path))?;
        debug!("Restored EdgeNet from {:?} ({:?} norm)", path, model.config.norm_mode);
        Ok(model)
    }

    /// Tensor names the model reads from a parameter file
    pub fn parameter_names() -> HashSet<String> {
        // Three linear layers per EdgeConv MLP
        let mlp = |prefix: &str| {
            (0..3)
                .flat_map(|i| {
                    [
                        format!("{}.nn.{}.weight", prefix, 2 * i),
                        format!("{}.nn.{}.bias", prefix, 2 * i),
                    ]
                })
                .collect::<Vec<_>>()
        };

        ["weight", "bias", "running_mean", "running_var"]
            .iter()
            .map(|n| format!("batchnorm.{}", n))
            .chain(mlp("encoder"))
            .chain(mlp("decoder"))
            .collect()
    }

    /// Reconstruct node features of a batch
    ///
    /// # Returns
    /// * Tensor of shape (num_nodes, input_dim)
    pub fn forward(&self, batch: &GraphBatch) -> Result<Tensor> {
        let x = batch.features(&self.device)?;
        let (sources, targets) = batch.edge_tensors(&self.device)?;

        let mut degree = vec![0f32; batch.num_nodes];
        for &t in &batch.targets {
            degree[t as usize] += 1.0;
        }
        // Isolated nodes aggregate to zero
        let degree: Vec<f32> = degree.into_iter().map(|d| d.max(1.0)).collect();
        let degree = Tensor::from_vec(degree, (batch.num_nodes, 1), &self.device)?;

        let x = self.batchnorm.forward(&x)?;
        let x = self.encoder.forward(&x, &sources, &targets, &degree)?;
        self.decoder.forward(&x, &sources, &targets, &degree)
    }

    pub fn config(&self) -> &EdgeNetConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}
