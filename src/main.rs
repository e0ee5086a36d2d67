//! edgenet-eval CLI - plot EdgeNet reconstruction diagnostics

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use edgenet_eval::models::NormMode;
use edgenet_eval::{EvalConfig, Evaluator, VERSION};

/// Evaluate a trained EdgeNet on the test partition and plot input vs. output
#[derive(Parser, Debug)]
#[command(name = "edgenet-eval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Name of the model file (without the `.best.safetensors` suffix)
    #[arg(long, alias = "model_name")]
    model_name: String,

    /// YAML config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dataset root directory
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Directory holding trained model files
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Directory figures are written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Events per batch
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Statistics of the input batch norm
    #[arg(long, value_enum)]
    norm_mode: Option<NormMode>,

    /// Use CPU instead of GPU
    #[arg(long)]
    cpu: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn eval_config(&self) -> Result<EvalConfig> {
        let mut config = match &self.config {
            Some(path) => EvalConfig::load(path)?,
            None => EvalConfig::default(),
        };

        if let Some(dir) = &self.data_root {
            config.data_root = dir.clone();
        }
        if let Some(dir) = &self.models_dir {
            config.models_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(mode) = self.norm_mode {
            config.norm_mode = mode;
        }
        if self.cpu {
            config.use_gpu = false;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    info!("edgenet-eval v{}", VERSION);

    let config = cli.eval_config()?;
    debug!("Config: {:?}", config);
    let evaluator = Evaluator::new(config)?;

    let model = match evaluator.get_model(&cli.model_name) {
        Ok(model) => model,
        Err(e) => {
            debug!("{:#}", e);
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let report = evaluator.evaluate(&model, &cli.model_name)?;
    for summary in &report.summaries {
        for line in summary.lines() {
            println!("{}", line);
        }
    }

    Ok(())
}
