//! Model Training Tool
//!
//! Trains a model on one company's exported partitions, evaluates it on the
//! validation set every `eval_every` steps and writes checkpoints into
//! `<model-dir>/runs_<timestamp>/`.
//!
//! # Usage
//!
//! ```bash
//! train_model --input-dir data/dataset --company AAPL
//! train_model --input-dir data/dataset --company AAPL --hparams hparams.toml --model gated-conv-net
//! train_model --write-hparams hparams.toml
//! ```

use clap::{Parser, ValueEnum};
use stock_features::logging::init_logging;
use stock_features::training::{run_dir, Estimator, ExportedDataset, HParams, ValidationMonitor};
use stock_features::{ModelKind, PipelineError, Result};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelArg {
    MultilayerPerceptron,
    GatedConvNet,
}

impl From<ModelArg> for ModelKind {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::MultilayerPerceptron => ModelKind::MultilayerPerceptron,
            ModelArg::GatedConvNet => ModelKind::GatedConvNet,
        }
    }
}

#[derive(Parser, Debug)]
#[command(version, about = "Train a sequence model on exported partitions")]
struct Args {
    /// Export output directory holding one sub-directory per company.
    #[arg(long, required_unless_present = "write_hparams")]
    input_dir: Option<PathBuf>,

    #[arg(long, required_unless_present = "write_hparams")]
    company: Option<String>,

    /// Partition file suffix.
    #[arg(long, default_value = "_seq")]
    suffix: String,

    /// Hyperparameters (TOML). Defaults are used when omitted.
    #[arg(long)]
    hparams: Option<PathBuf>,

    /// Write default hyperparameters to this path and exit.
    #[arg(long, value_name = "PATH")]
    write_hparams: Option<PathBuf>,

    #[arg(long, value_enum)]
    model: Option<ModelArg>,

    /// Number of training epochs.
    #[arg(long)]
    num_epochs: Option<usize>,

    /// Evaluate after this many train steps.
    #[arg(long)]
    eval_every: Option<usize>,

    /// Base directory of the timestamped run directory.
    #[arg(long, default_value = ".")]
    model_dir: PathBuf,

    /// Default log level when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn load_hparams(args: &Args) -> Result<HParams> {
    let mut hparams = match &args.hparams {
        Some(path) => HParams::load_toml(path)?,
        None => HParams::default(),
    };
    if let Some(model) = args.model {
        hparams.model.kind = model.into();
    }
    if let Some(epochs) = args.num_epochs {
        hparams.epochs = epochs;
    }
    if let Some(every) = args.eval_every {
        hparams.eval_every = every;
    }
    Ok(hparams)
}

fn run(args: &Args) -> Result<()> {
    if let Some(path) = &args.write_hparams {
        HParams::default().save_toml(path)?;
        println!("Wrote default hyperparameters: {}", path.display());
        return Ok(());
    }
    let (Some(input_dir), Some(company)) = (&args.input_dir, &args.company) else {
        return Err(PipelineError::config("--input-dir and --company are required"));
    };

    let mut hparams = load_hparams(args)?;
    let data = ExportedDataset::load(input_dir.join(company), &args.suffix)?;
    if data.train.sequence_length() != hparams.sequence_length {
        tracing::warn!(
            configured = hparams.sequence_length,
            exported = data.train.sequence_length(),
            "using the exported sequence length"
        );
        hparams.sequence_length = data.train.sequence_length();
    }
    hparams.validate().map_err(PipelineError::Config)?;

    let model_dir = run_dir(&args.model_dir);
    std::fs::create_dir_all(&model_dir)?;
    hparams.save_toml(model_dir.join("hparams.toml"))?;
    tracing::info!(
        company = company.as_str(),
        train = data.train.len(),
        valid = data.valid.len(),
        test = data.test.len(),
        label_kind = ?data.label_kind,
        model_dir = %model_dir.display(),
        "loaded partitions"
    );

    let mut estimator = Estimator::new(hparams.clone(), data.label_kind, data.train.n_features())?
        .with_model_dir(&model_dir);
    let mut monitor = ValidationMonitor::new(&data.valid, hparams.eval_every).with_patience(hparams.patience);
    let report = estimator.fit(&data.train, Some(&mut monitor))?;

    let test = estimator.evaluate(&data.test)?;
    println!();
    println!("Steps:       {} ({} epochs)", report.steps, report.epochs_completed);
    if let Some((step, best)) = report.best_validation {
        println!("Best valid:  loss {:.6} at step {}", best.loss, step);
    }
    println!("Test loss:   {:.6}", test.loss);
    println!("Test MAE:    {:.6}", test.mae);
    if let Some(accuracy) = test.accuracy {
        println!("Test acc:    {:.4}", accuracy);
    }
    println!("Checkpoints: {}", model_dir.display());
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
