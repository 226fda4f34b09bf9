//! Feature Extraction Tool
//!
//! Reads one vendor price CSV, derives the lag, EMA and indicator columns
//! plus the forward target and label, truncates to the configured date
//! bounds and writes the feature CSV.
//!
//! # Usage
//!
//! ```bash
//! extract_features --input data/apple.csv --output features/apple-fea.csv --conf conf.ini
//! extract_features --input data/apple.csv --output apple-fea.csv --config pipeline.toml
//! ```

use clap::Parser;
use stock_features::logging::init_logging;
use stock_features::{read_price_csv, DateBounds, Pipeline, PipelineConfig, Result};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(version, about = "Derive the feature CSV of one price series")]
struct Args {
    /// Vendor price CSV.
    #[arg(long, short)]
    input: PathBuf,

    /// Feature CSV to write.
    #[arg(long, short)]
    output: PathBuf,

    /// Conf file with a [DATE] section holding start_time / end_time.
    #[arg(long)]
    conf: Option<PathBuf>,

    /// Pipeline configuration (TOML or JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the lag depth.
    #[arg(long)]
    lag_depth: Option<usize>,

    /// Default log level when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) if path.extension().is_some_and(|e| e == "json") => PipelineConfig::load_json(path)?,
        Some(path) => PipelineConfig::load_toml(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(conf) = &args.conf {
        config.bounds = DateBounds::load_conf(conf)?;
    }
    if let Some(depth) = args.lag_depth {
        config.features = config.features.with_lag_depth(depth);
    }
    Ok(config)
}

fn run(args: &Args) -> Result<()> {
    let pipeline = Pipeline::from_config(load_config(args)?)?;
    let series = read_price_csv(&args.input)?;
    let (frame, validation) = pipeline.extract(&series)?;

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    frame.write_csv(&args.output)?;

    tracing::info!(
        input = %args.input.display(),
        output = %args.output.display(),
        raw_rows = series.len(),
        rows = frame.len(),
        columns = frame.num_columns(),
        checks_passed = validation.passed_count(),
        checks = validation.check_count(),
        "feature extraction complete"
    );
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
