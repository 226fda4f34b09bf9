//! Multi-Company Dataset Export Tool
//!
//! Configuration-driven export of train/valid/test arrays for every company
//! listed in a [`DatasetConfig`].
//!
//! # Output Format
//!
//! For each company under `data.output_dir`:
//!
//! - `train{suffix}.npy`, `valid{suffix}.npy`, `test{suffix}.npy`
//!   - Sequential: `(n, T, K + 1)`, newest row first, label in the last column
//!   - Flat: `(n, K + 1)`
//! - `metadata.json`: shapes, keys, split cutoffs, label statistics
//!
//! The feature CSV of each company is written to `data.feature_dir` as well
//! unless `processing.write_features = false`. With `--from-features` the
//! stored feature CSVs are exported instead and nothing is re-extracted.
//!
//! # Usage
//!
//! ```bash
//! # From TOML (or JSON) config
//! export_dataset --config configs/daily.toml
//!
//! # Re-export feature CSVs from data.feature_dir
//! export_dataset --config configs/daily.toml --from-features
//!
//! # Generate sample config
//! export_dataset --generate-config configs/daily.toml
//! ```

use clap::Parser;
use stock_features::batch::{BatchOutput, BatchProcessor, CompanyJob, LogProgress};
use stock_features::logging::init_logging;
use stock_features::{DatasetConfig, ErrorMode, PipelineError, Result};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(version, about = "Export train/valid/test arrays for many companies")]
struct Args {
    /// Dataset configuration (TOML or JSON).
    #[arg(long, short, required_unless_present = "generate_config")]
    config: Option<PathBuf>,

    /// Write a sample configuration to this path and exit.
    #[arg(long, value_name = "PATH")]
    generate_config: Option<PathBuf>,

    /// Override processing.threads.
    #[arg(long)]
    threads: Option<usize>,

    /// Keep going when a company fails.
    #[arg(long)]
    collect_errors: bool,

    /// Export `<feature_dir>/<company><feature_suffix>` instead of extracting
    /// from the price files.
    #[arg(long)]
    from_features: bool,

    /// Only validate the configuration.
    #[arg(long)]
    dry_run: bool,

    /// Default log level when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn load_config(path: &Path) -> Result<DatasetConfig> {
    if path.extension().is_some_and(|e| e == "json") {
        DatasetConfig::load_json(path)
    } else {
        DatasetConfig::load_toml(path)
    }
}

fn generate_sample_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    DatasetConfig::sample().save_toml(path)?;
    println!("Generated sample config: {}", path.display());
    println!();
    println!("Edit the following fields before running:");
    println!("  - companies.names: companies to export");
    println!("  - data.input_dir: directory holding <company>.csv price files");
    println!("  - data.conf_file: [DATE] start_time / end_time bounds (or set [dates])");
    println!("  - split: train / valid / test cutoffs");
    Ok(())
}

fn print_config_summary(config: &DatasetConfig) {
    println!("Experiment: {} (v{})", config.experiment.name, config.experiment.version);
    println!("Companies:  {}", config.companies.names.join(", "));
    println!("Input:      {}", config.data.input_dir.display());
    println!("Features:   {}", config.data.feature_dir.display());
    println!("Output:     {}", config.data.output_dir.display());
    println!(
        "Export:     {:?}, {} keys, suffix '{}'",
        config.export.format,
        config.export.resolved_keys().len(),
        config.export.resolved_suffix()
    );
    println!(
        "Sequence:   length {}, stride {}",
        config.sequence.sequence_length, config.sequence.stride
    );
    println!();
}

fn print_results(output: &BatchOutput) {
    println!();
    println!(
        "Exported {}/{} companies in {:.2?} on {} thread(s)",
        output.successful_count(),
        output.successful_count() + output.failed_count() + output.skipped_count,
        output.elapsed,
        output.threads_used
    );
    for result in &output.results {
        let shapes: Vec<String> = result
            .output
            .export
            .partitions
            .iter()
            .map(|p| format!("{}={:?}", p.partition, p.shape))
            .collect();
        println!("  {:<8} {} rows  {}", result.company, result.output.rows, shapes.join("  "));
    }
    for error in &output.errors {
        println!("  {:<8} FAILED: {}", error.company, error.error);
    }
    if output.skipped_count > 0 {
        println!("  {} company(ies) skipped", output.skipped_count);
    }
}

fn run(args: &Args) -> Result<bool> {
    if let Some(path) = &args.generate_config {
        generate_sample_config(path)?;
        return Ok(true);
    }
    let config_path = args
        .config
        .as_ref()
        .ok_or_else(|| PipelineError::config("--config is required"))?;

    let mut config = load_config(config_path)?;
    if let Some(threads) = args.threads {
        config.processing.threads = Some(threads);
    }
    if args.collect_errors {
        config.processing.error_mode = ErrorMode::CollectErrors;
    }
    config.validate().map_err(PipelineError::Config)?;
    print_config_summary(&config);

    if args.dry_run {
        tracing::info!("configuration is valid");
        return Ok(true);
    }

    let processor =
        BatchProcessor::from_dataset_config(&config)?.with_progress_callback(Box::new(LogProgress));
    let jobs = if args.from_features {
        CompanyJob::from_feature_files(&config)
    } else {
        CompanyJob::from_dataset_config(&config)
    };
    let output = processor.process_jobs(&jobs)?;
    print_results(&output);
    Ok(output.all_successful())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

