//! Parallel batch processing for multi-company datasets.
//!
//! Each company is processed by the shared [`Pipeline`] on a local Rayon
//! thread pool. The pipeline holds no per-company state, so workers share it
//! without locks.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     BatchProcessor                        │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │                 Rayon Thread Pool                   │  │
//! │  │                                                     │  │
//! │  │   AAPL.csv        MSFT.csv        NVDA.csv          │  │
//! │  │      │               │               │              │  │
//! │  │      ▼               ▼               ▼              │  │
//! │  │  CompanyResult   CompanyResult   CompanyError       │  │
//! │  └──────────────────────┬─────────────────────────────┘  │
//! │                         ▼                                 │
//! │                    BatchOutput                            │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use stock_features::batch::{BatchProcessor, CompanyJob};
//! use stock_features::export::DatasetConfig;
//!
//! let dataset = DatasetConfig::load_toml("configs/daily.toml")?;
//! let processor = BatchProcessor::from_dataset_config(&dataset)?;
//! let output = processor.process_jobs(&CompanyJob::from_dataset_config(&dataset))?;
//! println!("{} companies in {:?}", output.successful_count(), output.elapsed);
//! ```

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::export::DatasetConfig;
use crate::pipeline::{Pipeline, PipelineOutput};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ============================================================================
// Configuration
// ============================================================================

/// Error handling mode for batch processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMode {
    /// Stop on the first failed company (default).
    #[default]
    FailFast,

    /// Process every company and report the failures.
    CollectErrors,
}

/// Configuration for batch processing.
#[derive(Debug, Clone, Default)]
pub struct BatchConfig {
    /// Number of threads; Rayon's default when `None`.
    pub num_threads: Option<usize>,

    pub error_mode: ErrorMode,

    /// Suffix override for exported arrays.
    pub suffix: Option<String>,
}

impl BatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    ///
    /// Panics if threads is 0.
    pub fn with_threads(mut self, threads: usize) -> Self {
        assert!(threads > 0, "Thread count must be > 0");
        self.num_threads = Some(threads);
        self
    }

    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn effective_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(rayon::current_num_threads)
    }
}

// ============================================================================
// Jobs and Results
// ============================================================================

/// What a job's input file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobSource {
    /// Vendor price CSV; features are extracted.
    #[default]
    Raw,
    /// Feature CSV of an earlier run; exported as is.
    Features,
}

/// Input and output locations of one company.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyJob {
    pub company: String,
    pub input: PathBuf,
    pub source: JobSource,
    /// Feature CSV destination; skipped when `None`.
    pub features_path: Option<PathBuf>,
}

impl CompanyJob {
    pub fn new<P: AsRef<Path>>(company: impl Into<String>, input: P) -> Self {
        Self {
            company: company.into(),
            input: input.as_ref().to_path_buf(),
            source: JobSource::Raw,
            features_path: None,
        }
    }

    /// Job exporting an existing feature CSV.
    pub fn from_features<P: AsRef<Path>>(company: impl Into<String>, features: P) -> Self {
        Self {
            source: JobSource::Features,
            ..Self::new(company, features)
        }
    }

    pub fn with_features_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.features_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// One job per configured company, in configuration order.
    pub fn from_dataset_config(config: &DatasetConfig) -> Vec<CompanyJob> {
        config
            .companies
            .names
            .iter()
            .map(|name| {
                let job = CompanyJob::new(name.clone(), config.raw_path(name));
                if config.processing.write_features {
                    job.with_features_path(config.feature_path(name))
                } else {
                    job
                }
            })
            .collect()
    }

    /// One job per configured company reading `<feature_dir>/<company><feature_suffix>`.
    pub fn from_feature_files(config: &DatasetConfig) -> Vec<CompanyJob> {
        config
            .companies
            .names
            .iter()
            .map(|name| CompanyJob::from_features(name.clone(), config.feature_path(name)))
            .collect()
    }
}

/// Result from processing a single company.
#[derive(Debug, Clone)]
pub struct CompanyResult {
    pub company: String,
    pub output: PipelineOutput,
    pub elapsed: Duration,
}

/// Error information for a failed company.
#[derive(Debug, Clone)]
pub struct CompanyError {
    pub company: String,
    pub input: PathBuf,
    pub error: String,
}

/// Aggregated results from batch processing.
#[derive(Debug)]
pub struct BatchOutput {
    /// Successful companies, in job order.
    pub results: Vec<CompanyResult>,

    /// Failed companies (only populated with `ErrorMode::CollectErrors`).
    pub errors: Vec<CompanyError>,

    /// Wall clock time.
    pub elapsed: Duration,

    pub threads_used: usize,

    /// Jobs not started after a failure in fail-fast mode.
    pub skipped_count: usize,
}

impl BatchOutput {
    pub fn successful_count(&self) -> usize {
        self.results.len()
    }

    pub fn failed_count(&self) -> usize {
        self.errors.len()
    }

    pub fn all_successful(&self) -> bool {
        self.errors.is_empty() && self.skipped_count == 0
    }

    /// Rows kept across all successful companies.
    pub fn total_rows(&self) -> usize {
        self.results.iter().map(|r| r.output.rows).sum()
    }

    /// Exported examples across all partitions and companies.
    pub fn total_examples(&self) -> usize {
        self.results
            .iter()
            .flat_map(|r| r.output.export.partitions.iter())
            .map(|p| p.n_examples)
            .sum()
    }

    /// Sum of per-company times over wall clock time.
    pub fn speedup_factor(&self) -> f64 {
        let sequential: Duration = self.results.iter().map(|r| r.elapsed).sum();
        sequential.as_secs_f64() / self.elapsed.as_secs_f64().max(f64::EPSILON)
    }
}

// ============================================================================
// Progress Reporting
// ============================================================================

/// Progress information for callbacks.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    pub company: String,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl ProgressInfo {
    pub fn percent_complete(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.completed + self.failed) as f64 / self.total as f64 * 100.0
        }
    }
}

/// Trait for progress reporting callbacks.
pub trait ProgressCallback: Send + Sync {
    /// Called when a company starts.
    fn on_progress(&self, info: &ProgressInfo);

    /// Called when batch processing completes.
    fn on_complete(&self, output: &BatchOutput);
}

/// Progress reporter writing through `tracing`.
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressCallback for LogProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        tracing::info!(
            company = %info.company,
            done = info.completed + info.failed,
            total = info.total,
            "{:.1}% complete",
            info.percent_complete()
        );
    }

    fn on_complete(&self, output: &BatchOutput) {
        tracing::info!(
            succeeded = output.successful_count(),
            failed = output.failed_count(),
            skipped = output.skipped_count,
            rows = output.total_rows(),
            examples = output.total_examples(),
            elapsed = ?output.elapsed,
            speedup = format!("{:.2}x", output.speedup_factor()),
            "batch complete"
        );
    }
}

// ============================================================================
// Batch Processor
// ============================================================================

/// Parallel processor over companies.
pub struct BatchProcessor {
    pipeline: Arc<Pipeline>,
    output_dir: PathBuf,
    batch_config: BatchConfig,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl BatchProcessor {
    /// Create a processor exporting below `output_dir`.
    pub fn new<P: AsRef<Path>>(
        pipeline_config: PipelineConfig,
        batch_config: BatchConfig,
        output_dir: P,
    ) -> Result<Self> {
        let mut pipeline = Pipeline::from_config(pipeline_config)?;
        if let Some(ref suffix) = batch_config.suffix {
            pipeline = pipeline.with_suffix(suffix.clone());
        }
        Ok(Self {
            pipeline: Arc::new(pipeline),
            output_dir: output_dir.as_ref().to_path_buf(),
            batch_config,
            progress_callback: None,
        })
    }

    /// Processor for a dataset configuration (bounds from its conf file,
    /// threads and error mode from `[processing]`).
    pub fn from_dataset_config(config: &DatasetConfig) -> Result<Self> {
        config.validate().map_err(PipelineError::Config)?;
        let mut batch_config = BatchConfig::new()
            .with_error_mode(config.processing.error_mode)
            .with_suffix(config.export.resolved_suffix());
        if let Some(threads) = config.processing.threads {
            batch_config = batch_config.with_threads(threads);
        }
        Self::new(config.to_pipeline_config()?, batch_config, &config.data.output_dir)
    }

    pub fn with_progress_callback(mut self, callback: Box<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(Arc::from(callback));
        self
    }

    pub fn batch_config(&self) -> &BatchConfig {
        &self.batch_config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Process every job in parallel.
    ///
    /// With `ErrorMode::FailFast` the first failure (in job order) is returned
    /// as an error; companies already exported stay on disk.
    pub fn process_jobs(&self, jobs: &[CompanyJob]) -> Result<BatchOutput> {
        let start = Instant::now();
        let total = jobs.len();
        let threads_used = self.batch_config.effective_threads();

        let completed = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);
        let fail_fast = self.batch_config.error_mode == ErrorMode::FailFast;

        enum Outcome {
            Success(Box<CompanyResult>),
            Error(CompanyError),
            Skipped,
        }

        // Local pool: build_global() only works once per process.
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads_used)
            .build()
            .map_err(|e| PipelineError::generic(format!("Failed to create thread pool: {}", e)))?;

        let outcomes: Vec<Outcome> = pool.install(|| {
            jobs.par_iter()
                .map(|job| {
                    if fail_fast && failed.load(Ordering::Relaxed) > 0 {
                        return Outcome::Skipped;
                    }

                    if let Some(ref callback) = self.progress_callback {
                        callback.on_progress(&ProgressInfo {
                            company: job.company.clone(),
                            total,
                            completed: completed.load(Ordering::Relaxed),
                            failed: failed.load(Ordering::Relaxed),
                            elapsed: start.elapsed(),
                        });
                    }

                    match self.process_job(job) {
                        Ok(result) => {
                            completed.fetch_add(1, Ordering::Relaxed);
                            Outcome::Success(Box::new(result))
                        }
                        Err(err) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            tracing::warn!(company = %err.company, error = %err.error, "company failed");
                            Outcome::Error(err)
                        }
                    }
                })
                .collect()
        });

        let mut results = Vec::new();
        let mut errors = Vec::new();
        let mut skipped_count = 0usize;
        for outcome in outcomes {
            match outcome {
                Outcome::Success(result) => results.push(*result),
                Outcome::Error(err) => {
                    if fail_fast {
                        return Err(PipelineError::generic(format!(
                            "Failed to process {} ({}): {}",
                            err.company,
                            err.input.display(),
                            err.error
                        )));
                    }
                    errors.push(err);
                }
                Outcome::Skipped => skipped_count += 1,
            }
        }

        let output = BatchOutput {
            results,
            errors,
            elapsed: start.elapsed(),
            threads_used,
            skipped_count,
        };

        if let Some(ref callback) = self.progress_callback {
            callback.on_complete(&output);
        }
        Ok(output)
    }

    fn process_job(&self, job: &CompanyJob) -> std::result::Result<CompanyResult, CompanyError> {
        let start = Instant::now();
        let output = match job.source {
            JobSource::Raw => self.pipeline.process_company(
                &job.company,
                &job.input,
                job.features_path.as_deref(),
                &self.output_dir,
            ),
            JobSource::Features => {
                self.pipeline
                    .export_features(&job.company, &job.input, &self.output_dir)
            }
        }
        .map_err(|e| CompanyError {
            company: job.company.clone(),
            input: job.input.clone(),
            error: e.to_string(),
        })?;

        Ok(CompanyResult {
            company: job.company.clone(),
            output,
            elapsed: start.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_batch_config_defaults() {
        let config = BatchConfig::new();
        assert_eq!(config.error_mode, ErrorMode::FailFast);
        assert!(config.num_threads.is_none());
        assert_eq!(config.with_threads(3).effective_threads(), 3);
    }

    #[test]
    #[should_panic(expected = "Thread count must be > 0")]
    fn test_zero_threads_panics() {
        let _ = BatchConfig::new().with_threads(0);
    }

    #[test]
    fn test_missing_inputs_collected() {
        let dir = TempDir::new().unwrap();
        let processor = BatchProcessor::new(
            PipelineConfig::default(),
            BatchConfig::new()
                .with_threads(2)
                .with_error_mode(ErrorMode::CollectErrors),
            dir.path(),
        )
        .unwrap();

        let jobs = vec![
            CompanyJob::new("A", dir.path().join("A.csv")),
            CompanyJob::new("B", dir.path().join("B.csv")),
        ];
        let output = processor.process_jobs(&jobs).unwrap();
        assert_eq!(output.successful_count(), 0);
        assert_eq!(output.failed_count(), 2);
        assert!(output.errors[0].error.contains("not found"));
    }

    #[test]
    fn test_missing_input_fails_fast() {
        let dir = TempDir::new().unwrap();
        let processor =
            BatchProcessor::new(PipelineConfig::default(), BatchConfig::new(), dir.path()).unwrap();
        let jobs = vec![CompanyJob::new("A", dir.path().join("A.csv"))];
        assert!(processor.process_jobs(&jobs).is_err());
    }

    #[test]
    fn test_missing_feature_file_collected() {
        let dir = TempDir::new().unwrap();
        let processor = BatchProcessor::new(
            PipelineConfig::default(),
            BatchConfig::new().with_error_mode(ErrorMode::CollectErrors),
            dir.path(),
        )
        .unwrap();

        let job = CompanyJob::from_features("A", dir.path().join("A-fea.csv"));
        assert_eq!(job.source, JobSource::Features);
        assert_eq!(job.features_path, None);
        let output = processor.process_jobs(&[job]).unwrap();
        assert_eq!(output.failed_count(), 1);
        assert!(output.errors[0].error.contains("A-fea.csv"));
    }
}
