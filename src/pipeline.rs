//! Unified Pipeline for Daily Stock Features
//!
//! Connects the stages for one company:
//!
//! ```text
//! raw CSV → PriceSeries → FeatureExtractor → FeatureFrame (full length)
//!                                                   ↓
//!                                     truncate(DateBounds) + check_data
//!                                                   ↓
//!                              feature CSV  +  DatasetExporter (train/valid/test)
//! ```
//!
//! Every run is all-or-nothing: the feature CSV is written only after the
//! frame passes validation, and the arrays only if every partition has
//! examples.
//!
//! # Example
//!
//! ```ignore
//! use stock_features::{Pipeline, PipelineConfig};
//!
//! let pipeline = Pipeline::from_config(PipelineConfig::default())?;
//! let output = pipeline.process_company("AAPL", "raw/AAPL.csv", Some("fea/AAPL-fea.csv".as_ref()), "dataset")?;
//! println!("{} rows, {} train windows", output.rows, output.export.partitions[0].n_examples);
//! ```

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::export::{DatasetExporter, ExportMetadata};
use crate::features::{FeatureExtractor, FeatureFrame};
use crate::price::{read_price_csv, PriceSeries};
use crate::validation::{check_data, ValidationResult};
use std::path::{Path, PathBuf};

/// Output from processing one company.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub company: String,

    /// Rows read from the raw file
    pub raw_rows: usize,

    /// Rows kept after truncation
    pub rows: usize,

    /// Columns of the feature frame (excluding the date)
    pub columns: usize,

    /// Where the feature CSV was written, if requested
    pub features_path: Option<PathBuf>,

    pub validation: ValidationResult,

    pub export: ExportMetadata,
}

/// Extraction and export for one company at a time.
///
/// The pipeline holds no per-company state, so one instance can be shared
/// across threads.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    extractor: FeatureExtractor,
    suffix: Option<String>,
}

impl Pipeline {
    /// Create pipeline from configuration
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        config.validate().map_err(PipelineError::Config)?;
        let extractor = FeatureExtractor::new(config.features.clone(), config.labels.clone());
        Ok(Self {
            config,
            extractor,
            suffix: None,
        })
    }

    /// Override the exported file name suffix.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Extract, truncate to the configured bounds and validate.
    pub fn extract(&self, series: &PriceSeries) -> Result<(FeatureFrame, ValidationResult)> {
        let frame = self
            .extractor
            .extract_truncated(series, &self.config.bounds)?;
        if frame.is_empty() {
            return Err(PipelineError::InsufficientRows {
                required: 1,
                available: 0,
            });
        }
        let validation = check_data(&frame)?;
        Ok((frame, validation))
    }

    /// Exporter writing below `output_dir`.
    pub fn exporter<P: AsRef<Path>>(&self, output_dir: P) -> DatasetExporter {
        let exporter = DatasetExporter::from_config(output_dir, &self.config);
        match &self.suffix {
            Some(suffix) => exporter.with_suffix(suffix.clone()),
            None => exporter,
        }
    }

    /// Run the full pipeline for one company.
    ///
    /// Reads `input`, writes the augmented feature CSV to `features_path`
    /// (when given) and the partition arrays to `<output_dir>/<company>/`.
    pub fn process_company<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        company: &str,
        input: P,
        features_path: Option<&Path>,
        output_dir: Q,
    ) -> Result<PipelineOutput> {
        let input = input.as_ref();
        if !input.exists() {
            return Err(PipelineError::MissingInput(input.to_path_buf()));
        }

        let series = read_price_csv(input)?;
        let raw_rows = series.len();
        let (frame, validation) = self.extract(&series)?;

        if let Some(path) = features_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            frame.write_csv(path)?;
        }

        let export = self.exporter(output_dir).export_company(company, &frame)?;

        tracing::info!(
            company,
            raw_rows,
            rows = frame.len(),
            columns = frame.num_columns(),
            "processed company"
        );

        Ok(PipelineOutput {
            company: company.to_string(),
            raw_rows,
            rows: frame.len(),
            columns: frame.num_columns(),
            features_path: features_path.map(Path::to_path_buf),
            validation,
            export,
        })
    }

    /// Export a feature CSV written by an earlier run without re-extracting.
    ///
    /// The configured date bounds still apply; warmup and lead rows were
    /// already dropped when the file was written.
    pub fn export_features<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        company: &str,
        features_path: P,
        output_dir: Q,
    ) -> Result<PipelineOutput> {
        let features_path = features_path.as_ref();
        let stored = FeatureFrame::read_csv(features_path)?;
        let raw_rows = stored.len();
        let frame = stored.truncate(&self.config.bounds);
        if frame.is_empty() {
            return Err(PipelineError::InsufficientRows {
                required: 1,
                available: 0,
            });
        }
        let validation = check_data(&frame)?;
        let export = self.exporter(output_dir).export_company(company, &frame)?;

        tracing::info!(
            company,
            path = %features_path.display(),
            rows = frame.len(),
            "exported stored features"
        );

        Ok(PipelineOutput {
            company: company.to_string(),
            raw_rows,
            rows: frame.len(),
            columns: frame.num_columns(),
            features_path: Some(features_path.to_path_buf()),
            validation,
            export,
        })
    }
}
