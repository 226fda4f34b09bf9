//! Dataset Export Configuration
//!
//! Configuration-driven export of feature datasets for any list of companies,
//! without hard-coding paths, cutoffs or key lists.
//!
//! # Example TOML
//!
//! ```toml
//! [experiment]
//! name = "daily-10"
//!
//! [companies]
//! names = ["AAPL", "MSFT"]
//! input_suffix = ".csv"
//! feature_suffix = "-fea.csv"
//!
//! [data]
//! input_dir = "data/raw"
//! feature_dir = "data/features"
//! output_dir = "data/dataset"
//! conf_file = "conf.ini"
//!
//! [split]
//! valid_start = "2012-01-01"
//! test_start = "2015-01-01"
//!
//! [sequence]
//! sequence_length = 20
//! stride = 1
//!
//! [export]
//! preset = "sequence_keys"
//! format = "sequential"
//! ```
//!
//! # Example
//!
//! ```ignore
//! use stock_features::export::DatasetConfig;
//!
//! let config = DatasetConfig::load_toml("configs/daily.toml")?;
//! let pipeline_config = config.to_pipeline_config()?;
//! ```

use super::{ExampleFormat, SplitConfig};
use crate::batch::ErrorMode;
use crate::config::{DateBounds, ExperimentMetadata, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::features::FeatureConfig;
use crate::labeling::LabelConfig;
use crate::schema::Preset;
use crate::sequence_builder::SequenceConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// Company Configuration
// ============================================================================

/// Companies to process and their file naming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyConfig {
    /// Company names; also used as output sub-directory names.
    pub names: Vec<String>,

    /// Raw file is `<input_dir>/<name><input_suffix>`.
    #[serde(default = "default_input_suffix")]
    pub input_suffix: String,

    /// Feature CSV is `<feature_dir>/<name><feature_suffix>`.
    #[serde(default = "default_feature_suffix")]
    pub feature_suffix: String,
}

fn default_input_suffix() -> String {
    ".csv".to_string()
}

fn default_feature_suffix() -> String {
    "-fea.csv".to_string()
}

impl CompanyConfig {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names,
            input_suffix: default_input_suffix(),
            feature_suffix: default_feature_suffix(),
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.names.is_empty() {
            return Err("at least one company is required".to_string());
        }
        let mut seen = HashSet::new();
        for name in &self.names {
            if name.is_empty() {
                return Err("company name cannot be empty".to_string());
            }
            if name.contains('/') || name.contains('\\') {
                return Err(format!("company name '{name}' must not contain path separators"));
            }
            if !seen.insert(name) {
                return Err(format!("duplicate company '{name}'"));
            }
        }
        if self.feature_suffix.is_empty() {
            return Err("feature_suffix cannot be empty".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Data Paths
// ============================================================================

/// Input and output directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPathConfig {
    /// Directory containing raw vendor CSVs.
    pub input_dir: PathBuf,

    /// Directory for the augmented feature CSVs.
    pub feature_dir: PathBuf,

    /// Directory for exported arrays (one sub-directory per company).
    pub output_dir: PathBuf,

    /// Optional conf file with a `[DATE]` section overriding `[dates]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conf_file: Option<PathBuf>,
}

impl DataPathConfig {
    pub fn new<P1: AsRef<Path>, P2: AsRef<Path>, P3: AsRef<Path>>(
        input_dir: P1,
        feature_dir: P2,
        output_dir: P3,
    ) -> Self {
        Self {
            input_dir: input_dir.as_ref().to_path_buf(),
            feature_dir: feature_dir.as_ref().to_path_buf(),
            output_dir: output_dir.as_ref().to_path_buf(),
            conf_file: None,
        }
    }

    pub fn with_conf_file<P: AsRef<Path>>(mut self, conf_file: P) -> Self {
        self.conf_file = Some(conf_file.as_ref().to_path_buf());
        self
    }

    /// Input directory and conf file must exist; outputs are created on demand.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.input_dir.exists() {
            return Err(format!(
                "Input directory does not exist: {}",
                self.input_dir.display()
            ));
        }
        if let Some(ref conf) = self.conf_file {
            if !conf.exists() {
                return Err(format!("Conf file does not exist: {}", conf.display()));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Export Selection
// ============================================================================

/// Which columns are exported and in what shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub preset: Preset,

    /// Explicit key list; takes precedence over `preset`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<String>>,

    #[serde(default)]
    pub format: ExampleFormat,

    /// File name suffix; defaults to `_seq` for sequential and none for flat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            preset: Preset::SequenceKeys,
            keys: None,
            format: ExampleFormat::Sequential,
            suffix: None,
        }
    }
}

impl ExportConfig {
    pub fn resolved_keys(&self) -> Vec<String> {
        self.keys.clone().unwrap_or_else(|| self.preset.keys())
    }

    pub fn resolved_suffix(&self) -> String {
        self.suffix
            .clone()
            .unwrap_or_else(|| self.format.default_suffix().to_string())
    }
}

// ============================================================================
// Processing Configuration
// ============================================================================

/// Configuration for parallel processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Number of threads; all cores when not specified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,

    /// Error handling mode: `"fail_fast"` or `"collect_errors"`.
    #[serde(default)]
    pub error_mode: ErrorMode,

    /// Also write the augmented feature CSV of every company.
    #[serde(default = "default_true")]
    pub write_features: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            threads: None,
            error_mode: ErrorMode::default(),
            write_features: true,
        }
    }
}

impl ProcessingConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(threads) = self.threads {
            if threads == 0 {
                return Err("threads must be > 0".to_string());
            }
        }
        Ok(())
    }
}

// ============================================================================
// Experiment Metadata
// ============================================================================

/// Metadata for experiment tracking and reproducibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentInfo {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl Default for ExperimentInfo {
    fn default() -> Self {
        Self {
            name: "Unnamed Experiment".to_string(),
            description: None,
            version: default_version(),
            tags: Vec::new(),
        }
    }
}

// ============================================================================
// Main Dataset Configuration
// ============================================================================

/// Complete dataset export configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(default)]
    pub experiment: ExperimentInfo,

    pub companies: CompanyConfig,

    pub data: DataPathConfig,

    /// Truncation bounds; replaced by `data.conf_file` when that is set.
    #[serde(default)]
    pub dates: DateBounds,

    #[serde(default)]
    pub features: FeatureConfig,

    #[serde(default)]
    pub labels: LabelConfig,

    #[serde(default)]
    pub split: SplitConfig,

    #[serde(default)]
    pub sequence: SequenceConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub processing: ProcessingConfig,
}

impl DatasetConfig {
    pub fn new(companies: CompanyConfig, data: DataPathConfig) -> Self {
        Self {
            experiment: ExperimentInfo::default(),
            companies,
            data,
            dates: DateBounds::default(),
            features: FeatureConfig::default(),
            labels: LabelConfig::default(),
            split: SplitConfig::default(),
            sequence: SequenceConfig::default(),
            export: ExportConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }

    /// Sample configuration written by `export_dataset --generate-config`.
    pub fn sample() -> Self {
        let companies = ["AAPL", "AMZN", "GOOGL", "IBM", "INTC", "MSFT", "NVDA", "ORCL", "QCOM", "TSLA"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        Self::new(
            CompanyConfig::new(companies),
            DataPathConfig::new("data/raw", "data/features", "data/dataset")
                .with_conf_file("conf.ini"),
        )
        .with_experiment(ExperimentInfo {
            name: "daily-sequences".to_string(),
            description: Some("17 keys, 20-day windows, next-day close target".to_string()),
            ..Default::default()
        })
    }

    pub fn with_experiment(mut self, experiment: ExperimentInfo) -> Self {
        self.experiment = experiment;
        self
    }

    pub fn with_dates(mut self, dates: DateBounds) -> Self {
        self.dates = dates;
        self
    }

    pub fn with_features(mut self, features: FeatureConfig) -> Self {
        self.features = features;
        self
    }

    pub fn with_labels(mut self, labels: LabelConfig) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_split(mut self, split: SplitConfig) -> Self {
        self.split = split;
        self
    }

    pub fn with_sequence(mut self, sequence: SequenceConfig) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_export(mut self, export: ExportConfig) -> Self {
        self.export = export;
        self
    }

    pub fn with_processing(mut self, processing: ProcessingConfig) -> Self {
        self.processing = processing;
        self
    }

    /// Validate the complete configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.companies
            .validate()
            .map_err(|e| format!("companies: {}", e))?;
        self.data.validate().map_err(|e| format!("data: {}", e))?;
        self.dates.validate().map_err(|e| format!("dates: {}", e))?;
        self.features
            .validate()
            .map_err(|e| format!("features: {}", e))?;
        self.labels.validate().map_err(|e| format!("labels: {}", e))?;
        self.split.validate().map_err(|e| format!("split: {}", e))?;
        self.sequence
            .validate()
            .map_err(|e| format!("sequence: {}", e))?;
        self.processing
            .validate()
            .map_err(|e| format!("processing: {}", e))?;
        self.pipeline_config_with(self.dates)
            .validate()
            .map_err(|e| format!("export: {}", e))?;
        Ok(())
    }

    /// Truncation bounds: the conf file's `[DATE]` section if configured,
    /// otherwise `[dates]`.
    pub fn resolve_bounds(&self) -> Result<DateBounds> {
        match &self.data.conf_file {
            Some(path) => DateBounds::load_conf(path),
            None => Ok(self.dates),
        }
    }

    /// Convert to PipelineConfig for processing.
    pub fn to_pipeline_config(&self) -> Result<PipelineConfig> {
        Ok(self.pipeline_config_with(self.resolve_bounds()?))
    }

    fn pipeline_config_with(&self, bounds: DateBounds) -> PipelineConfig {
        PipelineConfig {
            features: self.features.clone(),
            labels: self.labels.clone(),
            bounds,
            split: self.split,
            sequence: self.sequence.clone(),
            keys: self.export.resolved_keys(),
            format: self.export.format,
            metadata: Some(ExperimentMetadata {
                name: self.experiment.name.clone(),
                description: self.experiment.description.clone(),
                created_at: None,
                version: Some(self.experiment.version.clone()),
                tags: (!self.experiment.tags.is_empty()).then(|| self.experiment.tags.clone()),
            }),
        }
    }

    pub fn raw_path(&self, company: &str) -> PathBuf {
        self.data
            .input_dir
            .join(format!("{}{}", company, self.companies.input_suffix))
    }

    pub fn feature_path(&self, company: &str) -> PathBuf {
        self.data
            .feature_dir
            .join(format!("{}{}", company, self.companies.feature_suffix))
    }

    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: DatasetConfig = toml::from_str(&contents)?;
        config.validate().map_err(PipelineError::Config)?;
        Ok(config)
    }

    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: DatasetConfig = serde_json::from_str(&contents)?;
        config.validate().map_err(PipelineError::Config)?;
        Ok(config)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
