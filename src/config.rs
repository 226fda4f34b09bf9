//! Pipeline configuration management.
//!
//! This module provides the configuration for one extraction + export run,
//! with serialization support for experiment reproducibility, and the reader
//! for the small date-bounds conf file.
//!
//! # Date bounds file
//!
//! ```text
//! ; bounds for the 2000s run
//! [DATE]
//! start_time = 2000-01-01 00:00:00
//! end_time: 2017-12-31
//! ```
//!
//! INI syntax: `=` or `:` separators, `;` and `#` comment lines, optional
//! quotes. Only the date part of a datetime value is used.
//!
//! # Example
//!
//! ```ignore
//! use stock_features::config::PipelineConfig;
//!
//! let config = PipelineConfig::default();
//! config.save_toml("experiment_config.toml")?;
//!
//! let loaded = PipelineConfig::load_toml("experiment_config.toml")?;
//! let pipeline = Pipeline::from_config(loaded)?;
//! ```

use crate::error::{parse_date, PipelineError, Result};
use crate::export::{ExampleFormat, SplitConfig};
use crate::features::FeatureConfig;
use crate::labeling::{LabelConfig, LABEL_COLUMN};
use crate::schema::{FeatureSchema, Preset};
use crate::sequence_builder::SequenceConfig;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Inclusive date range that feature rows are truncated to.
///
/// A missing bound means the range is open on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateBounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,
}

impl DateBounds {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    #[inline]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(format!("start {start} is after end {end}"));
            }
        }
        Ok(())
    }

    /// Read `start_time` / `end_time` from the `[DATE]` section of a conf file.
    pub fn load_conf<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PipelineError::MissingInput(path.to_path_buf()));
        }
        Self::parse_conf(&fs::read_to_string(path)?)
    }

    pub fn parse_conf(text: &str) -> Result<Self> {
        let mut bounds = Self::default();
        let mut section: Option<&str> = None;
        let mut seen_date = false;

        for (number, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let name = name.trim();
                seen_date |= name == "DATE";
                section = Some(name);
                continue;
            }
            let (key, value) = line
                .split_once(['=', ':'])
                .ok_or_else(|| {
                    PipelineError::config(format!("conf line {}: expected key = value", number + 1))
                })?;
            if section != Some("DATE") {
                continue;
            }
            match key.trim().to_ascii_lowercase().as_str() {
                "start_time" => bounds.start = Some(conf_date(value)?),
                "end_time" => bounds.end = Some(conf_date(value)?),
                _ => {}
            }
        }

        if !seen_date {
            return Err(PipelineError::config("missing [DATE] section"));
        }
        bounds.validate().map_err(PipelineError::Config)?;
        Ok(bounds)
    }
}

/// Date part of a conf value: `2005-01-01`, `"2005-01-01"` or `2005-01-01 00:00:00`.
fn conf_date(value: &str) -> Result<NaiveDate> {
    let value = value.trim().trim_matches(|c: char| c == '"' || c == '\'');
    let date = value
        .split(|c: char| c == ' ' || c == 'T')
        .next()
        .unwrap_or(value);
    parse_date(date)
}

/// Unified pipeline configuration for one company run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Feature extraction configuration
    pub features: FeatureConfig,

    /// Label generation configuration
    pub labels: LabelConfig,

    /// Truncation bounds applied to the feature rows
    #[serde(default)]
    pub bounds: DateBounds,

    /// Train / validation / test cutoffs
    pub split: SplitConfig,

    /// Sequence framing configuration
    pub sequence: SequenceConfig,

    /// Ordered feature columns exported per timestep
    pub keys: Vec<String>,

    pub format: ExampleFormat,

    /// Experiment metadata (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ExperimentMetadata>,
}

/// Experiment metadata for tracking and reproducibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentMetadata {
    /// Experiment name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Creation timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    /// Version or git commit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            features: FeatureConfig::default(),
            labels: LabelConfig::default(),
            bounds: DateBounds::default(),
            split: SplitConfig::default(),
            sequence: SequenceConfig::default(),
            keys: Preset::SequenceKeys.keys(),
            format: ExampleFormat::Sequential,
            metadata: None,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, metadata: ExperimentMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_features(mut self, config: FeatureConfig) -> Self {
        self.features = config;
        self
    }

    pub fn with_labels(mut self, config: LabelConfig) -> Self {
        self.labels = config;
        self
    }

    pub fn with_bounds(mut self, bounds: DateBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_split(mut self, split: SplitConfig) -> Self {
        self.split = split;
        self
    }

    pub fn with_sequence(mut self, config: SequenceConfig) -> Self {
        self.sequence = config;
        self
    }

    pub fn with_keys(mut self, keys: Vec<String>) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_format(mut self, format: ExampleFormat) -> Self {
        self.format = format;
        self
    }

    /// Validate the configuration.
    ///
    /// Besides each section, checks that every export key is a column the
    /// feature configuration actually produces.
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.features.validate()?;
        self.labels.validate()?;
        self.bounds.validate()?;
        self.split.validate()?;
        self.sequence.validate()?;

        if self.keys.is_empty() {
            return Err("keys must not be empty".to_string());
        }
        let schema = FeatureSchema::from_config(&self.features, &self.labels);
        for key in &self.keys {
            if key == LABEL_COLUMN {
                return Err(format!("'{LABEL_COLUMN}' is appended automatically and cannot be a key"));
            }
            if !schema.contains(key) {
                return Err(format!("key '{key}' is not produced by the feature configuration"));
            }
        }
        Ok(())
    }

    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: PipelineConfig = toml::from_str(&contents)?;
        config.validate().map_err(PipelineError::Config)?;
        Ok(config)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&contents)?;
        config.validate().map_err(PipelineError::Config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.keys.len(), 17);
    }

    #[test]
    fn test_save_load_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pipeline.toml");

        let config = PipelineConfig::default()
            .with_bounds(DateBounds::new(Some(date("2001-01-02")), None))
            .with_metadata(ExperimentMetadata {
                name: "test_experiment".to_string(),
                description: Some("Test configuration".to_string()),
                created_at: None,
                version: Some("0.1.0".to_string()),
                tags: Some(vec!["test".to_string()]),
            });
        config.save_toml(&path).unwrap();

        let loaded = PipelineConfig::load_toml(&path).unwrap();
        assert_eq!(loaded.features.lag_depth, config.features.lag_depth);
        assert_eq!(loaded.sequence.sequence_length, config.sequence.sequence_length);
        assert_eq!(loaded.bounds, config.bounds);
        assert_eq!(loaded.keys, config.keys);
        assert!(loaded.metadata.is_some());
    }

    #[test]
    fn test_save_load_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pipeline.json");
        PipelineConfig::default().save_json(&path).unwrap();
        let loaded = PipelineConfig::load_json(&path).unwrap();
        assert_eq!(loaded.split, SplitConfig::default());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let config = PipelineConfig::default().with_keys(vec!["Close".into(), "RSI".into()]);
        assert!(config.validate().unwrap_err().contains("RSI"));

        let config = PipelineConfig::default().with_keys(vec!["Label".into()]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_indicator_keys_need_indicators() {
        let config = PipelineConfig::default()
            .with_features(FeatureConfig::default().with_indicators(false));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_conf_quoted_and_bare() {
        let quoted = "[DATE]\nstart_time = \"2000-01-03\"\nend_time = \"2016-12-30\"\n";
        let bounds = DateBounds::parse_conf(quoted).unwrap();
        assert_eq!(bounds.start, Some(date("2000-01-03")));
        assert_eq!(bounds.end, Some(date("2016-12-30")));

        let bare = "[DATE]\nstart_time = 2000-01-03\nend_time = 2016-12-30\n";
        assert_eq!(DateBounds::parse_conf(bare).unwrap(), bounds);
    }

    #[test]
    fn test_parse_conf_datetime_values() {
        let text = "[DATE]\nstart_time = 2005-01-01 00:00:00\nend_time = 2016-12-30T23:59:59\n";
        let bounds = DateBounds::parse_conf(text).unwrap();
        assert_eq!(bounds.start, Some(date("2005-01-01")));
        assert_eq!(bounds.end, Some(date("2016-12-30")));
    }

    #[test]
    fn test_parse_conf_colon_separator() {
        let bounds = DateBounds::parse_conf("[DATE]\nstart_time: 2005-01-01\n").unwrap();
        assert_eq!(bounds.start, Some(date("2005-01-01")));
        assert_eq!(bounds.end, None);
    }

    #[test]
    fn test_parse_conf_comments_and_other_sections() {
        let text = "; bounds\n# written by hand\n[PATHS]\ndata_dir = /tmp/data\n\n[DATE]\n  ; inclusive\nStart_Time = 2005-01-01\nend_time = 2006-06-30\n";
        let bounds = DateBounds::parse_conf(text).unwrap();
        assert_eq!(bounds.start, Some(date("2005-01-01")));
        assert_eq!(bounds.end, Some(date("2006-06-30")));
    }

    #[test]
    fn test_parse_conf_errors() {
        assert!(DateBounds::parse_conf("[OTHER]\nx = 1\n").is_err());
        assert!(DateBounds::parse_conf("[DATE]\nstart_time = 5\n").is_err());
        assert!(DateBounds::parse_conf("[DATE]\nstart_time 2005-01-01\n").is_err());
        assert!(
            DateBounds::parse_conf("[DATE]\nstart_time = \"2010-01-01\"\nend_time = \"2009-01-01\"\n")
                .is_err()
        );
    }

    #[test]
    fn test_bounds_contains() {
        let bounds = DateBounds::new(Some(date("2010-01-01")), Some(date("2010-12-31")));
        assert!(bounds.contains(date("2010-01-01")));
        assert!(bounds.contains(date("2010-12-31")));
        assert!(!bounds.contains(date("2011-01-01")));
        assert!(DateBounds::unbounded().contains(date("1990-05-05")));
    }

    #[test]
    fn test_load_conf_missing_file() {
        assert!(matches!(
            DateBounds::load_conf("/no/such/conf.ini"),
            Err(PipelineError::MissingInput(_))
        ));
    }
}
