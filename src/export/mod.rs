//! Data Export Module
//!
//! Splits a truncated feature frame by date and writes one NumPy array per
//! partition for the training driver.
//!
//! # Modules
//!
//! - **split**: date cutoffs and partition ranges
//! - **dataset_config**: TOML/JSON configuration for multi-company exports
//!
//! # Output Layout
//!
//! ```text
//! <output_dir>/<company>/
//!     train{suffix}.npy     Flat: (n, K+1)   Sequential: (n, T, K+1)
//!     valid{suffix}.npy
//!     test{suffix}.npy
//!     metadata.json
//! ```
//!
//! `K` is the number of feature keys, the last column is the label, and
//! sequential windows store the newest row first.
//!
//! # Example
//!
//! ```ignore
//! use stock_features::export::{DatasetExporter, ExampleFormat};
//!
//! let exporter = DatasetExporter::new("dataset", keys).with_format(ExampleFormat::Sequential);
//! let result = exporter.export_company("AAPL", &frame)?;
//! println!("{} training windows", result.partition(Partition::Train).unwrap().n_examples);
//! ```

pub mod dataset_config;
mod split;

pub use dataset_config::DatasetConfig;
pub use split::{Partition, PartitionRanges, SplitConfig};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::features::FeatureFrame;
use crate::labeling::{LabelKind, LabelStats, LABEL_COLUMN};
use crate::sequence_builder::{build_sequences, SequenceBatch, SequenceConfig};
use crate::validation::check_data;
use chrono::NaiveDate;
use ndarray::{s, Array2, Array3, ArrayD};
use ndarray_npy::WriteNpyExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufWriter;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Shape of the exported examples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExampleFormat {
    /// One row per date: `(n, K + 1)`
    Flat,
    /// Windows of `T` rows, newest first: `(n, T, K + 1)`
    #[default]
    Sequential,
}

impl ExampleFormat {
    /// File name suffix used when none is configured.
    pub fn default_suffix(&self) -> &'static str {
        match self {
            ExampleFormat::Flat => "",
            ExampleFormat::Sequential => "_seq",
        }
    }
}

/// Examples of a single partition.
#[derive(Debug, Clone)]
pub enum Examples {
    Flat(Array2<f64>),
    Sequential(Array3<f64>),
}

impl Examples {
    pub fn len(&self) -> usize {
        match self {
            Examples::Flat(a) => a.nrows(),
            Examples::Sequential(a) => a.shape()[0],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shape(&self) -> Vec<usize> {
        match self {
            Examples::Flat(a) => a.shape().to_vec(),
            Examples::Sequential(a) => a.shape().to_vec(),
        }
    }

    /// Label of every example: the last column of the (newest) row.
    pub fn labels(&self) -> Vec<f64> {
        match self {
            Examples::Flat(a) => a.column(a.ncols() - 1).to_vec(),
            Examples::Sequential(a) => {
                let width = a.shape()[2];
                a.slice(s![.., 0, width - 1]).to_vec()
            }
        }
    }

    pub fn into_dyn(self) -> ArrayD<f64> {
        match self {
            Examples::Flat(a) => a.into_dyn(),
            Examples::Sequential(a) => a.into_dyn(),
        }
    }

    fn write_npy(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        match self {
            Examples::Flat(a) => a.write_npy(writer)?,
            Examples::Sequential(a) => a.write_npy(writer)?,
        }
        Ok(())
    }
}

/// Flat examples for the rows in `range`: the key columns plus the label.
pub fn create_example<S: AsRef<str>>(
    frame: &FeatureFrame,
    keys: &[S],
    range: Range<usize>,
) -> Result<Array2<f64>> {
    let matrix = select_with_label(frame, keys)?;
    Ok(matrix.slice(s![range, ..]).to_owned())
}

/// Sequence examples whose newest row lies in `range`.
///
/// Older rows of a window may precede `range.start`, so every row of the
/// range with `T - 1` rows of history yields a window. Only the first rows
/// of the frame lack that history.
pub fn create_example_sequential<S: AsRef<str>>(
    frame: &FeatureFrame,
    keys: &[S],
    range: Range<usize>,
    config: &SequenceConfig,
) -> Result<SequenceBatch> {
    let matrix = select_with_label(frame, keys)?;
    let history = range
        .start
        .saturating_sub(config.sequence_length.saturating_sub(1));
    let rows = matrix.slice(s![history..range.end, ..]).to_owned();
    build_sequences(&frame.dates()[history..range.end], &rows, config)
}

fn select_with_label<S: AsRef<str>>(frame: &FeatureFrame, keys: &[S]) -> Result<Array2<f64>> {
    let mut columns: Vec<&str> = keys.iter().map(|k| k.as_ref()).collect();
    columns.push(LABEL_COLUMN);
    frame.select(&columns)
}

/// Per-partition summary written to `metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionSummary {
    pub partition: Partition,
    pub n_examples: usize,
    pub shape: Vec<usize>,
    /// Date of the (newest row of the) first example
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub label_stats: LabelStats,
    pub path: PathBuf,
}

/// Metadata about one company's exported dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub company: String,
    pub format: ExampleFormat,
    pub keys: Vec<String>,
    pub label_column: String,
    pub label_kind: LabelKind,
    /// Values per timestep (keys + label)
    pub width: usize,
    pub sequence_length: Option<usize>,
    pub stride: Option<usize>,
    pub split: SplitConfig,
    pub partitions: Vec<PartitionSummary>,
    /// Rows in the frame before splitting
    pub n_rows: usize,
    pub export_timestamp: String,
}

impl ExportMetadata {
    pub fn partition(&self, partition: Partition) -> Option<&PartitionSummary> {
        self.partitions.iter().find(|p| p.partition == partition)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}

/// Writes train/valid/test arrays for one company at a time.
#[derive(Debug, Clone)]
pub struct DatasetExporter {
    output_dir: PathBuf,
    keys: Vec<String>,
    split: SplitConfig,
    sequence: SequenceConfig,
    format: ExampleFormat,
    suffix: Option<String>,
    label_kind: LabelKind,
}

impl DatasetExporter {
    pub fn new<P: AsRef<Path>>(output_dir: P, keys: Vec<String>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            keys,
            split: SplitConfig::default(),
            sequence: SequenceConfig::default(),
            format: ExampleFormat::default(),
            suffix: None,
            label_kind: LabelKind::ForwardValue,
        }
    }

    /// Exporter matching a pipeline configuration.
    pub fn from_config<P: AsRef<Path>>(output_dir: P, config: &PipelineConfig) -> Self {
        Self::new(output_dir, config.keys.clone())
            .with_split(config.split)
            .with_sequence(config.sequence.clone())
            .with_format(config.format)
            .with_label_kind(config.labels.kind)
    }

    pub fn with_split(mut self, split: SplitConfig) -> Self {
        self.split = split;
        self
    }

    pub fn with_sequence(mut self, sequence: SequenceConfig) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_format(mut self, format: ExampleFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn with_label_kind(mut self, kind: LabelKind) -> Self {
        self.label_kind = kind;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn suffix(&self) -> &str {
        self.suffix
            .as_deref()
            .unwrap_or_else(|| self.format.default_suffix())
    }

    /// Path of one partition's array for `company`.
    pub fn partition_path(&self, company: &str, partition: Partition) -> PathBuf {
        self.output_dir
            .join(company)
            .join(format!("{}{}.npy", partition.name(), self.suffix()))
    }

    /// Build the examples of every partition without writing anything.
    ///
    /// Fails with [`PipelineError::EmptyPartition`] if any partition ends up
    /// without examples.
    pub fn build_examples(&self, frame: &FeatureFrame) -> Result<Vec<(Partition, Examples, Vec<NaiveDate>)>> {
        self.split.validate().map_err(PipelineError::Config)?;
        let ranges = self.split.split_indices(frame.dates());

        let mut out = Vec::with_capacity(3);
        for partition in Partition::all() {
            let range = ranges.get(partition);
            let (examples, dates) = match self.format {
                ExampleFormat::Flat => {
                    let dates = frame.dates()[range.clone()].to_vec();
                    (Examples::Flat(create_example(frame, &self.keys, range)?), dates)
                }
                ExampleFormat::Sequential => {
                    let batch =
                        create_example_sequential(frame, &self.keys, range, &self.sequence)?;
                    (Examples::Sequential(batch.windows), batch.end_dates)
                }
            };
            if examples.is_empty() {
                tracing::warn!(partition = %partition, "partition has no examples");
                return Err(PipelineError::EmptyPartition(partition.name().to_string()));
            }
            out.push((partition, examples, dates));
        }
        Ok(out)
    }

    /// Export a feature CSV written by an earlier extraction run.
    ///
    /// The file is validated like a freshly extracted frame; features are
    /// not recomputed.
    pub fn export_csv<P: AsRef<Path>>(&self, company: &str, path: P) -> Result<ExportMetadata> {
        let frame = FeatureFrame::read_csv(path.as_ref())?;
        check_data(&frame)?;
        self.export_company(company, &frame)
    }

    /// Export one company's frame. Nothing is written unless all three
    /// partitions have examples.
    pub fn export_company(&self, company: &str, frame: &FeatureFrame) -> Result<ExportMetadata> {
        let built = self.build_examples(frame)?;

        let company_dir = self.output_dir.join(company);
        fs::create_dir_all(&company_dir)?;

        let mut partitions = Vec::with_capacity(built.len());
        for (partition, examples, dates) in built {
            let path = self.partition_path(company, partition);
            examples.write_npy(&path)?;
            tracing::info!(
                company,
                partition = %partition,
                shape = ?examples.shape(),
                path = %path.display(),
                "exported partition"
            );
            partitions.push(PartitionSummary {
                partition,
                n_examples: examples.len(),
                shape: examples.shape(),
                first_date: dates.first().copied(),
                last_date: dates.last().copied(),
                label_stats: LabelStats::from_labels(&examples.labels(), self.label_kind),
                path,
            });
        }

        let sequential = self.format == ExampleFormat::Sequential;
        let metadata = ExportMetadata {
            company: company.to_string(),
            format: self.format,
            keys: self.keys.clone(),
            label_column: LABEL_COLUMN.to_string(),
            label_kind: self.label_kind,
            width: self.keys.len() + 1,
            sequence_length: sequential.then_some(self.sequence.sequence_length),
            stride: sequential.then_some(self.sequence.stride),
            split: self.split,
            partitions,
            n_rows: frame.len(),
            export_timestamp: chrono::Utc::now().to_rfc3339(),
        };

        let metadata_path = company_dir.join("metadata.json");
        serde_json::to_writer_pretty(File::create(&metadata_path)?, &metadata)?;
        tracing::info!(path = %metadata_path.display(), "exported metadata");

        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray_npy::ReadNpyExt;
    use tempfile::TempDir;

    /// One row per month from 2010-01 to 2016-12; Close = row index, Label = 10 * index.
    fn frame() -> FeatureFrame {
        let dates: Vec<NaiveDate> = (0..84)
            .map(|i| NaiveDate::from_ymd_opt(2010 + i / 12, (i % 12) as u32 + 1, 15).unwrap())
            .collect();
        let n = dates.len();
        let mut frame = FeatureFrame::new(dates);
        frame
            .push_column("Close", (0..n).map(|i| i as f64).collect())
            .unwrap();
        frame
            .push_column("Volume", (0..n).map(|i| 100.0 + i as f64).collect())
            .unwrap();
        frame
            .push_column(LABEL_COLUMN, (0..n).map(|i| 10.0 * i as f64).collect())
            .unwrap();
        frame
    }

    fn keys() -> Vec<String> {
        vec!["Close".to_string(), "Volume".to_string()]
    }

    #[test]
    fn test_flat_examples() {
        let f = frame();
        let ex = create_example(&f, &keys(), 0..24).unwrap();
        assert_eq!(ex.dim(), (24, 3));
        assert_eq!(ex[[5, 0]], 5.0);
        assert_eq!(ex[[5, 2]], 50.0);
    }

    #[test]
    fn test_sequential_examples_reach_back_before_range() {
        let f = frame();
        let batch = create_example_sequential(&f, &keys(), 24..60, &SequenceConfig::new(6, 1)).unwrap();
        // one window per row of the range
        assert_eq!(batch.windows.dim(), (36, 6, 3));
        assert_eq!(batch.windows[[0, 0, 0]], 24.0);
        assert_eq!(batch.windows[[0, 5, 0]], 19.0);
        assert_eq!(batch.windows[[35, 0, 0]], 59.0);
        assert_eq!(batch.end_dates[0], f.dates()[24]);
    }

    #[test]
    fn test_sequential_examples_at_frame_start() {
        let f = frame();
        let batch = create_example_sequential(&f, &keys(), 0..24, &SequenceConfig::new(6, 1)).unwrap();
        // no history before row 0
        assert_eq!(batch.windows.dim(), (19, 6, 3));
        assert_eq!(batch.windows[[0, 0, 0]], 5.0);
    }

    #[test]
    fn test_sequential_examples_with_stride() {
        let f = frame();
        let batch = create_example_sequential(&f, &keys(), 24..60, &SequenceConfig::new(6, 5)).unwrap();
        let newest: Vec<f64> = batch.windows.slice(s![.., 0, 0]).to_vec();
        assert_eq!(newest, vec![24.0, 29.0, 34.0, 39.0, 44.0, 49.0, 54.0, 59.0]);
    }

    #[test]
    fn test_missing_key() {
        let f = frame();
        assert!(matches!(
            create_example(&f, &["MA_long"], 0..1),
            Err(PipelineError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_export_company_writes_partitions() {
        let dir = TempDir::new().unwrap();
        let exporter = DatasetExporter::new(dir.path(), keys())
            .with_sequence(SequenceConfig::new(4, 1))
            .with_format(ExampleFormat::Sequential);

        let meta = exporter.export_company("ACME", &frame()).unwrap();
        assert_eq!(meta.partitions.len(), 3);
        assert_eq!(meta.width, 3);

        // 24 train months, 36 valid months, 24 test months; only train
        // starts without history
        let train = meta.partition(Partition::Train).unwrap();
        assert_eq!(train.shape, vec![21, 4, 3]);
        assert_eq!(meta.partition(Partition::Valid).unwrap().n_examples, 36);

        let path = dir.path().join("ACME").join("test_seq.npy");
        let arr = Array3::<f64>::read_npy(File::open(path).unwrap()).unwrap();
        assert_eq!(arr.dim(), (24, 4, 3));
        assert_eq!(arr[[0, 0, 0]], 60.0);
        assert_eq!(arr[[0, 3, 0]], 57.0);
        assert_eq!(arr[[23, 0, 2]], 830.0);

        let back = ExportMetadata::load(dir.path().join("ACME").join("metadata.json")).unwrap();
        assert_eq!(back.keys, keys());
        assert_eq!(back.sequence_length, Some(4));
    }

    #[test]
    fn test_flat_export_suffix() {
        let dir = TempDir::new().unwrap();
        let exporter = DatasetExporter::new(dir.path(), keys()).with_format(ExampleFormat::Flat);
        exporter.export_company("ACME", &frame()).unwrap();

        let arr = Array2::<f64>::read_npy(File::open(dir.path().join("ACME/train.npy")).unwrap())
            .unwrap();
        assert_eq!(arr.dim(), (24, 3));

        let custom = DatasetExporter::new(dir.path(), keys())
            .with_format(ExampleFormat::Flat)
            .with_suffix("_v2");
        assert!(custom
            .partition_path("ACME", Partition::Valid)
            .ends_with("ACME/valid_v2.npy"));
    }

    #[test]
    fn test_empty_partition_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut f = frame();
        f = f.slice_rows(0..30); // ends mid-2012: no test rows
        let exporter = DatasetExporter::new(dir.path(), keys()).with_format(ExampleFormat::Flat);
        match exporter.export_company("ACME", &f) {
            Err(PipelineError::EmptyPartition(name)) => assert_eq!(name, "test"),
            other => panic!("expected EmptyPartition, got {:?}", other),
        }
        assert!(!dir.path().join("ACME").exists());
    }

    #[test]
    fn test_export_csv_matches_frame_export() {
        let dir = TempDir::new().unwrap();
        let csv = dir.path().join("ACME-fea.csv");
        frame().write_csv(&csv).unwrap();

        let exporter = DatasetExporter::new(dir.path().join("out"), keys())
            .with_sequence(SequenceConfig::new(4, 1));
        let from_csv = exporter.export_csv("ACME", &csv).unwrap();
        assert_eq!(from_csv.n_rows, 84);
        let shapes: Vec<_> = from_csv.partitions.iter().map(|p| p.shape.clone()).collect();
        assert_eq!(shapes, vec![vec![21, 4, 3], vec![36, 4, 3], vec![24, 4, 3]]);

        assert!(matches!(
            exporter.export_csv("NOPE", dir.path().join("NOPE-fea.csv")),
            Err(PipelineError::MissingInput(_))
        ));
    }

    #[test]
    fn test_labels_of_examples() {
        let flat = Examples::Flat(ndarray::array![[1.0, 2.0], [3.0, 4.0]]);
        assert_eq!(flat.labels(), vec![2.0, 4.0]);
        let seq = Examples::Sequential(
            Array3::from_shape_vec((1, 2, 2), vec![5.0, 6.0, 7.0, 8.0]).unwrap(),
        );
        assert_eq!(seq.labels(), vec![6.0]);
    }
}
