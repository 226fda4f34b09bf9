//! Input readers over exported partitions.
//!
//! An exported array holds the label in its last column. [`Dataset`] splits
//! it into `(n, T, K)` windows and a target per window taken from the newest
//! row (`t = 0`). Flat `(n, K + 1)` arrays load as windows with `T = 1`.

use crate::error::{PipelineError, Result};
use crate::export::{ExportMetadata, Partition};
use crate::labeling::LabelKind;
use ndarray::{s, Array1, Array3, ArrayD, ArrayView1, ArrayView3, Axis, Ix2, Ix3};
use ndarray_npy::ReadNpyExt;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Standard deviations below this are treated as 1.
pub const MIN_STD: f64 = 1e-8;

/// Windows and their targets.
#[derive(Debug, Clone)]
pub struct Dataset {
    windows: Array3<f64>,
    targets: Array1<f64>,
}

impl Dataset {
    pub fn new(windows: Array3<f64>, targets: Array1<f64>) -> Result<Self> {
        if windows.shape()[0] != targets.len() {
            return Err(PipelineError::Validation(format!(
                "{} windows but {} targets",
                windows.shape()[0],
                targets.len()
            )));
        }
        Ok(Self { windows, targets })
    }

    /// Split exported examples into feature windows and targets.
    pub fn from_examples(examples: ArrayD<f64>) -> Result<Self> {
        let examples = match examples.ndim() {
            2 => {
                let flat = examples.into_dimensionality::<Ix2>()?;
                let (n, width) = flat.dim();
                flat.into_shape((n, 1, width))?
            }
            3 => examples.into_dimensionality::<Ix3>()?,
            d => {
                return Err(PipelineError::Validation(format!(
                    "expected a 2-d or 3-d example array, got {d} dimensions"
                )))
            }
        };
        let width = examples.shape()[2];
        if width < 2 {
            return Err(PipelineError::Validation(format!(
                "examples need at least one feature and a label, got width {width}"
            )));
        }
        let label = width - 1;
        let windows = examples.slice(s![.., .., ..label]).to_owned();
        let targets = examples.slice(s![.., 0, label]).to_owned();
        Self::new(windows, targets)
    }

    pub fn load_npy<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PipelineError::MissingInput(path.to_path_buf()));
        }
        let reader = BufReader::new(File::open(path)?);
        let examples = ArrayD::<f64>::read_npy(reader)?;
        let dataset = Self::from_examples(examples)?;
        tracing::debug!(
            path = %path.display(),
            n = dataset.len(),
            sequence_length = dataset.sequence_length(),
            n_features = dataset.n_features(),
            "loaded dataset"
        );
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn sequence_length(&self) -> usize {
        self.windows.shape()[1]
    }

    pub fn n_features(&self) -> usize {
        self.windows.shape()[2]
    }

    pub fn windows(&self) -> ArrayView3<'_, f64> {
        self.windows.view()
    }

    pub fn targets(&self) -> ArrayView1<'_, f64> {
        self.targets.view()
    }

    /// Windows and targets at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> (Array3<f64>, Array1<f64>) {
        (
            self.windows.select(Axis(0), indices),
            self.targets.select(Axis(0), indices),
        )
    }
}

/// The three partitions exported for one company.
#[derive(Debug, Clone)]
pub struct ExportedDataset {
    pub train: Dataset,
    pub valid: Dataset,
    pub test: Dataset,
    pub label_kind: LabelKind,
    pub metadata: Option<ExportMetadata>,
}

impl ExportedDataset {
    /// Load `{train,valid,test}{suffix}.npy` from a company directory.
    ///
    /// The label kind comes from `metadata.json` when present and defaults
    /// to a forward value otherwise.
    pub fn load<P: AsRef<Path>>(company_dir: P, suffix: &str) -> Result<Self> {
        let dir = company_dir.as_ref();
        let metadata_path = dir.join("metadata.json");
        let metadata = if metadata_path.exists() {
            Some(ExportMetadata::load(&metadata_path)?)
        } else {
            tracing::warn!(dir = %dir.display(), "no metadata.json, assuming forward value labels");
            None
        };
        let label_kind = metadata
            .as_ref()
            .map_or(LabelKind::ForwardValue, |m| m.label_kind);

        let load = |p: Partition| Dataset::load_npy(partition_file(dir, p, suffix));
        let dataset = Self {
            train: load(Partition::Train)?,
            valid: load(Partition::Valid)?,
            test: load(Partition::Test)?,
            label_kind,
            metadata,
        };
        if dataset.valid.n_features() != dataset.train.n_features()
            || dataset.test.n_features() != dataset.train.n_features()
        {
            return Err(PipelineError::Validation(
                "partitions have different feature counts".to_string(),
            ));
        }
        Ok(dataset)
    }
}

pub fn partition_file(company_dir: &Path, partition: Partition, suffix: &str) -> PathBuf {
    company_dir.join(format!("{}{}.npy", partition.name(), suffix))
}

/// Per-feature z-score over every row of every window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl FeatureScaler {
    pub fn identity(n_features: usize) -> Self {
        Self {
            mean: vec![0.0; n_features],
            std: vec![1.0; n_features],
        }
    }

    pub fn fit(windows: ArrayView3<'_, f64>) -> Self {
        let k = windows.shape()[2];
        let rows = windows.shape()[0] * windows.shape()[1];
        if rows == 0 {
            return Self::identity(k);
        }
        let n = rows as f64;

        let mut mean = vec![0.0; k];
        for lane in windows.lanes(Axis(2)) {
            for (m, v) in mean.iter_mut().zip(lane.iter()) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = vec![0.0; k];
        for lane in windows.lanes(Axis(2)) {
            for ((s, v), m) in var.iter_mut().zip(lane.iter()).zip(&mean) {
                *s += (v - m).powi(2);
            }
        }
        let std = var
            .into_iter()
            .map(|s| {
                let sd = (s / n).sqrt();
                if sd < MIN_STD {
                    1.0
                } else {
                    sd
                }
            })
            .collect();

        Self { mean, std }
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, windows: ArrayView3<'_, f64>) -> Result<Array3<f64>> {
        if windows.shape()[2] != self.n_features() {
            return Err(PipelineError::Validation(format!(
                "scaler fitted on {} features, got {}",
                self.n_features(),
                windows.shape()[2]
            )));
        }
        let mut out = windows.to_owned();
        out -= &Array1::from(self.mean.clone());
        out /= &Array1::from(self.std.clone());
        Ok(out)
    }
}

/// Affine scaling of regression targets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetScaler {
    pub mean: f64,
    pub std: f64,
}

impl Default for TargetScaler {
    fn default() -> Self {
        Self { mean: 0.0, std: 1.0 }
    }
}

impl TargetScaler {
    /// Direction labels are already in `{0, 1}` and stay unscaled.
    pub fn fit(targets: ArrayView1<'_, f64>, kind: LabelKind) -> Self {
        if kind == LabelKind::Direction || targets.is_empty() {
            return Self::default();
        }
        let mean = targets.mean().unwrap_or(0.0);
        let std = targets.std(0.0);
        Self {
            mean,
            std: if std < MIN_STD { 1.0 } else { std },
        }
    }

    pub fn scale(&self, y: f64) -> f64 {
        (y - self.mean) / self.std
    }

    pub fn unscale(&self, y: f64) -> f64 {
        y * self.std + self.mean
    }
}

/// Yields index batches over a dataset of `len` examples.
#[derive(Debug)]
pub struct InputReader {
    len: usize,
    batch_size: usize,
    rng: Option<StdRng>,
}

impl InputReader {
    /// Sequential batches, in dataset order.
    pub fn new(len: usize, batch_size: usize) -> Self {
        Self {
            len,
            batch_size: batch_size.max(1),
            rng: None,
        }
    }

    /// Reshuffle the order at the start of every epoch.
    pub fn shuffled(mut self, seed: u64) -> Self {
        self.rng = Some(StdRng::seed_from_u64(seed));
        self
    }

    /// Batches of one pass over the data; the last one may be short.
    pub fn epoch(&mut self) -> Vec<Vec<usize>> {
        let mut order: Vec<usize> = (0..self.len).collect();
        if let Some(rng) = self.rng.as_mut() {
            order.shuffle(rng);
        }
        order
            .chunks(self.batch_size)
            .map(<[usize]>::to_vec)
            .collect()
    }

    pub fn batches_per_epoch(&self) -> usize {
        self.len.div_ceil(self.batch_size)
    }
}
