//! Training Driver
//!
//! Reads exported partitions, builds the configured [`SequenceModel`] and
//! fits a linear readout on its encoded windows.
//!
//! ```text
//! <dataset>/<company>/train_seq.npy ─┐
//!                     valid_seq.npy ─┼─> ExportedDataset ─> Estimator::fit ─> runs_<ts>/checkpoint-<step>.json
//!                     test_seq.npy  ─┘                       │
//!                                                            └─ ValidationMonitor (every eval_every steps)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use stock_features::training::{run_dir, Estimator, ExportedDataset, HParams, ValidationMonitor};
//!
//! let hparams = HParams::load_toml("hparams.toml")?;
//! let data = ExportedDataset::load("dataset/apple", "_seq")?;
//! let mut estimator = Estimator::new(hparams.clone(), data.label_kind, data.train.n_features())?
//!     .with_model_dir(run_dir("models"));
//! let mut monitor = ValidationMonitor::new(&data.valid, hparams.eval_every);
//! estimator.fit(&data.train, Some(&mut monitor))?;
//! println!("{:?}", estimator.evaluate(&data.test)?);
//! ```
//!
//! [`SequenceModel`]: crate::model::SequenceModel

mod estimator;
mod hparams;
mod input;
mod metrics;

pub use estimator::{
    latest_checkpoint, run_dir, Checkpoint, Estimator, TrainingReport, ValidationMonitor,
};
pub use hparams::HParams;
pub use input::{
    partition_file, Dataset, ExportedDataset, FeatureScaler, InputReader, TargetScaler, MIN_STD,
};
pub use metrics::{batch_loss, loss_gradient, Metrics};
