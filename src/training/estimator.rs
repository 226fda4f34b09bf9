//! Estimator: fit / evaluate / predict around a [`SequenceModel`].
//!
//! The model encodes windows with the weights it was built with; only the
//! linear readout on top of the encoded features is trained, by mini-batch
//! SGD. Encoded training features are computed once per `fit` call.

use super::hparams::HParams;
use super::input::{Dataset, FeatureScaler, InputReader, TargetScaler};
use super::metrics::{batch_loss, loss_gradient, Metrics};
use crate::error::{PipelineError, Result};
use crate::labeling::LabelKind;
use crate::model::{build_model, sigmoid, Activation, Dense, SequenceModel};
use ndarray::{s, Array1, Array2, ArrayView3, Axis};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

const CHECKPOINT_PREFIX: &str = "checkpoint-";

/// Timestamped run directory under `base`: `runs_<unix seconds>`.
pub fn run_dir<P: AsRef<Path>>(base: P) -> PathBuf {
    base.as_ref()
        .join(format!("runs_{}", chrono::Utc::now().timestamp()))
}

/// Runs evaluation on a held-out dataset every `every_n_steps` steps and
/// tracks the best validation loss.
#[derive(Debug)]
pub struct ValidationMonitor<'a> {
    dataset: &'a Dataset,
    every_n_steps: usize,
    patience: Option<usize>,
    best: Option<(usize, Metrics)>,
    evals_since_best: usize,
    history: Vec<(usize, Metrics)>,
}

impl<'a> ValidationMonitor<'a> {
    pub fn new(dataset: &'a Dataset, every_n_steps: usize) -> Self {
        Self {
            dataset,
            every_n_steps: every_n_steps.max(1),
            patience: None,
            best: None,
            evals_since_best: 0,
            history: Vec::new(),
        }
    }

    /// Request early stopping after `patience` evaluations without improvement.
    pub fn with_patience(mut self, patience: Option<usize>) -> Self {
        self.patience = patience;
        self
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    pub fn should_run(&self, step: usize) -> bool {
        step > 0 && step % self.every_n_steps == 0
    }

    /// Record an evaluation. Returns `true` when training should stop.
    pub fn record(&mut self, step: usize, metrics: Metrics) -> bool {
        self.history.push((step, metrics));
        let improved = self
            .best
            .map_or(true, |(_, best)| metrics.loss < best.loss);
        if improved {
            self.best = Some((step, metrics));
            self.evals_since_best = 0;
        } else {
            self.evals_since_best += 1;
        }
        self.patience
            .is_some_and(|p| self.evals_since_best >= p)
    }

    pub fn best(&self) -> Option<(usize, Metrics)> {
        self.best
    }

    pub fn history(&self) -> &[(usize, Metrics)] {
        &self.history
    }
}

/// Serialized training state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub global_step: usize,
    pub hparams: HParams,
    pub label_kind: LabelKind,
    pub n_features: usize,
    pub readout_weights: Vec<f64>,
    pub readout_bias: f64,
    pub feature_scaler: FeatureScaler,
    pub target_scaler: TargetScaler,
    #[serde(default)]
    pub metrics: Option<Metrics>,
    pub saved_at: String,
}

impl Checkpoint {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}

/// Path of the checkpoint with the highest step in `dir`, if any.
pub fn latest_checkpoint<P: AsRef<Path>>(dir: P) -> Result<Option<PathBuf>> {
    let mut latest: Option<(usize, PathBuf)> = None;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let step = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.strip_prefix(CHECKPOINT_PREFIX))
            .and_then(|s| s.parse::<usize>().ok());
        if let Some(step) = step {
            if latest.as_ref().map_or(true, |(best, _)| step > *best) {
                latest = Some((step, path));
            }
        }
    }
    Ok(latest.map(|(_, path)| path))
}

/// Outcome of [`Estimator::fit`].
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub steps: usize,
    pub epochs_completed: usize,
    pub final_train_loss: f64,
    pub best_validation: Option<(usize, Metrics)>,
    pub stopped_early: bool,
    pub checkpoints: Vec<PathBuf>,
    pub elapsed: std::time::Duration,
}

pub struct Estimator {
    hparams: HParams,
    label_kind: LabelKind,
    n_features: usize,
    model: Box<dyn SequenceModel>,
    readout: Dense,
    feature_scaler: FeatureScaler,
    target_scaler: TargetScaler,
    global_step: usize,
    model_dir: Option<PathBuf>,
}

impl Estimator {
    pub fn new(hparams: HParams, label_kind: LabelKind, n_features: usize) -> Result<Self> {
        hparams.validate().map_err(PipelineError::Config)?;
        let model = build_model(&hparams.model, hparams.sequence_length, n_features)?;
        let readout = Dense::zeros("readout", model.feature_dim(), 1, Activation::Linear);
        Ok(Self {
            hparams,
            label_kind,
            n_features,
            model,
            readout,
            feature_scaler: FeatureScaler::identity(n_features),
            target_scaler: TargetScaler::default(),
            global_step: 0,
            model_dir: None,
        })
    }

    /// Directory checkpoints are written to. Without one nothing is saved.
    pub fn with_model_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.model_dir = Some(dir.into());
        self
    }

    pub fn hparams(&self) -> &HParams {
        &self.hparams
    }

    pub fn label_kind(&self) -> LabelKind {
        self.label_kind
    }

    pub fn model(&self) -> &dyn SequenceModel {
        self.model.as_ref()
    }

    pub fn readout(&self) -> &Dense {
        &self.readout
    }

    pub fn global_step(&self) -> usize {
        self.global_step
    }

    pub fn model_dir(&self) -> Option<&Path> {
        self.model_dir.as_deref()
    }

    fn check_shape(&self, windows: ArrayView3<'_, f64>) -> Result<()> {
        let (_, steps, features) = windows.dim();
        if steps != self.hparams.sequence_length || features != self.n_features {
            return Err(PipelineError::Validation(format!(
                "expected windows of shape (_, {}, {}), got (_, {}, {})",
                self.hparams.sequence_length, self.n_features, steps, features
            )));
        }
        Ok(())
    }

    /// Scale and encode windows in chunks of `eval_batch_size`.
    fn encode(&self, windows: ArrayView3<'_, f64>) -> Result<Array2<f64>> {
        self.check_shape(windows)?;
        let n = windows.shape()[0];
        let mut encoded = Array2::zeros((n, self.model.feature_dim()));
        let chunk = self.hparams.eval_batch_size;
        for start in (0..n).step_by(chunk) {
            let end = (start + chunk).min(n);
            let scaled = self
                .feature_scaler
                .transform(windows.slice(s![start..end, .., ..]))?;
            let out = self.model.encode(scaled.view())?;
            encoded.slice_mut(s![start..end, ..]).assign(&out);
        }
        Ok(encoded)
    }

    fn readout_linear(&self, encoded: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.readout.linear(encoded.view())?.column(0).to_owned())
    }

    /// Predictions in label space: probabilities of `Up` for direction
    /// labels, forward values otherwise.
    pub fn predict(&self, windows: ArrayView3<'_, f64>) -> Result<Array1<f64>> {
        let encoded = self.encode(windows)?;
        let linear = self.readout_linear(&encoded)?;
        Ok(match self.label_kind {
            LabelKind::Direction => linear.mapv(sigmoid),
            LabelKind::ForwardValue => linear.mapv(|z| self.target_scaler.unscale(z)),
        })
    }

    pub fn evaluate(&self, dataset: &Dataset) -> Result<Metrics> {
        let predictions = self.predict(dataset.windows())?;
        Ok(Metrics::compute(
            predictions.view(),
            dataset.targets(),
            self.label_kind,
        ))
    }

    /// Train the readout on `train` for `hparams.epochs` epochs (or
    /// `max_steps`), consulting `monitor` every `every_n_steps` steps.
    ///
    /// Feature and target scalers are fitted on `train` on the first call.
    pub fn fit(
        &mut self,
        train: &Dataset,
        mut monitor: Option<&mut ValidationMonitor<'_>>,
    ) -> Result<TrainingReport> {
        if train.is_empty() {
            return Err(PipelineError::EmptyPartition("train".to_string()));
        }
        self.check_shape(train.windows())?;
        let started = Instant::now();

        if self.global_step == 0 {
            self.feature_scaler = FeatureScaler::fit(train.windows());
            self.target_scaler = TargetScaler::fit(train.targets(), self.label_kind);
        }
        let encoded = self.encode(train.windows())?;
        let targets = train.targets().mapv(|y| self.target_scaler.scale(y));

        let mut reader = InputReader::new(train.len(), self.hparams.batch_size)
            .shuffled(self.hparams.shuffle_seed);
        let mut checkpoints = Vec::new();
        let mut final_train_loss = f64::NAN;
        let mut epochs_completed = 0;
        let mut stopped_early = false;
        let mut steps = 0;

        tracing::info!(
            examples = train.len(),
            batches_per_epoch = reader.batches_per_epoch(),
            epochs = self.hparams.epochs,
            model = self.model.kind().name(),
            "starting training"
        );

        'epochs: for epoch in 0..self.hparams.epochs {
            for indices in reader.epoch() {
                let x = encoded.select(Axis(0), &indices);
                let y = targets.select(Axis(0), &indices);
                let linear = self.readout_linear(&x)?;
                let grad = loss_gradient(linear.view(), y.view(), self.label_kind);
                self.readout.sgd_step(
                    x.view(),
                    grad.insert_axis(Axis(1)).view(),
                    self.hparams.learning_rate,
                );
                self.global_step += 1;
                steps += 1;

                final_train_loss = batch_loss(linear.view(), y.view(), self.label_kind);
                tracing::debug!(step = self.global_step, epoch, loss = final_train_loss, "train step");

                if let Some(monitor) = monitor.as_deref_mut() {
                    if monitor.should_run(self.global_step) {
                        let metrics = self.evaluate(monitor.dataset())?;
                        tracing::info!(
                            step = self.global_step,
                            loss = metrics.loss,
                            mae = metrics.mae,
                            accuracy = ?metrics.accuracy,
                            "validation"
                        );
                        if monitor.record(self.global_step, metrics) {
                            tracing::info!(step = self.global_step, "validation loss stopped improving");
                            stopped_early = true;
                            break 'epochs;
                        }
                    }
                }

                if self.hparams.checkpoint_every > 0
                    && self.global_step % self.hparams.checkpoint_every == 0
                {
                    if let Some(path) = self.save_checkpoint(None)? {
                        checkpoints.push(path);
                    }
                }

                if self.hparams.max_steps.is_some_and(|max| steps >= max) {
                    epochs_completed = epoch + 1;
                    break 'epochs;
                }
            }
            epochs_completed = epoch + 1;
        }

        let best_validation = monitor.as_ref().and_then(|m| m.best());
        if let Some(path) = self.save_checkpoint(best_validation.map(|(_, m)| m))? {
            if checkpoints.last() != Some(&path) {
                checkpoints.push(path);
            }
        }

        let report = TrainingReport {
            steps,
            epochs_completed,
            final_train_loss,
            best_validation,
            stopped_early,
            checkpoints,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            steps = report.steps,
            epochs = report.epochs_completed,
            loss = report.final_train_loss,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "training finished"
        );
        Ok(report)
    }

    pub fn checkpoint(&self, metrics: Option<Metrics>) -> Checkpoint {
        Checkpoint {
            global_step: self.global_step,
            hparams: self.hparams.clone(),
            label_kind: self.label_kind,
            n_features: self.n_features,
            readout_weights: self.readout.weights().column(0).to_vec(),
            readout_bias: self.readout.bias()[0],
            feature_scaler: self.feature_scaler.clone(),
            target_scaler: self.target_scaler,
            metrics,
            saved_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Write `checkpoint-<step>.json` into the model directory, if one is set.
    pub fn save_checkpoint(&self, metrics: Option<Metrics>) -> Result<Option<PathBuf>> {
        let Some(dir) = &self.model_dir else {
            return Ok(None);
        };
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{CHECKPOINT_PREFIX}{}.json", self.global_step));
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, &self.checkpoint(metrics))?;
        tracing::info!(step = self.global_step, path = %path.display(), "saved checkpoint");
        Ok(Some(path))
    }

    /// Rebuild an estimator from a checkpoint. The model is rebuilt from the
    /// stored hyperparameters, which reproduces its seeded weights.
    pub fn restore(checkpoint: Checkpoint) -> Result<Self> {
        let mut estimator = Self::new(
            checkpoint.hparams,
            checkpoint.label_kind,
            checkpoint.n_features,
        )?;
        let dim = estimator.model.feature_dim();
        if checkpoint.readout_weights.len() != dim
            || checkpoint.feature_scaler.n_features() != checkpoint.n_features
        {
            return Err(PipelineError::Validation(format!(
                "checkpoint readout has {} weights, model encodes {} features",
                checkpoint.readout_weights.len(),
                dim
            )));
        }
        let weights = Array2::from_shape_vec((dim, 1), checkpoint.readout_weights)?;
        estimator
            .readout
            .set_parameters(weights, Array1::from(vec![checkpoint.readout_bias]))?;
        estimator.feature_scaler = checkpoint.feature_scaler;
        estimator.target_scaler = checkpoint.target_scaler;
        estimator.global_step = checkpoint.global_step;
        Ok(estimator)
    }

    pub fn restore_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::restore(Checkpoint::load(path)?)
    }
}
