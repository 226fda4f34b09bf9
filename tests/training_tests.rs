//! Training on exported partitions: load, fit, checkpoint, restore.

mod common;

use approx::assert_abs_diff_eq;
use common::default_span_records;
use ndarray::s;
use std::path::Path;
use stock_features::training::{latest_checkpoint, run_dir, Checkpoint};
use stock_features::{
    Estimator, ExampleFormat, ExportedDataset, HParams, LabelConfig, LabelKind, ModelKind,
    Pipeline, PipelineConfig, PriceSeries, ValidationMonitor,
};
use tempfile::TempDir;

const KEYS: [&str; 6] = ["Close", "Open", "Volume", "MA_short", "MACD_long", "PPO_long"];

fn export(dir: &Path, config: PipelineConfig) -> ExportedDataset {
    let pipeline =
        Pipeline::from_config(config.with_keys(KEYS.iter().map(|s| s.to_string()).collect()))
            .unwrap();
    let (frame, _) = pipeline
        .extract(&PriceSeries::new(default_span_records()))
        .unwrap();
    let exporter = pipeline.exporter(dir);
    exporter.export_company("ACME", &frame).unwrap();
    ExportedDataset::load(dir.join("ACME"), exporter.suffix()).unwrap()
}

fn hparams(data: &ExportedDataset) -> HParams {
    HParams {
        sequence_length: data.train.sequence_length(),
        epochs: 3,
        eval_every: 10,
        checkpoint_every: 25,
        ..Default::default()
    }
}

#[test]
fn test_exported_partitions_load() {
    let dir = TempDir::new().unwrap();
    let data = export(dir.path(), PipelineConfig::default());

    assert_eq!(data.label_kind, LabelKind::ForwardValue);
    assert_eq!(data.train.sequence_length(), 20);
    assert_eq!(data.train.n_features(), KEYS.len());
    let metadata = data.metadata.as_ref().unwrap();
    for (dataset, summary) in [&data.train, &data.valid, &data.test]
        .into_iter()
        .zip(&metadata.partitions)
    {
        assert_eq!(dataset.len(), summary.n_examples);
    }

    // the target is the label of the newest row; Close is the first key
    let close_now = data.train.windows().slice(s![.., 0, 0]).to_owned();
    let targets = data.train.targets();
    assert_eq!(targets.len(), close_now.len());
    assert_eq!(targets.slice(s![..-1]), close_now.slice(s![1..]));
}

#[test]
fn test_fit_regression_and_checkpoint() {
    let dir = TempDir::new().unwrap();
    let data = export(&dir.path().join("dataset"), PipelineConfig::default());
    let model_dir = run_dir(dir.path());
    let hp = hparams(&data);

    let mut estimator = Estimator::new(hp.clone(), data.label_kind, data.train.n_features())
        .unwrap()
        .with_model_dir(&model_dir);
    let before = estimator.evaluate(&data.train).unwrap();

    let mut monitor = ValidationMonitor::new(&data.valid, hp.eval_every);
    let report = estimator.fit(&data.train, Some(&mut monitor)).unwrap();
    let after = estimator.evaluate(&data.train).unwrap();

    let batches = data.train.len().div_ceil(hp.batch_size);
    assert_eq!(report.steps, 3 * batches);
    assert_eq!(report.epochs_completed, 3);
    assert!(!report.stopped_early);
    assert!(after.loss < before.loss, "{} !< {}", after.loss, before.loss);
    assert_eq!(monitor.history().len(), report.steps / hp.eval_every);
    assert!(report.best_validation.is_some());

    // periodic checkpoints plus the final one
    assert_eq!(report.checkpoints.len(), report.steps / 25 + usize::from(report.steps % 25 != 0));
    let latest = latest_checkpoint(&model_dir).unwrap().unwrap();
    assert_eq!(Some(&latest), report.checkpoints.last());
    let checkpoint = Checkpoint::load(&latest).unwrap();
    assert_eq!(checkpoint.global_step, report.steps);
    assert!(checkpoint.metrics.is_some());

    let test = estimator.evaluate(&data.test).unwrap();
    assert!(test.loss.is_finite());
    assert_eq!(test.examples, data.test.len());
    assert!(test.accuracy.is_none());
}

#[test]
fn test_restored_estimator_predicts_the_same() {
    let dir = TempDir::new().unwrap();
    let data = export(&dir.path().join("dataset"), PipelineConfig::default());
    let model_dir = dir.path().join("runs");
    let hp = HParams {
        max_steps: Some(30),
        ..hparams(&data)
    };

    let mut estimator = Estimator::new(hp, data.label_kind, data.train.n_features())
        .unwrap()
        .with_model_dir(&model_dir);
    estimator.fit(&data.train, None).unwrap();
    assert_eq!(estimator.global_step(), 30);

    let restored = Estimator::restore_from(latest_checkpoint(&model_dir).unwrap().unwrap()).unwrap();
    assert_eq!(restored.global_step(), 30);
    let a = estimator.predict(data.test.windows()).unwrap();
    let b = restored.predict(data.test.windows()).unwrap();
    for (x, y) in a.iter().zip(b.iter()) {
        assert_abs_diff_eq!(*x, *y, epsilon = 1e-6);
    }
}

#[test]
fn test_fit_direction_labels() {
    let dir = TempDir::new().unwrap();
    let data = export(
        dir.path(),
        PipelineConfig::default().with_labels(LabelConfig::direction(1, 0.0)),
    );
    assert_eq!(data.label_kind, LabelKind::Direction);
    assert!(data.train.targets().iter().all(|y| *y == 0.0 || *y == 1.0));

    let mut hp = hparams(&data);
    hp.model.kind = ModelKind::GatedConvNet;
    let mut estimator = Estimator::new(hp, data.label_kind, data.train.n_features()).unwrap();
    let report = estimator.fit(&data.train, None).unwrap();
    assert!(report.checkpoints.is_empty());

    let probabilities = estimator.predict(data.valid.windows()).unwrap();
    assert!(probabilities.iter().all(|p| *p > 0.0 && *p < 1.0));
    let metrics = estimator.evaluate(&data.valid).unwrap();
    let accuracy = metrics.accuracy.unwrap();
    assert!((0.0..=1.0).contains(&accuracy));
}

#[test]
fn test_fit_flat_examples() {
    let dir = TempDir::new().unwrap();
    let data = export(
        dir.path(),
        PipelineConfig::default().with_format(ExampleFormat::Flat),
    );
    assert_eq!(data.train.sequence_length(), 1);

    let hp = HParams {
        max_steps: Some(5),
        ..hparams(&data)
    };
    let mut estimator = Estimator::new(hp, data.label_kind, data.train.n_features()).unwrap();
    let report = estimator.fit(&data.train, None).unwrap();
    assert_eq!(report.steps, 5);
    assert!(estimator.evaluate(&data.test).unwrap().loss.is_finite());
}
