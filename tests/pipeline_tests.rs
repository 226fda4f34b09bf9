//! End-to-end pipeline tests on vendor CSV files.

mod common;

use common::{date, default_span_records, synthetic_records, write_vendor_csv};
use std::fs;
use stock_features::batch::{BatchProcessor, CompanyJob};
use stock_features::export::dataset_config::{CompanyConfig, DataPathConfig};
use stock_features::export::Partition;
use stock_features::{
    read_price_csv, DatasetConfig, ErrorMode, FeatureFrame, Pipeline, PipelineConfig,
    PipelineError, PriceSeries,
};
use tempfile::TempDir;

#[test]
fn test_reader_sorts_newest_first_input() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ACME.csv");
    let records = synthetic_records(date(2014, 1, 1), 30, 1);
    write_vendor_csv(&path, &records);

    let series = read_price_csv(&path).unwrap();
    assert_eq!(series.len(), 30);
    assert_eq!(series.date_range(), Some((date(2014, 1, 1), date(2014, 1, 30))));
    for (read, written) in series.records().iter().zip(&records) {
        assert_eq!(read, written);
    }
}

#[test]
fn test_process_company_end_to_end() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("raw").join("ACME.csv");
    fs::create_dir_all(input.parent().unwrap()).unwrap();
    write_vendor_csv(&input, &default_span_records());
    let features_path = dir.path().join("features").join("ACME-fea.csv");
    let output_dir = dir.path().join("dataset");

    let pipeline = Pipeline::from_config(PipelineConfig::default()).unwrap();
    let output = pipeline
        .process_company("ACME", &input, Some(&features_path), &output_dir)
        .unwrap();

    // same rows as extracting the in-memory series
    let (expected, _) = pipeline
        .extract(&PriceSeries::new(default_span_records()))
        .unwrap();
    assert_eq!(output.raw_rows, 1200);
    assert_eq!(output.rows, expected.len());
    assert_eq!(output.columns, expected.num_columns());
    assert!(output.validation.is_valid());

    let written = FeatureFrame::read_csv(&features_path).unwrap();
    assert_eq!(written.len(), expected.len());
    assert_eq!(written.column_names(), expected.column_names());
    assert!(written.dates().windows(2).all(|w| w[0] < w[1]));
    assert_eq!(written.column("MACD_long"), expected.column("MACD_long"));

    for partition in Partition::all() {
        let summary = output.export.partition(partition).unwrap();
        assert!(summary.path.starts_with(output_dir.join("ACME")));
        assert!(summary.path.exists());
        assert!(summary.n_examples > 0);
    }
    assert!(output_dir.join("ACME").join("metadata.json").exists());
}

#[test]
fn test_process_company_missing_input() {
    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::from_config(PipelineConfig::default()).unwrap();
    let result = pipeline.process_company("NOPE", dir.path().join("NOPE.csv"), None, dir.path());
    assert!(matches!(result, Err(PipelineError::MissingInput(_))));
}

#[test]
fn test_process_company_too_short() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("TINY.csv");
    write_vendor_csv(&input, &synthetic_records(date(2014, 1, 1), 30, 1));

    let pipeline = Pipeline::from_config(PipelineConfig::default()).unwrap();
    match pipeline.process_company("TINY", &input, None, dir.path()) {
        Err(PipelineError::InsufficientRows {
            required,
            available,
        }) => {
            assert_eq!(required, 51);
            assert_eq!(available, 30);
        }
        other => panic!("expected insufficient rows, got {other:?}"),
    }
}

fn dataset_config(dir: &TempDir, names: &[&str]) -> DatasetConfig {
    let input_dir = dir.path().join("raw");
    fs::create_dir_all(&input_dir).unwrap();
    DatasetConfig::new(
        CompanyConfig::new(names.iter().map(|s| s.to_string()).collect()),
        DataPathConfig::new(
            &input_dir,
            dir.path().join("features"),
            dir.path().join("dataset"),
        ),
    )
}

#[test]
fn test_conf_file_bounds_applied() {
    let dir = TempDir::new().unwrap();
    let mut config = dataset_config(&dir, &["ACME"]);
    write_vendor_csv(&config.raw_path("ACME"), &default_span_records());

    let conf = dir.path().join("dates.conf");
    fs::write(
        &conf,
        "; date bounds\n[DATE]\nstart_time: 2011-01-01 00:00:00\nend_time = \"2016-03-31\"\n",
    )
    .unwrap();
    config.data = config.data.clone().with_conf_file(&conf);
    config.processing.threads = Some(1);

    let processor = BatchProcessor::from_dataset_config(&config).unwrap();
    let output = processor
        .process_jobs(&CompanyJob::from_dataset_config(&config))
        .unwrap();
    assert!(output.all_successful());

    let features = FeatureFrame::read_csv(config.feature_path("ACME")).unwrap();
    assert!(*features.dates().first().unwrap() >= date(2011, 1, 1));
    assert!(*features.dates().last().unwrap() <= date(2016, 3, 31));
    assert_eq!(output.results[0].output.rows, features.len());
}

#[test]
fn test_batch_collects_errors() {
    let dir = TempDir::new().unwrap();
    let mut config = dataset_config(&dir, &["AAA", "MISSING", "BBB"]);
    write_vendor_csv(&config.raw_path("AAA"), &default_span_records());
    write_vendor_csv(
        &config.raw_path("BBB"),
        &synthetic_records(date(2010, 2, 1), 1100, 2),
    );
    config.processing.error_mode = ErrorMode::CollectErrors;
    config.processing.threads = Some(2);

    let processor = BatchProcessor::from_dataset_config(&config).unwrap();
    let output = processor
        .process_jobs(&CompanyJob::from_dataset_config(&config))
        .unwrap();

    assert_eq!(output.successful_count(), 2);
    assert_eq!(output.failed_count(), 1);
    assert!(!output.all_successful());
    assert_eq!(output.errors[0].company, "MISSING");

    let mut done: Vec<_> = output.results.iter().map(|r| r.company.as_str()).collect();
    done.sort_unstable();
    assert_eq!(done, vec!["AAA", "BBB"]);
    for name in ["AAA", "BBB"] {
        assert!(config.data.output_dir.join(name).join("metadata.json").exists());
        assert!(config.feature_path(name).exists());
    }
    assert!(!config.data.output_dir.join("MISSING").exists());
}

#[test]
fn test_export_from_stored_features() {
    let dir = TempDir::new().unwrap();
    let mut config = dataset_config(&dir, &["ACME"]);
    write_vendor_csv(&config.raw_path("ACME"), &default_span_records());
    config.processing.threads = Some(1);

    let processor = BatchProcessor::from_dataset_config(&config).unwrap();
    let extracted = processor
        .process_jobs(&CompanyJob::from_dataset_config(&config))
        .unwrap();
    assert!(extracted.all_successful());
    let extracted_train = fs::read(config.data.output_dir.join("ACME/train_seq.npy")).unwrap();

    // drop the raw file and the arrays: only the feature CSV remains
    fs::remove_file(config.raw_path("ACME")).unwrap();
    fs::remove_dir_all(&config.data.output_dir).unwrap();

    let jobs = CompanyJob::from_feature_files(&config);
    assert_eq!(jobs[0].input, config.feature_path("ACME"));
    let output = processor.process_jobs(&jobs).unwrap();
    assert!(output.all_successful());

    let first = &extracted.results[0].output;
    let second = &output.results[0].output;
    assert_eq!(second.rows, first.rows);
    assert_eq!(second.columns, first.columns);
    for (a, b) in first.export.partitions.iter().zip(&second.export.partitions) {
        assert_eq!(a.shape, b.shape);
        assert_eq!(a.first_date, b.first_date);
        assert_eq!(a.last_date, b.last_date);
    }
    let reexported = fs::read(config.data.output_dir.join("ACME/train_seq.npy")).unwrap();
    assert_eq!(reexported, extracted_train);
}

#[test]
fn test_batch_fail_fast() {
    let dir = TempDir::new().unwrap();
    let mut config = dataset_config(&dir, &["MISSING"]);
    config.processing.write_features = false;

    let processor = BatchProcessor::from_dataset_config(&config).unwrap();
    let jobs = CompanyJob::from_dataset_config(&config);
    assert_eq!(jobs[0].features_path, None);
    assert!(processor.process_jobs(&jobs).is_err());
}
