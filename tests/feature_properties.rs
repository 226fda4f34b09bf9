//! Feature derivation properties.
//!
//! Lag alignment, EMA convergence, MACD construction, partition coverage and
//! window reshaping, checked on extracted frames rather than single helpers.

mod common;

use approx::assert_relative_eq;
use common::{date, synthetic_series};
use stock_features::export::{Partition, SplitConfig};
use stock_features::features::columns;
use stock_features::features::moving_average::compute_ema;
use stock_features::sequence_builder::{build_sequences, flatten_rows, reshape_window};
use stock_features::{
    FeatureConfig, FeatureExtractor, LabelConfig, PipelineError, PriceField, PriceRecord,
    PriceSeries, SequenceConfig,
};

fn constant_close_series(n: usize, close: f64) -> PriceSeries {
    let start = date(2014, 3, 3);
    PriceSeries::new(
        (0..n)
            .map(|i| {
                PriceRecord::ohlcv(
                    start + chrono::Days::new(i as u64),
                    close,
                    close + 1.0,
                    close - 1.0,
                    close,
                    5_000.0,
                )
            })
            .collect(),
    )
}

// ============================================================================
// Lags
// ============================================================================

#[test]
fn test_lag_references_k_rows_earlier() {
    let config = FeatureConfig::default().with_lag_depth(5);
    let extractor = FeatureExtractor::new(config, LabelConfig::default());
    let frame = extractor
        .extract(&synthetic_series(date(2011, 1, 1), 120, 1))
        .unwrap();

    for field in [PriceField::Close, PriceField::Open, PriceField::Volume] {
        let base = frame.require_column(field.column_name()).unwrap();
        for k in 1..=5 {
            let lagged = frame
                .require_column(&format!("{}-{}", field.column_name(), k))
                .unwrap();
            for i in 0..frame.len() {
                if i < k {
                    assert!(lagged[i].is_nan(), "{field}-{k} row {i} should be undefined");
                } else {
                    assert_eq!(lagged[i], base[i - k], "{field}-{k} row {i}");
                }
            }
        }
    }
}

#[test]
fn test_lag_alignment_survives_truncation() {
    let extractor = FeatureExtractor::new(FeatureConfig::default(), LabelConfig::default());
    let series = synthetic_series(date(2011, 1, 1), 200, 1);
    let bounds = stock_features::DateBounds::new(Some(date(2011, 3, 1)), Some(date(2011, 6, 30)));
    let frame = extractor.extract_truncated(&series, &bounds).unwrap();

    assert_eq!(frame.dates().first(), Some(&date(2011, 3, 1)));
    assert_eq!(frame.dates().last(), Some(&date(2011, 6, 30)));

    let close = series.column(PriceField::Close);
    let offset = 59; // 2011-03-01 is row 59 of the series
    let lag = frame.require_column("Close-19").unwrap();
    for (i, v) in lag.iter().enumerate() {
        assert_eq!(*v, close[offset + i - 19]);
    }
    assert!(frame
        .column_names()
        .iter()
        .all(|name| frame.require_column(name).unwrap().iter().all(|v| v.is_finite())));
}

// ============================================================================
// Moving averages
// ============================================================================

#[test]
fn test_constant_close_moving_average() {
    // 25 rows of close = 100: the 5-day average is 100 from the 5th row on
    let config = FeatureConfig::default()
        .with_lag_depth(3)
        .with_ema_horizons(5, 10, 20);
    let extractor = FeatureExtractor::new(config, LabelConfig::default());
    let frame = extractor.extract(&constant_close_series(25, 100.0)).unwrap();

    let ma = frame.require_column(columns::MA_SHORT).unwrap();
    assert_eq!(ma.len(), 25);
    assert!(ma[..4].iter().all(|v| v.is_nan()));
    for v in &ma[4..] {
        assert_relative_eq!(*v, 100.0, epsilon = 1e-12);
    }

    // flat prices: no momentum
    let macd = frame.require_column(columns::MACD_LONG).unwrap();
    for v in &macd[19..] {
        assert_relative_eq!(*v, 0.0, epsilon = 1e-12);
    }
}

#[test]
fn test_ema_converges_to_constant() {
    let mut values = vec![10.0; 10];
    values.extend(std::iter::repeat(250.0).take(1000));
    for horizon in [5, 12, 26, 50] {
        let ema = compute_ema(&values, horizon);
        let last = *ema.last().unwrap();
        assert_relative_eq!(last, 250.0, epsilon = 1e-6);
        // monotone approach once the level changes
        let tail = &ema[60..];
        assert!(tail.windows(2).all(|w| w[1] >= w[0] - 1e-12));
    }
}

#[test]
fn test_macd_is_difference_of_averages() {
    let extractor = FeatureExtractor::new(FeatureConfig::default(), LabelConfig::default());
    let frame = extractor
        .extract(&synthetic_series(date(2012, 1, 1), 150, 1))
        .unwrap();

    let short = frame.require_column(columns::MA_SHORT).unwrap();
    let medium = frame.require_column(columns::MA_MEDIUM).unwrap();
    let long = frame.require_column(columns::MA_LONG).unwrap();
    let macd_short = frame.require_column(columns::MACD_SHORT).unwrap();
    let macd_long = frame.require_column(columns::MACD_LONG).unwrap();
    let ppo_long = frame.require_column(columns::PPO_LONG).unwrap();

    for i in 0..frame.len() {
        if long[i].is_nan() {
            assert!(macd_long[i].is_nan());
            continue;
        }
        assert_relative_eq!(macd_short[i], short[i] - medium[i], epsilon = 1e-12);
        assert_relative_eq!(macd_long[i], short[i] - long[i], epsilon = 1e-12);
        assert_relative_eq!(ppo_long[i], 100.0 * macd_long[i] / long[i], epsilon = 1e-9);
    }
}

// ============================================================================
// Partitions
// ============================================================================

#[test]
fn test_partitions_exhaustive_and_disjoint() {
    let split = SplitConfig::parse("2012-01-01", "2015-01-01").unwrap();
    let dates: Vec<_> = (0..2000)
        .map(|i| date(2010, 6, 1) + chrono::Days::new(i * 2))
        .collect();
    let ranges = split.split_indices(&dates);

    let train = ranges.get(Partition::Train);
    let valid = ranges.get(Partition::Valid);
    let test = ranges.get(Partition::Test);
    assert_eq!(train.start, 0);
    assert_eq!(train.end, valid.start);
    assert_eq!(valid.end, test.start);
    assert_eq!(test.end, dates.len());

    for (i, d) in dates.iter().enumerate() {
        let expected = split.partition_of(*d);
        let found: Vec<Partition> = Partition::all()
            .into_iter()
            .filter(|p| ranges.get(*p).contains(&i))
            .collect();
        assert_eq!(found, vec![expected], "row {i} ({d})");
    }
    assert!(dates[valid.start] >= date(2012, 1, 1));
    assert!(dates[valid.start - 1] < date(2012, 1, 1));
}

// ============================================================================
// Window reshaping
// ============================================================================

#[test]
fn test_flatten_then_reshape_reverses_rows() {
    let rows: Vec<Vec<f64>> = (0..7)
        .map(|i| (0..4).map(|c| (i * 10 + c) as f64).collect())
        .collect();
    let window = reshape_window(&flatten_rows(&rows), 7, 4).unwrap();
    for j in 0..7 {
        assert_eq!(window.row(j).to_vec(), rows[6 - j]);
    }

    match reshape_window(&flatten_rows(&rows), 5, 4) {
        Err(PipelineError::ReshapeMismatch {
            width,
            sequence_length,
            row_width,
        }) => {
            assert_eq!((width, sequence_length, row_width), (4, 5, 28));
        }
        other => panic!("expected reshape mismatch, got {other:?}"),
    }
}

#[test]
fn test_windows_of_extracted_frame() {
    let extractor = FeatureExtractor::new(FeatureConfig::default(), LabelConfig::default());
    let series = synthetic_series(date(2013, 1, 1), 180, 1);
    let frame = extractor
        .extract_truncated(&series, &Default::default())
        .unwrap();
    let keys = ["Close", "Volume", columns::MA_SHORT];
    let rows = frame.select(&keys).unwrap();

    let batch = build_sequences(frame.dates(), &rows, &SequenceConfig::new(20, 1)).unwrap();
    assert_eq!(batch.len(), frame.len() - 19);
    assert_eq!(batch.windows.dim(), (frame.len() - 19, 20, 3));

    // window n ends at row n + 19 and runs backwards from there
    for n in [0, 17, batch.len() - 1] {
        assert_eq!(batch.end_dates[n], frame.dates()[n + 19]);
        for t in 0..20 {
            assert_eq!(batch.windows.slice(ndarray::s![n, t, ..]), rows.row(n + 19 - t));
        }
    }
}
