//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use chrono::{Days, NaiveDate};
use std::fmt::Write as _;
use std::path::Path;
use stock_features::{PriceRecord, PriceSeries};

pub const VENDOR_HEADER: &str = "Date,Open,High,Low,Close,Volume,Ex-Dividend,Split Ratio,\
Adj. Open,Adj. High,Adj. Low,Adj. Close,Adj. Volume";

/// Close of row `i` of the synthetic series: trend plus two cycles.
pub fn synthetic_close(i: usize) -> f64 {
    let t = i as f64;
    80.0 + 0.02 * t + 4.0 * (t * 0.07).sin() + 1.5 * (t * 0.31).cos()
}

/// `n` rows, one every `step_days`, starting `start`.
pub fn synthetic_records(start: NaiveDate, n: usize, step_days: u64) -> Vec<PriceRecord> {
    (0..n)
        .map(|i| {
            let c = synthetic_close(i);
            PriceRecord::ohlcv(
                start + Days::new(i as u64 * step_days),
                c - 0.3,
                c + 1.1,
                c - 1.2,
                c,
                2_000_000.0 + ((i * 7919) % 1000) as f64 * 500.0,
            )
        })
        .collect()
}

pub fn synthetic_series(start: NaiveDate, n: usize, step_days: u64) -> PriceSeries {
    PriceSeries::new(synthetic_records(start, n, step_days))
}

/// Rows every two days from 2010-01-01 to mid-2016: covers the default
/// train (< 2012), valid (< 2015) and test partitions.
pub fn default_span_records() -> Vec<PriceRecord> {
    synthetic_records(date(2010, 1, 1), 1200, 2)
}

/// Write records in the vendor layout, newest first.
pub fn write_vendor_csv(path: &Path, records: &[PriceRecord]) {
    let mut out = String::from(VENDOR_HEADER);
    out.push('\n');
    for r in records.iter().rev() {
        writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{},{},{}",
            r.date.format("%Y-%m-%d"),
            r.open,
            r.high,
            r.low,
            r.close,
            r.volume,
            r.ex_dividend,
            r.split_ratio,
            r.adj_open,
            r.adj_high,
            r.adj_low,
            r.adj_close,
            r.adj_volume
        )
        .unwrap();
    }
    std::fs::write(path, out).unwrap();
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
