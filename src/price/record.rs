//! Price record and series types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A base column of the vendor price file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Volume,
    ExDividend,
    SplitRatio,
    AdjOpen,
    AdjHigh,
    AdjLow,
    AdjClose,
    AdjVolume,
}

impl PriceField {
    /// All fields in vendor column order (excluding the date).
    pub fn all() -> &'static [PriceField] {
        &[
            PriceField::Open,
            PriceField::High,
            PriceField::Low,
            PriceField::Close,
            PriceField::Volume,
            PriceField::ExDividend,
            PriceField::SplitRatio,
            PriceField::AdjOpen,
            PriceField::AdjHigh,
            PriceField::AdjLow,
            PriceField::AdjClose,
            PriceField::AdjVolume,
        ]
    }

    /// Column name as it appears in the feature CSV.
    pub fn column_name(&self) -> &'static str {
        match self {
            PriceField::Open => "Open",
            PriceField::High => "High",
            PriceField::Low => "Low",
            PriceField::Close => "Close",
            PriceField::Volume => "Volume",
            PriceField::ExDividend => "Ex-Dividend",
            PriceField::SplitRatio => "Split Ratio",
            PriceField::AdjOpen => "Adj_Open",
            PriceField::AdjHigh => "Adj_High",
            PriceField::AdjLow => "Adj_Low",
            PriceField::AdjClose => "Adj_Close",
            PriceField::AdjVolume => "Adj_Volume",
        }
    }

    /// Look up a field by its column name.
    pub fn from_column_name(name: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|f| f.column_name() == name)
    }
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// One trading day of OHLCV data plus the vendor's adjusted fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub ex_dividend: f64,
    pub split_ratio: f64,
    pub adj_open: f64,
    pub adj_high: f64,
    pub adj_low: f64,
    pub adj_close: f64,
    pub adj_volume: f64,
}

impl PriceRecord {
    /// Build a record with unadjusted OHLCV values; adjusted fields mirror them.
    pub fn ohlcv(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
            ex_dividend: 0.0,
            split_ratio: 1.0,
            adj_open: open,
            adj_high: high,
            adj_low: low,
            adj_close: close,
            adj_volume: volume,
        }
    }

    #[inline]
    pub fn get(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Open => self.open,
            PriceField::High => self.high,
            PriceField::Low => self.low,
            PriceField::Close => self.close,
            PriceField::Volume => self.volume,
            PriceField::ExDividend => self.ex_dividend,
            PriceField::SplitRatio => self.split_ratio,
            PriceField::AdjOpen => self.adj_open,
            PriceField::AdjHigh => self.adj_high,
            PriceField::AdjLow => self.adj_low,
            PriceField::AdjClose => self.adj_close,
            PriceField::AdjVolume => self.adj_volume,
        }
    }
}

/// A chronologically ordered series of price records for one company.
#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    records: Vec<PriceRecord>,
}

impl PriceSeries {
    /// Build a series, sorting records by date (oldest first).
    pub fn new(mut records: Vec<PriceRecord>) -> Self {
        records.sort_by_key(|r| r.date);
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[PriceRecord] {
        &self.records
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.records.iter().map(|r| r.date).collect()
    }

    /// Extract one field as a column vector.
    pub fn column(&self, field: PriceField) -> Vec<f64> {
        self.records.iter().map(|r| r.get(field)).collect()
    }

    /// First and last date of the series.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.records.first(), self.records.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date)),
            _ => None,
        }
    }
}
