//! Sliding-window sequence building over feature rows.
//!
//! # Architecture
//!
//! - **SequenceBuilder**: Maintains a bounded ring buffer of dated rows
//! - **SequenceConfig**: Sequence length and stride
//! - **Sequence**: One complete window, oldest row first
//!
//! # Memory Management
//!
//! The buffer never holds more than `sequence_length` rows; pushing a row
//! into a full buffer evicts the oldest. Rows are stored as
//! [`FeatureVec`] so a window only clones `Arc` pointers.
//!
//! # Example
//!
//! ```
//! use stock_features::sequence_builder::{SequenceBuilder, SequenceConfig};
//! use chrono::NaiveDate;
//!
//! let mut builder = SequenceBuilder::new(SequenceConfig::new(3, 1), 2).unwrap();
//! let start = NaiveDate::from_ymd_opt(2012, 1, 2).unwrap();
//!
//! let mut windows = 0;
//! for i in 0..5u64 {
//!     builder.push(start + chrono::Days::new(i), vec![i as f64, 0.0]).unwrap();
//!     if builder.try_build_sequence().is_some() {
//!         windows += 1;
//!     }
//! }
//! assert_eq!(windows, 3);
//! ```

use chrono::NaiveDate;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;

/// Shared row vector; windows share rows with the buffer.
pub type FeatureVec = Arc<Vec<f64>>;

/// Error type for sequence building operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    /// Row length doesn't match the builder's width.
    #[error("Row length ({actual}) doesn't match configured width ({expected})")]
    RowWidthMismatch {
        /// Expected number of values per row
        expected: usize,
        /// Actual number of values received
        actual: usize,
    },

    #[error("Invalid sequence configuration: {0}")]
    InvalidConfig(String),
}

/// Configuration for sequence building.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SequenceConfig {
    /// Rows per window (time steps)
    pub sequence_length: usize,

    /// Rows to advance between consecutive windows
    ///
    /// - Stride 1: one window per row, maximum overlap
    /// - Stride = sequence_length: non-overlapping windows
    pub stride: usize,
}

impl SequenceConfig {
    pub fn new(sequence_length: usize, stride: usize) -> Self {
        Self {
            sequence_length,
            stride,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sequence_length == 0 {
            return Err("sequence_length must be > 0".to_string());
        }
        if self.stride == 0 {
            return Err("stride must be > 0".to_string());
        }
        Ok(())
    }
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self::new(20, 1)
    }
}

#[derive(Debug, Clone)]
struct Snapshot {
    date: NaiveDate,
    row: FeatureVec,
}

/// A complete window of consecutive rows.
#[derive(Debug, Clone)]
pub struct Sequence {
    /// Rows in chronological order: `rows[t][feature]`
    pub rows: Vec<FeatureVec>,

    /// Date of the oldest row
    pub start_date: NaiveDate,

    /// Date of the newest row
    pub end_date: NaiveDate,

    pub length: usize,
}

impl Sequence {
    /// Rows concatenated oldest first, `[length * width]`.
    pub fn as_flat(&self) -> Vec<f64> {
        let width = self.rows.first().map_or(0, |r| r.len());
        let mut flat = Vec::with_capacity(self.rows.len() * width);
        for row in &self.rows {
            flat.extend_from_slice(row);
        }
        flat
    }
}

/// Sliding-window builder over a stream of dated rows.
///
/// This struct is NOT thread-safe. Use one builder per partition.
pub struct SequenceBuilder {
    config: SequenceConfig,

    width: usize,

    /// Oldest rows at the front, newest at the back.
    buffer: VecDeque<Snapshot>,

    /// Rows pushed since the last window (for stride tracking)
    rows_since_last: usize,

    /// No window built yet
    first_pending: bool,
}

impl SequenceBuilder {
    /// Create a builder for rows of `width` values.
    pub fn new(config: SequenceConfig, width: usize) -> Result<Self, SequenceError> {
        config.validate().map_err(SequenceError::InvalidConfig)?;
        if width == 0 {
            return Err(SequenceError::InvalidConfig("width must be > 0".to_string()));
        }
        Ok(Self {
            buffer: VecDeque::with_capacity(config.sequence_length),
            config,
            width,
            rows_since_last: 0,
            first_pending: true,
        })
    }

    pub fn config(&self) -> &SequenceConfig {
        &self.config
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Push a row, evicting the oldest if the buffer is full.
    #[inline]
    pub fn push(&mut self, date: NaiveDate, row: Vec<f64>) -> Result<(), SequenceError> {
        self.push_arc(date, Arc::new(row))
    }

    pub fn push_arc(&mut self, date: NaiveDate, row: FeatureVec) -> Result<(), SequenceError> {
        if row.len() != self.width {
            return Err(SequenceError::RowWidthMismatch {
                expected: self.width,
                actual: row.len(),
            });
        }

        if self.buffer.len() >= self.config.sequence_length {
            self.buffer.pop_front();
        }

        self.buffer.push_back(Snapshot { date, row });
        self.rows_since_last += 1;
        Ok(())
    }

    /// Build a window ending at the newest row, if the buffer is full and
    /// at least `stride` rows arrived since the previous window.
    pub fn try_build_sequence(&mut self) -> Option<Sequence> {
        if self.buffer.len() < self.config.sequence_length {
            return None;
        }

        if !self.first_pending && self.rows_since_last < self.config.stride {
            return None;
        }

        let start_date = self.buffer.front()?.date;
        let end_date = self.buffer.back()?.date;
        let rows: Vec<FeatureVec> = self.buffer.iter().map(|s| Arc::clone(&s.row)).collect();

        self.rows_since_last = 0;
        self.first_pending = false;

        Some(Sequence {
            length: rows.len(),
            rows,
            start_date,
            end_date,
        })
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_ready(&self) -> bool {
        self.buffer.len() >= self.config.sequence_length
    }
}
