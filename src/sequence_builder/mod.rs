//! Sequence framing for the dataset exporter.
//!
//! A sequence example is a window of `T` consecutive rows of
//! `[key_1, ..., key_K, Label]`, flattened oldest first and then reshaped to
//! `(T, K + 1)` with the newest row first:
//!
//! ```text
//! rows (chronological)    flat                     window (T, K+1)
//! r0 = [a0 .. y0]         [a0 .. y0, a1 .. y1,     [a_{T-1} .. y_{T-1}]
//! r1 = [a1 .. y1]   ->     ..., a_{T-1} .. ]  ->   ...
//! ...                                              [a0 .. y0]
//! ```
//!
//! The training target of a window is therefore `window[0][K]`, the label of
//! its newest row.
//!
//! # Architecture
//!
//! - **SequenceBuilder**: ring buffer producing windows with a stride
//! - **flatten_rows / reshape_window**: the flat <-> window conversion
//! - **build_sequences**: frames a whole partition into `(n, T, K + 1)`
//!
//! # Example
//!
//! ```
//! use stock_features::sequence_builder::{flatten_rows, reshape_window};
//!
//! let rows = vec![vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0]];
//! let window = reshape_window(&flatten_rows(&rows), 3, 2).unwrap();
//! assert_eq!(window.row(0).to_vec(), vec![3.0, 30.0]);
//! assert_eq!(window.row(2).to_vec(), vec![1.0, 10.0]);
//! ```

mod builder;

pub use builder::{FeatureVec, Sequence, SequenceBuilder, SequenceConfig, SequenceError};

use crate::error::{PipelineError, Result};
use chrono::NaiveDate;
use ndarray::{s, Array2, Array3, ArrayView2, Axis};

/// Concatenate rows oldest first.
pub fn flatten_rows<R: AsRef<[f64]>>(rows: &[R]) -> Vec<f64> {
    rows.iter().flat_map(|r| r.as_ref().iter().copied()).collect()
}

/// Reshape a flat chronological row into `(sequence_length, width)`, newest row first.
///
/// Fails with [`PipelineError::ReshapeMismatch`] when the flat length is not
/// exactly `sequence_length * width`.
pub fn reshape_window(flat: &[f64], sequence_length: usize, width: usize) -> Result<Array2<f64>> {
    if sequence_length == 0 || width == 0 || flat.len() != sequence_length * width {
        return Err(PipelineError::ReshapeMismatch {
            width,
            sequence_length,
            row_width: flat.len(),
        });
    }
    let chronological = ArrayView2::from_shape((sequence_length, width), flat)?;
    Ok(chronological.slice(s![..;-1, ..]).to_owned())
}

/// Windows framed from one partition.
#[derive(Debug, Clone)]
pub struct SequenceBatch {
    /// `(n, sequence_length, width)`, each window newest row first
    pub windows: Array3<f64>,

    /// Date of the newest row of each window
    pub end_dates: Vec<NaiveDate>,
}

impl SequenceBatch {
    pub fn len(&self) -> usize {
        self.end_dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.end_dates.is_empty()
    }
}

/// Frame every window of a partition.
///
/// `rows` holds one chronological row per date. Windows never extend past
/// the given rows, so framing partitions separately keeps windows from
/// crossing a partition boundary. Fewer rows than `sequence_length` yield an
/// empty batch.
pub fn build_sequences(
    dates: &[NaiveDate],
    rows: &Array2<f64>,
    config: &SequenceConfig,
) -> Result<SequenceBatch> {
    if dates.len() != rows.nrows() {
        return Err(PipelineError::Validation(format!(
            "{} dates for {} rows",
            dates.len(),
            rows.nrows()
        )));
    }
    let width = rows.ncols();
    let t = config.sequence_length;
    let mut builder = SequenceBuilder::new(config.clone(), width)?;

    let mut data = Vec::new();
    let mut end_dates = Vec::new();
    for (date, row) in dates.iter().zip(rows.axis_iter(Axis(0))) {
        builder.push(*date, row.to_vec())?;
        if let Some(seq) = builder.try_build_sequence() {
            let window = reshape_window(&seq.as_flat(), t, width)?;
            data.extend(window.iter().copied());
            end_dates.push(seq.end_date);
        }
    }

    let windows = Array3::from_shape_vec((end_dates.len(), t, width), data)?;
    Ok(SequenceBatch { windows, end_dates })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2013, 5, 1).unwrap();
        (0..n).map(|i| start + chrono::Days::new(i as u64)).collect()
    }

    #[test]
    fn test_flatten_reshape_reverses_rows() {
        let rows: Vec<Vec<f64>> = (0..5).map(|i| vec![i as f64, i as f64 * 10.0, -1.0]).collect();
        let window = reshape_window(&flatten_rows(&rows), 5, 3).unwrap();
        for (t, row) in window.outer_iter().enumerate() {
            assert_eq!(row.to_vec(), rows[4 - t]);
        }
    }

    #[test]
    fn test_reshape_mismatch() {
        match reshape_window(&[1.0; 7], 2, 3) {
            Err(PipelineError::ReshapeMismatch {
                width,
                sequence_length,
                row_width,
            }) => assert_eq!((width, sequence_length, row_width), (3, 2, 7)),
            other => panic!("expected ReshapeMismatch, got {:?}", other),
        }
        assert!(reshape_window(&[], 0, 3).is_err());
    }

    #[test]
    fn test_build_sequences_shapes_and_targets() {
        let rows = array![[1.0, 0.1], [2.0, 0.2], [3.0, 0.3], [4.0, 0.4]];
        let batch = build_sequences(&dates(4), &rows, &SequenceConfig::new(2, 1)).unwrap();

        assert_eq!(batch.windows.dim(), (3, 2, 2));
        assert_eq!(batch.len(), 3);
        // newest row first; the target sits at [0, K]
        assert_eq!(batch.windows[[0, 0, 0]], 2.0);
        assert_eq!(batch.windows[[0, 1, 0]], 1.0);
        assert_eq!(batch.windows[[2, 0, 1]], 0.4);
        assert_eq!(batch.end_dates[2], dates(4)[3]);
    }

    #[test]
    fn test_build_sequences_too_short() {
        let rows = array![[1.0], [2.0]];
        let batch = build_sequences(&dates(2), &rows, &SequenceConfig::new(3, 1)).unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.windows.dim(), (0, 3, 1));
    }

    #[test]
    fn test_build_sequences_date_count_mismatch() {
        let rows = array![[1.0], [2.0]];
        assert!(build_sequences(&dates(3), &rows, &SequenceConfig::new(1, 1)).is_err());
    }
}
