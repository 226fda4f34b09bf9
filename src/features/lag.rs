//! Lagged and forward-shifted copies of a series.
//!
//! Positions that would reference data outside the series are NaN. The
//! truncation step drops those rows instead of imputing them.

/// Copy of `values` delayed by `k` periods: `out[i] = values[i - k]`.
///
/// The first `k` entries are NaN.
///
/// # Example
///
/// ```
/// use stock_features::features::lag::compute_delay;
///
/// let delayed = compute_delay(&[1.0, 2.0, 3.0, 4.0], 2);
/// assert!(delayed[0].is_nan() && delayed[1].is_nan());
/// assert_eq!(&delayed[2..], &[1.0, 2.0]);
/// ```
pub fn compute_delay(values: &[f64], k: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if k < n {
        out[k..].copy_from_slice(&values[..n - k]);
    }
    out
}

/// Copy of `values` advanced by `k` periods: `out[i] = values[i + k]`.
///
/// The last `k` entries are NaN. Used for forward-looking targets.
pub fn compute_lead(values: &[f64], k: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if k < n {
        out[..n - k].copy_from_slice(&values[k..]);
    }
    out
}

/// Column name of a lag feature, e.g. `Close-3`.
pub fn lag_column_name(field: &str, k: usize) -> String {
    format!("{field}-{k}")
}

/// Column name of a forward value, e.g. `Close+1`.
pub fn lead_column_name(field: &str, k: usize) -> String {
    format!("{field}+{k}")
}
