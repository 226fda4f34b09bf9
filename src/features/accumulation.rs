//! Accumulation/distribution line.

/// Close location value in `[-1, 1]`: where the close sits within the day's range.
///
/// Zero when the range is empty (high == low).
#[inline]
pub fn close_location_value(high: f64, low: f64, close: f64) -> f64 {
    let range = high - low;
    if range == 0.0 {
        0.0
    } else {
        ((close - low) - (high - close)) / range
    }
}

/// Cumulative sum of `CLV * volume`.
///
/// A non-finite input makes that row NaN and leaves the running total
/// unchanged for later rows.
pub fn compute_ad_line(high: &[f64], low: &[f64], close: &[f64], volume: &[f64]) -> Vec<f64> {
    let n = close.len();
    debug_assert!(high.len() == n && low.len() == n && volume.len() == n);

    let mut total = 0.0;
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let flow = close_location_value(high[i], low[i], close[i]) * volume[i];
        if flow.is_finite() {
            total += flow;
            out.push(total);
        } else {
            out.push(f64::NAN);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_clv_bounds() {
        assert_relative_eq!(close_location_value(10.0, 5.0, 10.0), 1.0);
        assert_relative_eq!(close_location_value(10.0, 5.0, 5.0), -1.0);
        assert_relative_eq!(close_location_value(10.0, 5.0, 7.5), 0.0);
        assert_relative_eq!(close_location_value(7.0, 7.0, 7.0), 0.0);
    }

    #[test]
    fn test_ad_line_accumulates() {
        let high = [10.0, 10.0, 10.0];
        let low = [0.0, 0.0, 0.0];
        let close = [10.0, 0.0, 7.5];
        let volume = [100.0, 50.0, 40.0];
        let ad = compute_ad_line(&high, &low, &close, &volume);
        assert_relative_eq!(ad[0], 100.0);
        assert_relative_eq!(ad[1], 50.0);
        assert_relative_eq!(ad[2], 50.0 + 0.5 * 40.0);
    }

    #[test]
    fn test_nan_volume_row() {
        let ad = compute_ad_line(&[2.0, 2.0], &[0.0, 0.0], &[2.0, 2.0], &[f64::NAN, 10.0]);
        assert!(ad[0].is_nan());
        assert_relative_eq!(ad[1], 10.0);
    }
}
