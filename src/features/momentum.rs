//! MACD and PPO momentum indicators.
//!
//! ```text
//! MACD(fast, slow) = EMA(fast) - EMA(slow)
//! PPO(fast, slow)  = 100 * MACD(fast, slow) / EMA(slow)
//! ```
//!
//! Both are NaN wherever either average is undefined.

/// Element-wise difference of two moving averages.
pub fn compute_macd(fast_ma: &[f64], slow_ma: &[f64]) -> Vec<f64> {
    debug_assert_eq!(fast_ma.len(), slow_ma.len());
    fast_ma
        .iter()
        .zip(slow_ma)
        .map(|(&fast, &slow)| fast - slow)
        .collect()
}

/// MACD normalised by the slow average, in percent.
///
/// A zero slow average yields NaN rather than an infinite ratio.
pub fn compute_ppo(macd: &[f64], slow_ma: &[f64]) -> Vec<f64> {
    debug_assert_eq!(macd.len(), slow_ma.len());
    macd.iter()
        .zip(slow_ma)
        .map(|(&m, &slow)| {
            if slow == 0.0 {
                f64::NAN
            } else {
                100.0 * m / slow
            }
        })
        .collect()
}
