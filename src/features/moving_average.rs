//! Exponential moving averages.
//!
//! The average at horizon `h` uses `alpha = 2 / (h + 1)` and is seeded with
//! the simple mean of the first `h` values, so the first defined output is at
//! index `h - 1`. Earlier positions are NaN (warm-up).
//!
//! ```text
//! ema[h-1] = mean(x[0..h])
//! ema[t]   = alpha * x[t] + (1 - alpha) * ema[t-1]
//! ```
//!
//! A non-finite input resets the state, and the average warms up again from
//! the next finite value.

/// Streaming exponential moving average.
#[derive(Debug, Clone)]
pub struct Ema {
    horizon: usize,
    alpha: f64,
    warmup_sum: f64,
    count: usize,
    value: Option<f64>,
}

impl Ema {
    /// Create an EMA with the given horizon (span).
    ///
    /// # Panics
    ///
    /// Panics if `horizon` is 0.
    pub fn new(horizon: usize) -> Self {
        assert!(horizon > 0, "EMA horizon must be > 0");
        Self {
            horizon,
            alpha: 2.0 / (horizon as f64 + 1.0),
            warmup_sum: 0.0,
            count: 0,
            value: None,
        }
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Current value, `None` during warm-up.
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// Feed one observation and return the updated average.
    pub fn update(&mut self, x: f64) -> Option<f64> {
        if !x.is_finite() {
            self.reset();
            return None;
        }

        match self.value {
            Some(prev) => {
                let next = self.alpha * x + (1.0 - self.alpha) * prev;
                self.value = Some(next);
            }
            None => {
                self.warmup_sum += x;
                self.count += 1;
                if self.count == self.horizon {
                    self.value = Some(self.warmup_sum / self.horizon as f64);
                }
            }
        }
        self.value
    }

    pub fn reset(&mut self) {
        self.warmup_sum = 0.0;
        self.count = 0;
        self.value = None;
    }
}

/// EMA over a whole series, NaN where undefined.
pub fn compute_ema(values: &[f64], horizon: usize) -> Vec<f64> {
    let mut ema = Ema::new(horizon);
    values
        .iter()
        .map(|&x| ema.update(x).unwrap_or(f64::NAN))
        .collect()
}
