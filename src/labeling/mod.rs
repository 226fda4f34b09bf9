//! Label generation for next-period price prediction.
//!
//! Every labeled row `t` looks `h` periods ahead on one price field:
//!
//! ```text
//! forward(t) = p(t + h)                        // written as "<Field>+<h>"
//! change(t)  = transform(p(t + h), p(t))
//! ```
//!
//! The `Label` column is then either a direction flag or the (transformed)
//! forward value:
//!
//! | Kind | Label |
//! |------|-------|
//! | [`LabelKind::Direction`] | `1.0` if `change > threshold`, else `0.0` |
//! | [`LabelKind::ForwardValue`] | `change` (or `forward` when the transform is `None`) |
//!
//! The last `h` rows have no future value and are NaN; the frame truncation
//! step removes them.
//!
//! # Example
//!
//! ```
//! use stock_features::labeling::{LabelConfig, LabelGenerator, LabelKind};
//!
//! let generator = LabelGenerator::new(LabelConfig::direction(1, 0.0));
//! let labels = generator.generate(&[10.0, 11.0, 10.5]).unwrap();
//! assert_eq!(&labels.label[..2], &[1.0, 0.0]);
//! assert!(labels.label[2].is_nan());
//! ```

use crate::error::{PipelineError, Result};
use crate::features::lag::{compute_lead, lead_column_name};
use crate::price::PriceField;
use serde::{Deserialize, Serialize};

/// Name of the label column in feature CSVs and exported arrays.
pub const LABEL_COLUMN: &str = "Label";

/// Binary price direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Down = 0,
    Up = 1,
}

impl Direction {
    #[inline]
    pub fn as_f64(&self) -> f64 {
        *self as u8 as f64
    }

    /// Classify a label value; anything >= 0.5 counts as up.
    pub fn from_value(value: f64) -> Option<Self> {
        if !value.is_finite() {
            None
        } else if value >= 0.5 {
            Some(Direction::Up)
        } else {
            Some(Direction::Down)
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Direction::Down => "Down",
            Direction::Up => "Up",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What the `Label` column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelKind {
    /// Classification flag from price direction.
    Direction,
    /// Regression target: the forward value, optionally transformed.
    ForwardValue,
}

/// Transform applied to the forward value relative to the current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnTransform {
    /// Raw forward value (direction labels compare `forward - current`).
    #[default]
    None,
    /// `(forward - current) / current`
    Simple,
    /// `ln(forward / current)`
    Log,
}

impl ReturnTransform {
    #[inline]
    pub fn apply(&self, forward: f64, current: f64) -> f64 {
        match self {
            ReturnTransform::None => forward,
            ReturnTransform::Simple => (forward - current) / current,
            ReturnTransform::Log => (forward / current).ln(),
        }
    }

    /// Signed change used for direction labels.
    #[inline]
    fn change(&self, forward: f64, current: f64) -> f64 {
        match self {
            ReturnTransform::None => forward - current,
            other => other.apply(forward, current),
        }
    }
}

/// Configuration for label generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelConfig {
    pub kind: LabelKind,

    /// Periods ahead (h). The forward column is named `<field>+<h>`.
    pub horizon: usize,

    #[serde(default)]
    pub transform: ReturnTransform,

    /// Minimum change for an `Up` label. Ignored for forward values.
    #[serde(default)]
    pub threshold: f64,

    /// Price field the label is computed from.
    pub field: PriceField,
}

impl Default for LabelConfig {
    /// Next-day close as a regression target (`Close+1`).
    fn default() -> Self {
        Self {
            kind: LabelKind::ForwardValue,
            horizon: 1,
            transform: ReturnTransform::None,
            threshold: 0.0,
            field: PriceField::Close,
        }
    }
}

impl LabelConfig {
    /// Direction flag on the close, `horizon` periods ahead.
    pub fn direction(horizon: usize, threshold: f64) -> Self {
        Self {
            kind: LabelKind::Direction,
            horizon,
            threshold,
            ..Default::default()
        }
    }

    /// Forward close value passed through `transform`.
    pub fn forward_value(horizon: usize, transform: ReturnTransform) -> Self {
        Self {
            kind: LabelKind::ForwardValue,
            horizon,
            transform,
            ..Default::default()
        }
    }

    /// Name of the forward value column, e.g. `Close+1`.
    pub fn forward_column(&self) -> String {
        lead_column_name(self.field.column_name(), self.horizon)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.horizon == 0 {
            return Err("horizon must be > 0".to_string());
        }
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(format!("threshold must be finite and >= 0, got {}", self.threshold));
        }
        Ok(())
    }
}

/// Columns produced by [`LabelGenerator::generate`], at full series length.
#[derive(Debug, Clone)]
pub struct LabelColumns {
    /// `p(t + h)`, NaN for the last `h` rows.
    pub forward: Vec<f64>,
    pub label: Vec<f64>,
}

/// Computes forward values and labels for one price column.
#[derive(Debug, Clone)]
pub struct LabelGenerator {
    config: LabelConfig,
}

impl LabelGenerator {
    pub fn new(config: LabelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LabelConfig {
        &self.config
    }

    pub fn generate(&self, prices: &[f64]) -> Result<LabelColumns> {
        self.config.validate().map_err(PipelineError::Config)?;

        let forward = compute_lead(prices, self.config.horizon);
        let label = forward
            .iter()
            .zip(prices)
            .map(|(&fwd, &cur)| {
                if !fwd.is_finite() || !cur.is_finite() {
                    return f64::NAN;
                }
                match self.config.kind {
                    LabelKind::Direction => {
                        let change = self.config.transform.change(fwd, cur);
                        if change > self.config.threshold {
                            Direction::Up.as_f64()
                        } else {
                            Direction::Down.as_f64()
                        }
                    }
                    LabelKind::ForwardValue => self.config.transform.apply(fwd, cur),
                }
            })
            .collect();

        Ok(LabelColumns { forward, label })
    }

    /// Statistics over the defined labels.
    pub fn compute_stats(&self, labels: &[f64]) -> LabelStats {
        LabelStats::from_labels(labels, self.config.kind)
    }
}

/// Label statistics for validation and analysis.
///
/// # Example
///
/// ```
/// use stock_features::labeling::LabelStats;
///
/// let stats = LabelStats {
///     total: 1000,
///     up_count: 520,
///     down_count: 480,
///     ..Default::default()
/// };
///
/// let (up_pct, down_pct) = stats.class_balance();
/// assert!((up_pct - 0.52).abs() < 1e-12);
/// assert!(stats.is_balanced());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelStats {
    /// Number of defined (finite) labels
    pub total: usize,

    /// Number of Up labels (direction labels only)
    pub up_count: usize,

    /// Number of Down labels (direction labels only)
    pub down_count: usize,

    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl LabelStats {
    pub fn from_labels(labels: &[f64], kind: LabelKind) -> Self {
        let values: Vec<f64> = labels.iter().copied().filter(|v| v.is_finite()).collect();
        if values.is_empty() {
            return Self::default();
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let (up_count, down_count) = match kind {
            LabelKind::Direction => {
                let up = values
                    .iter()
                    .filter(|&&v| Direction::from_value(v) == Some(Direction::Up))
                    .count();
                (up, values.len() - up)
            }
            LabelKind::ForwardValue => (0, 0),
        };

        Self {
            total: values.len(),
            up_count,
            down_count,
            mean,
            std: var.sqrt(),
            min,
            max,
        }
    }

    /// Returns (up_fraction, down_fraction).
    pub fn class_balance(&self) -> (f64, f64) {
        if self.total == 0 {
            return (0.0, 0.0);
        }
        let total = self.total as f64;
        (self.up_count as f64 / total, self.down_count as f64 / total)
    }

    /// Neither class above 60%.
    pub fn is_balanced(&self) -> bool {
        if self.total == 0 {
            return false;
        }
        let (up, down) = self.class_balance();
        up <= 0.6 && down <= 0.6
    }

    pub fn majority_class(&self) -> Direction {
        if self.up_count >= self.down_count {
            Direction::Up
        } else {
            Direction::Down
        }
    }

    /// max_class / min_class; infinite when one class is missing.
    pub fn imbalance_ratio(&self) -> f64 {
        let max_count = self.up_count.max(self.down_count) as f64;
        let min_count = self.up_count.min(self.down_count) as f64;
        if min_count == 0.0 {
            f64::INFINITY
        } else {
            max_count / min_count
        }
    }
}
