//! Feature extraction from daily price series.
//!
//! Turns a [`PriceSeries`] into a [`FeatureFrame`]:
//!
//! - the base vendor columns (`Open` ... `Adj_Volume`)
//! - `lag`: delayed copies `<Field>-<k>` for k = 1..=lag_depth
//! - `moving_average`: EMAs `MA_short`, `MA_medium`, `MA_long` on one field
//! - `momentum`: `MACD_short`, `MACD_long`, `PPO_short`, `PPO_long`
//! - `accumulation`: the accumulation/distribution line `AD_line`
//! - the forward value `<Field>+<h>` and the `Label` column
//!
//! # Column Layout
//!
//! | Group | Columns | Warm-up rows |
//! |-------|---------|--------------|
//! | Base | 12 | 0 |
//! | Lags | fields x depth | depth |
//! | Moving averages | 3 | long - 1 |
//! | MACD / PPO | 4 | long - 1 |
//! | AD line | 1 | 0 |
//! | Forward + label | 2 | (lead) horizon |
//!
//! # Usage
//!
//! ```
//! use stock_features::features::{FeatureConfig, FeatureExtractor};
//! use stock_features::labeling::LabelConfig;
//! use stock_features::price::{PriceRecord, PriceSeries};
//! use chrono::NaiveDate;
//!
//! let start = NaiveDate::from_ymd_opt(2010, 1, 1).unwrap();
//! let records = (0..80)
//!     .map(|i| {
//!         let d = start + chrono::Days::new(i);
//!         PriceRecord::ohlcv(d, 100.0, 101.0, 99.0, 100.0, 1e6)
//!     })
//!     .collect();
//!
//! let extractor = FeatureExtractor::new(FeatureConfig::default(), LabelConfig::default());
//! let frame = extractor.extract(&PriceSeries::new(records)).unwrap();
//! assert!(frame.has_column("Close-19"));
//! assert_eq!(frame.warmup(), 49);
//! ```

pub mod accumulation;
pub mod frame;
pub mod lag;
pub mod momentum;
pub mod moving_average;

pub use frame::FeatureFrame;

use crate::config::DateBounds;
use crate::error::{PipelineError, Result};
use crate::labeling::{LabelConfig, LabelGenerator, LABEL_COLUMN};
use crate::price::{PriceField, PriceSeries};
use serde::{Deserialize, Serialize};

/// Column names of the derived indicators.
pub mod columns {
    pub const MA_SHORT: &str = "MA_short";
    pub const MA_MEDIUM: &str = "MA_medium";
    pub const MA_LONG: &str = "MA_long";
    pub const MACD_SHORT: &str = "MACD_short";
    pub const MACD_LONG: &str = "MACD_long";
    pub const PPO_SHORT: &str = "PPO_short";
    pub const PPO_LONG: &str = "PPO_long";
    pub const AD_LINE: &str = "AD_line";
}

/// Three EMA horizons, in periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmaHorizons {
    pub short: usize,
    pub medium: usize,
    pub long: usize,
}

impl Default for EmaHorizons {
    fn default() -> Self {
        Self {
            short: 12,
            medium: 26,
            long: 50,
        }
    }
}

impl EmaHorizons {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.short == 0 {
            return Err("ema short horizon must be > 0".to_string());
        }
        if !(self.short < self.medium && self.medium < self.long) {
            return Err(format!(
                "ema horizons must satisfy short < medium < long, got {} / {} / {}",
                self.short, self.medium, self.long
            ));
        }
        Ok(())
    }
}

/// Configuration for feature extraction.
///
/// # Example
///
/// ```
/// use stock_features::features::FeatureConfig;
///
/// let config = FeatureConfig::default().with_lag_depth(5);
/// // 12 base + 6 fields x 5 lags + 8 indicators
/// assert_eq!(config.feature_count(), 12 + 30 + 8);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Fields that get lag columns.
    pub lag_fields: Vec<PriceField>,

    /// Number of lags per field (k = 1..=lag_depth).
    pub lag_depth: usize,

    /// Field the moving averages, MACD and PPO are computed on.
    pub indicator_field: PriceField,

    pub ema_horizons: EmaHorizons,

    /// Whether to include moving averages, MACD and PPO.
    pub include_indicators: bool,

    pub include_ad_line: bool,

    /// Columns removed before the frame is written.
    #[serde(default)]
    pub drop_columns: Vec<String>,
}

impl FeatureConfig {
    pub const BASE_FEATURE_COUNT: usize = 12;
    pub const INDICATOR_COUNT: usize = 7;

    pub fn with_lag_depth(mut self, depth: usize) -> Self {
        self.lag_depth = depth;
        self
    }

    pub fn with_lag_fields(mut self, fields: Vec<PriceField>) -> Self {
        self.lag_fields = fields;
        self
    }

    pub fn with_ema_horizons(mut self, short: usize, medium: usize, long: usize) -> Self {
        self.ema_horizons = EmaHorizons { short, medium, long };
        self
    }

    pub fn with_indicators(mut self, enabled: bool) -> Self {
        self.include_indicators = enabled;
        self
    }

    pub fn with_ad_line(mut self, enabled: bool) -> Self {
        self.include_ad_line = enabled;
        self
    }

    pub fn with_drop_columns(mut self, columns: Vec<String>) -> Self {
        self.drop_columns = columns;
        self
    }

    /// Number of feature columns produced, excluding the forward value,
    /// the label and any dropped columns.
    pub fn feature_count(&self) -> usize {
        let mut count = Self::BASE_FEATURE_COUNT + self.lag_fields.len() * self.lag_depth;
        if self.include_indicators {
            count += Self::INDICATOR_COUNT;
        }
        if self.include_ad_line {
            count += 1;
        }
        count
    }

    /// Leading rows without a defined value in every column.
    pub fn warmup_rows(&self) -> usize {
        let lag_warmup = if self.lag_fields.is_empty() {
            0
        } else {
            self.lag_depth
        };
        let ema_warmup = if self.include_indicators {
            self.ema_horizons.long.saturating_sub(1)
        } else {
            0
        };
        lag_warmup.max(ema_warmup)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.lag_fields.is_empty() && self.lag_depth == 0 {
            return Err("lag_depth must be > 0 when lag_fields is not empty".to_string());
        }
        if self.include_indicators {
            self.ema_horizons.validate()?;
        }
        Ok(())
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            lag_fields: vec![
                PriceField::Close,
                PriceField::Open,
                PriceField::Low,
                PriceField::High,
                PriceField::Volume,
                PriceField::SplitRatio,
            ],
            lag_depth: 19,
            indicator_field: PriceField::Close,
            ema_horizons: EmaHorizons::default(),
            include_indicators: true,
            include_ad_line: true,
            drop_columns: Vec::new(),
        }
    }
}

/// Computes the full feature frame for one company.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
    labels: LabelGenerator,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig, label_config: LabelConfig) -> Self {
        Self {
            config,
            labels: LabelGenerator::new(label_config),
        }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn label_config(&self) -> &LabelConfig {
        self.labels.config()
    }

    /// Minimum series length that leaves at least one defined row.
    pub fn min_rows_required(&self) -> usize {
        self.config.warmup_rows() + self.labels.config().horizon + 1
    }

    /// Compute every column at full series length.
    ///
    /// Margins are recorded on the frame; call [`FeatureFrame::truncate`]
    /// (or use [`extract_truncated`](Self::extract_truncated)) to drop them.
    pub fn extract(&self, series: &PriceSeries) -> Result<FeatureFrame> {
        self.config.validate().map_err(PipelineError::Config)?;
        self.labels
            .config()
            .validate()
            .map_err(PipelineError::Config)?;

        let required = self.min_rows_required();
        if series.len() < required {
            return Err(PipelineError::InsufficientRows {
                required,
                available: series.len(),
            });
        }

        let mut frame = FeatureFrame::new(series.dates());

        for &field in PriceField::all() {
            frame.push_column(field.column_name(), series.column(field))?;
        }

        self.push_lags(series, &mut frame)?;

        if self.config.include_indicators {
            self.push_indicators(series, &mut frame)?;
        }

        if self.config.include_ad_line {
            let ad = accumulation::compute_ad_line(
                &series.column(PriceField::High),
                &series.column(PriceField::Low),
                &series.column(PriceField::Close),
                &series.column(PriceField::Volume),
            );
            frame.push_column(columns::AD_LINE, ad)?;
        }

        let label_config = self.labels.config();
        let labels = self.labels.generate(&series.column(label_config.field))?;
        frame.push_column(label_config.forward_column(), labels.forward)?;
        frame.push_column(LABEL_COLUMN, labels.label)?;

        frame.extend_margins(self.config.warmup_rows(), label_config.horizon);
        frame.remove_columns(&self.config.drop_columns);

        tracing::debug!(
            rows = frame.len(),
            columns = frame.num_columns(),
            warmup = frame.warmup(),
            lead = frame.lead(),
            "extracted features"
        );
        Ok(frame)
    }

    /// [`extract`](Self::extract) followed by truncation to `bounds`.
    pub fn extract_truncated(
        &self,
        series: &PriceSeries,
        bounds: &DateBounds,
    ) -> Result<FeatureFrame> {
        let frame = self.extract(series)?;
        Ok(frame.truncate(bounds))
    }

    fn push_lags(&self, series: &PriceSeries, frame: &mut FeatureFrame) -> Result<()> {
        for &field in &self.config.lag_fields {
            let values = series.column(field);
            for k in 1..=self.config.lag_depth {
                frame.push_column(
                    lag::lag_column_name(field.column_name(), k),
                    lag::compute_delay(&values, k),
                )?;
            }
        }
        Ok(())
    }

    fn push_indicators(&self, series: &PriceSeries, frame: &mut FeatureFrame) -> Result<()> {
        let values = series.column(self.config.indicator_field);
        let h = self.config.ema_horizons;

        let ma_short = moving_average::compute_ema(&values, h.short);
        let ma_medium = moving_average::compute_ema(&values, h.medium);
        let ma_long = moving_average::compute_ema(&values, h.long);

        let macd_short = momentum::compute_macd(&ma_short, &ma_medium);
        let macd_long = momentum::compute_macd(&ma_short, &ma_long);
        let ppo_short = momentum::compute_ppo(&macd_short, &ma_medium);
        let ppo_long = momentum::compute_ppo(&macd_long, &ma_long);

        frame.push_column(columns::MA_SHORT, ma_short)?;
        frame.push_column(columns::MA_MEDIUM, ma_medium)?;
        frame.push_column(columns::MA_LONG, ma_long)?;
        frame.push_column(columns::MACD_SHORT, macd_short)?;
        frame.push_column(columns::MACD_LONG, macd_long)?;
        frame.push_column(columns::PPO_SHORT, ppo_short)?;
        frame.push_column(columns::PPO_LONG, ppo_long)?;
        Ok(())
    }
}
