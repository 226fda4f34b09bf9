//! Fixed feature key lists for dataset export.

use crate::features::lag::lag_column_name;
use crate::features::{columns, FeatureConfig};
use crate::price::PriceField;
use serde::{Deserialize, Serialize};

/// Ordered key lists selecting which frame columns become timestep features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// The 17 keys used for sequence examples:
    /// raw and adjusted OHLCV, three moving averages, MACD and PPO.
    #[default]
    SequenceKeys,

    /// Open, High, Low, Close, Volume
    Ohlcv,

    /// Adjusted OHLCV
    Adjusted,

    /// Base lag fields and all their default-depth lags, for flat examples.
    Lagged,
}

impl Preset {
    pub fn keys(self) -> Vec<String> {
        match self {
            Preset::SequenceKeys => {
                let mut keys: Vec<String> = [
                    PriceField::Open,
                    PriceField::High,
                    PriceField::Low,
                    PriceField::Close,
                    PriceField::Volume,
                    PriceField::AdjOpen,
                    PriceField::AdjHigh,
                    PriceField::AdjLow,
                    PriceField::AdjClose,
                    PriceField::AdjVolume,
                ]
                .iter()
                .map(|f| f.column_name().to_string())
                .collect();
                keys.extend(
                    [
                        columns::MA_LONG,
                        columns::MA_SHORT,
                        columns::MA_MEDIUM,
                        columns::MACD_LONG,
                        columns::MACD_SHORT,
                        columns::PPO_LONG,
                        columns::PPO_SHORT,
                    ]
                    .iter()
                    .map(|s| s.to_string()),
                );
                keys
            }
            Preset::Ohlcv => [
                PriceField::Open,
                PriceField::High,
                PriceField::Low,
                PriceField::Close,
                PriceField::Volume,
            ]
            .iter()
            .map(|f| f.column_name().to_string())
            .collect(),
            Preset::Adjusted => [
                PriceField::AdjOpen,
                PriceField::AdjHigh,
                PriceField::AdjLow,
                PriceField::AdjClose,
                PriceField::AdjVolume,
            ]
            .iter()
            .map(|f| f.column_name().to_string())
            .collect(),
            Preset::Lagged => {
                let config = FeatureConfig::default();
                let mut keys = Vec::new();
                for field in &config.lag_fields {
                    keys.push(field.column_name().to_string());
                    for k in 1..=config.lag_depth {
                        keys.push(lag_column_name(field.column_name(), k));
                    }
                }
                keys
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Preset::SequenceKeys => "sequence_keys",
            Preset::Ohlcv => "ohlcv",
            Preset::Adjusted => "adjusted",
            Preset::Lagged => "lagged",
        }
    }
}
