//! Feature definitions and schema types.
//!
//! This module defines the core types for feature metadata:
//! - `FeatureCategory`: Enum of column groups (Base, Lag, MovingAverage, etc.)
//! - `FeatureDef`: Metadata for a single column
//! - `FeatureSchema`: Ordered collection of column definitions

use crate::features::lag::lag_column_name;
use crate::features::{columns, FeatureConfig};
use crate::labeling::{LabelConfig, LABEL_COLUMN};
use crate::price::PriceField;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Column group of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureCategory {
    /// Unadjusted vendor fields: Open, High, Low, Close, Volume, Ex-Dividend, Split Ratio
    Base,

    /// Split/dividend adjusted vendor fields
    Adjusted,

    /// Delayed copies `<Field>-<k>`
    Lag,

    /// Exponential moving averages
    MovingAverage,

    /// MACD and PPO
    Momentum,

    /// Volume-weighted indicators (accumulation/distribution)
    Volume,

    /// Forward value and label
    Target,
}

impl FeatureCategory {
    /// Get all categories in column order.
    pub fn all() -> &'static [FeatureCategory] {
        &[
            FeatureCategory::Base,
            FeatureCategory::Adjusted,
            FeatureCategory::Lag,
            FeatureCategory::MovingAverage,
            FeatureCategory::Momentum,
            FeatureCategory::Volume,
            FeatureCategory::Target,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            FeatureCategory::Base => "Base",
            FeatureCategory::Adjusted => "Adjusted",
            FeatureCategory::Lag => "Lag",
            FeatureCategory::MovingAverage => "Moving Average",
            FeatureCategory::Momentum => "Momentum",
            FeatureCategory::Volume => "Volume",
            FeatureCategory::Target => "Target",
        }
    }
}

/// Definition of a single feature column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureDef {
    /// Column name (e.g., "Close", "Close-3", "MACD_short")
    pub name: String,

    /// Position among the frame's columns
    pub index: usize,

    pub category: FeatureCategory,

    pub description: String,

    /// Vendor field the column is derived from (None for indicators on several fields)
    pub field: Option<PriceField>,

    /// Lag offset k for lag columns
    pub lag: Option<usize>,
}

impl FeatureDef {
    pub fn new(
        name: impl Into<String>,
        index: usize,
        category: FeatureCategory,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            index,
            category,
            description: description.into(),
            field: None,
            lag: None,
        }
    }

    pub fn with_field(mut self, field: PriceField) -> Self {
        self.field = Some(field);
        self
    }

    pub fn with_lag(mut self, lag: usize) -> Self {
        self.lag = Some(lag);
        self
    }
}

/// Feature schema containing all column definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSchema {
    /// Schema version
    pub version: String,

    features: Vec<FeatureDef>,

    #[serde(skip)]
    name_index: HashMap<String, usize>,

    #[serde(skip)]
    category_indices: HashMap<FeatureCategory, Vec<usize>>,
}

impl FeatureSchema {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            features: Vec::new(),
            name_index: HashMap::new(),
            category_indices: HashMap::new(),
        }
    }

    /// Schema of the columns [`FeatureExtractor`](crate::features::FeatureExtractor)
    /// produces for these configurations, in frame order.
    pub fn from_config(features: &FeatureConfig, labels: &LabelConfig) -> Self {
        let mut builder = FeatureSchemaBuilder::new().with_base();
        builder = builder.with_lags(&features.lag_fields, features.lag_depth);
        if features.include_indicators {
            builder = builder.with_indicators(features.indicator_field);
        }
        if features.include_ad_line {
            builder = builder.with_ad_line();
        }
        builder
            .with_targets(labels)
            .without(&features.drop_columns)
            .build()
    }

    pub fn add_feature(&mut self, feature: FeatureDef) {
        let index = feature.index;
        let name = feature.name.clone();
        let category = feature.category;

        self.features.push(feature);
        self.name_index.insert(name, index);
        self.category_indices
            .entry(category)
            .or_default()
            .push(index);
    }

    pub fn total_count(&self) -> usize {
        self.features.len()
    }

    pub fn get_feature(&self, name: &str) -> Option<&FeatureDef> {
        self.name_index
            .get(name)
            .and_then(|&idx| self.features.iter().find(|f| f.index == idx))
    }

    pub fn features_by_category(&self, category: FeatureCategory) -> Vec<&FeatureDef> {
        self.features
            .iter()
            .filter(|f| f.category == category)
            .collect()
    }

    pub fn indices_by_category(&self, category: FeatureCategory) -> &[usize] {
        self.category_indices
            .get(&category)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn all_features(&self) -> &[FeatureDef] {
        &self.features
    }

    pub fn contains(&self, name: &str) -> bool {
        self.name_index.contains_key(name)
    }

    /// Feature names in column order.
    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }

    /// Rebuild internal indices (call after deserialization).
    pub fn rebuild_indices(&mut self) {
        self.name_index.clear();
        self.category_indices.clear();

        for feature in &self.features {
            self.name_index.insert(feature.name.clone(), feature.index);
            self.category_indices
                .entry(feature.category)
                .or_default()
                .push(feature.index);
        }
    }
}

/// Builder for feature schemas.
pub struct FeatureSchemaBuilder {
    features: Vec<FeatureDef>,
}

impl Default for FeatureSchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureSchemaBuilder {
    pub fn new() -> Self {
        Self {
            features: Vec::new(),
        }
    }

    fn push(&mut self, def: FeatureDef) {
        self.features.push(def);
    }

    /// All twelve vendor columns.
    pub fn with_base(mut self) -> Self {
        for &field in PriceField::all() {
            let category = match field {
                PriceField::AdjOpen
                | PriceField::AdjHigh
                | PriceField::AdjLow
                | PriceField::AdjClose
                | PriceField::AdjVolume => FeatureCategory::Adjusted,
                _ => FeatureCategory::Base,
            };
            let def = FeatureDef::new(field.column_name(), 0, category, "vendor field")
                .with_field(field);
            self.push(def);
        }
        self
    }

    pub fn with_lags(mut self, fields: &[PriceField], depth: usize) -> Self {
        for &field in fields {
            for k in 1..=depth {
                let def = FeatureDef::new(
                    lag_column_name(field.column_name(), k),
                    0,
                    FeatureCategory::Lag,
                    format!("{} {} periods earlier", field, k),
                )
                .with_field(field)
                .with_lag(k);
                self.push(def);
            }
        }
        self
    }

    pub fn with_indicators(mut self, field: PriceField) -> Self {
        let ma = [
            (columns::MA_SHORT, "EMA, short horizon"),
            (columns::MA_MEDIUM, "EMA, medium horizon"),
            (columns::MA_LONG, "EMA, long horizon"),
        ];
        for (name, desc) in ma {
            self.push(
                FeatureDef::new(name, 0, FeatureCategory::MovingAverage, desc).with_field(field),
            );
        }
        let momentum = [
            (columns::MACD_SHORT, "MA_short - MA_medium"),
            (columns::MACD_LONG, "MA_short - MA_long"),
            (columns::PPO_SHORT, "100 * MACD_short / MA_medium"),
            (columns::PPO_LONG, "100 * MACD_long / MA_long"),
        ];
        for (name, desc) in momentum {
            self.push(FeatureDef::new(name, 0, FeatureCategory::Momentum, desc).with_field(field));
        }
        self
    }

    pub fn with_ad_line(mut self) -> Self {
        self.push(FeatureDef::new(
            columns::AD_LINE,
            0,
            FeatureCategory::Volume,
            "cumulative close location value x volume",
        ));
        self
    }

    pub fn with_targets(mut self, labels: &LabelConfig) -> Self {
        self.push(
            FeatureDef::new(
                labels.forward_column(),
                0,
                FeatureCategory::Target,
                format!("{} {} periods ahead", labels.field, labels.horizon),
            )
            .with_field(labels.field),
        );
        self.push(
            FeatureDef::new(LABEL_COLUMN, 0, FeatureCategory::Target, "training label")
                .with_field(labels.field),
        );
        self
    }

    /// Remove columns by name.
    pub fn without<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.features
            .retain(|f| !names.iter().any(|n| n.as_ref() == f.name));
        self
    }

    /// Assign indices in order and build the schema.
    pub fn build(self) -> FeatureSchema {
        let mut schema = FeatureSchema::new(super::SCHEMA_VERSION);
        for (index, mut def) in self.features.into_iter().enumerate() {
            def.index = index;
            schema.add_feature(def);
        }
        schema
    }
}
