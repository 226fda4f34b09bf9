//! Feature Schema Module
//!
//! Typed, versioned descriptions of the columns a feature frame carries, and
//! fixed key lists (presets) selecting which of them are exported.
//!
//! # Example
//!
//! ```
//! use stock_features::features::FeatureConfig;
//! use stock_features::labeling::LabelConfig;
//! use stock_features::schema::{FeatureCategory, FeatureSchema, Preset};
//!
//! let schema = FeatureSchema::from_config(&FeatureConfig::default(), &LabelConfig::default());
//! assert!(Preset::SequenceKeys.keys().iter().all(|k| schema.contains(k)));
//!
//! let close_1 = schema.get_feature("Close-1").unwrap();
//! assert_eq!(close_1.category, FeatureCategory::Lag);
//! ```

mod feature_def;
mod presets;

pub use feature_def::{FeatureCategory, FeatureDef, FeatureSchema, FeatureSchemaBuilder};
pub use presets::Preset;

/// Current schema version
pub const SCHEMA_VERSION: &str = "1.0.0";
