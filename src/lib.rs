//! Stock Features
//!
//! Feature extraction, sequence framing and NumPy export for daily stock
//! price series, plus native sequence models trained on the exported arrays.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Stock Features                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  price/            - Vendor CSV records, chronological series   │
//! │  features/         - Lags, EMAs, MACD/PPO, accumulation         │
//! │  labeling/         - Forward value and direction labels         │
//! │  validation        - Data checks before the feature CSV         │
//! │  sequence_builder/ - Window framing, flatten / reshape          │
//! │  export/           - Date split, .npy partitions, metadata      │
//! │  pipeline / batch  - One company / many companies               │
//! │  model/            - Dense, gated, highway, dilated layers      │
//! │  training/         - Estimator, validation monitor, checkpoints │
//! │  logging           - tracing subscriber for the tools           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use stock_features::{Pipeline, PipelineConfig};
//!
//! let pipeline = Pipeline::from_config(PipelineConfig::default())?;
//! let output = pipeline.process_company(
//!     "apple",
//!     "data/apple.csv",
//!     Some(Path::new("features/apple-fea.csv")),
//!     "dataset",
//! )?;
//! println!("{} windows exported", output.export.partitions[0].n_examples);
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod export;
pub mod features;
pub mod labeling;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod price;
pub mod schema;
pub mod sequence_builder;
pub mod training;
pub mod validation;

// Re-exports - Errors
pub use error::{PipelineError, Result};

// Re-exports - Config
pub use config::{DateBounds, ExperimentMetadata, PipelineConfig};

// Re-exports - Prices
pub use price::{read_price_csv, read_prices, PriceField, PriceRecord, PriceSeries};

// Re-exports - Schema
pub use schema::{FeatureCategory, FeatureDef, FeatureSchema, Preset};

// Re-exports - Features
pub use features::{FeatureConfig, FeatureExtractor, FeatureFrame};

// Re-exports - Labeling
pub use labeling::{Direction, LabelConfig, LabelGenerator, LabelKind, LabelStats, ReturnTransform};

// Re-exports - Validation
pub use validation::{check_data, FeatureValidator, ValidationConfig, ValidationLevel, ValidationResult};

// Re-exports - Sequence Building
pub use sequence_builder::{Sequence, SequenceBuilder, SequenceConfig};

// Re-exports - Export
pub use export::{
    DatasetConfig, DatasetExporter, ExampleFormat, Examples, ExportMetadata, Partition,
    SplitConfig,
};

// Re-exports - Pipeline
pub use batch::{BatchConfig, BatchOutput, BatchProcessor, CompanyJob, ErrorMode, JobSource};
pub use pipeline::{Pipeline, PipelineOutput};

// Re-exports - Models and training
pub use model::{build_model, ModelConfig, ModelKind, SequenceModel};
pub use training::{Estimator, ExportedDataset, HParams, Metrics, ValidationMonitor};
