//! Sequence Models
//!
//! Layer constructors and the two model implementations the training driver
//! can choose from, built natively on `ndarray`.
//!
//! # Tensor layout
//!
//! Every layer works on `(batch, time, channels)` tensors. A sequence window
//! `(T, K)` of K feature keys enters as `(batch, T, K)` with the newest
//! row at `t = 0`.
//!
//! # Layers
//!
//! | Layer | Output |
//! |-------|--------|
//! | [`Dense`] / [`dense_over_time`] | `act(x · W + b)` |
//! | [`Conv1d`] | `act(conv(x, W) + b)` |
//! | [`GatedConv1d`] | `tanh(conv(x, W) + b) * σ(conv(x, W_t) + b_t)` |
//! | [`HighwayConv1d`] | `H * T + x * (1 - T)`, `b_t = -3` |
//! | [`DilatedConv1d`] / [`GatedDilatedConv1d`] | as above with dilation over time |
//! | [`DepthwiseGatedConv1d`] | one gated filter bank per input channel |
//!
//! Constructors draw kernels from a seeded RNG and record diagnostic
//! summaries of every weight tensor in a [`SummaryRegistry`].
//!
//! # Models
//!
//! Both models implement [`SequenceModel`]: they encode a batch of windows
//! into a `(batch, feature_dim)` matrix consumed by a trainable readout.

mod conv;
mod dense;
mod dilated;
mod gated;
mod gated_cnn;
pub mod init;
mod mlp;
mod summary;

pub use conv::{convolve, depthwise_convolve, Conv1d, ConvSpec, Padding};
pub use dense::{dense_over_time, Dense};
pub use dilated::{DilatedConv1d, GatedDilatedConv1d};
pub use gated::{DepthwiseGatedConv1d, GatedConv1d, HighwayConv1d};
pub use gated_cnn::GatedConvNet;
pub use mlp::MultilayerPerceptron;
pub use summary::{SummaryRegistry, TensorSummary, HISTOGRAM_BUCKETS};

use ndarray::{Array2, ArrayView3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Model construction and shape errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("expected {expected} input channels, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    #[error("sequence of {length} steps is shorter than the receptive field {receptive_field}")]
    SequenceTooShort {
        length: usize,
        receptive_field: usize,
    },

    #[error("invalid layer configuration: {0}")]
    InvalidConfig(String),
}

/// Element-wise activation functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Tanh,
    Sigmoid,
    Relu,
    Elu,
    Linear,
}

impl Activation {
    #[inline]
    pub fn apply(&self, x: f64) -> f64 {
        match self {
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => sigmoid(x),
            Activation::Relu => x.max(0.0),
            Activation::Elu => {
                if x > 0.0 {
                    x
                } else {
                    x.exp_m1()
                }
            }
            Activation::Linear => x,
        }
    }
}

#[inline]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Available model implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    MultilayerPerceptron,
    GatedConvNet,
}

impl ModelKind {
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::MultilayerPerceptron => "multilayer_perceptron",
            ModelKind::GatedConvNet => "gated_conv_net",
        }
    }
}

/// Architecture settings shared by the model implementations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub kind: ModelKind,

    /// Hidden layer sizes of the perceptron; the first is applied per timestep.
    #[serde(default = "default_hidden")]
    pub h_layer_size: Vec<usize>,

    /// Convolution width over time.
    #[serde(default = "default_filter_size")]
    pub filter_size: usize,

    /// Channels of the convolutional stack.
    #[serde(default = "default_channels")]
    pub channels: usize,

    /// One gated dilated block per rate.
    #[serde(default = "default_dilation_rates")]
    pub dilation_rates: Vec<usize>,

    /// Filters per input feature in the depthwise gated layer; 0 disables it.
    #[serde(default)]
    pub channel_multiplier: usize,

    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_hidden() -> Vec<usize> {
    vec![32, 16]
}

fn default_filter_size() -> usize {
    3
}

fn default_channels() -> usize {
    16
}

fn default_dilation_rates() -> Vec<usize> {
    vec![1, 2, 4]
}

fn default_seed() -> u64 {
    42
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::default(),
            h_layer_size: default_hidden(),
            filter_size: default_filter_size(),
            channels: default_channels(),
            dilation_rates: default_dilation_rates(),
            channel_multiplier: 0,
            seed: default_seed(),
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), String> {
        match self.kind {
            ModelKind::MultilayerPerceptron => {
                if self.h_layer_size.is_empty() || self.h_layer_size.contains(&0) {
                    return Err("h_layer_size must hold at least one non-zero size".to_string());
                }
            }
            ModelKind::GatedConvNet => {
                if self.filter_size == 0 || self.channels == 0 {
                    return Err("filter_size and channels must be > 0".to_string());
                }
                if self.dilation_rates.contains(&0) {
                    return Err("dilation rates must be > 0".to_string());
                }
            }
        }
        Ok(())
    }
}

/// A model mapping windows to a feature matrix for the readout.
pub trait SequenceModel: Send + Sync {
    fn kind(&self) -> ModelKind;

    /// Columns of the encoded matrix.
    fn feature_dim(&self) -> usize;

    /// Encode `(batch, T, K)` windows into `(batch, feature_dim)`.
    fn encode(&self, windows: ArrayView3<'_, f64>) -> Result<Array2<f64>, ModelError>;

    /// Weight summaries recorded while building.
    fn summaries(&self) -> &SummaryRegistry;
}

/// Build the configured model for windows of `sequence_length` rows of
/// `n_features` values.
pub fn build_model(
    config: &ModelConfig,
    sequence_length: usize,
    n_features: usize,
) -> Result<Box<dyn SequenceModel>, ModelError> {
    config.validate().map_err(ModelError::InvalidConfig)?;
    if sequence_length == 0 || n_features == 0 {
        return Err(ModelError::InvalidConfig(format!(
            "input shape ({sequence_length}, {n_features}) must be non-empty"
        )));
    }
    let model: Box<dyn SequenceModel> = match config.kind {
        ModelKind::MultilayerPerceptron => Box::new(MultilayerPerceptron::new(
            config,
            sequence_length,
            n_features,
        )?),
        ModelKind::GatedConvNet => Box::new(GatedConvNet::new(config, sequence_length, n_features)?),
    };
    tracing::info!(
        model = config.kind.name(),
        feature_dim = model.feature_dim(),
        tensors = model.summaries().len(),
        "built model"
    );
    Ok(model)
}
