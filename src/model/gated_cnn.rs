//! Gated convolutional network.
//!
//! ```text
//! (B, T, K)
//!   -> depthwise gated conv (optional, K -> K * multiplier)
//!   -> gated conv                      (-> channels)
//!   -> [gated dilated conv(rate) -> highway conv] for each rate
//!   -> [mean over time | newest step]  (B, 2 * channels)
//! ```
//!
//! Every convolution uses `Same` padding so the time axis keeps its length
//! and the newest row stays at `t = 0`.

use super::conv::{ConvSpec, Padding};
use super::dilated::GatedDilatedConv1d;
use super::gated::{DepthwiseGatedConv1d, GatedConv1d, HighwayConv1d};
use super::init::seeded_rng;
use super::{Activation, ModelConfig, ModelError, ModelKind, SequenceModel, SummaryRegistry};
use ndarray::{concatenate, s, Array2, Array3, ArrayView3, Axis};

struct DilatedBlock {
    gated: GatedDilatedConv1d,
    highway: HighwayConv1d,
}

pub struct GatedConvNet {
    depthwise: Option<DepthwiseGatedConv1d>,
    input: GatedConv1d,
    blocks: Vec<DilatedBlock>,
    channels: usize,
    summaries: SummaryRegistry,
}

impl GatedConvNet {
    pub fn new(
        config: &ModelConfig,
        _sequence_length: usize,
        n_features: usize,
    ) -> Result<Self, ModelError> {
        let mut rng = seeded_rng(config.seed);
        let mut summaries = SummaryRegistry::new();
        let same = ConvSpec::new(config.filter_size).with_padding(Padding::Same);

        let depthwise = if config.channel_multiplier > 0 {
            Some(DepthwiseGatedConv1d::new(
                "depthwise_gated_cnn",
                same,
                n_features,
                config.channel_multiplier,
                Activation::Elu,
                &mut rng,
                &mut summaries,
            )?)
        } else {
            None
        };
        let input_channels = depthwise
            .as_ref()
            .map_or(n_features, DepthwiseGatedConv1d::out_channels);

        let input = GatedConv1d::new(
            "gated_cnn",
            same,
            input_channels,
            config.channels,
            &mut rng,
            &mut summaries,
        )?;

        let mut blocks = Vec::with_capacity(config.dilation_rates.len());
        for (i, &rate) in config.dilation_rates.iter().enumerate() {
            let gated = GatedDilatedConv1d::new(
                &format!("gated_dilated_{i}"),
                config.filter_size,
                rate,
                Padding::Same,
                config.channels,
                config.channels,
                &mut rng,
                &mut summaries,
            )?;
            let highway = HighwayConv1d::new(
                &format!("highway_cnn_{i}"),
                same,
                config.channels,
                &mut rng,
                &mut summaries,
            )?;
            blocks.push(DilatedBlock { gated, highway });
        }

        Ok(Self {
            depthwise,
            input,
            blocks,
            channels: config.channels,
            summaries,
        })
    }

    /// Convolutional stack output before pooling, `(B, T, channels)`.
    pub fn feature_maps(&self, windows: ArrayView3<'_, f64>) -> Result<Array3<f64>, ModelError> {
        let mut x = match &self.depthwise {
            Some(layer) => self.input.forward(layer.forward(windows)?.view())?,
            None => self.input.forward(windows)?,
        };
        for block in &self.blocks {
            x = block.gated.forward(x.view())?;
            x = block.highway.forward(x.view())?;
        }
        Ok(x)
    }
}

impl SequenceModel for GatedConvNet {
    fn kind(&self) -> ModelKind {
        ModelKind::GatedConvNet
    }

    fn feature_dim(&self) -> usize {
        2 * self.channels
    }

    fn encode(&self, windows: ArrayView3<'_, f64>) -> Result<Array2<f64>, ModelError> {
        let maps = self.feature_maps(windows)?;
        let mean = maps
            .mean_axis(Axis(1))
            .ok_or_else(|| ModelError::InvalidConfig("empty time axis".to_string()))?;
        let newest = maps.slice(s![.., 0, ..]);
        concatenate(Axis(1), &[mean.view(), newest])
            .map_err(|e| ModelError::InvalidConfig(e.to_string()))
    }

    fn summaries(&self) -> &SummaryRegistry {
        &self.summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_shape() {
        let config = ModelConfig {
            kind: ModelKind::GatedConvNet,
            channels: 6,
            dilation_rates: vec![1, 2],
            ..Default::default()
        };
        let net = GatedConvNet::new(&config, 12, 4).unwrap();
        let x = Array3::from_shape_fn((2, 12, 4), |(b, t, k)| ((b + t + k) as f64).sin());
        assert_eq!(net.feature_maps(x.view()).unwrap().dim(), (2, 12, 6));
        assert_eq!(net.encode(x.view()).unwrap().dim(), (2, 12));
        // gated_cnn plus two blocks of two layers, four tensors each
        assert_eq!(net.summaries().len(), 20);
    }

    #[test]
    fn test_depthwise_front() {
        let config = ModelConfig {
            kind: ModelKind::GatedConvNet,
            channels: 4,
            dilation_rates: vec![1],
            channel_multiplier: 2,
            ..Default::default()
        };
        let net = GatedConvNet::new(&config, 8, 3).unwrap();
        assert_eq!(net.summaries().scope("depthwise_gated_cnn").count(), 4);
        let out = net.encode(Array3::ones((1, 8, 3)).view()).unwrap();
        assert_eq!(out.dim(), (1, 8));
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_channel_mismatch() {
        let net = GatedConvNet::new(&ModelConfig::default(), 8, 3).unwrap();
        assert!(net.encode(Array3::ones((1, 8, 2)).view()).is_err());
    }
}
