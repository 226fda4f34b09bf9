//! Gated convolutions.
//!
//! All three layers compute a filter path `H` and a sigmoid gate `T` from
//! two kernels of the same shape and combine them:
//!
//! - gated: `tanh(H) * T`
//! - highway: `tanh(H) * T + x * (1 - T)`, gate bias starts at -3 so the
//!   layer initially carries its input through
//! - depthwise gated: `act(H) * T` with one filter bank per input channel

use super::conv::{convolve, depthwise_convolve, ConvSpec, Padding};
use super::init::{constant, xavier_conv};
use super::{sigmoid, Activation, ModelError, SummaryRegistry};
use ndarray::{Array1, Array3, ArrayView3, Zip};
use rand::rngs::StdRng;

/// Initial transform-gate bias of highway layers.
pub const HIGHWAY_GATE_BIAS: f64 = -3.0;

#[derive(Debug, Clone)]
struct GatePair {
    w_filter: Array3<f64>,
    b_filter: Array1<f64>,
    w_gate: Array3<f64>,
    b_gate: Array1<f64>,
}

impl GatePair {
    fn new(
        name: &str,
        kernel_dims: (usize, usize, usize),
        bias_len: usize,
        gate_bias: f64,
        rng: &mut StdRng,
        summaries: &mut SummaryRegistry,
    ) -> Self {
        let (k, a, b) = kernel_dims;
        let pair = Self {
            w_filter: xavier_conv(rng, k, a, b),
            b_filter: constant(bias_len, 0.0),
            w_gate: xavier_conv(rng, k, a, b),
            b_gate: constant(bias_len, gate_bias),
        };
        summaries.record(name, "weight_filter", pair.w_filter.iter());
        summaries.record(name, "bias_filter", pair.b_filter.iter());
        summaries.record(name, "weight_gate", pair.w_gate.iter());
        summaries.record(name, "bias_gate", pair.b_gate.iter());
        pair
    }
}

/// `tanh(conv(x, W) + b) * sigmoid(conv(x, W_t) + b_t)`
#[derive(Debug, Clone)]
pub struct GatedConv1d {
    name: String,
    spec: ConvSpec,
    weights: GatePair,
}

impl GatedConv1d {
    pub fn new(
        name: &str,
        spec: ConvSpec,
        in_channels: usize,
        out_channels: usize,
        rng: &mut StdRng,
        summaries: &mut SummaryRegistry,
    ) -> Result<Self, ModelError> {
        spec.validate()?;
        let weights = GatePair::new(
            name,
            (spec.kernel_size, in_channels, out_channels),
            out_channels,
            0.0,
            rng,
            summaries,
        );
        Ok(Self {
            name: name.to_string(),
            spec,
            weights,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &ConvSpec {
        &self.spec
    }

    pub fn out_channels(&self) -> usize {
        self.weights.b_filter.len()
    }

    pub fn forward(&self, x: ArrayView3<'_, f64>) -> Result<Array3<f64>, ModelError> {
        let w = &self.weights;
        let mut h = convolve(x, &w.w_filter, &w.b_filter, &self.spec)?;
        let t = convolve(x, &w.w_gate, &w.b_gate, &self.spec)?;
        Zip::from(&mut h)
            .and(&t)
            .for_each(|h, &t| *h = h.tanh() * sigmoid(t));
        Ok(h)
    }
}

/// Highway convolution: `H * T + x * (1 - T)`.
///
/// The carry path adds the input element-wise, so the layer needs equal
/// input and output channels, `Same` padding and stride 1.
#[derive(Debug, Clone)]
pub struct HighwayConv1d {
    name: String,
    spec: ConvSpec,
    weights: GatePair,
}

impl HighwayConv1d {
    pub fn new(
        name: &str,
        spec: ConvSpec,
        channels: usize,
        rng: &mut StdRng,
        summaries: &mut SummaryRegistry,
    ) -> Result<Self, ModelError> {
        spec.validate()?;
        if spec.padding != Padding::Same || spec.stride != 1 {
            return Err(ModelError::InvalidConfig(format!(
                "{name}: highway layers need same padding and stride 1"
            )));
        }
        let weights = GatePair::new(
            name,
            (spec.kernel_size, channels, channels),
            channels,
            HIGHWAY_GATE_BIAS,
            rng,
            summaries,
        );
        Ok(Self {
            name: name.to_string(),
            spec,
            weights,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn forward(&self, x: ArrayView3<'_, f64>) -> Result<Array3<f64>, ModelError> {
        let w = &self.weights;
        let mut h = convolve(x, &w.w_filter, &w.b_filter, &self.spec)?;
        let t = convolve(x, &w.w_gate, &w.b_gate, &self.spec)?;
        Zip::from(&mut h)
            .and(&t)
            .and(&x)
            .for_each(|h, &t, &x| {
                let gate = sigmoid(t);
                *h = h.tanh() * gate + x * (1.0 - gate);
            });
        Ok(h)
    }
}

/// Depthwise gated convolution: every input channel gets `multiplier`
/// filters of its own, giving `in_channels * multiplier` outputs.
#[derive(Debug, Clone)]
pub struct DepthwiseGatedConv1d {
    name: String,
    spec: ConvSpec,
    weights: GatePair,
    activation: Activation,
}

impl DepthwiseGatedConv1d {
    pub fn new(
        name: &str,
        spec: ConvSpec,
        in_channels: usize,
        multiplier: usize,
        activation: Activation,
        rng: &mut StdRng,
        summaries: &mut SummaryRegistry,
    ) -> Result<Self, ModelError> {
        spec.validate()?;
        if multiplier == 0 {
            return Err(ModelError::InvalidConfig(format!(
                "{name}: channel multiplier must be > 0"
            )));
        }
        let weights = GatePair::new(
            name,
            (spec.kernel_size, in_channels, multiplier),
            in_channels * multiplier,
            0.0,
            rng,
            summaries,
        );
        Ok(Self {
            name: name.to_string(),
            spec,
            weights,
            activation,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn out_channels(&self) -> usize {
        self.weights.b_filter.len()
    }

    pub fn forward(&self, x: ArrayView3<'_, f64>) -> Result<Array3<f64>, ModelError> {
        let w = &self.weights;
        let mut h = depthwise_convolve(x, &w.w_filter, &w.b_filter, &self.spec)?;
        let t = depthwise_convolve(x, &w.w_gate, &w.b_gate, &self.spec)?;
        let act = self.activation;
        Zip::from(&mut h)
            .and(&t)
            .for_each(|h, &t| *h = act.apply(*h) * sigmoid(t));
        Ok(h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::init::seeded_rng;

    fn setup() -> (StdRng, SummaryRegistry) {
        (seeded_rng(11), SummaryRegistry::new())
    }

    #[test]
    fn test_gated_output_bounded() {
        let (mut rng, mut reg) = setup();
        let layer = GatedConv1d::new("gated", ConvSpec::new(3), 2, 5, &mut rng, &mut reg).unwrap();
        let x = Array3::from_elem((3, 8, 2), 4.0);
        let y = layer.forward(x.view()).unwrap();
        assert_eq!(y.dim(), (3, 6, 5));
        assert!(y.iter().all(|v| v.abs() < 1.0));
        assert_eq!(reg.scope("gated").count(), 4);
    }

    #[test]
    fn test_highway_initially_carries_input() {
        let (mut rng, mut reg) = setup();
        let spec = ConvSpec::new(3).with_padding(Padding::Same);
        let layer = HighwayConv1d::new("hw", spec, 4, &mut rng, &mut reg).unwrap();
        assert_eq!(reg.get("hw/bias_gate").unwrap().mean, HIGHWAY_GATE_BIAS);

        // zero input: conv(x) = bias, so H = tanh(0) = 0 and the output is 0
        let zeros = Array3::zeros((1, 6, 4));
        assert!(layer.forward(zeros.view()).unwrap().iter().all(|v| *v == 0.0));

        let x = Array3::from_shape_fn((1, 6, 4), |(_, t, c)| (t + c) as f64 * 0.01);
        let y = layer.forward(x.view()).unwrap();
        assert_eq!(y.dim(), x.dim());
        // gate ~ sigmoid(-3): output stays close to the input
        let diff = (&y - &x).mapv(f64::abs).fold(0.0f64, |a, &b| a.max(b));
        assert!(diff < 0.1);
    }

    #[test]
    fn test_highway_requires_same_padding() {
        let (mut rng, mut reg) = setup();
        assert!(HighwayConv1d::new("hw", ConvSpec::new(3), 4, &mut rng, &mut reg).is_err());
    }

    #[test]
    fn test_depthwise_gated_shape() {
        let (mut rng, mut reg) = setup();
        let layer = DepthwiseGatedConv1d::new(
            "dw",
            ConvSpec::new(2),
            3,
            2,
            Activation::Elu,
            &mut rng,
            &mut reg,
        )
        .unwrap();
        assert_eq!(layer.out_channels(), 6);
        let y = layer.forward(Array3::ones((2, 5, 3)).view()).unwrap();
        assert_eq!(y.dim(), (2, 4, 6));
        assert!(DepthwiseGatedConv1d::new("dw0", ConvSpec::new(2), 3, 0, Activation::Elu, &mut rng, &mut reg).is_err());
    }
}
