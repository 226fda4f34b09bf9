//! 1-D convolution over time.
//!
//! Output position `o`, tap `j` reads input step `o * stride + j * dilation - pad_left`.
//! Positions outside the sequence contribute zero. `Same` padding follows
//! the usual convention: `ceil(T / stride)` outputs with the extra padding
//! on the right.

use super::init::{constant, xavier_conv};
use super::{Activation, ModelError, SummaryRegistry};
use ndarray::{Array1, Array3, ArrayView3};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Padding {
    #[default]
    Valid,
    Same,
}

/// Geometry of a convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvSpec {
    pub kernel_size: usize,
    pub stride: usize,
    pub dilation: usize,
    pub padding: Padding,
}

impl ConvSpec {
    pub fn new(kernel_size: usize) -> Self {
        Self {
            kernel_size,
            stride: 1,
            dilation: 1,
            padding: Padding::Valid,
        }
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_dilation(mut self, dilation: usize) -> Self {
        self.dilation = dilation;
        self
    }

    pub fn with_padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.kernel_size == 0 || self.stride == 0 || self.dilation == 0 {
            return Err(ModelError::InvalidConfig(format!(
                "kernel_size, stride and dilation must be > 0, got {:?}",
                self
            )));
        }
        if self.dilation > 1 && self.stride > 1 {
            return Err(ModelError::InvalidConfig(
                "dilation > 1 requires stride 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Time steps covered by one output.
    pub fn receptive_field(&self) -> usize {
        (self.kernel_size - 1) * self.dilation + 1
    }

    /// Output length and left padding for an input of `length` steps.
    pub fn output_geometry(&self, length: usize) -> Result<(usize, usize), ModelError> {
        let rf = self.receptive_field();
        match self.padding {
            Padding::Valid => {
                if length < rf {
                    return Err(ModelError::SequenceTooShort {
                        length,
                        receptive_field: rf,
                    });
                }
                Ok(((length - rf) / self.stride + 1, 0))
            }
            Padding::Same => {
                let out = length.div_ceil(self.stride);
                let needed = ((out.saturating_sub(1)) * self.stride + rf).saturating_sub(length);
                Ok((out, needed / 2))
            }
        }
    }

    pub fn output_length(&self, length: usize) -> Result<usize, ModelError> {
        self.output_geometry(length).map(|(out, _)| out)
    }

    /// Input step read by output `o`, tap `j`, if inside the sequence.
    #[inline]
    fn source(&self, o: usize, j: usize, pad_left: usize, length: usize) -> Option<usize> {
        (o * self.stride + j * self.dilation)
            .checked_sub(pad_left)
            .filter(|&i| i < length)
    }
}

/// Full convolution: `kernel` is `(k, in, out)`, `x` is `(batch, T, in)`.
pub fn convolve(
    x: ArrayView3<'_, f64>,
    kernel: &Array3<f64>,
    bias: &Array1<f64>,
    spec: &ConvSpec,
) -> Result<Array3<f64>, ModelError> {
    spec.validate()?;
    let (batch, length, channels) = x.dim();
    let (k, c_in, c_out) = kernel.dim();
    if channels != c_in {
        return Err(ModelError::ChannelMismatch {
            expected: c_in,
            actual: channels,
        });
    }
    let (out_len, pad_left) = spec.output_geometry(length)?;

    let mut out = Array3::zeros((batch, out_len, c_out));
    for b in 0..batch {
        for o in 0..out_len {
            for co in 0..c_out {
                let mut acc = bias[co];
                for j in 0..k {
                    if let Some(i) = spec.source(o, j, pad_left, length) {
                        for ci in 0..c_in {
                            acc += kernel[[j, ci, co]] * x[[b, i, ci]];
                        }
                    }
                }
                out[[b, o, co]] = acc;
            }
        }
    }
    Ok(out)
}

/// Depthwise convolution: `kernel` is `(k, in, multiplier)` and output
/// channel `c * multiplier + m` only reads input channel `c`.
pub fn depthwise_convolve(
    x: ArrayView3<'_, f64>,
    kernel: &Array3<f64>,
    bias: &Array1<f64>,
    spec: &ConvSpec,
) -> Result<Array3<f64>, ModelError> {
    spec.validate()?;
    let (batch, length, channels) = x.dim();
    let (k, c_in, mult) = kernel.dim();
    if channels != c_in {
        return Err(ModelError::ChannelMismatch {
            expected: c_in,
            actual: channels,
        });
    }
    let (out_len, pad_left) = spec.output_geometry(length)?;

    let mut out = Array3::zeros((batch, out_len, c_in * mult));
    for b in 0..batch {
        for o in 0..out_len {
            for c in 0..c_in {
                for m in 0..mult {
                    let co = c * mult + m;
                    let mut acc = bias[co];
                    for j in 0..k {
                        if let Some(i) = spec.source(o, j, pad_left, length) {
                            acc += kernel[[j, c, m]] * x[[b, i, c]];
                        }
                    }
                    out[[b, o, co]] = acc;
                }
            }
        }
    }
    Ok(out)
}

/// Plain convolution layer with an optional activation.
#[derive(Debug, Clone)]
pub struct Conv1d {
    name: String,
    kernel: Array3<f64>,
    bias: Array1<f64>,
    spec: ConvSpec,
    activation: Option<Activation>,
}

impl Conv1d {
    pub fn new(
        name: &str,
        spec: ConvSpec,
        in_channels: usize,
        out_channels: usize,
        activation: Option<Activation>,
        rng: &mut StdRng,
        summaries: &mut SummaryRegistry,
    ) -> Result<Self, ModelError> {
        spec.validate()?;
        let kernel = xavier_conv(rng, spec.kernel_size, in_channels, out_channels);
        let bias = constant(out_channels, 0.0);
        summaries.record(name, "kernel", kernel.iter());
        summaries.record(name, "bias", bias.iter());
        Ok(Self {
            name: name.to_string(),
            kernel,
            bias,
            spec,
            activation,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &ConvSpec {
        &self.spec
    }

    pub fn out_channels(&self) -> usize {
        self.kernel.dim().2
    }

    pub fn forward(&self, x: ArrayView3<'_, f64>) -> Result<Array3<f64>, ModelError> {
        let mut out = convolve(x, &self.kernel, &self.bias, &self.spec)?;
        if let Some(act) = self.activation {
            out.mapv_inplace(|v| act.apply(v));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::init::seeded_rng;

    fn ramp(length: usize) -> Array3<f64> {
        Array3::from_shape_fn((1, length, 1), |(_, t, _)| t as f64 + 1.0)
    }

    #[test]
    fn test_valid_geometry() {
        let spec = ConvSpec::new(3);
        assert_eq!(spec.output_length(10).unwrap(), 8);
        assert_eq!(spec.with_stride(2).output_length(10).unwrap(), 4);
        assert_eq!(spec.with_dilation(2).receptive_field(), 5);
        assert!(matches!(
            spec.with_dilation(4).output_length(5),
            Err(ModelError::SequenceTooShort { .. })
        ));
    }

    #[test]
    fn test_same_geometry() {
        let spec = ConvSpec::new(3).with_padding(Padding::Same);
        assert_eq!(spec.output_geometry(10).unwrap(), (10, 1));
        assert_eq!(spec.with_stride(2).output_length(9).unwrap(), 5);
        assert_eq!(spec.with_dilation(2).output_geometry(10).unwrap(), (10, 2));
    }

    #[test]
    fn test_sum_kernel() {
        let kernel = Array3::ones((2, 1, 1));
        let out = convolve(ramp(4).view(), &kernel, &Array1::zeros(1), &ConvSpec::new(2)).unwrap();
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), vec![3.0, 5.0, 7.0]);
    }

    #[test]
    fn test_dilated_same_padding() {
        let kernel = Array3::ones((2, 1, 1));
        let spec = ConvSpec::new(2).with_dilation(2).with_padding(Padding::Same);
        // pad_left = 1: out[o] = x[o-1] + x[o+1]
        let out = convolve(ramp(4).view(), &kernel, &Array1::zeros(1), &spec).unwrap();
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), vec![2.0, 4.0, 6.0, 3.0]);
    }

    #[test]
    fn test_channel_mismatch() {
        let kernel = Array3::ones((2, 3, 1));
        assert_eq!(
            convolve(ramp(4).view(), &kernel, &Array1::zeros(1), &ConvSpec::new(2)).unwrap_err(),
            ModelError::ChannelMismatch {
                expected: 3,
                actual: 1
            }
        );
    }

    #[test]
    fn test_depthwise_keeps_channels_apart() {
        let mut x = Array3::zeros((1, 3, 2));
        x[[0, 1, 1]] = 1.0;
        let kernel = Array3::ones((1, 2, 2));
        let out = depthwise_convolve(x.view(), &kernel, &Array1::zeros(4), &ConvSpec::new(1)).unwrap();
        assert_eq!(out.dim(), (1, 3, 4));
        assert_eq!(out[[0, 1, 0]], 0.0);
        assert_eq!(out[[0, 1, 2]], 1.0);
        assert_eq!(out[[0, 1, 3]], 1.0);
    }

    #[test]
    fn test_conv_layer_records_summaries() {
        let mut rng = seeded_rng(3);
        let mut reg = SummaryRegistry::new();
        let conv = Conv1d::new("cnn", ConvSpec::new(3), 4, 6, Some(Activation::Tanh), &mut rng, &mut reg)
            .unwrap();
        assert_eq!(reg.scope("cnn").count(), 2);
        let out = conv.forward(Array3::ones((2, 5, 4)).view()).unwrap();
        assert_eq!(out.dim(), (2, 3, 6));
        assert!(out.iter().all(|v| v.abs() < 1.0));
    }
}
