//! Dilated convolutions through time.
//!
//! Taps are `dilation` steps apart, so a stack with rates `1, 2, 4, ...`
//! grows its receptive field exponentially with depth.

use super::conv::{Conv1d, ConvSpec, Padding};
use super::gated::GatedConv1d;
use super::{Activation, ModelError, SummaryRegistry};
use ndarray::{Array3, ArrayView3};
use rand::rngs::StdRng;

/// Receptive field of stacked stride-1 layers with the given rates.
pub fn stacked_receptive_field(kernel_size: usize, rates: &[usize]) -> usize {
    1 + rates.iter().map(|r| (kernel_size.max(1) - 1) * r).sum::<usize>()
}

fn dilated_spec(kernel_size: usize, rate: usize, padding: Padding) -> ConvSpec {
    ConvSpec::new(kernel_size)
        .with_dilation(rate)
        .with_padding(padding)
}

/// Convolution with taps `rate` steps apart.
#[derive(Debug, Clone)]
pub struct DilatedConv1d {
    inner: Conv1d,
}

impl DilatedConv1d {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &str,
        kernel_size: usize,
        rate: usize,
        padding: Padding,
        in_channels: usize,
        out_channels: usize,
        activation: Option<Activation>,
        rng: &mut StdRng,
        summaries: &mut SummaryRegistry,
    ) -> Result<Self, ModelError> {
        let spec = dilated_spec(kernel_size, rate, padding);
        Ok(Self {
            inner: Conv1d::new(name, spec, in_channels, out_channels, activation, rng, summaries)?,
        })
    }

    pub fn rate(&self) -> usize {
        self.inner.spec().dilation
    }

    pub fn receptive_field(&self) -> usize {
        self.inner.spec().receptive_field()
    }

    pub fn forward(&self, x: ArrayView3<'_, f64>) -> Result<Array3<f64>, ModelError> {
        self.inner.forward(x)
    }
}

/// Gated convolution with taps `rate` steps apart.
#[derive(Debug, Clone)]
pub struct GatedDilatedConv1d {
    inner: GatedConv1d,
}

impl GatedDilatedConv1d {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &str,
        kernel_size: usize,
        rate: usize,
        padding: Padding,
        in_channels: usize,
        out_channels: usize,
        rng: &mut StdRng,
        summaries: &mut SummaryRegistry,
    ) -> Result<Self, ModelError> {
        let spec = dilated_spec(kernel_size, rate, padding);
        Ok(Self {
            inner: GatedConv1d::new(name, spec, in_channels, out_channels, rng, summaries)?,
        })
    }

    pub fn rate(&self) -> usize {
        self.inner.spec().dilation
    }

    pub fn out_channels(&self) -> usize {
        self.inner.out_channels()
    }

    pub fn forward(&self, x: ArrayView3<'_, f64>) -> Result<Array3<f64>, ModelError> {
        self.inner.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::init::seeded_rng;

    #[test]
    fn test_stacked_receptive_field() {
        assert_eq!(stacked_receptive_field(2, &[1, 2, 4, 8]), 16);
        assert_eq!(stacked_receptive_field(3, &[1, 2, 4]), 15);
    }

    #[test]
    fn test_dilated_valid_shape() {
        let mut rng = seeded_rng(5);
        let mut reg = SummaryRegistry::new();
        let layer = DilatedConv1d::new("dil", 3, 4, Padding::Valid, 2, 3, None, &mut rng, &mut reg)
            .unwrap();
        assert_eq!(layer.receptive_field(), 9);
        let y = layer.forward(Array3::ones((1, 20, 2)).view()).unwrap();
        assert_eq!(y.dim(), (1, 12, 3));
        assert!(layer.forward(Array3::ones((1, 8, 2)).view()).is_err());
    }

    #[test]
    fn test_gated_dilated_same_keeps_length() {
        let mut rng = seeded_rng(5);
        let mut reg = SummaryRegistry::new();
        let layer =
            GatedDilatedConv1d::new("gdil", 2, 8, Padding::Same, 4, 4, &mut rng, &mut reg).unwrap();
        assert_eq!(layer.rate(), 8);
        let y = layer.forward(Array3::ones((2, 20, 4)).view()).unwrap();
        assert_eq!(y.dim(), (2, 20, 4));
    }
}
