//! Weight initialisation.
//!
//! Kernels use Xavier/Glorot uniform initialisation, `U(-a, a)` with
//! `a = sqrt(6 / (fan_in + fan_out))`. For a 1-D convolution kernel of shape
//! `(k, in, out)` the fans include the receptive field: `fan_in = k * in`,
//! `fan_out = k * out`.

use ndarray::{Array1, Array2, Array3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Deterministic RNG for a model build.
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

#[inline]
fn xavier_limit(fan_in: usize, fan_out: usize) -> f64 {
    (6.0 / (fan_in + fan_out).max(1) as f64).sqrt()
}

/// `(n_in, n_out)` dense kernel.
pub fn xavier_dense(rng: &mut StdRng, n_in: usize, n_out: usize) -> Array2<f64> {
    let limit = xavier_limit(n_in, n_out);
    Array2::from_shape_fn((n_in, n_out), |_| rng.gen_range(-limit..=limit))
}

/// `(kernel_size, in_channels, out_channels)` convolution kernel.
pub fn xavier_conv(
    rng: &mut StdRng,
    kernel_size: usize,
    in_channels: usize,
    out_channels: usize,
) -> Array3<f64> {
    let limit = xavier_limit(kernel_size * in_channels, kernel_size * out_channels);
    Array3::from_shape_fn((kernel_size, in_channels, out_channels), |_| {
        rng.gen_range(-limit..=limit)
    })
}

pub fn constant(len: usize, value: f64) -> Array1<f64> {
    Array1::from_elem(len, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xavier_bounds() {
        let mut rng = seeded_rng(7);
        let w = xavier_conv(&mut rng, 3, 4, 8);
        let limit = (6.0f64 / (12.0 + 24.0)).sqrt();
        assert_eq!(w.dim(), (3, 4, 8));
        assert!(w.iter().all(|v| v.abs() <= limit));
        assert!(w.iter().any(|v| *v != 0.0));
    }

    #[test]
    fn test_seed_is_deterministic() {
        let a = xavier_dense(&mut seeded_rng(1), 5, 3);
        let b = xavier_dense(&mut seeded_rng(1), 5, 3);
        let c = xavier_dense(&mut seeded_rng(2), 5, 3);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
