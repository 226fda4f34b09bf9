//! Densely-connected layers.

use super::init::{constant, xavier_dense};
use super::{Activation, ModelError, SummaryRegistry};
use ndarray::{Array1, Array2, Array3, ArrayView2, ArrayView3, Axis};
use rand::rngs::StdRng;

/// `activation(x · W + b)` with `W` of shape `(n_in, n_out)`.
#[derive(Debug, Clone)]
pub struct Dense {
    name: String,
    weights: Array2<f64>,
    bias: Array1<f64>,
    activation: Activation,
}

impl Dense {
    /// Xavier-initialised kernel, zero bias.
    pub fn new(
        name: &str,
        n_in: usize,
        n_out: usize,
        activation: Activation,
        rng: &mut StdRng,
        summaries: &mut SummaryRegistry,
    ) -> Self {
        let weights = xavier_dense(rng, n_in, n_out);
        let bias = constant(n_out, 0.0);
        summaries.record(name, "weights", weights.iter());
        summaries.record(name, "bias", bias.iter());
        Self {
            name: name.to_string(),
            weights,
            bias,
            activation,
        }
    }

    /// All-zero layer, used as the starting point of a trained readout.
    pub fn zeros(name: &str, n_in: usize, n_out: usize, activation: Activation) -> Self {
        Self {
            name: name.to_string(),
            weights: Array2::zeros((n_in, n_out)),
            bias: Array1::zeros(n_out),
            activation,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn n_in(&self) -> usize {
        self.weights.nrows()
    }

    pub fn n_out(&self) -> usize {
        self.weights.ncols()
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    pub fn bias(&self) -> &Array1<f64> {
        &self.bias
    }

    /// Replace the parameters, keeping the layer shape.
    pub fn set_parameters(&mut self, weights: Array2<f64>, bias: Array1<f64>) -> Result<(), ModelError> {
        if weights.dim() != self.weights.dim() || bias.len() != self.bias.len() {
            return Err(ModelError::InvalidConfig(format!(
                "{}: expected parameters {:?} / {}, got {:?} / {}",
                self.name,
                self.weights.dim(),
                self.bias.len(),
                weights.dim(),
                bias.len()
            )));
        }
        self.weights = weights;
        self.bias = bias;
        Ok(())
    }

    /// `x · W + b` before the activation.
    pub fn linear(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError> {
        if x.ncols() != self.n_in() {
            return Err(ModelError::ChannelMismatch {
                expected: self.n_in(),
                actual: x.ncols(),
            });
        }
        Ok(x.dot(&self.weights) + &self.bias)
    }

    pub fn forward(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError> {
        let act = self.activation;
        Ok(self.linear(x)?.mapv_into(|v| act.apply(v)))
    }

    /// One gradient step given `d loss / d (x · W + b)` for a batch.
    pub fn sgd_step(
        &mut self,
        x: ArrayView2<'_, f64>,
        grad_linear: ArrayView2<'_, f64>,
        learning_rate: f64,
    ) {
        let grad_w = x.t().dot(&grad_linear);
        let grad_b = grad_linear.sum_axis(Axis(0));
        self.weights.scaled_add(-learning_rate, &grad_w);
        self.bias.scaled_add(-learning_rate, &grad_b);
    }
}

/// Apply the same dense layer at every timestep of `(batch, T, C)`.
pub fn dense_over_time(layer: &Dense, x: ArrayView3<'_, f64>) -> Result<Array3<f64>, ModelError> {
    let (batch, steps, channels) = x.dim();
    let flat = x
        .as_standard_layout()
        .into_owned()
        .into_shape((batch * steps, channels))
        .map_err(|e| ModelError::InvalidConfig(e.to_string()))?;
    let out = layer.forward(flat.view())?;
    out.into_shape((batch, steps, layer.n_out()))
        .map_err(|e| ModelError::InvalidConfig(e.to_string()))
}
