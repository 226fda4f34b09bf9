//! Multilayer perceptron over a window.
//!
//! ```text
//! (B, T, K) --dense_over_time(elu)--> (B, T, h0) --flatten--> (B, T*h0)
//!           --dense(relu)--> (B, h1) --> ... --> (B, h_last)
//! ```

use super::dense::{dense_over_time, Dense};
use super::init::seeded_rng;
use super::{Activation, ModelConfig, ModelError, ModelKind, SequenceModel, SummaryRegistry};
use ndarray::{Array2, ArrayView3};

pub struct MultilayerPerceptron {
    sequence_length: usize,
    over_time: Dense,
    hidden: Vec<Dense>,
    summaries: SummaryRegistry,
}

impl MultilayerPerceptron {
    pub fn new(
        config: &ModelConfig,
        sequence_length: usize,
        n_features: usize,
    ) -> Result<Self, ModelError> {
        let (&first, rest) = config
            .h_layer_size
            .split_first()
            .ok_or_else(|| ModelError::InvalidConfig("h_layer_size is empty".to_string()))?;

        let mut rng = seeded_rng(config.seed);
        let mut summaries = SummaryRegistry::new();

        let over_time = Dense::new("ml", n_features, first, Activation::Elu, &mut rng, &mut summaries);

        let mut hidden = Vec::with_capacity(rest.len());
        let mut n_in = sequence_length * first;
        for (i, &size) in rest.iter().enumerate() {
            hidden.push(Dense::new(
                &format!("hidden_{}", i + 1),
                n_in,
                size,
                Activation::Relu,
                &mut rng,
                &mut summaries,
            ));
            n_in = size;
        }

        Ok(Self {
            sequence_length,
            over_time,
            hidden,
            summaries,
        })
    }
}

impl SequenceModel for MultilayerPerceptron {
    fn kind(&self) -> ModelKind {
        ModelKind::MultilayerPerceptron
    }

    fn feature_dim(&self) -> usize {
        self.hidden
            .last()
            .map_or(self.sequence_length * self.over_time.n_out(), Dense::n_out)
    }

    fn encode(&self, windows: ArrayView3<'_, f64>) -> Result<Array2<f64>, ModelError> {
        let (batch, steps, _) = windows.dim();
        if steps != self.sequence_length {
            return Err(ModelError::InvalidConfig(format!(
                "expected windows of {} steps, got {}",
                self.sequence_length, steps
            )));
        }
        let projected = dense_over_time(&self.over_time, windows)?;
        let mut x = projected
            .into_shape((batch, steps * self.over_time.n_out()))
            .map_err(|e| ModelError::InvalidConfig(e.to_string()))?;
        for layer in &self.hidden {
            x = layer.forward(x.view())?;
        }
        Ok(x)
    }

    fn summaries(&self) -> &SummaryRegistry {
        &self.summaries
    }
}
