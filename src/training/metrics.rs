//! Evaluation metrics.

use crate::labeling::{Direction, LabelKind};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

const PROB_EPS: f64 = 1e-12;

/// Metrics over one pass of a dataset.
///
/// For direction labels predictions are probabilities of `Up`: `loss` is the
/// mean log loss and `accuracy` thresholds them at 0.5. For forward values
/// `loss` equals `mse`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub loss: f64,
    pub mse: f64,
    pub mae: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    pub examples: usize,
}

impl Metrics {
    pub fn compute(predictions: ArrayView1<'_, f64>, targets: ArrayView1<'_, f64>, kind: LabelKind) -> Self {
        let examples = predictions.len().min(targets.len());
        if examples == 0 {
            return Self::default();
        }
        let n = examples as f64;

        let mut sq = 0.0;
        let mut abs = 0.0;
        let mut log_loss = 0.0;
        let mut correct = 0usize;
        for (&p, &y) in predictions.iter().zip(targets.iter()) {
            let e = p - y;
            sq += e * e;
            abs += e.abs();
            if kind == LabelKind::Direction {
                let p = p.clamp(PROB_EPS, 1.0 - PROB_EPS);
                log_loss -= y * p.ln() + (1.0 - y) * (1.0 - p).ln();
                if Direction::from_value(p) == Direction::from_value(y) {
                    correct += 1;
                }
            }
        }

        let mse = sq / n;
        match kind {
            LabelKind::Direction => Self {
                loss: log_loss / n,
                mse,
                mae: abs / n,
                accuracy: Some(correct as f64 / n),
                examples,
            },
            LabelKind::ForwardValue => Self {
                loss: mse,
                mse,
                mae: abs / n,
                accuracy: None,
                examples,
            },
        }
    }
}

/// Gradient of the batch loss with respect to the readout's linear output.
///
/// Squared error gives `2 (z - y) / n`; log loss on `sigmoid(z)` gives
/// `(sigmoid(z) - y) / n`.
pub fn loss_gradient(linear: ArrayView1<'_, f64>, targets: ArrayView1<'_, f64>, kind: LabelKind) -> Array1<f64> {
    let n = linear.len().max(1) as f64;
    match kind {
        LabelKind::Direction => ndarray::Zip::from(&linear)
            .and(&targets)
            .map_collect(|&z, &y| (crate::model::sigmoid(z) - y) / n),
        LabelKind::ForwardValue => ndarray::Zip::from(&linear)
            .and(&targets)
            .map_collect(|&z, &y| 2.0 * (z - y) / n),
    }
}

/// Batch loss in the readout's training space.
pub fn batch_loss(linear: ArrayView1<'_, f64>, targets: ArrayView1<'_, f64>, kind: LabelKind) -> f64 {
    let predictions = match kind {
        LabelKind::Direction => linear.mapv(crate::model::sigmoid),
        LabelKind::ForwardValue => linear.to_owned(),
    };
    Metrics::compute(predictions.view(), targets, kind).loss
}
