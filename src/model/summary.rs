//! Diagnostic summaries of weight tensors.
//!
//! Every layer constructor records its weights here. Each summary holds
//! the moments, the L2 norm and a fixed-bucket histogram, and is logged at
//! `debug` when recorded.

use serde::{Deserialize, Serialize};

/// Buckets per histogram.
pub const HISTOGRAM_BUCKETS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorSummary {
    /// `<layer>/<tensor>`
    pub name: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub l2_norm: f64,
    /// Counts over `HISTOGRAM_BUCKETS` equal-width buckets spanning `[min, max]`
    pub histogram: Vec<usize>,
}

impl TensorSummary {
    pub fn from_values<'a, I>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = &'a f64>,
    {
        let values: Vec<f64> = values.into_iter().copied().collect();
        let count = values.len();
        if count == 0 {
            return Self {
                name: name.into(),
                count,
                mean: 0.0,
                std: 0.0,
                min: 0.0,
                max: 0.0,
                l2_norm: 0.0,
                histogram: vec![0; HISTOGRAM_BUCKETS],
            };
        }

        let n = count as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let l2_norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();

        let mut histogram = vec![0; HISTOGRAM_BUCKETS];
        let width = (max - min) / HISTOGRAM_BUCKETS as f64;
        for v in &values {
            let bucket = if width > 0.0 {
                (((v - min) / width) as usize).min(HISTOGRAM_BUCKETS - 1)
            } else {
                0
            };
            histogram[bucket] += 1;
        }

        Self {
            name: name.into(),
            count,
            mean,
            std: var.sqrt(),
            min,
            max,
            l2_norm,
            histogram,
        }
    }
}

/// Collected summaries of one model build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryRegistry {
    entries: Vec<TensorSummary>,
}

impl SummaryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Summarise `values` under `<scope>/<tensor>`.
    pub fn record<'a, I>(&mut self, scope: &str, tensor: &str, values: I)
    where
        I: IntoIterator<Item = &'a f64>,
    {
        let summary = TensorSummary::from_values(format!("{scope}/{tensor}"), values);
        tracing::debug!(
            name = %summary.name,
            mean = summary.mean,
            std = summary.std,
            min = summary.min,
            max = summary.max,
            l2_norm = summary.l2_norm,
            histogram = ?summary.histogram,
            "tensor summary"
        );
        self.entries.push(summary);
    }

    pub fn get(&self, name: &str) -> Option<&TensorSummary> {
        self.entries.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TensorSummary> {
        self.entries.iter()
    }

    /// Summaries recorded under a layer scope.
    pub fn scope<'a>(&'a self, scope: &'a str) -> impl Iterator<Item = &'a TensorSummary> + 'a {
        self.entries
            .iter()
            .filter(move |s| s.name.split('/').next() == Some(scope))
    }
}
