//! Training hyperparameters.

use crate::error::{PipelineError, Result};
use crate::model::ModelConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Hyperparameters of one training run.
///
/// ```toml
/// batch_size = 32
/// eval_batch_size = 64
/// sequence_length = 20
/// learning_rate = 0.01
/// epochs = 10
/// eval_every = 50
/// checkpoint_every = 100
///
/// [model]
/// kind = "gated_conv_net"
/// channels = 16
/// dilation_rates = [1, 2, 4]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HParams {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_eval_batch_size")]
    pub eval_batch_size: usize,

    /// Rows per window; 1 for flat examples.
    #[serde(default = "default_sequence_length")]
    pub sequence_length: usize,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    #[serde(default = "default_epochs")]
    pub epochs: usize,

    /// Stop after this many steps even if epochs remain.
    #[serde(default)]
    pub max_steps: Option<usize>,

    /// Run the validation monitor every N steps.
    #[serde(default = "default_eval_every")]
    pub eval_every: usize,

    /// Write a checkpoint every N steps; 0 only writes the final one.
    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: usize,

    /// Stop once validation loss has not improved for this many evaluations.
    #[serde(default)]
    pub patience: Option<usize>,

    /// Shuffle seed of the train reader.
    #[serde(default = "default_shuffle_seed")]
    pub shuffle_seed: u64,

    #[serde(default)]
    pub model: ModelConfig,
}

fn default_batch_size() -> usize {
    32
}

fn default_eval_batch_size() -> usize {
    64
}

fn default_sequence_length() -> usize {
    20
}

fn default_learning_rate() -> f64 {
    0.01
}

fn default_epochs() -> usize {
    10
}

fn default_eval_every() -> usize {
    50
}

fn default_checkpoint_every() -> usize {
    100
}

fn default_shuffle_seed() -> u64 {
    7
}

impl Default for HParams {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            eval_batch_size: default_eval_batch_size(),
            sequence_length: default_sequence_length(),
            learning_rate: default_learning_rate(),
            epochs: default_epochs(),
            max_steps: None,
            eval_every: default_eval_every(),
            checkpoint_every: default_checkpoint_every(),
            patience: None,
            shuffle_seed: default_shuffle_seed(),
            model: ModelConfig::default(),
        }
    }
}

impl HParams {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.batch_size == 0 || self.eval_batch_size == 0 {
            return Err("batch sizes must be > 0".to_string());
        }
        if self.sequence_length == 0 {
            return Err("sequence_length must be > 0".to_string());
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(format!("learning_rate must be positive, got {}", self.learning_rate));
        }
        if self.epochs == 0 {
            return Err("epochs must be > 0".to_string());
        }
        if self.eval_every == 0 {
            return Err("eval_every must be > 0".to_string());
        }
        if self.patience == Some(0) {
            return Err("patience must be > 0 when set".to_string());
        }
        self.model.validate().map_err(|e| format!("model: {e}"))
    }

    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let hparams: HParams = toml::from_str(&contents)?;
        hparams.validate().map_err(PipelineError::Config)?;
        Ok(hparams)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelKind;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_valid() {
        let hparams = HParams::default();
        assert!(hparams.validate().is_ok());
        assert_eq!(hparams.batch_size, 32);
        assert_eq!(hparams.eval_every, 50);
    }

    #[test]
    fn test_invalid_values() {
        let mut hparams = HParams {
            learning_rate: 0.0,
            ..Default::default()
        };
        assert!(hparams.validate().is_err());

        hparams.learning_rate = 0.1;
        hparams.patience = Some(0);
        assert!(hparams.validate().is_err());

        hparams.patience = None;
        hparams.model.h_layer_size.clear();
        assert!(hparams.validate().unwrap_err().starts_with("model:"));
    }

    #[test]
    fn test_toml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hparams.toml");
        let mut hparams = HParams::default();
        hparams.model.kind = ModelKind::GatedConvNet;
        hparams.patience = Some(3);
        hparams.save_toml(&path).unwrap();
        assert_eq!(HParams::load_toml(&path).unwrap(), hparams);
    }

    #[test]
    fn test_partial_toml() {
        let hparams: HParams = toml::from_str(
            r#"
            learning_rate = 0.05

            [model]
            kind = "gated_conv_net"
            channels = 8
            "#,
        )
        .unwrap();
        assert_eq!(hparams.batch_size, 32);
        assert_eq!(hparams.model.kind, ModelKind::GatedConvNet);
        assert_eq!(hparams.model.channels, 8);
        assert_eq!(hparams.model.filter_size, 3);
    }
}
