pub mod enroll;
pub mod profile;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::audio::features::SpectrogramTensor;
use crate::error::{FeatureError, ScorerError};

pub use profile::ProfileScorer;

pub const MODEL_INFO_FILE: &str = "model_info.json";
pub const SCORER_FILE: &str = "scorer.json";

/// Feature-extraction parameters the classifier was trained with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub sample_rate: u32,
    pub n_fft: usize,
    pub hop_length: usize,
    pub n_mels: usize,
    /// Seconds of audio per input
    pub duration: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            duration: 5.0,
        }
    }
}

impl ModelConfig {
    pub fn expected_samples(&self) -> usize {
        (self.sample_rate as f64 * self.duration as f64).round() as usize
    }

    /// STFT frames for one input, without centre padding.
    pub fn expected_frames(&self) -> usize {
        let n = self.expected_samples();
        if n < self.n_fft || self.hop_length == 0 {
            return 0;
        }
        1 + (n - self.n_fft) / self.hop_length
    }

    pub fn input_shape(&self) -> [usize; 4] {
        [1, self.expected_frames(), self.n_mels, 1]
    }

    pub fn validate(&self) -> Result<(), FeatureError> {
        if self.sample_rate == 0 {
            return Err(FeatureError::InvalidConfig("sample_rate must be positive".into()));
        }
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(FeatureError::InvalidConfig("duration must be positive".into()));
        }
        if self.n_fft < 2 {
            return Err(FeatureError::InvalidConfig("n_fft must be at least 2".into()));
        }
        if self.hop_length == 0 {
            return Err(FeatureError::InvalidConfig("hop_length must be positive".into()));
        }
        if self.n_mels == 0 {
            return Err(FeatureError::InvalidConfig("n_mels must be positive".into()));
        }
        if self.expected_samples() < self.n_fft {
            return Err(FeatureError::InvalidConfig(format!(
                "{} samples per input is shorter than one {}-point window",
                self.expected_samples(),
                self.n_fft
            )));
        }
        Ok(())
    }
}

/// A classifier mapping a spectrogram to per-song probabilities.
///
/// Output index `i` corresponds to catalog entry `i`.
pub trait Scorer {
    fn num_classes(&self) -> usize;

    fn score(&self, tensor: &SpectrogramTensor) -> Result<Vec<f32>, ScorerError>;
}

pub fn load_model_config(dir: &Path) -> Result<ModelConfig> {
    let path = dir.join(MODEL_INFO_FILE);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read model info: {}", path.display()))?;
    let config: ModelConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse model info: {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Rejected model info: {}", path.display()))?;
    Ok(config)
}

/// Load the model config and scorer from a model directory.
pub fn load_model(dir: &Path) -> Result<(ModelConfig, ProfileScorer)> {
    let config = load_model_config(dir)?;
    log::info!(
        "Model config: {}Hz, n_fft={}, hop={}, n_mels={}, {:.1}s",
        config.sample_rate,
        config.n_fft,
        config.hop_length,
        config.n_mels,
        config.duration
    );

    let scorer_path = dir.join(SCORER_FILE);
    let scorer = ProfileScorer::load(&scorer_path)?;
    if scorer.input_shape() != config.input_shape() {
        anyhow::bail!(
            "Scorer {} expects input {:?} but model info implies {:?}",
            scorer_path.display(),
            scorer.input_shape(),
            config.input_shape()
        );
    }
    log::info!("Loaded scorer with {} classes", scorer.num_classes());
    Ok((config, scorer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_training_constants() {
        let cfg = ModelConfig::default();
        assert_eq!(cfg.expected_samples(), 110_250);
        assert_eq!(cfg.expected_frames(), 212);
        assert_eq!(cfg.input_shape(), [1, 212, 128, 1]);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn parses_model_info_json() {
        let json = r#"{"sample_rate": 16000, "n_fft": 512, "hop_length": 256, "n_mels": 40, "duration": 2}"#;
        let cfg: ModelConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.expected_samples(), 32_000);
        assert_eq!(cfg.duration, 2.0);
    }

    #[test]
    fn rejects_window_longer_than_input() {
        let cfg = ModelConfig {
            sample_rate: 1000,
            n_fft: 2048,
            hop_length: 512,
            n_mels: 8,
            duration: 1.0,
        };
        assert!(matches!(cfg.validate(), Err(FeatureError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_zero_hop() {
        let cfg = ModelConfig { hop_length: 0, ..ModelConfig::default() };
        assert!(cfg.validate().is_err());
        assert_eq!(cfg.expected_frames(), 0);
    }
}
