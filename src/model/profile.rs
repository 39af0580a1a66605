use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::Scorer;
use crate::audio::features::SpectrogramTensor;
use crate::error::ScorerError;

const DEFAULT_TEMPERATURE: f32 = 20.0;

/// Reference profiles of one catalog song.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassProfiles {
    /// Source the profiles were built from, for diagnostics
    #[serde(default)]
    pub label: String,
    pub profiles: Vec<Vec<f32>>,
}

/// Nearest-profile classifier.
///
/// Each song is represented by one or more segment profiles (per-band mean
/// and standard deviation of a spectrogram, L2-normalized). A class scores
/// its best cosine similarity to the input profile, and the scores go through
/// a tempered softmax.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileScorer {
    frames: usize,
    n_mels: usize,
    #[serde(default = "default_temperature")]
    temperature: f32,
    classes: Vec<ClassProfiles>,
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

/// Softmax temperature must be finite and positive: zero flattens every
/// score to 1/N and a negative value inverts the ranking.
pub fn validate_temperature(temperature: f32) -> Result<()> {
    if !(temperature.is_finite() && temperature > 0.0) {
        anyhow::bail!("Scorer temperature must be finite and positive, got {}", temperature);
    }
    Ok(())
}

impl ProfileScorer {
    pub fn new(frames: usize, n_mels: usize, temperature: f32, classes: Vec<ClassProfiles>) -> Self {
        Self {
            frames,
            n_mels,
            temperature,
            classes,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scorer: {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("Invalid scorer: {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let scorer: ProfileScorer = serde_json::from_str(json).context("Failed to parse scorer")?;
        validate_temperature(scorer.temperature)?;

        let width = 2 * scorer.n_mels;
        for (i, class) in scorer.classes.iter().enumerate() {
            if let Some(bad) = class.profiles.iter().find(|p| p.len() != width) {
                anyhow::bail!(
                    "Class {} ({}) has a profile of length {}, expected {}",
                    i,
                    class.label,
                    bad.len(),
                    width
                );
            }
        }
        Ok(scorer)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self).context("Failed to serialize scorer")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write scorer: {}", path.display()))
    }

    pub fn input_shape(&self) -> [usize; 4] {
        [1, self.frames, self.n_mels, 1]
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(|c| c.label.as_str())
    }
}

impl Scorer for ProfileScorer {
    fn num_classes(&self) -> usize {
        self.classes.len()
    }

    fn score(&self, tensor: &SpectrogramTensor) -> Result<Vec<f32>, ScorerError> {
        if self.classes.is_empty() {
            return Err(ScorerError::NotLoaded);
        }
        if tensor.shape() != self.input_shape() {
            return Err(ScorerError::ShapeMismatch {
                expected: self.input_shape(),
                actual: tensor.shape(),
            });
        }

        let query = profile(tensor);
        let logits: Vec<f32> = self
            .classes
            .iter()
            .map(|class| {
                class
                    .profiles
                    .iter()
                    .map(|p| dot(&query, p))
                    .fold(-1.0f32, f32::max)
                    * self.temperature
            })
            .collect();

        let probs = softmax(&logits);
        if probs.iter().any(|p| !p.is_finite()) {
            return Err(ScorerError::InvalidOutput("non-finite probability".into()));
        }
        Ok(probs)
    }
}

/// Per-band mean followed by per-band standard deviation over all frames,
/// scaled to unit length. An all-zero spectrogram gives an all-zero profile.
pub fn profile(tensor: &SpectrogramTensor) -> Vec<f32> {
    let bins = tensor.mel_bins();
    let frames = tensor.frames().max(1) as f32;

    let mut mean = vec![0.0f32; bins];
    for frame in tensor.iter_frames() {
        for (m, &v) in mean.iter_mut().zip(frame) {
            *m += v;
        }
    }
    mean.iter_mut().for_each(|m| *m /= frames);

    let mut var = vec![0.0f32; bins];
    for frame in tensor.iter_frames() {
        for ((s, &v), &m) in var.iter_mut().zip(frame).zip(&mean) {
            *s += (v - m) * (v - m);
        }
    }

    let mut out = mean;
    out.extend(var.into_iter().map(|s| (s / frames).sqrt()));

    let norm = out.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        out.iter_mut().for_each(|v| *v /= norm);
    }
    out
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
