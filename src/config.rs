use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub model: ModelPaths,
    #[serde(default)]
    pub matching: MatchingConfig,
}

#[derive(Debug, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_sound_check_ms")]
    pub sound_check_ms: u64,
    #[serde(default = "default_recording_ms")]
    pub recording_ms: u64,
    #[serde(default = "default_energy_threshold")]
    pub energy_threshold: f32,
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
    #[serde(default)]
    pub device: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ModelPaths {
    #[serde(default = "default_model_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_catalog")]
    pub catalog: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct MatchingConfig {
    #[serde(default = "default_recommendations")]
    pub recommendations: usize,
    #[serde(default)]
    pub min_confidence: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sound_check_ms: default_sound_check_ms(),
            recording_ms: default_recording_ms(),
            energy_threshold: default_energy_threshold(),
            poll_ms: default_poll_ms(),
            device: None,
        }
    }
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self {
            dir: default_model_dir(),
            catalog: default_catalog(),
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            recommendations: default_recommendations(),
            min_confidence: 0.0,
        }
    }
}

pub fn default_sound_check_ms() -> u64 { 3000 }
pub fn default_recording_ms() -> u64 { 5000 }
pub fn default_energy_threshold() -> f32 { 20.0 }
pub fn default_poll_ms() -> u64 { 100 }
pub fn default_model_dir() -> PathBuf { "model".into() }
pub fn default_catalog() -> PathBuf { "songs.json".into() }
pub fn default_recommendations() -> usize { 5 }

pub fn load_config(path: &PathBuf) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}
