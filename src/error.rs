//! Error types for the capture and identification pipeline

use thiserror::Error;

/// Errors raised while opening or running a capture session
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Input device missing, permission denied, or refused to start
    #[error("Audio input device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Another capture session currently holds the capture slot
    #[error("A capture session is already in progress")]
    Busy,

    /// The input stream failed after it was started
    #[error("Audio input stream error: {0}")]
    Stream(String),
}

/// Errors raised by the spectral transform
#[derive(Error, Debug, PartialEq)]
pub enum FeatureError {
    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),

    #[error("Input sample rate must be positive")]
    ZeroSampleRate,
}

/// Errors raised by a scorer backend
#[derive(Error, Debug, PartialEq)]
pub enum ScorerError {
    /// The scorer holds no classes
    #[error("Scorer has no classes loaded")]
    NotLoaded,

    #[error("Tensor shape mismatch: model expects {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: [usize; 4],
        actual: [usize; 4],
    },

    #[error("Scorer produced invalid output: {0}")]
    InvalidOutput(String),
}

/// Errors raised when turning probabilities into a match
#[derive(Error, Debug, PartialEq)]
pub enum DecisionError {
    #[error("Probability vector is empty")]
    EmptyProbabilities,

    #[error("Best class index {index} is outside the catalog ({catalog_len} songs)")]
    IndexOutOfCatalog { index: usize, catalog_len: usize },
}

/// Any hard failure between a captured sample and a match result
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Scorer(#[from] ScorerError),

    #[error(transparent)]
    Decision(#[from] DecisionError),
}
