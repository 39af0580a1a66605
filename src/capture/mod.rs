//! Energy-gated microphone capture
//!
//! A capture attempt listens until the input gets loud enough, then keeps
//! recording until a fixed window (measured from the start of the attempt)
//! has passed. If nothing loud enough arrives before the sound-check
//! deadline, the attempt is abandoned.

pub mod gate;
pub mod session;

use std::time::Duration;

use crate::error::CaptureError;

pub use gate::{CaptureGate, CaptureOutcome};

/// The three capabilities the gate needs from an input device.
pub trait CaptureDevice {
    fn sample_rate(&self) -> u32;

    fn start(&mut self) -> Result<(), CaptureError>;

    /// Byte-scaled magnitudes (0..=255) of the most recent analysis window.
    fn frequency_data(&mut self) -> Result<Vec<u8>, CaptureError>;

    /// Raw mono chunks received since the previous call, oldest first.
    fn take_chunks(&mut self) -> Result<Vec<Vec<f32>>, CaptureError>;

    /// Release the input stream. Must be safe to call more than once.
    fn stop(&mut self);
}

/// Timing and threshold settings for one capture attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct GateConfig {
    pub sound_check: Duration,
    pub recording_window: Duration,
    /// Mean byte magnitude that must be exceeded to count as sound.
    pub energy_threshold: f32,
    pub poll_interval: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            sound_check: Duration::from_millis(3000),
            recording_window: Duration::from_millis(5000),
            energy_threshold: 20.0,
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl GateConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval.is_zero() {
            return Err("poll interval must be positive".into());
        }
        if self.sound_check >= self.recording_window {
            return Err(format!(
                "sound check ({} ms) must end before the recording window ({} ms)",
                self.sound_check.as_millis(),
                self.recording_window.as_millis()
            ));
        }
        if !self.energy_threshold.is_finite() || self.energy_threshold < 0.0 {
            return Err("energy threshold must be a non-negative number".into());
        }
        Ok(())
    }
}
