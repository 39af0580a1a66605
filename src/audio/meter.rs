use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::collections::VecDeque;
use std::sync::Arc;

pub const ANALYSIS_SIZE: usize = 2048;
const SMOOTHING: f32 = 0.8;
const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;

/// Byte-scaled frequency snapshot of the most recent input, in the style of
/// a browser analyser node: Blackman window, `1/N` magnitude, exponential
/// smoothing across snapshots, and [-100 dB, -30 dB] mapped onto 0..=255.
pub struct ByteSpectrumMeter {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    history: VecDeque<f32>,
    smoothed: Vec<f32>,
}

impl ByteSpectrumMeter {
    pub fn new() -> Self {
        let mut planner = FftPlanner::<f32>::new();
        Self {
            fft: planner.plan_fft_forward(ANALYSIS_SIZE),
            window: blackman_window(ANALYSIS_SIZE),
            history: VecDeque::from(vec![0.0; ANALYSIS_SIZE]),
            smoothed: vec![0.0; ANALYSIS_SIZE / 2],
        }
    }

    /// Feed raw samples; only the latest `ANALYSIS_SIZE` are kept.
    pub fn push(&mut self, samples: &[f32]) {
        let skip = samples.len().saturating_sub(ANALYSIS_SIZE);
        for &s in &samples[skip..] {
            self.history.pop_front();
            self.history.push_back(s);
        }
    }

    /// One byte per frequency bin (`ANALYSIS_SIZE / 2` bins).
    pub fn byte_frequency_data(&mut self) -> Vec<u8> {
        let mut buffer: Vec<Complex<f32>> = self
            .history
            .iter()
            .zip(&self.window)
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();
        self.fft.process(&mut buffer);

        let scale = 1.0 / ANALYSIS_SIZE as f32;
        let byte_range = 255.0 / (MAX_DB - MIN_DB);

        self.smoothed
            .iter_mut()
            .zip(&buffer)
            .map(|(prev, bin)| {
                let magnitude = bin.norm() * scale;
                *prev = SMOOTHING * *prev + (1.0 - SMOOTHING) * magnitude;
                if *prev <= 0.0 {
                    return 0;
                }
                let db = 20.0 * prev.log10();
                (byte_range * (db - MIN_DB)).clamp(0.0, 255.0) as u8
            })
            .collect()
    }
}

impl Default for ByteSpectrumMeter {
    fn default() -> Self {
        Self::new()
    }
}

/// Mean magnitude across all bins of a byte snapshot.
pub fn mean_level(data: &[u8]) -> f32 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().map(|&b| b as u32).sum::<u32>() as f32 / data.len() as f32
}

fn blackman_window(size: usize) -> Vec<f32> {
    let alpha = 0.16f32;
    let a0 = 0.5 * (1.0 - alpha);
    let a1 = 0.5;
    let a2 = 0.5 * alpha;
    (0..size)
        .map(|i| {
            let x = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
            a0 - a1 * x.cos() + a2 * (2.0 * x).cos()
        })
        .collect()
}
