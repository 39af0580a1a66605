use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

use super::features::{AudioSample, SpectrogramTensor};
use super::mel::MelFilterbank;
use crate::error::FeatureError;
use crate::model::ModelConfig;

const LOG_EPSILON: f32 = 1e-6;

/// Turn a captured sample into the normalized log-mel tensor the scorer
/// consumes. Output shape depends only on `cfg`.
pub fn transform(sample: &AudioSample, cfg: &ModelConfig) -> Result<SpectrogramTensor, FeatureError> {
    cfg.validate()?;
    if sample.sample_rate() == 0 {
        return Err(FeatureError::ZeroSampleRate);
    }

    let resampled = resample_nearest(sample.samples(), sample.sample_rate(), cfg.sample_rate);
    let mut fitted = fit_length(resampled, cfg.expected_samples());
    let replaced = zero_non_finite(&mut fitted);
    if replaced > 0 {
        log::warn!("Replaced {} non-finite input samples with silence", replaced);
    }

    let magnitudes = stft_magnitudes(&fitted, cfg.n_fft, cfg.hop_length);
    let filterbank = MelFilterbank::new(cfg.n_mels, cfg.n_fft, cfg.sample_rate);

    let frames = magnitudes.len();
    let mut data: Vec<f32> = Vec::with_capacity(frames * cfg.n_mels);
    for spectrum in &magnitudes {
        data.extend(filterbank.apply(spectrum).into_iter().map(|m| (m + LOG_EPSILON).ln()));
    }

    normalize_min_max(&mut data);

    log::debug!(
        "Spectrogram: {} frames x {} mel bins from {} input samples",
        frames,
        cfg.n_mels,
        sample.len()
    );

    Ok(SpectrogramTensor::from_frames(data, frames, cfg.n_mels))
}

/// Nearest-neighbour rate conversion: `out[i] = in[floor(i / ratio)]`.
///
/// No low-pass filtering is applied, so downsampling aliases content above
/// the new Nyquist frequency into the spectrum.
pub fn resample_nearest(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate {
        return samples.to_vec();
    }
    let ratio = to_rate as f64 / from_rate as f64;
    let out_len = (samples.len() as f64 * ratio).floor() as usize;
    (0..out_len)
        .map(|i| {
            let src = ((i as f64 / ratio).floor() as usize).min(samples.len() - 1);
            samples[src]
        })
        .collect()
}

/// Truncate or zero-pad on the right to exactly `len` samples.
pub fn fit_length(mut samples: Vec<f32>, len: usize) -> Vec<f32> {
    samples.resize(len, 0.0);
    samples
}

/// Set NaN and infinite samples to 0.0, returning how many were replaced.
fn zero_non_finite(samples: &mut [f32]) -> usize {
    let mut replaced = 0;
    for s in samples.iter_mut().filter(|s| !s.is_finite()) {
        *s = 0.0;
        replaced += 1;
    }
    replaced
}

/// Magnitude spectra of Hann-windowed frames, `n_fft / 2 + 1` bins each.
/// Frames start at multiples of `hop`; a trailing partial frame is dropped.
fn stft_magnitudes(samples: &[f32], n_fft: usize, hop: usize) -> Vec<Vec<f32>> {
    if samples.len() < n_fft {
        return Vec::new();
    }
    let n_frames = 1 + (samples.len() - n_fft) / hop;
    let n_bins = n_fft / 2 + 1;
    let hann = hann_window(n_fft);

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n_fft);

    (0..n_frames)
        .into_par_iter()
        .map(|frame_idx| {
            let start = frame_idx * hop;
            let mut buffer: Vec<Complex<f32>> = samples[start..start + n_fft]
                .iter()
                .zip(&hann)
                .map(|(&s, &w)| Complex::new(s * w, 0.0))
                .collect();
            fft.process(&mut buffer);
            buffer[..n_bins].iter().map(|c| c.norm()).collect()
        })
        .collect()
}

/// Scale in place to [0, 1]. Non-finite cells become 0.0, and a flat input
/// becomes all zeros.
fn normalize_min_max(data: &mut [f32]) {
    let (min, max) = data
        .iter()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;

    if !(range.is_finite() && range > 0.0) {
        log::debug!("Degenerate spectrogram (min={}, max={}), emitting zeros", min, max);
        data.iter_mut().for_each(|v| *v = 0.0);
        return;
    }

    for v in data.iter_mut() {
        *v = if v.is_finite() { ((*v - min) / range).clamp(0.0, 1.0) } else { 0.0 };
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}
