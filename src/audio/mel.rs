/// Triangular mel filterbank over the `n_fft / 2 + 1` magnitude bins.
pub struct MelFilterbank {
    filters: Vec<Vec<f32>>,
}

impl MelFilterbank {
    /// Build `n_mels` triangles evenly spaced on the HTK mel scale from 0 Hz
    /// to Nyquist.
    pub fn new(n_mels: usize, n_fft: usize, sample_rate: u32) -> Self {
        let n_bins = n_fft / 2 + 1;
        let sr = sample_rate as f32;

        let mel_min = hz_to_mel(0.0);
        let mel_max = hz_to_mel(sr / 2.0);

        let n_points = n_mels + 2;
        let bin_points: Vec<f32> = (0..n_points)
            .map(|i| mel_min + (mel_max - mel_min) * i as f32 / (n_points - 1) as f32)
            .map(mel_to_hz)
            .map(|hz| hz * n_fft as f32 / sr)
            .collect();

        let filters = (0..n_mels)
            .map(|band| {
                let left = bin_points[band];
                let center = bin_points[band + 1];
                let right = bin_points[band + 2];
                (0..n_bins)
                    .map(|bin| {
                        let bin_f = bin as f32;
                        if bin_f >= left && bin_f <= center && center > left {
                            (bin_f - left) / (center - left)
                        } else if bin_f > center && bin_f <= right && right > center {
                            (right - bin_f) / (right - center)
                        } else {
                            0.0
                        }
                    })
                    .collect()
            })
            .collect();

        Self { filters }
    }

    #[cfg(test)]
    pub fn n_mels(&self) -> usize {
        self.filters.len()
    }

    /// Weighted band sums of one magnitude spectrum.
    pub fn apply(&self, spectrum: &[f32]) -> Vec<f32> {
        self.filters
            .iter()
            .map(|filter| filter.iter().zip(spectrum).map(|(&w, &m)| w * m).sum())
            .collect()
    }
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}
