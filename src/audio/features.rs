/// Mono PCM audio tagged with its sample rate
#[derive(Clone, Debug, PartialEq)]
pub struct AudioSample {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioSample {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    /// Concatenate capture chunks in arrival order.
    pub fn from_chunks(chunks: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let total = chunks.iter().map(Vec::len).sum();
        let mut samples = Vec::with_capacity(total);
        for chunk in chunks {
            samples.extend(chunk);
        }
        Self { samples, sample_rate }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Normalized log-mel spectrogram laid out as `[1, frames, mel_bins, 1]`.
///
/// Values are stored frame-major: `data[frame * mel_bins + bin]`.
#[derive(Clone, Debug, PartialEq)]
pub struct SpectrogramTensor {
    data: Vec<f32>,
    frames: usize,
    mel_bins: usize,
}

impl SpectrogramTensor {
    pub(crate) fn from_frames(data: Vec<f32>, frames: usize, mel_bins: usize) -> Self {
        debug_assert_eq!(data.len(), frames * mel_bins);
        Self { data, frames, mel_bins }
    }

    /// Batch, frame, mel-bin and channel extents.
    pub fn shape(&self) -> [usize; 4] {
        [1, self.frames, self.mel_bins, 1]
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn mel_bins(&self) -> usize {
        self.mel_bins
    }

    #[cfg(test)]
    pub fn values(&self) -> &[f32] {
        &self.data
    }

    #[cfg(test)]
    pub fn frame(&self, index: usize) -> &[f32] {
        let start = index * self.mel_bins;
        &self.data[start..start + self.mel_bins]
    }

    pub fn iter_frames(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks(self.mel_bins.max(1)).take(self.frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_concatenate_in_order() {
        let sample = AudioSample::from_chunks(vec![vec![1.0, 2.0], vec![], vec![3.0]], 8000);
        assert_eq!(sample.samples(), &[1.0, 2.0, 3.0]);
        assert_eq!(sample.sample_rate(), 8000);
    }

    #[test]
    fn tensor_frame_access() {
        let tensor = SpectrogramTensor::from_frames(vec![0.0, 0.5, 1.0, 0.25, 0.75, 0.1], 2, 3);
        assert_eq!(tensor.shape(), [1, 2, 3, 1]);
        assert_eq!(tensor.frame(1), &[0.25, 0.75, 0.1]);
        assert_eq!(tensor.iter_frames().count(), 2);
    }
}
