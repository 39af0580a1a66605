use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

use super::profile::{profile, validate_temperature, ClassProfiles, ProfileScorer};
use super::{ModelConfig, MODEL_INFO_FILE, SCORER_FILE};
use crate::audio::analysis::transform;
use crate::audio::decode::{decode_audio, is_supported};
use crate::audio::features::AudioSample;

/// Audio files in `dir`, sorted by file name. Sorted position is the class index.
pub fn reference_tracks(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut tracks = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read reference directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && is_supported(&path) {
            tracks.push(path);
        }
    }
    tracks.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(tracks)
}

/// Consecutive `seg_len`-sample windows, at most `max_segments`. A trailing
/// window shorter than half a segment is dropped unless it is the only one.
pub fn split_segments(sample: &AudioSample, seg_len: usize, max_segments: usize) -> Vec<AudioSample> {
    let samples = sample.samples();
    if seg_len == 0 || max_segments == 0 {
        return Vec::new();
    }
    if samples.len() <= seg_len {
        return vec![sample.clone()];
    }
    samples
        .chunks(seg_len)
        .take(max_segments)
        .filter(|chunk| chunk.len() * 2 >= seg_len)
        .map(|chunk| AudioSample::new(chunk.to_vec(), sample.sample_rate()))
        .collect()
}

/// Build reference profiles for every track in `tracks_dir` and write the
/// model files into `model_dir`.
pub fn enroll(
    tracks_dir: &Path,
    model_dir: &Path,
    config: &ModelConfig,
    max_segments: usize,
    temperature: f32,
) -> Result<ProfileScorer> {
    config.validate().context("Invalid model configuration for enrolment")?;
    validate_temperature(temperature)?;

    let tracks = reference_tracks(tracks_dir)?;
    if tracks.is_empty() {
        anyhow::bail!("No audio files found in {}", tracks_dir.display());
    }
    log::info!("Enrolling {} tracks from {}", tracks.len(), tracks_dir.display());

    let pb = ProgressBar::new(tracks.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tracks ({eta} remaining)")
            .context("Invalid progress bar template")?
            .progress_chars("=>-"),
    );

    let max_seconds = config.duration * max_segments.max(1) as f32;
    let mut classes = Vec::with_capacity(tracks.len());

    for path in &tracks {
        let audio = decode_audio(path, Some(max_seconds))?;
        let seg_len = (audio.sample_rate() as f32 * config.duration).round() as usize;

        let mut profiles = Vec::new();
        for segment in split_segments(&audio, seg_len, max_segments) {
            let tensor = transform(&segment, config)
                .with_context(|| format!("Failed to analyze {}", path.display()))?;
            profiles.push(profile(&tensor));
        }

        let label = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        log::debug!("{}: {} segment profiles", label, profiles.len());
        classes.push(ClassProfiles { label, profiles });
        pb.inc(1);
    }

    pb.finish_with_message("Enrolment complete");

    let scorer = ProfileScorer::new(config.expected_frames(), config.n_mels, temperature, classes);

    std::fs::create_dir_all(model_dir)
        .with_context(|| format!("Failed to create model directory: {}", model_dir.display()))?;
    let info_path = model_dir.join(MODEL_INFO_FILE);
    let info = serde_json::to_string_pretty(config).context("Failed to serialize model info")?;
    std::fs::write(&info_path, info)
        .with_context(|| format!("Failed to write model info: {}", info_path.display()))?;
    scorer.save(&model_dir.join(SCORER_FILE))?;

    log::info!("Model written to {}", model_dir.display());
    Ok(scorer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_track_splits_into_capped_segments() {
        let sample = AudioSample::new(vec![0.1; 1050], 100);
        let segments = split_segments(&sample, 200, 3);
        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|s| s.len() == 200 && s.sample_rate() == 100));
    }

    #[test]
    fn short_tail_is_dropped() {
        let sample = AudioSample::new(vec![0.1; 450], 100);
        let segments = split_segments(&sample, 200, 10);
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn short_track_gives_one_segment() {
        let sample = AudioSample::new(vec![0.1; 50], 100);
        let segments = split_segments(&sample, 200, 4);
        assert_eq!(segments, vec![sample]);
    }

    #[test]
    fn non_positive_temperature_is_rejected_before_reading_tracks() {
        let model_dir = std::env::temp_dir().join("songsense-enroll-temperature");
        for temperature in [0.0, -20.0] {
            let err = enroll(
                Path::new("/nonexistent/songsense/tracks"),
                &model_dir,
                &ModelConfig::default(),
                4,
                temperature,
            )
            .unwrap_err();
            assert!(err.to_string().contains("temperature"), "{}", err);
        }
        assert!(!model_dir.exists());
    }

    #[test]
    fn missing_directory_is_an_error() {
        assert!(reference_tracks(Path::new("/nonexistent/songsense/tracks")).is_err());
    }
}
