use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::features::AudioSample;

/// File extensions accepted when scanning a directory for reference tracks.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["wav", "mp3", "flac", "ogg", "aac", "m4a"];

pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Decode an audio file into a mono sample. Stops early once `max_seconds`
/// of audio has been read.
pub fn decode_audio(path: &Path, max_seconds: Option<f32>) -> Result<AudioSample> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Failed to probe audio format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .context("No audio tracks found")?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count());
    let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;
    let limit = max_seconds.map(|s| (s * sample_rate as f32).ceil() as usize);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        if limit.is_some_and(|l| all_samples.len() >= l) {
            break;
        }

        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        let samples = sample_buf.samples();

        // Downmix to mono
        if channels == 1 {
            all_samples.extend_from_slice(samples);
        } else {
            for frame_samples in samples.chunks(channels) {
                let mono: f32 = frame_samples.iter().sum::<f32>() / channels as f32;
                all_samples.push(mono);
            }
        }
    }

    if let Some(l) = limit {
        all_samples.truncate(l);
    }

    log::info!(
        "Decoded {}: {} samples, {}Hz, {:.1}s",
        path.display(),
        all_samples.len(),
        sample_rate,
        all_samples.len() as f32 / sample_rate as f32
    );

    Ok(AudioSample::new(all_samples, sample_rate))
}
