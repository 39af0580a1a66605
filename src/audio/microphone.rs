use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{unbounded, Receiver, Sender};

use super::meter::ByteSpectrumMeter;
use crate::capture::CaptureDevice;
use crate::error::CaptureError;

/// Names of the input devices on the default host.
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let mut names = Vec::new();
    for device in host.input_devices()? {
        names.push(device.name().unwrap_or_else(|_| "<unnamed>".to_string()));
    }
    Ok(names)
}

/// A cpal input device. The stream only exists between `start` and `stop`.
pub struct Microphone {
    device: cpal::Device,
    config: cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    stream: Option<cpal::Stream>,
    chunk_tx: Sender<Vec<f32>>,
    error_tx: Sender<String>,
    inbox: StreamInbox,
}

/// Receiving side of the input callback: buffered chunks, the level meter
/// fed from them, and any stream errors reported since the last drain.
struct StreamInbox {
    chunk_rx: Receiver<Vec<f32>>,
    error_rx: Receiver<String>,
    pending: Vec<Vec<f32>>,
    meter: ByteSpectrumMeter,
}

impl StreamInbox {
    fn new(chunk_rx: Receiver<Vec<f32>>, error_rx: Receiver<String>) -> Self {
        Self {
            chunk_rx,
            error_rx,
            pending: Vec::new(),
            meter: ByteSpectrumMeter::new(),
        }
    }

    /// Drop leftovers from an earlier session.
    fn reset(&mut self) {
        self.chunk_rx.try_iter().for_each(drop);
        self.error_rx.try_iter().for_each(drop);
        self.pending.clear();
        self.meter = ByteSpectrumMeter::new();
    }

    fn drain_chunks(&mut self) {
        for chunk in self.chunk_rx.try_iter() {
            self.meter.push(&chunk);
            self.pending.push(chunk);
        }
    }

    /// Current byte spectrum. A stream error while listening ends the session.
    fn poll(&mut self) -> Result<Vec<u8>, CaptureError> {
        self.drain_chunks();
        if let Ok(msg) = self.error_rx.try_recv() {
            return Err(CaptureError::Stream(msg));
        }
        Ok(self.meter.byte_frequency_data())
    }

    /// Everything recorded so far. Once the window has closed, stream errors
    /// are only logged so the recording is kept.
    fn finish(&mut self) -> Vec<Vec<f32>> {
        self.drain_chunks();
        for msg in self.error_rx.try_iter() {
            log::warn!("input stream error after recording: {}", msg);
        }
        std::mem::take(&mut self.pending)
    }
}

impl Microphone {
    /// Open the named input device, or the host default when `name` is `None`.
    pub fn open(name: Option<&str>) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = match name {
            Some(wanted) => host
                .input_devices()
                .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?
                .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
                .ok_or_else(|| {
                    CaptureError::DeviceUnavailable(format!("no input device named '{}'", wanted))
                })?,
            None => host
                .default_input_device()
                .ok_or_else(|| CaptureError::DeviceUnavailable("no default input device".into()))?,
        };

        let supported = device
            .default_input_config()
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        log::info!(
            "Input device: {} ({}Hz, {} ch, {:?})",
            device.name().unwrap_or_else(|_| "<unnamed>".to_string()),
            config.sample_rate.0,
            config.channels,
            sample_format
        );

        let (chunk_tx, chunk_rx) = unbounded();
        let (error_tx, error_rx) = unbounded();

        Ok(Self {
            device,
            config,
            sample_format,
            stream: None,
            chunk_tx,
            error_tx,
            inbox: StreamInbox::new(chunk_rx, error_rx),
        })
    }

    fn build_stream(&self) -> Result<cpal::Stream, CaptureError> {
        let channels = self.config.channels as usize;
        let err_tx = self.error_tx.clone();
        let err_fn = move |e: cpal::StreamError| {
            log::error!("audio stream error: {}", e);
            let _ = err_tx.send(e.to_string());
        };

        let tx = self.chunk_tx.clone();
        let stream = match self.sample_format {
            cpal::SampleFormat::F32 => self.device.build_input_stream(
                &self.config,
                move |data: &[f32], _| send_mono(data, channels, &tx),
                err_fn,
                None,
            ),
            cpal::SampleFormat::I16 => self.device.build_input_stream(
                &self.config,
                move |data: &[i16], _| {
                    let tmp: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                    send_mono(&tmp, channels, &tx);
                },
                err_fn,
                None,
            ),
            cpal::SampleFormat::U16 => self.device.build_input_stream(
                &self.config,
                move |data: &[u16], _| {
                    let tmp: Vec<f32> =
                        data.iter().map(|&s| (s as f32 / 65535.0) * 2.0 - 1.0).collect();
                    send_mono(&tmp, channels, &tx);
                },
                err_fn,
                None,
            ),
            other => {
                return Err(CaptureError::DeviceUnavailable(format!(
                    "unsupported sample format {:?}",
                    other
                )))
            }
        };
        stream.map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))
    }
}

impl CaptureDevice for Microphone {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        self.inbox.reset();

        let stream = self.build_stream()?;
        stream
            .play()
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn frequency_data(&mut self) -> Result<Vec<u8>, CaptureError> {
        self.inbox.poll()
    }

    fn take_chunks(&mut self) -> Result<Vec<Vec<f32>>, CaptureError> {
        Ok(self.inbox.finish())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::debug!("pausing input stream failed: {}", e);
            }
            log::debug!("Input stream released");
        }
    }
}

fn send_mono(data: &[f32], channels: usize, tx: &Sender<Vec<f32>>) {
    if channels <= 1 {
        let _ = tx.send(data.to_vec());
        return;
    }
    let mono: Vec<f32> = data
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();
    let _ = tx.send(mono);
}
