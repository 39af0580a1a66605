use crossbeam_channel::{after, never, select, tick};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use super::session::{CaptureSession, GateEvent, Transition};
use super::{CaptureDevice, GateConfig};
use crate::audio::features::AudioSample;
use crate::audio::meter::mean_level;
use crate::error::CaptureError;

/// Result of a capture attempt that did not fail.
#[derive(Debug)]
pub enum CaptureOutcome {
    Captured(AudioSample),
    /// The sound check deadline passed without the input getting loud enough.
    NoSound,
}

/// Holds at most one active session.
#[derive(Debug, Default)]
struct CaptureSlot {
    active: AtomicBool,
}

impl CaptureSlot {
    fn claim(&self) -> Result<SlotClaim<'_>, CaptureError> {
        self.active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| SlotClaim { slot: self })
            .map_err(|_| CaptureError::Busy)
    }
}

struct SlotClaim<'a> {
    slot: &'a CaptureSlot,
}

impl Drop for SlotClaim<'_> {
    fn drop(&mut self) {
        self.slot.active.store(false, Ordering::SeqCst);
    }
}

/// Stops the device however the session ends.
struct StopOnDrop<'a, D: CaptureDevice + ?Sized> {
    device: &'a mut D,
}

impl<D: CaptureDevice + ?Sized> Drop for StopOnDrop<'_, D> {
    fn drop(&mut self) {
        self.device.stop();
    }
}

pub struct CaptureGate {
    config: GateConfig,
    slot: CaptureSlot,
}

impl CaptureGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            slot: CaptureSlot::default(),
        }
    }

    #[cfg(test)]
    pub fn is_busy(&self) -> bool {
        self.slot.active.load(Ordering::SeqCst)
    }

    /// Run one capture attempt on `device`.
    ///
    /// Fails with [`CaptureError::Busy`] while another attempt is running on
    /// this gate. The device is stopped before this returns, on every path.
    pub fn begin<D: CaptureDevice + ?Sized>(&self, device: &mut D) -> Result<CaptureOutcome, CaptureError> {
        let _claim = self.slot.claim()?;

        let mut session = CaptureSession::new(self.config.energy_threshold);
        session.begin();

        let mut guard = StopOnDrop { device };
        if let Err(e) = guard.device.start() {
            session.fail();
            return Err(e);
        }

        let started = Instant::now();
        let mut poll = tick(self.config.poll_interval);
        let sound_check = after(self.config.sound_check);
        let recording = after(self.config.recording_window);

        log::info!(
            "Listening (sound check {} ms, window {} ms, threshold {:.1})",
            self.config.sound_check.as_millis(),
            self.config.recording_window.as_millis(),
            self.config.energy_threshold
        );

        loop {
            let transition = select! {
                recv(poll) -> _ => {
                    let level = match guard.device.frequency_data() {
                        Ok(data) => mean_level(&data),
                        Err(e) => {
                            session.fail();
                            return Err(e);
                        }
                    };
                    log::debug!("Energy {:.1} at {} ms", level, started.elapsed().as_millis());
                    session.apply(GateEvent::Poll { energy: level, at: started.elapsed() })
                }
                recv(sound_check) -> _ => {
                    session.apply(GateEvent::SoundCheckElapsed { at: started.elapsed() })
                }
                recv(recording) -> _ => {
                    session.apply(GateEvent::RecordingElapsed { at: started.elapsed() })
                }
            };

            match transition {
                Transition::Unchanged => {}
                Transition::Armed => {
                    poll = never();
                    log::info!(
                        "Sound detected after {} ms, recording until {} ms",
                        started.elapsed().as_millis(),
                        self.config.recording_window.as_millis()
                    );
                }
                Transition::Abort => {
                    log::info!("No sound detected within {} ms", self.config.sound_check.as_millis());
                    return Ok(CaptureOutcome::NoSound);
                }
                Transition::Finalize => {
                    guard.device.stop();
                    let chunks = match guard.device.take_chunks() {
                        Ok(chunks) => chunks,
                        Err(e) => {
                            session.fail();
                            return Err(e);
                        }
                    };
                    let sample = AudioSample::from_chunks(chunks, guard.device.sample_rate());
                    session.complete();
                    log::info!(
                        "Captured {} samples ({:.2}s at {}Hz), sound from {} ms, closed at {} ms",
                        sample.len(),
                        sample.duration_secs(),
                        sample.sample_rate(),
                        session.armed_at().unwrap_or_default().as_millis(),
                        session.elapsed().as_millis()
                    );
                    return Ok(CaptureOutcome::Captured(sample));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    struct FakeDevice {
        /// Byte level reported by each successive poll; the last one repeats.
        levels: Vec<u8>,
        polls: usize,
        starts: usize,
        stops: usize,
        running: bool,
        chunks: Vec<Vec<f32>>,
        fail_start: bool,
        fail_poll_at: Option<usize>,
    }

    impl FakeDevice {
        fn new(levels: Vec<u8>) -> Self {
            Self {
                levels,
                polls: 0,
                starts: 0,
                stops: 0,
                running: false,
                chunks: Vec::new(),
                fail_start: false,
                fail_poll_at: None,
            }
        }
    }

    impl CaptureDevice for FakeDevice {
        fn sample_rate(&self) -> u32 {
            1000
        }

        fn start(&mut self) -> Result<(), CaptureError> {
            self.starts += 1;
            if self.fail_start {
                return Err(CaptureError::DeviceUnavailable("permission denied".into()));
            }
            self.running = true;
            self.chunks.clear();
            Ok(())
        }

        fn frequency_data(&mut self) -> Result<Vec<u8>, CaptureError> {
            if self.fail_poll_at == Some(self.polls) {
                return Err(CaptureError::Stream("device unplugged".into()));
            }
            let level = self
                .levels
                .get(self.polls)
                .or(self.levels.last())
                .copied()
                .unwrap_or(0);
            self.polls += 1;
            self.chunks.push(vec![0.25; 5]);
            Ok(vec![level; 16])
        }

        fn take_chunks(&mut self) -> Result<Vec<Vec<f32>>, CaptureError> {
            Ok(std::mem::take(&mut self.chunks))
        }

        fn stop(&mut self) {
            if self.running {
                self.stops += 1;
                self.running = false;
            }
        }
    }

    fn fast_config() -> GateConfig {
        GateConfig {
            sound_check: Duration::from_millis(40),
            recording_window: Duration::from_millis(80),
            energy_threshold: 20.0,
            poll_interval: Duration::from_millis(5),
        }
    }

    #[test]
    fn quiet_input_returns_no_sound_and_releases_device() {
        let gate = CaptureGate::new(fast_config());
        let mut device = FakeDevice::new(vec![3]);
        let outcome = gate.begin(&mut device).unwrap();
        assert!(matches!(outcome, CaptureOutcome::NoSound));
        assert_eq!(device.stops, 1);
        assert!(!device.running);
        assert!(!gate.is_busy());
    }

    #[test]
    fn loud_input_records_until_window_from_start() {
        let gate = CaptureGate::new(fast_config());
        let mut device = FakeDevice::new(vec![5, 5, 30, 0]);
        let started = Instant::now();
        let outcome = gate.begin(&mut device).unwrap();
        let elapsed = started.elapsed();

        match outcome {
            CaptureOutcome::Captured(sample) => {
                assert_eq!(sample.sample_rate(), 1000);
                assert!(!sample.is_empty());
            }
            CaptureOutcome::NoSound => panic!("expected a capture"),
        }
        assert!(elapsed >= Duration::from_millis(80), "finished after {:?}", elapsed);
        // Polling stops once armed
        assert_eq!(device.polls, 3);
        assert_eq!(device.stops, 1);
    }

    #[test]
    fn failed_start_is_reported_and_device_stopped() {
        let gate = CaptureGate::new(fast_config());
        let mut device = FakeDevice::new(vec![50]);
        device.fail_start = true;
        let err = gate.begin(&mut device).unwrap_err();
        assert!(matches!(err, CaptureError::DeviceUnavailable(_)));
        assert_eq!(device.polls, 0);
        assert!(!gate.is_busy());
    }

    #[test]
    fn stream_error_mid_session_releases_device() {
        let gate = CaptureGate::new(fast_config());
        let mut device = FakeDevice::new(vec![0]);
        device.fail_poll_at = Some(2);
        let err = gate.begin(&mut device).unwrap_err();
        assert!(matches!(err, CaptureError::Stream(_)));
        assert_eq!(device.stops, 1);
        assert!(!gate.is_busy());
    }

    #[test]
    fn begin_is_rejected_while_slot_is_held() {
        let gate = CaptureGate::new(fast_config());
        let _claim = gate.slot.claim().unwrap();
        let mut device = FakeDevice::new(vec![50]);
        assert!(matches!(gate.begin(&mut device), Err(CaptureError::Busy)));
        assert_eq!(device.starts, 0);
    }

    #[test]
    fn concurrent_begin_does_not_overlap() {
        let gate = Arc::new(CaptureGate::new(GateConfig {
            sound_check: Duration::from_millis(100),
            recording_window: Duration::from_millis(200),
            ..fast_config()
        }));

        let first = {
            let gate = Arc::clone(&gate);
            std::thread::spawn(move || {
                let mut device = FakeDevice::new(vec![60]);
                gate.begin(&mut device).map(|o| matches!(o, CaptureOutcome::Captured(_)))
            })
        };

        std::thread::sleep(Duration::from_millis(30));
        assert!(gate.is_busy());
        let mut second = FakeDevice::new(vec![60]);
        assert!(matches!(gate.begin(&mut second), Err(CaptureError::Busy)));
        assert_eq!(second.starts, 0);

        assert!(first.join().unwrap().unwrap());
        assert!(!gate.is_busy());
    }

    #[test]
    fn gate_is_reusable_after_each_outcome() {
        let gate = CaptureGate::new(fast_config());
        let mut quiet = FakeDevice::new(vec![0]);
        assert!(matches!(gate.begin(&mut quiet), Ok(CaptureOutcome::NoSound)));
        let mut loud = FakeDevice::new(vec![90]);
        assert!(matches!(gate.begin(&mut loud), Ok(CaptureOutcome::Captured(_))));
    }
}
