use std::time::Duration;

/// Lifecycle of a single recording attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Listening,
    SoundArmed,
    Finalizing,
    Aborted,
    Complete,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Aborted | SessionState::Complete)
    }
}

/// Something that happened to a session, stamped with the time since start.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GateEvent {
    Poll { energy: f32, at: Duration },
    SoundCheckElapsed { at: Duration },
    RecordingElapsed { at: Duration },
}

impl GateEvent {
    fn at(&self) -> Duration {
        match *self {
            GateEvent::Poll { at, .. }
            | GateEvent::SoundCheckElapsed { at }
            | GateEvent::RecordingElapsed { at } => at,
        }
    }
}

/// What the driver has to do after applying an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    /// Sound crossed the threshold; stop polling.
    Armed,
    /// Nothing heard in time; discard and release the device.
    Abort,
    /// Recording window over; collect samples and release the device.
    Finalize,
}

/// Gate state machine. Every mutation goes through [`CaptureSession::apply`],
/// so whichever deadline arrives first wins and later events are no-ops.
#[derive(Debug)]
pub struct CaptureSession {
    state: SessionState,
    threshold: f32,
    elapsed: Duration,
    armed_at: Option<Duration>,
}

impl CaptureSession {
    pub fn new(threshold: f32) -> Self {
        Self {
            state: SessionState::Idle,
            threshold,
            elapsed: Duration::ZERO,
            armed_at: None,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn armed_at(&self) -> Option<Duration> {
        self.armed_at
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Idle -> Listening. Returns false if the session was already begun.
    pub fn begin(&mut self) -> bool {
        if self.state != SessionState::Idle {
            return false;
        }
        self.state = SessionState::Listening;
        true
    }

    pub fn apply(&mut self, event: GateEvent) -> Transition {
        if self.state.is_terminal() || self.state == SessionState::Idle {
            return Transition::Unchanged;
        }
        self.elapsed = self.elapsed.max(event.at());

        match (self.state, event) {
            (SessionState::Listening, GateEvent::Poll { energy, at }) if energy > self.threshold => {
                self.state = SessionState::SoundArmed;
                self.armed_at = Some(at);
                Transition::Armed
            }
            (SessionState::Listening, GateEvent::SoundCheckElapsed { .. })
            | (SessionState::Listening, GateEvent::RecordingElapsed { .. }) => {
                self.state = SessionState::Aborted;
                Transition::Abort
            }
            (SessionState::SoundArmed, GateEvent::RecordingElapsed { .. }) => {
                self.state = SessionState::Finalizing;
                Transition::Finalize
            }
            _ => Transition::Unchanged,
        }
    }

    /// Finalizing -> Complete, once the samples have been handed over.
    pub fn complete(&mut self) {
        if self.state == SessionState::Finalizing {
            self.state = SessionState::Complete;
        }
    }

    /// Force a terminal state after a device failure.
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = SessionState::Aborted;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    /// Replays a poll/deadline timeline and reports when the session armed and
    /// when it reached a terminal transition.
    fn replay(
        readings: &[f32],
        poll_ms: u64,
        check_ms: u64,
        record_ms: u64,
    ) -> (CaptureSession, Option<(Duration, Transition)>) {
        let mut events: Vec<GateEvent> = readings
            .iter()
            .enumerate()
            .map(|(i, &energy)| GateEvent::Poll { energy, at: ms(poll_ms * (i as u64 + 1)) })
            .collect();
        events.push(GateEvent::SoundCheckElapsed { at: ms(check_ms) });
        events.push(GateEvent::RecordingElapsed { at: ms(record_ms) });
        events.sort_by_key(|e| e.at());

        let mut session = CaptureSession::new(20.0);
        assert!(session.begin());
        let mut terminal = None;
        for event in events {
            match session.apply(event) {
                t @ (Transition::Abort | Transition::Finalize) => {
                    assert!(terminal.is_none(), "second terminal transition {:?}", t);
                    terminal = Some((event.at(), t));
                }
                _ => {}
            }
        }
        (session, terminal)
    }

    #[test]
    fn arms_on_fourth_poll_and_finalizes_at_window_from_start() {
        let mut readings = vec![5.0, 5.0, 5.0, 30.0];
        readings.extend(std::iter::repeat(0.0).take(46));
        let (session, terminal) = replay(&readings, 100, 3000, 5000);

        assert_eq!(session.armed_at(), Some(ms(400)));
        assert_eq!(terminal, Some((ms(5000), Transition::Finalize)));
        assert_eq!(session.state(), SessionState::Finalizing);
    }

    #[test]
    fn quiet_input_aborts_at_sound_check() {
        let readings = vec![5.0; 29];
        let (session, terminal) = replay(&readings, 100, 3000, 5000);
        assert_eq!(terminal, Some((ms(3000), Transition::Abort)));
        assert_eq!(session.state(), SessionState::Aborted);
        assert!(session.armed_at().is_none());
    }

    #[test]
    fn threshold_is_strict() {
        let (session, terminal) = replay(&[20.0, 20.0], 100, 300, 500);
        assert!(session.armed_at().is_none());
        assert_eq!(terminal.map(|t| t.1), Some(Transition::Abort));
    }

    #[test]
    fn latch_survives_energy_drop() {
        let mut session = CaptureSession::new(20.0);
        session.begin();
        assert_eq!(session.apply(GateEvent::Poll { energy: 50.0, at: ms(100) }), Transition::Armed);
        assert_eq!(session.apply(GateEvent::Poll { energy: 0.0, at: ms(200) }), Transition::Unchanged);
        assert_eq!(session.apply(GateEvent::SoundCheckElapsed { at: ms(3000) }), Transition::Unchanged);
        assert_eq!(session.state(), SessionState::SoundArmed);
    }

    #[test]
    fn events_after_terminal_state_are_ignored() {
        let mut session = CaptureSession::new(20.0);
        session.begin();
        assert_eq!(session.apply(GateEvent::SoundCheckElapsed { at: ms(3000) }), Transition::Abort);
        assert_eq!(session.apply(GateEvent::Poll { energy: 99.0, at: ms(3100) }), Transition::Unchanged);
        assert_eq!(session.apply(GateEvent::RecordingElapsed { at: ms(5000) }), Transition::Unchanged);
        assert_eq!(session.state(), SessionState::Aborted);
    }

    #[test]
    fn finalizes_exactly_once() {
        let mut session = CaptureSession::new(20.0);
        session.begin();
        session.apply(GateEvent::Poll { energy: 40.0, at: ms(100) });
        assert_eq!(session.apply(GateEvent::RecordingElapsed { at: ms(5000) }), Transition::Finalize);
        assert_eq!(session.apply(GateEvent::RecordingElapsed { at: ms(5001) }), Transition::Unchanged);
        session.complete();
        assert_eq!(session.state(), SessionState::Complete);
        session.fail();
        assert_eq!(session.state(), SessionState::Complete);
    }

    #[test]
    fn recording_deadline_while_listening_aborts() {
        let mut session = CaptureSession::new(20.0);
        session.begin();
        assert_eq!(session.apply(GateEvent::RecordingElapsed { at: ms(5000) }), Transition::Abort);
    }

    #[test]
    fn idle_session_ignores_events_and_begins_once() {
        let mut session = CaptureSession::new(20.0);
        assert_eq!(session.apply(GateEvent::Poll { energy: 99.0, at: ms(1) }), Transition::Unchanged);
        assert!(session.begin());
        assert!(!session.begin());
    }
}
