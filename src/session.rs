use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEventKind, KeyModifiers};
use tracing::debug;

use crate::keystroke::{KeystrokeEvent, KeystrokeRecorder, PressedKey};
use crate::runtime::{CaptureEvent, KeyEventSource, Runner, Ticker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// ESC pressed
    Stopped,
    /// Configured duration elapsed
    TimedOut,
    /// Ctrl+C; nothing should be reported
    Cancelled,
}

/// Snapshot handed to the renderer on every frame
#[derive(Debug, Clone)]
pub struct SessionProgress {
    pub keystrokes: usize,
    pub elapsed: Duration,
    pub limit: Duration,
    pub last_key: Option<String>,
    pub log_actual_keys: bool,
}

impl SessionProgress {
    pub fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.elapsed)
    }

    /// Fraction of the time budget used, in `[0, 1]`
    pub fn ratio(&self) -> f64 {
        if self.limit.is_zero() {
            return 1.0;
        }
        (self.elapsed.as_secs_f64() / self.limit.as_secs_f64()).clamp(0.0, 1.0)
    }
}

#[derive(Debug)]
pub struct CaptureOutcome {
    pub events: Vec<KeystrokeEvent>,
    pub typed_text: String,
    pub end: SessionEnd,
}

/// One bounded capture: feeds key presses into a recorder until ESC, Ctrl+C,
/// or the time limit.
pub struct CaptureSession<E: KeyEventSource, T: Ticker> {
    runner: Runner<E, T>,
    recorder: KeystrokeRecorder,
    limit: Duration,
    log_actual_keys: bool,
}

impl<E: KeyEventSource, T: Ticker> CaptureSession<E, T> {
    pub fn new(runner: Runner<E, T>, limit: Duration, log_actual_keys: bool) -> Self {
        Self {
            runner,
            recorder: KeystrokeRecorder::new(log_actual_keys),
            limit,
            log_actual_keys,
        }
    }

    fn progress(&self, started: Instant) -> SessionProgress {
        SessionProgress {
            keystrokes: self.recorder.keystroke_count(),
            elapsed: started.elapsed(),
            limit: self.limit,
            last_key: self
                .recorder
                .events()
                .last()
                .filter(|_| self.log_actual_keys)
                .map(|event| event.readable_key.clone()),
            log_actual_keys: self.log_actual_keys,
        }
    }

    /// Run to completion. `on_frame` is called before every wait so the caller
    /// can redraw; its error aborts the session.
    pub fn run<F, DrawErr>(mut self, mut on_frame: F) -> Result<CaptureOutcome, DrawErr>
    where
        F: FnMut(&SessionProgress) -> Result<(), DrawErr>,
    {
        let started = Instant::now();
        let deadline = started + self.limit;

        let end = loop {
            on_frame(&self.progress(started))?;

            if Instant::now() >= deadline {
                break SessionEnd::TimedOut;
            }

            let (key, pressed_at) = match self.runner.step_until(deadline) {
                CaptureEvent::Key(key, at) if key.kind == KeyEventKind::Press => (key, at),
                _ => continue,
            };

            if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
                break SessionEnd::Cancelled;
            }

            let pressed = PressedKey::from(key.code);
            self.recorder.record(&pressed, pressed_at);
            if pressed.is_escape() {
                break SessionEnd::Stopped;
            }
        };

        debug!(keystrokes = self.recorder.keystroke_count(), ?end, "capture finished");
        on_frame(&self.progress(started))?;

        let (events, typed_text) = self.recorder.into_parts();
        Ok(CaptureOutcome {
            events,
            typed_text,
            end,
        })
    }
}
