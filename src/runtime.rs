use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent};

/// What the capture loop reacts to
#[derive(Clone, Debug)]
pub enum CaptureEvent {
    /// Key event and the moment it was read from the terminal
    Key(KeyEvent, Instant),
    Resize,
    Tick,
}

/// Source of terminal events
pub trait KeyEventSource: Send + 'static {
    /// Wait up to `timeout` for the next event; `Err(Timeout)` if none arrives.
    fn recv_timeout(&self, timeout: Duration) -> Result<CaptureEvent, RecvTimeoutError>;
}

/// Reads crossterm events on a background thread and forwards them over a channel
pub struct CrosstermEventSource {
    rx: Receiver<CaptureEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let forwarded = match event::read() {
                Ok(CtEvent::Key(key)) => CaptureEvent::Key(key, Instant::now()),
                Ok(CtEvent::Resize(_, _)) => CaptureEvent::Resize,
                Ok(_) => continue,
                Err(_) => break,
            };
            if tx.send(forwarded).is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<CaptureEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Redraw cadence for the capture screen
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Channel-fed source for headless tests and replays
pub struct TestEventSource {
    rx: Receiver<CaptureEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<CaptureEvent>) -> Self {
        Self { rx }
    }
}

impl KeyEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<CaptureEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Pulls one event at a time, turning timeouts into ticks
pub struct Runner<E: KeyEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: KeyEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Blocks up to one tick interval, never past `deadline`
    pub fn step_until(&self, deadline: Instant) -> CaptureEvent {
        let remaining = deadline.saturating_duration_since(Instant::now());
        self.wait(self.ticker.interval().min(remaining))
    }

    fn wait(&self, timeout: Duration) -> CaptureEvent {
        match self.event_source.recv_timeout(timeout) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                CaptureEvent::Tick
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyModifiers};

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    #[test]
    fn step_until_returns_tick_on_timeout() {
        let (_tx, rx) = mpsc::channel();
        let runner = Runner::new(
            TestEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(1)),
        );

        assert!(matches!(runner.step_until(far_deadline()), CaptureEvent::Tick));
    }

    #[test]
    fn step_until_passes_through_keys() {
        let (tx, rx) = mpsc::channel();
        let pressed_at = Instant::now();
        tx.send(CaptureEvent::Key(
            KeyEvent::new(KeyCode::Char('k'), KeyModifiers::NONE),
            pressed_at,
        ))
        .unwrap();
        let runner = Runner::new(
            TestEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(10)),
        );

        match runner.step_until(far_deadline()) {
            CaptureEvent::Key(key, at) => {
                assert_eq!(key.code, KeyCode::Char('k'));
                assert_eq!(at, pressed_at);
            }
            other => panic!("expected key event, got {other:?}"),
        }
    }

    #[test]
    fn step_until_past_deadline_does_not_block() {
        let (_tx, rx) = mpsc::channel();
        let runner = Runner::new(
            TestEventSource::new(rx),
            FixedTicker::new(Duration::from_secs(5)),
        );

        let started = Instant::now();
        assert!(matches!(runner.step_until(started), CaptureEvent::Tick));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn disconnected_source_ticks() {
        let (tx, rx) = mpsc::channel::<CaptureEvent>();
        drop(tx);
        let runner = Runner::new(
            TestEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(1)),
        );

        assert!(matches!(runner.step_until(far_deadline()), CaptureEvent::Tick));
    }
}
