use crossterm::event::KeyCode;
use serde::{Deserialize, Serialize};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Label stored for every key when actual keys are not logged
pub const ANONYMIZED_KEY: &str = "KEY";

/// One captured key press
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeystrokeEvent {
    /// Wall-clock time of the press, seconds since the unix epoch
    pub timestamp: f64,
    /// Opaque key label; never inspected by the analyzer
    #[serde(rename = "key")]
    pub key_label: String,
    #[serde(default)]
    pub readable_key: String,
    /// Seconds since the previous press (0 for the first)
    pub interval: f64,
    /// Seconds since the first press
    pub elapsed_time: f64,
}

impl KeystrokeEvent {
    /// Build a well-formed sequence from raw intervals. The first entry is forced to 0.
    pub fn sequence_from_intervals(intervals: &[f64]) -> Vec<KeystrokeEvent> {
        let mut elapsed = 0.0;
        intervals
            .iter()
            .enumerate()
            .map(|(i, &raw)| {
                let interval = if i == 0 { 0.0 } else { raw };
                elapsed += interval;
                KeystrokeEvent {
                    timestamp: elapsed,
                    key_label: ANONYMIZED_KEY.to_string(),
                    readable_key: String::new(),
                    interval,
                    elapsed_time: elapsed,
                }
            })
            .collect()
    }
}

/// A key press as seen by the recorder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PressedKey {
    Char(char),
    Named(String),
}

impl PressedKey {
    pub fn is_escape(&self) -> bool {
        matches!(self, PressedKey::Named(name) if name == "esc")
    }

    fn label(&self) -> String {
        match self {
            PressedKey::Char(c) => c.to_string(),
            PressedKey::Named(name) => format!("[{name}]"),
        }
    }
}

impl From<KeyCode> for PressedKey {
    fn from(code: KeyCode) -> Self {
        let name = match code {
            KeyCode::Char(' ') => "space".to_string(),
            KeyCode::Char(c) => return PressedKey::Char(c),
            KeyCode::Enter => "enter".to_string(),
            KeyCode::Tab => "tab".to_string(),
            KeyCode::BackTab => "backtab".to_string(),
            KeyCode::Backspace => "backspace".to_string(),
            KeyCode::Delete => "delete".to_string(),
            KeyCode::Insert => "insert".to_string(),
            KeyCode::Esc => "esc".to_string(),
            KeyCode::Left => "left".to_string(),
            KeyCode::Right => "right".to_string(),
            KeyCode::Up => "up".to_string(),
            KeyCode::Down => "down".to_string(),
            KeyCode::Home => "home".to_string(),
            KeyCode::End => "end".to_string(),
            KeyCode::PageUp => "page_up".to_string(),
            KeyCode::PageDown => "page_down".to_string(),
            KeyCode::CapsLock => "caps_lock".to_string(),
            KeyCode::F(n) => format!("f{n}"),
            _ => "unknown".to_string(),
        };
        PressedKey::Named(name)
    }
}

/// Turns key presses into a timed `KeystrokeEvent` sequence for one session.
///
/// Timing comes from the monotonic `Instant`s handed to [`record`](Self::record);
/// the wall clock is read once, at the first press, to anchor `timestamp`.
#[derive(Debug)]
pub struct KeystrokeRecorder {
    log_actual_keys: bool,
    first_press: Option<(Instant, f64)>,
    last_press: Option<Instant>,
    events: Vec<KeystrokeEvent>,
    typed_fragments: Vec<String>,
}

impl KeystrokeRecorder {
    pub fn new(log_actual_keys: bool) -> Self {
        Self {
            log_actual_keys,
            first_press: None,
            last_press: None,
            events: Vec::new(),
            typed_fragments: Vec::new(),
        }
    }

    pub fn record(&mut self, key: &PressedKey, at: Instant) -> &KeystrokeEvent {
        let (start, start_epoch) = *self.first_press.get_or_insert_with(|| (at, epoch_secs()));

        let interval = self
            .last_press
            .map(|last| at.saturating_duration_since(last).as_secs_f64())
            .unwrap_or(0.0);
        let elapsed_time = at.saturating_duration_since(start).as_secs_f64();

        let (key_label, readable_key) = if self.log_actual_keys {
            self.track_typed_text(key);
            let label = key.label();
            (label.clone(), label)
        } else {
            (ANONYMIZED_KEY.to_string(), String::new())
        };

        self.last_press = Some(at);
        self.events.push(KeystrokeEvent {
            timestamp: start_epoch + elapsed_time,
            key_label,
            readable_key,
            interval,
            elapsed_time,
        });
        &self.events[self.events.len() - 1]
    }

    fn track_typed_text(&mut self, key: &PressedKey) {
        match key {
            PressedKey::Char(c) => self.typed_fragments.push(c.to_string()),
            PressedKey::Named(name) => match name.as_str() {
                "space" => self.typed_fragments.push(" ".to_string()),
                "enter" => self.typed_fragments.push("\n".to_string()),
                "tab" => self.typed_fragments.push("\t".to_string()),
                "backspace" => {
                    self.typed_fragments.pop();
                }
                _ => self.typed_fragments.push(key.label()),
            },
        }
    }

    pub fn events(&self) -> &[KeystrokeEvent] {
        &self.events
    }

    pub fn keystroke_count(&self) -> usize {
        self.events.len()
    }

    /// Reconstructed text; empty unless actual keys are logged
    pub fn typed_text(&self) -> String {
        self.typed_fragments.concat()
    }

    pub fn into_parts(self) -> (Vec<KeystrokeEvent>, String) {
        let text = self.typed_text();
        (self.events, text)
    }
}

fn epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn press_all(recorder: &mut KeystrokeRecorder, keys: &[PressedKey], step_ms: u64) {
        let base = Instant::now();
        for (i, key) in keys.iter().enumerate() {
            recorder.record(key, base + Duration::from_millis(step_ms * i as u64));
        }
    }

    #[test]
    fn test_first_event_has_zero_interval() {
        let mut recorder = KeystrokeRecorder::new(false);
        let event = recorder.record(&PressedKey::Char('a'), Instant::now());

        assert_eq!(event.interval, 0.0);
        assert_eq!(event.elapsed_time, 0.0);
        assert!(event.timestamp > 0.0);
    }

    #[test]
    fn test_intervals_and_elapsed_time() {
        let mut recorder = KeystrokeRecorder::new(false);
        let keys = vec![PressedKey::Char('a'); 4];
        press_all(&mut recorder, &keys, 250);

        let events = recorder.events();
        assert_eq!(events.len(), 4);
        for (i, event) in events.iter().enumerate().skip(1) {
            assert!((event.interval - 0.25).abs() < 1e-9);
            assert!((event.elapsed_time - 0.25 * i as f64).abs() < 1e-9);
        }
        assert!((events[3].timestamp - events[0].timestamp - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_anonymized_labels() {
        let mut recorder = KeystrokeRecorder::new(false);
        press_all(&mut recorder, &[PressedKey::Char('x')], 10);

        let event = &recorder.events()[0];
        assert_eq!(event.key_label, ANONYMIZED_KEY);
        assert_eq!(event.readable_key, "");
        assert_eq!(recorder.typed_text(), "");
    }

    #[test]
    fn test_actual_keys_and_named_labels() {
        let mut recorder = KeystrokeRecorder::new(true);
        press_all(
            &mut recorder,
            &[PressedKey::Char('h'), PressedKey::from(KeyCode::Char(' '))],
            10,
        );

        assert_eq!(recorder.events()[0].key_label, "h");
        assert_eq!(recorder.events()[1].key_label, "[space]");
        assert_eq!(recorder.events()[1].readable_key, "[space]");
    }

    #[test]
    fn test_typed_text_reconstruction() {
        let mut recorder = KeystrokeRecorder::new(true);
        let keys = [
            PressedKey::Char('h'),
            PressedKey::Char('i'),
            PressedKey::Char('x'),
            PressedKey::from(KeyCode::Backspace),
            PressedKey::from(KeyCode::Char(' ')),
            PressedKey::Char('y'),
            PressedKey::from(KeyCode::Enter),
            PressedKey::from(KeyCode::Tab),
            PressedKey::from(KeyCode::Left),
        ];
        press_all(&mut recorder, &keys, 5);

        assert_eq!(recorder.typed_text(), "hi y\n\t[left]");
        assert_eq!(recorder.keystroke_count(), keys.len());
    }

    #[test]
    fn test_backspace_on_empty_text() {
        let mut recorder = KeystrokeRecorder::new(true);
        press_all(&mut recorder, &[PressedKey::from(KeyCode::Backspace)], 5);

        assert_eq!(recorder.typed_text(), "");
        assert_eq!(recorder.keystroke_count(), 1);
    }

    #[test]
    fn test_escape_detection() {
        assert!(PressedKey::from(KeyCode::Esc).is_escape());
        assert!(!PressedKey::Char('e').is_escape());
        assert_eq!(PressedKey::from(KeyCode::F(5)), PressedKey::Named("f5".into()));
    }

    #[test]
    fn test_sequence_from_intervals() {
        let events = KeystrokeEvent::sequence_from_intervals(&[3.0, 1.0, 0.5]);

        assert_eq!(events[0].interval, 0.0);
        assert_eq!(events[2].elapsed_time, 1.5);
        assert_eq!(events[1].interval, events[1].elapsed_time - events[0].elapsed_time);
    }

    #[test]
    fn test_event_json_field_names() {
        let events = KeystrokeEvent::sequence_from_intervals(&[0.0]);
        let json = serde_json::to_value(&events[0]).unwrap();

        assert_eq!(json["key"], "KEY");
        assert_eq!(json["readable_key"], "");
        assert!(json.get("key_label").is_none());
    }
}
