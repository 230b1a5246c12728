//! Keystroke timing analysis.
//!
//! [`analyze`] turns one finished session into an [`AnalysisResult`]. It is a
//! pure function of the event sequence and an [`AnalyzerConfig`]: no I/O, no
//! state carried between sessions, and key labels are never looked at.

use crate::keystroke::KeystrokeEvent;
use crate::util::{mean, median, percentile, std_dev};
use chrono::{DateTime, Local};
use itertools::{Itertools, MinMaxResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Tunables for the derived metrics. Defaults match the classic formulas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Characters counted as one word for WPM
    pub chars_per_word: f64,
    /// Percentile of the interval distribution used as the burst threshold
    pub burst_percentile: f64,
    /// Fraction of intervals that must fall below the threshold
    pub burst_ratio: f64,
    /// Fewer valid intervals than this never count as bursty
    pub min_burst_sample: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            chars_per_word: 5.0,
            burst_percentile: 25.0,
            burst_ratio: 0.3,
            min_burst_sample: 5,
        }
    }
}

/// Session-level conditions under which no statistics can be produced
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("no keystrokes were captured")]
    EmptyInput,

    #[error("no valid intervals found in {total_keystrokes} keystrokes")]
    NoValidIntervals {
        total_keystrokes: usize,
        session_duration: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(alias = "timestamp")]
    pub generated_at: DateTime<Local>,
    pub total_keystrokes: usize,
    pub session_duration: f64,

    pub avg_interval: f64,
    pub median_interval: f64,
    pub std_interval: f64,
    pub min_interval: f64,
    pub max_interval: f64,

    pub typing_speed: f64,
    pub keystrokes_per_second: f64,

    pub rhythm_consistency: f64,
    pub burst_typing_detected: bool,
}

/// Descriptive statistics over the valid-interval subset
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl IntervalSummary {
    /// `sorted` must be ascending. Returns `None` for an empty slice.
    pub fn from_sorted(sorted: &[f64]) -> Option<Self> {
        let (min, max) = match sorted.iter().copied().minmax_by(|a, b| a.total_cmp(b)) {
            MinMaxResult::NoElements => return None,
            MinMaxResult::OneElement(only) => (only, only),
            MinMaxResult::MinMax(min, max) => (min, max),
        };

        // identical samples: report the exact value and zero spread
        if min == max {
            return Some(Self {
                count: sorted.len(),
                mean: min,
                median: min,
                std_dev: 0.0,
                min,
                max,
            });
        }

        Some(Self {
            count: sorted.len(),
            mean: mean(sorted)?.clamp(min, max),
            median: median(sorted)?,
            std_dev: std_dev(sorted)?,
            min,
            max,
        })
    }
}

/// Positive, finite intervals in input order. Everything else is malformed or
/// the leading zero, and is skipped.
pub fn valid_intervals(events: &[KeystrokeEvent]) -> Vec<f64> {
    events
        .iter()
        .map(|event| event.interval)
        .filter(|interval| interval.is_finite() && *interval > 0.0)
        .collect()
}

/// Estimated words per minute; every captured key counts as a character.
pub fn words_per_minute(total_keystrokes: usize, session_duration: f64, chars_per_word: f64) -> f64 {
    let minutes = session_duration / 60.0;
    if !(minutes > 0.0) || !(chars_per_word > 0.0) {
        return 0.0;
    }
    let estimated_words = total_keystrokes as f64 / chars_per_word;
    estimated_words / minutes
}

pub fn keystrokes_per_second(total_keystrokes: usize, session_duration: f64) -> f64 {
    if session_duration > 0.0 {
        total_keystrokes as f64 / session_duration
    } else {
        0.0
    }
}

/// `max(0, 1 - cv)` where cv is the coefficient of variation. Needs two samples.
pub fn rhythm_consistency(summary: &IntervalSummary) -> f64 {
    if summary.count < 2 || !(summary.mean > 0.0) {
        return 0.0;
    }
    let cv = summary.std_dev / summary.mean;
    (1.0 - cv).clamp(0.0, 1.0)
}

/// True when more than `burst_ratio` of the intervals sit strictly below the
/// `burst_percentile` threshold. `sorted` must be ascending.
pub fn detect_bursts(sorted: &[f64], config: &AnalyzerConfig) -> bool {
    if sorted.len() < config.min_burst_sample.max(1) {
        return false;
    }
    let Some(threshold) = percentile(sorted, config.burst_percentile) else {
        return false;
    };
    let burst_count = sorted.iter().filter(|&&interval| interval < threshold).count();
    burst_count as f64 > sorted.len() as f64 * config.burst_ratio
}

/// Analyze one complete session.
pub fn analyze(
    events: &[KeystrokeEvent],
    config: &AnalyzerConfig,
) -> Result<AnalysisResult, AnalysisError> {
    let last = events.last().ok_or(AnalysisError::EmptyInput)?;
    let total_keystrokes = events.len();
    let session_duration = last.elapsed_time;

    let sorted = valid_intervals(events)
        .into_iter()
        .sorted_by(|a, b| a.total_cmp(b))
        .collect::<Vec<f64>>();

    let summary =
        IntervalSummary::from_sorted(&sorted).ok_or(AnalysisError::NoValidIntervals {
            total_keystrokes,
            session_duration,
        })?;

    debug!(
        total_keystrokes,
        valid_intervals = summary.count,
        skipped = total_keystrokes - summary.count,
        "analyzing session"
    );

    Ok(AnalysisResult {
        generated_at: Local::now(),
        total_keystrokes,
        session_duration,
        avg_interval: summary.mean,
        median_interval: summary.median,
        std_interval: summary.std_dev,
        min_interval: summary.min,
        max_interval: summary.max,
        typing_speed: words_per_minute(total_keystrokes, session_duration, config.chars_per_word),
        keystrokes_per_second: keystrokes_per_second(total_keystrokes, session_duration),
        rhythm_consistency: rhythm_consistency(&summary),
        burst_typing_detected: detect_bursts(&sorted, config),
    })
}
