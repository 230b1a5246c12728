use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use crate::analysis::AnalysisResult;
use crate::error::KeydynError;

/// One row of the session log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub date: DateTime<Local>,
    pub total_keystrokes: usize,
    pub session_duration: f64,
    pub typing_speed: f64,
    pub avg_interval: f64,
    pub rhythm_consistency: f64,
    pub burst_typing_detected: bool,
}

impl From<&AnalysisResult> for SessionRecord {
    fn from(result: &AnalysisResult) -> Self {
        Self {
            date: result.generated_at,
            total_keystrokes: result.total_keystrokes,
            session_duration: result.session_duration,
            typing_speed: result.typing_speed,
            avg_interval: result.avg_interval,
            rhythm_consistency: result.rhythm_consistency,
            burst_typing_detected: result.burst_typing_detected,
        }
    }
}

/// Append-only CSV of past sessions
#[derive(Debug, Clone)]
pub struct SessionHistory {
    path: PathBuf,
}

impl SessionHistory {
    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, result: &AnalysisResult) -> Result<(), KeydynError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| KeydynError::io("creating history dir", e))?;
        }

        // header only for a fresh file
        let needs_header = fs::metadata(&self.path)
            .map(|meta| meta.len() == 0)
            .unwrap_or(true);

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| KeydynError::io("opening history", e))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer
            .serialize(SessionRecord::from(result))
            .map_err(|e| KeydynError::csv("writing history", e))?;
        writer
            .flush()
            .map_err(|e| KeydynError::io("flushing history", e))
    }

    /// All recorded sessions, oldest first. A missing file is an empty history.
    pub fn load(&self) -> Result<Vec<SessionRecord>, KeydynError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader =
            csv::Reader::from_path(&self.path).map_err(|e| KeydynError::csv("opening history", e))?;
        reader
            .deserialize()
            .collect::<Result<Vec<SessionRecord>, _>>()
            .map_err(|e| KeydynError::csv("reading history", e))
    }

    pub fn recent(&self, limit: usize) -> Result<Vec<SessionRecord>, KeydynError> {
        let mut records = self.load()?;
        let skip = records.len().saturating_sub(limit);
        Ok(records.split_off(skip))
    }
}
