use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::analysis::AnalyzerConfig;
use crate::app_dirs::AppDirs;
use crate::error::KeydynError;

/// Longest session the capture loop will accept
pub const MAX_SESSION_MINUTES: f64 = 24.0 * 60.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub session: SessionSettings,
    pub privacy: PrivacySettings,
    pub output: OutputSettings,
    pub notifications: NotificationSettings,
    pub analysis: AnalyzerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionSettings {
    pub duration_minutes: f64,
    pub min_keystrokes: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            duration_minutes: 5.0,
            min_keystrokes: 10,
        }
    }
}

impl SessionSettings {
    /// Capture time limit; out-of-range values fall back to the bounds.
    pub fn duration(&self) -> Duration {
        let minutes = if self.duration_minutes.is_finite() {
            self.duration_minutes.clamp(0.0, MAX_SESSION_MINUTES)
        } else {
            Self::default().duration_minutes
        };
        Duration::from_secs_f64(minutes * 60.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PrivacySettings {
    /// Record which key was pressed instead of an anonymous marker
    pub log_actual_keys: bool,
    /// Keep the reconstructed text in reports
    pub save_typed_text: bool,
    /// Leave raw keystroke data out of the JSON report
    pub anonymize_data: bool,
}

impl Default for PrivacySettings {
    fn default() -> Self {
        Self {
            log_actual_keys: false,
            save_typed_text: false,
            anonymize_data: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputSettings {
    pub json_path: PathBuf,
    pub html_path: PathBuf,
    /// Session history CSV; platform state dir when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_path: Option<PathBuf>,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            json_path: PathBuf::from("reports").join("keystroke_report.json"),
            html_path: PathBuf::from("reports").join("keystroke_report.html"),
            history_path: None,
        }
    }
}

impl OutputSettings {
    pub fn history_path(&self) -> PathBuf {
        self.history_path
            .clone()
            .unwrap_or_else(AppDirs::history_path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub telegram: TelegramSettings,
    pub discord: DiscordSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DiscordSettings {
    pub webhook_url: String,
}

pub trait ConfigStore {
    fn load(&self) -> Result<Config, KeydynError>;
    fn save(&self, cfg: &Config) -> Result<(), KeydynError>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    /// `./config.json` when present, otherwise the platform config dir
    pub fn new() -> Self {
        let local = PathBuf::from("config.json");
        let path = if local.exists() {
            local
        } else {
            AppDirs::config_path()
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    /// A missing file yields the defaults; an unreadable or invalid one is an error.
    fn load(&self) -> Result<Config, KeydynError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(e) => return Err(KeydynError::io("reading config", e)),
        };
        serde_json::from_slice::<Config>(&bytes).map_err(|source| KeydynError::Config {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, cfg: &Config) -> Result<(), KeydynError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| KeydynError::io("creating config dir", e))?;
        }
        let data =
            serde_json::to_vec_pretty(cfg).map_err(|e| KeydynError::json("encoding config", e))?;
        fs::write(&self.path, data).map_err(|e| KeydynError::io("writing config", e))
    }
}
