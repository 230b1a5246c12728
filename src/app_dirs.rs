use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "keydyn";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    pub fn config_path() -> PathBuf {
        ProjectDirs::from("", "", APP_NAME)
            .map(|proj_dirs| proj_dirs.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("keydyn_config.json"))
    }

    pub fn history_path() -> PathBuf {
        if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".local")
                .join("state")
                .join(APP_NAME)
                .join("sessions.csv")
        } else {
            ProjectDirs::from("", "", APP_NAME)
                .map(|proj_dirs| proj_dirs.data_local_dir().join("sessions.csv"))
                .unwrap_or_else(|| PathBuf::from("keydyn_sessions.csv"))
        }
    }
}
