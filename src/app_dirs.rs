use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// `$HOME/.local/state/ivory`, or the platform data dir without a HOME
    pub fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(PathBuf::from(home).join(".local").join("state").join("ivory"))
        } else {
            ProjectDirs::from("", "", "ivory").map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
        }
    }

    pub fn profiles_db_path() -> Option<PathBuf> {
        Self::state_dir().map(|d| d.join("profiles.db"))
    }

    pub fn results_log_path() -> Option<PathBuf> {
        Self::state_dir().map(|d| d.join("results.csv"))
    }

    pub fn log_path() -> Option<PathBuf> {
        Self::state_dir().map(|d| d.join("ivory.log"))
    }
}
