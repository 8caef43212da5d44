use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "maplocator";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    fn project() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", APP_NAME)
    }

    fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(PathBuf::from(home).join(".local").join("state").join(APP_NAME))
        } else {
            Self::project().map(|p| p.data_local_dir().to_path_buf())
        }
    }

    pub fn config_path() -> PathBuf {
        Self::project()
            .map(|p| p.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("maplocator_config.json"))
    }

    pub fn db_path() -> Option<PathBuf> {
        Self::state_dir().map(|d| d.join("history.db"))
    }

    pub fn results_log_path() -> Option<PathBuf> {
        Self::state_dir().map(|d| d.join("results.csv"))
    }
}
