use crate::app_dirs::AppDirs;
use crate::geo::TargetScope;
use crate::scoring::{
    DistanceTiers, ScoringMode, DEFAULT_POINTS_PER_CORRECT, DEFAULT_THRESHOLD_KM, DEFAULT_TIERS_KM,
};
use crate::session::{Rounds, SessionConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not write config: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not encode config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persisted player settings. Missing fields fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub target_scope: TargetScope,
    pub scoring_mode: ScoringMode,
    pub rounds: Rounds,
    pub distance_tiers_km: DistanceTiers,
    pub distance_threshold_km: f64,
    pub points_per_correct: u32,
    pub allow_repeat_targets: bool,
    pub show_district_outlines: bool,
    /// Empty selects the default region
    pub state_id: String,
    pub show_all_locations: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_scope: TargetScope::Mixed,
            scoring_mode: ScoringMode::Threshold,
            rounds: Rounds::Auto,
            distance_tiers_km: DEFAULT_TIERS_KM,
            distance_threshold_km: DEFAULT_THRESHOLD_KM,
            points_per_correct: DEFAULT_POINTS_PER_CORRECT,
            allow_repeat_targets: false,
            show_district_outlines: true,
            state_id: String::new(),
            show_all_locations: false,
        }
    }
}

impl From<&Config> for SessionConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            scoring_mode: cfg.scoring_mode,
            rounds: cfg.rounds,
            distance_tiers_km: cfg.distance_tiers_km,
            distance_threshold_km: cfg.distance_threshold_km,
            points_per_correct: cfg.points_per_correct,
            allow_repeat_targets: cfg.allow_repeat_targets,
            target_scope: cfg.target_scope,
            state_id: cfg.state_id.clone(),
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
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
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(e) => {
                log::warn!(
                    "ignoring unreadable config at {}: {e}",
                    self.path.display()
                );
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config {
            target_scope: TargetScope::DistrictHqs,
            scoring_mode: ScoringMode::Hybrid,
            rounds: Rounds::Fixed(12),
            distance_tiers_km: [3.0, 10.0, 25.0],
            distance_threshold_km: 20.0,
            points_per_correct: 7,
            allow_repeat_targets: true,
            show_district_outlines: false,
            state_id: "punjab".into(),
            show_all_locations: true,
        };
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("absent.json"));
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn corrupt_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, b"{ not json").unwrap();
        assert_eq!(FileConfigStore::with_path(&path).load(), Config::default());
    }

    #[test]
    fn partial_file_merges_over_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            br#"{"scoring_mode":"hybrid","rounds":5,"target_scope":"district-hqs"}"#,
        )
        .unwrap();
        let cfg = FileConfigStore::with_path(&path).load();
        assert_eq!(cfg.scoring_mode, ScoringMode::Hybrid);
        assert_eq!(cfg.rounds, Rounds::Fixed(5));
        assert_eq!(cfg.target_scope, TargetScope::DistrictHqs);
        assert_eq!(cfg.points_per_correct, DEFAULT_POINTS_PER_CORRECT);
        assert!(cfg.show_district_outlines);
    }

    #[test]
    fn session_config_from_config() {
        let cfg = Config {
            state_id: "delhi".into(),
            ..Config::default()
        };
        let session = SessionConfig::from(&cfg);
        assert_eq!(session.state_id, "delhi");
        assert_eq!(session.rounds, Rounds::Auto);
        assert_eq!(session.scoring().distance_threshold_km, DEFAULT_THRESHOLD_KM);
    }
}
