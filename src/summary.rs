use crate::geodesy::{mean, std_dev};
use crate::scoring::ScoringConfig;
use crate::session::{SessionConfig, SessionState};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestGuess {
    pub target_id: String,
    pub distance_km: f64,
}

/// End-of-session numbers shown on the summary screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub rounds_played: usize,
    pub total_rounds: usize,
    pub guesses: usize,
    pub skipped: usize,
    pub score: u64,
    pub max_score: u64,
    pub mean_distance_km: Option<f64>,
    pub distance_std_dev_km: Option<f64>,
    pub best: Option<BestGuess>,
}

impl SessionSummary {
    pub fn from_state(state: &SessionState, scoring: &ScoringConfig) -> Self {
        let distances: Vec<f64> = state
            .guesses
            .iter()
            .map(|g| g.distance_km)
            .filter(|d| d.is_finite())
            .collect();

        let best = state
            .guesses
            .iter()
            .filter(|g| g.distance_km.is_finite())
            .min_by(|a, b| a.distance_km.total_cmp(&b.distance_km))
            .map(|g| BestGuess {
                target_id: g.target_id.clone(),
                distance_km: g.distance_km,
            });

        let rounds = u64::try_from(state.round).unwrap_or(u64::MAX);

        Self {
            rounds_played: state.round,
            total_rounds: state.total_rounds,
            guesses: state.guesses.len(),
            skipped: state.skipped(),
            score: state.score,
            max_score: u64::from(scoring.max_points()).saturating_mul(rounds),
            mean_distance_km: mean(&distances),
            distance_std_dev_km: std_dev(&distances),
            best,
        }
    }

    /// Share of the attainable score, 0-100.
    pub fn percentage(&self) -> f64 {
        if self.max_score == 0 {
            0.0
        } else {
            (self.score as f64 / self.max_score as f64 * 100.0).round()
        }
    }
}

/// Human readable distance: metres below 1 km, otherwise km with one decimal.
pub fn format_distance(km: f64) -> String {
    if !km.is_finite() {
        "n/a".to_string()
    } else if km < 1.0 {
        format!("{:.0} m", km * 1000.0)
    } else {
        format!("{km:.1} km")
    }
}

/// One line of the results log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub date: String,
    pub region: String,
    pub scope: String,
    pub mode: String,
    pub rounds: usize,
    pub score: u64,
    pub max_score: u64,
    pub mean_distance_km: Option<f64>,
}

impl ResultRecord {
    pub fn new(
        summary: &SessionSummary,
        config: &SessionConfig,
        region: &str,
        date: DateTime<Local>,
    ) -> Self {
        Self {
            date: date.format("%Y-%m-%d %H:%M:%S").to_string(),
            region: region.to_string(),
            scope: config.target_scope.to_string(),
            mode: config.scoring_mode.to_string(),
            rounds: summary.rounds_played,
            score: summary.score,
            max_score: summary.max_score,
            mean_distance_km: summary.mean_distance_km.map(|d| (d * 100.0).round() / 100.0),
        }
    }
}

/// Append-only CSV of finished sessions
#[derive(Debug, Clone)]
pub struct ResultsLog {
    path: PathBuf,
}

impl ResultsLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &ResultRecord) -> Result<(), csv::Error> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // If the log doesn't exist yet, the first row carries the header
        let needs_header = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
    }
}
