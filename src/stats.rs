use crate::app_dirs::AppDirs;
use crate::session::Guess;
use chrono::{DateTime, Local};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("history database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("could not create {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, StatsError>;

/// Sink for guesses accepted during a session.
pub trait GuessRecorder {
    fn record_guess(&mut self, region: &str, guess: &Guess) -> Result<()>;
}

/// Aggregated history for a single target.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSummary {
    pub target_id: String,
    pub attempts: i64,
    /// `None` when no attempt had a usable distance
    pub avg_distance_km: Option<f64>,
    pub hits: i64,
    pub last_seen: Option<DateTime<Local>>,
}

impl TargetSummary {
    pub fn hit_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            (self.hits as f64 / self.attempts as f64) * 100.0
        }
    }
}

/// Database of every guess ever scored
#[derive(Debug)]
pub struct HistoryDb {
    conn: Connection,
}

impl HistoryDb {
    /// Open the database at the default location, creating it if needed
    pub fn new() -> Result<Self> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("maplocator_history.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StatsError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS guesses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                region TEXT NOT NULL,
                target_id TEXT NOT NULL,
                distance_km REAL,
                district_correct BOOLEAN NOT NULL,
                points INTEGER NOT NULL,
                timestamp TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_guesses_region_target ON guesses(region, target_id)",
            [],
        )?;

        Ok(Self { conn })
    }

    pub fn record(&self, region: &str, guess: &Guess) -> Result<()> {
        // NaN distances are stored as NULL
        let distance = guess.distance_km.is_finite().then_some(guess.distance_km);
        self.conn.execute(
            r#"
            INSERT INTO guesses
            (region, target_id, distance_km, district_correct, points, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                region,
                guess.target_id,
                distance,
                guess.district_correct,
                guess.points_awarded,
                guess.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Per-target history for a region, weakest targets (fewest hits relative to attempts) first
    pub fn target_summary(&self, region: &str) -> Result<Vec<TargetSummary>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                target_id,
                COUNT(*) AS attempts,
                AVG(distance_km) AS avg_distance,
                SUM(CASE WHEN points > 0 THEN 1 ELSE 0 END) AS hits,
                MAX(timestamp) AS last_seen
            FROM guesses
            WHERE region = ?1
            GROUP BY target_id
            ORDER BY (SUM(CASE WHEN points > 0 THEN 1 ELSE 0 END) * 1.0 / COUNT(*)) ASC,
                COUNT(*) DESC,
                target_id ASC
            "#,
        )?;

        let rows = stmt.query_map([region], |row| {
            let last_seen: Option<String> = row.get(4)?;
            Ok(TargetSummary {
                target_id: row.get(0)?,
                attempts: row.get(1)?,
                avg_distance_km: row.get(2)?,
                hits: row.get(3)?,
                last_seen: last_seen
                    .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                    .map(|t| t.with_timezone(&Local)),
            })
        })?;

        let mut summary = Vec::new();
        for row in rows {
            summary.push(row?);
        }
        Ok(summary)
    }

    pub fn total_guesses(&self) -> Result<i64> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM guesses", [], |row| row.get(0))?;
        Ok(n)
    }

    /// Delete every recorded guess
    pub fn clear_all(&self) -> Result<()> {
        self.conn.execute("DELETE FROM guesses", [])?;
        Ok(())
    }
}

impl GuessRecorder for HistoryDb {
    fn record_guess(&mut self, region: &str, guess: &Guess) -> Result<()> {
        self.record(region, guess)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guess(target: &str, distance_km: f64, points: u32) -> Guess {
        Guess {
            target_id: target.to_string(),
            guess_coord: [78.0, 30.0],
            actual_coord: [78.1, 30.1],
            distance_km,
            district_correct: true,
            points_awarded: points,
            timestamp: Local::now(),
        }
    }

    #[test]
    fn test_record_and_summarize() {
        let db = HistoryDb::open_in_memory().unwrap();
        db.record("uttarakhand", &guess("uk:almora", 10.0, 10)).unwrap();
        db.record("uttarakhand", &guess("uk:almora", 70.0, 0)).unwrap();
        db.record("uttarakhand", &guess("uk:dehradun", 2.0, 10)).unwrap();

        let summary = db.target_summary("uttarakhand").unwrap();
        assert_eq!(summary.len(), 2);

        // almora has the worse hit rate so it comes first
        let almora = &summary[0];
        assert_eq!(almora.target_id, "uk:almora");
        assert_eq!(almora.attempts, 2);
        assert_eq!(almora.hits, 1);
        assert_eq!(almora.avg_distance_km, Some(40.0));
        assert_eq!(almora.hit_rate(), 50.0);
        assert!(almora.last_seen.is_some());

        assert_eq!(summary[1].target_id, "uk:dehradun");
        assert_eq!(summary[1].hit_rate(), 100.0);
    }

    #[test]
    fn test_regions_are_separate() {
        let db = HistoryDb::open_in_memory().unwrap();
        db.record("delhi", &guess("dl:saket", 1.0, 10)).unwrap();
        assert!(db.target_summary("punjab").unwrap().is_empty());
        assert_eq!(db.target_summary("delhi").unwrap().len(), 1);
    }

    #[test]
    fn test_nan_distance_stored_as_null() {
        let db = HistoryDb::open_in_memory().unwrap();
        db.record("delhi", &guess("dl:saket", f64::NAN, 0)).unwrap();
        let summary = db.target_summary("delhi").unwrap();
        assert_eq!(summary[0].avg_distance_km, None);
        assert_eq!(summary[0].hits, 0);
    }

    #[test]
    fn test_clear_all() {
        let db = HistoryDb::open_in_memory().unwrap();
        db.record("delhi", &guess("dl:saket", 1.0, 10)).unwrap();
        assert_eq!(db.total_guesses().unwrap(), 1);
        db.clear_all().unwrap();
        assert_eq!(db.total_guesses().unwrap(), 0);
    }

    #[test]
    fn test_open_on_disk_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("history.db");
        let mut db = HistoryDb::open(&path).unwrap();
        db.record_guess("delhi", &guess("dl:saket", 1.0, 10)).unwrap();
        assert!(path.exists());
    }
}
