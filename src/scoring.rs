use serde::{Deserialize, Serialize};

/// Ascending km thresholds `[t1, t2, t3]` used by hybrid scoring.
pub type DistanceTiers = [f64; 3];

pub const DEFAULT_TIERS_KM: DistanceTiers = [5.0, 15.0, 30.0];
pub const DEFAULT_THRESHOLD_KM: f64 = 50.0;
pub const DEFAULT_POINTS_PER_CORRECT: u32 = 10;

const DISTRICT_BASE: u32 = 5;
const TIER_BONUSES: [u32; 3] = [5, 3, 1];
const PERFECT_RADIUS_KM: f64 = 2.0;
const PERFECT_BONUS: u32 = 1;

/// Best possible hybrid result for a single guess.
pub const MAX_HYBRID_POINTS: u32 = DISTRICT_BASE + TIER_BONUSES[0] + PERFECT_BONUS;

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ScoringMode {
    #[default]
    Threshold,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreBreakdown {
    Threshold {
        within: bool,
        threshold_km: f64,
    },
    Hybrid {
        base: u32,
        distance_bonus: u32,
        perfect_bonus: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Score {
    pub points: u32,
    pub breakdown: ScoreBreakdown,
}

fn is_scorable(distance_km: f64) -> bool {
    distance_km.is_finite() && distance_km >= 0.0
}

/// Full points when the guess lands within `threshold_km`, nothing otherwise.
pub fn score_threshold(distance_km: f64, threshold_km: f64, points_if_correct: u32) -> Score {
    let within = is_scorable(distance_km) && distance_km <= threshold_km;
    Score {
        points: if within { points_if_correct } else { 0 },
        breakdown: ScoreBreakdown::Threshold {
            within,
            threshold_km,
        },
    }
}

/// District base plus a distance bonus plus a bonus for landing practically on top of the target.
///
/// Tier boundaries are strict: a guess exactly at `t1` earns the `t2` bonus.
pub fn score_hybrid(distance_km: f64, district_correct: bool, tiers: DistanceTiers) -> Score {
    if !is_scorable(distance_km) {
        return Score {
            points: 0,
            breakdown: ScoreBreakdown::Hybrid {
                base: 0,
                distance_bonus: 0,
                perfect_bonus: 0,
            },
        };
    }

    let base = if district_correct { DISTRICT_BASE } else { 0 };
    let distance_bonus = tiers
        .iter()
        .zip(TIER_BONUSES)
        .find(|(limit, _)| distance_km < **limit)
        .map_or(0, |(_, bonus)| bonus);
    let perfect_bonus = if district_correct && distance_km < PERFECT_RADIUS_KM {
        PERFECT_BONUS
    } else {
        0
    };

    Score {
        points: base + distance_bonus + perfect_bonus,
        breakdown: ScoreBreakdown::Hybrid {
            base,
            distance_bonus,
            perfect_bonus,
        },
    }
}

/// Trait for the interchangeable scoring strategies
pub trait Scorer {
    fn score(&self, distance_km: f64, district_correct: bool) -> Score;

    /// Upper bound on points a single guess can earn
    fn max_points(&self) -> u32;
}

#[derive(Debug, Clone, Copy)]
pub struct ThresholdScorer {
    pub threshold_km: f64,
    pub points_if_correct: u32,
}

impl Scorer for ThresholdScorer {
    fn score(&self, distance_km: f64, _district_correct: bool) -> Score {
        score_threshold(distance_km, self.threshold_km, self.points_if_correct)
    }

    fn max_points(&self) -> u32 {
        self.points_if_correct
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HybridScorer {
    pub tiers: DistanceTiers,
}

impl Scorer for HybridScorer {
    fn score(&self, distance_km: f64, district_correct: bool) -> Score {
        score_hybrid(distance_km, district_correct, self.tiers)
    }

    fn max_points(&self) -> u32 {
        MAX_HYBRID_POINTS
    }
}

/// Scoring parameters carried by each guess submission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringConfig {
    pub mode: ScoringMode,
    pub distance_tiers_km: DistanceTiers,
    pub distance_threshold_km: f64,
    pub points_per_correct: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            mode: ScoringMode::default(),
            distance_tiers_km: DEFAULT_TIERS_KM,
            distance_threshold_km: DEFAULT_THRESHOLD_KM,
            points_per_correct: DEFAULT_POINTS_PER_CORRECT,
        }
    }
}

impl ScoringConfig {
    pub fn scorer(&self) -> Box<dyn Scorer> {
        match self.mode {
            ScoringMode::Threshold => Box::new(ThresholdScorer {
                threshold_km: self.distance_threshold_km,
                points_if_correct: self.points_per_correct,
            }),
            ScoringMode::Hybrid => Box::new(HybridScorer {
                tiers: self.distance_tiers_km,
            }),
        }
    }

    pub fn score(&self, distance_km: f64, district_correct: bool) -> Score {
        self.scorer().score(distance_km, district_correct)
    }

    pub fn max_points(&self) -> u32 {
        self.scorer().max_points()
    }
}
