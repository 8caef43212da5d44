//! Round/score state for one quiz session and the pure transition over it.
//!
//! `transition` never performs I/O: pool, coordinate lookups, timestamps and the
//! random source all arrive as inputs, so a seeded rng replays a session exactly.

use crate::geo::{PoolEntry, TargetScope};
use crate::geodesy::{haversine_km, LonLat};
use crate::scoring::{DistanceTiers, ScoreBreakdown, ScoringConfig, ScoringMode};
use crate::selection::{TargetSelector, WeightedSelector};
use chrono::{DateTime, Local};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Number of rounds in a session; `Auto` means one per place in the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RoundsRepr", into = "RoundsRepr")]
pub enum Rounds {
    #[default]
    Auto,
    Fixed(usize),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RoundsRepr {
    Count(usize),
    Word(String),
}

impl TryFrom<RoundsRepr> for Rounds {
    type Error = String;

    fn try_from(repr: RoundsRepr) -> Result<Self, Self::Error> {
        match repr {
            RoundsRepr::Count(n) => Ok(Rounds::Fixed(n)),
            RoundsRepr::Word(w) => w.parse(),
        }
    }
}

impl From<Rounds> for RoundsRepr {
    fn from(r: Rounds) -> Self {
        match r {
            Rounds::Auto => RoundsRepr::Word("auto".to_string()),
            Rounds::Fixed(n) => RoundsRepr::Count(n),
        }
    }
}

impl FromStr for Rounds {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Rounds::Auto);
        }
        s.parse::<usize>()
            .map(Rounds::Fixed)
            .map_err(|_| format!("expected \"auto\" or a round count, got \"{s}\""))
    }
}

impl fmt::Display for Rounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rounds::Auto => write!(f, "auto"),
            Rounds::Fixed(n) => write!(f, "{n}"),
        }
    }
}

impl Rounds {
    pub fn resolve(self, pool_len: usize) -> usize {
        match self {
            Rounds::Auto => pool_len,
            Rounds::Fixed(n) => n,
        }
    }
}

/// Immutable settings for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub scoring_mode: ScoringMode,
    pub rounds: Rounds,
    pub distance_tiers_km: DistanceTiers,
    pub distance_threshold_km: f64,
    pub points_per_correct: u32,
    pub allow_repeat_targets: bool,
    pub target_scope: TargetScope,
    pub state_id: String,
}

impl SessionConfig {
    pub fn scoring(&self) -> ScoringConfig {
        ScoringConfig {
            mode: self.scoring_mode,
            distance_tiers_km: self.distance_tiers_km,
            distance_threshold_km: self.distance_threshold_km,
            points_per_correct: self.points_per_correct,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Phase {
    Idle,
    AwaitingGuess,
    Reveal,
    Summary,
}

/// One accepted guess. Never modified once recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Guess {
    pub target_id: String,
    pub guess_coord: LonLat,
    pub actual_coord: LonLat,
    /// `NaN` when the guess coordinate was unusable
    pub distance_km: f64,
    pub district_correct: bool,
    pub points_awarded: u32,
    pub timestamp: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub round: usize,
    pub total_rounds: usize,
    pub current_target_id: Option<String>,
    pub guesses: Vec<Guess>,
    /// Sum of `points_awarded`, wide enough that it cannot overflow
    pub score: u64,
    pub phase: Phase,
    pub last_breakdown: Option<ScoreBreakdown>,
    pub scoring_mode: ScoringMode,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(0, ScoringMode::default())
    }
}

impl SessionState {
    pub fn new(total_rounds: usize, scoring_mode: ScoringMode) -> Self {
        Self {
            round: 0,
            total_rounds,
            current_target_id: None,
            guesses: Vec::new(),
            score: 0,
            phase: Phase::Idle,
            last_breakdown: None,
            scoring_mode,
        }
    }

    pub fn used_ids(&self) -> HashSet<String> {
        self.guesses.iter().map(|g| g.target_id.clone()).collect()
    }

    pub fn last_guess(&self) -> Option<&Guess> {
        self.guesses.last()
    }

    /// Rounds that ended without a recorded guess.
    pub fn skipped(&self) -> usize {
        let closed = match self.phase {
            Phase::AwaitingGuess => self.round.saturating_sub(1),
            _ => self.round,
        };
        closed.saturating_sub(self.guesses.len())
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Summary
    }
}

#[derive(Debug, Clone)]
pub enum Action<'a> {
    InitSession {
        rounds: usize,
        scoring_mode: ScoringMode,
    },
    NextTarget {
        pool: &'a [PoolEntry],
        allow_repeat: bool,
    },
    SubmitGuess {
        coord: LonLat,
        /// Coordinates of the current target, `None` if the lookup failed
        actual: Option<LonLat>,
        district_correct: bool,
        scoring: ScoringConfig,
        timestamp: DateTime<Local>,
    },
    /// Abandon the pending round without a guess.
    Skip,
    Reset,
}

impl Action<'_> {
    fn name(&self) -> &'static str {
        match self {
            Action::InitSession { .. } => "InitSession",
            Action::NextTarget { .. } => "NextTarget",
            Action::SubmitGuess { .. } => "SubmitGuess",
            Action::Skip => "Skip",
            Action::Reset => "Reset",
        }
    }
}

/// Apply one action. Misordered or redundant actions return the state unchanged.
pub fn transition(state: SessionState, action: Action<'_>, rng: &mut dyn RngCore) -> SessionState {
    transition_with(&WeightedSelector, state, action, rng)
}

pub fn transition_with<S: TargetSelector + ?Sized>(
    selector: &S,
    state: SessionState,
    action: Action<'_>,
    rng: &mut dyn RngCore,
) -> SessionState {
    let name = action.name();
    match action {
        Action::InitSession {
            rounds,
            scoring_mode,
        } => {
            log::debug!("init session: {rounds} rounds, {scoring_mode} scoring");
            SessionState::new(rounds, scoring_mode)
        }
        Action::Reset => {
            log::debug!("reset session");
            SessionState::new(state.total_rounds, state.scoring_mode)
        }
        Action::NextTarget { pool, allow_repeat } => {
            next_target(selector, state, pool, allow_repeat, rng)
        }
        Action::SubmitGuess {
            coord,
            actual,
            district_correct,
            scoring,
            timestamp,
        } => submit_guess(state, coord, actual, district_correct, scoring, timestamp),
        Action::Skip if state.phase == Phase::AwaitingGuess => {
            log::debug!("round {} skipped", state.round);
            SessionState {
                current_target_id: None,
                phase: Phase::Reveal,
                last_breakdown: None,
                ..state
            }
        }
        Action::Skip => ignored(state, name),
    }
}

fn ignored(state: SessionState, action: &str) -> SessionState {
    log::trace!("{action} ignored in phase {}", state.phase);
    state
}

fn next_target<S: TargetSelector + ?Sized>(
    selector: &S,
    state: SessionState,
    pool: &[PoolEntry],
    allow_repeat: bool,
    rng: &mut dyn RngCore,
) -> SessionState {
    match state.phase {
        Phase::Summary => return ignored(state, "NextTarget"),
        Phase::AwaitingGuess if state.current_target_id.is_some() => {
            return ignored(state, "NextTarget")
        }
        _ => {}
    }

    if state.round >= state.total_rounds {
        log::debug!("all {} rounds played", state.total_rounds);
        return to_summary(state);
    }

    let used_ids = state.used_ids();
    match selector.pick(
        pool,
        &used_ids,
        allow_repeat,
        state.total_rounds,
        state.round,
        rng,
    ) {
        Some(id) => {
            log::debug!("round {}: target {id}", state.round + 1);
            SessionState {
                round: state.round + 1,
                current_target_id: Some(id),
                phase: Phase::AwaitingGuess,
                ..state
            }
        }
        None => {
            log::debug!("pool exhausted after {} rounds", state.round);
            to_summary(state)
        }
    }
}

fn to_summary(state: SessionState) -> SessionState {
    SessionState {
        current_target_id: None,
        phase: Phase::Summary,
        ..state
    }
}

fn submit_guess(
    state: SessionState,
    coord: LonLat,
    actual: Option<LonLat>,
    district_correct: bool,
    scoring: ScoringConfig,
    timestamp: DateTime<Local>,
) -> SessionState {
    let target_id = match state.current_target_id.clone() {
        Some(id) if state.phase == Phase::AwaitingGuess => id,
        _ => return ignored(state, "SubmitGuess"),
    };

    let Some(actual) = actual else {
        log::warn!("no coordinates for target {target_id}, revealing without a score");
        return SessionState {
            current_target_id: None,
            phase: Phase::Reveal,
            last_breakdown: None,
            ..state
        };
    };

    let distance_km = haversine_km(coord, actual);
    // The session's mode wins over whatever the caller passed
    let scoring = ScoringConfig {
        mode: state.scoring_mode,
        ..scoring
    };
    let result = scoring.score(distance_km, district_correct);
    log::debug!(
        "guess for {target_id}: {distance_km:.2} km, {} points",
        result.points
    );

    let mut guesses = state.guesses;
    guesses.push(Guess {
        target_id,
        guess_coord: coord,
        actual_coord: actual,
        distance_km,
        district_correct,
        points_awarded: result.points,
        timestamp,
    });

    SessionState {
        guesses,
        score: state.score.saturating_add(u64::from(result.points)),
        current_target_id: None,
        phase: Phase::Reveal,
        last_breakdown: Some(result.breakdown),
        ..state
    }
}
