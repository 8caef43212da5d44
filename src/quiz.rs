use crate::geo::{City, GeoDataProvider, PoolEntry, Region, StateMetadata};
use crate::geodesy::LonLat;
use crate::session::{transition, Action, Guess, Phase, SessionConfig, SessionState};
use crate::stats::GuessRecorder;
use crate::summary::SessionSummary;
use chrono::Local;
use rand::RngCore;

/// Drives one quiz session against a geo provider.
///
/// All state changes go through [`transition`]; the quiz only gathers the inputs
/// (pool snapshot, target coordinates, clock) and forwards accepted guesses to an
/// optional recorder.
pub struct Quiz<P: GeoDataProvider, R: RngCore> {
    config: SessionConfig,
    provider: P,
    rng: R,
    /// Frozen at `start()` for the whole session
    pool: Vec<PoolEntry>,
    region_key: String,
    state: SessionState,
    recorder: Option<Box<dyn GuessRecorder>>,
}

impl<P: GeoDataProvider, R: RngCore> Quiz<P, R> {
    pub fn new(config: SessionConfig, provider: P, rng: R) -> Self {
        let region_key = provider.region(&config.state_id).key().to_string();
        Self {
            state: SessionState::new(0, config.scoring_mode),
            config,
            provider,
            rng,
            pool: Vec::new(),
            region_key,
            recorder: None,
        }
    }

    pub fn with_recorder(mut self, recorder: Box<dyn GuessRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Begin a fresh session with the current configuration.
    pub fn start(&mut self) {
        let region = self.provider.region(&self.config.state_id);
        self.region_key = region.key().to_string();
        self.pool = region.weighted_city_pool(self.config.target_scope);

        let rounds = self.config.rounds.resolve(self.pool.len());
        log::debug!(
            "starting {} in {} ({} places, {rounds} rounds)",
            self.config.target_scope,
            self.region_key,
            self.pool.len()
        );

        self.dispatch(Action::InitSession {
            rounds,
            scoring_mode: self.config.scoring_mode,
        });
        self.advance();
    }

    /// Guess without district information; the district counts as correct.
    pub fn submit_guess(&mut self, coord: LonLat) {
        self.submit(coord, true);
    }

    pub fn submit_guess_in_district(&mut self, coord: LonLat, district_id: &str) {
        let district_correct = self
            .current_target()
            .map_or(true, |city| city.district_id == district_id);
        self.submit(coord, district_correct);
    }

    /// Move to the next round, skipping the pending one if it has no guess yet.
    pub fn next(&mut self) {
        if self.state.phase == Phase::AwaitingGuess {
            self.dispatch(Action::Skip);
        }
        self.advance();
    }

    pub fn reset(&mut self) {
        self.dispatch(Action::Reset);
    }

    /// Replace the configuration. Takes effect on the next `start()`.
    pub fn set_config(&mut self, config: SessionConfig) {
        self.config = config;
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn pool(&self) -> &[PoolEntry] {
        &self.pool
    }

    pub fn region(&self) -> &Region {
        self.provider.region(&self.region_key)
    }

    pub fn metadata(&self) -> StateMetadata {
        self.provider.state_metadata(&self.region_key)
    }

    pub fn last_guess(&self) -> Option<&Guess> {
        self.state.last_guess()
    }

    pub fn current_target(&self) -> Option<&City> {
        self.state
            .current_target_id
            .as_deref()
            .and_then(|id| self.city(id))
    }

    /// Look up any place of the session's region by id.
    pub fn city(&self, id: &str) -> Option<&City> {
        self.region().find_city(id)
    }

    pub fn summary(&self) -> SessionSummary {
        let mut scoring = self.config.scoring();
        scoring.mode = self.state.scoring_mode;
        SessionSummary::from_state(&self.state, &scoring)
    }

    fn advance(&mut self) {
        let state = std::mem::take(&mut self.state);
        self.state = transition(
            state,
            Action::NextTarget {
                pool: &self.pool,
                allow_repeat: self.config.allow_repeat_targets,
            },
            &mut self.rng,
        );
    }

    fn submit(&mut self, coord: LonLat, district_correct: bool) {
        let actual = self
            .state
            .current_target_id
            .as_deref()
            .and_then(|id| self.provider.city_coordinates(id, &self.region_key));
        let recorded = self.state.guesses.len();

        self.dispatch(Action::SubmitGuess {
            coord,
            actual,
            district_correct,
            scoring: self.config.scoring(),
            timestamp: Local::now(),
        });

        if self.state.guesses.len() > recorded {
            self.record_last_guess();
        }
    }

    fn record_last_guess(&mut self) {
        let (Some(recorder), Some(guess)) = (self.recorder.as_mut(), self.state.guesses.last())
        else {
            return;
        };
        if let Err(e) = recorder.record_guess(&self.region_key, guess) {
            log::warn!("could not record guess for {}: {e}", guess.target_id);
        }
    }

    fn dispatch(&mut self, action: Action<'_>) {
        let state = std::mem::take(&mut self.state);
        self.state = transition(state, action, &mut self.rng);
    }
}
