use chrono::Local;
use clap::{Args, Parser, Subcommand};
use itertools::Itertools;
use maplocator::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    geo::{GeoData, GeoDataProvider, TargetScope},
    quiz::Quiz,
    runtime::{LineEventSource, QuizEvent, Runner},
    scoring::{DistanceTiers, ScoreBreakdown, ScoringMode},
    session::{Phase, Rounds, SessionConfig},
    stats::HistoryDb,
    summary::{format_distance, ResultRecord, ResultsLog, SessionSummary},
};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::{
    error::Error,
    io::{self, BufReader},
};

/// find places on the map from memory
#[derive(Parser, Debug)]
#[clap(
    version,
    about,
    long_about = "A map quiz: name a town, guess where it is, and get scored on how close you got. Guesses are read as `lon,lat` lines from stdin."
)]
pub struct Cli {
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// play a session (the default)
    Play(PlayArgs),
    /// list the bundled regions
    States,
    /// show per-place guess history for a region
    Stats {
        /// region to show, defaults to the configured one
        #[clap(short = 's', long)]
        state: Option<String>,

        /// delete the guess history of every region
        #[clap(long)]
        clear: bool,
    },
    /// print the effective configuration as JSON
    Config,
}

#[derive(Args, Debug, Default, Clone)]
struct PlayArgs {
    /// region to play, e.g. uttarakhand or punjab
    #[clap(short = 's', long)]
    state: Option<String>,

    /// which places can be asked
    #[clap(long, value_enum)]
    scope: Option<TargetScope>,

    /// number of rounds, or "auto" for one per place
    #[clap(short = 'r', long)]
    rounds: Option<Rounds>,

    /// scoring mode
    #[clap(short = 'm', long, value_enum)]
    mode: Option<ScoringMode>,

    /// threshold mode: a guess within this many km is correct
    #[clap(long)]
    threshold: Option<f64>,

    /// hybrid mode: three increasing distance tiers in km, e.g. 5,15,30
    #[clap(long, value_parser = parse_tiers)]
    tiers: Option<DistanceTiers>,

    /// threshold mode: points for a correct guess
    #[clap(long)]
    points: Option<u32>,

    /// allow places to come up again in the same session
    #[clap(long)]
    repeat: bool,

    /// seed the target draw for a reproducible session
    #[clap(long)]
    seed: Option<u64>,

    /// store the given options as the new defaults
    #[clap(long)]
    save: bool,

    /// don't write guess history or the results log
    #[clap(long)]
    no_record: bool,
}

fn parse_tiers(s: &str) -> Result<DistanceTiers, String> {
    let values: Vec<f64> = s
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid tier: {e}"))?;

    let tiers: DistanceTiers = values
        .try_into()
        .map_err(|v: Vec<f64>| format!("expected 3 tiers, got {}", v.len()))?;

    if tiers.iter().any(|t| !t.is_finite() || *t <= 0.0) || !tiers.windows(2).all(|w| w[0] < w[1])
    {
        return Err("tiers must be positive and increasing".to_string());
    }
    Ok(tiers)
}

impl PlayArgs {
    /// Overlay the given flags on a loaded config
    fn apply(&self, cfg: &mut Config) {
        if let Some(state) = &self.state {
            cfg.state_id = state.clone();
        }
        if let Some(scope) = self.scope {
            cfg.target_scope = scope;
        }
        if let Some(rounds) = self.rounds {
            cfg.rounds = rounds;
        }
        if let Some(mode) = self.mode {
            cfg.scoring_mode = mode;
        }
        if let Some(threshold) = self.threshold {
            cfg.distance_threshold_km = threshold;
        }
        if let Some(tiers) = self.tiers {
            cfg.distance_tiers_km = tiers;
        }
        if let Some(points) = self.points {
            cfg.points_per_correct = points;
        }
        if self.repeat {
            cfg.allow_repeat_targets = true;
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match cli.command {
        None => play(PlayArgs::default()),
        Some(Command::Play(args)) => play(args),
        Some(Command::States) => states(),
        Some(Command::Stats { state, clear }) => stats(state, clear),
        Some(Command::Config) => {
            let cfg = FileConfigStore::new().load();
            println!("{}", serde_json::to_string_pretty(&cfg)?);
            Ok(())
        }
    }
}

fn play(args: PlayArgs) -> Result<(), Box<dyn Error>> {
    let store = FileConfigStore::new();
    let mut cfg = store.load();
    args.apply(&mut cfg);
    if args.save {
        store.save(&cfg)?;
    }

    let geo = GeoData::bundled()?;
    if let Some(state) = &args.state {
        geo.try_region(state)?;
    }

    let rng = match args.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };

    let session_config = SessionConfig::from(&cfg);
    let mut quiz = Quiz::new(session_config.clone(), geo, rng);
    if !args.no_record {
        match HistoryDb::new() {
            Ok(db) => quiz = quiz.with_recorder(Box::new(db)),
            Err(e) => log::warn!("guess history disabled: {e}"),
        }
    }

    quiz.start();
    print_intro(&quiz);
    print_prompt(&quiz);

    let runner = Runner::new(LineEventSource::new(BufReader::new(io::stdin())));
    runner.run(&mut quiz, |event, quiz| report(event, quiz));

    let summary = quiz.summary();
    print_summary(&summary);

    if !args.no_record && summary.rounds_played > 0 {
        if let Some(path) = AppDirs::results_log_path() {
            let record =
                ResultRecord::new(&summary, &session_config, quiz.region().key(), Local::now());
            if let Err(e) = ResultsLog::new(&path).append(&record) {
                log::warn!("could not append to {}: {e}", path.display());
            }
        }
    }

    Ok(())
}

fn print_intro<P: GeoDataProvider, R: RngCore>(quiz: &Quiz<P, R>) {
    let meta = quiz.metadata();
    let [min_lon, min_lat, max_lon, max_lat] = meta.bounds;
    println!(
        "{}: {} rounds, {} scoring, {} places",
        meta.name,
        quiz.state().total_rounds,
        quiz.state().scoring_mode,
        quiz.pool().len()
    );
    println!("map spans lon {min_lon:.2}..{max_lon:.2}, lat {min_lat:.2}..{max_lat:.2}");
    println!("answer with `lon,lat`, `s` to skip, `q` to quit");
}

fn print_prompt<P: GeoDataProvider, R: RngCore>(quiz: &Quiz<P, R>) {
    if let Some(city) = quiz.current_target() {
        println!(
            "\nround {}/{}: where is {} ({})?",
            quiz.state().round,
            quiz.state().total_rounds,
            city.name,
            city.place_type.as_str().replace('_', " ")
        );
    }
}

fn report<P: GeoDataProvider, R: RngCore>(event: &QuizEvent, quiz: &Quiz<P, R>) {
    match event {
        QuizEvent::Guess(_) | QuizEvent::GuessInDistrict(..) => print_reveal(quiz),
        QuizEvent::Next | QuizEvent::Start => print_prompt(quiz),
        QuizEvent::Reset => println!("session reset, `n` for the first round"),
        QuizEvent::Invalid(input) => eprintln!("could not read {input:?}, expected `lon,lat`"),
        QuizEvent::Quit => {}
    }
}

fn print_reveal<P: GeoDataProvider, R: RngCore>(quiz: &Quiz<P, R>) {
    let state = quiz.state();
    if state.phase != Phase::Reveal {
        return;
    }
    let (Some(breakdown), Some(guess)) = (&state.last_breakdown, quiz.last_guess()) else {
        println!("no location known for that place, round skipped");
        return;
    };
    let city = quiz.city(&guess.target_id);
    let name = city.map_or(guess.target_id.as_str(), |c| c.name.as_str());
    let place = match city.and_then(|c| quiz.region().find_district(&c.district_id)) {
        Some(district) => format!("{name} ({} district)", district.name),
        None => name.to_string(),
    };
    println!(
        "{place} was {} away (at {:.4},{:.4}): +{} [{}], total {}",
        format_distance(guess.distance_km),
        guess.actual_coord[0],
        guess.actual_coord[1],
        guess.points_awarded,
        describe(breakdown),
        state.score
    );
}

fn describe(breakdown: &ScoreBreakdown) -> String {
    match *breakdown {
        ScoreBreakdown::Threshold {
            within,
            threshold_km,
        } => {
            let side = if within { "within" } else { "beyond" };
            format!("{side} {threshold_km} km")
        }
        ScoreBreakdown::Hybrid {
            base,
            distance_bonus,
            perfect_bonus,
        } => {
            let parts = [
                ("district", base),
                ("distance", distance_bonus),
                ("perfect", perfect_bonus),
            ];
            let earned = parts
                .iter()
                .filter(|(_, points)| *points > 0)
                .map(|(label, points)| format!("{label} +{points}"))
                .join(", ");
            if earned.is_empty() {
                "no bonus".to_string()
            } else {
                earned
            }
        }
    }
}

fn print_summary(summary: &SessionSummary) {
    println!(
        "\nscore {}/{} ({}%) over {} rounds, {} skipped",
        summary.score,
        summary.max_score,
        summary.percentage(),
        summary.rounds_played,
        summary.skipped
    );
    if let (Some(mean), Some(sd)) = (summary.mean_distance_km, summary.distance_std_dev_km) {
        println!(
            "average miss {} (sd {})",
            format_distance(mean),
            format_distance(sd)
        );
    }
    if let Some(best) = &summary.best {
        println!(
            "closest: {} at {}",
            best.target_id,
            format_distance(best.distance_km)
        );
    }
}

fn states() -> Result<(), Box<dyn Error>> {
    let geo = GeoData::bundled()?;
    for listing in geo.list_states() {
        println!(
            "{:<18} {:<20} {:>3} places {:>3} districts",
            listing.id, listing.label, listing.meta.cities_count, listing.meta.districts_count
        );
    }
    Ok(())
}

fn stats(state: Option<String>, clear: bool) -> Result<(), Box<dyn Error>> {
    let geo = GeoData::bundled()?;
    let region = match state {
        Some(id) => geo.try_region(&id)?,
        None => geo.region(&FileConfigStore::new().load().state_id),
    };

    let db = HistoryDb::new()?;
    if clear {
        db.clear_all()?;
        println!("guess history cleared");
        return Ok(());
    }

    let rows = db.target_summary(region.key())?;
    if rows.is_empty() {
        println!("no guesses recorded for {} yet", region.name());
        return Ok(());
    }

    println!(
        "{:<24} {:>8} {:>6} {:>8} {:>12}",
        "place", "attempts", "hits", "hit %", "avg miss"
    );
    for row in rows {
        let name = region
            .find_city(&row.target_id)
            .map_or(row.target_id.as_str(), |c| c.name.as_str());
        println!(
            "{:<24} {:>8} {:>6} {:>7.0}% {:>12}",
            name,
            row.attempts,
            row.hits,
            row.hit_rate(),
            row.avg_distance_km
                .map_or_else(|| "n/a".to_string(), format_distance)
        );
    }
    println!("{} guesses recorded across all regions", db.total_guesses()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_play() {
        let cli = Cli::parse_from(["maplocator"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_play_flags() {
        let cli = Cli::parse_from([
            "maplocator",
            "play",
            "--state",
            "punjab",
            "--scope",
            "district-hqs",
            "--rounds",
            "8",
            "--mode",
            "hybrid",
            "--tiers",
            "3,10,20",
            "--seed",
            "42",
        ]);
        let Some(Command::Play(args)) = cli.command else {
            panic!("expected play");
        };
        assert_eq!(args.state.as_deref(), Some("punjab"));
        assert_eq!(args.scope, Some(TargetScope::DistrictHqs));
        assert_eq!(args.rounds, Some(Rounds::Fixed(8)));
        assert_eq!(args.mode, Some(ScoringMode::Hybrid));
        assert_eq!(args.tiers, Some([3.0, 10.0, 20.0]));
        assert_eq!(args.seed, Some(42));
        assert!(!args.save);
    }

    #[test]
    fn test_cli_rounds_auto() {
        let cli = Cli::parse_from(["maplocator", "play", "-r", "auto"]);
        let Some(Command::Play(args)) = cli.command else {
            panic!("expected play");
        };
        assert_eq!(args.rounds, Some(Rounds::Auto));
    }

    #[test]
    fn test_cli_rejects_bad_values() {
        assert!(Cli::try_parse_from(["maplocator", "play", "--tiers", "5,15"]).is_err());
        assert!(Cli::try_parse_from(["maplocator", "play", "--tiers", "30,15,5"]).is_err());
        assert!(Cli::try_parse_from(["maplocator", "play", "--rounds", "many"]).is_err());
        assert!(Cli::try_parse_from(["maplocator", "play", "--mode", "sudden-death"]).is_err());
    }

    #[test]
    fn test_cli_stats_state() {
        let cli = Cli::parse_from(["maplocator", "stats", "-s", "delhi"]);
        assert!(matches!(
            cli.command,
            Some(Command::Stats { state: Some(s), clear: false }) if s == "delhi"
        ));

        let cli = Cli::parse_from(["maplocator", "stats", "--clear"]);
        assert!(matches!(
            cli.command,
            Some(Command::Stats { state: None, clear: true })
        ));
    }

    #[test]
    fn test_apply_overlays_only_given_flags() {
        let mut cfg = Config {
            points_per_correct: 7,
            ..Config::default()
        };
        let args = PlayArgs {
            state: Some("delhi".into()),
            mode: Some(ScoringMode::Hybrid),
            repeat: true,
            ..PlayArgs::default()
        };
        args.apply(&mut cfg);
        assert_eq!(cfg.state_id, "delhi");
        assert_eq!(cfg.scoring_mode, ScoringMode::Hybrid);
        assert!(cfg.allow_repeat_targets);
        assert_eq!(cfg.points_per_correct, 7);
        assert_eq!(cfg.rounds, Rounds::Auto);
    }

    #[test]
    fn test_describe_breakdown() {
        let threshold = ScoreBreakdown::Threshold {
            within: true,
            threshold_km: 50.0,
        };
        assert_eq!(describe(&threshold), "within 50 km");

        let hybrid = ScoreBreakdown::Hybrid {
            base: 5,
            distance_bonus: 0,
            perfect_bonus: 0,
        };
        assert_eq!(describe(&hybrid), "district +5");

        let nothing = ScoreBreakdown::Hybrid {
            base: 0,
            distance_bonus: 0,
            perfect_bonus: 0,
        };
        assert_eq!(describe(&nothing), "no bonus");
    }
}
