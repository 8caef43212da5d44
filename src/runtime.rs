use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, RecvError};

use rand::RngCore;

use crate::geo::GeoDataProvider;
use crate::geodesy::{is_valid_coord, LonLat};
use crate::quiz::Quiz;

/// Unified event type consumed by the runner
#[derive(Clone, Debug, PartialEq)]
pub enum QuizEvent {
    Start,
    Guess(LonLat),
    GuessInDistrict(LonLat, String),
    Next,
    Reset,
    /// Input that could not be understood, kept for the caller to report
    Invalid(String),
    Quit,
}

/// Source of player input
pub trait QuizEventSource: Send + 'static {
    /// Block until the next event. `Err` means no more events will arrive.
    fn recv(&self) -> Result<QuizEvent, RecvError>;
}

/// Parse one line of player input.
///
/// `lon,lat` guesses and moves on, `lon,lat,district` guesses with a district,
/// `s`/`skip`/`n`/`next` advance, `r`/`reset` resets, `q`/`quit` quits.
pub fn parse_line(line: &str) -> Vec<QuizEvent> {
    let line = line.trim();
    match line.to_ascii_lowercase().as_str() {
        "" => return Vec::new(),
        "s" | "skip" | "n" | "next" => return vec![QuizEvent::Next],
        "r" | "reset" => return vec![QuizEvent::Reset],
        "q" | "quit" | "exit" => return vec![QuizEvent::Quit],
        "start" => return vec![QuizEvent::Start],
        _ => {}
    }

    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    let coord = match parts.as_slice() {
        [lon, lat] | [lon, lat, _] => lon.parse::<f64>().ok().zip(lat.parse::<f64>().ok()),
        _ => None,
    }
    .filter(|&(lon, lat)| is_valid_coord([lon, lat]));

    match (coord, parts.get(2)) {
        (Some((lon, lat)), Some(district)) if !district.is_empty() => vec![
            QuizEvent::GuessInDistrict([lon, lat], district.to_string()),
            QuizEvent::Next,
        ],
        (Some((lon, lat)), _) => vec![QuizEvent::Guess([lon, lat]), QuizEvent::Next],
        (None, _) => vec![QuizEvent::Invalid(line.to_string())],
    }
}

/// Production event source reading lines on a background thread
pub struct LineEventSource {
    rx: Receiver<QuizEvent>,
}

impl LineEventSource {
    pub fn new<B: BufRead + Send + 'static>(reader: B) -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            for line in reader.lines() {
                let Ok(line) = line else { break };
                for event in parse_line(&line) {
                    if tx.send(event).is_err() {
                        return;
                    }
                }
            }
        });

        Self { rx }
    }
}

impl QuizEventSource for LineEventSource {
    fn recv(&self) -> Result<QuizEvent, RecvError> {
        self.rx.recv()
    }
}

/// Event source fed directly through a channel
pub struct ChannelEventSource {
    rx: Receiver<QuizEvent>,
}

impl ChannelEventSource {
    pub fn new(rx: Receiver<QuizEvent>) -> Self {
        Self { rx }
    }
}

impl QuizEventSource for ChannelEventSource {
    fn recv(&self) -> Result<QuizEvent, RecvError> {
        self.rx.recv()
    }
}

/// Apply one event to the quiz. Returns `false` for `Quit`.
pub fn apply<P: GeoDataProvider, R: RngCore>(quiz: &mut Quiz<P, R>, event: &QuizEvent) -> bool {
    match event {
        QuizEvent::Start => quiz.start(),
        QuizEvent::Guess(coord) => quiz.submit_guess(*coord),
        QuizEvent::GuessInDistrict(coord, district) => {
            quiz.submit_guess_in_district(*coord, district)
        }
        QuizEvent::Next => quiz.next(),
        QuizEvent::Reset => quiz.reset(),
        QuizEvent::Invalid(input) => log::debug!("ignoring unparseable input {input:?}"),
        QuizEvent::Quit => return false,
    }
    true
}

/// Runner that feeds events to a quiz one at a time, in arrival order
pub struct Runner<E: QuizEventSource> {
    event_source: E,
}

impl<E: QuizEventSource> Runner<E> {
    pub fn new(event_source: E) -> Self {
        Self { event_source }
    }

    /// Blocks for the next event; a closed source reads as `Quit`
    pub fn step(&self) -> QuizEvent {
        self.event_source.recv().unwrap_or(QuizEvent::Quit)
    }

    /// Apply events until the player quits, input ends or the session reaches its summary.
    /// `on_event` sees each applied event together with the updated quiz.
    pub fn run<P, R, F>(&self, quiz: &mut Quiz<P, R>, mut on_event: F)
    where
        P: GeoDataProvider,
        R: RngCore,
        F: FnMut(&QuizEvent, &Quiz<P, R>),
    {
        loop {
            let event = self.step();
            if !apply(quiz, &event) {
                break;
            }
            on_event(&event, quiz);
            if quiz.state().is_finished() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::geo::GeoData;
    use crate::session::{Phase, Rounds, SessionConfig};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::io::Cursor;

    fn quiz(rounds: usize) -> Quiz<GeoData, ChaCha8Rng> {
        let config = SessionConfig {
            rounds: Rounds::Fixed(rounds),
            ..SessionConfig::from(&Config::default())
        };
        Quiz::new(
            config,
            GeoData::bundled().unwrap(),
            ChaCha8Rng::seed_from_u64(17),
        )
    }

    #[test]
    fn parse_line_understands_commands() {
        assert!(parse_line("  ").is_empty());
        assert_eq!(parse_line("S"), vec![QuizEvent::Next]);
        assert_eq!(parse_line("reset"), vec![QuizEvent::Reset]);
        assert_eq!(parse_line("q"), vec![QuizEvent::Quit]);
        assert_eq!(
            parse_line("78.03, 30.31"),
            vec![QuizEvent::Guess([78.03, 30.31]), QuizEvent::Next]
        );
        assert_eq!(
            parse_line("78.03,30.31,uk:dehradun"),
            vec![
                QuizEvent::GuessInDistrict([78.03, 30.31], "uk:dehradun".into()),
                QuizEvent::Next
            ]
        );
        assert_eq!(
            parse_line("north of here"),
            vec![QuizEvent::Invalid("north of here".into())]
        );
    }

    #[test]
    fn parse_line_rejects_impossible_coordinates() {
        for line in ["190,30", "78,-91", "nan,30", "78,inf,uk:dehradun"] {
            assert_eq!(parse_line(line), vec![QuizEvent::Invalid(line.into())]);
        }
        assert_eq!(
            parse_line("-180,90"),
            vec![QuizEvent::Guess([-180.0, 90.0]), QuizEvent::Next]
        );
    }

    #[test]
    fn step_returns_quit_when_source_closes() {
        let (tx, rx) = mpsc::channel();
        drop(tx);
        let runner = Runner::new(ChannelEventSource::new(rx));
        assert_eq!(runner.step(), QuizEvent::Quit);
    }

    #[test]
    fn step_passes_through_events() {
        let (tx, rx) = mpsc::channel();
        tx.send(QuizEvent::Reset).unwrap();
        let runner = Runner::new(ChannelEventSource::new(rx));
        assert_eq!(runner.step(), QuizEvent::Reset);
    }

    #[test]
    fn run_applies_events_in_order() {
        let (tx, rx) = mpsc::channel();
        tx.send(QuizEvent::Start).unwrap();
        tx.send(QuizEvent::Guess([78.0, 30.0])).unwrap();
        tx.send(QuizEvent::Next).unwrap();
        tx.send(QuizEvent::Quit).unwrap();
        tx.send(QuizEvent::Next).unwrap();

        let mut q = quiz(3);
        let mut seen = Vec::new();
        Runner::new(ChannelEventSource::new(rx)).run(&mut q, |ev, _| seen.push(ev.clone()));

        assert_eq!(seen.len(), 3);
        assert_eq!(q.state().round, 2);
        assert_eq!(q.state().guesses.len(), 1);
        assert_eq!(q.state().phase, Phase::AwaitingGuess);
    }

    #[test]
    fn run_stops_at_summary() {
        let input = "start\n78.0,30.0\nskip\nq\n";
        let mut q = quiz(2);
        let runner = Runner::new(LineEventSource::new(Cursor::new(input)));
        let mut phases = Vec::new();
        runner.run(&mut q, |_, q| phases.push(q.state().phase));

        assert_eq!(q.state().phase, Phase::Summary);
        assert_eq!(phases.last(), Some(&Phase::Summary));
        assert_eq!(q.summary().guesses, 1);
        assert_eq!(q.summary().skipped, 1);
    }
}
