//! Marble Race CLI
//!
//! Runs one race headlessly on a manual 60Hz clock and prints the result.
//!
//! ```text
//! marble-race [--seed N] [--rank N|last] [--map N] [--speed X]
//!             [--config FILE] [--stages FILE] [--json] NAME[/WEIGHT][*COUNT]...
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use marble_race::{
    ManualScheduler, RaceConfig, RaceController, RaceEvent, RaceEventKind, RacePhase,
    RapierBackend, Stage, builtin_stages,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const FRAME_SECONDS: f64 = 1.0 / 60.0;

/// Ten minutes of simulated time.
const MAX_FRAMES: usize = 60 * 60 * 10;

#[derive(Debug, Default)]
struct Args {
    seed: Option<u64>,
    rank: Option<RankArg>,
    map: i64,
    speed: Option<f32>,
    config: Option<String>,
    stages: Option<String>,
    json: bool,
    tokens: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
enum RankArg {
    Index(usize),
    Last,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| args.next().with_context(|| format!("{flag} needs a value"));
        match arg.as_str() {
            "--seed" => {
                parsed.seed = Some(value("--seed")?.parse().context("--seed must be an integer")?);
            }
            "--rank" => {
                let raw = value("--rank")?;
                parsed.rank = Some(if raw == "last" {
                    RankArg::Last
                } else {
                    RankArg::Index(raw.parse().context("--rank must be an index or `last`")?)
                });
            }
            "--map" => parsed.map = value("--map")?.parse().context("--map must be an integer")?,
            "--speed" => {
                parsed.speed = Some(value("--speed")?.parse().context("--speed must be a number")?);
            }
            "--config" => parsed.config = Some(value("--config")?),
            "--stages" => parsed.stages = Some(value("--stages")?),
            "--json" => parsed.json = true,
            flag if flag.starts_with("--") => bail!("unknown option {flag}"),
            _ => parsed.tokens.push(arg.clone()),
        }
    }
    if parsed.tokens.is_empty() {
        bail!("no participants given");
    }
    Ok(parsed)
}

fn load_stages(path: Option<&str>) -> Result<Vec<Stage>> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {path}"))?;
            Ok(Stage::list_from_json(&json)?)
        }
        None => Ok(builtin_stages()?),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = parse_args(std::env::args().skip(1))?;

    let config = match &args.config {
        Some(path) => RaceConfig::load(path)
            .with_context(|| format!("failed to load config {path}"))?,
        None => RaceConfig::default(),
    };
    let stages = load_stages(args.stages.as_deref())?;

    let backend = RapierBackend::with_gravity(args.seed.unwrap_or_default(), config.gravity);
    let mut race = RaceController::new(backend, ManualScheduler::new(), stages, config)
        .context("failed to initialize the race")?;

    let goal = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&goal);
    race.subscribe(RaceEventKind::Goal, move |event| {
        if let RaceEvent::Goal { winner } = event {
            *sink.borrow_mut() = Some(winner.clone());
        }
    });

    if args.map != 0 {
        race.set_map(args.map)?;
    }
    if let Some(speed) = args.speed {
        race.set_speed(speed)?;
    }
    let count = race.set_marbles(&args.tokens, args.seed)?;
    race.set_winning_rank(match args.rank {
        Some(RankArg::Index(rank)) => rank,
        Some(RankArg::Last) | None => count.saturating_sub(1),
    });
    race.start()?;

    let mut now = 0.0;
    let mut frames = 0;
    while race.phase() != RacePhase::Resolved {
        if frames == MAX_FRAMES {
            bail!("race did not resolve within {MAX_FRAMES} frames");
        }
        let Some(handle) = race.scheduler_mut().take_pending() else {
            bail!("frame loop stopped before the race resolved");
        };
        now += FRAME_SECONDS;
        race.on_frame(handle, now);
        frames += 1;
    }
    info!("[cli] resolved after {frames} frames ({now:.1}s)");

    let winner = goal.borrow().clone().context("race resolved without a goal event")?;
    let rankings = race.rankings();
    let ranking: Vec<&str> = rankings.iter().map(|m| m.name.as_str()).collect();

    if args.json {
        let output = serde_json::json!({
            "winner": winner,
            "winnerRank": race.winner_rank(),
            "seed": race.seed(),
            "map": race.stage().map(|stage| stage.title.as_str()),
            "ranking": ranking,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for (position, name) in ranking.iter().enumerate() {
            println!("{:>3}. {name}", position + 1);
        }
        println!("winner: {winner}");
        if let Some(seed) = race.seed() {
            println!("seed: {seed}");
        }
    }
    Ok(())
}
