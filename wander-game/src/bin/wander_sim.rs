//! Headless WANDER session: walks the player around a small house, pokes
//! whoever turns up, and prints what happened.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;
use tracing_subscriber::EnvFilter;
use wander_core::{Effect, EventSink, LocationId, LocationMeta, PlayerSnapshot, Zone};
use wander_game::{EventOutcome, GameEvent, Session, SessionConfig};

#[derive(Parser, Debug)]
#[command(name = "wander-sim")]
#[command(about = "Simulate a random walk through a WANDER session")]
struct Args {
    /// Random seed for both the walk and the scheduler (random if not given)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of location changes to simulate
    #[arg(short = 'n', long, default_value = "200")]
    steps: usize,

    /// TOML configuration file (scheduler sections plus [llm] and [session])
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Replay a JSON array of game events instead of walking randomly
    #[arg(long)]
    script: Option<PathBuf>,

    /// Print the final diagnostics snapshot as JSON instead of the narrative
    #[arg(long)]
    json: bool,
}

/// Prints narrative lines as they arrive.
struct ConsoleSink {
    echo: bool,
    effects: usize,
}

impl EventSink for ConsoleSink {
    fn emit(&mut self, effect: Effect) {
        self.effects += 1;
        if !self.echo {
            return;
        }
        match effect {
            Effect::Narrative {
                location,
                speaker: Some(speaker),
                text,
            } => println!("[{location}] {speaker}: {text}"),
            Effect::Narrative {
                location,
                speaker: None,
                text,
            } => println!("[{location}] {text}"),
            Effect::HealthDelta { amount } => println!("    (health {amount:+})"),
            Effect::UnlockAchievement { id } => println!("    (achievement unlocked: {id})"),
            Effect::SetFlag { flag, value } => println!("    (flag {flag} = {value})"),
            Effect::ReplaceOccupants { .. } | Effect::ResponsePending { .. } => {}
        }
    }
}

fn house() -> Vec<(LocationId, LocationMeta)> {
    vec![
        ("start".into(), LocationMeta::described("The Front Step", "Rain drips from the porch.")),
        ("hall".into(), LocationMeta::described("The Hall", "A long hall lined with portraits.")),
        ("lib_stacks".into(), LocationMeta::tagged(Zone::Library)),
        ("reading_room".into(), LocationMeta::tagged(Zone::Library)),
        ("garden_path".into(), LocationMeta::described("The Garden Path", "Gravel and overgrown roses.")),
        ("chapel_nave".into(), LocationMeta::described("The Chapel", "Candles and cold stone.")),
        ("house_kitchen".into(), LocationMeta::described("The Kitchen", "Copper pans and a warm stove.")),
        ("puzzle_gallery".into(), LocationMeta::described("The Puzzle Gallery", "Locked boxes on every plinth.")),
        ("cellar".into(), LocationMeta::described("The Cellar", "A dark, damp room under the stairs.")),
    ]
}

const REMARKS: &[&str] = &[
    "Good evening, thank you for the company.",
    "What are you doing here?",
    "Get out of my way, fool.",
    "Have you seen the library?",
];

fn random_walk(steps: usize, rng: &mut StdRng) -> Vec<GameEvent> {
    let house = house();
    let mut events = Vec::with_capacity(steps * 2);
    let mut player = PlayerSnapshot::default();
    for _ in 0..steps {
        let (location, meta) = house[rng.gen_range(0..house.len())].clone();
        player.visited.push(location.clone());
        if rng.gen_bool(0.05) {
            player = player.with_item("stolen_hourglass");
        }
        events.push(GameEvent::LocationEntry {
            location,
            meta,
            player: player.clone(),
        });
        events.push(GameEvent::Advance {
            secs: rng.gen_range(0.0..45.0),
        });
    }
    events
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SessionConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => SessionConfig::default(),
    };
    init_tracing(&config.wander.general.log_level);

    let seed = args.seed.or(config.wander.general.seed).unwrap_or_else(rand::random);
    config.wander.general.seed = Some(seed);
    info!(seed, steps = args.steps, "Starting simulation");

    let sink = ConsoleSink {
        echo: !args.json,
        effects: 0,
    };
    let session = Session::from_config(config, sink).context("building session")?;

    let mut rng = StdRng::seed_from_u64(seed);
    let events: Vec<GameEvent> = match &args.script {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading script {}", path.display()))?;
            serde_json::from_str(&text).context("parsing script")?
        }
        None => random_walk(args.steps, &mut rng),
    };

    for event in events {
        let outcome = session.handle(event).await?;
        // Now and then, say something to whoever is in the room.
        if let EventOutcome::Entered { location, .. } = outcome {
            let present = session.with_director(|d| d.get_active(&location));
            if let Some(target) = present.first() {
                if rng.gen_bool(0.3) {
                    let text = REMARKS[rng.gen_range(0..REMARKS.len())];
                    session
                        .handle(GameEvent::Utterance {
                            target: target.clone(),
                            text: text.to_string(),
                        })
                        .await?;
                }
            }
        }
    }

    let (diagnostics, effects) = session.with_director(|d| (d.list_active(), d.sink().effects));
    if args.json {
        println!("{}", serde_json::to_string_pretty(&diagnostics)?);
    } else {
        println!(
            "\n{} transitions, {} effects, {} encounters, simulated time {}",
            diagnostics.transition,
            effects,
            diagnostics.history.len(),
            diagnostics.now
        );
    }
    Ok(())
}
