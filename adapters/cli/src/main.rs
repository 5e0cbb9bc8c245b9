#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Headless command-line adapter for Outpost Defence.
//!
//! `simulate` runs one bot-defended board through a run of waves and prints
//! the outcome. `duel` drives a full two-bot multiplayer room through the
//! room manager, printing every broadcast event as a JSON line.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use outpost_defence_core::{CellCoord, EnemyKind, Phase, PlayerId, TowerKind};
use outpost_defence_engine::{advance, place_tower, query, start_wave, GameState};
use outpost_defence_map::{blueprint, cell_center, MapBlueprint};
use outpost_defence_rooms::{
    ChannelGateway, Gateway, RoomConfig, RoomManager, RoomStatus, ServerEvent,
};

const TICK: Duration = Duration::from_millis(50);
const BOT_TOWERS: usize = 4;

/// Command-line entry points for the headless adapter.
#[derive(Debug, Parser)]
#[command(name = "outpost-defence", about = "Headless Outpost Defence driver")]
struct Cli {
    /// Optional TOML file overriding the default room configuration.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

/// Supported subcommands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Run a single defended board through consecutive waves.
    Simulate {
        /// Catalog index of the map to play.
        #[arg(long, default_value_t = 0)]
        map: u32,
        /// Number of waves to attempt.
        #[arg(long, default_value_t = 5)]
        waves: u32,
    },
    /// Run a two-bot multiplayer room end to end.
    Duel {
        /// Catalog index of the map to play.
        #[arg(long, default_value_t = 0)]
        map: u32,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Simulate { map, waves } => simulate(map, waves),
        Command::Duel { map } => tokio::runtime::Runtime::new()
            .context("tokio runtime")?
            .block_on(duel(map, config)),
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<RoomConfig> {
    let Some(path) = path else {
        return Ok(RoomConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

/// Buildable cells sorted by proximity to the enemy route.
fn defensive_cells(map: &MapBlueprint) -> Vec<CellCoord> {
    let mut scored: Vec<(f32, CellCoord)> = Vec::new();
    for row in 0..map.rows() {
        for column in 0..map.columns() {
            let cell = CellCoord::new(column, row);
            if !map.is_buildable(cell) {
                continue;
            }
            let center = cell_center(cell);
            let distance = map
                .waypoints()
                .iter()
                .map(|waypoint| center.distance_to(*waypoint))
                .fold(f32::INFINITY, f32::min);
            scored.push((distance, cell));
        }
    }
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    scored.into_iter().map(|(_, cell)| cell).collect()
}

fn simulate(map_index: u32, waves: u32) -> anyhow::Result<()> {
    let Some(map) = blueprint(map_index) else {
        bail!("unknown map index {map_index}");
    };
    tracing::info!(map = map.name(), waves, "starting headless run");

    let mut state = GameState::new(map.clone());
    let mut events = Vec::new();
    for cell in defensive_cells(&map) {
        if place_tower(&mut state, TowerKind::Archer, cell).is_err() {
            break;
        }
    }

    for _ in 0..waves {
        let Ok(wave) = start_wave(&mut state, &mut events) else {
            break;
        };
        let mut budget = 40_000u32;
        while query::phase(&state) == Phase::Wave {
            advance(&mut state, TICK, &mut events);
            budget -= 1;
            if budget == 0 {
                bail!("wave {wave} did not settle within the tick budget");
            }
        }
        tracing::info!(
            wave,
            gold = query::gold(&state),
            lives = query::lives(&state),
            score = query::score(&state),
            "wave finished"
        );
        events.clear();
        if query::phase(&state).is_terminal() {
            break;
        }
    }

    println!(
        "{}",
        serde_json::to_string(&query::snapshot(&state)).context("encoding summary")?
    );
    Ok(())
}

async fn duel(map_index: u32, config: RoomConfig) -> anyhow::Result<()> {
    let alice = PlayerId::new(1);
    let bob = PlayerId::new(2);

    let (gateway, mut outbound) = ChannelGateway::channel();
    let gateway: Arc<dyn Gateway> = Arc::new(gateway);
    let manager = Arc::new(RoomManager::new(config, gateway));
    let _sweeper = manager.spawn_sweeper();

    let printer = tokio::spawn(async move {
        while let Some(delivery) = outbound.recv().await {
            // Snapshots are too chatty for a terminal; everything else is
            // printed as one JSON line per event.
            if matches!(delivery.event, ServerEvent::StateUpdate { .. }) {
                continue;
            }
            if let Ok(line) = serde_json::to_string(&delivery.event) {
                println!("{line}");
            }
        }
    });

    let code = manager
        .create_room(alice, "Alice".to_string(), map_index)
        .map_err(|error| anyhow::anyhow!("create room: {error}"))?;
    manager
        .join_room(&code, bob, "Bob".to_string())
        .map_err(|error| anyhow::anyhow!("join room: {error}"))?;
    manager
        .set_ready(bob, true)
        .map_err(|error| anyhow::anyhow!("ready: {error}"))?;
    manager
        .start_game(alice)
        .map_err(|error| anyhow::anyhow!("start game: {error}"))?;
    tracing::info!(room = %code, "duel started");

    let mut placed = false;
    // Wall-clock bound: a stalemate duel is force-ended instead of running
    // unattended forever.
    for _ in 0..9000 {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let status = manager
            .room_status(&code)
            .map_err(|error| anyhow::anyhow!("room status: {error}"))?;
        if status == RoomStatus::Ended {
            break;
        }
        if status != RoomStatus::Playing {
            continue;
        }

        if !placed {
            let map = blueprint(map_index).context("catalog map")?;
            for cell in defensive_cells(&map).into_iter().take(BOT_TOWERS) {
                let _ = manager.place_tower(alice, TowerKind::Archer, cell);
                let _ = manager.place_tower(bob, TowerKind::Frost, cell);
            }
            placed = true;
        }

        // Alice pressures Bob whenever her kills can pay for it.
        let snapshot = manager
            .snapshot(&code)
            .map_err(|error| anyhow::anyhow!("snapshot: {error}"))?;
        if let Some(entry) = snapshot.players.iter().find(|entry| entry.id == alice) {
            if entry.send_points >= 10 {
                let _ = manager.send_enemy(alice, Some(bob), EnemyKind::Fast);
            }
        }
    }

    let _ = manager.stop_room(&code);
    tracing::info!(room = %code, "duel finished");
    printer.abort();
    Ok(())
}
