use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::{GameConfig, SimulationConfig};
use crate::session::GameSession;
use crate::simulation::scoring::Outcome;
use crate::simulation::snapshot::WorldSnapshot;
use crate::simulation::Engine;
use crate::strategy::{ScriptFactory, StrategyFactory};

/// Log a progress line every this many turns.
const PROGRESS_INTERVAL: u64 = 100;

/// Compile every script in the configured strategy directory.
pub fn load_strategies(config: &SimulationConfig) -> Result<Vec<ScriptFactory>, String> {
    let dir = Path::new(&config.strategy_directory);
    let budget = Duration::from_millis(config.strategy_timeout_ms);
    ScriptFactory::load_dir(dir, budget)
}

/// Set up a fresh game: place every roster entry, then the starting food.
pub fn build_engine<F: StrategyFactory>(
    game: &GameConfig,
    sim: &SimulationConfig,
    factories: &[F],
) -> Result<Engine, String> {
    game.validate()?;
    let mut engine = Engine::new(game.width, game.height, sim.rules(), game.seed)?;

    for entry in game.roster() {
        let factory = factories
            .iter()
            .find(|f| f.species().eq_ignore_ascii_case(&entry.species))
            .ok_or_else(|| {
                let available: Vec<&str> = factories.iter().map(|f| f.species()).collect();
                format!(
                    "Unknown species '{}'. Available: {}",
                    entry.species,
                    available.join(", ")
                )
            })?;
        let spawned = engine.spawn_species(factory, &entry.owner, entry.count, Some(&entry.species));
        if spawned.len() < entry.count {
            warn!(
                species = %entry.species,
                owner = %entry.owner,
                requested = entry.count,
                placed = spawned.len(),
                "Fewer critters placed than requested"
            );
        }
    }

    let food = engine.scatter_food(game.initial_food);
    info!(
        seed = engine.seed(),
        width = game.width,
        height = game.height,
        critters = engine.world().alive_count(),
        food,
        "Game ready"
    );
    Ok(engine)
}

/// How a headless run ended.
#[derive(Debug, Clone)]
pub struct GameSummary {
    pub seed: u64,
    pub outcome: Option<Outcome>,
    pub snapshot: Arc<WorldSnapshot>,
    pub interrupted: bool,
}

/// Run a game at the configured tick rate until someone wins, the turn
/// limit is reached, or Ctrl-C.
pub async fn run_game(
    game: &GameConfig,
    sim: &SimulationConfig,
    factories: &[ScriptFactory],
) -> Result<GameSummary, String> {
    let tick_interval = sim.tick_interval()?;
    let engine = build_engine(game, sim, factories)?;
    let seed = engine.seed();
    let session = GameSession::new(engine);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut interrupted = false;

    info!(
        tick_rate_hz = sim.tick_rate_hz,
        max_turns = sim.max_turns,
        "Game running"
    );

    while session.winner().await.is_none() {
        let tick_start = Instant::now();
        let report = session.step().await;

        if !report.faults.is_empty() {
            warn!(turn = report.turn, faults = report.faults.len(), "Strategy faults this turn");
        }
        if report.turn % PROGRESS_INTERVAL == 0 {
            info!(turn = report.turn, scores = ?report.scores, "Progress");
        }
        if sim.max_turns > 0 && report.turn >= sim.max_turns {
            info!(turn = report.turn, "Turn limit reached");
            break;
        }

        // Rate limiting: sleep remaining time to hit target tick rate
        let elapsed = tick_start.elapsed();
        if elapsed < tick_interval {
            tokio::select! {
                _ = tokio::time::sleep(tick_interval - elapsed) => {}
                _ = &mut shutdown => {
                    interrupted = true;
                    break;
                }
            }
        } else {
            // Overran the interval: poll shutdown once, then go straight on
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    interrupted = true;
                    break;
                }
                _ = std::future::ready(()) => {}
            }
        }
    }

    if interrupted {
        info!("Shutdown signal received");
    }

    let snapshot = session.snapshot().await;
    let outcome = snapshot.winner.clone();
    info!(turn = snapshot.turn, outcome = ?outcome, scores = ?snapshot.scores, "Game over");
    Ok(GameSummary {
        seed,
        outcome,
        snapshot,
        interrupted,
    })
}

/// Print the final standings of a finished run.
pub fn print_summary(summary: &GameSummary) {
    let snap = &summary.snapshot;
    println!("=== Game over after {} turns (seed {}) ===", snap.turn, summary.seed);
    match &summary.outcome {
        Some(Outcome::Winner(owner)) => println!("Winner: {}", owner),
        Some(Outcome::Draw) => println!("Result: DRAW"),
        None if summary.interrupted => println!("Result: interrupted"),
        None => println!("Result: undecided"),
    }
    println!();
    println!("{:<20} {:>8} {:>8}", "Owner", "Alive", "Score");
    println!("{}", "-".repeat(38));
    for (owner, score) in &snap.scores {
        let alive = snap
            .critters
            .iter()
            .filter(|c| c.alive && &c.owner == owner)
            .count();
        println!("{:<20} {:>8} {:>8}", owner, alive, score);
    }
}

/// Print the species that can be used in a game config.
pub fn list_species(config: &SimulationConfig) -> Result<(), String> {
    let factories = load_strategies(config)?;
    if factories.is_empty() {
        println!("No strategies found in {}", config.strategy_directory);
        return Ok(());
    }
    for factory in &factories {
        println!("{}", factory.species());
    }
    println!("\n{} species in {}", factories.len(), config.strategy_directory);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpeciesEntry;
    use std::fs;
    use tempfile::TempDir;

    const STILL: &str = r#"
        fn get_move(info) { "C" }
        fn fight(opponent) { "ROAR" }
        fn eat() { false }
        fn color() { "gray" }
        fn glyph() { "S" }
    "#;

    const CHARGER: &str = r#"
        fn get_move(info) {
            if info.enemy != () { return info.enemy; }
            "W"
        }
        fn fight(opponent) { "POUNCE" }
        fn eat() { false }
        fn color() { "brown" }
        fn glyph() { "H" }
    "#;

    const SPINNER: &str = r#"
        fn get_move(info) { loop { } }
        fn fight(opponent) { "ROAR" }
        fn eat() { false }
        fn color() { "red" }
        fn glyph() { "X" }
    "#;

    fn strategy_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("stone.rhai"), STILL).unwrap();
        fs::write(dir.path().join("hippo.rhai"), CHARGER).unwrap();
        dir
    }

    fn sim_config(dir: &TempDir) -> SimulationConfig {
        SimulationConfig {
            tick_rate_hz: 1000.0,
            max_turns: 50,
            food_per_turn: 0,
            strategy_directory: dir.path().display().to_string(),
            ..SimulationConfig::default()
        }
    }

    fn entry(name: &str, count: usize) -> SpeciesEntry {
        SpeciesEntry {
            name: name.to_string(),
            owner: None,
            count: Some(count),
        }
    }

    #[test]
    fn build_engine_places_roster_and_food() {
        let dir = strategy_dir();
        let sim = sim_config(&dir);
        let factories = load_strategies(&sim).unwrap();
        let game = GameConfig {
            width: 20,
            height: 20,
            seed: 11,
            initial_food: 15,
            species: vec![entry("Stone", 4), entry("hippo", 3)],
            ..GameConfig::default()
        };

        let engine = build_engine(&game, &sim, &factories).unwrap();
        let counts = engine.world().species_counts();
        assert_eq!(counts.get("Stone:Stone"), Some(&4));
        assert_eq!(counts.get("hippo:hippo"), Some(&3));
        assert_eq!(engine.world().food().len(), 15);
        assert_eq!(engine.seed(), 11);
    }

    #[test]
    fn unknown_species_is_an_error() {
        let dir = strategy_dir();
        let sim = sim_config(&dir);
        let factories = load_strategies(&sim).unwrap();
        let game = GameConfig {
            species: vec![entry("Dragon", 1)],
            ..GameConfig::default()
        };

        let err = build_engine(&game, &sim, &factories).err().unwrap();
        assert!(err.contains("Unknown species 'Dragon'"), "Error: {}", err);
        assert!(err.contains("Hippo"), "Error: {}", err);
    }

    #[test]
    fn missing_strategy_directory_is_an_error() {
        let sim = SimulationConfig {
            strategy_directory: "/nonexistent/strategies".to_string(),
            ..SimulationConfig::default()
        };
        assert!(load_strategies(&sim).is_err());
        assert!(list_species(&sim).is_err());
    }

    #[tokio::test]
    async fn run_game_stops_at_turn_limit() {
        let dir = strategy_dir();
        let sim = SimulationConfig {
            max_turns: 3,
            ..sim_config(&dir)
        };
        let factories = load_strategies(&sim).unwrap();
        let game = GameConfig {
            width: 30,
            height: 30,
            seed: 4,
            species: vec![entry("Stone", 2), entry("Stone", 2)],
            ..GameConfig::default()
        };
        // Same species listed twice for one owner is rejected up front
        assert!(run_game(&game, &sim, &factories).await.is_err());

        let game = GameConfig {
            species: vec![
                entry("Stone", 2),
                SpeciesEntry {
                    name: "Stone".to_string(),
                    owner: Some("rival".to_string()),
                    count: Some(2),
                },
            ],
            ..game
        };
        let summary = run_game(&game, &sim, &factories).await.unwrap();
        assert_eq!(summary.snapshot.turn, 3);
        assert!(summary.outcome.is_none());
        assert!(!summary.interrupted);
    }

    #[tokio::test]
    async fn run_game_ends_with_a_winner() {
        let dir = strategy_dir();
        let sim = SimulationConfig {
            max_turns: 200,
            ..sim_config(&dir)
        };
        let factories = load_strategies(&sim).unwrap();
        // A single row: the charger walks west into the stone
        let game = GameConfig {
            width: 12,
            height: 1,
            seed: 8,
            initial_food: 0,
            species: vec![entry("Stone", 1), entry("Hippo", 1)],
            ..GameConfig::default()
        };

        let summary = run_game(&game, &sim, &factories).await.unwrap();
        assert_eq!(summary.outcome, Some(Outcome::Winner("Hippo".to_string())));
        assert!(summary.snapshot.turn < 200);
    }

    #[tokio::test]
    async fn run_game_keeps_going_when_turns_overrun_the_interval() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("spinner.rhai"), SPINNER).unwrap();
        let sim = SimulationConfig {
            tick_rate_hz: 100.0,
            max_turns: 3,
            food_per_turn: 0,
            strategy_timeout_ms: 30,
            strategy_directory: dir.path().display().to_string(),
            ..SimulationConfig::default()
        };
        let factories = load_strategies(&sim).unwrap();
        let game = GameConfig {
            width: 10,
            height: 10,
            seed: 2,
            initial_food: 0,
            species: vec![
                entry("Spinner", 1),
                SpeciesEntry {
                    name: "Spinner".to_string(),
                    owner: Some("rival".to_string()),
                    count: Some(1),
                },
            ],
            ..GameConfig::default()
        };

        // Each turn spends two 30 ms timeouts against a 10 ms interval
        let summary = tokio::time::timeout(
            Duration::from_secs(5),
            run_game(&game, &sim, &factories),
        )
        .await
        .expect("run_game stalled after an overrun turn")
        .unwrap();
        assert_eq!(summary.snapshot.turn, 3);
        assert!(!summary.interrupted);
    }

    #[tokio::test]
    async fn run_game_rejects_unusable_tick_rate() {
        let dir = strategy_dir();
        let sim = SimulationConfig {
            tick_rate_hz: 1e-30,
            ..sim_config(&dir)
        };
        let factories = load_strategies(&sim).unwrap();
        let game = GameConfig {
            species: vec![entry("Stone", 1)],
            ..GameConfig::default()
        };
        let err = run_game(&game, &sim, &factories).await.unwrap_err();
        assert!(err.contains("tick_rate_hz"), "Error: {}", err);
    }
}
