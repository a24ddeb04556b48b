use clap::{Parser, Subcommand};
use std::path::Path;
use tracing_subscriber::EnvFilter;

use critters::cli::commands;
use critters::config::{GameConfig, SimulationConfig};

#[derive(Parser)]
#[command(name = "critters")]
#[command(about = "A wrap-around arena where scripted critter species compete for food and territory")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a game headlessly until a winner emerges
    Run {
        /// Path to the game setup file
        #[arg(short, long, default_value = "game.toml")]
        game: String,

        /// Override the seed from the game file
        #[arg(long)]
        seed: Option<u64>,

        /// Override the turn limit from the config file
        #[arg(long)]
        turns: Option<u64>,
    },

    /// List the species available in the strategy directory
    Species,
}

fn load_config(path: &str) -> SimulationConfig {
    let path = Path::new(path);
    if !path.exists() {
        return SimulationConfig::default();
    }
    match SimulationConfig::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_logging(config: &SimulationConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let mut config = load_config(&cli.config);

    match cli.command {
        Commands::Run { game, seed, turns } => {
            if let Some(turns) = turns {
                config.max_turns = turns;
            }
            init_logging(&config);

            let mut game_config = match GameConfig::from_file(Path::new(&game)) {
                Ok(g) => g,
                Err(e) => {
                    eprintln!("Error loading game setup: {}", e);
                    std::process::exit(1);
                }
            };
            if let Some(seed) = seed {
                game_config.seed = seed;
            }

            let factories = match commands::load_strategies(&config) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Error loading strategies: {}", e);
                    std::process::exit(1);
                }
            };

            match commands::run_game(&game_config, &config, &factories).await {
                Ok(summary) => commands::print_summary(&summary),
                Err(e) => {
                    eprintln!("Game error: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Species => {
            init_logging(&config);
            if let Err(e) = commands::list_species(&config) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}
