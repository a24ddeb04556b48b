pub mod game;
pub mod simulation;

pub use game::{GameConfig, RosterEntry, SpeciesEntry};
pub use simulation::SimulationConfig;
