pub mod sandbox;
pub mod script;

use serde::{Deserialize, Serialize};

use crate::world::{Direction, Perception};

pub use sandbox::{Sandbox, StrategyCall, StrategyFault};
pub use script::{ScriptFactory, ScriptStrategy};

/// Longest glyph kept from a strategy; longer values are truncated.
pub const MAX_GLYPH_CHARS: usize = 2;
/// Longest color string kept from a strategy.
pub const MAX_COLOR_CHARS: usize = 32;
/// Shown when a strategy gives no usable glyph.
pub const DEFAULT_GLYPH: &str = "?";
/// Shown when a strategy gives no usable color.
pub const DEFAULT_COLOR: &str = "gray";

/// Combat moves. Each beats exactly one other, rock-paper-scissors style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Attack {
    Roar,
    Pounce,
    Scratch,
}

impl Attack {
    /// The attack this one defeats.
    pub fn beats(self) -> Attack {
        match self {
            Attack::Roar => Attack::Scratch,
            Attack::Scratch => Attack::Pounce,
            Attack::Pounce => Attack::Roar,
        }
    }

    pub fn parse(s: &str) -> Option<Attack> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ROAR" => Some(Attack::Roar),
            "POUNCE" => Some(Attack::Pounce),
            "SCRATCH" => Some(Attack::Scratch),
            _ => None,
        }
    }
}

/// Behavior of one critter. The engine calls these one at a time; an
/// implementation keeps whatever memory it needs in `self`.
///
/// Every method may fail. Failures, panics, and calls that run past the
/// latency budget are contained by the engine and replaced with a default.
///
/// Native implementations are timed but not interrupted: a call that runs
/// long is only discarded once it returns, so a call that never returns
/// hangs the tick. Script strategies are preempted at the deadline.
pub trait Strategy: Send {
    /// Called once per tick while the critter is alive and awake.
    fn decide_move(&mut self, perception: &Perception) -> Result<Direction, String>;

    /// Called once per fight. Only the opponent's glyph is revealed.
    fn decide_fight(&mut self, opponent: &str) -> Result<Attack, String>;

    /// Called when standing on food. Eating puts the critter to sleep.
    fn decide_eat(&mut self) -> Result<bool, String>;

    fn color(&mut self) -> Result<String, String>;

    fn glyph(&mut self) -> Result<String, String>;
}

/// Creates strategy instances for one species.
pub trait StrategyFactory: Send + Sync {
    /// Species name used when the spawner does not override it.
    fn species(&self) -> &str;

    /// Build a fresh instance. `seed` comes from the game RNG so any
    /// randomness inside the instance stays reproducible.
    fn instantiate(&self, seed: u64) -> Result<Box<dyn Strategy>, String>;
}

/// Factory for strategies written in Rust.
pub struct NativeFactory<F> {
    species: String,
    build: F,
}

impl<F> NativeFactory<F>
where
    F: Fn(u64) -> Result<Box<dyn Strategy>, String> + Send + Sync,
{
    pub fn new(species: &str, build: F) -> Self {
        NativeFactory {
            species: species.to_string(),
            build,
        }
    }
}

impl<F> StrategyFactory for NativeFactory<F>
where
    F: Fn(u64) -> Result<Box<dyn Strategy>, String> + Send + Sync,
{
    fn species(&self) -> &str {
        &self.species
    }

    fn instantiate(&self, seed: u64) -> Result<Box<dyn Strategy>, String> {
        (self.build)(seed)
    }
}

/// Trim a strategy-provided glyph to the display limit.
pub fn normalize_glyph(raw: &str) -> String {
    normalize(raw, MAX_GLYPH_CHARS, DEFAULT_GLYPH)
}

/// Trim a strategy-provided color to the display limit.
pub fn normalize_color(raw: &str) -> String {
    normalize(raw, MAX_COLOR_CHARS, DEFAULT_COLOR)
}

fn normalize(raw: &str, max_chars: usize, fallback: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return fallback.to_string();
    }
    trimmed.chars().take(max_chars).collect()
}
