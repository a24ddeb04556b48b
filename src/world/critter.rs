use serde::{Serialize, Serializer};
use std::fmt;

use crate::world::topology::Position;

/// Opaque critter identity. Allocated once per spawned critter and never
/// reused, so ids also order critters by spawn time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CritterId(u64);

impl CritterId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        CritterId(raw)
    }
}

impl fmt::Display for CritterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl Serialize for CritterId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Runtime state of one critter in the world.
///
/// `position` and `alive` are only changed through [`crate::world::World`]
/// so the position index stays consistent.
#[derive(Debug, Clone, PartialEq)]
pub struct CritterState {
    pub id: CritterId,
    pub species: String,
    pub owner: String,
    pub(crate) position: Position,
    pub color: String,
    pub glyph: String,
    pub(crate) alive: bool,
    pub food_eaten: u32,
    pub fights_won: u32,
    pub sleeping: bool,
    pub sleep_turns_remaining: u32,
}

impl CritterState {
    pub fn new(
        id: CritterId,
        species: &str,
        owner: &str,
        position: Position,
        color: String,
        glyph: String,
    ) -> Self {
        CritterState {
            id,
            species: species.to_string(),
            owner: owner.to_string(),
            position,
            color,
            glyph,
            alive: true,
            food_eaten: 0,
            fights_won: 0,
            sleeping: false,
            sleep_turns_remaining: 0,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Living and not asleep.
    pub fn is_awake(&self) -> bool {
        self.alive && !self.sleeping
    }

    /// Contribution to the owner's score: alive bonus, food, and two per kill.
    pub fn score(&self) -> u64 {
        if !self.alive {
            return 0;
        }
        1 + self.food_eaten as u64 + 2 * self.fights_won as u64
    }

    /// Combat grouping key: critters fight only across different keys.
    pub fn group_key(&self) -> (&str, &str) {
        (&self.owner, &self.species)
    }
}
