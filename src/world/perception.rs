use serde::Serialize;
use std::collections::BTreeSet;

use crate::world::topology::{Direction, Position};
use crate::world::{CritterId, World, EMPTY_CELL};

/// Read-only view of its surroundings handed to a strategy each tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Perception {
    pub x: u32,
    pub y: u32,
    /// Cell content codes indexed like [`Direction::CARDINALS`].
    pub neighbors: [String; 4],
    pub food_direction: Option<Direction>,
    pub enemy_direction: Option<Direction>,
}

impl Perception {
    /// Content code one step away: `"."`, `"F"`, or an occupant's glyph.
    /// `Center` reports empty.
    pub fn neighbor(&self, direction: Direction) -> &str {
        Direction::CARDINALS
            .iter()
            .position(|&d| d == direction)
            .map(|i| self.neighbors[i].as_str())
            .unwrap_or(EMPTY_CELL)
    }
}

impl World {
    /// Build the perception snapshot for a living critter. Food and enemies
    /// are visible up to `radius` steps away; an enemy is any living critter
    /// of a different species.
    pub fn perception(&self, id: CritterId, radius: u32) -> Option<Perception> {
        let state = self.critter(id).filter(|c| c.is_alive())?;
        let pos = state.position();

        let neighbors = Direction::CARDINALS.map(|d| self.neighbor_content(pos, d).to_string());

        let enemies: BTreeSet<Position> = self
            .alive_critters()
            .filter(|c| c.id != id && c.species != state.species)
            .map(|c| c.position())
            .collect();

        Some(Perception {
            x: pos.x,
            y: pos.y,
            neighbors,
            food_direction: self.nearest_direction(pos, self.food(), radius),
            enemy_direction: self.nearest_direction(pos, &enemies, radius),
        })
    }
}
