use serde::Serialize;
use std::collections::BTreeMap;

use crate::simulation::scoring::{self, Outcome};
use crate::world::{CritterId, CritterState, Position, World};

/// Complete world state for rendering or transport.
#[derive(Debug, Clone, Serialize)]
pub struct WorldSnapshot {
    pub message_type: &'static str,
    pub world_id: String,
    pub turn: u64,
    pub width: u32,
    pub height: u32,
    /// Every critter ever spawned, dead ones included, in spawn order.
    pub critters: Vec<CritterSnapshot>,
    pub food: Vec<Position>,
    pub scores: BTreeMap<String, u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<Outcome>,
}

/// One critter's visible state in a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct CritterSnapshot {
    pub id: CritterId,
    pub species: String,
    pub owner: String,
    pub x: u32,
    pub y: u32,
    pub color: String,
    pub glyph: String,
    pub alive: bool,
    pub food_eaten: u32,
    pub fights_won: u32,
    pub sleeping: bool,
}

impl WorldSnapshot {
    pub fn from_world(world: &World) -> Self {
        WorldSnapshot {
            message_type: "WorldSnapshot",
            world_id: world.id.to_string(),
            turn: world.tick_count,
            width: world.width,
            height: world.height,
            critters: world.critters().map(CritterSnapshot::from_critter).collect(),
            food: world.food().iter().copied().collect(),
            scores: scoring::compute_scores(world),
            winner: scoring::determine_winner(world),
        }
    }

    pub fn alive_count(&self) -> usize {
        self.critters.iter().filter(|c| c.alive).count()
    }
}

impl CritterSnapshot {
    pub fn from_critter(critter: &CritterState) -> Self {
        let position = critter.position();
        CritterSnapshot {
            id: critter.id,
            species: critter.species.clone(),
            owner: critter.owner.clone(),
            x: position.x,
            y: position.y,
            color: critter.color.clone(),
            glyph: critter.glyph.clone(),
            alive: critter.is_alive(),
            food_eaten: critter.food_eaten,
            fights_won: critter.fights_won,
            sleeping: critter.sleeping,
        }
    }
}
