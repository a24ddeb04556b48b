use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

use crate::world::World;

/// Result of a finished game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Exactly one owner still has living critters.
    Winner(String),
    /// Nobody has living critters.
    Draw,
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Outcome::Winner(owner) => serializer.serialize_str(owner),
            Outcome::Draw => serializer.serialize_str("DRAW"),
        }
    }
}

/// Score per owner over living critters: one for being alive, one per food
/// eaten, two per fight won. Recomputed from current state every call.
pub fn compute_scores(world: &World) -> BTreeMap<String, u64> {
    let mut scores = BTreeMap::new();
    for critter in world.alive_critters() {
        *scores.entry(critter.owner.clone()).or_insert(0) += critter.score();
    }
    scores
}

/// `None` while two or more owners still have living critters.
pub fn determine_winner(world: &World) -> Option<Outcome> {
    let owners: BTreeSet<&str> = world.alive_critters().map(|c| c.owner.as_str()).collect();
    let mut iter = owners.iter();
    match (iter.next(), iter.next()) {
        (None, _) => Some(Outcome::Draw),
        (Some(owner), None) => Some(Outcome::Winner(owner.to_string())),
        _ => None,
    }
}
