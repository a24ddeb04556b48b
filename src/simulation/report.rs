use serde::Serialize;
use std::collections::BTreeMap;

use crate::strategy::{Attack, StrategyCall, StrategyFault};
use crate::world::{CritterId, Direction, Position};

/// Everything that happened during one tick, in the order it happened.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TurnReport {
    pub turn: u64,
    pub movements: Vec<MovementRecord>,
    pub fights: Vec<FightRecord>,
    pub eating: Vec<FeedingRecord>,
    pub deaths: Vec<CritterId>,
    pub faults: Vec<FaultRecord>,
    pub scores: BTreeMap<String, u64>,
}

impl TurnReport {
    pub fn new(turn: u64) -> Self {
        TurnReport {
            turn,
            ..Default::default()
        }
    }

    /// Faults raised by one critter this tick.
    pub fn faults_for(&self, id: CritterId) -> impl Iterator<Item = &FaultRecord> {
        self.faults.iter().filter(move |f| f.critter == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovementRecord {
    pub id: CritterId,
    pub from: Position,
    pub to: Position,
    pub direction: Direction,
}

/// How a fight was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FightDecision {
    /// One attack beat the other.
    Beats,
    /// Both chose the same attack; the winner was drawn at random.
    Tie,
    /// The loser was asleep and forfeited without being asked.
    Asleep,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FightRecord {
    pub position: Position,
    pub attacker: CritterId,
    pub defender: CritterId,
    /// `None` when the fight was decided by sleep and nobody was asked.
    pub attacker_attack: Option<Attack>,
    pub defender_attack: Option<Attack>,
    pub winner: CritterId,
    pub loser: CritterId,
    pub decided_by: FightDecision,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedingRecord {
    pub id: CritterId,
    pub position: Position,
}

/// A strategy call that failed and was replaced by its default.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaultRecord {
    pub critter: CritterId,
    pub call: StrategyCall,
    pub fault: StrategyFault,
}
