use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;
use tracing::debug;

use crate::simulation::report::{FightDecision, FightRecord, TurnReport};
use crate::simulation::Engine;
use crate::strategy::{Attack, StrategyCall};
use crate::world::{CritterId, Position};

/// Attack used when a strategy cannot produce one.
pub const DEFAULT_ATTACK: Attack = Attack::Scratch;

impl Engine {
    /// Fight out every cell holding two or more critters, in ascending
    /// position order.
    pub(super) fn resolve_combat(
        &mut self,
        occupancy: &BTreeMap<Position, Vec<CritterId>>,
        report: &mut TurnReport,
    ) {
        for (&position, occupants) in occupancy {
            if occupants.len() < 2 {
                continue;
            }
            self.resolve_cell(position, occupants, report);
        }
    }

    fn resolve_cell(&mut self, position: Position, occupants: &[CritterId], report: &mut TurnReport) {
        // Group by (owner, species), keeping first-seen order
        let mut groups: Vec<((String, String), Vec<CritterId>)> = Vec::new();
        for &id in occupants {
            let Some(critter) = self.world.critter(id) else {
                continue;
            };
            if !critter.is_alive() {
                continue;
            }
            let (owner, species) = critter.group_key();
            match groups
                .iter_mut()
                .find(|(key, _)| key.0 == owner && key.1 == species)
            {
                Some((_, members)) => members.push(id),
                None => groups.push(((owner.to_string(), species.to_string()), vec![id])),
            }
        }

        if groups.len() < 2 {
            return;
        }

        let mut fighters: Vec<CritterId> = Vec::with_capacity(groups.len());
        for (_, members) in &groups {
            if let Some(&champion) = members.choose(&mut self.rng) {
                fighters.push(champion);
            }
        }

        while fighters.len() > 1 {
            fighters.shuffle(&mut self.rng);
            let record = self.fight(position, fighters[0], fighters[1], report);

            fighters.retain(|&id| id != record.loser);
            self.world.kill(record.loser);
            self.strategies.remove(&record.loser);
            if let Some(winner) = self.world.critter_mut(record.winner) {
                winner.fights_won += 1;
            }

            debug!(
                %position,
                winner = %record.winner,
                loser = %record.loser,
                decided_by = ?record.decided_by,
                "Fight resolved"
            );
            report.deaths.push(record.loser);
            report.fights.push(record);
        }
    }

    /// One fight between two living critters. Sleepers forfeit without
    /// being asked; otherwise both pick an attack and the cycle decides,
    /// with a coin flip on identical picks.
    fn fight(
        &mut self,
        position: Position,
        attacker: CritterId,
        defender: CritterId,
        report: &mut TurnReport,
    ) -> FightRecord {
        let forfeit = if self.is_asleep(attacker) {
            Some((defender, attacker))
        } else if self.is_asleep(defender) {
            Some((attacker, defender))
        } else {
            None
        };
        if let Some((winner, loser)) = forfeit {
            return FightRecord {
                position,
                attacker,
                defender,
                attacker_attack: None,
                defender_attack: None,
                winner,
                loser,
                decided_by: FightDecision::Asleep,
            };
        }

        let attacker_glyph = self.glyph_of(attacker);
        let defender_glyph = self.glyph_of(defender);
        let attacker_attack = self.consult(attacker, StrategyCall::Fight, DEFAULT_ATTACK, report, |s| {
            s.decide_fight(&defender_glyph)
        });
        let defender_attack = self.consult(defender, StrategyCall::Fight, DEFAULT_ATTACK, report, |s| {
            s.decide_fight(&attacker_glyph)
        });

        let (winner, loser, decided_by) = if attacker_attack.beats() == defender_attack {
            (attacker, defender, FightDecision::Beats)
        } else if defender_attack.beats() == attacker_attack {
            (defender, attacker, FightDecision::Beats)
        } else if self.rng.gen_bool(0.5) {
            (attacker, defender, FightDecision::Tie)
        } else {
            (defender, attacker, FightDecision::Tie)
        };

        FightRecord {
            position,
            attacker,
            defender,
            attacker_attack: Some(attacker_attack),
            defender_attack: Some(defender_attack),
            winner,
            loser,
            decided_by,
        }
    }

    pub(super) fn is_asleep(&self, id: CritterId) -> bool {
        self.world.critter(id).is_some_and(|c| c.sleeping)
    }

    fn glyph_of(&self, id: CritterId) -> String {
        self.world
            .critter(id)
            .map(|c| c.glyph.clone())
            .unwrap_or_default()
    }
}
