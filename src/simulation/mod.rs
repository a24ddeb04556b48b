pub mod combat;
pub mod report;
pub mod scoring;
pub mod snapshot;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::simulation::report::{FaultRecord, FeedingRecord, MovementRecord, TurnReport};
use crate::simulation::scoring::Outcome;
use crate::simulation::snapshot::WorldSnapshot;
use crate::strategy::{
    normalize_color, normalize_glyph, Sandbox, Strategy, StrategyCall, StrategyFactory,
    StrategyFault, DEFAULT_COLOR, DEFAULT_GLYPH,
};
use crate::world::{CritterId, CritterState, Direction, Position, World};

/// Tunable rules of the game. Defaults match the classic arena.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineRules {
    /// Food placed on random empty cells after each tick's combat.
    pub food_per_turn: usize,
    /// Ticks a critter sleeps after eating.
    pub sleep_turns: u32,
    /// How far food and enemies are visible, in toroidal Manhattan steps.
    pub visibility_radius: u32,
    /// Wall-clock budget for any single strategy call.
    pub strategy_timeout_ms: u64,
}

impl Default for EngineRules {
    fn default() -> Self {
        EngineRules {
            food_per_turn: 2,
            sleep_turns: 5,
            visibility_radius: 10,
            strategy_timeout_ms: 100,
        }
    }
}

/// The turn engine: owns the world, one strategy instance per living
/// critter, and the game RNG.
pub struct Engine {
    world: World,
    strategies: HashMap<CritterId, Box<dyn Strategy>>,
    rules: EngineRules,
    sandbox: Sandbox,
    rng: ChaCha8Rng,
    seed: u64,
    last_report: Option<TurnReport>,
}

impl Engine {
    /// Create an empty game. A `seed` of 0 picks a random seed; the one
    /// actually used is available from [`Engine::seed`].
    pub fn new(width: u32, height: u32, rules: EngineRules, seed: u64) -> Result<Self, String> {
        if width == 0 || height == 0 {
            return Err(format!(
                "World dimensions must be positive, got {}x{}",
                width, height
            ));
        }
        if rules.sleep_turns == 0 {
            return Err("sleep_turns must be at least 1".to_string());
        }

        let seed = if seed == 0 {
            rand::thread_rng().r#gen()
        } else {
            seed
        };
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let world_id = uuid::Builder::from_random_bytes(rng.r#gen()).into_uuid();
        let sandbox = Sandbox::new(Duration::from_millis(rules.strategy_timeout_ms));

        debug!(%world_id, seed, width, height, "Created engine");

        Ok(Engine {
            world: World::new(world_id, width, height),
            strategies: HashMap::new(),
            rules,
            sandbox,
            rng,
            seed,
            last_report: None,
        })
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn turn(&self) -> u64 {
        self.world.tick_count
    }

    /// Place up to `count` critters of one species on distinct empty cells
    /// sampled without replacement. Stops early when the grid is full.
    /// Individuals whose strategy fails to instantiate are dropped.
    pub fn spawn_species(
        &mut self,
        factory: &dyn StrategyFactory,
        owner: &str,
        count: usize,
        species: Option<&str>,
    ) -> Vec<CritterId> {
        let empty = self.world.empty_cells();
        let cells: Vec<Position> = empty
            .choose_multiple(&mut self.rng, count)
            .copied()
            .collect();
        if cells.len() < count {
            debug!(
                requested = count,
                placed = cells.len(),
                owner,
                "Not enough empty cells for every critter"
            );
        }

        let mut spawned = Vec::with_capacity(cells.len());
        for position in cells {
            match self.spawn_at(factory, owner, position, species) {
                Ok(id) => spawned.push(id),
                Err(fault) => warn!(
                    species = species.unwrap_or(factory.species()),
                    owner,
                    %position,
                    %fault,
                    "Strategy failed to instantiate, critter skipped"
                ),
            }
        }
        spawned
    }

    /// Spawn one critter at `position`, wrapped onto the grid. The cell
    /// need not be empty.
    pub fn spawn_at(
        &mut self,
        factory: &dyn StrategyFactory,
        owner: &str,
        position: Position,
        species: Option<&str>,
    ) -> Result<CritterId, StrategyFault> {
        let position = Position::new(position.x % self.world.width, position.y % self.world.height);
        let seed: u64 = self.rng.r#gen();
        let mut strategy = self.sandbox.call(|| factory.instantiate(seed))?;

        let color = self
            .sandbox
            .call(|| strategy.color())
            .map(|c| normalize_color(&c))
            .unwrap_or_else(|_| DEFAULT_COLOR.to_string());
        let glyph = self
            .sandbox
            .call(|| strategy.glyph())
            .map(|g| normalize_glyph(&g))
            .unwrap_or_else(|_| DEFAULT_GLYPH.to_string());

        let id = self.world.allocate_id();
        let species = species.unwrap_or(factory.species());
        self.world
            .add_critter(CritterState::new(id, species, owner, position, color, glyph));
        self.strategies.insert(id, strategy);
        Ok(id)
    }

    /// Drop up to `count` food on random empty cells.
    pub fn scatter_food(&mut self, count: usize) -> usize {
        self.world.spawn_food(count, &mut self.rng)
    }

    /// Advance the game by one tick and return what happened.
    pub fn run_turn(&mut self) -> TurnReport {
        let tick_start = Instant::now();
        self.world.tick_count += 1;
        let mut report = TurnReport::new(self.world.tick_count);
        let alive_before = self.world.alive_count();

        // Phase 1: sleep countdown
        for id in self.world.alive_ids() {
            if let Some(critter) = self.world.critter_mut(id) {
                if critter.sleeping {
                    critter.sleep_turns_remaining = critter.sleep_turns_remaining.saturating_sub(1);
                    if critter.sleep_turns_remaining == 0 {
                        critter.sleeping = false;
                    }
                }
            }
        }

        // Phase 2: collect moves in spawn order
        let mut moves: Vec<(CritterId, Direction)> = Vec::new();
        for id in self.world.alive_ids() {
            let direction = if self.is_asleep(id) {
                Direction::Center
            } else {
                match self.world.perception(id, self.rules.visibility_radius) {
                    Some(perception) => self.consult(
                        id,
                        StrategyCall::Move,
                        Direction::Center,
                        &mut report,
                        |s| s.decide_move(&perception),
                    ),
                    None => Direction::Center,
                }
            };
            moves.push((id, direction));
        }

        // Phase 3: apply moves and gather occupancy
        let mut occupancy: BTreeMap<Position, Vec<CritterId>> = BTreeMap::new();
        for (id, direction) in moves {
            let Some(from) = self.world.critter(id).map(|c| c.position()) else {
                continue;
            };
            let to = from.moved(direction, self.world.width, self.world.height);
            if direction != Direction::Center {
                self.world.move_critter(id, to);
                report.movements.push(MovementRecord {
                    id,
                    from,
                    to,
                    direction,
                });
            }
            occupancy.entry(to).or_default().push(id);
        }

        // Phase 4: combat
        self.resolve_combat(&occupancy, &mut report);

        // Phase 5: feeding
        for id in self.world.alive_ids() {
            let Some(position) = self
                .world
                .critter(id)
                .filter(|c| c.is_awake())
                .map(|c| c.position())
            else {
                continue;
            };
            if !self.world.has_food_at(position) {
                continue;
            }
            let eats = self.consult(id, StrategyCall::Eat, false, &mut report, |s| s.decide_eat());
            if !eats {
                continue;
            }
            self.world.remove_food(position);
            let sleep_turns = self.rules.sleep_turns;
            if let Some(critter) = self.world.critter_mut(id) {
                critter.food_eaten += 1;
                critter.sleeping = true;
                critter.sleep_turns_remaining = sleep_turns;
            }
            report.eating.push(FeedingRecord { id, position });
        }

        // Phase 6: food respawn
        self.scatter_food(self.rules.food_per_turn);

        // Phase 7: display refresh
        for id in self.world.alive_ids() {
            let Some((color, glyph)) = self
                .world
                .critter(id)
                .map(|c| (c.color.clone(), c.glyph.clone()))
            else {
                continue;
            };
            let color = self.consult(id, StrategyCall::Color, color, &mut report, |s| {
                s.color().map(|c| normalize_color(&c))
            });
            let glyph = self.consult(id, StrategyCall::Glyph, glyph, &mut report, |s| {
                s.glyph().map(|g| normalize_glyph(&g))
            });
            if let Some(critter) = self.world.critter_mut(id) {
                critter.color = color;
                critter.glyph = glyph;
            }
        }

        // Phase 8: scoring
        report.scores = scoring::compute_scores(&self.world);

        debug_assert_eq!(alive_before - report.deaths.len(), self.world.alive_count());
        debug!(
            turn = report.turn,
            moves = report.movements.len(),
            fights = report.fights.len(),
            eaten = report.eating.len(),
            faults = report.faults.len(),
            alive = self.world.alive_count(),
            duration_ms = tick_start.elapsed().as_secs_f32() * 1000.0,
            "Turn complete"
        );

        self.last_report = Some(report.clone());
        report
    }

    /// Call into a critter's strategy through the sandbox. A fault is
    /// recorded on `report` and `default` is returned instead.
    fn consult<T, F>(
        &mut self,
        id: CritterId,
        call: StrategyCall,
        default: T,
        report: &mut TurnReport,
        f: F,
    ) -> T
    where
        F: FnOnce(&mut dyn Strategy) -> Result<T, String>,
    {
        let sandbox = self.sandbox;
        let result = match self.strategies.get_mut(&id) {
            Some(strategy) => sandbox.call(|| f(strategy.as_mut())),
            None => Err(StrategyFault::Error {
                message: "no strategy instance".to_string(),
            }),
        };
        match result {
            Ok(value) => value,
            Err(fault) => {
                debug!(critter = %id, %call, %fault, "Strategy call defaulted");
                report.faults.push(FaultRecord {
                    critter: id,
                    call,
                    fault,
                });
                default
            }
        }
    }

    pub fn last_report(&self) -> Option<&TurnReport> {
        self.last_report.as_ref()
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot::from_world(&self.world)
    }

    pub fn scores(&self) -> BTreeMap<String, u64> {
        scoring::compute_scores(&self.world)
    }

    /// `None` while more than one owner is still alive.
    pub fn winner(&self) -> Option<Outcome> {
        scoring::determine_winner(&self.world)
    }

    /// Number of living critters that still hold a strategy instance.
    pub fn strategy_count(&self) -> usize {
        self.strategies.len()
    }
}
