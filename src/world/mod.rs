pub mod critter;
pub mod perception;
pub mod topology;

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use uuid::Uuid;

pub use critter::{CritterId, CritterState};
pub use perception::Perception;
pub use topology::{Direction, Position};

/// Content code for an empty neighbor cell.
pub const EMPTY_CELL: &str = ".";
/// Content code for a neighbor cell holding food.
pub const FOOD_CELL: &str = "F";

/// The toroidal arena: critters, a position index over the living ones,
/// and food.
#[derive(Debug, Clone)]
pub struct World {
    pub id: Uuid,
    pub width: u32,
    pub height: u32,
    pub tick_count: u64,
    critters: BTreeMap<CritterId, CritterState>,
    position_index: HashMap<Position, Vec<CritterId>>,
    food: BTreeSet<Position>,
    next_id: u64,
}

impl World {
    /// Create an empty world.
    ///
    /// # Panics
    /// Panics if either dimension is zero.
    pub fn new(id: Uuid, width: u32, height: u32) -> Self {
        assert!(width > 0, "World width must be at least 1");
        assert!(height > 0, "World height must be at least 1");
        World {
            id,
            width,
            height,
            tick_count: 0,
            critters: BTreeMap::new(),
            position_index: HashMap::new(),
            food: BTreeSet::new(),
            next_id: 1,
        }
    }

    pub(crate) fn allocate_id(&mut self) -> CritterId {
        let id = CritterId::from_raw(self.next_id);
        self.next_id += 1;
        id
    }

    /// Add a critter and index its position.
    pub fn add_critter(&mut self, state: CritterState) {
        if state.alive {
            self.position_index
                .entry(state.position)
                .or_default()
                .push(state.id);
        }
        self.critters.insert(state.id, state);
    }

    /// Mark a critter dead and drop it from the position index. The record
    /// stays in the table so snapshots can still show it.
    pub fn kill(&mut self, id: CritterId) -> bool {
        let Some(state) = self.critters.get_mut(&id) else {
            return false;
        };
        if !state.alive {
            return false;
        }
        state.alive = false;
        let pos = state.position;
        self.unindex(id, pos);
        true
    }

    /// Move a living critter, keeping the position index in step.
    /// Unknown or dead ids are ignored.
    pub fn move_critter(&mut self, id: CritterId, new_position: Position) {
        let Some(state) = self.critters.get_mut(&id) else {
            return;
        };
        if !state.alive {
            return;
        }
        let old_position = state.position;
        state.position = new_position;
        self.unindex(id, old_position);
        self.position_index
            .entry(new_position)
            .or_default()
            .push(id);
    }

    fn unindex(&mut self, id: CritterId, pos: Position) {
        if let Some(bucket) = self.position_index.get_mut(&pos) {
            bucket.retain(|&cid| cid != id);
            if bucket.is_empty() {
                self.position_index.remove(&pos);
            }
        }
    }

    pub fn critter(&self, id: CritterId) -> Option<&CritterState> {
        self.critters.get(&id)
    }

    /// Mutable access for counters and display fields. Position and
    /// liveness go through [`World::move_critter`] and [`World::kill`].
    pub fn critter_mut(&mut self, id: CritterId) -> Option<&mut CritterState> {
        self.critters.get_mut(&id)
    }

    /// All critters, dead or alive, in spawn order.
    pub fn critters(&self) -> impl Iterator<Item = &CritterState> {
        self.critters.values()
    }

    /// Living critters in spawn order.
    pub fn alive_critters(&self) -> impl Iterator<Item = &CritterState> {
        self.critters.values().filter(|c| c.alive)
    }

    pub fn alive_ids(&self) -> Vec<CritterId> {
        self.alive_critters().map(|c| c.id).collect()
    }

    pub fn alive_count(&self) -> usize {
        self.alive_critters().count()
    }

    /// Living critters standing on `position`, in arrival order.
    pub fn critters_at(&self, position: Position) -> &[CritterId] {
        self.position_index
            .get(&position)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_food_at(&self, position: Position) -> bool {
        self.food.contains(&position)
    }

    pub fn add_food(&mut self, position: Position) {
        self.food.insert(position);
    }

    pub fn remove_food(&mut self, position: Position) -> bool {
        self.food.remove(&position)
    }

    /// Food positions in ascending (x, y) order.
    pub fn food(&self) -> &BTreeSet<Position> {
        &self.food
    }

    /// No living critter and no food.
    pub fn is_empty_cell(&self, position: Position) -> bool {
        !self.position_index.contains_key(&position) && !self.food.contains(&position)
    }

    /// Every empty cell, x-major then y.
    pub fn empty_cells(&self) -> Vec<Position> {
        let mut cells = Vec::new();
        for x in 0..self.width {
            for y in 0..self.height {
                let pos = Position::new(x, y);
                if self.is_empty_cell(pos) {
                    cells.push(pos);
                }
            }
        }
        cells
    }

    /// Place food on up to `count` distinct empty cells chosen uniformly at
    /// random. Returns how many were placed; fewer than `count` only when
    /// the grid runs out of empty cells.
    pub fn spawn_food<R: Rng + ?Sized>(&mut self, count: usize, rng: &mut R) -> usize {
        if count == 0 {
            return 0;
        }
        let empty = self.empty_cells();
        let chosen: Vec<Position> = empty.choose_multiple(rng, count).copied().collect();
        for pos in &chosen {
            self.food.insert(*pos);
        }
        chosen.len()
    }

    /// What a critter would see when looking one step in `direction`:
    /// the first occupant's glyph, else `"F"` for food, else `"."`.
    pub fn neighbor_content(&self, position: Position, direction: Direction) -> &str {
        let target = position.moved(direction, self.width, self.height);
        if let Some(first) = self.critters_at(target).first() {
            if let Some(state) = self.critters.get(first) {
                return &state.glyph;
            }
        }
        if self.has_food_at(target) {
            return FOOD_CELL;
        }
        EMPTY_CELL
    }

    /// Direction of the closest target within `max_distance` (toroidal
    /// Manhattan metric), or `None` if nothing is in range.
    ///
    /// Targets are visited in ascending (x, y) order and only a strictly
    /// closer target replaces the current best, so equidistant ties go to
    /// the smallest position. The step follows the axis with the larger
    /// offset; x wins when both offsets are equal.
    pub fn nearest_direction(
        &self,
        from: Position,
        targets: &BTreeSet<Position>,
        max_distance: u32,
    ) -> Option<Direction> {
        let mut best: Option<(u64, Direction)> = None;

        for target in targets {
            let distance = topology::toroidal_distance(from, *target, self.width, self.height);
            if distance > max_distance as u64 {
                continue;
            }
            if best.is_some_and(|(d, _)| distance >= d) {
                continue;
            }

            let dx = topology::wrapped_offset(from.x, target.x, self.width);
            let dy = topology::wrapped_offset(from.y, target.y, self.height);

            let direction = if dx.abs() >= dy.abs() {
                if dx > 0 {
                    Direction::East
                } else if dx < 0 {
                    Direction::West
                } else {
                    Direction::Center
                }
            } else if dy > 0 {
                Direction::South
            } else {
                Direction::North
            };
            best = Some((distance, direction));
        }

        best.map(|(_, d)| d)
    }

    /// Living critter counts keyed by `owner:species`.
    pub fn species_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for c in self.alive_critters() {
            *counts.entry(format!("{}:{}", c.owner, c.species)).or_insert(0) += 1;
        }
        counts
    }

    /// Check that every living critter sits in exactly the bucket for its
    /// position and that no bucket names a dead or missing critter.
    pub fn index_is_consistent(&self) -> bool {
        let mut indexed = 0;
        for (pos, bucket) in &self.position_index {
            if bucket.is_empty() {
                return false;
            }
            for id in bucket {
                match self.critters.get(id) {
                    Some(c) if c.alive && c.position == *pos => indexed += 1,
                    _ => return false,
                }
            }
        }
        indexed == self.alive_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn make_world(width: u32, height: u32) -> World {
        World::new(Uuid::nil(), width, height)
    }

    fn add(world: &mut World, species: &str, glyph: &str, x: u32, y: u32) -> CritterId {
        let id = world.allocate_id();
        world.add_critter(CritterState::new(
            id,
            species,
            "owner",
            Position::new(x, y),
            "gray".to_string(),
            glyph.to_string(),
        ));
        id
    }

    fn targets(points: &[(u32, u32)]) -> BTreeSet<Position> {
        points.iter().map(|&(x, y)| Position::new(x, y)).collect()
    }

    #[test]
    fn move_reindexes_critter() {
        let mut world = make_world(10, 10);
        let id = add(&mut world, "Ant", "A", 2, 2);
        world.move_critter(id, Position::new(3, 2));

        assert!(world.critters_at(Position::new(2, 2)).is_empty());
        assert_eq!(world.critters_at(Position::new(3, 2)), &[id]);
        assert_eq!(world.critter(id).unwrap().position(), Position::new(3, 2));
        assert!(world.index_is_consistent());
    }

    #[test]
    fn move_unknown_id_is_noop() {
        let mut world = make_world(10, 10);
        let id = add(&mut world, "Ant", "A", 2, 2);
        world.move_critter(CritterId::from_raw(999), Position::new(5, 5));
        assert!(world.critters_at(Position::new(5, 5)).is_empty());
        assert_eq!(world.critters_at(Position::new(2, 2)), &[id]);
    }

    #[test]
    fn stacked_critters_share_a_bucket() {
        let mut world = make_world(10, 10);
        let a = add(&mut world, "Ant", "A", 1, 1);
        let b = add(&mut world, "Ant", "A", 2, 1);
        world.move_critter(b, Position::new(1, 1));
        assert_eq!(world.critters_at(Position::new(1, 1)), &[a, b]);
        assert!(world.index_is_consistent());
    }

    #[test]
    fn kill_unindexes_but_keeps_record() {
        let mut world = make_world(10, 10);
        let id = add(&mut world, "Ant", "A", 4, 4);
        assert!(world.kill(id));
        assert!(!world.kill(id), "second kill is a no-op");

        assert!(world.critters_at(Position::new(4, 4)).is_empty());
        assert!(!world.critter(id).unwrap().is_alive());
        assert_eq!(world.alive_count(), 0);
        assert_eq!(world.critters().count(), 1);
        assert!(world.index_is_consistent());

        // Dead critters never move again
        world.move_critter(id, Position::new(5, 5));
        assert!(world.critters_at(Position::new(5, 5)).is_empty());
    }

    #[test]
    fn neighbor_content_prefers_critter_over_food() {
        let mut world = make_world(10, 10);
        add(&mut world, "Bird", "B", 5, 4);
        world.add_food(Position::new(5, 4));
        world.add_food(Position::new(6, 5));

        let here = Position::new(5, 5);
        assert_eq!(world.neighbor_content(here, Direction::North), "B");
        assert_eq!(world.neighbor_content(here, Direction::East), FOOD_CELL);
        assert_eq!(world.neighbor_content(here, Direction::South), EMPTY_CELL);
    }

    #[test]
    fn neighbor_content_wraps() {
        let mut world = make_world(10, 10);
        add(&mut world, "Bird", "B", 9, 0);
        assert_eq!(world.neighbor_content(Position::new(0, 0), Direction::West), "B");
    }

    #[test]
    fn nearest_direction_picks_major_axis() {
        let world = make_world(60, 50);
        let from = Position::new(10, 10);
        assert_eq!(
            world.nearest_direction(from, &targets(&[(13, 11)]), 10),
            Some(Direction::East)
        );
        assert_eq!(
            world.nearest_direction(from, &targets(&[(9, 4)]), 10),
            Some(Direction::North)
        );
        // Equal offsets favor the x axis
        assert_eq!(
            world.nearest_direction(from, &targets(&[(8, 12)]), 10),
            Some(Direction::West)
        );
    }

    #[test]
    fn nearest_direction_uses_wrapped_path() {
        let world = make_world(60, 50);
        let from = Position::new(1, 10);
        assert_eq!(
            world.nearest_direction(from, &targets(&[(58, 10)]), 10),
            Some(Direction::West)
        );
        let from = Position::new(10, 48);
        assert_eq!(
            world.nearest_direction(from, &targets(&[(10, 2)]), 10),
            Some(Direction::South)
        );
    }

    #[test]
    fn nearest_direction_respects_range() {
        let world = make_world(60, 50);
        let from = Position::new(10, 10);
        assert_eq!(world.nearest_direction(from, &targets(&[(21, 10)]), 10), None);
        assert_eq!(
            world.nearest_direction(from, &targets(&[(20, 10)]), 10),
            Some(Direction::East)
        );
        assert_eq!(world.nearest_direction(from, &BTreeSet::new(), 10), None);
    }

    #[test]
    fn nearest_direction_range_counts_both_wrapped_axes() {
        let world = make_world(60, 50);
        let from = Position::new(1, 1);
        let edge = Position::new(55, 47);
        assert_eq!(topology::toroidal_distance(from, edge, 60, 50), 10);
        assert_eq!(
            world.nearest_direction(from, &targets(&[(55, 47)]), 10),
            Some(Direction::West)
        );
        assert_eq!(world.nearest_direction(from, &targets(&[(54, 47)]), 10), None);
    }

    #[test]
    fn nearest_direction_keeps_closest() {
        let world = make_world(60, 50);
        let from = Position::new(10, 10);
        let t = targets(&[(10, 18), (7, 10)]);
        assert_eq!(world.nearest_direction(from, &t, 10), Some(Direction::West));
    }

    #[test]
    fn nearest_direction_ties_go_to_smallest_position() {
        let world = make_world(60, 50);
        let from = Position::new(10, 10);
        // (8, 10) and (12, 10) are both two steps away; (8, 10) sorts first
        let t = targets(&[(12, 10), (8, 10)]);
        assert_eq!(world.nearest_direction(from, &t, 10), Some(Direction::West));
    }

    #[test]
    fn spawn_food_only_on_empty_cells() {
        let mut world = make_world(3, 3);
        add(&mut world, "Stone", "S", 0, 0);
        world.add_food(Position::new(1, 1));
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let placed = world.spawn_food(4, &mut rng);
        assert_eq!(placed, 4);
        assert_eq!(world.food().len(), 5);
        assert!(!world.has_food_at(Position::new(0, 0)));
    }

    #[test]
    fn spawn_food_caps_at_capacity() {
        let mut world = make_world(2, 2);
        add(&mut world, "Stone", "S", 0, 0);
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        assert_eq!(world.spawn_food(10, &mut rng), 3);
        assert_eq!(world.spawn_food(10, &mut rng), 0);
        assert!(world.empty_cells().is_empty());
    }

    #[test]
    fn spawn_food_is_reproducible() {
        let mut a = make_world(20, 20);
        let mut b = make_world(20, 20);
        a.spawn_food(15, &mut ChaCha8Rng::seed_from_u64(99));
        b.spawn_food(15, &mut ChaCha8Rng::seed_from_u64(99));
        assert_eq!(a.food(), b.food());
    }

    #[test]
    fn species_counts_skip_dead() {
        let mut world = make_world(10, 10);
        add(&mut world, "Ant", "A", 0, 0);
        let dead = add(&mut world, "Ant", "A", 1, 0);
        add(&mut world, "Bird", "B", 2, 0);
        world.kill(dead);

        let counts = world.species_counts();
        assert_eq!(counts.get("owner:Ant"), Some(&1));
        assert_eq!(counts.get("owner:Bird"), Some(&1));
    }
}
