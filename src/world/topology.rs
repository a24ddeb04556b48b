use serde::{Deserialize, Serialize};
use std::fmt;

/// A cell on the toroidal grid. (0, 0) is the top-left corner; x grows to
/// the right and y grows downward.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

impl Position {
    pub fn new(x: u32, y: u32) -> Self {
        Position { x, y }
    }

    /// Step one cell in `direction`, wrapping both axes.
    pub fn moved(self, direction: Direction, width: u32, height: u32) -> Position {
        let (dx, dy) = direction.delta();
        Position {
            x: wrap(self.x, dx, width),
            y: wrap(self.y, dy, height),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

fn wrap(coord: u32, delta: i32, size: u32) -> u32 {
    (coord as i64 + delta as i64).rem_euclid(size as i64) as u32
}

/// Movement directions. `Center` means stay in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "N")]
    North,
    #[serde(rename = "S")]
    South,
    #[serde(rename = "E")]
    East,
    #[serde(rename = "W")]
    West,
    #[serde(rename = "C")]
    Center,
}

impl Direction {
    pub const CARDINALS: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::South => (0, 1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
            Direction::Center => (0, 0),
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Direction::North => "N",
            Direction::South => "S",
            Direction::East => "E",
            Direction::West => "W",
            Direction::Center => "C",
        }
    }

    /// Parse a short code ("N") or full name ("north"), case-insensitively.
    pub fn parse(s: &str) -> Option<Direction> {
        match s.trim().to_ascii_uppercase().as_str() {
            "N" | "NORTH" => Some(Direction::North),
            "S" | "SOUTH" => Some(Direction::South),
            "E" | "EAST" => Some(Direction::East),
            "W" | "WEST" => Some(Direction::West),
            "C" | "CENTER" => Some(Direction::Center),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Signed offset from `from` to `to` along one axis of length `size`,
/// folded onto the wrap-around path when the direct path is longer than
/// half the axis.
pub fn wrapped_offset(from: u32, to: u32, size: u32) -> i64 {
    let size = size as i64;
    let mut d = to as i64 - from as i64;
    if 2 * d.abs() > size {
        d = if d > 0 { d - size } else { d + size };
    }
    d
}

/// Manhattan distance on the torus.
pub fn toroidal_distance(from: Position, to: Position, width: u32, height: u32) -> u64 {
    let dx = wrapped_offset(from.x, to.x, width);
    let dy = wrapped_offset(from.y, to.y, height);
    dx.unsigned_abs() + dy.unsigned_abs()
}
