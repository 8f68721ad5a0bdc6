use serde::{Deserialize, Serialize};

pub mod environment;
pub mod map;
pub mod object;
pub mod palette;
pub mod render;
pub mod teleporter;

pub use object::{Encoding, ObjectKind, WorldObject};
pub use palette::{Color, ObjectType};
pub use teleporter::Teleporter;

/// Represents a 2D coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Position { x, y }
    }

    /// The neighbouring cell in `dir`, or `None` when it would leave the first quadrant.
    pub fn step(self, dir: Direction) -> Option<Position> {
        let (dx, dy) = dir.vector();
        Some(Position {
            x: self.x.checked_add_signed(dx)?,
            y: self.y.checked_add_signed(dy)?,
        })
    }
}

/// Facing of the agent. Indices follow the observation convention: 0 is east,
/// increasing clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Right,
    Down,
    Left,
    Up,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Right,
        Direction::Down,
        Direction::Left,
        Direction::Up,
    ];

    #[inline]
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Direction {
        Self::ALL[usize::from(index % 4)]
    }

    pub fn vector(self) -> (isize, isize) {
        match self {
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Up => (0, -1),
        }
    }

    pub fn turn_left(self) -> Direction {
        Self::from_index(self.index() + 3)
    }

    pub fn turn_right(self) -> Direction {
        Self::from_index(self.index() + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turning_wraps_around() {
        assert_eq!(Direction::Right.turn_left(), Direction::Up);
        assert_eq!(Direction::Up.turn_right(), Direction::Right);
        assert_eq!(Direction::Down.turn_right().turn_right(), Direction::Up);
    }

    #[test]
    fn step_stops_at_origin() {
        let origin = Position::new(0, 0);
        assert_eq!(origin.step(Direction::Left), None);
        assert_eq!(origin.step(Direction::Up), None);
        assert_eq!(origin.step(Direction::Down), Some(Position::new(0, 1)));
    }
}
