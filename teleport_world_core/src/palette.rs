use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// An RGB triple as stored in rendered tiles.
pub type Rgb = [u8; 3];

pub const BLACK: Rgb = [0, 0, 0];

/// Errors raised when a raw index or name falls outside the enumerated tables.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaletteError {
    #[error("Color index {0} is not in the palette")]
    UnknownColorIndex(u8),
    #[error("Color name '{0}' is not in the palette")]
    UnknownColorName(String),
    #[error("Object type index {0} is not a known type")]
    UnknownTypeIndex(u8),
    #[error("Object type name '{0}' is not a known type")]
    UnknownTypeName(String),
}

/// The fixed color palette shared with the grid encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Green,
    Blue,
    Purple,
    Yellow,
    Grey,
}

impl Color {
    /// All colors in index order.
    pub const ALL: [Color; 6] = [
        Color::Red,
        Color::Green,
        Color::Blue,
        Color::Purple,
        Color::Yellow,
        Color::Grey,
    ];

    #[inline]
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Result<Self, PaletteError> {
        Self::ALL
            .get(usize::from(index))
            .copied()
            .ok_or(PaletteError::UnknownColorIndex(index))
    }

    pub fn name(self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Green => "green",
            Color::Blue => "blue",
            Color::Purple => "purple",
            Color::Yellow => "yellow",
            Color::Grey => "grey",
        }
    }

    /// Full-brightness RGB value used when rendering.
    pub fn rgb(self) -> Rgb {
        match self {
            Color::Red => [255, 0, 0],
            Color::Green => [0, 255, 0],
            Color::Blue => [0, 0, 255],
            Color::Purple => [112, 39, 195],
            Color::Yellow => [255, 255, 0],
            Color::Grey => [100, 100, 100],
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Color {
    type Err = PaletteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| PaletteError::UnknownColorName(s.to_string()))
    }
}

/// Scales every channel by `factor`, truncating toward zero.
///
/// `scale(c, 0.5)` is the dimmed tone used for inactive or shaded parts of a tile.
pub fn scale(color: Rgb, factor: f32) -> Rgb {
    color.map(|channel| (f32::from(channel) * factor).clamp(0.0, 255.0) as u8)
}

/// Type tags of the grid encoding. `Unseen` and `Empty` never correspond to an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Unseen,
    Empty,
    Wall,
    Floor,
    Door,
    Key,
    Ball,
    Box,
    Goal,
    Lava,
    Agent,
    Teleporter,
}

impl ObjectType {
    /// All type tags in index order.
    pub const ALL: [ObjectType; 12] = [
        ObjectType::Unseen,
        ObjectType::Empty,
        ObjectType::Wall,
        ObjectType::Floor,
        ObjectType::Door,
        ObjectType::Key,
        ObjectType::Ball,
        ObjectType::Box,
        ObjectType::Goal,
        ObjectType::Lava,
        ObjectType::Agent,
        ObjectType::Teleporter,
    ];

    #[inline]
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Result<Self, PaletteError> {
        Self::ALL
            .get(usize::from(index))
            .copied()
            .ok_or(PaletteError::UnknownTypeIndex(index))
    }

    pub fn name(self) -> &'static str {
        match self {
            ObjectType::Unseen => "unseen",
            ObjectType::Empty => "empty",
            ObjectType::Wall => "wall",
            ObjectType::Floor => "floor",
            ObjectType::Door => "door",
            ObjectType::Key => "key",
            ObjectType::Ball => "ball",
            ObjectType::Box => "box",
            ObjectType::Goal => "goal",
            ObjectType::Lava => "lava",
            ObjectType::Agent => "agent",
            ObjectType::Teleporter => "teleporter",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ObjectType {
    type Err = PaletteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| PaletteError::UnknownTypeName(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_indices_match_the_shared_table() {
        assert_eq!(Color::Red.index(), 0);
        assert_eq!(Color::Grey.index(), 5);
        for color in Color::ALL {
            assert_eq!(Color::from_index(color.index()), Ok(color));
            assert_eq!(color.name().parse::<Color>(), Ok(color));
        }
        assert_eq!(Color::from_index(6), Err(PaletteError::UnknownColorIndex(6)));
        assert!("orange".parse::<Color>().is_err());
    }

    #[test]
    fn type_indices_match_the_shared_table() {
        assert_eq!(ObjectType::Unseen.index(), 0);
        assert_eq!(ObjectType::Empty.index(), 1);
        assert_eq!(ObjectType::Agent.index(), 10);
        assert_eq!(ObjectType::Teleporter.index(), 11);
        for t in ObjectType::ALL {
            assert_eq!(ObjectType::from_index(t.index()), Ok(t));
            assert_eq!(t.to_string().parse::<ObjectType>(), Ok(t));
        }
        assert_eq!(
            ObjectType::from_index(12),
            Err(PaletteError::UnknownTypeIndex(12))
        );
    }

    #[test]
    fn scale_truncates_toward_zero() {
        assert_eq!(scale(Color::Blue.rgb(), 0.5), [0, 0, 127]);
        assert_eq!(scale(Color::Grey.rgb(), 0.5), [50, 50, 50]);
        assert_eq!(scale(Color::Purple.rgb(), 0.45), [50, 17, 87]);
    }
}
