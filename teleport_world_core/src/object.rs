use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    Position,
    palette::{BLACK, Color, ObjectType, PaletteError, scale},
    render::{Bitmap, fill_coords, point_in_circle, point_in_line, point_in_rect},
    teleporter::Teleporter,
};

/// Fill color of lava tiles.
const LAVA_ORANGE: [u8; 3] = [255, 128, 0];

/// Errors produced when turning an integer triple back into an object.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error(transparent)]
    Palette(#[from] PaletteError),
    #[error("Type '{0}' does not describe a grid object")]
    NotAnObject(ObjectType),
}

/// Compact `(type, color, state)` description of a single grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Encoding {
    pub type_index: u8,
    pub color_index: u8,
    pub state: u8,
}

impl Encoding {
    pub const fn new(type_index: u8, color_index: u8, state: u8) -> Self {
        Encoding {
            type_index,
            color_index,
            state,
        }
    }

    /// The encoding of a cell with nothing in it.
    pub const fn empty() -> Self {
        Encoding::new(ObjectType::Empty as u8, 0, 0)
    }

    pub fn decode(self) -> Result<Option<WorldObject>, DecodeError> {
        WorldObject::decode(self.type_index, self.color_index, self.state)
    }
}

/// Door state as carried in the `state` slot of an [`Encoding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorState {
    Open = 0,
    Closed = 1,
    Locked = 2,
}

/// The closed set of things that can occupy a grid cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ObjectKind {
    Wall {
        color: Color,
    },
    Floor {
        color: Color,
    },
    Door {
        color: Color,
        is_open: bool,
        is_locked: bool,
    },
    Key {
        color: Color,
    },
    Ball {
        color: Color,
    },
    Box {
        color: Color,
        /// Object revealed when the box is opened.
        contains: Option<Box<WorldObject>>,
    },
    Goal,
    Lava,
    Teleporter(Teleporter),
}

/// Outcome of toggling an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toggle {
    /// Nothing happened.
    Unchanged,
    /// The object changed state in place.
    Changed,
    /// The object should be replaced in its cell (possibly by nothing).
    Replace(Option<WorldObject>),
}

impl Toggle {
    /// Whether toggling had an effect.
    pub fn occurred(&self) -> bool {
        !matches!(self, Toggle::Unchanged)
    }
}

/// The slice of host state an object may consult while being toggled.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToggleContext<'a> {
    /// Object currently held by the agent, if any.
    pub carrying: Option<&'a WorldObject>,
}

/// A grid object together with its placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldObject {
    kind: ObjectKind,
    /// Where the object was first placed.
    pub init_pos: Option<Position>,
    /// Where the object currently is; `None` while carried.
    pub cur_pos: Option<Position>,
}

impl From<ObjectKind> for WorldObject {
    fn from(kind: ObjectKind) -> Self {
        WorldObject {
            kind,
            init_pos: None,
            cur_pos: None,
        }
    }
}

impl From<Teleporter> for WorldObject {
    fn from(t: Teleporter) -> Self {
        ObjectKind::Teleporter(t).into()
    }
}

impl WorldObject {
    pub fn wall(color: Color) -> Self {
        ObjectKind::Wall { color }.into()
    }

    pub fn floor(color: Color) -> Self {
        ObjectKind::Floor { color }.into()
    }

    pub fn door(color: Color, is_open: bool, is_locked: bool) -> Self {
        ObjectKind::Door {
            color,
            is_open,
            is_locked,
        }
        .into()
    }

    pub fn key(color: Color) -> Self {
        ObjectKind::Key { color }.into()
    }

    pub fn ball(color: Color) -> Self {
        ObjectKind::Ball { color }.into()
    }

    /// A box, optionally holding another object.
    pub fn boxed(color: Color, contains: Option<WorldObject>) -> Self {
        ObjectKind::Box {
            color,
            contains: contains.map(Box::new),
        }
        .into()
    }

    pub fn goal() -> Self {
        ObjectKind::Goal.into()
    }

    pub fn lava() -> Self {
        ObjectKind::Lava.into()
    }

    pub fn teleporter(active: bool, active_color: Color, inactive_color: Color) -> Self {
        Teleporter::new(active, active_color, inactive_color).into()
    }

    /// Sets both the initial and current position, as done when placing on a grid.
    pub fn placed_at(mut self, pos: Position) -> Self {
        self.init_pos = Some(pos);
        self.cur_pos = Some(pos);
        self
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    pub fn object_type(&self) -> ObjectType {
        match self.kind {
            ObjectKind::Wall { .. } => ObjectType::Wall,
            ObjectKind::Floor { .. } => ObjectType::Floor,
            ObjectKind::Door { .. } => ObjectType::Door,
            ObjectKind::Key { .. } => ObjectType::Key,
            ObjectKind::Ball { .. } => ObjectType::Ball,
            ObjectKind::Box { .. } => ObjectType::Box,
            ObjectKind::Goal => ObjectType::Goal,
            ObjectKind::Lava => ObjectType::Lava,
            ObjectKind::Teleporter(_) => ObjectType::Teleporter,
        }
    }

    pub fn color(&self) -> Color {
        match &self.kind {
            ObjectKind::Wall { color }
            | ObjectKind::Floor { color }
            | ObjectKind::Door { color, .. }
            | ObjectKind::Key { color }
            | ObjectKind::Ball { color }
            | ObjectKind::Box { color, .. } => *color,
            ObjectKind::Goal => Color::Green,
            ObjectKind::Lava => Color::Red,
            ObjectKind::Teleporter(t) => t.color(),
        }
    }

    pub fn contains(&self) -> Option<&WorldObject> {
        match &self.kind {
            ObjectKind::Box { contains, .. } => contains.as_deref(),
            _ => None,
        }
    }

    pub fn as_teleporter(&self) -> Option<&Teleporter> {
        match &self.kind {
            ObjectKind::Teleporter(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_teleporter_mut(&mut self) -> Option<&mut Teleporter> {
        match &mut self.kind {
            ObjectKind::Teleporter(t) => Some(t),
            _ => None,
        }
    }

    /// Can the agent stand on this?
    pub fn can_overlap(&self) -> bool {
        match self.kind {
            ObjectKind::Floor { .. } | ObjectKind::Goal | ObjectKind::Lava => true,
            ObjectKind::Door { is_open, .. } => is_open,
            _ => false,
        }
    }

    /// Can the agent pick this up?
    pub fn can_pickup(&self) -> bool {
        matches!(
            self.kind,
            ObjectKind::Key { .. } | ObjectKind::Ball { .. } | ObjectKind::Box { .. }
        )
    }

    /// Can this hold another object?
    pub fn can_contain(&self) -> bool {
        matches!(self.kind, ObjectKind::Box { .. })
    }

    /// Can the agent see past this cell?
    pub fn see_behind(&self) -> bool {
        match self.kind {
            ObjectKind::Wall { .. } => false,
            ObjectKind::Door { is_open, .. } => is_open,
            _ => true,
        }
    }

    /// Triggers whatever this object does when the agent interacts with it at `pos`.
    pub fn toggle(&mut self, ctx: ToggleContext<'_>, pos: Position) -> Toggle {
        let outcome = match &mut self.kind {
            ObjectKind::Door {
                color,
                is_open,
                is_locked,
            } => {
                if *is_locked {
                    let has_key = ctx.carrying.is_some_and(|held| {
                        matches!(held.kind, ObjectKind::Key { color: key } if key == *color)
                    });
                    if has_key {
                        *is_locked = false;
                        *is_open = true;
                        Toggle::Changed
                    } else {
                        Toggle::Unchanged
                    }
                } else {
                    *is_open = !*is_open;
                    Toggle::Changed
                }
            }
            ObjectKind::Box { contains, .. } => {
                let revealed = contains.take().map(|inner| (*inner).placed_at(pos));
                Toggle::Replace(revealed)
            }
            _ => Toggle::Unchanged,
        };
        debug!(object = %self.object_type(), ?pos, ?outcome, "toggle");
        outcome
    }

    /// Encodes this object as `(type, color, state)`.
    ///
    /// Doors store open/closed/locked in `state`; teleporters store `1` when
    /// active. Every other variant uses `0`.
    pub fn encode(&self) -> Encoding {
        let state = match &self.kind {
            ObjectKind::Door {
                is_open, is_locked, ..
            } => {
                if *is_open {
                    DoorState::Open as u8
                } else if *is_locked {
                    DoorState::Locked as u8
                } else {
                    DoorState::Closed as u8
                }
            }
            ObjectKind::Teleporter(t) => u8::from(t.is_active()),
            _ => 0,
        };
        Encoding::new(self.object_type().index(), self.color().index(), state)
    }

    /// Builds a fresh object from its encoding.
    ///
    /// Returns `Ok(None)` for the `unseen` and `empty` tags. A teleporter keeps the
    /// encoded color in the slot matching its activity; the other slot takes its default.
    pub fn decode(
        type_index: u8,
        color_index: u8,
        state: u8,
    ) -> Result<Option<Self>, DecodeError> {
        let obj_type = ObjectType::from_index(type_index)?;
        let color = Color::from_index(color_index)?;
        trace!(%obj_type, %color, state, "decode");

        let obj = match obj_type {
            ObjectType::Unseen | ObjectType::Empty => return Ok(None),
            ObjectType::Agent => return Err(DecodeError::NotAnObject(obj_type)),
            ObjectType::Wall => Self::wall(color),
            ObjectType::Floor => Self::floor(color),
            ObjectType::Ball => Self::ball(color),
            ObjectType::Key => Self::key(color),
            ObjectType::Box => Self::boxed(color, None),
            ObjectType::Door => {
                let is_open = state == DoorState::Open as u8;
                let is_locked = state == DoorState::Locked as u8;
                Self::door(color, is_open, is_locked)
            }
            ObjectType::Goal => Self::goal(),
            ObjectType::Lava => Self::lava(),
            ObjectType::Teleporter => {
                let defaults = Teleporter::default();
                let t = if state != 0 {
                    Teleporter::new(true, color, defaults.inactive_color())
                } else {
                    Teleporter::new(false, defaults.active_color(), color)
                };
                t.into()
            }
        };
        Ok(Some(obj))
    }

    /// Draws this object into a tile bitmap.
    pub fn render(&self, img: &mut Bitmap) {
        let c = self.color().rgb();
        match &self.kind {
            ObjectKind::Wall { .. } | ObjectKind::Goal => {
                fill_coords(img, point_in_rect(0.0, 1.0, 0.0, 1.0), c);
            }
            ObjectKind::Floor { .. } => {
                fill_coords(img, point_in_rect(0.031, 1.0, 0.031, 1.0), scale(c, 0.5));
            }
            ObjectKind::Lava => {
                fill_coords(img, point_in_rect(0.0, 1.0, 0.0, 1.0), LAVA_ORANGE);
                for i in 0..3 {
                    let ylo = 0.3 + 0.2 * i as f32;
                    let yhi = 0.4 + 0.2 * i as f32;
                    fill_coords(img, point_in_line(0.1, ylo, 0.3, yhi, 0.03), BLACK);
                    fill_coords(img, point_in_line(0.3, yhi, 0.5, ylo, 0.03), BLACK);
                    fill_coords(img, point_in_line(0.5, ylo, 0.7, yhi, 0.03), BLACK);
                    fill_coords(img, point_in_line(0.7, yhi, 0.9, ylo, 0.03), BLACK);
                }
            }
            ObjectKind::Door {
                is_open, is_locked, ..
            } => {
                if *is_open {
                    fill_coords(img, point_in_rect(0.88, 1.0, 0.0, 1.0), c);
                    fill_coords(img, point_in_rect(0.92, 0.96, 0.04, 0.96), BLACK);
                } else if *is_locked {
                    fill_coords(img, point_in_rect(0.0, 1.0, 0.0, 1.0), c);
                    fill_coords(img, point_in_rect(0.06, 0.94, 0.06, 0.94), scale(c, 0.45));
                    // Key slot
                    fill_coords(img, point_in_rect(0.52, 0.75, 0.50, 0.56), c);
                } else {
                    fill_coords(img, point_in_rect(0.0, 1.0, 0.0, 1.0), c);
                    fill_coords(img, point_in_rect(0.04, 0.96, 0.04, 0.96), BLACK);
                    fill_coords(img, point_in_rect(0.08, 0.92, 0.08, 0.92), c);
                    fill_coords(img, point_in_rect(0.12, 0.88, 0.12, 0.88), BLACK);
                    // Handle
                    fill_coords(img, point_in_circle(0.75, 0.50, 0.08), c);
                }
            }
            ObjectKind::Key { .. } => {
                // Shaft and teeth
                fill_coords(img, point_in_rect(0.50, 0.63, 0.31, 0.88), c);
                fill_coords(img, point_in_rect(0.38, 0.50, 0.59, 0.66), c);
                fill_coords(img, point_in_rect(0.38, 0.50, 0.81, 0.88), c);
                // Ring
                fill_coords(img, point_in_circle(0.56, 0.28, 0.190), c);
                fill_coords(img, point_in_circle(0.56, 0.28, 0.064), BLACK);
            }
            ObjectKind::Ball { .. } => {
                fill_coords(img, point_in_circle(0.5, 0.5, 0.31), c);
            }
            ObjectKind::Box { .. } => {
                fill_coords(img, point_in_rect(0.12, 0.88, 0.12, 0.88), c);
                fill_coords(img, point_in_rect(0.18, 0.82, 0.18, 0.82), BLACK);
                // Lid
                fill_coords(img, point_in_rect(0.16, 0.84, 0.47, 0.53), c);
            }
            ObjectKind::Teleporter(t) => t.render(img),
        }
    }
}
