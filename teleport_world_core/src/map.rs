use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::{
    Direction, Position,
    object::{DecodeError, Encoding, WorldObject},
    render::{Bitmap, render_tile},
};

/// Supersampling factor used when rendering whole grids.
pub const TILE_SUBDIVS: usize = 3;

/// Represents errors that can occur within the grid operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Coordinates ({x}, {y}) are out of bounds for grid size ({width}, {height})")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
    #[error("Expected {expected} encoded cells, found {found}")]
    SizeMismatch { expected: usize, found: usize },
    #[error("Cell ({}, {}) could not be decoded: {source}", .position.x, .position.y)]
    Decode {
        position: Position,
        source: DecodeError,
    },
}

/// A generic 2D grid stored row-major in a flat vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a new grid with the specified dimensions, filled with default values.
    ///
    /// # Panics
    ///
    /// Panics if `width * height` overflows `usize`.
    pub fn new(width: usize, height: usize) -> Self
    where
        T: Default,
    {
        Self::from_generator(width, height, |_| T::default())
    }

    /// Creates a new grid, asking `f` for the value of every position in row-major order.
    ///
    /// # Panics
    ///
    /// Panics if `width * height` overflows `usize`.
    pub fn from_generator<F>(width: usize, height: usize, mut f: F) -> Self
    where
        F: FnMut(Position) -> T,
    {
        let size = width.checked_mul(height).expect("Grid size overflow");
        let mut cells = Vec::with_capacity(size);
        for y in 0..height {
            for x in 0..width {
                cells.push(f(Position { x, y }));
            }
        }
        Grid {
            width,
            height,
            cells,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn is_valid(&self, pos: Position) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    #[inline]
    fn index_of(&self, pos: Position) -> Option<usize> {
        self.is_valid(pos).then(|| pos.y * self.width + pos.x)
    }

    fn out_of_bounds(&self, pos: Position) -> GridError {
        GridError::OutOfBounds {
            x: pos.x,
            y: pos.y,
            width: self.width,
            height: self.height,
        }
    }

    pub fn get(&self, pos: Position) -> Option<&T> {
        self.cells.get(self.index_of(pos)?)
    }

    pub fn get_mut(&mut self, pos: Position) -> Option<&mut T> {
        let index = self.index_of(pos)?;
        self.cells.get_mut(index)
    }

    /// Sets the value of the cell at `pos`.
    pub fn set(&mut self, pos: Position, value: T) -> Result<(), GridError> {
        let index = self.index_of(pos).ok_or_else(|| self.out_of_bounds(pos))?;
        self.cells[index] = value;
        Ok(())
    }

    /// Returns an iterator that yields `(Position, &T)` in row-major order.
    pub fn enumerate(&self) -> impl Iterator<Item = (Position, &T)> {
        let width = self.width;
        self.cells.iter().enumerate().map(move |(index, cell)| {
            let pos = Position {
                x: index % width,
                y: index / width,
            };
            (pos, cell)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.cells.iter()
    }
}

impl<T> Index<Position> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, pos: Position) -> &Self::Output {
        match self.index_of(pos) {
            Some(idx) => &self.cells[idx],
            None => panic!(
                "Grid index ({}, {}) out of bounds for grid size ({}, {})",
                pos.x, pos.y, self.width, self.height
            ),
        }
    }
}

impl<T> IndexMut<Position> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, pos: Position) -> &mut Self::Output {
        match self.index_of(pos) {
            Some(idx) => &mut self.cells[idx],
            None => panic!(
                "Grid index ({}, {}) out of bounds for grid size ({}, {})",
                pos.x, pos.y, self.width, self.height
            ),
        }
    }
}

/// A grid of optional world objects; `None` is an empty cell.
pub type ObjectGrid = Grid<Option<WorldObject>>;

impl Grid<Option<WorldObject>> {
    /// Puts `obj` at `pos`, recording the placement on the object.
    pub fn place(&mut self, pos: Position, obj: WorldObject) -> Result<(), GridError> {
        self.set(pos, Some(obj.placed_at(pos)))
    }

    /// Removes and returns the object at `pos`.
    pub fn take(&mut self, pos: Position) -> Option<WorldObject> {
        self.get_mut(pos)?.take()
    }

    pub fn object_at(&self, pos: Position) -> Option<&WorldObject> {
        self.get(pos)?.as_ref()
    }

    /// Surrounds the grid with walls built by `make`. A grid with no cells is left untouched.
    pub fn wall_border(&mut self, make: impl Fn() -> WorldObject) -> Result<(), GridError> {
        let (w, h) = (self.width, self.height);
        if w == 0 || h == 0 {
            return Ok(());
        }
        for x in 0..w {
            for y in [0, h - 1] {
                self.place(Position { x, y }, make())?;
            }
        }
        for y in 0..h {
            for x in [0, w - 1] {
                self.place(Position { x, y }, make())?;
            }
        }
        Ok(())
    }

    /// Encodes every cell in row-major order. Empty cells use the `empty` tag.
    pub fn encode(&self) -> Vec<Encoding> {
        self.iter()
            .map(|cell| cell.as_ref().map_or(Encoding::empty(), WorldObject::encode))
            .collect()
    }

    /// Rebuilds a grid from row-major encodings; `empty` and `unseen` cells become `None`.
    pub fn decode(width: usize, height: usize, cells: &[Encoding]) -> Result<Self, GridError> {
        let expected = width.checked_mul(height).unwrap_or(usize::MAX);
        if cells.len() != expected {
            return Err(GridError::SizeMismatch {
                expected,
                found: cells.len(),
            });
        }

        let mut grid = Self::new(width, height);
        for (i, code) in cells.iter().enumerate() {
            let position = Position {
                x: i % width,
                y: i / width,
            };
            let decoded = code
                .decode()
                .map_err(|source| GridError::Decode { position, source })?;
            if let Some(obj) = decoded {
                grid.place(position, obj)?;
            }
        }
        Ok(grid)
    }

    /// Renders the whole grid, one `tile_size` square per cell.
    pub fn render(&self, tile_size: usize, agent: Option<(Position, Direction)>) -> Bitmap {
        let mut frame = Bitmap::new(self.width * tile_size, self.height * tile_size);
        for (pos, cell) in self.enumerate() {
            let agent_dir = agent.and_then(|(at, dir)| (at == pos).then_some(dir));
            let tile = render_tile(cell.as_ref(), agent_dir, false, tile_size, TILE_SUBDIVS);
            frame.blit(&tile, pos.x * tile_size, pos.y * tile_size);
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ObjectType,
        palette::{BLACK, Color, PaletteError},
        render::{AGENT_COLOR, GRID_LINE},
    };

    fn sample() -> ObjectGrid {
        let mut grid = ObjectGrid::new(4, 3);
        grid.wall_border(|| WorldObject::wall(Color::Grey)).unwrap();
        grid.place(
            Position::new(1, 1),
            WorldObject::teleporter(false, Color::Blue, Color::Grey),
        )
        .unwrap();
        grid.place(Position::new(2, 1), WorldObject::door(Color::Red, false, true))
            .unwrap();
        grid
    }

    #[test]
    fn wall_border_handles_degenerate_grids() {
        let mut flat = ObjectGrid::new(3, 0);
        assert_eq!(flat.wall_border(|| WorldObject::wall(Color::Grey)), Ok(()));
        assert_eq!(flat.iter().count(), 0);

        let mut strip = ObjectGrid::new(3, 1);
        strip.wall_border(|| WorldObject::wall(Color::Grey)).unwrap();
        assert!(strip.iter().all(Option::is_some));
    }

    #[test]
    fn set_rejects_out_of_bounds() {
        let mut grid: Grid<u8> = Grid::new(2, 2);
        assert_eq!(
            grid.set(Position::new(2, 0), 1),
            Err(GridError::OutOfBounds {
                x: 2,
                y: 0,
                width: 2,
                height: 2
            })
        );
        grid.set(Position::new(1, 1), 7).unwrap();
        assert_eq!(grid[Position::new(1, 1)], 7);
        assert_eq!(grid.get(Position::new(0, 5)), None);
    }

    #[test]
    fn placing_records_positions() {
        let grid = sample();
        let t = grid.object_at(Position::new(1, 1)).unwrap();
        assert_eq!(t.init_pos, Some(Position::new(1, 1)));
        assert_eq!(t.cur_pos, Some(Position::new(1, 1)));
        assert_eq!(
            grid.object_at(Position::new(3, 2)).map(WorldObject::object_type),
            Some(ObjectType::Wall)
        );
    }

    #[test]
    fn encode_decode_preserves_layout() {
        let grid = sample();
        let cells = grid.encode();
        assert_eq!(cells.len(), 12);
        assert_eq!(cells[0], Encoding::new(2, 5, 0));
        assert_eq!(cells[5], Encoding::new(11, 5, 0));
        assert_eq!(cells[6], Encoding::new(4, 0, 2));

        let back = ObjectGrid::decode(4, 3, &cells).unwrap();
        assert_eq!(back, grid);
    }

    #[test]
    fn decode_reports_bad_cells() {
        let mut cells = vec![Encoding::empty(); 4];
        assert!(matches!(
            ObjectGrid::decode(2, 3, &cells),
            Err(GridError::SizeMismatch {
                expected: 6,
                found: 4
            })
        ));

        cells[3] = Encoding::new(2, 77, 0);
        assert_eq!(
            ObjectGrid::decode(2, 2, &cells),
            Err(GridError::Decode {
                position: Position::new(1, 1),
                source: DecodeError::Palette(PaletteError::UnknownColorIndex(77)),
            })
        );
    }

    #[test]
    fn unseen_cells_decode_empty() {
        let cells = [Encoding::new(0, 0, 0), Encoding::new(1, 3, 0)];
        let grid = ObjectGrid::decode(2, 1, &cells).unwrap();
        assert!(grid.iter().all(Option::is_none));
    }

    #[test]
    fn render_places_tiles_and_agent() {
        let mut grid = ObjectGrid::new(3, 3);
        grid.place(Position::new(2, 2), WorldObject::wall(Color::Blue))
            .unwrap();
        let frame = grid.render(8, Some((Position::new(1, 1), Direction::Right)));

        assert_eq!(frame.width(), 24);
        assert_eq!(frame.height(), 24);
        // Wall tile, away from its grid lines.
        assert_eq!(frame.pixel(21, 21), Some(Color::Blue.rgb()));
        // Empty tile interior; the grid line covers a third of the edge pixel.
        assert_eq!(frame.pixel(4, 4), Some(BLACK));
        assert_eq!(frame.pixel(0, 4), Some(GRID_LINE.map(|c| c / 3)));
        // Agent body in the middle tile.
        assert_eq!(frame.pixel(12, 12), Some(AGENT_COLOR));
    }
}
