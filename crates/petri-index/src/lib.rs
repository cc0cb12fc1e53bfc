//! Grid geometry and the dense occupancy index used for sensing and
//! collision resolution.
//!
//! The world is a finite rectangle of cells addressed by [`GridPos`]. An
//! [`OccupancyGrid`] maps each cell to at most one occupant handle, with
//! bounds-checked lookups so callers can probe positions that may lie
//! outside the world and simply get `None` back.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from occupancy-grid construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// The requested grid has a zero-sized dimension.
    #[error("grid dimensions must be non-zero (got {width}x{height})")]
    ZeroDimension { width: u16, height: u16 },
}

/// A cell coordinate. Signed so that transient out-of-bounds positions
/// (produced by movement before clamping) are representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i16,
    pub y: i16,
}

impl GridPos {
    #[must_use]
    pub const fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }

    /// The position one cell away along `dir`.
    #[must_use]
    pub fn step(self, dir: Direction) -> Self {
        let (dx, dy) = dir.delta();
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Clamp both coordinates into `size`.
    #[must_use]
    pub fn clamped(self, size: GridSize) -> Self {
        Self {
            x: self.x.clamp(0, size.width as i16 - 1),
            y: self.y.clamp(0, size.height as i16 - 1),
        }
    }
}

/// Extent of the world grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSize {
    pub width: u16,
    pub height: u16,
}

impl GridSize {
    #[must_use]
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub fn contains(self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u16) < self.width && (pos.y as u16) < self.height
    }

    #[must_use]
    pub fn cell_count(self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// An axis-aligned rectangle of cells, inclusive of both corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i16,
    pub y: i16,
    pub width: i16,
    pub height: i16,
}

impl Rect {
    #[must_use]
    pub const fn new(x: i16, y: i16, width: i16, height: i16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    pub fn contains(self, pos: GridPos) -> bool {
        pos.x >= self.x
            && pos.x <= self.x + self.width
            && pos.y >= self.y
            && pos.y <= self.y + self.height
    }
}

/// One of the eight compass directions an organism can face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];

    /// Unit cell offset for this direction. North is negative y.
    #[must_use]
    pub const fn delta(self) -> (i16, i16) {
        match self {
            Direction::North => (0, -1),
            Direction::NorthEast => (1, -1),
            Direction::East => (1, 0),
            Direction::SouthEast => (1, 1),
            Direction::South => (0, 1),
            Direction::SouthWest => (-1, 1),
            Direction::West => (-1, 0),
            Direction::NorthWest => (-1, -1),
        }
    }

    #[must_use]
    pub const fn turned_left(self) -> Self {
        Self::ALL[(self as usize + 7) % 8]
    }

    #[must_use]
    pub const fn turned_right(self) -> Self {
        Self::ALL[(self as usize + 1) % 8]
    }

    #[must_use]
    pub const fn reversed(self) -> Self {
        Self::ALL[(self as usize + 4) % 8]
    }

    /// Uniformly random direction.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..8)]
    }
}

/// Dense cell→occupant table. At most one occupant handle per cell; a
/// later insert into an occupied cell replaces the earlier handle.
#[derive(Debug, Clone)]
pub struct OccupancyGrid<H> {
    size: GridSize,
    cells: Vec<Option<H>>,
}

impl<H: Copy> OccupancyGrid<H> {
    pub fn new(size: GridSize) -> Result<Self, IndexError> {
        if size.width == 0 || size.height == 0 {
            return Err(IndexError::ZeroDimension {
                width: size.width,
                height: size.height,
            });
        }
        Ok(Self {
            size,
            cells: vec![None; size.cell_count()],
        })
    }

    #[must_use]
    pub fn size(&self) -> GridSize {
        self.size
    }

    /// Remove every occupant, retaining allocation.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            *cell = None;
        }
    }

    fn cell_index(&self, pos: GridPos) -> Option<usize> {
        if self.size.contains(pos) {
            Some(pos.y as usize * self.size.width as usize + pos.x as usize)
        } else {
            None
        }
    }

    /// Occupant of `pos`, or `None` if the cell is free or `pos` lies
    /// outside the grid.
    #[must_use]
    pub fn get(&self, pos: GridPos) -> Option<H> {
        self.cell_index(pos).and_then(|i| self.cells[i])
    }

    #[must_use]
    pub fn is_occupied(&self, pos: GridPos) -> bool {
        self.get(pos).is_some()
    }

    /// Record `handle` at `pos`, returning the displaced occupant if any.
    /// Out-of-bounds inserts are a caller bug.
    pub fn insert(&mut self, pos: GridPos, handle: H) -> Option<H> {
        let idx = self
            .cell_index(pos)
            .unwrap_or_else(|| panic!("insert outside grid at ({}, {})", pos.x, pos.y));
        self.cells[idx].replace(handle)
    }

    /// Clear a single cell, returning its occupant if any.
    pub fn remove(&mut self, pos: GridPos) -> Option<H> {
        self.cell_index(pos).and_then(|i| self.cells[i].take())
    }

    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn zero_dimension_rejected() {
        let err = OccupancyGrid::<u16>::new(GridSize::new(0, 4)).unwrap_err();
        assert!(matches!(err, IndexError::ZeroDimension { .. }));
    }

    #[test]
    fn out_of_bounds_lookup_is_none() {
        let grid = OccupancyGrid::<u16>::new(GridSize::new(4, 4)).unwrap();
        assert_eq!(grid.get(GridPos::new(-1, 0)), None);
        assert_eq!(grid.get(GridPos::new(0, 4)), None);
        assert_eq!(grid.get(GridPos::new(4, 0)), None);
    }

    #[test]
    fn insert_replaces_previous_occupant() {
        let mut grid = OccupancyGrid::new(GridSize::new(4, 4)).unwrap();
        let pos = GridPos::new(2, 3);
        assert_eq!(grid.insert(pos, 7u16), None);
        assert_eq!(grid.insert(pos, 9u16), Some(7));
        assert_eq!(grid.get(pos), Some(9));
    }

    #[test]
    fn clear_retains_size() {
        let mut grid = OccupancyGrid::new(GridSize::new(3, 3)).unwrap();
        grid.insert(GridPos::new(1, 1), 1u16);
        grid.clear();
        assert_eq!(grid.occupied_count(), 0);
        assert_eq!(grid.size(), GridSize::new(3, 3));
    }

    #[test]
    fn direction_turns_compose() {
        for dir in Direction::ALL {
            assert_eq!(dir.turned_left().turned_right(), dir);
            assert_eq!(dir.reversed().reversed(), dir);
            let (dx, dy) = dir.delta();
            let (rx, ry) = dir.reversed().delta();
            assert_eq!((dx + rx, dy + ry), (0, 0));
        }
    }

    #[test]
    fn random_direction_is_valid() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..64 {
            let dir = Direction::random(&mut rng);
            assert!(Direction::ALL.contains(&dir));
        }
    }

    #[test]
    fn rect_contains_is_corner_inclusive() {
        let rect = Rect::new(2, 2, 3, 3);
        assert!(rect.contains(GridPos::new(2, 2)));
        assert!(rect.contains(GridPos::new(5, 5)));
        assert!(!rect.contains(GridPos::new(6, 5)));
        assert!(!rect.contains(GridPos::new(1, 2)));
    }

    #[test]
    fn clamp_pins_to_edges() {
        let size = GridSize::new(8, 8);
        assert_eq!(GridPos::new(-3, 9).clamped(size), GridPos::new(0, 7));
        assert_eq!(GridPos::new(5, 5).clamped(size), GridPos::new(5, 5));
    }
}
