// atlas_core/src/mapping/mod.rs

use crate::types::CellCoord;
use serde::{Deserialize, Serialize};

pub mod collision_map;
pub mod raycast;
pub mod snapshot;

pub use collision_map::{CollisionMap, IntegrationReport};
pub use snapshot::GridSnapshot;

/// Occupancy classification of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CellState {
    #[default]
    Unknown,
    Free,
    Occupied,
}

impl CellState {
    /// Single-character form used by snapshots and text rendering.
    pub fn as_char(self) -> char {
        match self {
            CellState::Unknown => '?',
            CellState::Free => '.',
            CellState::Occupied => '#',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '?' => Some(CellState::Unknown),
            '.' => Some(CellState::Free),
            '#' => Some(CellState::Occupied),
            _ => None,
        }
    }
}

/// Inclusive rectangle of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridBounds {
    pub min: CellCoord,
    pub max: CellCoord,
}

impl GridBounds {
    /// The smallest bounds containing both corners.
    pub fn new(a: CellCoord, b: CellCoord) -> Self {
        Self {
            min: CellCoord::new(a.x.min(b.x), a.y.min(b.y)),
            max: CellCoord::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn width(&self) -> usize {
        (self.max.x as i64 - self.min.x as i64 + 1) as usize
    }

    pub fn height(&self) -> usize {
        (self.max.y as i64 - self.min.y as i64 + 1) as usize
    }

    pub fn cell_count(&self) -> usize {
        self.width().saturating_mul(self.height())
    }

    pub fn contains(&self, cell: CellCoord) -> bool {
        cell.x >= self.min.x && cell.x <= self.max.x && cell.y >= self.min.y && cell.y <= self.max.y
    }

    pub fn contains_bounds(&self, other: &GridBounds) -> bool {
        self.contains(other.min) && self.contains(other.max)
    }

    /// Extends the bounds so that `cell` is inside.
    pub fn include(&mut self, cell: CellCoord) {
        self.min.x = self.min.x.min(cell.x);
        self.min.y = self.min.y.min(cell.y);
        self.max.x = self.max.x.max(cell.x);
        self.max.y = self.max.y.max(cell.y);
    }

    /// Row-major iteration, lowest `y` row first.
    pub fn iter(&self) -> impl Iterator<Item = CellCoord> {
        let (min, max) = (self.min, self.max);
        (min.y..=max.y).flat_map(move |y| (min.x..=max.x).map(move |x| CellCoord::new(x, y)))
    }
}

/// The closest reachable cell that borders unknown space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frontier {
    /// A known-free cell (or the start cell) adjacent to unknown space.
    pub cell: CellCoord,
    /// The unknown 4-neighbour of `cell` that made it a frontier.
    pub unknown_neighbor: CellCoord,
    /// 4-connected path from the search start to `cell`, both included.
    pub path: Vec<CellCoord>,
}

impl Frontier {
    /// Number of moves from the start to the frontier cell.
    pub fn depth(&self) -> usize {
        self.path.len().saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_include_and_iterate() {
        let mut bounds = GridBounds::new(CellCoord::new(1, 1), CellCoord::new(0, 0));
        bounds.include(CellCoord::new(-1, 0));
        assert_eq!(bounds.width(), 3);
        assert_eq!(bounds.height(), 2);
        let cells: Vec<_> = bounds.iter().collect();
        assert_eq!(cells.len(), 6);
        assert_eq!(cells[0], CellCoord::new(-1, 0));
        assert_eq!(cells[5], CellCoord::new(1, 1));
    }

    #[test]
    fn test_cell_symbols_round_trip() {
        for state in [CellState::Unknown, CellState::Free, CellState::Occupied] {
            assert_eq!(CellState::from_char(state.as_char()), Some(state));
        }
        assert_eq!(CellState::from_char('x'), None);
    }
}
