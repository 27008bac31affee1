//! Hexagonal placement grid.
//!
//! Coordinates are axial `(q, r)`. The grid maps each occupied coordinate to
//! the [`TileId`] sitting there; it holds no tile data itself. Iteration is in
//! coordinate order (q, then r), which the engine relies on for determinism.

use crate::id::TileId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// HexCoord
// ---------------------------------------------------------------------------

/// Axial hex coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HexCoord {
    pub q: i32,
    pub r: i32,
}

impl HexCoord {
    pub const ORIGIN: HexCoord = HexCoord { q: 0, r: 0 };

    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// Implicit third cube coordinate.
    pub fn s(self) -> i64 {
        -i64::from(self.q) - i64::from(self.r)
    }

    /// The adjacent coordinate one step in `dir`.
    ///
    /// Panics on coordinate overflow; use [`HexCoord::checked_neighbor`] for
    /// cells that may sit at the edge of the `i32` range.
    pub fn neighbor(self, dir: HexDirection) -> HexCoord {
        let (dq, dr) = dir.offset();
        HexCoord::new(self.q + dq, self.r + dr)
    }

    /// The adjacent coordinate in `dir`, or `None` past the `i32` range.
    pub fn checked_neighbor(self, dir: HexDirection) -> Option<HexCoord> {
        let (dq, dr) = dir.offset();
        Some(HexCoord::new(
            self.q.checked_add(dq)?,
            self.r.checked_add(dr)?,
        ))
    }

    /// Hex distance in steps.
    pub fn distance(self, other: HexCoord) -> u64 {
        let dq = (i64::from(self.q) - i64::from(other.q)).unsigned_abs();
        let dr = (i64::from(self.r) - i64::from(other.r)).unsigned_abs();
        let ds = (self.s() - other.s()).unsigned_abs();
        dq.max(dr).max(ds)
    }

    /// The direction leading from `self` to an adjacent `other`.
    pub fn direction_to(self, other: HexCoord) -> Option<HexDirection> {
        HexDirection::ALL
            .into_iter()
            .find(|d| self.checked_neighbor(*d) == Some(other))
    }
}

impl fmt::Display for HexCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.q, self.r)
    }
}

// ---------------------------------------------------------------------------
// HexDirection
// ---------------------------------------------------------------------------

/// The six axial directions, listed counter-clockwise starting east.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HexDirection {
    East,
    NorthEast,
    NorthWest,
    West,
    SouthWest,
    SouthEast,
}

impl HexDirection {
    /// Neighbor scan order used by routing.
    pub const ALL: [HexDirection; 6] = [
        HexDirection::East,
        HexDirection::NorthEast,
        HexDirection::NorthWest,
        HexDirection::West,
        HexDirection::SouthWest,
        HexDirection::SouthEast,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(i: usize) -> HexDirection {
        Self::ALL[i % 6]
    }

    pub fn offset(self) -> (i32, i32) {
        match self {
            HexDirection::East => (1, 0),
            HexDirection::NorthEast => (1, -1),
            HexDirection::NorthWest => (0, -1),
            HexDirection::West => (-1, 0),
            HexDirection::SouthWest => (-1, 1),
            HexDirection::SouthEast => (0, 1),
        }
    }

    pub fn opposite(self) -> HexDirection {
        Self::from_index(self.index() + 3)
    }

    pub fn rotate_clockwise(self) -> HexDirection {
        Self::from_index(self.index() + 5)
    }

    pub fn rotate_counter_clockwise(self) -> HexDirection {
        Self::from_index(self.index() + 1)
    }

    pub fn name(self) -> &'static str {
        match self {
            HexDirection::East => "east",
            HexDirection::NorthEast => "north_east",
            HexDirection::NorthWest => "north_west",
            HexDirection::West => "west",
            HexDirection::SouthWest => "south_west",
            HexDirection::SouthEast => "south_east",
        }
    }

    pub fn from_name(name: &str) -> Option<HexDirection> {
        Self::ALL.into_iter().find(|d| d.name() == name)
    }
}

impl fmt::Display for HexDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HexDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| s.to_string())
    }
}

// ---------------------------------------------------------------------------
// HexGrid
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("position {0} is outside the grid")]
    OutOfBounds(HexCoord),
    #[error("position {0} is already occupied")]
    Occupied(HexCoord),
}

/// Coordinate to tile mapping, optionally bounded to a hexagon of `radius`
/// around the origin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HexGrid {
    radius: Option<u32>,
    cells: BTreeMap<HexCoord, TileId>,
}

impl HexGrid {
    /// A hexagonal grid of the given radius around the origin.
    pub fn with_radius(radius: u32) -> Self {
        Self {
            radius: Some(radius),
            cells: BTreeMap::new(),
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn radius(&self) -> Option<u32> {
        self.radius
    }

    pub fn in_bounds(&self, coord: HexCoord) -> bool {
        self.radius
            .is_none_or(|r| coord.distance(HexCoord::ORIGIN) <= u64::from(r))
    }

    pub fn place(&mut self, coord: HexCoord, id: TileId) -> Result<(), GridError> {
        if !self.in_bounds(coord) {
            return Err(GridError::OutOfBounds(coord));
        }
        if self.cells.contains_key(&coord) {
            return Err(GridError::Occupied(coord));
        }
        self.cells.insert(coord, id);
        Ok(())
    }

    pub fn remove(&mut self, coord: HexCoord) -> Option<TileId> {
        self.cells.remove(&coord)
    }

    pub fn tile_at(&self, coord: HexCoord) -> Option<TileId> {
        self.cells.get(&coord).copied()
    }

    pub fn is_occupied(&self, coord: HexCoord) -> bool {
        self.cells.contains_key(&coord)
    }

    /// The in-bounds neighbor in `dir`, occupied or not.
    pub fn neighbor(&self, coord: HexCoord, dir: HexDirection) -> Option<HexCoord> {
        coord
            .checked_neighbor(dir)
            .filter(|n| self.in_bounds(*n))
    }

    /// In-bounds neighbors in [`HexDirection::ALL`] order.
    pub fn neighbors_of(&self, coord: HexCoord) -> Vec<HexCoord> {
        HexDirection::ALL
            .into_iter()
            .filter_map(|d| self.neighbor(coord, d))
            .collect()
    }

    /// Occupied cells in coordinate order.
    pub fn iter(&self) -> impl Iterator<Item = (HexCoord, TileId)> + '_ {
        self.cells.iter().map(|(c, id)| (*c, *id))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }
}
