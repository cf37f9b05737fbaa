//! Specialized collection types

use std::collections::HashSet;

pub use slotmap::{SlotMap, new_key_type};

/// Hashable world-position key packing two `i32` pixel coordinates into one `u64`.
///
/// X occupies the high 32 bits and Y the low 32 bits, so keys from
/// neighbouring chunks never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PositionKey(u64);

impl PositionKey {
    /// Pack a pixel position
    pub const fn new(x: i32, y: i32) -> Self {
        Self(((x as u32 as u64) << 32) | (y as u32 as u64))
    }

    /// Pack a floating point position, rounding to the nearest pixel
    pub fn from_world(x: f32, y: f32) -> Self {
        Self::new(x.round() as i32, y.round() as i32)
    }

    /// X coordinate
    pub const fn x(self) -> i32 {
        (self.0 >> 32) as u32 as i32
    }

    /// Y coordinate
    pub const fn y(self) -> i32 {
        self.0 as u32 as i32
    }

    /// Raw packed value
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Collision membership set over world-position keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WallSet {
    cells: HashSet<PositionKey>,
}

impl WallSet {
    /// Create an empty wall set
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a cell solid
    pub fn insert(&mut self, key: PositionKey) -> bool {
        self.cells.insert(key)
    }

    /// Clear a cell; returns whether it was solid
    pub fn remove(&mut self, key: PositionKey) -> bool {
        self.cells.remove(&key)
    }

    /// Check membership of a packed key
    pub fn contains(&self, key: PositionKey) -> bool {
        self.cells.contains(&key)
    }

    /// Check whether the cell whose top-left pixel is `(x, y)` is a wall
    pub fn is_wall(&self, x: i32, y: i32) -> bool {
        self.contains(PositionKey::new(x, y))
    }

    /// Inverse of [`WallSet::is_wall`] for a floating point position
    pub fn is_space_free(&self, x: f32, y: f32) -> bool {
        !self.contains(PositionKey::from_world(x, y))
    }

    /// Add every cell of `other`
    pub fn extend_from(&mut self, other: &WallSet) {
        self.cells.extend(other.cells.iter().copied());
    }

    /// Number of solid cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True when no cell is solid
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Remove every cell
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Iterate over solid cells in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = PositionKey> + '_ {
        self.cells.iter().copied()
    }
}

impl FromIterator<PositionKey> for WallSet {
    fn from_iter<I: IntoIterator<Item = PositionKey>>(iter: I) -> Self {
        Self { cells: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_key_roundtrip_negative() {
        let key = PositionKey::new(-16, 2048);
        assert_eq!(key.x(), -16);
        assert_eq!(key.y(), 2048);
        assert_ne!(PositionKey::new(1, 0), PositionKey::new(0, 1));
    }

    #[test]
    fn test_wall_set_queries() {
        let mut walls = WallSet::new();
        walls.insert(PositionKey::new(32, 48));
        assert!(walls.is_wall(32, 48));
        assert!(!walls.is_space_free(32.0, 48.0));
        assert!(walls.is_space_free(48.0, 48.0));

        let mut merged = WallSet::new();
        merged.extend_from(&walls);
        merged.insert(PositionKey::new(0, 0));
        assert_eq!(merged.len(), 2);
    }
}
