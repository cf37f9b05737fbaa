//! Chunk coordinates and the required-chunk window

use std::fmt;

use crate::foundation::math::{utils, Vec2};
use crate::streaming::master::ChunkMaster;

/// Chunk cell coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    /// Column
    pub x: i32,
    /// Row
    pub y: i32,
}

impl ChunkCoord {
    /// Create a coordinate
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Inclusive rectangle of chunk coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkWindow {
    /// First column
    pub min_x: i32,
    /// Last column
    pub max_x: i32,
    /// First row
    pub min_y: i32,
    /// Last row
    pub max_y: i32,
}

impl ChunkWindow {
    /// Whether `coord` lies inside
    pub fn contains(&self, coord: ChunkCoord) -> bool {
        coord.x >= self.min_x && coord.x <= self.max_x && coord.y >= self.min_y && coord.y <= self.max_y
    }

    /// No cells
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        ((self.max_x - self.min_x + 1) * (self.max_y - self.min_y + 1)) as usize
    }

    /// Cells row by row
    pub fn iter(&self) -> impl Iterator<Item = ChunkCoord> {
        let (min_x, max_x) = (self.min_x, self.max_x);
        (self.min_y..=self.max_y).flat_map(move |y| (min_x..=max_x).map(move |x| ChunkCoord::new(x, y)))
    }
}

/// Geometry needed to map world positions onto chunk cells
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkGrid {
    chunk_size: Vec2,
    chunks_x: i32,
    chunks_y: i32,
    viewport: Vec2,
    margin: u32,
}

impl ChunkGrid {
    /// Grid for `master` seen through a `viewport`, loading `margin` extra
    /// chunks on each side
    pub fn new(master: &ChunkMaster, viewport: Vec2, margin: u32) -> Self {
        Self {
            chunk_size: master.chunk_pixel_size(),
            chunks_x: master.chunks_x as i32,
            chunks_y: master.chunks_y as i32,
            viewport,
            margin,
        }
    }

    /// Chunk size in pixels
    pub fn chunk_size(&self) -> Vec2 {
        self.chunk_size
    }

    /// Cell containing a world position
    pub fn coord_at(&self, x: f32, y: f32) -> ChunkCoord {
        ChunkCoord::new(
            utils::floor_div(x, self.chunk_size.x),
            utils::floor_div(y, self.chunk_size.y),
        )
    }

    /// World position of a cell's top-left corner
    pub fn origin_of(&self, coord: ChunkCoord) -> Vec2 {
        Vec2::new(coord.x as f32 * self.chunk_size.x, coord.y as f32 * self.chunk_size.y)
    }

    /// Cells covering the viewport at `(x, y)` plus the margin, clamped to
    /// the map
    pub fn required_window(&self, x: f32, y: f32) -> ChunkWindow {
        let margin_x = self.margin as f32 * self.chunk_size.x;
        let margin_y = self.margin as f32 * self.chunk_size.y;

        let min_x = ((x - margin_x) / self.chunk_size.x).floor() as i32;
        let max_x = ((x + self.viewport.x + margin_x) / self.chunk_size.x).ceil() as i32;
        let min_y = ((y - margin_y) / self.chunk_size.y).floor() as i32;
        let max_y = ((y + self.viewport.y + margin_y) / self.chunk_size.y).ceil() as i32;

        ChunkWindow {
            min_x: min_x.max(0),
            max_x: max_x.min(self.chunks_x - 1),
            min_y: min_y.max(0),
            max_y: max_y.min(self.chunks_y - 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn master(chunks_x: u32, chunks_y: u32) -> ChunkMaster {
        ChunkMaster {
            version: None,
            chunk_width: 64,
            chunk_height: 64,
            chunks_x,
            chunks_y,
            map_width: chunks_x * 64,
            map_height: chunks_y * 64,
            tile_width: 16,
            tile_height: 16,
            tilesets: Vec::new(),
            infinite: false,
        }
    }

    #[test]
    fn test_coord_floor_division() {
        let grid = ChunkGrid::new(&master(4, 4), Vec2::new(768.0, 432.0), 1);
        assert_eq!(grid.coord_at(0.0, 0.0), ChunkCoord::new(0, 0));
        assert_eq!(grid.coord_at(1023.9, 1024.0), ChunkCoord::new(0, 1));
        assert_eq!(grid.coord_at(-1.0, -1.0), ChunkCoord::new(-1, -1));
        assert_eq!(grid.origin_of(ChunkCoord::new(2, 1)), Vec2::new(2048.0, 1024.0));
    }

    #[test]
    fn test_window_at_origin() {
        let grid = ChunkGrid::new(&master(2, 2), Vec2::new(768.0, 432.0), 1);
        let window = grid.required_window(0.0, 0.0);
        assert_eq!(window, ChunkWindow { min_x: 0, max_x: 1, min_y: 0, max_y: 1 });
        assert_eq!(window.len(), 4);
    }

    #[test]
    fn test_window_clamps_to_map() {
        let grid = ChunkGrid::new(&master(8, 8), Vec2::new(768.0, 432.0), 1);
        let window = grid.required_window(4000.0, 4000.0);
        // floor(2976 / 1024) = 2, ceil(5792 / 1024) = 6
        assert_eq!((window.min_x, window.max_x), (2, 6));

        let far = grid.required_window(100_000.0, 0.0);
        assert!(far.is_empty());
        assert_eq!(far.iter().count(), 0);
    }

    #[test]
    fn test_window_iteration_order() {
        let window = ChunkWindow { min_x: 0, max_x: 1, min_y: 0, max_y: 1 };
        let cells: Vec<_> = window.iter().collect();
        assert_eq!(
            cells,
            vec![ChunkCoord::new(0, 0), ChunkCoord::new(1, 0), ChunkCoord::new(0, 1), ChunkCoord::new(1, 1)]
        );
        assert!(window.contains(ChunkCoord::new(1, 1)));
        assert!(!window.contains(ChunkCoord::new(2, 1)));
    }
}
