//! Tileset atlas

use std::sync::Arc;

use image::{Rgba, RgbaImage};

use crate::assets::AssetError;

/// Tileset image sliced into a grid of equally sized tiles
#[derive(Debug, Clone)]
pub struct Tileset {
    image: Arc<RgbaImage>,
    tile_width: u32,
    tile_height: u32,
    columns: u32,
    rows: u32,
}

impl Tileset {
    /// Slice `image` into `tile_width` x `tile_height` tiles
    pub fn new(image: Arc<RgbaImage>, tile_width: u32, tile_height: u32) -> Result<Self, AssetError> {
        if tile_width == 0 || tile_height == 0 {
            return Err(AssetError::InvalidData(format!(
                "Tile size must be non-zero, got {tile_width}x{tile_height}"
            )));
        }
        let columns = image.width() / tile_width;
        let rows = image.height() / tile_height;
        if columns == 0 || rows == 0 {
            return Err(AssetError::InvalidData(format!(
                "Tileset image {}x{} is smaller than one {tile_width}x{tile_height} tile",
                image.width(),
                image.height()
            )));
        }
        Ok(Self { image, tile_width, tile_height, columns, rows })
    }

    /// Tile width in pixels
    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    /// Tile height in pixels
    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    /// Tiles per row
    pub fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of tiles in the atlas
    pub fn tile_count(&self) -> u32 {
        self.columns * self.rows
    }

    /// Backing image
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Top-left pixel of `tile_id` in the atlas
    pub fn source_origin(&self, tile_id: u32) -> Option<(u32, u32)> {
        if tile_id >= self.tile_count() {
            return None;
        }
        Some((
            (tile_id % self.columns) * self.tile_width,
            (tile_id / self.columns) * self.tile_height,
        ))
    }

    /// Pixel at tile-local `(x, y)`
    pub fn pixel(&self, tile_id: u32, x: u32, y: u32) -> Option<Rgba<u8>> {
        if x >= self.tile_width || y >= self.tile_height {
            return None;
        }
        let (sx, sy) = self.source_origin(tile_id)?;
        Some(*self.image.get_pixel(sx + x, sy + y))
    }
}
