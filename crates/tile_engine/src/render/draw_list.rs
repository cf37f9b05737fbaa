//! Recording draw target
//!
//! Captures draw calls instead of rasterizing them. Used by tests and as the
//! hand-off point for an external GPU backend.

use image::RgbaImage;

use crate::render::context::DrawContext;
use crate::render::tileset::Tileset;
use crate::tilemap::format::TileRef;

/// One recorded draw call
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawCommand {
    /// A single tile
    Tile {
        /// Tile and orientation
        tile: TileRef,
        /// Screen X
        x: f32,
        /// Screen Y
        y: f32,
        /// Opacity
        opacity: f32,
    },
    /// A pre-rasterized image
    Raster {
        /// Screen X
        x: f32,
        /// Screen Y
        y: f32,
        /// Image width
        width: u32,
        /// Image height
        height: u32,
        /// Opacity
        opacity: f32,
    },
}

/// Draw target that records every call
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    width: u32,
    height: u32,
    commands: Vec<DrawCommand>,
}

impl DrawList {
    /// Empty list for a `width` x `height` target
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, commands: Vec::new() }
    }

    /// Recorded commands in call order
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Tile ids drawn, in call order
    pub fn tile_ids(&self) -> Vec<u32> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Tile { tile, .. } => Some(tile.id),
                DrawCommand::Raster { .. } => None,
            })
            .collect()
    }

    /// Number of raster blits
    pub fn raster_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Raster { .. }))
            .count()
    }

    /// Forget everything recorded
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Number of commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Nothing recorded
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl DrawContext for DrawList {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn draw_tile(&mut self, _tileset: &Tileset, tile: TileRef, x: f32, y: f32, opacity: f32) {
        self.commands.push(DrawCommand::Tile { tile, x, y, opacity });
    }

    fn draw_raster(&mut self, raster: &RgbaImage, x: f32, y: f32, opacity: f32) {
        self.commands.push(DrawCommand::Raster {
            x,
            y,
            width: raster.width(),
            height: raster.height(),
            opacity,
        });
    }
}
