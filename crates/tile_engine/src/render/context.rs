//! Draw target abstraction
//!
//! Everything in the scene renders through [`DrawContext`]. The crate ships a
//! software [`Canvas`](crate::render::Canvas) and a recording
//! [`DrawList`](crate::render::DrawList); a GPU backend implements the same
//! trait.

use image::RgbaImage;

use crate::foundation::math::Rect;
use crate::render::tileset::Tileset;
use crate::tilemap::format::TileRef;

/// 2D draw target in screen pixels
pub trait DrawContext {
    /// Target size in pixels
    fn size(&self) -> (u32, u32);

    /// Draw one tile with its top-left corner at `(x, y)`
    fn draw_tile(&mut self, tileset: &Tileset, tile: TileRef, x: f32, y: f32, opacity: f32);

    /// Draw a pre-rasterized image with its top-left corner at `(x, y)`
    fn draw_raster(&mut self, raster: &RgbaImage, x: f32, y: f32, opacity: f32);

    /// Screen rectangle of the target
    fn bounds(&self) -> Rect {
        let (w, h) = self.size();
        Rect::new(0.0, 0.0, w as f32, h as f32)
    }

    /// Whether a `width` x `height` box at `(x, y)` grown by `padding`
    /// touches the target
    fn is_visible(&self, x: f32, y: f32, width: f32, height: f32, padding: f32) -> bool {
        self.bounds().intersects(&Rect::new(x, y, width, height).expanded(padding))
    }
}
