//! Software compositor over an RGBA image

use image::{GenericImageView, Pixel, Rgba, RgbaImage};

use crate::render::context::DrawContext;
use crate::render::tileset::Tileset;
use crate::tilemap::format::{TileFlip, TileRef};

/// CPU draw target
#[derive(Debug, Clone)]
pub struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    /// Transparent canvas
    pub fn new(width: u32, height: u32) -> Self {
        Self { image: RgbaImage::new(width, height) }
    }

    /// Fill with transparent black
    pub fn clear(&mut self) {
        self.fill(Rgba([0, 0, 0, 0]));
    }

    /// Fill with one colour
    pub fn fill(&mut self, color: Rgba<u8>) {
        for pixel in self.image.pixels_mut() {
            *pixel = color;
        }
    }

    /// Borrow the pixels
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Take the pixels
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    fn blend_at(&mut self, x: i64, y: i64, src: Rgba<u8>, opacity: f32) {
        if x < 0 || y < 0 || x >= i64::from(self.image.width()) || y >= i64::from(self.image.height()) {
            return;
        }
        let mut src = src;
        if opacity < 1.0 {
            src.0[3] = (f32::from(src.0[3]) * opacity.max(0.0)).round() as u8;
        }
        if src.0[3] == 0 {
            return;
        }
        self.image.get_pixel_mut(x as u32, y as u32).blend(&src);
    }
}

/// Map a destination pixel inside a flipped tile back to its source pixel.
///
/// The editor applies the diagonal flip first, then horizontal, then
/// vertical, so the inverse runs in the opposite order.
pub(crate) fn flipped_source(flip: TileFlip, x: u32, y: u32, width: u32, height: u32) -> (u32, u32) {
    let (mut sx, mut sy) = (x, y);
    if flip.contains(TileFlip::VERTICAL) {
        sy = height - 1 - sy;
    }
    if flip.contains(TileFlip::HORIZONTAL) {
        sx = width - 1 - sx;
    }
    if flip.contains(TileFlip::DIAGONAL) {
        std::mem::swap(&mut sx, &mut sy);
    }
    (sx, sy)
}

impl DrawContext for Canvas {
    fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn draw_tile(&mut self, tileset: &Tileset, tile: TileRef, x: f32, y: f32, opacity: f32) {
        let (w, h) = (tileset.tile_width(), tileset.tile_height());
        if tileset.source_origin(tile.id).is_none() {
            log::trace!("Tile {} is outside the tileset", tile.id);
            return;
        }
        let (ox, oy) = (x.round() as i64, y.round() as i64);
        for dy in 0..h {
            for dx in 0..w {
                let (sx, sy) = flipped_source(tile.flip, dx, dy, w, h);
                if let Some(src) = tileset.pixel(tile.id, sx, sy) {
                    self.blend_at(ox + i64::from(dx), oy + i64::from(dy), src, opacity);
                }
            }
        }
    }

    fn draw_raster(&mut self, raster: &RgbaImage, x: f32, y: f32, opacity: f32) {
        let (ox, oy) = (x.round() as i64, y.round() as i64);
        // Only the part of the raster that lands on the canvas is visited
        let x0 = (-ox).clamp(0, i64::from(raster.width()));
        let y0 = (-oy).clamp(0, i64::from(raster.height()));
        let x1 = (i64::from(self.image.width()) - ox).clamp(0, i64::from(raster.width()));
        let y1 = (i64::from(self.image.height()) - oy).clamp(0, i64::from(raster.height()));
        if x1 <= x0 || y1 <= y0 {
            return;
        }
        let visible = raster.view(x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32);
        for (dx, dy, src) in visible.pixels() {
            self.blend_at(ox + x0 + i64::from(dx), oy + y0 + i64::from(dy), src, opacity);
        }
    }
}
