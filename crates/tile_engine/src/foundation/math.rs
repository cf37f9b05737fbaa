//! Math utilities and types
//!
//! Provides the 2D math types used by the scene graph, camera and tile
//! renderers. Screen space and world space are both Y-down, in pixels.

pub use nalgebra::Vector2;

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// Axis-aligned rectangle in pixel space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Width in pixels
    pub width: f32,
    /// Height in pixels
    pub height: f32,
}

impl Rect {
    /// Create a new rectangle from its top-left corner and size
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Right edge (exclusive)
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Bottom edge (exclusive)
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Grow the rectangle by `padding` on every side
    pub fn expanded(&self, padding: f32) -> Self {
        Self {
            x: self.x - padding,
            y: self.y - padding,
            width: self.width + padding * 2.0,
            height: self.height + padding * 2.0,
        }
    }

    /// Check whether two rectangles overlap.
    ///
    /// Touching edges count as overlapping, so a tile that ends exactly on
    /// the padded canvas border is still drawn.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x <= other.right()
            && self.right() >= other.x
            && self.y <= other.bottom()
            && self.bottom() >= other.y
    }
}

/// Math utility functions
pub mod utils {
    /// Floor-divide a world coordinate by a cell size.
    ///
    /// Negative coordinates land in negative cells (`-1.0 / 16.0 -> -1`).
    pub fn floor_div(value: f32, cell: f32) -> i32 {
        (value / cell).floor() as i32
    }
}
