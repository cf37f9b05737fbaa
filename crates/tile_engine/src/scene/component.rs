//! Behaviour attached to scene nodes
//!
//! A node *has* a component rather than *being* a subclass. Components
//! implement [`Steppable`] for per-frame logic and [`Drawable`] for
//! rendering; [`Component`] is implemented automatically for anything that
//! provides both.

use std::any::Any;

use crate::foundation::math::{Rect, Vec2};
use crate::render::DrawContext;

/// Per-frame information handed to every [`Steppable::step`] call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    /// Time since the previous frame in milliseconds
    pub delta_ms: f32,
    /// Current camera render offset (negative of the visible world origin)
    pub camera_offset: Vec2,
    /// Viewport size in pixels
    pub viewport: Vec2,
}

impl FrameInfo {
    /// Frame info with a camera at the origin
    pub fn new(delta_ms: f32, viewport: Vec2) -> Self {
        Self {
            delta_ms,
            camera_offset: Vec2::zeros(),
            viewport,
        }
    }

    /// Set the camera offset
    pub fn with_camera_offset(mut self, offset: Vec2) -> Self {
        self.camera_offset = offset;
        self
    }

    /// World-space rectangle currently visible
    pub fn visible_world_rect(&self) -> Rect {
        Rect::new(-self.camera_offset.x, -self.camera_offset.y, self.viewport.x, self.viewport.y)
    }
}

/// Per-frame update hook
pub trait Steppable {
    /// Called exactly once, on the first step after the node is created
    fn ready(&mut self) {}

    /// Called every frame after all children have stepped
    fn step(&mut self, _delta_ms: f32, _frame: &FrameInfo) {}
}

/// Rendering hook
pub trait Drawable {
    /// Draw at the node's absolute draw position
    fn draw(&self, _ctx: &mut dyn DrawContext, _x: f32, _y: f32) {}
}

/// Type-erased node behaviour
pub trait Component: Steppable + Drawable + Any {
    /// Downcast support
    fn as_any(&self) -> &dyn Any;
    /// Mutable downcast support
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Steppable + Drawable + Any> Component for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
