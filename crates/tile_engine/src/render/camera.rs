//! # Dead-Zone Camera
//!
//! Screen-space camera that follows a target only once it leaves a central
//! dead-zone rectangle, then clamps the view so it never shows past the map
//! edges.
//!
//! ## Conventions
//! - `position` is the **render offset**: world content is drawn at
//!   `world + position`, so the visible world origin is `-position`
//! - Dead-zone sizes are half extents around the viewport centre
//! - The target is tracked at its centre, `target_half_size` pixels right of
//!   and below its position

use crate::core::config::{CameraConfig, DisplayConfig};
use crate::foundation::math::{Rect, Vec2};

/// Map size in pixels used for clamping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapBounds {
    /// Map width in pixels
    pub width: f32,
    /// Map height in pixels
    pub height: f32,
}

impl MapBounds {
    /// Create bounds
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Camera that tracks a target with a dead zone
///
/// # Example
/// ```rust
/// use tile_engine::foundation::math::Vec2;
/// use tile_engine::render::camera::{CameraController, MapBounds};
///
/// let mut camera = CameraController::new(768.0, 432.0)
///     .with_map_bounds(MapBounds::new(2048.0, 2048.0));
/// camera.center_on(Vec2::new(400.0, 300.0));
/// camera.update_with_dead_zone(Vec2::new(480.0, 300.0));
/// assert!(camera.position().x <= 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct CameraController {
    position: Vec2,
    viewport: Vec2,
    dead_zone: Vec2,
    target_half_size: f32,
    map_bounds: Option<MapBounds>,
}

impl CameraController {
    /// Create a camera for a `width` x `height` viewport with the default
    /// 40x30 dead zone and an 8px target half size
    pub fn new(width: f32, height: f32) -> Self {
        let defaults = CameraConfig::default();
        Self {
            position: Vec2::zeros(),
            viewport: Vec2::new(width, height),
            dead_zone: Vec2::new(defaults.dead_zone_width, defaults.dead_zone_height),
            target_half_size: defaults.target_half_size,
            map_bounds: None,
        }
    }

    /// Create a camera from engine configuration
    ///
    /// # Arguments
    /// * `display` - Viewport dimensions
    /// * `camera` - Dead-zone half extents and target half size
    pub fn from_config(display: &DisplayConfig, camera: &CameraConfig) -> Self {
        Self {
            position: Vec2::zeros(),
            viewport: Vec2::new(display.viewport_width as f32, display.viewport_height as f32),
            dead_zone: Vec2::new(camera.dead_zone_width, camera.dead_zone_height),
            target_half_size: camera.target_half_size,
            map_bounds: None,
        }
    }

    /// Set the dead-zone half extents
    pub fn with_dead_zone(mut self, half_width: f32, half_height: f32) -> Self {
        self.dead_zone = Vec2::new(half_width, half_height);
        self
    }

    /// Set the map size used for clamping
    pub fn with_map_bounds(mut self, bounds: MapBounds) -> Self {
        self.map_bounds = Some(bounds);
        self
    }

    /// Replace or clear the map bounds
    pub fn set_map_bounds(&mut self, bounds: Option<MapBounds>) {
        self.map_bounds = bounds;
    }

    /// Current render offset
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Overwrite the render offset
    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    /// Viewport size in pixels
    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    /// World coordinate of the viewport's top-left corner
    pub fn view_origin(&self) -> Vec2 {
        -self.position
    }

    /// World rectangle currently visible
    pub fn visible_world_rect(&self) -> Rect {
        let origin = self.view_origin();
        Rect::new(origin.x, origin.y, self.viewport.x, self.viewport.y)
    }

    /// Follow `target` if it has left the dead zone.
    ///
    /// On each axis independently, the camera shifts by exactly the distance
    /// the target's screen position lies outside the dead zone. The result is
    /// clamped to the map bounds and rounded to whole pixels.
    ///
    /// # Arguments
    /// * `target` - Target position in world space
    pub fn update_with_dead_zone(&mut self, target: Vec2) {
        let screen = target + self.position + Vec2::repeat(self.target_half_size);
        let center = self.viewport / 2.0;
        let (left, right) = (center.x - self.dead_zone.x, center.x + self.dead_zone.x);
        let (top, bottom) = (center.y - self.dead_zone.y, center.y + self.dead_zone.y);

        if screen.x < left {
            self.position.x += left - screen.x;
        } else if screen.x > right {
            self.position.x -= screen.x - right;
        }

        if screen.y < top {
            self.position.y += top - screen.y;
        } else if screen.y > bottom {
            self.position.y -= screen.y - bottom;
        }

        self.clamp_to_map_bounds();
        self.position.x = self.position.x.round();
        self.position.y = self.position.y.round();
        log::trace!("Camera offset {:?} for target {:?}", self.position, target);
    }

    /// Place `target`'s centre at the viewport centre immediately, bypassing
    /// the dead zone. Map clamping still applies.
    pub fn center_on(&mut self, target: Vec2) {
        let half = self.viewport / 2.0 - Vec2::repeat(self.target_half_size);
        self.position = -target + half;
        self.clamp_to_map_bounds();
        self.position.x = self.position.x.round();
        self.position.y = self.position.y.round();
        log::debug!("Camera centred on {:?}, offset {:?}", target, self.position);
    }

    /// Keep the view inside the map on every axis where the map is larger
    /// than the viewport. Smaller axes are left untouched.
    pub fn clamp_to_map_bounds(&mut self) {
        let Some(bounds) = self.map_bounds else {
            return;
        };
        if bounds.width > self.viewport.x {
            let min_x = -(bounds.width - self.viewport.x);
            self.position.x = self.position.x.clamp(min_x, 0.0);
        }
        if bounds.height > self.viewport.y {
            let min_y = -(bounds.height - self.viewport.y);
            self.position.y = self.position.y.clamp(min_y, 0.0);
        }
    }
}
