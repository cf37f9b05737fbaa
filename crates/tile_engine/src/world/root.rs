//! Composing root
//!
//! Frame order:
//! 1. Deliver due events (camera reacts to level changes and target moves)
//! 2. Step the scene tree
//! 3. Let the level stream chunks around the camera
//!
//! Rendering draws the world at the camera offset, then the LIGHTS pass in
//! world space, then the HUD pass in screen space.

use crate::core::config::EngineConfig;
use crate::events::{EventSystem, GameEvent};
use crate::foundation::collections::WallSet;
use crate::foundation::math::Vec2;
use crate::render::camera::CameraController;
use crate::render::DrawContext;
use crate::scene::component::FrameInfo;
use crate::scene::node::{DrawLayer, NodeId};
use crate::scene::tree::SceneTree;
use crate::world::level::Level;
use crate::world::WorldError;

/// Scene, camera, level and events for one running game
#[derive(Debug)]
pub struct World {
    config: EngineConfig,
    tree: SceneTree,
    camera: CameraController,
    level: Option<Level>,
    events: EventSystem,
    camera_target: Option<NodeId>,
}

impl World {
    /// Empty world; fails if `config` does not validate
    pub fn new(config: EngineConfig) -> Result<Self, WorldError> {
        config.validate()?;
        let camera = CameraController::from_config(&config.display, &config.camera);
        Ok(Self {
            config,
            tree: SceneTree::new(),
            camera,
            level: None,
            events: EventSystem::new(),
            camera_target: None,
        })
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Scene tree
    pub fn tree(&self) -> &SceneTree {
        &self.tree
    }

    /// Scene tree, mutably
    pub fn tree_mut(&mut self) -> &mut SceneTree {
        &mut self.tree
    }

    /// Camera
    pub fn camera(&self) -> &CameraController {
        &self.camera
    }

    /// Camera, mutably
    pub fn camera_mut(&mut self) -> &mut CameraController {
        &mut self.camera
    }

    /// Event queue
    pub fn events(&mut self) -> &mut EventSystem {
        &mut self.events
    }

    /// Current level
    pub fn level(&self) -> Option<&Level> {
        self.level.as_ref()
    }

    /// Node actors of the current level should be spawned under
    pub fn level_node(&self) -> Option<NodeId> {
        self.level.as_ref().and_then(Level::node)
    }

    /// Follow `node` with the dead-zone camera every frame
    pub fn set_camera_target(&mut self, node: Option<NodeId>) {
        self.camera_target = node;
    }

    /// Replace the current level.
    ///
    /// The old level is torn down first. The camera adopts the new map's
    /// bounds when they are known and centres on the start position.
    pub fn set_level(&mut self, mut level: Level) -> Result<(), WorldError> {
        if let Some(mut old) = self.level.take() {
            old.teardown(&mut self.tree)?;
        }
        self.camera_target = None;
        self.events.clear();

        let root = self.tree.root();
        level.attach(&mut self.tree, root)?;
        let start = level.start_position();
        self.camera.set_map_bounds(level.map_bounds());
        self.camera.center_on(start);
        log::info!("Level changed to '{}'", level.id());
        self.level = Some(level);

        self.events.send(GameEvent::LevelChanged { start });
        Ok(())
    }

    /// Remove the current level, if any
    pub fn clear_level(&mut self) -> Result<(), WorldError> {
        if let Some(mut level) = self.level.take() {
            level.teardown(&mut self.tree)?;
        }
        self.camera.set_map_bounds(None);
        Ok(())
    }

    /// Advance one frame
    pub fn tick(&mut self, delta_ms: f32) -> Result<(), WorldError> {
        self.events.advance_time(f64::from(delta_ms));
        for event in self.events.drain_due() {
            match &event {
                GameEvent::LevelChanged { start } => self.camera.center_on(*start),
                GameEvent::TargetMoved(target) => self.camera.update_with_dead_zone(*target),
                GameEvent::PositionUpdate { .. } | GameEvent::AttributeUpdate { .. } => {}
            }
            self.events.forward(&event);
        }

        if let Some(target) = self.camera_target {
            if self.tree.contains(target) {
                let position = self.tree.world_position(target)?;
                self.camera.update_with_dead_zone(position);
            } else {
                self.camera_target = None;
            }
        }

        let frame = FrameInfo::new(delta_ms, self.camera.viewport()).with_camera_offset(self.camera.position());
        let root = self.tree.root();
        self.tree.step_entry(root, &frame)?;

        if let Some(level) = self.level.as_mut() {
            let had_bounds = level.map_bounds().is_some();
            level.step(&mut self.tree, self.camera.view_origin())?;
            if !had_bounds && level.map_bounds().is_some() {
                self.camera.set_map_bounds(level.map_bounds());
                self.camera.clamp_to_map_bounds();
            }
        }
        Ok(())
    }

    /// Draw the frame
    pub fn render(&mut self, ctx: &mut dyn DrawContext) -> Result<(), WorldError> {
        let offset = self.camera.position();
        let root = self.tree.root();
        self.tree.draw(root, ctx, offset.x, offset.y)?;
        self.tree.draw_layer_pass(root, DrawLayer::Lights, ctx, offset.x, offset.y)?;
        self.tree.draw_layer_pass(root, DrawLayer::Hud, ctx, 0.0, 0.0)?;
        Ok(())
    }

    /// Collision set of the current level
    pub fn walls(&self) -> Option<&WallSet> {
        self.level.as_ref().map(Level::walls)
    }

    /// Whether world `(x, y)` can be entered; true with no level
    pub fn is_space_free(&self, x: f32, y: f32) -> bool {
        self.level.as_ref().map_or(true, |level| level.is_space_free(x, y))
    }

    /// Queue a camera target move for the next tick
    pub fn target_moved(&mut self, position: Vec2) {
        self.events.send(GameEvent::TargetMoved(position));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::render::draw_list::{DrawCommand, DrawList};
    use crate::scene::component::{Drawable, Steppable};
    use crate::scene::node::SceneNode;
    use crate::tilemap::document::TileMapDocument;
    use crate::tilemap::format::MapData;
    use approx::assert_relative_eq;
    use image::{Rgba, RgbaImage};
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Draws a raster whose width identifies it
    struct Marker {
        image: RgbaImage,
    }

    impl Marker {
        fn new(width: u32) -> Self {
            Self { image: RgbaImage::from_pixel(width, 1, Rgba([255, 0, 0, 255])) }
        }
    }

    impl Steppable for Marker {}

    impl Drawable for Marker {
        fn draw(&self, ctx: &mut dyn DrawContext, x: f32, y: f32) {
            ctx.draw_raster(&self.image, x, y, 1.0);
        }
    }

    fn document(width: u32, height: u32) -> TileMapDocument {
        let map: MapData = serde_json::from_value(json!({
            "width": width, "height": height, "tilewidth": 16, "tileheight": 16,
            "layers": [{"name": "ground", "type": "tilelayer", "width": width,
                        "data": vec![1; (width * height) as usize]}],
            "tilesets": [{"firstgid": 1, "tiles": []}]
        }))
        .unwrap();
        TileMapDocument::from_data(map, RgbaImage::from_pixel(16, 16, Rgba([0, 80, 0, 255])))
    }

    fn world_with_level(width: u32, height: u32, start: Vec2) -> World {
        let config = EngineConfig::new().with_viewport(160, 120);
        let mut world = World::new(config.clone()).unwrap();
        let level = Level::from_document("field", document(width, height), start, &config);
        world.set_level(level).unwrap();
        world.tick(16.0).unwrap();
        world
    }

    fn raster_widths(list: &DrawList) -> Vec<(u32, f32, f32)> {
        list.commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Raster { x, y, width, .. } => Some((*width, *x, *y)),
                DrawCommand::Tile { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_level_change_centres_camera() {
        let world = world_with_level(40, 40, Vec2::new(320.0, 320.0));
        // 80 - 8 - 320 on x, 60 - 8 - 320 on y
        assert_relative_eq!(world.camera().position().x, -248.0);
        assert_relative_eq!(world.camera().position().y, -268.0);
        assert!(world.level().unwrap().is_ready());
    }

    #[test]
    fn test_camera_is_clamped_to_map() {
        let world = world_with_level(40, 40, Vec2::new(0.0, 0.0));
        assert_relative_eq!(world.camera().position().x, 0.0);
        assert_relative_eq!(world.camera().position().y, 0.0);
    }

    #[test]
    fn test_target_moves_drive_dead_zone() {
        let mut world = world_with_level(40, 40, Vec2::new(320.0, 320.0));
        let before = world.camera().position();

        world.target_moved(Vec2::new(330.0, 320.0));
        world.tick(16.0).unwrap();
        assert_eq!(world.camera().position(), before);

        world.target_moved(Vec2::new(400.0, 320.0));
        world.tick(16.0).unwrap();
        assert_relative_eq!(world.camera().position().x, before.x - 40.0);
    }

    #[test]
    fn test_followed_node_moves_camera() {
        let mut world = world_with_level(40, 40, Vec2::new(320.0, 320.0));
        let level = world.level_node().unwrap();
        let hero = world
            .tree_mut()
            .spawn(level, SceneNode::at(320.0, 320.0).dynamic())
            .unwrap();
        world.set_camera_target(Some(hero));
        let before = world.camera().position();

        world.tree_mut().set_position(hero, Vec2::new(320.0, 400.0)).unwrap();
        world.tick(16.0).unwrap();
        assert_relative_eq!(world.camera().position().y, before.y - 50.0);
    }

    #[test]
    fn test_render_passes() {
        let mut world = world_with_level(10, 10, Vec2::new(0.0, 0.0));
        let level = world.level_node().unwrap();
        let root = world.tree().root();
        let tree = world.tree_mut();
        tree.spawn(root, SceneNode::at(5.0, 5.0).with_draw_layer(DrawLayer::Hud).with_component(Marker::new(3)))
            .unwrap();
        tree.spawn(level, SceneNode::at(20.0, 20.0).with_draw_layer(DrawLayer::Lights).with_component(Marker::new(2)))
            .unwrap();
        tree.spawn(level, SceneNode::at(30.0, 30.0).with_component(Marker::new(1))).unwrap();

        let mut list = DrawList::new(160, 120);
        world.render(&mut list).unwrap();
        let widths: Vec<u32> = raster_widths(&list).iter().map(|(w, _, _)| *w).collect();
        // Map raster, actor, lights, HUD
        assert_eq!(widths, vec![160, 1, 2, 3]);
    }

    #[test]
    fn test_hud_ignores_camera() {
        let mut world = world_with_level(40, 40, Vec2::new(320.0, 320.0));
        let root = world.tree().root();
        world
            .tree_mut()
            .spawn(root, SceneNode::at(5.0, 5.0).with_draw_layer(DrawLayer::Hud).with_component(Marker::new(3)))
            .unwrap();

        let mut list = DrawList::new(160, 120);
        world.render(&mut list).unwrap();
        let hud = raster_widths(&list).into_iter().find(|(w, _, _)| *w == 3).unwrap();
        assert_relative_eq!(hud.1, 5.0);
        assert_relative_eq!(hud.2, 5.0);
    }

    #[test]
    fn test_set_level_replaces_previous() {
        let config = EngineConfig::new().with_viewport(160, 120);
        let mut world = World::new(config.clone()).unwrap();
        world
            .set_level(Level::from_document("a", document(4, 4), Vec2::zeros(), &config))
            .unwrap();
        world.tick(16.0).unwrap();
        let first = world.level_node().unwrap();

        world
            .set_level(Level::from_document("b", document(4, 4), Vec2::zeros(), &config))
            .unwrap();
        assert!(!world.tree().contains(first));
        assert_eq!(world.level().unwrap().id(), "b");
        assert_eq!(world.tree().node(world.tree().root()).unwrap().children().len(), 1);
    }

    #[test]
    fn test_external_handlers_see_events() {
        let mut world = world_with_level(4, 4, Vec2::zeros());
        let seen = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&seen);
        world.events().register_handler(
            EventKind::TargetMoved,
            Box::new(move |_: &GameEvent| {
                *counter.borrow_mut() += 1;
                false
            }),
        );
        world.target_moved(Vec2::new(1.0, 1.0));
        world.tick(16.0).unwrap();
        assert_eq!(*seen.borrow(), 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(matches!(
            World::new(EngineConfig::new().with_viewport(0, 0)),
            Err(WorldError::Config(_))
        ));
    }
}
