//! Depth tiles promoted to individual Y-sorted sprites

use std::sync::Arc;

use crate::foundation::math::{Rect, Vec2};
use crate::render::context::DrawContext;
use crate::render::tileset::Tileset;
use crate::scene::component::{Drawable, FrameInfo, Steppable};
use crate::scene::node::{NodeId, SceneNode};
use crate::scene::tree::{SceneResult, SceneTree};
use crate::tilemap::animation::AnimationState;
use crate::tilemap::format::TileRef;
use crate::tilemap::parser::PromotedTile;
use crate::tilemap::properties::{PropertyBag, TileCatalog};

/// Default culling margin around sprites
pub const DEFAULT_SPRITE_PADDING: f32 = 32.0;

/// Pixels the sort anchor sits above the tile's bottom edge, so an actor
/// standing on the same row does not flicker in front and behind
const SORT_BIAS: f32 = 2.0;

/// A single tile drawn as its own scene node.
///
/// The node sits at the bottom edge of the tile so it sorts against actors
/// by their feet; the tile itself is drawn one tile height above.
#[derive(Debug)]
pub struct TileSprite {
    tile: TileRef,
    current_tile: u32,
    tileset: Arc<Tileset>,
    catalog: Arc<TileCatalog>,
    animation: Option<AnimationState>,
    anchor: Vec2,
    properties: PropertyBag,
    name: Option<String>,
    sprite_padding: f32,
}

impl TileSprite {
    /// Sprite for a promoted tile
    pub fn new(promoted: &PromotedTile, tileset: Arc<Tileset>, catalog: Arc<TileCatalog>) -> Self {
        let anchor = Self::anchor_for(promoted, tileset.tile_height());
        let animation = catalog.animation(promoted.tile.id).map(|_| AnimationState::default());
        let mut sprite = Self {
            tile: promoted.tile,
            current_tile: promoted.tile.id,
            tileset,
            catalog,
            animation,
            anchor,
            properties: promoted.properties.clone(),
            name: promoted.name.clone(),
            sprite_padding: DEFAULT_SPRITE_PADDING,
        };
        sprite.refresh_frame();
        sprite
    }

    /// Node position for a promoted tile
    pub fn anchor_for(promoted: &PromotedTile, tile_height: u32) -> Vec2 {
        Vec2::new(promoted.x, promoted.y + tile_height as f32 - SORT_BIAS)
    }

    /// Set the culling margin
    pub fn with_sprite_padding(mut self, padding: f32) -> Self {
        self.sprite_padding = padding;
        self
    }

    /// Wrap in a static scene node at the sort anchor
    pub fn into_node(self) -> SceneNode {
        let node = SceneNode::new(self.anchor);
        let node = match &self.name {
            Some(name) => node.named(name.clone()),
            None => node,
        };
        let node = if self.properties.collides() { node.solid() } else { node };
        node.with_component(self)
    }

    /// Tile shown right now
    pub fn current_tile(&self) -> u32 {
        self.current_tile
    }

    /// Properties carried from the map
    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    /// Object name, for object-layer tiles
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn refresh_frame(&mut self) {
        self.current_tile = match (&self.animation, self.catalog.animation(self.tile.id)) {
            (Some(state), Some(animation)) => state.current_tile(animation).unwrap_or(self.tile.id),
            _ => self.tile.id,
        };
    }

    fn is_off_screen(&self, frame: &FrameInfo) -> bool {
        let (tw, th) = (self.tileset.tile_width() as f32, self.tileset.tile_height() as f32);
        let body = Rect::new(self.anchor.x, self.anchor.y - th, tw, th);
        !frame
            .visible_world_rect()
            .expanded(self.sprite_padding)
            .intersects(&body)
    }
}

impl Steppable for TileSprite {
    fn step(&mut self, delta_ms: f32, frame: &FrameInfo) {
        if self.animation.is_none() || self.is_off_screen(frame) {
            return;
        }
        let changed = match (self.animation.as_mut(), self.catalog.animation(self.tile.id)) {
            (Some(state), Some(animation)) => state.advance(animation, delta_ms),
            _ => false,
        };
        if changed {
            self.refresh_frame();
        }
    }
}

impl Drawable for TileSprite {
    fn draw(&self, ctx: &mut dyn DrawContext, x: f32, y: f32) {
        let (tw, th) = (self.tileset.tile_width() as f32, self.tileset.tile_height() as f32);
        let top = y - th;
        if !ctx.is_visible(x, top, tw, th, self.sprite_padding) {
            return;
        }
        let tile = TileRef { id: self.current_tile, flip: self.tile.flip };
        ctx.draw_tile(&self.tileset, tile, x, top, 1.0);
    }
}

/// Spawn one sprite node per promoted tile under `parent`.
///
/// Either every sprite is spawned or none is.
pub fn spawn_tile_sprites(
    tree: &mut SceneTree,
    parent: NodeId,
    promoted: &[PromotedTile],
    tileset: &Arc<Tileset>,
    catalog: &Arc<TileCatalog>,
    sprite_padding: f32,
) -> SceneResult<Vec<NodeId>> {
    let mut ids = Vec::with_capacity(promoted.len());
    for tile in promoted {
        let sprite = TileSprite::new(tile, Arc::clone(tileset), Arc::clone(catalog)).with_sprite_padding(sprite_padding);
        match tree.spawn(parent, sprite.into_node()) {
            Ok(id) => ids.push(id),
            Err(e) => {
                for id in ids {
                    if let Err(cleanup) = tree.destroy(id) {
                        log::warn!("Tile sprite could not be removed: {cleanup}");
                    }
                }
                return Err(e);
            }
        }
    }
    Ok(ids)
}
