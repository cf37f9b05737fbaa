//! One streamed region of the map

use std::sync::Arc;

use crate::foundation::collections::WallSet;
use crate::foundation::math::Vec2;
use crate::render::layer_renderer::LayerRenderer;
use crate::render::tileset::Tileset;
use crate::scene::node::{DrawLayer, NodeId, SceneNode};
use crate::scene::tree::{SceneResult, SceneTree};
use crate::streaming::master::{ChunkData, ChunkMaster};
use crate::streaming::window::ChunkCoord;
use crate::streaming::ChunkError;
use crate::tilemap::parser::{parse_layers, promote_depth_tiles, LayerGrid, MapObject, PromotedTile};
use crate::tilemap::properties::TileCatalog;
use crate::world::tile_sprite::spawn_tile_sprites;

/// Read-only state shared by every chunk of a map
#[derive(Debug)]
pub struct ChunkContext {
    /// Chunk index
    pub master: Arc<ChunkMaster>,
    /// Tile properties and animations from the index's tileset
    pub catalog: Arc<TileCatalog>,
    /// Sliced tileset image
    pub tileset: Arc<Tileset>,
    /// Culling margin for animated tiles
    pub tile_padding: f32,
    /// Culling margin for promoted sprites
    pub sprite_padding: f32,
}

impl ChunkContext {
    /// Context for `master`, parsing its first tileset
    pub fn new(master: Arc<ChunkMaster>, tileset: Arc<Tileset>) -> Self {
        let catalog = Arc::new(TileCatalog::from_tilesets(&master.tilesets));
        Self {
            master,
            catalog,
            tileset,
            tile_padding: crate::render::layer_renderer::DEFAULT_TILE_PADDING,
            sprite_padding: crate::world::tile_sprite::DEFAULT_SPRITE_PADDING,
        }
    }

    /// Set culling margins
    pub fn with_padding(mut self, tile_padding: f32, sprite_padding: f32) -> Self {
        self.tile_padding = tile_padding;
        self.sprite_padding = sprite_padding;
        self
    }

    /// World position of a chunk's top-left corner
    pub fn origin_of(&self, coord: ChunkCoord) -> Vec2 {
        let size = self.master.chunk_pixel_size();
        Vec2::new(coord.x as f32 * size.x, coord.y as f32 * size.y)
    }
}

/// A decoded chunk that is not yet part of the scene
#[derive(Debug)]
pub struct ChunkContents {
    /// Cell coordinate
    pub coord: ChunkCoord,
    /// World position of the top-left corner
    pub world: Vec2,
    /// Static raster and animated layers
    pub renderer: LayerRenderer,
    /// Solid cells in world coordinates
    pub walls: WallSet,
    /// Depth tiles to spawn as sprites
    pub promoted: Vec<PromotedTile>,
    /// Objects in world coordinates
    pub objects: Vec<MapObject>,
}

impl ChunkContents {
    /// Decode a chunk file and pre-render its static layers
    pub fn from_slice(coord: ChunkCoord, bytes: &[u8], ctx: &ChunkContext) -> Result<Self, ChunkError> {
        let data: ChunkData = serde_json::from_slice(bytes)
            .map_err(|e| ChunkError::Decode(format!("chunk {coord}: {e}")))?;
        Ok(Self::build(coord, data, ctx))
    }

    /// Parse layers in world coordinates and pre-render static content
    pub fn build(coord: ChunkCoord, data: ChunkData, ctx: &ChunkContext) -> Self {
        if (data.x, data.y) != (coord.x, coord.y) {
            log::warn!("Chunk file for {coord} claims to be {},{}", data.x, data.y);
        }
        let master = &ctx.master;
        let world = ctx.origin_of(coord);
        let grid = LayerGrid::new(master.chunk_width, master.tile_width, master.tile_height).with_origin(world);

        let parsed = parse_layers(&data.layers, &grid, &ctx.catalog);
        let promoted = promote_depth_tiles(&parsed, &ctx.catalog);
        let renderer = LayerRenderer::new(
            Arc::clone(&ctx.tileset),
            Arc::clone(&ctx.catalog),
            world,
            master.chunk_pixel_extent(),
            parsed.layers,
            parsed.tile_objects,
        )
        .with_tile_padding(ctx.tile_padding);

        Self {
            coord,
            world,
            renderer,
            walls: parsed.walls,
            promoted,
            objects: parsed.objects,
        }
    }
}

/// An active chunk attached to the scene
#[derive(Debug)]
pub struct Chunk {
    coord: ChunkCoord,
    world: Vec2,
    node: NodeId,
    sprites: Vec<NodeId>,
    walls: WallSet,
    objects: Vec<MapObject>,
}

impl Chunk {
    /// Attach decoded contents under `parent`.
    ///
    /// The layer node is tagged as floor so ground tiles stay beneath every
    /// actor. Promoted sprites go directly under `parent` so they Y-sort
    /// against the actors living there. On error nothing stays attached.
    pub fn attach(
        contents: ChunkContents,
        tree: &mut SceneTree,
        parent: NodeId,
        ctx: &ChunkContext,
    ) -> SceneResult<Self> {
        let ChunkContents { coord, world, renderer, walls, promoted, objects } = contents;
        let node = tree.spawn(
            parent,
            SceneNode::new(Vec2::zeros())
                .with_draw_layer(DrawLayer::Floor)
                .with_component(renderer)
                .named(format!("chunk {coord}")),
        )?;
        let sprites = match spawn_tile_sprites(tree, parent, &promoted, &ctx.tileset, &ctx.catalog, ctx.sprite_padding)
        {
            Ok(sprites) => sprites,
            Err(e) => {
                if let Err(cleanup) = tree.destroy(node) {
                    log::warn!("Chunk {coord} node could not be removed: {cleanup}");
                }
                return Err(e);
            }
        };

        Ok(Self { coord, world, node, sprites, walls, objects })
    }

    /// Detach from the scene and free the raster and per-chunk sets
    pub fn destroy(mut self, tree: &mut SceneTree) {
        if let Some(renderer) = tree.component_mut::<LayerRenderer>(self.node) {
            renderer.release();
        }
        for id in self.sprites.drain(..).chain(std::iter::once(self.node)) {
            if let Err(e) = tree.destroy(id) {
                log::warn!("Chunk {} node already gone: {e}", self.coord);
            }
        }
        self.walls.clear();
        self.objects.clear();
    }

    /// Cell coordinate
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// World position of the top-left corner
    pub fn world(&self) -> Vec2 {
        self.world
    }

    /// Layer node
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Promoted sprite nodes
    pub fn sprites(&self) -> &[NodeId] {
        &self.sprites
    }

    /// Solid cells
    pub fn walls(&self) -> &WallSet {
        &self.walls
    }

    /// Objects in world coordinates
    pub fn objects(&self) -> &[MapObject] {
        &self.objects
    }
}
