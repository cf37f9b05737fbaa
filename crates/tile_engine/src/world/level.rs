//! Levels: one map worth of scene content plus its collision set
//!
//! A level either renders a whole [`TileMapDocument`] or streams a chunked
//! map through a [`ChunkStore`]. A document level given a chunk source
//! switches to streaming on its own once the parsed map turns out to be
//! larger than one chunk and the chunk index is readable.

use std::sync::Arc;

use crate::core::config::EngineConfig;
use crate::foundation::collections::WallSet;
use crate::foundation::math::Vec2;
use crate::render::camera::MapBounds;
use crate::render::layer_renderer::DocumentRenderer;
use crate::scene::node::{DrawLayer, NodeId, SceneNode};
use crate::scene::tree::SceneTree;
use crate::streaming::{ChunkMaster, ChunkSource, ChunkStore, FsChunkSource, LevelTarget};
use crate::tilemap::document::TileMapDocument;
use crate::tilemap::parser::MapObject;
use crate::world::tile_sprite::spawn_tile_sprites;
use crate::world::WorldError;

enum Content {
    /// Document waiting to be attached
    Document(Box<TileMapDocument>),
    /// Document renderer living at this node
    Attached(NodeId),
    /// Streaming
    Chunked(Box<ChunkStore>),
}

/// A playable area
pub struct Level {
    id: String,
    start: Vec2,
    config: EngineConfig,
    content: Content,
    node: Option<NodeId>,
    walls: WallSet,
    sprites: Vec<NodeId>,
    tiles_created: bool,
    chunk_source: Option<Arc<dyn ChunkSource>>,
    map_bounds: Option<MapBounds>,
}

impl Level {
    /// Level rendering a whole document
    pub fn from_document(id: impl Into<String>, document: TileMapDocument, start: Vec2, config: &EngineConfig) -> Self {
        Self::with_content(id, Content::Document(Box::new(document)), start, config)
    }

    /// Level streaming a chunked map
    pub fn chunked(id: impl Into<String>, store: ChunkStore, start: Vec2, config: &EngineConfig) -> Self {
        let bounds = store.master().map_pixel_size();
        let mut level = Self::with_content(id, Content::Chunked(Box::new(store)), start, config);
        level.map_bounds = Some(MapBounds::new(bounds.x, bounds.y));
        level.tiles_created = true;
        level
    }

    fn with_content(id: impl Into<String>, content: Content, start: Vec2, config: &EngineConfig) -> Self {
        Self {
            id: id.into(),
            start,
            config: config.clone(),
            content,
            node: None,
            walls: WallSet::new(),
            sprites: Vec::new(),
            tiles_created: false,
            chunk_source: None,
            map_bounds: None,
        }
    }

    /// Offer a chunk source to switch to if the map is large
    pub fn with_chunk_source(mut self, source: Arc<dyn ChunkSource>) -> Self {
        self.chunk_source = Some(source);
        self
    }

    /// Offer the configured chunk directory, if it holds an index
    pub fn with_configured_chunks(self) -> Self {
        let source = FsChunkSource::new(&self.config.chunks.chunks_path);
        if source.has_master() {
            self.with_chunk_source(Arc::new(source))
        } else {
            self
        }
    }

    /// Add the level to `tree` under `parent`.
    ///
    /// Chunked levels load the chunks around the start position before this
    /// returns.
    pub fn attach(&mut self, tree: &mut SceneTree, parent: NodeId) -> Result<NodeId, WorldError> {
        if self.node.is_some() {
            return Err(WorldError::AlreadyAttached(self.id.clone()));
        }
        let node = tree.spawn(parent, SceneNode::new(Vec2::zeros()).named(self.id.clone()))?;
        self.node = Some(node);

        let content = std::mem::replace(&mut self.content, Content::Attached(node));
        self.content = match content {
            Content::Document(document) => {
                let renderer = DocumentRenderer::new(*document).with_tile_padding(self.config.culling.tile_padding);
                let renderer_node = tree.spawn(
                    node,
                    SceneNode::new(Vec2::zeros())
                        .with_draw_layer(DrawLayer::Floor)
                        .with_component(renderer)
                        .named("tiles"),
                )?;
                Content::Attached(renderer_node)
            }
            Content::Chunked(mut store) => {
                let mut target = LevelTarget { tree, node, walls: &mut self.walls };
                store.load_initial_chunks(self.start.x, self.start.y, &mut target)?;
                Content::Chunked(store)
            }
            attached @ Content::Attached(_) => attached,
        };

        log::info!("Level '{}' attached", self.id);
        Ok(node)
    }

    /// Per-frame level work after the scene has stepped.
    ///
    /// Document levels copy walls and spawn depth sprites once the map has
    /// parsed. Chunked levels stream around `view_origin`, the world position
    /// of the viewport's top-left corner.
    pub fn step(&mut self, tree: &mut SceneTree, view_origin: Vec2) -> Result<(), WorldError> {
        let Some(node) = self.node else {
            return Ok(());
        };
        match &mut self.content {
            Content::Chunked(store) => {
                let mut target = LevelTarget { tree, node, walls: &mut self.walls };
                store.update(view_origin.x, view_origin.y, &mut target)?;
            }
            Content::Attached(renderer_node) => {
                let renderer_node = *renderer_node;
                if !self.tiles_created {
                    self.finish_document(tree, node, renderer_node)?;
                }
            }
            Content::Document(_) => {}
        }
        Ok(())
    }

    fn finish_document(&mut self, tree: &mut SceneTree, node: NodeId, renderer_node: NodeId) -> Result<(), WorldError> {
        let Some(renderer) = tree.component_mut::<DocumentRenderer>(renderer_node) else {
            return Err(WorldError::MissingRenderer(self.id.clone()));
        };
        if !renderer.sync() {
            return Ok(());
        }
        let document = renderer.document();
        let (width, height) = document.pixel_size();
        self.map_bounds = Some(MapBounds::new(width as f32, height as f32));

        if let Some(store) = self.detect_chunking(document) {
            tree.destroy(renderer_node)?;
            let mut store = Box::new(store);
            let mut target = LevelTarget { tree, node, walls: &mut self.walls };
            store.load_initial_chunks(self.start.x, self.start.y, &mut target)?;
            self.content = Content::Chunked(store);
            self.tiles_created = true;
            return Ok(());
        }

        self.walls = document.walls().clone();
        let promoted = document.promoted_tiles();
        let catalog = document.catalog();
        let Some(tileset) = document.tileset() else {
            return Ok(());
        };
        self.sprites = spawn_tile_sprites(
            tree,
            node,
            &promoted,
            &tileset,
            &catalog,
            self.config.culling.sprite_padding,
        )?;
        self.tiles_created = true;
        log::info!(
            "Level '{}' ready: {} walls, {} depth sprites",
            self.id,
            self.walls.len(),
            self.sprites.len()
        );
        Ok(())
    }

    /// A store for the chunked version of `document`, if there is one and
    /// the map is bigger than a chunk
    fn detect_chunking(&self, document: &TileMapDocument) -> Option<ChunkStore> {
        let source = self.chunk_source.as_ref()?;
        let bytes = match source.fetch_master() {
            Ok(bytes) => bytes,
            Err(e) => {
                log::debug!("No chunk index for level '{}': {e}", self.id);
                return None;
            }
        };
        let master = match ChunkMaster::from_slice(&bytes) {
            Ok(master) => master,
            Err(e) => {
                log::warn!("Chunk index unusable, using whole-map rendering: {e}");
                return None;
            }
        };
        if document.map_width() <= master.chunk_width && document.map_height() <= master.chunk_height {
            return None;
        }
        let tileset = document.tileset()?;
        if (tileset.tile_width(), tileset.tile_height()) != (master.tile_width, master.tile_height) {
            log::warn!(
                "Chunk index tile size {}x{} does not match the map's; using whole-map rendering",
                master.tile_width,
                master.tile_height
            );
            return None;
        }

        log::info!(
            "Map is {}x{} tiles - enabling chunking",
            document.map_width(),
            document.map_height()
        );
        Some(ChunkStore::new(Arc::clone(source), master, tileset, &self.config))
    }

    /// Remove the level from the scene and drop all collision data
    pub fn teardown(&mut self, tree: &mut SceneTree) -> Result<(), WorldError> {
        let Some(node) = self.node.take() else {
            return Ok(());
        };
        if let Content::Chunked(store) = &mut self.content {
            log::info!("Unloading all chunks...");
            let mut target = LevelTarget { tree, node, walls: &mut self.walls };
            store.unload_all(&mut target);
        }
        self.walls.clear();
        self.sprites.clear();
        if tree.contains(node) {
            tree.destroy(node)?;
        }
        log::info!("Level '{}' destroyed", self.id);
        Ok(())
    }

    /// Level name
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Where the camera target starts
    pub fn start_position(&self) -> Vec2 {
        self.start
    }

    /// Level node, once attached
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// Aggregate collision set
    pub fn walls(&self) -> &WallSet {
        &self.walls
    }

    /// Whether the tile cell at world `(x, y)` is solid
    pub fn is_wall(&self, x: i32, y: i32) -> bool {
        self.walls.is_wall(x, y)
    }

    /// Whether world `(x, y)` can be entered
    pub fn is_space_free(&self, x: f32, y: f32) -> bool {
        self.walls.is_space_free(x, y)
    }

    /// Map size, once known
    pub fn map_bounds(&self) -> Option<MapBounds> {
        self.map_bounds
    }

    /// Whether the level streams chunks
    pub fn is_chunked(&self) -> bool {
        matches!(self.content, Content::Chunked(_))
    }

    /// Whether walls and depth sprites are in place
    pub fn is_ready(&self) -> bool {
        self.tiles_created
    }

    /// Chunk store of a streaming level
    pub fn chunk_store(&self) -> Option<&ChunkStore> {
        match &self.content {
            Content::Chunked(store) => Some(store),
            _ => None,
        }
    }

    /// Depth sprites spawned from the document
    pub fn sprites(&self) -> &[NodeId] {
        &self.sprites
    }

    /// Objects of `kind`, from the document or the active chunks
    pub fn objects_by_type(&self, tree: &SceneTree, kind: &str) -> Vec<MapObject> {
        match &self.content {
            Content::Chunked(store) => store.objects_by_type(kind).into_iter().cloned().collect(),
            Content::Attached(renderer_node) => tree
                .component::<DocumentRenderer>(*renderer_node)
                .map(|r| r.document().get_objects_by_type(kind).into_iter().cloned().collect())
                .unwrap_or_default(),
            Content::Document(document) => document.get_objects_by_type(kind).into_iter().cloned().collect(),
        }
    }
}

impl std::fmt::Debug for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match &self.content {
            Content::Document(_) => "document (detached)",
            Content::Attached(_) => "document",
            Content::Chunked(_) => "chunked",
        };
        f.debug_struct("Level")
            .field("id", &self.id)
            .field("mode", &mode)
            .field("node", &self.node)
            .field("walls", &self.walls.len())
            .field("ready", &self.tiles_created)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ChunkConfig;
    use crate::streaming::{ChunkCoord, MemoryChunkSource};
    use crate::tilemap::format::MapData;
    use image::{Rgba, RgbaImage};
    use serde_json::json;

    fn map_json(width: u32, height: u32) -> MapData {
        let cells = (width * height) as usize;
        let mut ground = vec![1; cells];
        ground[1] = 2;
        let mut decor = vec![0; cells];
        decor[2] = 3;
        serde_json::from_value(json!({
            "width": width, "height": height, "tilewidth": 16, "tileheight": 16,
            "layers": [
                {"name": "ground", "type": "tilelayer", "width": width, "data": ground},
                {"name": "decor", "type": "tilelayer", "width": width, "data": decor},
                {"name": "things", "type": "objectgroup", "objects": [
                    {"id": 1, "name": "exit", "type": "exit", "x": 32, "y": 16}
                ]}
            ],
            "tilesets": [{"firstgid": 1, "name": "t", "tiles": [
                {"id": 1, "properties": [{"name": "collide", "type": "bool", "value": true}]},
                {"id": 2, "properties": [{"name": "depth", "type": "bool", "value": true}]}
            ]}]
        }))
        .unwrap()
    }

    fn image() -> RgbaImage {
        RgbaImage::from_pixel(48, 16, Rgba([200, 200, 200, 255]))
    }

    fn config() -> EngineConfig {
        EngineConfig::new()
            .with_viewport(64, 64)
            .with_chunks(ChunkConfig::default().with_worker_threads(0))
    }

    #[test]
    fn test_document_level_becomes_ready_once_parsed() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let document = TileMapDocument::from_data(map_json(4, 4), image());
        let mut level = Level::from_document("cave", document, Vec2::new(16.0, 16.0), &config());

        let node = level.attach(&mut tree, root).unwrap();
        assert!(!level.is_ready());
        level.step(&mut tree, Vec2::zeros()).unwrap();

        assert!(level.is_ready());
        assert!(level.is_wall(16, 0));
        assert!(!level.is_space_free(16.0, 0.0));
        assert!(level.is_space_free(0.0, 0.0));
        assert_eq!(level.sprites().len(), 1);
        assert_eq!(tree.node(node).unwrap().children().len(), 2);
        assert_eq!(level.map_bounds(), Some(MapBounds::new(64.0, 64.0)));
        assert_eq!(level.objects_by_type(&tree, "exit").len(), 1);

        // Later steps do not spawn again
        level.step(&mut tree, Vec2::zeros()).unwrap();
        assert_eq!(level.sprites().len(), 1);
    }

    #[test]
    fn test_teardown_removes_everything() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let document = TileMapDocument::from_data(map_json(4, 4), image());
        let mut level = Level::from_document("cave", document, Vec2::zeros(), &config());
        level.attach(&mut tree, root).unwrap();
        level.step(&mut tree, Vec2::zeros()).unwrap();

        level.teardown(&mut tree).unwrap();
        assert!(level.walls().is_empty());
        assert_eq!(tree.len(), 1);
        assert!(level.node().is_none());
    }

    #[test]
    fn test_attach_twice_is_rejected() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let document = TileMapDocument::from_data(map_json(2, 2), image());
        let mut level = Level::from_document("cave", document, Vec2::zeros(), &config());
        level.attach(&mut tree, root).unwrap();
        assert!(matches!(level.attach(&mut tree, root), Err(WorldError::AlreadyAttached(_))));
    }

    fn chunk_source(chunks: u32, chunk_tiles: u32) -> Arc<MemoryChunkSource> {
        let source = MemoryChunkSource::new();
        source.insert_master(
            json!({
                "chunkWidth": chunk_tiles, "chunkHeight": chunk_tiles, "chunksX": chunks, "chunksY": 1,
                "mapWidth": chunks * chunk_tiles, "mapHeight": chunk_tiles,
                "tileWidth": 16, "tileHeight": 16,
                "tilesets": [{"firstgid": 1, "tiles": [
                    {"id": 1, "properties": [{"name": "collide", "type": "bool", "value": true}]}
                ]}]
            })
            .to_string(),
        );
        for x in 0..chunks as i32 {
            let mut data = vec![1; (chunk_tiles * chunk_tiles) as usize];
            data[0] = 2;
            source.insert_chunk(
                ChunkCoord::new(x, 0),
                json!({"x": x, "y": 0, "layers": [
                    {"name": "ground", "type": "tilelayer", "width": chunk_tiles, "data": data}
                ]})
                .to_string(),
            );
        }
        Arc::new(source)
    }

    #[test]
    fn test_large_document_switches_to_chunks() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let document = TileMapDocument::from_data(map_json(8, 2), image());
        let mut level = Level::from_document("field", document, Vec2::zeros(), &config())
            .with_chunk_source(chunk_source(4, 2));
        level.attach(&mut tree, root).unwrap();
        level.step(&mut tree, Vec2::zeros()).unwrap();

        assert!(level.is_chunked());
        let store = level.chunk_store().unwrap();
        assert!(store.active_chunk_count() > 0);
        assert!(level.is_wall(0, 0));
        assert_eq!(level.walls().len(), store.active_chunk_count());

        level.teardown(&mut tree).unwrap();
        assert!(level.walls().is_empty());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_small_document_ignores_chunks() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let document = TileMapDocument::from_data(map_json(4, 4), image());
        let mut level = Level::from_document("room", document, Vec2::zeros(), &config())
            .with_chunk_source(chunk_source(1, 8));
        level.attach(&mut tree, root).unwrap();
        level.step(&mut tree, Vec2::zeros()).unwrap();

        assert!(!level.is_chunked());
        assert!(level.is_wall(16, 0));
    }

    #[test]
    fn test_chunked_level_streams() {
        let mut tree = SceneTree::new();
        let root = tree.root();
        let config = config();
        let source: Arc<dyn ChunkSource> = chunk_source(8, 4);
        let store = ChunkStore::open(source, Arc::new(image()), &config).unwrap();
        let mut level = Level::chunked("field", store, Vec2::zeros(), &config);

        level.attach(&mut tree, root).unwrap();
        assert_eq!(level.chunk_store().unwrap().active_chunk_count(), 3);
        assert_eq!(level.map_bounds(), Some(MapBounds::new(512.0, 64.0)));

        level.step(&mut tree, Vec2::new(256.0, 0.0)).unwrap();
        assert!(level.is_wall(256, 0));
        assert!(!level.is_wall(0, 0));
    }
}
