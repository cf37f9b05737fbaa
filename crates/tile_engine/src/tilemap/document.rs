//! Whole-map document

use std::sync::Arc;

use image::RgbaImage;
use thiserror::Error;

use crate::assets::{AssetError, AssetLoader, Resource};
use crate::foundation::collections::WallSet;
use crate::render::tileset::Tileset;
use crate::tilemap::animation::Animation;
use crate::tilemap::format::MapData;
use crate::tilemap::parser::{
    parse_layers, promote_depth_tiles, LayerGrid, MapObject, ParsedLayers, PromotedTile, TileLayer,
    TileObject,
};
use crate::tilemap::properties::{PropertyBag, TileCatalog};

/// Map document errors
#[derive(Error, Debug)]
pub enum MapError {
    /// The document or its tileset image failed to load
    #[error("Map source '{name}' failed to load: {reason}")]
    Source {
        /// Resource name
        name: String,
        /// Underlying failure
        reason: String,
    },

    /// Header values that make the map unusable
    #[error("Invalid map geometry: {0}")]
    InvalidGeometry(String),

    /// Tileset image could not be sliced
    #[error("Invalid tileset: {0}")]
    Tileset(#[from] AssetError),
}

/// A parsed tile map.
///
/// Starts out holding two pending resources, the JSON document and the
/// tileset image. [`TileMapDocument::parse`] does nothing until both have
/// loaded and nothing after it has succeeded once.
#[derive(Debug)]
pub struct TileMapDocument {
    map: Resource<MapData>,
    image: Resource<RgbaImage>,
    parsed: bool,
    error: Option<String>,
    tile_width: u32,
    tile_height: u32,
    map_width: u32,
    map_height: u32,
    layers: Vec<TileLayer>,
    objects: Vec<MapObject>,
    tile_objects: Vec<TileObject>,
    catalog: Arc<TileCatalog>,
    tileset: Option<Arc<Tileset>>,
    walls: WallSet,
}

impl TileMapDocument {
    /// Document over two resources that may still be loading
    pub fn new(map: Resource<MapData>, image: Resource<RgbaImage>) -> Self {
        Self {
            map,
            image,
            parsed: false,
            error: None,
            tile_width: 0,
            tile_height: 0,
            map_width: 0,
            map_height: 0,
            layers: Vec::new(),
            objects: Vec::new(),
            tile_objects: Vec::new(),
            catalog: Arc::new(TileCatalog::new()),
            tileset: None,
            walls: WallSet::new(),
        }
    }

    /// Start loading `map_path` and `image_path` in the background
    pub fn load(loader: &AssetLoader, map_path: &str, image_path: &str) -> Self {
        Self::new(loader.map(map_path), loader.image(image_path))
    }

    /// Document over data already in memory
    pub fn from_data(map: MapData, image: RgbaImage) -> Self {
        Self::new(Resource::ready("map", map), Resource::ready("tileset", image))
    }

    /// Both sources are available
    pub fn is_loaded(&self) -> bool {
        self.map.is_loaded() && self.image.is_loaded()
    }

    /// Parsing has completed
    pub fn is_parsed(&self) -> bool {
        self.parsed
    }

    /// Why the document cannot be parsed, if it cannot
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Parse once both sources are loaded.
    ///
    /// Returns whether the document is parsed after the call. A failed
    /// source is reported once at error level and the document stays empty.
    pub fn parse(&mut self) -> bool {
        if self.parsed || self.error.is_some() {
            return self.parsed;
        }
        match self.try_parse() {
            Ok(true) => {
                self.parsed = true;
                log::info!(
                    "Parsed map {}x{} tiles: {} layers, {} objects, {} walls",
                    self.map_width,
                    self.map_height,
                    self.layers.len(),
                    self.objects.len(),
                    self.walls.len()
                );
            }
            Ok(false) => {}
            Err(e) => {
                log::error!("Map cannot be rendered: {e}");
                self.error = Some(e.to_string());
            }
        }
        self.parsed
    }

    fn try_parse(&mut self) -> Result<bool, MapError> {
        if let Some(failed) = source_error(&self.map).or_else(|| source_error(&self.image)) {
            return Err(failed);
        }
        let (Some(map), Some(image)) = (self.map.get(), self.image.get()) else {
            return Ok(false);
        };
        if map.tile_width == 0 || map.tile_height == 0 {
            return Err(MapError::InvalidGeometry(format!(
                "tile size {}x{}",
                map.tile_width, map.tile_height
            )));
        }

        let tileset = Tileset::new(image, map.tile_width, map.tile_height)?;
        let catalog = TileCatalog::from_tilesets(&map.tilesets);
        let grid = LayerGrid::new(map.width, map.tile_width, map.tile_height);
        let parsed = parse_layers(&map.layers, &grid, &catalog);

        self.tile_width = map.tile_width;
        self.tile_height = map.tile_height;
        self.map_width = map.width;
        self.map_height = map.height;
        self.layers = parsed.layers;
        self.objects = parsed.objects;
        self.tile_objects = parsed.tile_objects;
        self.walls = parsed.walls;
        self.catalog = Arc::new(catalog);
        self.tileset = Some(Arc::new(tileset));
        Ok(true)
    }

    /// Properties of `tile_id`; empty when it has none
    pub fn get_tile_properties(&self, tile_id: u32) -> &PropertyBag {
        self.catalog.properties(tile_id)
    }

    /// Animation of `tile_id`
    pub fn get_animation(&self, tile_id: u32) -> Option<&Animation> {
        self.catalog.animation(tile_id)
    }

    /// Objects whose type equals `kind`, in source order
    pub fn get_objects_by_type(&self, kind: &str) -> Vec<&MapObject> {
        self.objects.iter().filter(|o| o.kind == kind).collect()
    }

    /// Tile layers in z order
    pub fn layers(&self) -> &[TileLayer] {
        &self.layers
    }

    /// All objects
    pub fn objects(&self) -> &[MapObject] {
        &self.objects
    }

    /// Objects that display a tile
    pub fn tile_objects(&self) -> &[TileObject] {
        &self.tile_objects
    }

    /// Solid cells
    pub fn walls(&self) -> &WallSet {
        &self.walls
    }

    /// Replace the solid cells
    pub fn replace_walls(&mut self, walls: WallSet) {
        self.walls = walls;
    }

    /// Shared property and animation tables
    pub fn catalog(&self) -> Arc<TileCatalog> {
        Arc::clone(&self.catalog)
    }

    /// Sliced tileset, once parsed
    pub fn tileset(&self) -> Option<Arc<Tileset>> {
        self.tileset.clone()
    }

    /// Tile width in pixels
    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    /// Tile height in pixels
    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    /// Map width in tiles
    pub fn map_width(&self) -> u32 {
        self.map_width
    }

    /// Map height in tiles
    pub fn map_height(&self) -> u32 {
        self.map_height
    }

    /// Map size in pixels
    pub fn pixel_size(&self) -> (u32, u32) {
        (self.map_width * self.tile_width, self.map_height * self.tile_height)
    }

    /// Depth tiles to spawn as Y-sorted entities
    pub fn promoted_tiles(&self) -> Vec<PromotedTile> {
        let parsed = ParsedLayers {
            layers: self.layers.clone(),
            objects: Vec::new(),
            tile_objects: self.tile_objects.clone(),
            walls: WallSet::new(),
        };
        promote_depth_tiles(&parsed, &self.catalog)
    }
}

fn source_error<T>(resource: &Resource<T>) -> Option<MapError> {
    resource.error().map(|e| MapError::Source {
        name: resource.name().to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::collections::PositionKey;
    use serde_json::json;

    fn map() -> MapData {
        serde_json::from_value(json!({
            "width": 2, "height": 2, "tilewidth": 16, "tileheight": 16,
            "tilesets": [{"name": "t", "tiles": [
                {"id": 0, "properties": [{"name": "collide", "type": "bool", "value": true}]},
                {"id": 2, "animation": [{"tileid": 2, "duration": 100}, {"tileid": 3, "duration": 100}]}
            ]}],
            "layers": [
                {"name": "ground", "type": "tilelayer", "data": [1, 1, 2, 3]},
                {"name": "over", "type": "tilelayer", "data": [2, 0, 0, 0]},
                {"name": "things", "type": "objectgroup", "objects": [
                    {"name": "door", "type": "warp", "x": 16, "y": 0},
                    {"name": "spawn", "type": "start", "x": 0, "y": 16},
                    {"name": "door2", "type": "warp", "x": 0, "y": 0}
                ]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_once_sources_ready() {
        let mut doc = TileMapDocument::from_data(map(), RgbaImage::new(64, 16));
        assert!(doc.is_loaded());
        assert!(doc.parse());
        assert!(doc.is_parsed());

        assert_eq!(doc.layers().len(), 2);
        assert_eq!(doc.pixel_size(), (32, 32));
        assert!(doc.get_tile_properties(0).collides());
        assert!(doc.get_animation(2).is_some());
        assert_eq!(doc.get_objects_by_type("warp").len(), 2);
        assert_eq!(doc.get_objects_by_type("warp")[1].name, "door2");
        assert!(doc.get_objects_by_type("chest").is_empty());

        // Upper layer's gid 2 cleared the wall at (0, 0)
        assert!(!doc.walls().contains(PositionKey::new(0, 0)));
        assert!(doc.walls().contains(PositionKey::new(16, 0)));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let mut doc = TileMapDocument::from_data(map(), RgbaImage::new(64, 16));
        doc.parse();
        let mut walls = WallSet::new();
        walls.insert(PositionKey::new(99, 99));
        doc.replace_walls(walls.clone());

        assert!(doc.parse());
        assert_eq!(doc.walls(), &walls);
    }

    #[test]
    fn test_parse_waits_for_sources() {
        let (map_res, map_writer) = Resource::pending("map");
        let (image_res, image_writer) = Resource::pending("image");
        let mut doc = TileMapDocument::new(map_res, image_res);

        assert!(!doc.parse());
        map_writer.complete(Ok(map()));
        assert!(!doc.parse());
        image_writer.complete(Ok(RgbaImage::new(64, 16)));
        assert!(doc.parse());
    }

    #[test]
    fn test_failed_source_leaves_document_empty() {
        let mut doc = TileMapDocument::new(
            Resource::failed("map", AssetError::NotFound("town.json".into())),
            Resource::ready("image", RgbaImage::new(64, 16)),
        );
        assert!(!doc.parse());
        assert!(doc.error().is_some());
        assert!(doc.layers().is_empty());
        assert!(!doc.parse());
    }
}
