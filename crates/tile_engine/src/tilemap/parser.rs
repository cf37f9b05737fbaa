//! Layer parsing shared by whole documents and streamed chunks
//!
//! Both callers feed raw layer JSON plus a [`LayerGrid`] describing the row
//! stride and the world origin of the grid, so chunk walls come out in world
//! coordinates and compose with neighbouring chunks.

use std::collections::HashSet;

use serde_json::Value;

use crate::foundation::collections::{PositionKey, WallSet};
use crate::foundation::math::Vec2;
use crate::tilemap::format::{LayerData, ObjectData, TileRef};
use crate::tilemap::properties::{PropertyBag, PropertyValue, TileCatalog, COLLIDE};

/// Geometry of a tile grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerGrid {
    /// Row stride in tiles
    pub columns: u32,
    /// Tile width in pixels
    pub tile_width: u32,
    /// Tile height in pixels
    pub tile_height: u32,
    /// World position of the grid's top-left corner
    pub origin: Vec2,
}

impl LayerGrid {
    /// Grid at the world origin
    pub fn new(columns: u32, tile_width: u32, tile_height: u32) -> Self {
        Self {
            columns,
            tile_width,
            tile_height,
            origin: Vec2::zeros(),
        }
    }

    /// Move the grid
    pub fn with_origin(mut self, origin: Vec2) -> Self {
        self.origin = origin;
        self
    }

    fn cell_position(&self, index: usize, stride: u32) -> Vec2 {
        let stride = stride.max(1) as usize;
        let column = (index % stride) as f32;
        let row = (index / stride) as f32;
        Vec2::new(
            self.origin.x + column * self.tile_width as f32,
            self.origin.y + row * self.tile_height as f32,
        )
    }
}

/// One non-empty cell of a tile layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedTile {
    /// Tile and orientation
    pub tile: TileRef,
    /// World X of the top-left corner
    pub x: f32,
    /// World Y of the top-left corner
    pub y: f32,
}

/// Parsed tile layer
#[derive(Debug, Clone, PartialEq)]
pub struct TileLayer {
    /// Layer name
    pub name: String,
    /// Source order index; higher draws later
    pub z_index: usize,
    /// Visibility flag
    pub visible: bool,
    /// Opacity in `0.0..=1.0`
    pub opacity: f32,
    /// Non-empty cells
    pub tiles: Vec<PlacedTile>,
}

/// Generic object from an object group
#[derive(Debug, Clone, PartialEq)]
pub struct MapObject {
    /// Editor id
    pub id: u32,
    /// Object name
    pub name: String,
    /// Object type
    pub kind: String,
    /// World X
    pub x: f32,
    /// World Y as authored
    pub y: f32,
    /// Width in pixels
    pub width: f32,
    /// Height in pixels
    pub height: f32,
    /// Instance properties
    pub properties: PropertyBag,
    /// Tile reference for tile objects
    pub tile: Option<TileRef>,
}

/// Object that displays a tile
#[derive(Debug, Clone, PartialEq)]
pub struct TileObject {
    /// Object name
    pub name: String,
    /// Tile and orientation
    pub tile: TileRef,
    /// World X of the top-left corner
    pub x: f32,
    /// World Y of the top-left corner
    pub y: f32,
    /// Width in pixels
    pub width: f32,
    /// Height in pixels
    pub height: f32,
    /// Z index of the owning object group
    pub z_index: usize,
    /// Tile properties overridden by the instance's own
    pub properties: PropertyBag,
}

/// Everything extracted from a list of raw layers
#[derive(Debug, Clone, Default)]
pub struct ParsedLayers {
    /// Tile layers in source order
    pub layers: Vec<TileLayer>,
    /// All objects of all object groups
    pub objects: Vec<MapObject>,
    /// Objects carrying a tile
    pub tile_objects: Vec<TileObject>,
    /// Solid cells in world coordinates
    pub walls: WallSet,
}

/// A tile promoted out of bulk rendering into its own Y-sorted entity
#[derive(Debug, Clone, PartialEq)]
pub struct PromotedTile {
    /// Tile and orientation
    pub tile: TileRef,
    /// World X of the top-left corner
    pub x: f32,
    /// World Y of the top-left corner
    pub y: f32,
    /// Z index the tile came from
    pub z_index: usize,
    /// Properties the entity carries
    pub properties: PropertyBag,
    /// Object name, for object-layer promotions
    pub name: Option<String>,
}

/// Parse `raw` layers in source order.
///
/// Each layer gets `z_index` equal to its source index. For every non-empty
/// cell the wall set follows the topmost layer: a colliding tile inserts the
/// cell and any other tile removes it. Malformed layers and objects are
/// logged and skipped.
pub fn parse_layers(raw: &[Value], grid: &LayerGrid, catalog: &TileCatalog) -> ParsedLayers {
    let mut parsed = ParsedLayers::default();

    for (z_index, value) in raw.iter().enumerate() {
        let layer: LayerData = match serde_json::from_value(value.clone()) {
            Ok(layer) => layer,
            Err(e) => {
                log::warn!("Skipping malformed layer {z_index}: {e}");
                continue;
            }
        };

        match layer.kind.as_str() {
            "tilelayer" => {
                if let Some(tile_layer) = parse_tile_layer(&layer, z_index, grid, catalog, &mut parsed.walls) {
                    parsed.layers.push(tile_layer);
                }
            }
            "objectgroup" => parse_object_group(&layer, z_index, grid, catalog, &mut parsed),
            other => log::warn!("Skipping layer '{}' with unsupported type '{other}'", layer.name),
        }
    }

    log::trace!(
        "Parsed {} tile layers, {} objects, {} walls",
        parsed.layers.len(),
        parsed.objects.len(),
        parsed.walls.len()
    );
    parsed
}

fn parse_tile_layer(
    layer: &LayerData,
    z_index: usize,
    grid: &LayerGrid,
    catalog: &TileCatalog,
    walls: &mut WallSet,
) -> Option<TileLayer> {
    let Some(data) = layer.data.as_ref() else {
        log::warn!("Skipping tile layer '{}' without data", layer.name);
        return None;
    };
    let stride = layer.width.unwrap_or(grid.columns);

    let mut tiles = Vec::new();
    for (index, gid) in data.iter().enumerate() {
        let Some(tile) = TileRef::from_gid(*gid) else {
            continue;
        };
        let position = grid.cell_position(index, stride);
        let key = PositionKey::from_world(position.x, position.y);
        if catalog.properties(tile.id).collides() {
            walls.insert(key);
        } else {
            walls.remove(key);
        }
        tiles.push(PlacedTile { tile, x: position.x, y: position.y });
    }

    Some(TileLayer {
        name: layer.name.clone(),
        z_index,
        visible: layer.visible,
        opacity: layer.opacity,
        tiles,
    })
}

fn parse_object_group(
    layer: &LayerData,
    z_index: usize,
    grid: &LayerGrid,
    catalog: &TileCatalog,
    parsed: &mut ParsedLayers,
) {
    for value in layer.objects.iter().flatten() {
        let object: ObjectData = match serde_json::from_value(value.clone()) {
            Ok(object) => object,
            Err(e) => {
                log::warn!("Skipping malformed object in '{}': {e}", layer.name);
                continue;
            }
        };

        let properties = PropertyBag::from_records(&object.properties);
        let tile = object.gid.and_then(TileRef::from_gid);
        let x = grid.origin.x + object.x;
        let y = grid.origin.y + object.y;

        if let Some(tile) = tile {
            // Tile objects are anchored at their bottom-left corner
            let top = y - object.height;
            let tile_properties = catalog.properties(tile.id);
            let mut merged = tile_properties.merged_with(&properties);
            // Either side marking the tile solid makes it a wall
            if tile_properties.collides() || properties.collides() {
                parsed.walls.insert(PositionKey::from_world(x, top));
                merged.insert(COLLIDE, PropertyValue::Bool(true));
            }
            parsed.tile_objects.push(TileObject {
                name: object.name.clone(),
                tile,
                x,
                y: top,
                width: object.width,
                height: object.height,
                z_index,
                properties: merged,
            });
        }

        parsed.objects.push(MapObject {
            id: object.id,
            name: object.name,
            kind: object.kind,
            x,
            y,
            width: object.width,
            height: object.height,
            properties,
            tile,
        });
    }
}

/// Collect depth tiles for promotion.
///
/// Visible layer tiles are promoted once per `(z_index, x, y)`. Tile objects
/// with a truthy merged `depth` are always promoted and never suppress the
/// layer tile underneath.
pub fn promote_depth_tiles(parsed: &ParsedLayers, catalog: &TileCatalog) -> Vec<PromotedTile> {
    let mut seen: HashSet<(usize, PositionKey)> = HashSet::new();
    let mut promoted = Vec::new();

    for layer in parsed.layers.iter().filter(|l| l.visible) {
        for placed in &layer.tiles {
            let properties = catalog.properties(placed.tile.id);
            if !properties.is_depth() {
                continue;
            }
            if !seen.insert((layer.z_index, PositionKey::from_world(placed.x, placed.y))) {
                continue;
            }
            promoted.push(PromotedTile {
                tile: placed.tile,
                x: placed.x,
                y: placed.y,
                z_index: layer.z_index,
                properties: properties.clone(),
                name: None,
            });
        }
    }

    for object in parsed.tile_objects.iter().filter(|o| o.properties.is_depth()) {
        promoted.push(PromotedTile {
            tile: object.tile,
            x: object.x,
            y: object.y,
            z_index: object.z_index,
            properties: object.properties.clone(),
            name: Some(object.name.clone()),
        });
    }

    promoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> TileCatalog {
        let mut catalog = TileCatalog::new();
        let mut solid = PropertyBag::new();
        solid.insert("collide", PropertyValue::Bool(true));
        catalog.set_properties(0, solid);
        let mut tree = PropertyBag::new();
        tree.insert("depth", PropertyValue::Bool(true));
        catalog.set_properties(2, tree);
        catalog
    }

    fn tile_layer(name: &str, data: &[u32]) -> Value {
        json!({"name": name, "type": "tilelayer", "width": 2, "data": data})
    }

    #[test]
    fn test_upper_layer_clears_lower_wall() {
        // gid 1 is solid, gid 2 is not
        let raw = vec![tile_layer("ground", &[1, 1, 0, 0]), tile_layer("path", &[2, 0, 0, 0])];
        let parsed = parse_layers(&raw, &LayerGrid::new(2, 16, 16), &catalog());

        assert!(!parsed.walls.contains(PositionKey::new(0, 0)));
        assert!(parsed.walls.contains(PositionKey::new(16, 0)));
        assert_eq!(parsed.walls.len(), 1);
    }

    #[test]
    fn test_upper_solid_over_lower_passable() {
        let raw = vec![tile_layer("ground", &[2, 0, 0, 0]), tile_layer("rocks", &[1, 0, 0, 0])];
        let parsed = parse_layers(&raw, &LayerGrid::new(2, 16, 16), &catalog());
        assert!(parsed.walls.contains(PositionKey::new(0, 0)));
    }

    #[test]
    fn test_empty_cells_leave_walls_alone() {
        let raw = vec![tile_layer("ground", &[1, 0, 0, 0]), tile_layer("empty", &[0, 0, 0, 0])];
        let parsed = parse_layers(&raw, &LayerGrid::new(2, 16, 16), &catalog());
        assert!(parsed.walls.contains(PositionKey::new(0, 0)));
        assert!(parsed.layers[1].tiles.is_empty());
    }

    #[test]
    fn test_positions_and_z_index() {
        let raw = vec![
            json!({"name": "objects", "type": "objectgroup", "objects": []}),
            tile_layer("ground", &[0, 0, 0, 4]),
        ];
        let grid = LayerGrid::new(2, 16, 8).with_origin(Vec2::new(100.0, 200.0));
        let parsed = parse_layers(&raw, &grid, &catalog());

        assert_eq!(parsed.layers.len(), 1);
        let layer = &parsed.layers[0];
        assert_eq!(layer.z_index, 1);
        assert_eq!(layer.tiles[0].tile.id, 3);
        assert_eq!((layer.tiles[0].x, layer.tiles[0].y), (116.0, 208.0));
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let raw = vec![
            json!({"name": "broken", "type": "tilelayer"}),
            json!({"name": "image", "type": "imagelayer"}),
            json!("not a layer"),
            tile_layer("ok", &[1, 0, 0, 0]),
        ];
        let parsed = parse_layers(&raw, &LayerGrid::new(2, 16, 16), &catalog());
        assert_eq!(parsed.layers.len(), 1);
        assert_eq!(parsed.layers[0].z_index, 3);
    }

    #[test]
    fn test_tile_objects() {
        let raw = vec![json!({
            "name": "props",
            "type": "objectgroup",
            "objects": [
                {"id": 1, "name": "oak", "type": "tree", "gid": 3, "x": 32, "y": 48, "width": 16, "height": 16,
                 "properties": [{"name": "label", "type": "string", "value": "old oak"}]},
                {"id": 2, "name": "crate", "type": "box", "gid": 5, "x": 0, "y": 16, "width": 16, "height": 16,
                 "properties": [{"name": "collide", "type": "bool", "value": true}]},
                {"id": 3, "name": "spawn", "type": "start", "x": 8, "y": 8}
            ]
        })];
        let parsed = parse_layers(&raw, &LayerGrid::new(4, 16, 16), &catalog());

        assert_eq!(parsed.objects.len(), 3);
        assert_eq!(parsed.tile_objects.len(), 2);

        let oak = &parsed.tile_objects[0];
        assert_eq!((oak.x, oak.y), (32.0, 32.0));
        assert!(oak.properties.is_depth());
        assert_eq!(oak.properties.get("label").and_then(PropertyValue::as_str), Some("old oak"));

        assert!(parsed.walls.contains(PositionKey::new(0, 0)));
        assert!(!parsed.walls.contains(PositionKey::new(32, 32)));
    }

    #[test]
    fn test_tile_object_wall_ignores_instance_false() {
        // gid 1 is a solid tile; the instance says it does not collide
        let raw = vec![json!({
            "name": "props",
            "type": "objectgroup",
            "objects": [
                {"id": 1, "name": "rock", "gid": 1, "x": 0, "y": 16, "width": 16, "height": 16,
                 "properties": [{"name": "collide", "type": "bool", "value": false}]}
            ]
        })];
        let parsed = parse_layers(&raw, &LayerGrid::new(2, 16, 16), &catalog());
        assert!(parsed.walls.contains(PositionKey::new(0, 0)));
        assert!(parsed.tile_objects[0].properties.collides());
    }

    #[test]
    fn test_promotion_dedupes_layer_tiles_only() {
        let raw = vec![
            tile_layer("trees", &[3, 0, 0, 0]),
            json!({"name": "props", "type": "objectgroup", "objects": [
                {"name": "oak", "gid": 3, "x": 0, "y": 16, "width": 16, "height": 16}
            ]}),
            json!({"name": "hidden", "type": "tilelayer", "visible": false, "width": 2, "data": [0, 3, 0, 0]}),
        ];
        let mut parsed = parse_layers(&raw, &LayerGrid::new(2, 16, 16), &catalog());
        // Same cell listed twice in one layer
        let duplicate = parsed.layers[0].tiles[0];
        parsed.layers[0].tiles.push(duplicate);

        let promoted = promote_depth_tiles(&parsed, &catalog());
        assert_eq!(promoted.len(), 2);
        assert_eq!(promoted[0].name, None);
        assert_eq!(promoted[1].name.as_deref(), Some("oak"));
        assert_eq!((promoted[1].x, promoted[1].y), (0.0, 0.0));
    }
}
