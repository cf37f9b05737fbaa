//! Tiled JSON document structures
//!
//! Layers and objects are kept as raw JSON values at the top level so that a
//! single malformed entry can be skipped without rejecting the whole map.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tilemap::properties::PropertyValue;

bitflags! {
    /// Orientation bits stored in the top of a global tile id
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TileFlip: u32 {
        /// Mirror horizontally
        const HORIZONTAL = 0x8000_0000;
        /// Mirror vertically
        const VERTICAL = 0x4000_0000;
        /// Swap the X and Y axes
        const DIAGONAL = 0x2000_0000;
    }
}

/// Bits of a global tile id that hold the tile index
pub const GID_MASK: u32 = !TileFlip::all().bits();

/// Tileset-local tile reference decoded from a global tile id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRef {
    /// Tileset-local id (global id minus one)
    pub id: u32,
    /// Orientation flags
    pub flip: TileFlip,
}

impl TileRef {
    /// Unflipped tile
    pub const fn new(id: u32) -> Self {
        Self { id, flip: TileFlip::empty() }
    }

    /// Decode a global tile id; `0` means an empty cell
    pub fn from_gid(gid: u32) -> Option<Self> {
        let index = gid & GID_MASK;
        if index == 0 {
            return None;
        }
        Some(Self {
            id: index - 1,
            flip: TileFlip::from_bits_truncate(gid),
        })
    }
}

/// Top-level map document
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MapData {
    /// Map width in tiles
    pub width: u32,
    /// Map height in tiles
    pub height: u32,
    /// Tile width in pixels
    #[serde(rename = "tilewidth")]
    pub tile_width: u32,
    /// Tile height in pixels
    #[serde(rename = "tileheight")]
    pub tile_height: u32,
    /// Raw layers in source order
    #[serde(default)]
    pub layers: Vec<Value>,
    /// Tilesets; only the first one is used
    #[serde(default)]
    pub tilesets: Vec<TilesetData>,
    /// Whether the editor marked this as an infinite map
    #[serde(default)]
    pub infinite: bool,
}

/// Layer header shared by all layer kinds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LayerData {
    /// Layer name
    #[serde(default)]
    pub name: String,
    /// `tilelayer` or `objectgroup`
    #[serde(rename = "type")]
    pub kind: String,
    /// Hidden layers still contribute collision
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Layer opacity
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    /// Row stride in tiles when it differs from the map width
    #[serde(default)]
    pub width: Option<u32>,
    /// Global tile ids, row-major
    #[serde(default)]
    pub data: Option<Vec<u32>>,
    /// Raw objects of an object group
    #[serde(default)]
    pub objects: Option<Vec<Value>>,
}

/// One object of an object group
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObjectData {
    /// Editor id
    #[serde(default)]
    pub id: u32,
    /// Object name
    #[serde(default)]
    pub name: String,
    /// Object type; newer editors call it `class`
    #[serde(default, rename = "type", alias = "class")]
    pub kind: String,
    /// Left edge
    #[serde(default)]
    pub x: f32,
    /// Top edge, or bottom edge for tile objects
    #[serde(default)]
    pub y: f32,
    /// Width in pixels
    #[serde(default)]
    pub width: f32,
    /// Height in pixels
    #[serde(default)]
    pub height: f32,
    /// Global tile id for tile objects
    #[serde(default)]
    pub gid: Option<u32>,
    /// Custom properties
    #[serde(default)]
    pub properties: Vec<PropertyData>,
}

/// Tileset entry in the map document
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TilesetData {
    /// First global id covered by this tileset
    #[serde(default = "default_first_gid")]
    pub firstgid: u32,
    /// Tileset name
    #[serde(default)]
    pub name: String,
    /// Image path relative to the map
    #[serde(default)]
    pub image: Option<String>,
    /// Number of tile columns in the image
    #[serde(default)]
    pub columns: Option<u32>,
    /// Tiles with properties or animations
    #[serde(default)]
    pub tiles: Vec<TileData>,
}

/// Per-tile metadata
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TileData {
    /// Tileset-local id
    pub id: u32,
    /// Custom properties
    #[serde(default)]
    pub properties: Vec<PropertyData>,
    /// Animation frames
    #[serde(default)]
    pub animation: Vec<FrameData>,
}

/// Animation frame as stored by the editor
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct FrameData {
    /// Tileset-local id shown during this frame
    #[serde(rename = "tileid")]
    pub tile_id: u32,
    /// Frame duration in milliseconds
    pub duration: u32,
}

/// Named custom property
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PropertyData {
    /// Property name
    pub name: String,
    /// Editor type tag
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Property value
    pub value: PropertyValue,
}

const fn default_visible() -> bool {
    true
}

const fn default_opacity() -> f32 {
    1.0
}

const fn default_first_gid() -> u32 {
    1
}
