//! Tile map model
//!
//! Decodes the editor's layered JSON format into tile layers, objects, tile
//! properties, animation tables and a collision set. The same layer parser
//! serves whole documents and streamed chunks.

pub mod animation;
pub mod document;
pub mod format;
pub mod parser;
pub mod properties;

pub use animation::{Animation, AnimationFrame, AnimationState, TileAnimator};
pub use document::{MapError, TileMapDocument};
pub use format::{MapData, TileFlip, TileRef, TilesetData};
pub use parser::{
    parse_layers, promote_depth_tiles, LayerGrid, MapObject, ParsedLayers, PlacedTile, PromotedTile, TileLayer,
    TileObject,
};
pub use properties::{PropertyBag, PropertyValue, TileCatalog};
