//! Tile custom properties and the per-tileset catalog

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tilemap::animation::{Animation, AnimationFrame};
use crate::tilemap::format::{PropertyData, TilesetData};

/// Name of the property that marks a tile as blocking
pub const COLLIDE: &str = "collide";
/// Name of the property that promotes a tile to a Y-sorted sprite
pub const DEPTH: &str = "depth";

/// Value of a custom property
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// String, file path or colour
    String(String),
    /// Anything else the editor emits
    Other(Value),
}

impl PropertyValue {
    /// Loose truthiness: `false`, zero, empty strings and null are falsy
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0 && !f.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Other(v) => !v.is_null(),
        }
    }

    /// Borrow as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric value, if any
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }
}

/// Property name to value mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyBag {
    values: HashMap<String, PropertyValue>,
}

impl PropertyBag {
    /// Empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from editor property records; later names win
    pub fn from_records(records: &[PropertyData]) -> Self {
        records
            .iter()
            .map(|p| (p.name.clone(), p.value.clone()))
            .collect()
    }

    /// Set a value
    pub fn insert(&mut self, name: impl Into<String>, value: PropertyValue) {
        self.values.insert(name.into(), value);
    }

    /// Look up a value
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.get(name)
    }

    /// Whether `name` is present and truthy
    pub fn flag(&self, name: &str) -> bool {
        self.get(name).is_some_and(PropertyValue::is_truthy)
    }

    /// Blocking tile
    pub fn collides(&self) -> bool {
        self.flag(COLLIDE)
    }

    /// Promoted to a Y-sorted sprite
    pub fn is_depth(&self) -> bool {
        self.flag(DEPTH)
    }

    /// Copy with `overrides` applied on top
    pub fn merged_with(&self, overrides: &Self) -> Self {
        let mut merged = self.clone();
        for (name, value) in &overrides.values {
            merged.values.insert(name.clone(), value.clone());
        }
        merged
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// No properties
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(name, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, PropertyValue)> for PropertyBag {
    fn from_iter<I: IntoIterator<Item = (String, PropertyValue)>>(iter: I) -> Self {
        Self { values: iter.into_iter().collect() }
    }
}

/// Properties and animations of every tile in a tileset
#[derive(Debug, Clone, Default)]
pub struct TileCatalog {
    properties: HashMap<u32, PropertyBag>,
    animations: HashMap<u32, Animation>,
    empty: PropertyBag,
}

impl TileCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the first tileset of a document
    pub fn from_tilesets(tilesets: &[TilesetData]) -> Self {
        let Some(tileset) = tilesets.first() else {
            log::warn!("Map has no tilesets; tiles will have no properties or animations");
            return Self::default();
        };
        if tilesets.len() > 1 {
            log::debug!("Map has {} tilesets; only '{}' is used", tilesets.len(), tileset.name);
        }
        Self::from_tileset(tileset)
    }

    /// Build from one tileset
    pub fn from_tileset(tileset: &TilesetData) -> Self {
        let mut catalog = Self::default();
        for tile in &tileset.tiles {
            if !tile.properties.is_empty() {
                catalog
                    .properties
                    .insert(tile.id, PropertyBag::from_records(&tile.properties));
            }
            if !tile.animation.is_empty() {
                let frames = tile
                    .animation
                    .iter()
                    .map(|f| AnimationFrame::new(f.tile_id, f.duration))
                    .collect();
                catalog.animations.insert(tile.id, Animation::new(frames));
            }
        }
        log::debug!(
            "Tileset '{}': {} tiles with properties, {} animated",
            tileset.name,
            catalog.properties.len(),
            catalog.animations.len()
        );
        catalog
    }

    /// Properties of `tile_id`; an empty bag when it has none
    pub fn properties(&self, tile_id: u32) -> &PropertyBag {
        self.properties.get(&tile_id).unwrap_or(&self.empty)
    }

    /// Animation of `tile_id`
    pub fn animation(&self, tile_id: u32) -> Option<&Animation> {
        self.animations.get(&tile_id)
    }

    /// Whether `tile_id` animates
    pub fn is_animated(&self, tile_id: u32) -> bool {
        self.animations.contains_key(&tile_id)
    }

    /// All animated tiles
    pub fn animations(&self) -> impl Iterator<Item = (u32, &Animation)> {
        self.animations.iter().map(|(id, a)| (*id, a))
    }

    /// Attach properties to a tile
    pub fn set_properties(&mut self, tile_id: u32, properties: PropertyBag) {
        self.properties.insert(tile_id, properties);
    }

    /// Attach an animation to a tile
    pub fn set_animation(&mut self, tile_id: u32, animation: Animation) {
        self.animations.insert(tile_id, animation);
    }
}
