//! # Tile Engine
//!
//! The core of a 2D top-down tile engine.
//!
//! ## Features
//!
//! - **Y-sorted scene graph**: Arena nodes with a static/dynamic child split
//!   so only moving children are re-sorted each frame
//! - **Tiled maps**: JSON map parsing with per-tile properties, animations,
//!   collision walls and depth-sorted tile promotion
//! - **Chunk streaming**: Large maps split into chunk files, loaded in the
//!   background around the camera
//! - **Layer rendering**: Static layers pre-rasterized once, animated layers
//!   drawn per tile with off-screen culling
//! - **Dead-zone camera**: Smooth follow clamped to the map edges
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tile_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     tile_engine::foundation::logging::init();
//!     let config = EngineConfig::default();
//!     let loader = AssetLoader::new("assets");
//!     let document = TileMapDocument::load(&loader, "maps/cave.json", "maps/cave.png");
//!
//!     let mut world = World::new(config.clone())?;
//!     world.set_level(Level::from_document("cave", document, Vec2::new(560.0, 400.0), &config))?;
//!
//!     let mut canvas = Canvas::new(768, 432);
//!     loop {
//!         world.tick(16.0)?;
//!         canvas.clear();
//!         world.render(&mut canvas)?;
//!     }
//! }
//! ```

pub mod assets;
pub mod config;
pub mod core;
pub mod events;
pub mod foundation;
pub mod render;
pub mod scene;
pub mod streaming;
pub mod tilemap;
pub mod world;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        assets::{AssetError, AssetLoader, Resource},
        config::{Config, ConfigError},
        core::config::EngineConfig,
        events::{EventKind, EventSystem, GameEvent},
        foundation::{
            collections::{PositionKey, WallSet},
            math::{Rect, Vec2},
        },
        render::{Canvas, CameraController, DrawContext, DrawList, LayerRenderer, MapBounds, Tileset},
        scene::{Component, Drawable, DrawLayer, FrameInfo, NodeId, SceneError, SceneNode, SceneTree, Steppable},
        streaming::{ChunkSource, ChunkStore, FsChunkSource},
        tilemap::{TileMapDocument, TileRef},
        world::{Level, TileSprite, World, WorldError},
    };
}
