//! Game-world composition
//!
//! [`World`] owns the scene tree, the camera, the current [`Level`] and the
//! event queue, and drives them once per frame.

pub mod level;
pub mod root;
pub mod tile_sprite;

pub use level::Level;
pub use root::World;
pub use tile_sprite::{spawn_tile_sprites, TileSprite};

use thiserror::Error;

use crate::config::ConfigError;
use crate::scene::tree::SceneError;
use crate::streaming::ChunkError;

/// World composition errors
#[derive(Error, Debug)]
pub enum WorldError {
    /// Scene tree contract violation
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    /// Chunk streaming failed structurally
    #[error("Chunk error: {0}")]
    Chunk(#[from] ChunkError),

    /// Invalid engine configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A level was attached to a tree twice
    #[error("Level '{0}' is already attached")]
    AlreadyAttached(String),

    /// A document level lost its tile renderer node
    #[error("Level '{0}' has no tile renderer")]
    MissingRenderer(String),
}
