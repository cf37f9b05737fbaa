//! Asset loading
//!
//! Map documents and tileset images are decoded on background threads into
//! [`Resource`] slots that the frame loop polls.

pub mod loader;
pub mod resource;

pub use loader::{load_image_bytes, load_image_file, load_map_file, parse_map_bytes, AssetLoader};
pub use resource::{Resource, ResourceWriter};

use thiserror::Error;

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// Asset not found
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// Failed to load asset
    #[error("Failed to load asset: {0}")]
    LoadFailed(String),

    /// Invalid asset data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// IO error during asset loading
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
