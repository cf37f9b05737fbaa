//! Chunk index and per-chunk file structures

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::foundation::math::Vec2;
use crate::streaming::ChunkError;
use crate::tilemap::format::TilesetData;

/// Index describing how a map was split into chunk files
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMaster {
    /// Format version written by the splitter
    #[serde(default)]
    pub version: Option<Value>,
    /// Chunk width in tiles
    pub chunk_width: u32,
    /// Chunk height in tiles
    pub chunk_height: u32,
    /// Number of chunk columns
    pub chunks_x: u32,
    /// Number of chunk rows
    pub chunks_y: u32,
    /// Map width in tiles
    pub map_width: u32,
    /// Map height in tiles
    pub map_height: u32,
    /// Tile width in pixels
    pub tile_width: u32,
    /// Tile height in pixels
    pub tile_height: u32,
    /// Tilesets of the original map; only the first is used
    #[serde(default)]
    pub tilesets: Vec<TilesetData>,
    /// Whether the source map was infinite
    #[serde(default)]
    pub infinite: bool,
}

impl ChunkMaster {
    /// Decode and validate an index file
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ChunkError> {
        let master: Self =
            serde_json::from_slice(bytes).map_err(|e| ChunkError::Decode(format!("chunk index: {e}")))?;
        master.validate()?;
        Ok(master)
    }

    /// Reject geometry that would divide by zero
    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.chunk_width == 0 || self.chunk_height == 0 || self.tile_width == 0 || self.tile_height == 0 {
            return Err(ChunkError::InvalidIndex(format!(
                "chunk {}x{} tiles of {}x{} px",
                self.chunk_width, self.chunk_height, self.tile_width, self.tile_height
            )));
        }
        Ok(())
    }

    /// Chunk size in pixels
    pub fn chunk_pixel_size(&self) -> Vec2 {
        Vec2::new(
            (self.chunk_width * self.tile_width) as f32,
            (self.chunk_height * self.tile_height) as f32,
        )
    }

    /// Chunk size in whole pixels
    pub fn chunk_pixel_extent(&self) -> (u32, u32) {
        (self.chunk_width * self.tile_width, self.chunk_height * self.tile_height)
    }

    /// Map size in pixels
    pub fn map_pixel_size(&self) -> Vec2 {
        Vec2::new(
            (self.map_width * self.tile_width) as f32,
            (self.map_height * self.tile_height) as f32,
        )
    }

    /// Total number of chunk cells
    pub fn chunk_count(&self) -> u32 {
        self.chunks_x * self.chunks_y
    }
}

/// One chunk file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkData {
    /// Chunk column
    pub x: i32,
    /// Chunk row
    pub y: i32,
    /// Layers cropped to the chunk, in chunk-local coordinates
    #[serde(default)]
    pub layers: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_decode_index() {
        let json = br#"{
            "version": "1.0", "chunkWidth": 64, "chunkHeight": 64, "chunksX": 2, "chunksY": 2,
            "mapWidth": 128, "mapHeight": 128, "tileWidth": 16, "tileHeight": 16,
            "tilesets": [{"name": "overworld", "tiles": []}], "infinite": false
        }"#;
        let master = ChunkMaster::from_slice(json).unwrap();
        assert_eq!(master.chunk_count(), 4);
        assert_relative_eq!(master.chunk_pixel_size().x, 1024.0);
        assert_relative_eq!(master.map_pixel_size().y, 2048.0);
        assert_eq!(master.tilesets[0].name, "overworld");
    }

    #[test]
    fn test_rejects_zero_geometry() {
        let json = br#"{"chunkWidth": 0, "chunkHeight": 64, "chunksX": 1, "chunksY": 1,
            "mapWidth": 1, "mapHeight": 1, "tileWidth": 16, "tileHeight": 16}"#;
        assert!(matches!(ChunkMaster::from_slice(json), Err(ChunkError::InvalidIndex(_))));
        assert!(matches!(ChunkMaster::from_slice(b"[]"), Err(ChunkError::Decode(_))));
    }
}
