//! Chunked map streaming
//!
//! Large maps are split into fixed-size chunk files next to a `master.json`
//! index. A [`ChunkStore`] keeps the chunks around a reference point loaded,
//! decoding them in the background and attaching them to the scene once
//! they are ready.

pub mod chunk;
pub mod loader;
pub mod master;
pub mod source;
pub mod store;
pub mod window;


pub use chunk::{Chunk, ChunkContents, ChunkContext};
pub use loader::{ChunkLoader, LoadOutcome, LoadResult};
pub use master::{ChunkData, ChunkMaster};
pub use source::{chunk_file_name, ChunkSource, FetchError, FsChunkSource, MemoryChunkSource, MASTER_FILE};
pub use store::{ChunkStore, LevelTarget, StreamStats};
pub use window::{ChunkCoord, ChunkGrid, ChunkWindow};

use thiserror::Error;

use crate::assets::AssetError;
use crate::scene::tree::SceneError;

/// Chunk streaming errors
#[derive(Error, Debug)]
pub enum ChunkError {
    /// The chunk source could not deliver a file
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// A file was not valid chunk JSON
    #[error("Decode failed: {0}")]
    Decode(String),

    /// The index describes an unusable grid
    #[error("Invalid chunk index: {0}")]
    InvalidIndex(String),

    /// The tileset could not be sliced
    #[error("Tileset error: {0}")]
    Tileset(#[from] AssetError),

    /// The level node rejected a chunk
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),
}
