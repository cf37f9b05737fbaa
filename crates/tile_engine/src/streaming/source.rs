//! Where chunk files come from
//!
//! A [`ChunkSource`] hands back raw bytes and classifies failures: a
//! [`FetchError::NotFound`] means the region is sparse and renders as empty,
//! anything else is transient and retried on a later window change.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use thiserror::Error;

use crate::streaming::window::ChunkCoord;

/// File name of the chunk index
pub const MASTER_FILE: &str = "master.json";

/// File name of a chunk
pub fn chunk_file_name(coord: ChunkCoord) -> String {
    format!("chunk_{}_{}.json", coord.x, coord.y)
}

/// Chunk fetch failures
#[derive(Error, Debug)]
pub enum FetchError {
    /// The resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage failed while reading
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// Resource path
        path: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Any other backend failure
    #[error("Fetch failed: {0}")]
    Other(String),
}

impl FetchError {
    /// Whether this means "nothing stored here"
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Storage backend for chunked maps
pub trait ChunkSource: Send + Sync + fmt::Debug {
    /// Read the chunk index
    fn fetch_master(&self) -> Result<Vec<u8>, FetchError>;

    /// Read one chunk file
    fn fetch_chunk(&self, coord: ChunkCoord) -> Result<Vec<u8>, FetchError>;
}

/// Chunk files in a directory
#[derive(Debug, Clone)]
pub struct FsChunkSource {
    root: PathBuf,
}

impl FsChunkSource {
    /// Source reading from `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Whether the index file exists
    pub fn has_master(&self) -> bool {
        self.root.join(MASTER_FILE).is_file()
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, FetchError> {
        let path = self.root.join(name);
        std::fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FetchError::NotFound(path.display().to_string()),
            _ => FetchError::Io {
                path: path.display().to_string(),
                source: e,
            },
        })
    }
}

impl ChunkSource for FsChunkSource {
    fn fetch_master(&self) -> Result<Vec<u8>, FetchError> {
        self.read(MASTER_FILE)
    }

    fn fetch_chunk(&self, coord: ChunkCoord) -> Result<Vec<u8>, FetchError> {
        self.read(&chunk_file_name(coord))
    }
}

/// Chunk files held in memory, with injectable failures
#[derive(Debug, Default)]
pub struct MemoryChunkSource {
    files: Mutex<HashMap<String, Vec<u8>>>,
    failures: Mutex<HashMap<String, String>>,
    fetches: AtomicUsize,
}

impl MemoryChunkSource {
    /// Empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a file
    pub fn insert(&self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        if let Ok(mut files) = self.files.lock() {
            files.insert(name.into(), bytes.into());
        }
    }

    /// Store the index
    pub fn insert_master(&self, bytes: impl Into<Vec<u8>>) {
        self.insert(MASTER_FILE, bytes);
    }

    /// Store a chunk
    pub fn insert_chunk(&self, coord: ChunkCoord, bytes: impl Into<Vec<u8>>) {
        self.insert(chunk_file_name(coord), bytes);
    }

    /// Make fetches of `name` fail with a transient error
    pub fn fail(&self, name: impl Into<String>, reason: impl Into<String>) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(name.into(), reason.into());
        }
    }

    /// Stop failing fetches of `name`
    pub fn heal(&self, name: &str) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.remove(name);
        }
    }

    /// Number of fetches served so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let failures = self.failures.lock().map_err(|e| FetchError::Other(e.to_string()))?;
        if let Some(reason) = failures.get(name) {
            return Err(FetchError::Other(reason.clone()));
        }
        drop(failures);

        let files = self.files.lock().map_err(|e| FetchError::Other(e.to_string()))?;
        files
            .get(name)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(name.to_string()))
    }
}

impl ChunkSource for MemoryChunkSource {
    fn fetch_master(&self) -> Result<Vec<u8>, FetchError> {
        self.read(MASTER_FILE)
    }

    fn fetch_chunk(&self, coord: ChunkCoord) -> Result<Vec<u8>, FetchError> {
        self.read(&chunk_file_name(coord))
    }
}
