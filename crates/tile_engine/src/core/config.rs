//! # Unified Configuration System
//!
//! All engine tunables in one place. Defaults reproduce the stock 768x432
//! viewport, a 40x30 camera dead zone, one chunk of streaming margin and the
//! 16/32 pixel culling paddings.
//!
//! ## Configuration Categories
//!
//! - **Display**: Viewport dimensions used by culling, streaming and the camera
//! - **Camera**: Dead-zone tracking parameters
//! - **Chunk**: Streaming margin, chunk directory, loader threads
//! - **Culling**: Off-screen padding for tiles and sprites
//! - **Logging**: Default log filter

use serde::{Serialize, Deserialize};

pub use crate::config::{Config, ConfigError};

/// Viewport configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Visible width in pixels
    pub viewport_width: u32,
    /// Visible height in pixels
    pub viewport_height: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            viewport_width: 768,
            viewport_height: 432,
        }
    }
}

/// # Camera Configuration
///
/// Dead-zone extents are half sizes: the target may drift
/// `dead_zone_width` pixels left or right of the screen centre before the
/// camera follows. Set both to zero for an instant follow.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Horizontal dead-zone half extent
    pub dead_zone_width: f32,
    /// Vertical dead-zone half extent
    pub dead_zone_height: f32,
    /// Offset from a target's position to its visual centre
    pub target_half_size: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            dead_zone_width: 40.0,
            dead_zone_height: 30.0,
            target_half_size: 8.0,
        }
    }
}

/// Chunk streaming configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Extra chunks kept loaded on each side of the viewport
    pub load_margin: u32,
    /// Directory containing `master.json` and the chunk files
    pub chunks_path: String,
    /// Background loader threads (0 loads synchronously on the frame thread)
    pub worker_threads: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            load_margin: 1,
            chunks_path: "maps/chunks/".to_string(),
            worker_threads: 2,
        }
    }
}

impl ChunkConfig {
    /// Set the load margin in chunks
    pub fn with_load_margin(mut self, margin: u32) -> Self {
        self.load_margin = margin;
        self
    }

    /// Set the chunk directory
    pub fn with_chunks_path(mut self, path: impl Into<String>) -> Self {
        self.chunks_path = path.into();
        self
    }

    /// Set the number of loader threads
    pub fn with_worker_threads(mut self, workers: usize) -> Self {
        self.worker_threads = workers;
        self
    }
}

/// Off-screen culling padding
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullingConfig {
    /// Padding applied to layer tiles
    pub tile_padding: f32,
    /// Padding applied to promoted sprites
    pub sprite_padding: f32,
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self {
            tile_padding: 16.0,
            sprite_padding: 32.0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter used when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

/// # Engine Configuration
///
/// Top-level configuration that encompasses all engine subsystems.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Viewport
    pub display: DisplayConfig,
    /// Camera tracking
    pub camera: CameraConfig,
    /// Chunk streaming
    pub chunks: ChunkConfig,
    /// Culling paddings
    pub culling: CullingConfig,
    /// Logging
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the viewport size
    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.display.viewport_width = width;
        self.display.viewport_height = height;
        self
    }

    /// Set the camera dead zone
    pub fn with_dead_zone(mut self, width: f32, height: f32) -> Self {
        self.camera.dead_zone_width = width;
        self.camera.dead_zone_height = height;
        self
    }

    /// Replace the chunk configuration
    pub fn with_chunks(mut self, chunks: ChunkConfig) -> Self {
        self.chunks = chunks;
        self
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.logging.level = level.into();
        self
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.display.viewport_width == 0 || self.display.viewport_height == 0 {
            return Err(ConfigError::Invalid("Viewport dimensions must be non-zero".to_string()));
        }
        if self.camera.dead_zone_width < 0.0 || self.camera.dead_zone_height < 0.0 {
            return Err(ConfigError::Invalid("Dead zone extents cannot be negative".to_string()));
        }
        if self.culling.tile_padding < 0.0 || self.culling.sprite_padding < 0.0 {
            return Err(ConfigError::Invalid("Culling padding cannot be negative".to_string()));
        }
        Ok(())
    }
}

impl Config for EngineConfig {}
