//! # Core Engine Module
//!
//! Shared configuration used by every subsystem.

pub mod config;

pub use config::{
    CameraConfig,
    ChunkConfig,
    Config,
    ConfigError,
    CullingConfig,
    DisplayConfig,
    EngineConfig,
    LoggingConfig,
};
