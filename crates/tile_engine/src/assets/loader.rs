//! File loaders for map documents and tileset images

use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::assets::{AssetError, Resource};
use crate::tilemap::format::MapData;

/// Read and decode a map document
pub fn load_map_file<P: AsRef<Path>>(path: P) -> Result<MapData, AssetError> {
    let path_ref = path.as_ref();
    log::debug!("Loading map from: {:?}", path_ref);

    let bytes = std::fs::read(path_ref).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AssetError::NotFound(path_ref.display().to_string()),
        _ => AssetError::IoError(e),
    })?;
    let map = parse_map_bytes(&bytes)?;

    log::info!(
        "Loaded map {}x{} tiles ({} layers) from {:?}",
        map.width,
        map.height,
        map.layers.len(),
        path_ref
    );
    Ok(map)
}

/// Decode a map document already in memory
pub fn parse_map_bytes(bytes: &[u8]) -> Result<MapData, AssetError> {
    serde_json::from_slice(bytes).map_err(|e| AssetError::InvalidData(format!("Invalid map document: {e}")))
}

/// Load an image file as RGBA8
pub fn load_image_file<P: AsRef<Path>>(path: P) -> Result<RgbaImage, AssetError> {
    let path_ref = path.as_ref();
    log::debug!("Loading image from: {:?}", path_ref);

    if !path_ref.exists() {
        return Err(AssetError::NotFound(path_ref.display().to_string()));
    }
    let img = image::open(path_ref).map_err(|e| AssetError::LoadFailed(format!("Failed to load image: {e}")))?;
    let rgba = img.to_rgba8();

    log::info!("Loaded image {}x{} from {:?}", rgba.width(), rgba.height(), path_ref);
    Ok(rgba)
}

/// Decode an image from memory as RGBA8
pub fn load_image_bytes(bytes: &[u8]) -> Result<RgbaImage, AssetError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| AssetError::LoadFailed(format!("Failed to load image from bytes: {e}")))?;
    let rgba = img.to_rgba8();
    log::debug!("Loaded image {}x{} from memory", rgba.width(), rgba.height());
    Ok(rgba)
}

/// Background loader rooted at an asset directory
#[derive(Debug, Clone)]
pub struct AssetLoader {
    root: PathBuf,
}

impl AssetLoader {
    /// Loader resolving paths relative to `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Asset root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative asset path
    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    /// Start loading a map document
    pub fn map(&self, relative: impl AsRef<Path>) -> Resource<MapData> {
        let path = self.resolve(relative);
        Resource::spawn(path.display().to_string(), move || load_map_file(&path))
    }

    /// Start loading an image
    pub fn image(&self, relative: impl AsRef<Path>) -> Resource<RgbaImage> {
        let path = self.resolve(relative);
        Resource::spawn(path.display().to_string(), move || load_image_file(&path))
    }
}
