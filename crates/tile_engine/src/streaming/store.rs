//! Chunk streaming around a moving reference point

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use image::RgbaImage;

use crate::core::config::EngineConfig;
use crate::foundation::collections::WallSet;
use crate::foundation::math::Vec2;
use crate::render::tileset::Tileset;
use crate::scene::node::NodeId;
use crate::scene::tree::SceneTree;
use crate::streaming::chunk::{Chunk, ChunkContext};
use crate::streaming::loader::{ChunkLoader, LoadOutcome, LoadResult};
use crate::streaming::master::ChunkMaster;
use crate::streaming::source::ChunkSource;
use crate::streaming::window::{ChunkCoord, ChunkGrid, ChunkWindow};
use crate::streaming::ChunkError;
use crate::tilemap::parser::MapObject;

/// The level a store streams into: its scene node and its aggregate walls
pub struct LevelTarget<'a> {
    /// Scene tree holding the level
    pub tree: &'a mut SceneTree,
    /// Level node chunks attach under
    pub node: NodeId,
    /// Aggregate collision set, rebuilt after every structural change
    pub walls: &'a mut WallSet,
}

/// Running totals, mostly for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Chunk files requested
    pub requests: usize,
    /// Chunks attached
    pub loads: usize,
    /// Chunks detached
    pub unloads: usize,
    /// Cells found to be empty
    pub missing: usize,
    /// Transient failures
    pub failures: usize,
    /// Completions dropped because the window moved on
    pub discarded: usize,
}

/// Keeps the chunks around a reference point loaded.
///
/// A chunk is active iff it lies in the required window computed at the
/// last reference point, clamped to the map. Loading is asynchronous: a
/// request becomes an active chunk only once it has been fully decoded and
/// attached to the scene.
#[derive(Debug)]
pub struct ChunkStore {
    context: Arc<ChunkContext>,
    grid: ChunkGrid,
    loader: ChunkLoader,
    active: HashMap<ChunkCoord, Chunk>,
    pending: HashMap<ChunkCoord, u64>,
    known_empty: HashSet<ChunkCoord>,
    last_reference: Option<ChunkCoord>,
    window: Option<ChunkWindow>,
    generation: u64,
    stats: StreamStats,
}

impl ChunkStore {
    /// Read the index from `source` and slice `tileset_image` to its tile size
    pub fn open(
        source: Arc<dyn ChunkSource>,
        tileset_image: Arc<RgbaImage>,
        config: &EngineConfig,
    ) -> Result<Self, ChunkError> {
        let master = ChunkMaster::from_slice(&source.fetch_master()?)?;
        let tileset = Tileset::new(tileset_image, master.tile_width, master.tile_height)?;
        log::info!(
            "Opened chunk index: {}x{} chunks of {}x{} tiles",
            master.chunks_x,
            master.chunks_y,
            master.chunk_width,
            master.chunk_height
        );
        Ok(Self::new(source, master, Arc::new(tileset), config))
    }

    /// Store over an index that is already decoded
    pub fn new(source: Arc<dyn ChunkSource>, master: ChunkMaster, tileset: Arc<Tileset>, config: &EngineConfig) -> Self {
        let viewport = Vec2::new(
            config.display.viewport_width as f32,
            config.display.viewport_height as f32,
        );
        let grid = ChunkGrid::new(&master, viewport, config.chunks.load_margin);
        let context = Arc::new(
            ChunkContext::new(Arc::new(master), tileset)
                .with_padding(config.culling.tile_padding, config.culling.sprite_padding),
        );
        let loader = ChunkLoader::new(source, Arc::clone(&context), config.chunks.worker_threads);

        Self {
            context,
            grid,
            loader,
            active: HashMap::new(),
            pending: HashMap::new(),
            known_empty: HashSet::new(),
            last_reference: None,
            window: None,
            generation: 0,
            stats: StreamStats::default(),
        }
    }

    /// Chunk index
    pub fn master(&self) -> &ChunkMaster {
        &self.context.master
    }

    /// Cell containing a world position
    pub fn chunk_coords(&self, x: f32, y: f32) -> ChunkCoord {
        self.grid.coord_at(x, y)
    }

    /// Window required for a reference point
    pub fn required_window(&self, x: f32, y: f32) -> ChunkWindow {
        self.grid.required_window(x, y)
    }

    /// Stream around `(ref_x, ref_y)`.
    ///
    /// Finished loads are attached first. If the reference point is still in
    /// the same chunk cell as last time nothing else happens. Otherwise
    /// chunks outside the new window are unloaded, then missing ones are
    /// requested. The aggregate walls are rebuilt after any change.
    pub fn update(&mut self, ref_x: f32, ref_y: f32, target: &mut LevelTarget<'_>) -> Result<(), ChunkError> {
        let mut changed = self.apply_completed(target);

        let cell = self.grid.coord_at(ref_x, ref_y);
        if self.last_reference == Some(cell) {
            if changed {
                self.rebuild_walls(target.walls);
            }
            return Ok(());
        }
        self.last_reference = Some(cell);

        let window = self.grid.required_window(ref_x, ref_y);
        log::trace!("Reference entered chunk {cell}; window {window:?}");
        changed |= self.unload_outside(window, target);
        self.request_missing(window);
        changed |= self.apply_completed(target);

        if changed {
            self.rebuild_walls(target.walls);
        }
        Ok(())
    }

    /// Load the window around a spawn point and wait for every chunk in it
    pub fn load_initial_chunks(
        &mut self,
        spawn_x: f32,
        spawn_y: f32,
        target: &mut LevelTarget<'_>,
    ) -> Result<usize, ChunkError> {
        let window = self.grid.required_window(spawn_x, spawn_y);
        log::info!(
            "Loading initial chunks around {}...",
            self.grid.coord_at(spawn_x, spawn_y)
        );

        self.unload_outside(window, target);
        self.request_missing(window);
        while !self.pending.is_empty() {
            let Some(outcome) = self.loader.wait_completed() else {
                break;
            };
            self.apply_outcome(outcome, target);
        }
        self.apply_completed(target);
        self.rebuild_walls(target.walls);

        log::info!("Loaded {} initial chunks", self.active.len());
        Ok(self.active.len())
    }

    /// Unload everything and forget which cells were empty
    pub fn unload_all(&mut self, target: &mut LevelTarget<'_>) {
        let chunks: Vec<ChunkCoord> = self.active.keys().copied().collect();
        for coord in chunks {
            if let Some(chunk) = self.active.remove(&coord) {
                chunk.destroy(target.tree);
                self.stats.unloads += 1;
                log::debug!("Unloaded chunk {coord}");
            }
        }
        self.pending.clear();
        self.known_empty.clear();
        self.last_reference = None;
        self.window = None;
        self.generation += 1;
        target.walls.clear();
        log::info!("All chunks unloaded");
    }

    /// Coordinates of active chunks, sorted
    pub fn active_chunk_keys(&self) -> Vec<ChunkCoord> {
        let mut keys: Vec<ChunkCoord> = self.active.keys().copied().collect();
        keys.sort_by_key(|c| (c.y, c.x));
        keys
    }

    /// Number of active chunks
    pub fn active_chunk_count(&self) -> usize {
        self.active.len()
    }

    /// Whether the chunk containing a world position is active
    pub fn has_chunk_at(&self, world_x: f32, world_y: f32) -> bool {
        self.active.contains_key(&self.grid.coord_at(world_x, world_y))
    }

    /// Active chunk at `coord`
    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.active.get(&coord)
    }

    /// Whether `coord` was found to hold no chunk
    pub fn is_known_empty(&self, coord: ChunkCoord) -> bool {
        self.known_empty.contains(&coord)
    }

    /// Requests still loading
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Window computed at the last reference change
    pub fn window(&self) -> Option<ChunkWindow> {
        self.window
    }

    /// Running totals
    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Objects of `kind` across active chunks
    pub fn objects_by_type(&self, kind: &str) -> Vec<&MapObject> {
        let mut found: Vec<&MapObject> = self
            .active
            .values()
            .flat_map(|c| c.objects().iter())
            .filter(|o| o.kind == kind)
            .collect();
        found.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));
        found
    }

    fn unload_outside(&mut self, window: ChunkWindow, target: &mut LevelTarget<'_>) -> bool {
        self.window = Some(window);
        self.generation += 1;

        // Collect first; the map is not touched while iterating
        let outside: Vec<ChunkCoord> = self.active.keys().filter(|c| !window.contains(**c)).copied().collect();
        for coord in &outside {
            if let Some(chunk) = self.active.remove(coord) {
                chunk.destroy(target.tree);
                self.stats.unloads += 1;
                log::debug!("Unloaded chunk {coord}");
            }
        }
        self.pending.retain(|coord, _| window.contains(*coord));
        !outside.is_empty()
    }

    fn request_missing(&mut self, window: ChunkWindow) {
        for coord in window.iter() {
            if self.active.contains_key(&coord)
                || self.pending.contains_key(&coord)
                || self.known_empty.contains(&coord)
            {
                continue;
            }
            self.pending.insert(coord, self.generation);
            self.loader.request(coord, self.generation);
            self.stats.requests += 1;
        }
    }

    fn apply_completed(&mut self, target: &mut LevelTarget<'_>) -> bool {
        let mut changed = false;
        for outcome in self.loader.try_completed() {
            changed |= self.apply_outcome(outcome, target);
        }
        changed
    }

    /// Attach or record one completion; returns whether a chunk was attached
    fn apply_outcome(&mut self, outcome: LoadOutcome, target: &mut LevelTarget<'_>) -> bool {
        let LoadOutcome { coord, generation, result } = outcome;
        let expected = self.pending.get(&coord).copied();
        let in_window = self.window.is_some_and(|w| w.contains(coord));
        if expected != Some(generation) || !in_window {
            self.stats.discarded += 1;
            log::trace!("Discarding stale load of chunk {coord}");
            return false;
        }
        self.pending.remove(&coord);

        match result {
            LoadResult::Loaded(contents) => {
                if self.active.contains_key(&coord) {
                    return false;
                }
                match Chunk::attach(*contents, target.tree, target.node, &self.context) {
                    Ok(chunk) => {
                        self.active.insert(coord, chunk);
                        self.stats.loads += 1;
                        log::debug!("Loaded chunk {coord}");
                        true
                    }
                    Err(e) => {
                        // Retried on the next window change like any other failure
                        self.stats.failures += 1;
                        log::warn!("Error attaching chunk {coord}: {e}");
                        false
                    }
                }
            }
            LoadResult::Missing => {
                self.known_empty.insert(coord);
                self.stats.missing += 1;
                log::debug!("Chunk {coord} not found (empty), skipping");
                false
            }
            LoadResult::Failed(e) => {
                self.stats.failures += 1;
                log::warn!("Error loading chunk {coord}: {e}");
                false
            }
        }
    }

    fn rebuild_walls(&self, walls: &mut WallSet) {
        walls.clear();
        for chunk in self.active.values() {
            walls.extend_from(chunk.walls());
        }
        log::trace!("Rebuilt walls from {} chunks: {} cells", self.active.len(), walls.len());
    }
}
