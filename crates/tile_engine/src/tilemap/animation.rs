//! Tile animation tables and playback state

use std::collections::HashMap;

use crate::tilemap::properties::TileCatalog;

/// One frame of a tile animation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationFrame {
    /// Tile shown during this frame
    pub tile_id: u32,
    /// How long the frame stays up, in milliseconds
    pub duration_ms: u32,
}

impl AnimationFrame {
    /// Create a frame
    pub const fn new(tile_id: u32, duration_ms: u32) -> Self {
        Self { tile_id, duration_ms }
    }
}

/// Ordered frame list of an animated tile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Animation {
    frames: Vec<AnimationFrame>,
}

impl Animation {
    /// Create from frames
    pub fn new(frames: Vec<AnimationFrame>) -> Self {
        Self { frames }
    }

    /// Frames in playback order
    pub fn frames(&self) -> &[AnimationFrame] {
        &self.frames
    }

    /// Sum of all frame durations
    pub fn total_duration_ms(&self) -> u64 {
        self.frames.iter().map(|f| u64::from(f.duration_ms)).sum()
    }
}

/// Playback position within an [`Animation`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AnimationState {
    frame_index: usize,
    time_in_frame: f32,
}

impl AnimationState {
    /// Current frame index
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// Time spent in the current frame
    pub fn time_in_frame(&self) -> f32 {
        self.time_in_frame
    }

    /// Accumulate `delta_ms` and move past every frame whose duration has
    /// been reached. Returns whether the visible frame changed.
    pub fn advance(&mut self, animation: &Animation, delta_ms: f32) -> bool {
        let frames = animation.frames();
        if frames.is_empty() {
            return false;
        }
        let start = self.frame_index;
        self.time_in_frame += delta_ms;

        // Zero-length frames would spin forever; a full cycle of them is skipped
        let mut guard = frames.len();
        loop {
            let duration = frames[self.frame_index % frames.len()].duration_ms as f32;
            if self.time_in_frame < duration {
                break;
            }
            if duration <= 0.0 {
                if guard == 0 {
                    break;
                }
                guard -= 1;
            } else {
                guard = frames.len();
            }
            self.time_in_frame -= duration;
            self.frame_index = (self.frame_index + 1) % frames.len();
        }
        self.frame_index != start
    }

    /// Tile id of the current frame
    pub fn current_tile(&self, animation: &Animation) -> Option<u32> {
        animation
            .frames()
            .get(self.frame_index % animation.frames().len().max(1))
            .map(|f| f.tile_id)
    }
}

/// Shared playback state for every animated tile id of a tileset.
///
/// All placed instances of the same animated tile advance in lockstep.
#[derive(Debug, Clone, Default)]
pub struct TileAnimator {
    states: HashMap<u32, AnimationState>,
}

impl TileAnimator {
    /// One state per animated tile in `catalog`
    pub fn new(catalog: &TileCatalog) -> Self {
        Self {
            states: catalog
                .animations()
                .map(|(id, _)| (id, AnimationState::default()))
                .collect(),
        }
    }

    /// Advance every animation
    pub fn advance(&mut self, catalog: &TileCatalog, delta_ms: f32) {
        for (tile_id, state) in &mut self.states {
            if let Some(animation) = catalog.animation(*tile_id) {
                state.advance(animation, delta_ms);
            }
        }
    }

    /// Tile to draw for `tile_id` right now
    pub fn current_tile(&self, catalog: &TileCatalog, tile_id: u32) -> u32 {
        match (self.states.get(&tile_id), catalog.animation(tile_id)) {
            (Some(state), Some(animation)) => state.current_tile(animation).unwrap_or(tile_id),
            _ => tile_id,
        }
    }

    /// Number of tracked animations
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// No animated tiles
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
