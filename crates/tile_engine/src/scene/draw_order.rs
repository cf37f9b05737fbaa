//! Y-sort bookkeeping for a node's children
//!
//! Immobile children live in `statics`, kept sorted at insertion time with a
//! binary search. Moving children live in `dynamics` and are only sorted
//! when the merged order is requested while dirty. The merged sequence is
//! cached until the next invalidation.

use std::cmp::Ordering;

use crate::scene::node::NodeId;

/// One child as seen by the sorter
#[derive(Debug, Clone, Copy)]
pub(crate) struct SortEntry {
    pub(crate) id: NodeId,
    pub(crate) floor: bool,
    pub(crate) key: f32,
    pub(crate) seq: u64,
}

impl SortEntry {
    /// Floor first, then ascending Y, then insertion order
    pub(crate) fn compare(&self, other: &Self) -> Ordering {
        other
            .floor
            .cmp(&self.floor)
            .then_with(|| self.key.total_cmp(&other.key))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

#[derive(Debug, Default)]
pub(crate) struct DrawOrder {
    statics: Vec<SortEntry>,
    dynamics: Vec<SortEntry>,
    cache: Vec<NodeId>,
    dirty: bool,
    next_seq: u64,
}

impl DrawOrder {
    pub(crate) fn insert_static(&mut self, id: NodeId, floor: bool, key: f32) {
        let entry = self.entry(id, floor, key);
        let at = self
            .statics
            .partition_point(|existing| existing.compare(&entry) == Ordering::Less);
        self.statics.insert(at, entry);
        self.dirty = true;
    }

    pub(crate) fn insert_dynamic(&mut self, id: NodeId, floor: bool, key: f32) {
        let entry = self.entry(id, floor, key);
        self.dynamics.push(entry);
        self.dirty = true;
    }

    pub(crate) fn remove(&mut self, id: NodeId) {
        self.statics.retain(|e| e.id != id);
        self.dynamics.retain(|e| e.id != id);
        self.dirty = true;
    }

    pub(crate) fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn dynamics_mut(&mut self) -> &mut [SortEntry] {
        &mut self.dynamics
    }

    /// Merged order; `refresh` must have been called since the last change
    pub(crate) fn cached(&self) -> &[NodeId] {
        &self.cache
    }

    /// Sort the moving children and merge them with the presorted statics
    pub(crate) fn refresh(&mut self) {
        if !self.dirty {
            return;
        }
        self.dynamics.sort_by(SortEntry::compare);

        self.cache.clear();
        self.cache.reserve(self.statics.len() + self.dynamics.len());
        let (mut s, mut d) = (0, 0);
        while s < self.statics.len() && d < self.dynamics.len() {
            if self.statics[s].compare(&self.dynamics[d]) == Ordering::Greater {
                self.cache.push(self.dynamics[d].id);
                d += 1;
            } else {
                self.cache.push(self.statics[s].id);
                s += 1;
            }
        }
        self.cache.extend(self.statics[s..].iter().map(|e| e.id));
        self.cache.extend(self.dynamics[d..].iter().map(|e| e.id));
        self.dirty = false;
    }

    fn entry(&mut self, id: NodeId, floor: bool, key: f32) -> SortEntry {
        let seq = self.next_seq;
        self.next_seq += 1;
        SortEntry { id, floor, key, seq }
    }
}
