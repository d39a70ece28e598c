// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Dirty-bit bookkeeping between scene edits and the next sync.

use bitflags::bitflags;
use covah_core::PrimPath;
use std::collections::{BTreeMap, BTreeSet, HashMap};

bitflags! {
    /// What changed on an rprim since it was last synced.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DirtyBits: u32 {
        /// The rprim has never been synced.
        const INIT_REPR = 1 << 0;
        /// Point positions changed.
        const DIRTY_POINTS = 1 << 1;
        /// Some other primvar changed.
        const DIRTY_PRIMVAR = 1 << 2;
        /// Mesh topology changed.
        const DIRTY_TOPOLOGY = 1 << 3;
        /// The transform changed.
        const DIRTY_TRANSFORM = 1 << 4;
        /// Visibility changed.
        const DIRTY_VISIBILITY = 1 << 5;
        /// A computation feeding the rprim changed.
        const DIRTY_EXT_COMPUTATION = 1 << 6;

        /// Everything.
        const ALL_DIRTY = Self::INIT_REPR.bits()
            | Self::DIRTY_POINTS.bits()
            | Self::DIRTY_PRIMVAR.bits()
            | Self::DIRTY_TOPOLOGY.bits()
            | Self::DIRTY_TRANSFORM.bits()
            | Self::DIRTY_VISIBILITY.bits()
            | Self::DIRTY_EXT_COMPUTATION.bits();
    }
}

bitflags! {
    /// What changed on a computation prim since it was last synced.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ExtComputationDirtyBits: u32 {
        /// Input names or bindings changed.
        const DIRTY_INPUT_DESC = 1 << 0;
        /// Output declarations changed.
        const DIRTY_OUTPUT_DESC = 1 << 1;
        /// The element count changed.
        const DIRTY_ELEMENT_COUNT = 1 << 2;
        /// A scene input value changed.
        const DIRTY_SCENE_INPUT = 1 << 3;
        /// The compute callback changed.
        const DIRTY_KERNEL = 1 << 4;

        /// Everything.
        const ALL_DIRTY = Self::DIRTY_INPUT_DESC.bits()
            | Self::DIRTY_OUTPUT_DESC.bits()
            | Self::DIRTY_ELEMENT_COUNT.bits()
            | Self::DIRTY_SCENE_INPUT.bits()
            | Self::DIRTY_KERNEL.bits();
    }
}

/// Tracks dirty bits of rprims and computations, and which prims consume
/// each computation.
///
/// Marking a computation dirty also marks everything downstream of it, so an
/// rprim fed by a deformer chain re-syncs when any link changes.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    rprims: BTreeMap<PrimPath, DirtyBits>,
    computations: BTreeMap<PrimPath, ExtComputationDirtyBits>,
    dependents: HashMap<PrimPath, BTreeSet<PrimPath>>,
    scene_state_version: u64,
    rprim_index_version: u64,
}

impl ChangeTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `id` with `initial` dirty bits.
    pub fn rprim_inserted(&mut self, id: PrimPath, initial: DirtyBits) {
        self.rprims.insert(id, initial);
        self.rprim_index_version += 1;
        self.scene_state_version += 1;
    }

    /// Stops tracking `id`.
    pub fn rprim_removed(&mut self, id: &PrimPath) {
        self.rprims.remove(id);
        for dependents in self.dependents.values_mut() {
            dependents.remove(id);
        }
        self.rprim_index_version += 1;
        self.scene_state_version += 1;
    }

    /// Adds `bits` to the dirty state of `id`.
    pub fn mark_rprim_dirty(&mut self, id: &PrimPath, bits: DirtyBits) {
        match self.rprims.get_mut(id) {
            Some(state) => {
                *state |= bits;
                self.scene_state_version += 1;
            }
            None => log::debug!("Ignoring dirty bits for untracked rprim {}", id),
        }
    }

    /// Clears `bits` from the dirty state of `id`.
    pub fn mark_rprim_clean(&mut self, id: &PrimPath, bits: DirtyBits) {
        if let Some(state) = self.rprims.get_mut(id) {
            state.remove(bits);
        }
    }

    /// The dirty bits of `id`; empty for untracked prims.
    pub fn rprim_dirty_bits(&self, id: &PrimPath) -> DirtyBits {
        self.rprims.get(id).copied().unwrap_or_default()
    }

    /// Returns `true` if `id` has any dirty bit.
    pub fn is_rprim_dirty(&self, id: &PrimPath) -> bool {
        !self.rprim_dirty_bits(id).is_empty()
    }

    /// The rprims with dirty bits, in path order.
    pub fn dirty_rprim_ids(&self) -> Vec<PrimPath> {
        self.rprims
            .iter()
            .filter(|(_, bits)| !bits.is_empty())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Starts tracking computation `id`, fully dirty.
    pub fn ext_computation_inserted(&mut self, id: PrimPath) {
        self.computations.insert(id, ExtComputationDirtyBits::ALL_DIRTY);
        self.scene_state_version += 1;
    }

    /// Stops tracking computation `id` and dirties its consumers.
    pub fn ext_computation_removed(&mut self, id: &PrimPath) {
        self.mark_ext_computation_dirty(id, ExtComputationDirtyBits::ALL_DIRTY);
        self.computations.remove(id);
        self.dependents.remove(id);
    }

    /// Adds `bits` to computation `id` and dirties everything downstream.
    pub fn mark_ext_computation_dirty(&mut self, id: &PrimPath, bits: ExtComputationDirtyBits) {
        if let Some(state) = self.computations.get_mut(id) {
            *state |= bits;
        }
        self.scene_state_version += 1;

        let mut visited = BTreeSet::new();
        let mut pending = vec![id.clone()];
        while let Some(current) = pending.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            let Some(dependents) = self.dependents.get(&current) else {
                continue;
            };
            for dependent in dependents {
                if let Some(state) = self.computations.get_mut(dependent) {
                    *state |= ExtComputationDirtyBits::DIRTY_SCENE_INPUT;
                }
                if let Some(state) = self.rprims.get_mut(dependent) {
                    *state |= DirtyBits::DIRTY_EXT_COMPUTATION;
                }
                pending.push(dependent.clone());
            }
        }
    }

    /// Clears computation `id`.
    pub fn mark_ext_computation_clean(&mut self, id: &PrimPath) {
        if let Some(state) = self.computations.get_mut(id) {
            *state = ExtComputationDirtyBits::empty();
        }
    }

    /// The dirty bits of computation `id`.
    pub fn ext_computation_dirty_bits(&self, id: &PrimPath) -> ExtComputationDirtyBits {
        self.computations.get(id).copied().unwrap_or_default()
    }

    /// The computations with dirty bits, in path order.
    pub fn dirty_ext_computation_ids(&self) -> Vec<PrimPath> {
        self.computations
            .iter()
            .filter(|(_, bits)| !bits.is_empty())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Records that `dependent` (an rprim or computation) reads from
    /// computation `computation`.
    pub fn add_dependency(&mut self, computation: &PrimPath, dependent: &PrimPath) {
        self.dependents
            .entry(computation.clone())
            .or_default()
            .insert(dependent.clone());
    }

    /// Forgets every dependency `dependent` declared.
    pub fn remove_dependent(&mut self, dependent: &PrimPath) {
        for dependents in self.dependents.values_mut() {
            dependents.remove(dependent);
        }
    }

    /// Bumped on every change. Consumers compare it to skip idle frames.
    pub fn scene_state_version(&self) -> u64 {
        self.scene_state_version
    }

    /// Bumped when rprims are inserted or removed.
    pub fn rprim_index_version(&self) -> u64 {
        self.rprim_index_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(text: &str) -> PrimPath {
        PrimPath::new(text).unwrap()
    }

    #[test]
    fn test_rprim_dirty_and_clean() {
        let mut tracker = ChangeTracker::new();
        let mesh = path("/Mesh");
        tracker.rprim_inserted(mesh.clone(), DirtyBits::ALL_DIRTY);
        tracker.mark_rprim_clean(&mesh, DirtyBits::ALL_DIRTY);
        assert!(!tracker.is_rprim_dirty(&mesh));

        let version = tracker.scene_state_version();
        tracker.mark_rprim_dirty(&mesh, DirtyBits::DIRTY_POINTS);

        assert_eq!(tracker.rprim_dirty_bits(&mesh), DirtyBits::DIRTY_POINTS);
        assert_eq!(tracker.dirty_rprim_ids(), vec![mesh]);
        assert!(tracker.scene_state_version() > version);
    }

    #[test]
    fn test_computation_change_reaches_downstream_rprims() {
        // --- 1. ARRANGE: /Rest -> /Skin -> /Mesh ---
        let mut tracker = ChangeTracker::new();
        let (rest, skin, mesh) = (path("/Rest"), path("/Skin"), path("/Mesh"));
        tracker.ext_computation_inserted(rest.clone());
        tracker.ext_computation_inserted(skin.clone());
        tracker.rprim_inserted(mesh.clone(), DirtyBits::empty());
        tracker.mark_ext_computation_clean(&rest);
        tracker.mark_ext_computation_clean(&skin);
        tracker.add_dependency(&rest, &skin);
        tracker.add_dependency(&skin, &mesh);

        // --- 2. ACT ---
        tracker.mark_ext_computation_dirty(&rest, ExtComputationDirtyBits::DIRTY_SCENE_INPUT);

        // --- 3. ASSERT ---
        assert_eq!(
            tracker.ext_computation_dirty_bits(&skin),
            ExtComputationDirtyBits::DIRTY_SCENE_INPUT
        );
        assert!(tracker
            .rprim_dirty_bits(&mesh)
            .contains(DirtyBits::DIRTY_EXT_COMPUTATION));
    }

    #[test]
    fn test_removed_rprim_is_untracked() {
        let mut tracker = ChangeTracker::new();
        let mesh = path("/Mesh");
        tracker.rprim_inserted(mesh.clone(), DirtyBits::ALL_DIRTY);
        let index_version = tracker.rprim_index_version();

        tracker.rprim_removed(&mesh);
        tracker.mark_rprim_dirty(&mesh, DirtyBits::DIRTY_POINTS);

        assert!(tracker.dirty_rprim_ids().is_empty());
        assert!(tracker.rprim_index_version() > index_version);
    }
}
