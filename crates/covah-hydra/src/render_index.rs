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

//! The live set of prims handed to one render delegate.

use crate::change_tracker::{ChangeTracker, DirtyBits, ExtComputationDirtyBits};
use crate::ext_computation::{ExtComputation, ExtComputationCatalog, ExtComputationDescriptor};
use crate::plugin::PluginRenderDelegateUniqueHandle;
use crate::render_delegate::RenderDelegate;
use crate::render_pass::{RenderPass, RenderPassState};
use crate::rprim::{Rprim, RprimSyncContext};
use crate::scene_delegate::SceneDelegate;
use crate::sorted_ids::SortedIds;
use covah_core::telemetry::perf::{tokens, PerfLog};
use covah_core::{PrimPath, Token};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

struct RprimEntry {
    type_id: Token,
    scene_delegate: Arc<dyn SceneDelegate>,
    rprim: Box<dyn Rprim>,
}

struct ComputationEntry {
    scene_delegate: Arc<dyn SceneDelegate>,
    computation: ExtComputation,
}

/// The synced computation prims, looked up by rprims while they build their
/// computation graphs.
#[derive(Default)]
struct ComputationTable(BTreeMap<PrimPath, ComputationEntry>);

impl ExtComputationCatalog for ComputationTable {
    fn ext_computation(&self, id: &PrimPath) -> Option<&ExtComputationDescriptor> {
        self.0.get(id).map(|entry| entry.computation.descriptor())
    }
}

/// Tracks every prim of a scene for one render delegate.
///
/// Each frame, [`sync_all`](Self::sync_all) pulls the dirty prims from their
/// scene delegates and commits the delegate's resources. Render passes then
/// read the committed ranges through [`rprim`](Self::rprim).
pub struct RenderIndex {
    delegate: PluginRenderDelegateUniqueHandle,
    rprim_ids: SortedIds,
    rprims: HashMap<PrimPath, RprimEntry>,
    computations: ComputationTable,
    tracker: ChangeTracker,
    perf: PerfLog,
}

impl RenderIndex {
    /// Creates an index over `delegate`. Returns `None` for a null handle.
    pub fn new(delegate: PluginRenderDelegateUniqueHandle) -> Option<Self> {
        Self::with_perf(delegate, PerfLog::global())
    }

    /// Like [`new`](Self::new), reporting counters into `perf`.
    pub fn with_perf(delegate: PluginRenderDelegateUniqueHandle, perf: PerfLog) -> Option<Self> {
        if delegate.is_null() {
            log::warn!("Render index requested without a render delegate");
            return None;
        }
        Some(Self {
            delegate,
            rprim_ids: SortedIds::new(perf.clone()),
            rprims: HashMap::new(),
            computations: ComputationTable::default(),
            tracker: ChangeTracker::new(),
            perf,
        })
    }

    /// The render delegate. Always present, since construction rejects
    /// null handles.
    pub fn render_delegate(&self) -> Option<&dyn RenderDelegate> {
        self.delegate.get()
    }

    /// The render delegate, for writing.
    pub fn render_delegate_mut(&mut self) -> Option<&mut (dyn RenderDelegate + 'static)> {
        self.delegate.get_mut()
    }

    /// The change tracker.
    pub fn change_tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    /// The change tracker, for scene delegates reporting edits.
    pub fn change_tracker_mut(&mut self) -> &mut ChangeTracker {
        &mut self.tracker
    }

    /// Adds an rprim of `type_id`. Returns `false` if the delegate does not
    /// support the type or `id` is already present.
    pub fn insert_rprim(&mut self, type_id: &Token, scene_delegate: Arc<dyn SceneDelegate>, id: PrimPath) -> bool {
        if self.rprims.contains_key(&id) {
            return false;
        }
        let Some(rprim) = self.delegate.get().and_then(|d| d.create_rprim(type_id, &id)) else {
            log::warn!("Render delegate cannot create rprim '{}' of type '{}'", id, type_id);
            return false;
        };
        self.tracker.rprim_inserted(id.clone(), rprim.initial_dirty_bits_mask());
        self.rprim_ids.insert(id.clone());
        self.rprims.insert(
            id,
            RprimEntry {
                type_id: type_id.clone(),
                scene_delegate,
                rprim,
            },
        );
        true
    }

    /// Removes rprim `id`. Its ranges become garbage at the next collection.
    pub fn remove_rprim(&mut self, id: &PrimPath) -> bool {
        let Some(mut entry) = self.rprims.remove(id) else {
            return false;
        };
        entry.rprim.finalize();
        self.tracker.rprim_removed(id);
        self.rprim_ids.remove(id);
        true
    }

    /// Adds a computation prim.
    pub fn insert_ext_computation(&mut self, scene_delegate: Arc<dyn SceneDelegate>, id: PrimPath) -> bool {
        if self.computations.0.contains_key(&id) {
            return false;
        }
        self.tracker.ext_computation_inserted(id.clone());
        self.computations.0.insert(
            id.clone(),
            ComputationEntry {
                scene_delegate,
                computation: ExtComputation::new(id),
            },
        );
        true
    }

    /// Removes a computation prim and dirties its consumers.
    pub fn remove_ext_computation(&mut self, id: &PrimPath) -> bool {
        if self.computations.0.remove(id).is_none() {
            return false;
        }
        self.tracker.ext_computation_removed(id);
        self.tracker.remove_dependent(id);
        true
    }

    /// Removes every prim.
    pub fn clear(&mut self) {
        for entry in self.rprims.values_mut() {
            entry.rprim.finalize();
        }
        for id in self.rprims.keys() {
            self.tracker.rprim_removed(id);
        }
        for id in self.computations.0.keys() {
            self.tracker.ext_computation_removed(id);
        }
        self.rprims.clear();
        self.computations.0.clear();
        self.rprim_ids.clear();
    }

    /// The rprim ids in path order.
    pub fn rprim_ids(&mut self) -> &[PrimPath] {
        self.rprim_ids.ids()
    }

    /// The rprim ids in path order as of the last sync.
    pub fn synced_rprim_ids(&self) -> &[PrimPath] {
        self.rprim_ids.sorted_prefix()
    }

    /// Rprim `id`.
    pub fn rprim(&self, id: &PrimPath) -> Option<&dyn Rprim> {
        self.rprims.get(id).map(|entry| entry.rprim.as_ref())
    }

    /// The type rprim `id` was inserted with.
    pub fn rprim_type(&self, id: &PrimPath) -> Option<&Token> {
        self.rprims.get(id).map(|entry| &entry.type_id)
    }

    /// Computation prim `id`.
    pub fn ext_computation_prim(&self, id: &PrimPath) -> Option<&ExtComputation> {
        self.computations.0.get(id).map(|entry| &entry.computation)
    }

    /// Syncs every dirty prim, then commits the delegate's resources.
    ///
    /// Computation prims sync first so that rprims building computation
    /// graphs see current descriptors.
    pub fn sync_all(&mut self) {
        self.rprim_ids.ids();

        for id in self.tracker.dirty_ext_computation_ids() {
            let bits = self.tracker.ext_computation_dirty_bits(&id);
            if let Some(entry) = self.computations.0.get_mut(&id) {
                entry.computation.sync(entry.scene_delegate.as_ref(), bits);
                for upstream in entry.computation.descriptor().upstream_ids() {
                    self.tracker.add_dependency(&upstream, &id);
                }
            }
            self.tracker.mark_ext_computation_clean(&id);
        }

        let dirty: HashMap<PrimPath, DirtyBits> = self
            .tracker
            .dirty_rprim_ids()
            .into_iter()
            .map(|id| {
                let bits = self.tracker.rprim_dirty_bits(&id);
                (id, bits)
            })
            .collect();

        let computations = &self.computations;
        let synced: Vec<(PrimPath, DirtyBits, Vec<PrimPath>)> = self
            .rprims
            .par_iter_mut()
            .filter_map(|(id, entry)| {
                let mut bits = *dirty.get(id)?;
                let context = RprimSyncContext {
                    scene_delegate: &entry.scene_delegate,
                    computations,
                };
                entry.rprim.sync(&context, &mut bits);
                Some((id.clone(), bits, entry.rprim.ext_computation_ids()))
            })
            .collect();

        for (id, remaining, computation_ids) in &synced {
            let handled = self.tracker.rprim_dirty_bits(id) & !*remaining;
            self.tracker.mark_rprim_clean(id, handled);
            self.tracker.remove_dependent(id);
            for computation in computation_ids {
                self.tracker.add_dependency(computation, id);
            }
        }
        self.perf.incr_by(tokens::RPRIMS_SYNCED, synced.len() as u64);
        log::trace!("Synced {} rprims", synced.len());

        let Self { delegate, tracker, .. } = self;
        if let Some(delegate) = delegate.get_mut() {
            delegate.commit_resources(tracker);
        }
    }

    /// Reclaims the resources of removed prims.
    pub fn garbage_collect(&self) {
        if let Some(delegate) = self.delegate.get() {
            delegate.resource_registry().garbage_collect();
        }
    }

    /// Runs `pass` over the prims matching `render_tags`.
    pub fn execute(&mut self, pass: &mut dyn RenderPass, state: &RenderPassState, render_tags: &[Token]) {
        self.rprim_ids.ids();
        pass.execute(self, state, render_tags);
    }

    /// Creates a render pass from the delegate and runs it once.
    pub fn render(&mut self, state: &RenderPassState, render_tags: &[Token]) -> Option<Box<dyn RenderPass>> {
        let mut pass = self.delegate.get()?.create_render_pass();
        self.execute(pass.as_mut(), state, render_tags);
        Some(pass)
    }

    /// Rprims whose type is in `render_tags`, in path order. An empty tag list
    /// selects all of them.
    pub fn rprims_for_tags<'a>(&'a self, render_tags: &'a [Token]) -> impl Iterator<Item = &'a dyn Rprim> + 'a {
        self.synced_rprim_ids().iter().filter_map(move |id| {
            let entry = self.rprims.get(id)?;
            (render_tags.is_empty() || render_tags.contains(&entry.type_id)).then_some(entry.rprim.as_ref())
        })
    }

    /// Marks every computation prim fully dirty, e.g. after a time change.
    pub fn mark_all_ext_computations_dirty(&mut self) {
        for id in self.computations.0.keys() {
            self.tracker
                .mark_ext_computation_dirty(id, ExtComputationDirtyBits::DIRTY_SCENE_INPUT);
        }
    }
}

impl ExtComputationCatalog for RenderIndex {
    fn ext_computation(&self, id: &PrimPath) -> Option<&ExtComputationDescriptor> {
        self.computations.ext_computation(id)
    }
}

impl fmt::Debug for RenderIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderIndex")
            .field("delegate", &self.delegate)
            .field("rprims", &self.rprims.len())
            .field("computations", &self.computations.0.len())
            .finish_non_exhaustive()
    }
}
