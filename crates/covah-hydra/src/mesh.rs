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

//! A mesh rprim that keeps its data in aggregated host buffers.

use crate::buffer::{BufferSource, BufferSourceSharedPtr, BufferSpec, UsageHint, ValueBufferSource};
use crate::change_tracker::DirtyBits;
use crate::ext_computation::{ExtCompCpuComputation, ExtCompPrimvarBufferSource};
use crate::resource_registry::BufferResourceRegistry;
use crate::rprim::{
    Rprim, RprimSharedData, RprimSyncContext, FACE_COUNTS_SLOT, PRIMVAR_SLOT, TOPOLOGY_SLOT,
};
use crate::tokens;
use covah_core::{PrimPath, Token};
use std::any::Any;
use std::sync::Arc;

const NUM_SLOTS: usize = 3;

/// A polygonal mesh.
///
/// Topology goes into immutable ranges shared between meshes with identical
/// connectivity. Primvars, including those produced by computations, share
/// one range per mesh.
#[derive(Debug)]
pub struct BufferedMesh {
    shared: RprimSharedData,
    registry: Arc<BufferResourceRegistry>,
    ext_computation_ids: Vec<PrimPath>,
}

impl BufferedMesh {
    /// Creates a mesh that schedules its buffers on `registry`.
    pub fn new(id: PrimPath, registry: Arc<BufferResourceRegistry>) -> Self {
        Self {
            shared: RprimSharedData::new(id, NUM_SLOTS),
            registry,
            ext_computation_ids: Vec::new(),
        }
    }

    fn sync_topology(&mut self, context: &RprimSyncContext<'_>) {
        let role = Token::new(tokens::TOPOLOGY_ROLE);
        for (slot, name) in [
            (TOPOLOGY_SLOT, tokens::FACE_VERTEX_INDICES),
            (FACE_COUNTS_SLOT, tokens::FACE_VERTEX_COUNTS),
        ] {
            let value = context.scene_delegate.get(&self.shared.id, &Token::new(name));
            if !value.is_array() || value.num_elements() == 0 {
                self.shared.bar_container.set(slot, None);
                continue;
            }
            let source: BufferSourceSharedPtr = Arc::new(ValueBufferSource::new(name, value));
            let range = self.registry.allocate_immutable_range(&role, vec![source]);
            self.shared.bar_container.set(slot, Some(range));
        }
    }

    fn sync_primvars(&mut self, context: &RprimSyncContext<'_>) {
        let PrimvarSources {
            sources,
            ext_computation_ids,
        } = gather_primvar_sources(&self.shared.id, context, &self.registry);
        self.ext_computation_ids = ext_computation_ids;
        if sources.is_empty() {
            return;
        }

        let mut specs = Vec::new();
        for source in &sources {
            source.buffer_specs(&mut specs);
        }
        let range = match self.shared.range(PRIMVAR_SLOT) {
            Some(range) if BufferSpec::is_subset(&specs, &range.buffer_specs()) => range.clone(),
            _ => {
                let role = Token::new(tokens::PRIMVAR_ROLE);
                let range = self.registry.allocate_range(&role, &specs, UsageHint::SIZE_VARYING);
                self.shared.bar_container.set(PRIMVAR_SLOT, Some(range.clone()));
                range
            }
        };
        self.registry.add_sources(&range, sources);
    }
}

/// The primvar sources of one rprim and the computations feeding them.
#[derive(Debug, Default)]
pub struct PrimvarSources {
    /// One source per primvar. Computed primvars replace scene primvars of
    /// the same name.
    pub sources: Vec<BufferSourceSharedPtr>,
    /// The computations the computed primvars read from, sorted.
    pub ext_computation_ids: Vec<PrimPath>,
}

/// Collects the primvars of `id`: `points` and the delegate's primvar names
/// read from the scene, then the computed primvars.
///
/// The CPU computations behind computed primvars are scheduled on
/// `registry`, so they resolve during its next commit. A computation graph
/// that cannot be built (a cycle, an unknown computation) is logged and the
/// scene values are kept for this frame.
pub fn gather_primvar_sources(
    id: &PrimPath,
    context: &RprimSyncContext<'_>,
    registry: &BufferResourceRegistry,
) -> PrimvarSources {
    let mut sources = scene_primvar_sources(id, context);
    let ext_computation_ids = computed_primvar_sources(id, context, registry, &mut sources);
    PrimvarSources {
        sources,
        ext_computation_ids,
    }
}

fn scene_primvar_sources(id: &PrimPath, context: &RprimSyncContext<'_>) -> Vec<BufferSourceSharedPtr> {
    let scene = context.scene_delegate;
    let mut names = vec![Token::new(tokens::POINTS)];
    for name in scene.primvar_names(id) {
        if !names.contains(&name) {
            names.push(name);
        }
    }

    names
        .into_iter()
        .filter_map(|name| {
            let value = scene.get(id, &name);
            if !value.is_array() || !value.tuple_type().is_valid() {
                return None;
            }
            Some(Arc::new(ValueBufferSource::new(name, value)) as BufferSourceSharedPtr)
        })
        .collect()
}

fn computed_primvar_sources(
    id: &PrimPath,
    context: &RprimSyncContext<'_>,
    registry: &BufferResourceRegistry,
    sources: &mut Vec<BufferSourceSharedPtr>,
) -> Vec<PrimPath> {
    let descriptors = context.scene_delegate.ext_computation_primvar_descriptors(id);
    let mut ids: Vec<PrimPath> = descriptors
        .iter()
        .map(|d| d.source_computation_id.clone())
        .collect();
    ids.sort();
    ids.dedup();
    if ids.is_empty() {
        return ids;
    }

    let mut computation_sources = Vec::new();
    let computations = match ExtCompCpuComputation::create_computations(
        context.scene_delegate,
        &ids,
        context.computations,
        &mut computation_sources,
    ) {
        Ok(computations) => computations,
        Err(err) => {
            log::warn!("Rprim {} has no computed primvars this frame: {}", id, err);
            return ids;
        }
    };
    for computation in computation_sources {
        registry.add_computation(computation);
    }

    for descriptor in descriptors {
        let Some(computation) = computations.get(&descriptor.source_computation_id) else {
            continue;
        };
        sources.retain(|s| s.name() != descriptor.name);
        sources.push(Arc::new(ExtCompPrimvarBufferSource::new(
            descriptor.name,
            computation.clone(),
            &descriptor.source_computation_output_name,
            descriptor.value_type,
        )));
    }
    ids
}

impl Rprim for BufferedMesh {
    fn id(&self) -> &PrimPath {
        &self.shared.id
    }

    fn sync(&mut self, context: &RprimSyncContext<'_>, dirty_bits: &mut DirtyBits) {
        if dirty_bits.intersects(DirtyBits::INIT_REPR | DirtyBits::DIRTY_TOPOLOGY) {
            self.sync_topology(context);
        }
        if dirty_bits.intersects(
            DirtyBits::INIT_REPR
                | DirtyBits::DIRTY_POINTS
                | DirtyBits::DIRTY_PRIMVAR
                | DirtyBits::DIRTY_EXT_COMPUTATION,
        ) {
            self.sync_primvars(context);
        }
        if dirty_bits.intersects(DirtyBits::INIT_REPR | DirtyBits::DIRTY_VISIBILITY) {
            self.shared.visible = context.scene_delegate.visible(&self.shared.id);
        }
        log::trace!("Synced mesh {} ({:?})", self.shared.id, dirty_bits);
        *dirty_bits = DirtyBits::empty();
    }

    fn shared_data(&self) -> &RprimSharedData {
        &self.shared
    }

    fn ext_computation_ids(&self) -> Vec<PrimPath> {
        self.ext_computation_ids.clone()
    }

    fn finalize(&mut self) {
        self.shared.bar_container.resize(0);
        self.ext_computation_ids.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
