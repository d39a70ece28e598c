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

use super::object_source::CyclesObjectSource;
use super::registry::CyclesResourceRegistry;
use covah_core::{PrimPath, Token};
use covah_hydra::buffer::ValueBufferSource;
use covah_hydra::change_tracker::DirtyBits;
use covah_hydra::mesh::{gather_primvar_sources, PrimvarSources};
use covah_hydra::rprim::{Rprim, RprimSharedData, RprimSyncContext};
use covah_hydra::tokens;
use std::any::Any;
use std::sync::Arc;

/// A mesh bound to one Cycles scene object.
///
/// The mesh keeps no buffer ranges. Sync queues sources on the object and
/// the registry applies them during commit.
#[derive(Debug)]
pub struct CyclesMesh {
    shared: RprimSharedData,
    registry: Arc<CyclesResourceRegistry>,
    object: Option<Arc<CyclesObjectSource>>,
    ext_computation_ids: Vec<PrimPath>,
}

impl CyclesMesh {
    pub(super) fn new(id: PrimPath, registry: Arc<CyclesResourceRegistry>) -> Self {
        Self {
            shared: RprimSharedData::new(id, 0),
            registry,
            object: None,
            ext_computation_ids: Vec::new(),
        }
    }

    /// The scene object, once the mesh synced.
    pub fn object(&self) -> Option<&Arc<CyclesObjectSource>> {
        self.object.as_ref()
    }

    fn object_or_bind(&mut self) -> Arc<CyclesObjectSource> {
        let registry = &self.registry;
        let id = &self.shared.id;
        self.object
            .get_or_insert_with(|| registry.object_instance(id).value)
            .clone()
    }
}

impl Rprim for CyclesMesh {
    fn id(&self) -> &PrimPath {
        &self.shared.id
    }

    fn sync(&mut self, context: &RprimSyncContext<'_>, dirty_bits: &mut DirtyBits) {
        let object = self.object_or_bind();

        if dirty_bits.intersects(DirtyBits::INIT_REPR | DirtyBits::DIRTY_TOPOLOGY) {
            for name in [tokens::FACE_VERTEX_INDICES, tokens::FACE_VERTEX_COUNTS] {
                let value = context.scene_delegate.get(&self.shared.id, &Token::new(name));
                if value.is_array() {
                    object.add_source(Arc::new(ValueBufferSource::new(name, value)));
                }
            }
        }

        if dirty_bits.intersects(
            DirtyBits::INIT_REPR
                | DirtyBits::DIRTY_POINTS
                | DirtyBits::DIRTY_PRIMVAR
                | DirtyBits::DIRTY_EXT_COMPUTATION,
        ) {
            let PrimvarSources {
                sources,
                ext_computation_ids,
            } = gather_primvar_sources(&self.shared.id, context, self.registry.computations());
            self.ext_computation_ids = ext_computation_ids;
            for source in sources {
                object.add_source(source);
            }
        }

        if dirty_bits.intersects(DirtyBits::INIT_REPR | DirtyBits::DIRTY_VISIBILITY) {
            self.shared.visible = context.scene_delegate.visible(&self.shared.id);
            object.set_visible(self.shared.visible);
        }
        *dirty_bits = DirtyBits::empty();
    }

    fn shared_data(&self) -> &RprimSharedData {
        &self.shared
    }

    fn ext_computation_ids(&self) -> Vec<PrimPath> {
        self.ext_computation_ids.clone()
    }

    fn finalize(&mut self) {
        self.object = None;
        self.ext_computation_ids.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
