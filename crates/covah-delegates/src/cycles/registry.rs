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
use covah_core::telemetry::perf::{tokens as perf_tokens, PerfLog};
use covah_core::{PrimPath, Token};
use covah_hydra::buffer::CpuAggregationStrategy;
use covah_hydra::instance_registry::{Instance, InstanceRegistry};
use covah_hydra::resource_registry::{BufferResourceRegistry, RegistryBase, ResourceRegistry};
use covah_hydra::tokens;
use rayon::prelude::*;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Key of the object for prim `id`.
fn object_key(id: &PrimPath) -> u64 {
    let hash = blake3::hash(id.as_str().as_bytes());
    let mut key = [0u8; 8];
    key.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(key)
}

/// The Cycles resource registry.
///
/// Scene objects live in an instance registry keyed by prim path. Commit
/// first resolves the CPU computations feeding computed primvars, then binds
/// new objects, then resolves every object's pending sources in parallel.
/// Any applied source means the render session has to reset.
pub struct CyclesResourceRegistry {
    base: RegistryBase,
    computations: Arc<BufferResourceRegistry>,
    objects: InstanceRegistry<CyclesObjectSource>,
    scene_resets: AtomicU64,
}

impl CyclesResourceRegistry {
    /// Creates an empty registry.
    pub fn new(perf: PerfLog) -> Self {
        Self {
            base: RegistryBase::new(perf.clone()),
            computations: Arc::new(BufferResourceRegistry::new(
                Arc::new(CpuAggregationStrategy::default()),
                perf.clone(),
            )),
            objects: InstanceRegistry::new(perf),
            scene_resets: AtomicU64::new(0),
        }
    }

    /// The object of prim `id`, created unbound on first request.
    pub fn object_instance(&self, id: &PrimPath) -> Instance<CyclesObjectSource> {
        self.objects
            .get_or_insert_with(object_key(id), || Arc::new(CyclesObjectSource::new(id.clone())))
    }

    /// Every live object.
    pub fn objects(&self) -> Vec<Arc<CyclesObjectSource>> {
        self.objects.values()
    }

    /// The registry CPU computations are scheduled on.
    pub fn computations(&self) -> &Arc<BufferResourceRegistry> {
        &self.computations
    }

    /// Number of commits that changed the scene.
    pub fn scene_resets(&self) -> u64 {
        self.scene_resets.load(Ordering::Relaxed)
    }
}

impl Default for CyclesResourceRegistry {
    fn default() -> Self {
        Self::new(PerfLog::global())
    }
}

impl fmt::Debug for CyclesResourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CyclesResourceRegistry")
            .field("objects", &self.objects.len())
            .field("scene_resets", &self.scene_resets())
            .finish_non_exhaustive()
    }
}

impl ResourceRegistry for CyclesResourceRegistry {
    fn base(&self) -> &RegistryBase {
        &self.base
    }

    fn on_commit(&self) {
        self.computations.on_commit();

        let objects = self.objects.values();
        for object in &objects {
            if object.is_valid() && !object.is_resolved() {
                object.resolve();
            }
        }

        let resolved: usize = objects
            .par_iter()
            .filter(|object| object.is_valid())
            .map(|object| object.resolve_pending_sources())
            .sum();

        self.base
            .perf()
            .incr_by(perf_tokens::BUFFER_SOURCES_RESOLVED, resolved as u64);
        if resolved > 0 {
            self.scene_resets.fetch_add(1, Ordering::Relaxed);
            log::debug!("Cycles commit applied {} sources over {} objects", resolved, objects.len());
        }
    }

    fn on_garbage_collect(&self) {
        self.computations.on_garbage_collect();
        let dropped = self.objects.garbage_collect();
        if dropped > 0 {
            log::debug!("Dropped {} Cycles objects", dropped);
        }
    }

    fn resource_allocation(&self) -> BTreeMap<Token, usize> {
        let mut allocation = self.computations.resource_allocation();
        let bytes: usize = self.objects().iter().map(|o| o.geometry().byte_size()).sum();
        if bytes > 0 {
            *allocation.entry(Token::new(tokens::GEOMETRY)).or_default() += bytes;
        }
        allocation
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
