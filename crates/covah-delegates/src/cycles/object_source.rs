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

use covah_core::{PrimPath, Token, Value};
use covah_hydra::buffer::{BufferSource, BufferSourceSharedPtr};
use covah_hydra::tokens;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// The host-side copy of one object, as bound into the Cycles scene.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CyclesGeometry {
    /// Vertex positions.
    pub points: Vec<[f32; 3]>,
    /// Face-vertex indices.
    pub face_vertex_indices: Vec<i32>,
    /// Vertices per face.
    pub face_vertex_counts: Vec<i32>,
    /// Other primvars, by name.
    pub primvars: BTreeMap<Token, Value>,
    /// `false` when the scene hides the object.
    pub visible: bool,
    /// Bumped on every applied source.
    pub version: u64,
}

impl CyclesGeometry {
    /// Triangles after fan-triangulating every face.
    pub fn triangle_count(&self) -> usize {
        self.face_vertex_counts
            .iter()
            .map(|&count| usize::try_from(count).unwrap_or(0).saturating_sub(2))
            .sum()
    }

    /// Approximate host bytes held.
    pub fn byte_size(&self) -> usize {
        self.points.len() * std::mem::size_of::<[f32; 3]>()
            + (self.face_vertex_indices.len() + self.face_vertex_counts.len()) * std::mem::size_of::<i32>()
            + self.primvars.values().map(|v| v.as_bytes().len()).sum::<usize>()
    }

    fn apply(&mut self, name: &Token, value: Value) -> bool {
        match (name.as_str(), value) {
            (tokens::POINTS, Value::Vec3fArray(points)) => self.points = points,
            (tokens::FACE_VERTEX_INDICES, Value::IntArray(indices)) => self.face_vertex_indices = indices,
            (tokens::FACE_VERTEX_COUNTS, Value::IntArray(counts)) => self.face_vertex_counts = counts,
            (tokens::POINTS | tokens::FACE_VERTEX_INDICES | tokens::FACE_VERTEX_COUNTS, _) => return false,
            (_, value) => {
                self.primvars.insert(name.clone(), value);
            }
        }
        self.version += 1;
        true
    }
}

/// One object of the Cycles scene and the sources waiting to update it.
///
/// Rprims queue sources during sync; the registry binds new objects and then
/// resolves every object's queue in parallel during commit.
#[derive(Debug)]
pub struct CyclesObjectSource {
    id: PrimPath,
    bound: AtomicBool,
    pending: Mutex<Vec<BufferSourceSharedPtr>>,
    geometry: RwLock<CyclesGeometry>,
}

impl CyclesObjectSource {
    /// Creates an unbound object for prim `id`.
    pub fn new(id: PrimPath) -> Self {
        Self {
            id,
            bound: AtomicBool::new(false),
            pending: Mutex::new(Vec::new()),
            geometry: RwLock::new(CyclesGeometry {
                visible: true,
                ..CyclesGeometry::default()
            }),
        }
    }

    /// The prim.
    pub fn id(&self) -> &PrimPath {
        &self.id
    }

    /// Returns `true` if the object can be bound into a scene.
    pub fn is_valid(&self) -> bool {
        !self.id.is_absolute_root()
    }

    /// Returns `true` once the object was bound.
    pub fn is_resolved(&self) -> bool {
        self.bound.load(Ordering::Acquire)
    }

    /// Binds the object into the scene.
    pub fn resolve(&self) {
        if !self.bound.swap(true, Ordering::AcqRel) {
            log::trace!("Bound Cycles object {}", self.id);
        }
    }

    /// Queues `source` for the next commit. Invalid sources are dropped.
    pub fn add_source(&self, source: BufferSourceSharedPtr) {
        if !source.is_valid() {
            log::warn!("Dropped invalid source '{}' for object {}", source.name(), self.id);
            return;
        }
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(source);
    }

    /// Number of sources waiting for a commit.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Sets visibility directly; it is not buffer data.
    pub fn set_visible(&self, visible: bool) {
        self.write_geometry().visible = visible;
    }

    /// Resolves the queued sources and applies them. Sources whose
    /// dependencies are not ready stay queued. Returns the number applied.
    pub fn resolve_pending_sources(&self) -> usize {
        let queued = std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner));
        if queued.is_empty() {
            return 0;
        }

        let mut waiting = Vec::new();
        let mut applied = 0;
        for source in queued {
            if let Some(pre) = source.pre_chained_buffer() {
                pre.resolve();
            }
            if !source.resolve() {
                waiting.push(source);
                continue;
            }
            if source.has_resolve_error() {
                log::warn!("Source '{}' of object {} failed to resolve", source.name(), self.id);
                continue;
            }
            let value = Value::from_bytes(source.tuple_type(), source.data().unwrap_or_default());
            if self.write_geometry().apply(&source.name(), value) {
                applied += 1;
            } else {
                log::warn!("Source '{}' of object {} has an unexpected type", source.name(), self.id);
            }
        }

        if !waiting.is_empty() {
            self.pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend(waiting);
        }
        applied
    }

    /// The current geometry.
    pub fn geometry(&self) -> RwLockReadGuard<'_, CyclesGeometry> {
        self.geometry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_geometry(&self) -> RwLockWriteGuard<'_, CyclesGeometry> {
        self.geometry.write().unwrap_or_else(PoisonError::into_inner)
    }
}
