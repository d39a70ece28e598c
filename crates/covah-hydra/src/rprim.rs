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

//! The renderable-prim contract.

use crate::buffer::{BufferArrayRangeContainer, BufferArrayRangeSharedPtr};
use crate::change_tracker::DirtyBits;
use crate::ext_computation::ExtComputationCatalog;
use crate::scene_delegate::SceneDelegate;
use covah_core::PrimPath;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Container slot of the primvar range.
pub const PRIMVAR_SLOT: isize = 0;
/// Container slot of the face-vertex index range.
pub const TOPOLOGY_SLOT: isize = 1;
/// Container slot of the face-vertex count range.
pub const FACE_COUNTS_SLOT: isize = 2;

/// State every rprim carries: the ranges holding its buffers and its
/// visibility.
#[derive(Debug)]
pub struct RprimSharedData {
    /// The prim.
    pub id: PrimPath,
    /// The prim's buffer ranges, addressed by slot.
    pub bar_container: BufferArrayRangeContainer,
    /// `false` when the scene hides the prim.
    pub visible: bool,
}

impl RprimSharedData {
    /// Creates shared data with room for `slots` ranges.
    pub fn new(id: PrimPath, slots: usize) -> Self {
        Self {
            id,
            bar_container: BufferArrayRangeContainer::new(slots),
            visible: true,
        }
    }

    /// The range in `slot`, if one was assigned.
    pub fn range(&self, slot: isize) -> Option<&BufferArrayRangeSharedPtr> {
        self.bar_container.get(slot)
    }
}

/// What an rprim reads from during sync.
pub struct RprimSyncContext<'a> {
    /// The delegate that owns the prim's scene data.
    pub scene_delegate: &'a Arc<dyn SceneDelegate>,
    /// The synced computation prims.
    pub computations: &'a (dyn ExtComputationCatalog + Sync),
}

impl fmt::Debug for RprimSyncContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RprimSyncContext").finish_non_exhaustive()
    }
}

/// A renderable prim owned by the render index and created by a render
/// delegate.
///
/// Rprims sync in parallel. Each reads its own scene data, schedules buffer
/// sources on its delegate's resource registry, and clears the dirty bits it
/// handled.
pub trait Rprim: Send + Sync + fmt::Debug {
    /// The prim.
    fn id(&self) -> &PrimPath;

    /// The bits a newly inserted prim starts with.
    fn initial_dirty_bits_mask(&self) -> DirtyBits {
        DirtyBits::ALL_DIRTY
    }

    /// Pulls whatever `dirty_bits` names from the scene and clears the bits
    /// it handled.
    fn sync(&mut self, context: &RprimSyncContext<'_>, dirty_bits: &mut DirtyBits);

    /// The ranges and visibility of the prim.
    fn shared_data(&self) -> &RprimSharedData;

    /// The computations the last sync bound primvars to.
    fn ext_computation_ids(&self) -> Vec<PrimPath> {
        Vec::new()
    }

    /// Releases the prim's ranges before it is dropped.
    fn finalize(&mut self) {}

    /// Downcasting support for backends that inspect their own prims.
    fn as_any(&self) -> &dyn Any;
}
