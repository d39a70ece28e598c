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

use super::descriptor::ExtComputationDescriptor;
use crate::change_tracker::ExtComputationDirtyBits;
use crate::scene_delegate::SceneDelegate;
use covah_core::PrimPath;

/// The render index's record of a computation prim.
///
/// Syncing pulls whatever the dirty bits name from the scene delegate.
/// CPU computations are built from the synced descriptor when an rprim
/// consumes one of its outputs.
#[derive(Debug, Clone)]
pub struct ExtComputation {
    descriptor: ExtComputationDescriptor,
}

impl ExtComputation {
    /// Creates an unsynced computation prim.
    pub fn new(id: PrimPath) -> Self {
        Self {
            descriptor: ExtComputationDescriptor::new(id),
        }
    }

    /// The computation prim.
    pub fn id(&self) -> &PrimPath {
        &self.descriptor.id
    }

    /// The synced description.
    pub fn descriptor(&self) -> &ExtComputationDescriptor {
        &self.descriptor
    }

    /// Pulls the parts named by `dirty_bits` from `scene_delegate`.
    pub fn sync(&mut self, scene_delegate: &dyn SceneDelegate, dirty_bits: ExtComputationDirtyBits) {
        let id = self.descriptor.id.clone();
        if dirty_bits.contains(ExtComputationDirtyBits::DIRTY_INPUT_DESC) {
            self.descriptor.scene_input_names = scene_delegate.ext_computation_scene_input_names(&id);
            self.descriptor.computation_inputs = scene_delegate.ext_computation_input_descriptors(&id);
        }
        if dirty_bits.contains(ExtComputationDirtyBits::DIRTY_OUTPUT_DESC) {
            self.descriptor.outputs = scene_delegate.ext_computation_output_descriptors(&id);
        }
        if dirty_bits.contains(ExtComputationDirtyBits::DIRTY_ELEMENT_COUNT) {
            self.descriptor.element_count = scene_delegate.ext_computation_element_count(&id);
        }
        log::trace!("Synced computation {} ({:?})", id, dirty_bits);
    }
}
