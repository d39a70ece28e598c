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

//! The callback surface through which the render core pulls scene data.

use crate::ext_computation::{
    ExtComputationContext, ExtComputationInputDescriptor, ExtComputationOutputDescriptor,
    ExtComputationPrimvarDescriptor,
};
use crate::tokens;
use covah_core::{PrimPath, Token, Value};

/// Supplies prim data and executes computations on behalf of the render
/// core.
///
/// The core never depends on where the data comes from: a USD stage, a
/// procedural generator, or a test stub.
pub trait SceneDelegate: Send + Sync {
    /// Returns the value `key` of prim `id`, or [`Value::Empty`].
    fn get(&self, id: &PrimPath, key: &Token) -> Value;

    /// Returns a scene-supplied input of computation `computation_id`.
    fn get_ext_computation_input(&self, computation_id: &PrimPath, input: &Token) -> Value;

    /// Runs computation `computation_id`, reading inputs from and writing
    /// outputs to `context`.
    fn invoke_ext_computation(&self, computation_id: &PrimPath, context: &mut dyn ExtComputationContext);

    /// The primvars of `id` that are read directly with [`get`](Self::get).
    fn primvar_names(&self, _id: &PrimPath) -> Vec<Token> {
        Vec::new()
    }

    /// The primvars of `id` produced by computations.
    fn ext_computation_primvar_descriptors(&self, _id: &PrimPath) -> Vec<ExtComputationPrimvarDescriptor> {
        Vec::new()
    }

    /// The scene inputs of computation `computation_id`.
    fn ext_computation_scene_input_names(&self, _computation_id: &PrimPath) -> Vec<Token> {
        Vec::new()
    }

    /// The computation-bound inputs of computation `computation_id`.
    fn ext_computation_input_descriptors(&self, _computation_id: &PrimPath) -> Vec<ExtComputationInputDescriptor> {
        Vec::new()
    }

    /// The outputs of computation `computation_id`.
    fn ext_computation_output_descriptors(
        &self,
        _computation_id: &PrimPath,
    ) -> Vec<ExtComputationOutputDescriptor> {
        Vec::new()
    }

    /// The number of elements computation `computation_id` produces.
    fn ext_computation_element_count(&self, computation_id: &PrimPath) -> usize {
        self.get(computation_id, &Token::new(tokens::ELEMENT_COUNT))
            .as_int()
            .and_then(|count| usize::try_from(count).ok())
            .unwrap_or(0)
    }

    /// Returns `false` if prim `id` is hidden.
    fn visible(&self, _id: &PrimPath) -> bool {
        true
    }
}
