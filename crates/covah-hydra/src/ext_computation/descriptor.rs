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

use covah_core::{PrimPath, Token, TupleType};
use serde::{Deserialize, Serialize};

/// Binds a computation input to an output of another computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtComputationInputDescriptor {
    /// The input name on the consuming computation.
    pub name: Token,
    /// The computation producing the value.
    pub source_computation_id: PrimPath,
    /// The output of the producing computation.
    pub source_computation_output_name: Token,
}

/// Declares one output of a computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtComputationOutputDescriptor {
    /// The output name.
    pub name: Token,
    /// The element type written to the output.
    pub value_type: TupleType,
}

/// Binds an rprim primvar to a computation output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtComputationPrimvarDescriptor {
    /// The primvar name on the rprim.
    pub name: Token,
    /// The computation producing the primvar.
    pub source_computation_id: PrimPath,
    /// The output supplying the data.
    pub source_computation_output_name: Token,
    /// The element type of the primvar.
    pub value_type: TupleType,
}

/// Everything the render index knows about one computation prim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtComputationDescriptor {
    /// The computation prim.
    pub id: PrimPath,
    /// Inputs read directly from the scene.
    pub scene_input_names: Vec<Token>,
    /// Inputs bound to other computations' outputs.
    pub computation_inputs: Vec<ExtComputationInputDescriptor>,
    /// Declared outputs, in index order.
    pub outputs: Vec<ExtComputationOutputDescriptor>,
    /// The number of elements each output holds.
    pub element_count: usize,
}

impl ExtComputationDescriptor {
    /// Creates a descriptor with no inputs or outputs.
    pub fn new(id: PrimPath) -> Self {
        Self {
            id,
            scene_input_names: Vec::new(),
            computation_inputs: Vec::new(),
            outputs: Vec::new(),
            element_count: 0,
        }
    }

    /// The output names, in index order.
    pub fn output_names(&self) -> Vec<Token> {
        self.outputs.iter().map(|o| o.name.clone()).collect()
    }

    /// The computations this one reads from, deduplicated, in input order.
    pub fn upstream_ids(&self) -> Vec<PrimPath> {
        let mut ids: Vec<PrimPath> = Vec::new();
        for input in &self.computation_inputs {
            if !ids.contains(&input.source_computation_id) {
                ids.push(input.source_computation_id.clone());
            }
        }
        ids
    }
}
