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

//! Computations evaluated on the CPU by a scene delegate, and the sources
//! that bind their inputs and outputs.

mod context;
mod cpu_computation;
mod descriptor;
mod input_source;
mod prim;
mod primvar_source;

pub use context::{ExtComputationContext, ExtComputationContextImpl};
pub use cpu_computation::{ExtCompCpuComputation, INVALID_OUTPUT_INDEX};
pub use descriptor::{
    ExtComputationDescriptor, ExtComputationInputDescriptor, ExtComputationOutputDescriptor,
    ExtComputationPrimvarDescriptor,
};
pub use input_source::{
    CompExtCompInputSource, ExtCompInputSource, SceneExtCompInputSource, UnboundExtCompInputSource,
};
pub use prim::ExtComputation;
pub use primvar_source::ExtCompPrimvarBufferSource;

use covah_core::PrimPath;
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while building computation graphs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtComputationError {
    /// Computations read from each other in a loop.
    #[error("dependency cycle among computations: {}", join_paths(.computations))]
    Cycle {
        /// The computations on or downstream of the cycle.
        computations: Vec<PrimPath>,
    },

    /// A requested computation is not in the catalog.
    #[error("unknown computation {0}")]
    UnknownComputation(PrimPath),
}

fn join_paths(paths: &[PrimPath]) -> String {
    paths.iter().map(PrimPath::as_str).collect::<Vec<_>>().join(", ")
}

/// Looks up computation descriptors by id.
pub trait ExtComputationCatalog {
    /// The descriptor of computation `id`.
    fn ext_computation(&self, id: &PrimPath) -> Option<&ExtComputationDescriptor>;
}

impl ExtComputationCatalog for HashMap<PrimPath, ExtComputationDescriptor> {
    fn ext_computation(&self, id: &PrimPath) -> Option<&ExtComputationDescriptor> {
        self.get(id)
    }
}
