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

use super::cpu_computation::{ExtCompCpuComputation, INVALID_OUTPUT_INDEX};
use crate::buffer::{BufferSource, BufferSpec, ResolveState};
use covah_core::{coding_error, Token, TupleType, Value};
use std::sync::Arc;

pub(crate) static EMPTY_VALUE: Value = Value::Empty;

/// An input of a CPU computation.
///
/// Inputs are buffer sources so they share the resolve protocol, but they are
/// never uploaded: their data accessors are coding errors. The computation
/// reads them through [`value`](Self::value).
pub trait ExtCompInputSource: BufferSource {
    /// The input value. Empty until resolved, and empty for the frame if the
    /// producing computation failed.
    fn value(&self) -> &Value;

    /// The computation producing this input, if it is bound to one.
    fn source_computation(&self) -> Option<&Arc<ExtCompCpuComputation>> {
        None
    }
}

macro_rules! input_source_accessors {
    ($kind:literal) => {
        fn name(&self) -> Token {
            self.name.clone()
        }

        fn data(&self) -> Option<&[u8]> {
            crate::buffer::report_null_access($kind, "data");
            None
        }

        fn tuple_type(&self) -> TupleType {
            crate::buffer::report_null_access($kind, "tuple_type");
            TupleType::INVALID
        }

        fn num_elements(&self) -> usize {
            crate::buffer::report_null_access($kind, "num_elements");
            0
        }

        fn buffer_specs(&self, _specs: &mut Vec<BufferSpec>) {}

        fn state(&self) -> &ResolveState {
            &self.state
        }

        fn compute_hash(&self) -> u64 {
            0
        }
    };
}

/// An input whose value comes straight from the scene delegate.
#[derive(Debug)]
pub struct SceneExtCompInputSource {
    name: Token,
    value: Value,
    state: ResolveState,
}

impl SceneExtCompInputSource {
    /// Wraps the scene value `value` as input `name`.
    pub fn new(name: Token, value: Value) -> Self {
        Self {
            name,
            value,
            state: ResolveState::new(),
        }
    }
}

impl BufferSource for SceneExtCompInputSource {
    input_source_accessors!("SceneExtCompInputSource");

    fn resolve(&self) -> bool {
        if self.state.try_lock() {
            self.state.set_resolved();
        }
        self.state.is_resolved()
    }

    fn check_valid(&self) -> bool {
        true
    }
}

impl ExtCompInputSource for SceneExtCompInputSource {
    fn value(&self) -> &Value {
        &self.value
    }
}

/// An input bound to an output of another computation.
///
/// The output index is looked up once, at construction.
#[derive(Debug)]
pub struct CompExtCompInputSource {
    name: Token,
    source: Arc<ExtCompCpuComputation>,
    source_output_idx: usize,
    state: ResolveState,
}

impl CompExtCompInputSource {
    /// Binds input `name` to output `source_output` of `source`.
    pub fn new(name: Token, source: Arc<ExtCompCpuComputation>, source_output: &Token) -> Self {
        let source_output_idx = source.output_index(source_output);
        if source_output_idx == INVALID_OUTPUT_INDEX {
            coding_error!(
                "unable to find output '{}' on computation {}",
                source_output,
                source.id()
            );
        }
        Self {
            name,
            source,
            source_output_idx,
            state: ResolveState::new(),
        }
    }

    /// The bound output index.
    pub fn source_output_index(&self) -> usize {
        self.source_output_idx
    }
}

impl BufferSource for CompExtCompInputSource {
    input_source_accessors!("CompExtCompInputSource");

    fn resolve(&self) -> bool {
        if !self.source.is_resolved() {
            return false;
        }
        if self.state.try_lock() {
            self.state.set_resolved();
        }
        self.state.is_resolved()
    }

    fn check_valid(&self) -> bool {
        self.source_output_idx != INVALID_OUTPUT_INDEX
    }
}

impl ExtCompInputSource for CompExtCompInputSource {
    fn value(&self) -> &Value {
        self.source.output(self.source_output_idx).unwrap_or(&EMPTY_VALUE)
    }

    fn source_computation(&self) -> Option<&Arc<ExtCompCpuComputation>> {
        Some(&self.source)
    }
}

/// An input whose producing computation does not exist.
///
/// It never resolves, so the consuming computation produces nothing for the
/// frame instead of running with a missing input.
#[derive(Debug)]
pub struct UnboundExtCompInputSource {
    name: Token,
    state: ResolveState,
}

impl UnboundExtCompInputSource {
    /// Creates the placeholder for input `name`.
    pub fn new(name: Token) -> Self {
        Self {
            name,
            state: ResolveState::new(),
        }
    }
}

impl BufferSource for UnboundExtCompInputSource {
    input_source_accessors!("UnboundExtCompInputSource");

    fn resolve(&self) -> bool {
        false
    }

    fn check_valid(&self) -> bool {
        true
    }
}

impl ExtCompInputSource for UnboundExtCompInputSource {
    fn value(&self) -> &Value {
        &EMPTY_VALUE
    }
}
