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
use crate::buffer::{BufferSource, BufferSourceSharedPtr, BufferSpec, ResolveState};
use covah_core::{coding_error, Token, TupleType, Value};
use std::sync::{Arc, OnceLock};

/// Uploads one output of a CPU computation as an rprim primvar.
///
/// The computation is this source's pre-chained buffer, so a registry always
/// resolves the computation first.
#[derive(Debug)]
pub struct ExtCompPrimvarBufferSource {
    name: Token,
    source: Arc<ExtCompCpuComputation>,
    source_output_idx: usize,
    tuple_type: TupleType,
    value: OnceLock<Value>,
    state: ResolveState,
}

impl ExtCompPrimvarBufferSource {
    /// Binds primvar `primvar_name` to output `source_output_name` of
    /// `source`.
    pub fn new(
        primvar_name: Token,
        source: Arc<ExtCompCpuComputation>,
        source_output_name: &Token,
        value_type: TupleType,
    ) -> Self {
        let source_output_idx = source.output_index(source_output_name);
        if source_output_idx == INVALID_OUTPUT_INDEX {
            coding_error!(
                "primvar '{}' names unknown output '{}' of computation {}",
                primvar_name,
                source_output_name,
                source.id()
            );
        }
        Self {
            name: primvar_name,
            source,
            source_output_idx,
            tuple_type: value_type,
            value: OnceLock::new(),
            state: ResolveState::new(),
        }
    }

    fn resolved_value(&self, accessor: &str) -> Option<&Value> {
        if !self.state.is_resolved() {
            coding_error!("{} called on primvar '{}' before it was resolved", accessor, self.name);
            return None;
        }
        self.value.get()
    }
}

impl BufferSource for ExtCompPrimvarBufferSource {
    fn name(&self) -> Token {
        self.name.clone()
    }

    fn data(&self) -> Option<&[u8]> {
        self.resolved_value("data").map(Value::as_bytes)
    }

    fn tuple_type(&self) -> TupleType {
        self.tuple_type
    }

    fn num_elements(&self) -> usize {
        self.resolved_value("num_elements").map_or(0, Value::num_elements)
    }

    fn buffer_specs(&self, specs: &mut Vec<BufferSpec>) {
        specs.push(BufferSpec::new(self.name.clone(), self.tuple_type));
    }

    fn resolve(&self) -> bool {
        if !self.source.is_resolved() {
            return false;
        }
        if !self.state.try_lock() {
            return self.state.is_resolved();
        }
        match self.source.output(self.source_output_idx) {
            Some(value) if value.tuple_type() == self.tuple_type => {
                let _ = self.value.set(value.clone());
                self.state.set_resolved();
            }
            Some(value) => {
                log::warn!(
                    "Primvar '{}' expects {} but computation {} produced {}",
                    self.name,
                    self.tuple_type,
                    self.source.id(),
                    value.tuple_type()
                );
                self.state.set_resolve_error();
            }
            None => self.state.set_resolve_error(),
        }
        true
    }

    fn state(&self) -> &ResolveState {
        &self.state
    }

    fn check_valid(&self) -> bool {
        self.source_output_idx != INVALID_OUTPUT_INDEX && self.tuple_type.is_valid()
    }

    fn compute_hash(&self) -> u64 {
        0
    }

    fn has_pre_chained_buffer(&self) -> bool {
        true
    }

    fn pre_chained_buffer(&self) -> Option<BufferSourceSharedPtr> {
        Some(self.source.clone())
    }
}
