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

use super::source::{BufferSource, BufferSourceSharedPtr, ResolveState};
use super::spec::BufferSpec;
use covah_core::{coding_error, Token, TupleType, Value};
use std::fmt;
use std::sync::OnceLock;

type ComputeFn = dyn Fn() -> Option<Value> + Send + Sync;

/// A buffer source whose data is produced by a closure on first resolve.
///
/// An optional pre-chained source must be resolved before the closure runs;
/// the closure usually captures that source and reads its result. A closure
/// that returns `None` marks the source as failed for the frame.
pub struct ComputedBufferSource {
    name: Token,
    tuple_type: TupleType,
    compute: Box<ComputeFn>,
    pre_chained: Option<BufferSourceSharedPtr>,
    result: OnceLock<Value>,
    state: ResolveState,
}

impl ComputedBufferSource {
    /// Creates a source named `name` whose elements are `tuple_type`.
    pub fn new<F>(name: impl Into<Token>, tuple_type: TupleType, compute: F) -> Self
    where
        F: Fn() -> Option<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            tuple_type,
            compute: Box::new(compute),
            pre_chained: None,
            result: OnceLock::new(),
            state: ResolveState::new(),
        }
    }

    /// Declares a source that must resolve before this one.
    pub fn with_pre_chained(mut self, source: BufferSourceSharedPtr) -> Self {
        self.pre_chained = Some(source);
        self
    }

    /// The computed value, once resolved.
    pub fn result(&self) -> Option<&Value> {
        self.result.get()
    }

    fn resolved_result(&self, accessor: &str) -> Option<&Value> {
        if !self.state.is_resolved() {
            coding_error!("{} called on '{}' before it was resolved", accessor, self.name);
            return None;
        }
        self.result.get()
    }
}

impl fmt::Debug for ComputedBufferSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedBufferSource")
            .field("name", &self.name)
            .field("tuple_type", &self.tuple_type)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl BufferSource for ComputedBufferSource {
    fn name(&self) -> Token {
        self.name.clone()
    }

    fn data(&self) -> Option<&[u8]> {
        self.resolved_result("data").map(Value::as_bytes)
    }

    fn tuple_type(&self) -> TupleType {
        match self.resolved_result("tuple_type") {
            Some(_) => self.tuple_type,
            None => TupleType::INVALID,
        }
    }

    fn num_elements(&self) -> usize {
        self.resolved_result("num_elements").map_or(0, Value::num_elements)
    }

    fn buffer_specs(&self, specs: &mut Vec<BufferSpec>) {
        specs.push(BufferSpec::new(self.name.clone(), self.tuple_type));
    }

    fn resolve(&self) -> bool {
        if !self.check_valid() {
            return false;
        }
        if let Some(pre) = &self.pre_chained {
            if !pre.is_resolved() {
                return false;
            }
        }
        if !self.state.try_lock() {
            return self.state.is_resolved();
        }
        match (self.compute)() {
            Some(value) if value.tuple_type() == self.tuple_type => {
                let _ = self.result.set(value);
                self.state.set_resolved();
            }
            Some(value) => {
                log::warn!(
                    "Computed source '{}' produced {} data, expected {}",
                    self.name,
                    value.tuple_type(),
                    self.tuple_type
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
        self.tuple_type.is_valid()
    }

    fn compute_hash(&self) -> u64 {
        0
    }

    fn has_pre_chained_buffer(&self) -> bool {
        self.pre_chained.is_some()
    }

    fn pre_chained_buffer(&self) -> Option<BufferSourceSharedPtr> {
        self.pre_chained.clone()
    }
}

pub(crate) fn report_null_access(what: &str, accessor: &str) {
    coding_error!("{} can't be scheduled with a buffer range ({} called)", what, accessor);
}

/// A placeholder source whose data accessors are all coding errors.
///
/// It stands in where a binding is required but no real source is known yet.
/// It never resolves and is never valid, so registries refuse to schedule
/// it.
#[derive(Debug, Default)]
pub struct NullBufferSource {
    state: ResolveState,
}

impl NullBufferSource {
    /// Creates the placeholder.
    pub fn new() -> Self {
        Self::default()
    }
}

impl BufferSource for NullBufferSource {
    fn name(&self) -> Token {
        report_null_access("NullBufferSource", "name");
        Token::empty()
    }

    fn data(&self) -> Option<&[u8]> {
        report_null_access("NullBufferSource", "data");
        None
    }

    fn tuple_type(&self) -> TupleType {
        report_null_access("NullBufferSource", "tuple_type");
        TupleType::INVALID
    }

    fn num_elements(&self) -> usize {
        report_null_access("NullBufferSource", "num_elements");
        0
    }

    fn buffer_specs(&self, _specs: &mut Vec<BufferSpec>) {}

    fn resolve(&self) -> bool {
        false
    }

    fn state(&self) -> &ResolveState {
        &self.state
    }

    fn check_valid(&self) -> bool {
        false
    }

    fn compute_hash(&self) -> u64 {
        0
    }
}
