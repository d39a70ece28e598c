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

use super::array::{BufferArray, BufferArraySharedPtr, UsageHint};
use super::cpu::{CpuBufferArray, CpuBufferArrayRange};
use super::range::BufferArrayRangeSharedPtr;
use super::spec::BufferSpec;
use covah_core::telemetry::perf::tokens;
use covah_core::Token;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Limits applied by an aggregation strategy to the arrays it creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Element capacity above which ranges are split into a new array.
    pub max_num_elements: usize,
    /// Maximum number of ranges one array accepts.
    pub max_num_ranges: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            max_num_elements: 1 << 20,
            max_num_ranges: 1 << 14,
        }
    }
}

/// Decides how buffer specs are bucketed into arrays and creates them.
pub trait AggregationStrategy: Send + Sync + fmt::Debug {
    /// Creates an empty array for `specs`.
    fn create_buffer_array(
        &self,
        role: &Token,
        specs: &[BufferSpec],
        usage_hint: UsageHint,
    ) -> BufferArraySharedPtr;

    /// Creates an unassigned range of the type this strategy's arrays accept.
    fn create_buffer_array_range(&self) -> BufferArrayRangeSharedPtr;

    /// Returns the bucket key: ranges with equal ids may share an array.
    /// Arrays never mix roles.
    fn compute_aggregation_id(&self, role: &Token, specs: &[BufferSpec], usage_hint: UsageHint) -> u64 {
        let mut hasher = DefaultHasher::new();
        role.hash(&mut hasher);
        specs.hash(&mut hasher);
        usage_hint.bits().hash(&mut hasher);
        hasher.finish()
    }
}

/// Aggregates ranges into host-memory [`CpuBufferArray`]s.
#[derive(Debug, Clone, Default)]
pub struct CpuAggregationStrategy {
    config: AggregationConfig,
}

impl CpuAggregationStrategy {
    /// Creates the strategy with explicit limits.
    pub fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    /// The limits in use.
    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }
}

impl AggregationStrategy for CpuAggregationStrategy {
    fn create_buffer_array(
        &self,
        role: &Token,
        specs: &[BufferSpec],
        usage_hint: UsageHint,
    ) -> BufferArraySharedPtr {
        let array = CpuBufferArray::new(
            role.clone(),
            tokens::BUFFER_ARRAYS_COLLECTED,
            specs.to_vec(),
            usage_hint,
            self.config.max_num_elements,
        );
        array.core().set_max_num_ranges(self.config.max_num_ranges);
        array
    }

    fn create_buffer_array_range(&self) -> BufferArrayRangeSharedPtr {
        Arc::new(CpuBufferArrayRange::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covah_core::{ScalarType, TupleType};

    #[test]
    fn test_aggregation_id_depends_on_role_specs_and_hint() {
        let strategy = CpuAggregationStrategy::default();
        let primvar = Token::new("primvar");
        let topology = Token::new("topology");
        let points = [BufferSpec::new("points", TupleType::new(ScalarType::Float32, 3))];
        let normals = [BufferSpec::new("normals", TupleType::new(ScalarType::Float32, 3))];

        let id = strategy.compute_aggregation_id(&primvar, &points, UsageHint::empty());
        assert_eq!(id, strategy.compute_aggregation_id(&primvar, &points, UsageHint::empty()));
        assert_ne!(id, strategy.compute_aggregation_id(&topology, &points, UsageHint::empty()));
        assert_ne!(id, strategy.compute_aggregation_id(&primvar, &normals, UsageHint::empty()));
        assert_ne!(id, strategy.compute_aggregation_id(&primvar, &points, UsageHint::IMMUTABLE));
    }

    #[test]
    fn test_created_array_carries_limits() {
        let strategy = CpuAggregationStrategy::new(AggregationConfig {
            max_num_elements: 10,
            max_num_ranges: 2,
        });
        let array = strategy.create_buffer_array(&Token::new("primvar"), &[], UsageHint::SIZE_VARYING);
        assert_eq!(array.max_num_elements(), 10);
        assert_eq!(array.core().max_num_ranges(), 2);
        assert_eq!(array.usage_hint(), UsageHint::SIZE_VARYING);
    }
}
