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

use super::array::{BufferArraySharedPtr, UsageHint};
use super::range::BufferArrayRangeSharedPtr;
use super::spec::BufferSpec;
use super::strategy::AggregationStrategy;
use covah_core::telemetry::perf::{tokens, PerfLog};
use covah_core::{coding_error, Token};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct Entry {
    role: Token,
    specs: Vec<BufferSpec>,
    usage_hint: UsageHint,
    arrays: Mutex<Vec<BufferArraySharedPtr>>,
}

impl Entry {
    fn arrays(&self) -> MutexGuard<'_, Vec<BufferArraySharedPtr>> {
        self.arrays.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Buckets buffer arrays by aggregation id and hands out ranges in them.
///
/// Allocation may run from many threads during sync. Reallocation and
/// garbage collection run from the commit thread only.
#[derive(Debug)]
pub struct BufferArrayRegistry {
    entries: Mutex<HashMap<u64, Arc<Entry>>>,
    perf: PerfLog,
}

impl Default for BufferArrayRegistry {
    fn default() -> Self {
        Self::new(PerfLog::global())
    }
}

impl BufferArrayRegistry {
    /// Creates an empty registry reporting into `perf`.
    pub fn new(perf: PerfLog) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            perf,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<u64, Arc<Entry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a new range in an array that aggregates `specs`, creating the
    /// array when every existing one is full.
    pub fn allocate_range(
        &self,
        strategy: &dyn AggregationStrategy,
        role: &Token,
        specs: &[BufferSpec],
        usage_hint: UsageHint,
    ) -> BufferArrayRangeSharedPtr {
        let id = strategy.compute_aggregation_id(role, specs, usage_hint);
        let entry = self
            .entries()
            .entry(id)
            .or_insert_with(|| {
                Arc::new(Entry {
                    role: role.clone(),
                    specs: specs.to_vec(),
                    usage_hint,
                    arrays: Mutex::new(Vec::new()),
                })
            })
            .clone();

        let range = strategy.create_buffer_array_range();

        // Try the arrays we know about without holding the entry lock.
        let candidates = entry.arrays().clone();
        if candidates.iter().any(|array| array.try_assign_range(&range)) {
            return range;
        }

        let mut arrays = entry.arrays();
        if arrays
            .iter()
            .skip(candidates.len())
            .any(|array| array.try_assign_range(&range))
        {
            return range;
        }
        let array = strategy.create_buffer_array(&entry.role, &entry.specs, entry.usage_hint);
        self.perf.incr(tokens::BUFFER_ARRAYS_CREATED);
        log::debug!(
            "Created '{}' buffer array #{} for [{}]",
            entry.role,
            array.core().generation(),
            entry.specs.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        );
        if !array.try_assign_range(&range) {
            coding_error!("a new '{}' buffer array refused its first range", entry.role);
        }
        arrays.push(array);
        range
    }

    /// Reallocates every array that needs it, splitting arrays whose ranges
    /// no longer fit into new arrays. Returns the number of arrays laid out.
    pub fn reallocate_all(&self, strategy: &dyn AggregationStrategy) -> usize {
        let entries: Vec<Arc<Entry>> = self.entries().values().cloned().collect();
        let mut reallocated = 0;
        for entry in entries {
            let mut arrays = entry.arrays();
            let mut spawned = Vec::new();
            for array in arrays.iter().filter(|a| a.needs_reallocation()) {
                reallocated += self.reallocate_array(strategy, &entry, array, &mut spawned);
            }
            arrays.extend(spawned);
        }
        self.perf.incr_by(tokens::BUFFER_ARRAYS_REALLOCATED, reallocated as u64);
        reallocated
    }

    fn reallocate_array(
        &self,
        strategy: &dyn AggregationStrategy,
        entry: &Entry,
        array: &BufferArraySharedPtr,
        spawned: &mut Vec<BufferArraySharedPtr>,
    ) -> usize {
        let max = array.max_num_elements();
        let mut chunks: Vec<Vec<BufferArrayRangeSharedPtr>> = Vec::new();
        let mut current = Vec::new();
        let mut size = 0;
        for range in array.core().live_ranges() {
            let num_elements = range.num_elements();
            if num_elements > max {
                log::warn!(
                    "A '{}' range of {} elements exceeds the array limit of {}",
                    entry.role,
                    num_elements,
                    max
                );
            }
            if !current.is_empty() && size + num_elements > max {
                chunks.push(std::mem::take(&mut current));
                size = 0;
            }
            size += num_elements;
            current.push(range);
        }
        chunks.push(current);

        let mut laid_out = 0;
        let mut chunks = chunks.into_iter();
        let first = chunks.next().unwrap_or_default();

        // Migrate the overflow first: it still reads from this array's
        // current storage.
        for chunk in chunks {
            let overflow = strategy.create_buffer_array(&entry.role, &entry.specs, entry.usage_hint);
            self.perf.incr(tokens::BUFFER_ARRAYS_CREATED);
            match overflow.reallocate(&chunk, array) {
                Ok(()) => {
                    spawned.push(overflow);
                    laid_out += 1;
                }
                Err(err) => coding_error!("failed to migrate '{}' ranges: {}", entry.role, err),
            }
        }
        match array.reallocate(&first, array) {
            Ok(()) => laid_out += 1,
            Err(err) => coding_error!("failed to reallocate '{}' array: {}", entry.role, err),
        }
        laid_out
    }

    /// Garbage collects every array and drops the ones left empty. Returns
    /// the number of arrays dropped.
    pub fn garbage_collect(&self) -> usize {
        let mut collected = 0;
        self.entries().retain(|_, entry| {
            entry.arrays().retain(|array| {
                if array.garbage_collect() {
                    self.perf.incr(array.core().gc_perf_token());
                    collected += 1;
                    false
                } else {
                    true
                }
            });
            !entry.arrays().is_empty()
        });
        if collected > 0 {
            log::debug!("Collected {} empty buffer arrays", collected);
        }
        collected
    }

    /// Adds the bytes held per role to `result` and returns the total.
    pub fn resource_allocation(&self, result: &mut BTreeMap<Token, usize>) -> usize {
        let mut total = 0;
        for array in self.arrays() {
            let bytes = array.resource_bytes();
            *result.entry(array.role().clone()).or_default() += bytes;
            total += bytes;
        }
        total
    }

    /// Returns every array.
    pub fn arrays(&self) -> Vec<BufferArraySharedPtr> {
        let entries: Vec<Arc<Entry>> = self.entries().values().cloned().collect();
        entries.iter().flat_map(|entry| entry.arrays().clone()).collect()
    }

    /// Returns `true` if any array awaits reallocation.
    pub fn needs_reallocation(&self) -> bool {
        self.arrays().iter().any(|array| array.needs_reallocation())
    }

    /// Writes every array's description.
    pub fn debug_dump(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        for array in self.arrays() {
            array.debug_dump(out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{AggregationConfig, CpuAggregationStrategy, ValueBufferSource};
    use covah_core::{ScalarType, TupleType, Value};

    fn points_specs() -> Vec<BufferSpec> {
        vec![BufferSpec::new("points", TupleType::new(ScalarType::Float32, 3))]
    }

    fn strategy(max_num_elements: usize, max_num_ranges: usize) -> CpuAggregationStrategy {
        CpuAggregationStrategy::new(AggregationConfig {
            max_num_elements,
            max_num_ranges,
        })
    }

    fn allocate(
        registry: &BufferArrayRegistry,
        strategy: &CpuAggregationStrategy,
        count: usize,
    ) -> BufferArrayRangeSharedPtr {
        let range = registry.allocate_range(strategy, &Token::new("primvar"), &points_specs(), UsageHint::empty());
        range.resize(count);
        range
    }

    #[test]
    fn test_ranges_share_an_array_until_full() {
        let registry = BufferArrayRegistry::new(PerfLog::null());
        let strategy = strategy(1024, 2);

        let a = allocate(&registry, &strategy, 1);
        let b = allocate(&registry, &strategy, 1);
        let c = allocate(&registry, &strategy, 1);

        assert!(a.is_aggregated_with(b.as_ref()));
        assert!(!a.is_aggregated_with(c.as_ref()));
        assert_eq!(registry.arrays().len(), 2);
    }

    #[test]
    fn test_reallocate_all_splits_oversized_arrays() {
        // --- 1. ARRANGE ---
        let registry = BufferArrayRegistry::new(PerfLog::null());
        let strategy = strategy(4, 16);
        let a = allocate(&registry, &strategy, 2);
        let b = allocate(&registry, &strategy, 2);
        registry.reallocate_all(&strategy);
        let first = ValueBufferSource::new("points", Value::from(vec![[1.0f32; 3]; 2]));
        a.copy_data(&first).unwrap();

        // --- 2. ACT: a third range joins the full array ---
        let c = allocate(&registry, &strategy, 2);
        assert!(a.is_aggregated_with(c.as_ref()));
        let laid_out = registry.reallocate_all(&strategy);

        // --- 3. ASSERT ---
        assert_eq!(laid_out, 2);
        assert_eq!(registry.arrays().len(), 2);
        assert!(a.is_aggregated_with(b.as_ref()));
        assert!(!a.is_aggregated_with(c.as_ref()));
        assert_eq!(c.capacity(), 2);
        assert_eq!(a.read_data(&Token::new("points")), *first.value());
        assert!(!registry.needs_reallocation());
    }

    #[test]
    fn test_garbage_collect_drops_empty_arrays() {
        let registry = BufferArrayRegistry::new(PerfLog::null());
        let strategy = strategy(1024, 1);
        let keep = allocate(&registry, &strategy, 1);
        let release = allocate(&registry, &strategy, 1);
        registry.reallocate_all(&strategy);
        drop(release);

        assert_eq!(registry.garbage_collect(), 1);
        assert_eq!(registry.arrays().len(), 1);
        assert!(keep.is_valid());
        assert_eq!(registry.garbage_collect(), 0);
    }

    #[test]
    fn test_resource_allocation_by_role() {
        let registry = BufferArrayRegistry::new(PerfLog::null());
        let strategy = strategy(1024, 16);
        let _range = allocate(&registry, &strategy, 4);
        registry.reallocate_all(&strategy);

        let mut by_role = BTreeMap::new();
        let total = registry.resource_allocation(&mut by_role);

        assert_eq!(total, 48);
        assert_eq!(by_role[&Token::new("primvar")], 48);
    }

    #[test]
    fn test_roles_with_equal_specs_use_separate_arrays() {
        // --- 1. ARRANGE ---
        let registry = BufferArrayRegistry::new(PerfLog::null());
        let strategy = strategy(1024, 16);
        let primvar = allocate(&registry, &strategy, 4);
        let instancer =
            registry.allocate_range(&strategy, &Token::new("instancer"), &points_specs(), UsageHint::empty());
        instancer.resize(2);

        // --- 2. ACT ---
        registry.reallocate_all(&strategy);
        let mut by_role = BTreeMap::new();
        let total = registry.resource_allocation(&mut by_role);

        // --- 3. ASSERT ---
        assert!(!primvar.is_aggregated_with(instancer.as_ref()));
        assert_eq!(registry.arrays().len(), 2);
        assert_eq!(total, 72);
        assert_eq!(by_role[&Token::new("primvar")], 48);
        assert_eq!(by_role[&Token::new("instancer")], 24);
    }
}
