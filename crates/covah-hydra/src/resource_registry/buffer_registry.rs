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

use super::{RegistryBase, ResourceRegistry};
use crate::buffer::{
    AggregationStrategy, BufferArrayRange, BufferArrayRangeSharedPtr, BufferArrayRegistry,
    BufferSource, BufferSourceSharedPtr, BufferSpec, CpuAggregationStrategy, UsageHint,
};
use crate::ext_computation::ExtCompCpuComputation;
use crate::instance_registry::InstanceRegistry;
use covah_core::graph::topological_levels;
use covah_core::telemetry::perf::{tokens, PerfLog};
use covah_core::{coding_error, Token};
use rayon::prelude::*;
use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Counts from the most recent commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    /// Computations that produced their outputs.
    pub computations_resolved: usize,
    /// Computations that resolved with an error.
    pub computations_failed: usize,
    /// Computations whose inputs never resolved.
    pub computations_unresolved: usize,
    /// Buffer sources resolved with data.
    pub sources_resolved: usize,
    /// Buffer sources that failed or could not resolve.
    pub sources_skipped: usize,
    /// Buffer sources copied into ranges.
    pub sources_uploaded: usize,
    /// Arrays laid out anew.
    pub arrays_reallocated: usize,
}

#[derive(Debug)]
struct PendingSource {
    range: Option<BufferArrayRangeSharedPtr>,
    sources: Vec<BufferSourceSharedPtr>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn is_uploadable(source: &BufferSourceSharedPtr) -> bool {
    source.is_resolved() && !source.has_resolve_error()
}

/// Resolves `source` after its upstream sources. A source another thread
/// is resolving is waited on rather than skipped.
fn resolve_source(source: &BufferSourceSharedPtr) -> bool {
    for upstream in source.upstream_sources() {
        if !upstream.is_resolved() {
            resolve_source(&upstream);
        }
    }
    loop {
        if source.resolve() {
            return source.is_resolved();
        }
        if !source.state().is_being_resolved() {
            return false;
        }
        std::thread::yield_now();
    }
}

/// Resolves every distinct upstream source of `pending` exactly once,
/// deepest first, so entries that share an upstream never contend for it.
/// Returns the number of upstream sources visited.
fn resolve_upstream(pending: &[PendingSource]) -> usize {
    let mut nodes: Vec<BufferSourceSharedPtr> = Vec::new();
    let mut index: HashMap<*const (), usize> = HashMap::new();
    let mut edges = Vec::new();
    let mut stack: Vec<(BufferSourceSharedPtr, Option<usize>)> = pending
        .iter()
        .flat_map(|entry| &entry.sources)
        .flat_map(|source| source.upstream_sources())
        .map(|upstream| (upstream, None))
        .collect();

    while let Some((source, dependent)) = stack.pop() {
        let key = Arc::as_ptr(&source) as *const ();
        let node = match index.get(&key) {
            Some(&node) => node,
            None => {
                let node = nodes.len();
                index.insert(key, node);
                stack.extend(
                    source
                        .upstream_sources()
                        .into_iter()
                        .map(|upstream| (upstream, Some(node))),
                );
                nodes.push(source);
                node
            }
        };
        if let Some(dependent) = dependent {
            edges.push((node, dependent));
        }
    }

    match topological_levels(0..nodes.len(), edges) {
        Ok(levels) => {
            for level in levels {
                level.par_iter().for_each(|&i| {
                    if !nodes[i].is_resolved() {
                        nodes[i].resolve();
                    }
                });
            }
        }
        Err(err) => {
            coding_error!("upstream buffer sources form a cycle: {}", err);
        }
    }
    nodes.len()
}

/// Resolves every source of `entry` and appends their chained followers.
/// Returns `(resolved, skipped)`.
fn resolve_entry(entry: &mut PendingSource) -> (usize, usize) {
    let mut resolved = 0;
    let mut skipped = 0;
    let mut next = 0;
    while next < entry.sources.len() {
        let source = entry.sources[next].clone();
        next += 1;
        if !resolve_source(&source) {
            log::debug!("Source '{}' is waiting on an unresolved dependency", source.name());
            skipped += 1;
            continue;
        }
        if source.has_resolve_error() {
            skipped += 1;
            continue;
        }
        resolved += 1;
        if source.has_chained_buffer() {
            entry.sources.extend(source.chained_buffers());
        }
    }
    (resolved, skipped)
}

/// A resource registry that aggregates buffer sources into host-memory
/// buffer arrays and resolves CPU computations.
///
/// Sync threads schedule work with [`add_sources`](Self::add_sources) and
/// [`add_computation`](Self::add_computation); the commit resolves it all.
pub struct BufferResourceRegistry {
    base: RegistryBase,
    strategy: Arc<dyn AggregationStrategy>,
    buffer_arrays: BufferArrayRegistry,
    immutable_ranges: InstanceRegistry<dyn BufferArrayRange>,
    pending_sources: Mutex<Vec<PendingSource>>,
    pending_computations: Mutex<Vec<Arc<ExtCompCpuComputation>>>,
    last_commit: Mutex<CommitStats>,
}

impl BufferResourceRegistry {
    /// Creates a registry that allocates through `strategy`.
    pub fn new(strategy: Arc<dyn AggregationStrategy>, perf: PerfLog) -> Self {
        Self {
            base: RegistryBase::new(perf.clone()),
            strategy,
            buffer_arrays: BufferArrayRegistry::new(perf.clone()),
            immutable_ranges: InstanceRegistry::new(perf),
            pending_sources: Mutex::new(Vec::new()),
            pending_computations: Mutex::new(Vec::new()),
            last_commit: Mutex::new(CommitStats::default()),
        }
    }

    /// Returns a new range aggregating `specs`.
    pub fn allocate_range(
        &self,
        role: &Token,
        specs: &[BufferSpec],
        usage_hint: UsageHint,
    ) -> BufferArrayRangeSharedPtr {
        self.buffer_arrays
            .allocate_range(self.strategy.as_ref(), role, specs, usage_hint)
    }

    /// Returns a range holding `sources`, shared with every other caller
    /// that passes identical data. Only the first caller schedules the
    /// upload.
    pub fn allocate_immutable_range(
        &self,
        role: &Token,
        sources: Vec<BufferSourceSharedPtr>,
    ) -> BufferArrayRangeSharedPtr {
        let key = sources.iter().fold(0u64, |key, source| {
            key.rotate_left(5) ^ source.compute_hash()
        });
        let instance = self.immutable_ranges.get_or_insert_with(key, || {
            let mut specs = Vec::new();
            for source in &sources {
                source.buffer_specs(&mut specs);
            }
            self.allocate_range(role, &specs, UsageHint::IMMUTABLE)
        });
        if instance.is_first_instance {
            self.add_sources(&instance.value, sources);
        }
        instance.value
    }

    /// Schedules `sources` to be resolved and copied into `range`.
    ///
    /// Invalid sources are skipped with a warning; an invalid range is a
    /// coding error.
    pub fn add_sources(&self, range: &BufferArrayRangeSharedPtr, sources: Vec<BufferSourceSharedPtr>) {
        if !range.is_valid() {
            coding_error!("sources scheduled against an unassigned range");
            return;
        }
        let sources: Vec<_> = sources
            .into_iter()
            .filter(|source| {
                let valid = source.is_valid();
                if !valid {
                    log::warn!("Skipping invalid buffer source {:?}", source);
                }
                valid
            })
            .collect();
        if sources.is_empty() {
            return;
        }
        lock(&self.pending_sources).push(PendingSource {
            range: Some(range.clone()),
            sources,
        });
    }

    /// Schedules `source` to be resolved without an upload.
    pub fn add_source(&self, source: BufferSourceSharedPtr) {
        if !source.is_valid() {
            log::warn!("Skipping invalid buffer source {:?}", source);
            return;
        }
        lock(&self.pending_sources).push(PendingSource {
            range: None,
            sources: vec![source],
        });
    }

    /// Schedules a CPU computation.
    pub fn add_computation(&self, computation: Arc<ExtCompCpuComputation>) {
        if !computation.is_valid() {
            log::warn!("Skipping invalid computation {}", computation.id());
            return;
        }
        lock(&self.pending_computations).push(computation);
    }

    /// Counts from the most recent commit.
    pub fn last_commit_stats(&self) -> CommitStats {
        *lock(&self.last_commit)
    }

    /// The aggregated arrays.
    pub fn buffer_arrays(&self) -> &BufferArrayRegistry {
        &self.buffer_arrays
    }

    /// The strategy arrays are created with.
    pub fn strategy(&self) -> &Arc<dyn AggregationStrategy> {
        &self.strategy
    }

    fn resolve_computations(&self, mut computations: Vec<Arc<ExtCompCpuComputation>>, stats: &mut CommitStats) {
        let mut seen = HashSet::new();
        computations.retain(|c| seen.insert(Arc::as_ptr(c)));
        if computations.is_empty() {
            return;
        }

        let index: HashMap<*const ExtCompCpuComputation, usize> = computations
            .iter()
            .enumerate()
            .map(|(i, c)| (Arc::as_ptr(c), i))
            .collect();
        let edges: Vec<(usize, usize)> = computations
            .iter()
            .enumerate()
            .flat_map(|(dependent, c)| {
                c.upstream_computations()
                    .iter()
                    .filter_map(|up| index.get(&Arc::as_ptr(up)).map(|&dependency| (dependency, dependent)))
                    .collect::<Vec<_>>()
            })
            .collect();

        match topological_levels(0..computations.len(), edges) {
            Ok(levels) => {
                for level in levels {
                    level.par_iter().for_each(|&i| {
                        computations[i].resolve();
                    });
                }
            }
            Err(err) => {
                coding_error!("pending computations form a cycle: {}", err);
            }
        }

        for computation in &computations {
            if !computation.is_resolved() {
                stats.computations_unresolved += 1;
            } else if computation.has_resolve_error() {
                stats.computations_failed += 1;
            } else {
                stats.computations_resolved += 1;
            }
        }
        let perf = self.base.perf();
        perf.incr_by(tokens::COMPUTATIONS_COMMITTED, stats.computations_resolved as u64);
        perf.incr_by(
            tokens::COMPUTATIONS_FAILED,
            (stats.computations_failed + stats.computations_unresolved) as u64,
        );
    }
}

impl Default for BufferResourceRegistry {
    fn default() -> Self {
        Self::new(Arc::new(CpuAggregationStrategy::default()), PerfLog::global())
    }
}

impl fmt::Debug for BufferResourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferResourceRegistry")
            .field("strategy", &self.strategy)
            .field("pending_sources", &lock(&self.pending_sources).len())
            .field("pending_computations", &lock(&self.pending_computations).len())
            .finish_non_exhaustive()
    }
}

impl ResourceRegistry for BufferResourceRegistry {
    fn base(&self) -> &RegistryBase {
        &self.base
    }

    fn on_commit(&self) {
        let computations = std::mem::take(&mut *lock(&self.pending_computations));
        let mut pending = std::mem::take(&mut *lock(&self.pending_sources));
        let mut stats = CommitStats::default();

        // Computations first: sources downstream of them read their outputs.
        self.resolve_computations(computations, &mut stats);

        // Shared upstream sources next, once each, before the entries fan out.
        let upstream = resolve_upstream(&pending);
        log::trace!("Resolved {} upstream buffer sources", upstream);

        let (resolved, skipped) = pending
            .par_iter_mut()
            .map(resolve_entry)
            .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1));
        stats.sources_resolved = resolved;
        stats.sources_skipped = skipped;

        for entry in &pending {
            let Some(range) = &entry.range else {
                continue;
            };
            let num_elements = entry
                .sources
                .iter()
                .filter(|s| is_uploadable(s))
                .map(|s| s.num_elements())
                .max();
            if let Some(num_elements) = num_elements {
                range.resize(num_elements);
            }
        }

        stats.arrays_reallocated = self.buffer_arrays.reallocate_all(self.strategy.as_ref());

        stats.sources_uploaded = pending
            .par_iter()
            .map(|entry| {
                let Some(range) = &entry.range else {
                    return 0;
                };
                entry
                    .sources
                    .iter()
                    .filter(|s| is_uploadable(s))
                    .filter(|&s| match range.copy_data(&**s) {
                        Ok(()) => true,
                        Err(err) => {
                            coding_error!("upload of '{}' failed: {}", s.name(), err);
                            false
                        }
                    })
                    .count()
            })
            .sum();

        let perf = self.base.perf();
        perf.incr_by(tokens::BUFFER_SOURCES_RESOLVED, stats.sources_resolved as u64);
        perf.incr_by(tokens::BUFFER_SOURCES_UPLOADED, stats.sources_uploaded as u64);
        let mut by_role = BTreeMap::new();
        let bytes = self.buffer_arrays.resource_allocation(&mut by_role);
        perf.set(tokens::BUFFER_ARRAY_BYTES, bytes as f64);

        log::debug!(
            "Commit: {} computations ({} failed), {} sources resolved, {} uploaded, {} arrays reallocated",
            stats.computations_resolved,
            stats.computations_failed + stats.computations_unresolved,
            stats.sources_resolved,
            stats.sources_uploaded,
            stats.arrays_reallocated
        );
        *lock(&self.last_commit) = stats;
    }

    fn on_garbage_collect(&self) {
        let ranges = self.immutable_ranges.garbage_collect();
        let arrays = self.buffer_arrays.garbage_collect();
        log::debug!("Garbage collected {} shared ranges and {} arrays", ranges, arrays);
    }

    fn resource_allocation(&self) -> BTreeMap<Token, usize> {
        let mut by_role = BTreeMap::new();
        self.buffer_arrays.resource_allocation(&mut by_role);
        by_role
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{ComputedBufferSource, NullBufferSource, ValueBufferSource};
    use covah_core::{ScalarType, TupleType, Value};

    fn vec3() -> TupleType {
        TupleType::new(ScalarType::Float32, 3)
    }

    fn points(n: usize) -> Value {
        Value::Vec3fArray((0..n).map(|i| [i as f32, 0.0, 0.0]).collect())
    }

    fn shared(source: impl BufferSource + 'static) -> BufferSourceSharedPtr {
        Arc::new(source)
    }

    fn registry() -> BufferResourceRegistry {
        BufferResourceRegistry::new(Arc::new(CpuAggregationStrategy::default()), PerfLog::null())
    }

    fn points_range(registry: &BufferResourceRegistry) -> BufferArrayRangeSharedPtr {
        let specs = [BufferSpec::new(Token::new("points"), vec3())];
        registry.allocate_range(&Token::new("primvar"), &specs, UsageHint::empty())
    }

    #[test]
    fn test_commit_uploads_scheduled_sources() {
        // --- 1. ARRANGE ---
        let registry = registry();
        let range = points_range(&registry);
        let source = shared(ValueBufferSource::new("points", points(4)));
        registry.add_sources(&range, vec![source]);

        // --- 2. ACT ---
        registry.commit();

        // --- 3. ASSERT ---
        assert_eq!(range.num_elements(), 4);
        assert_eq!(range.read_data(&Token::new("points")), points(4));
        assert!(!registry.buffer_arrays().needs_reallocation());
        let stats = registry.last_commit_stats();
        assert_eq!(stats.sources_uploaded, 1);
        assert_eq!(stats.arrays_reallocated, 1);
    }

    #[test]
    fn test_pre_chained_source_resolves_first() {
        // --- 1. ARRANGE ---
        let registry = registry();
        let range = points_range(&registry);
        let rest = Arc::new(ValueBufferSource::new("rest", points(3)));
        let upstream = rest.clone();
        let doubled = ComputedBufferSource::new("points", vec3(), move || {
            let rest = upstream.value().as_vec3f_array()?;
            Some(Value::Vec3fArray(rest.iter().map(|p| [p[0] * 2.0, p[1], p[2]]).collect()))
        })
        .with_pre_chained(rest);
        registry.add_sources(&range, vec![shared(doubled)]);

        // --- 2. ACT ---
        registry.commit();

        // --- 3. ASSERT ---
        let data = range.read_data(&Token::new("points"));
        assert_eq!(data.as_vec3f_array().map(|p| p[2][0]), Some(4.0));
    }

    #[test]
    fn test_failed_source_is_not_uploaded() {
        // --- 1. ARRANGE ---
        let registry = registry();
        let range = points_range(&registry);
        let failing = ComputedBufferSource::new("points", vec3(), || None);
        registry.add_sources(&range, vec![shared(failing)]);

        // --- 2. ACT ---
        registry.commit();

        // --- 3. ASSERT ---
        let stats = registry.last_commit_stats();
        assert_eq!(stats.sources_uploaded, 0);
        assert_eq!(stats.sources_skipped, 1);
    }

    #[test]
    fn test_invalid_sources_are_dropped_at_schedule_time() {
        let registry = registry();
        let range = points_range(&registry);

        registry.add_sources(&range, vec![shared(NullBufferSource::new())]);
        registry.add_source(shared(NullBufferSource::new()));
        registry.commit();

        let stats = registry.last_commit_stats();
        assert_eq!(stats.sources_resolved, 0);
        assert_eq!(stats.sources_skipped, 0);
        assert_eq!(stats.sources_uploaded, 0);
    }

    #[test]
    fn test_identical_immutable_data_shares_a_range() {
        // --- 1. ARRANGE ---
        let registry = registry();
        let role = Token::new("topology");
        let make = || vec![shared(ValueBufferSource::new("indices", Value::IntArray(vec![0, 1, 2])))];

        // --- 2. ACT ---
        let first = registry.allocate_immutable_range(&role, make());
        let second = registry.allocate_immutable_range(&role, make());
        registry.commit();

        // --- 3. ASSERT ---
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.is_immutable());
        assert_eq!(registry.last_commit_stats().sources_uploaded, 1);
        assert_eq!(first.read_data(&Token::new("indices")), Value::IntArray(vec![0, 1, 2]));
    }

    #[test]
    fn test_garbage_collect_reclaims_released_ranges() {
        // --- 1. ARRANGE ---
        let registry = registry();
        let role = Token::new("topology");
        let range = registry.allocate_immutable_range(
            &role,
            vec![shared(ValueBufferSource::new("indices", Value::IntArray(vec![3, 4])))],
        );
        registry.commit();
        assert_eq!(registry.resource_allocation().get(&role), Some(&8));

        // --- 2. ACT ---
        drop(range);
        registry.garbage_collect();

        // --- 3. ASSERT ---
        assert!(registry.buffer_arrays().arrays().is_empty());
        assert!(registry.resource_allocation().is_empty());
    }

    #[test]
    fn test_held_range_survives_garbage_collect() {
        let registry = registry();
        let range = points_range(&registry);
        registry.add_sources(&range, vec![shared(ValueBufferSource::new("points", points(2)))]);
        registry.commit();

        registry.garbage_collect();

        assert_eq!(range.read_data(&Token::new("points")), points(2));
    }
}
