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

mod common;

use common::{float3, grid, path, TestScene};
use covah_core::telemetry::perf::PerfLog;
use covah_core::{Token, Value};
use covah_hydra::buffer::{
    AggregationConfig, BufferSource, BufferSourceSharedPtr, BufferSpec, ComputedBufferSource,
    CpuAggregationStrategy, UsageHint, ValueBufferSource,
};
use covah_hydra::ext_computation::{ExtCompCpuComputation, ExtCompPrimvarBufferSource, ExtComputation};
use covah_hydra::change_tracker::ExtComputationDirtyBits;
use covah_hydra::resource_registry::{BufferResourceRegistry, ResourceRegistry};
use covah_hydra::SceneDelegate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn small_registry(max_num_elements: usize) -> BufferResourceRegistry {
    let strategy = CpuAggregationStrategy::new(AggregationConfig {
        max_num_elements,
        max_num_ranges: 1024,
    });
    BufferResourceRegistry::new(Arc::new(strategy), PerfLog::null())
}

fn points_specs() -> Vec<BufferSpec> {
    vec![BufferSpec::new("points", float3())]
}

fn commit_on_threads(registry: &BufferResourceRegistry, threads: usize) {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .unwrap()
        .install(|| registry.commit());
}

/// A source named `name` that takes a while to produce `grid(3, 0.0)`,
/// counting its runs.
fn slow_seed(name: &str, calls: &Arc<AtomicUsize>) -> BufferSourceSharedPtr {
    let calls = calls.clone();
    Arc::new(ComputedBufferSource::new(name, float3(), move || {
        calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(50));
        Some(grid(3, 0.0))
    }))
}

#[test]
fn test_concurrent_sync_then_single_commit() {
    // --- 1. ARRANGE ---
    let registry = small_registry(1 << 16);
    let role = Token::new("primvar");

    // Sync threads allocate and schedule concurrently.
    let ranges: Vec<_> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|worker| {
                let registry = &registry;
                let role = &role;
                scope.spawn(move || {
                    (0..16)
                        .map(|i| {
                            let range = registry.allocate_range(role, &points_specs(), UsageHint::empty());
                            let z = (worker * 16 + i) as f32;
                            let source: BufferSourceSharedPtr =
                                Arc::new(ValueBufferSource::new("points", grid(3, z)));
                            registry.add_sources(&range, vec![source]);
                            (range, z)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        workers.into_iter().flat_map(|w| w.join().unwrap()).collect()
    });

    // --- 2. ACT ---
    registry.commit();

    // --- 3. ASSERT ---
    assert_eq!(registry.last_commit_stats().sources_uploaded, 128);
    for (range, z) in &ranges {
        assert_eq!(
            range.read_data(&Token::new("points")),
            grid(3, *z),
            "Every range should hold its own data after the commit"
        );
    }
    assert!(!registry.buffer_arrays().needs_reallocation());
}

#[test]
fn test_growth_past_array_limit_migrates_ranges() {
    // --- 1. ARRANGE ---
    let registry = small_registry(8);
    let role = Token::new("primvar");
    let ranges: Vec<_> = (0..3)
        .map(|i| {
            let range = registry.allocate_range(&role, &points_specs(), UsageHint::empty());
            let source: BufferSourceSharedPtr =
                Arc::new(ValueBufferSource::new("points", grid(2, i as f32)));
            registry.add_sources(&range, vec![source]);
            range
        })
        .collect();
    registry.commit();
    assert_eq!(registry.buffer_arrays().arrays().len(), 1);

    // --- 2. ACT ---
    // The middle range grows to 6 elements: 2 + 6 + 2 no longer fits in 8.
    let grown: BufferSourceSharedPtr = Arc::new(ValueBufferSource::new("points", grid(6, 9.0)));
    registry.add_sources(&ranges[1], vec![grown]);
    registry.commit();

    // --- 3. ASSERT ---
    assert!(registry.buffer_arrays().arrays().len() >= 2, "Overflow should spill into a new array");
    assert_eq!(ranges[0].read_data(&Token::new("points")), grid(2, 0.0));
    assert_eq!(ranges[1].read_data(&Token::new("points")), grid(6, 9.0));
    assert_eq!(
        ranges[2].read_data(&Token::new("points")),
        grid(2, 2.0),
        "Migrated ranges keep the data copied from their previous array"
    );
}

#[test]
fn test_computations_resolve_before_consuming_primvars() {
    // --- 1. ARRANGE ---
    let scene = Arc::new(TestScene::default());
    let delegate: Arc<dyn SceneDelegate> = scene.clone();
    let mut catalog = HashMap::new();
    for id in ["/Rest", "/Offset"] {
        let mut prim = ExtComputation::new(path(id));
        prim.sync(delegate.as_ref(), ExtComputationDirtyBits::ALL_DIRTY);
        catalog.insert(path(id), prim.descriptor().clone());
    }
    *scene.offset.lock().unwrap() = 0.5;

    let registry = BufferResourceRegistry::default();
    let range = registry.allocate_range(&Token::new("primvar"), &points_specs(), UsageHint::empty());
    let mut computations = Vec::new();
    let offset = ExtCompCpuComputation::create_computation(
        &delegate,
        &catalog[&path("/Offset")],
        &catalog,
        &mut computations,
    )
    .unwrap();
    let primvar: BufferSourceSharedPtr = Arc::new(ExtCompPrimvarBufferSource::new(
        Token::new("points"),
        offset,
        &Token::new("deformed"),
        float3(),
    ));

    // Schedule the consumer before its producers.
    registry.add_sources(&range, vec![primvar]);
    for computation in computations.into_iter().rev() {
        registry.add_computation(computation);
    }

    // --- 2. ACT ---
    registry.commit();

    // --- 3. ASSERT ---
    assert_eq!(range.read_data(&Token::new("points")), grid(3, 0.5));
    let stats = registry.last_commit_stats();
    assert_eq!(stats.computations_resolved, 2);
    assert_eq!(stats.computations_failed, 0);
    assert_eq!(scene.invocation_count("/Rest"), 1);
    assert_eq!(scene.invocation_count("/Offset"), 1);
}

#[test]
fn test_shared_pre_chained_source_feeds_every_range() {
    // --- 1. ARRANGE ---
    let registry = small_registry(1 << 16);
    let role = Token::new("primvar");
    let calls = Arc::new(AtomicUsize::new(0));
    let seed = slow_seed("seed", &calls);
    let ranges: Vec<_> = (0..8)
        .map(|i| {
            let range = registry.allocate_range(&role, &points_specs(), UsageHint::empty());
            let upstream = seed.clone();
            let lifted = ComputedBufferSource::new("points", float3(), move || {
                let seed = Value::from_bytes(upstream.tuple_type(), upstream.data()?);
                let points = seed.as_vec3f_array()?.iter().map(|p| [p[0], p[1], p[2] + i as f32]);
                Some(Value::from(points.collect::<Vec<[f32; 3]>>()))
            })
            .with_pre_chained(seed.clone());
            registry.add_sources(&range, vec![Arc::new(lifted) as BufferSourceSharedPtr]);
            (range, i as f32)
        })
        .collect();

    // --- 2. ACT ---
    commit_on_threads(&registry, 8);

    // --- 3. ASSERT ---
    let stats = registry.last_commit_stats();
    assert_eq!(stats.sources_skipped, 0, "No entry may lose the race for the shared seed");
    assert_eq!(stats.sources_uploaded, 8);
    assert_eq!(calls.load(Ordering::SeqCst), 1, "The shared seed should run once");
    for (range, z) in &ranges {
        assert_eq!(range.read_data(&Token::new("points")), grid(3, *z));
    }
}

#[test]
fn test_source_scheduled_into_many_ranges_uploads_everywhere() {
    // --- 1. ARRANGE ---
    let registry = small_registry(1 << 16);
    let role = Token::new("primvar");
    let calls = Arc::new(AtomicUsize::new(0));
    let points = slow_seed("points", &calls);
    let ranges: Vec<_> = (0..8)
        .map(|_| {
            let range = registry.allocate_range(&role, &points_specs(), UsageHint::empty());
            registry.add_sources(&range, vec![points.clone()]);
            range
        })
        .collect();

    // --- 2. ACT ---
    commit_on_threads(&registry, 8);

    // --- 3. ASSERT ---
    assert_eq!(registry.last_commit_stats().sources_skipped, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for range in &ranges {
        assert_eq!(
            range.read_data(&Token::new("points")),
            grid(3, 0.0),
            "Entries racing on one source should wait for it, not skip it"
        );
    }
}

#[test]
fn test_primvars_resolve_unscheduled_computations() {
    // --- 1. ARRANGE ---
    let scene = Arc::new(TestScene::default());
    let delegate: Arc<dyn SceneDelegate> = scene.clone();
    let mut catalog = HashMap::new();
    for id in ["/Rest", "/Offset"] {
        let mut prim = ExtComputation::new(path(id));
        prim.sync(delegate.as_ref(), ExtComputationDirtyBits::ALL_DIRTY);
        catalog.insert(path(id), prim.descriptor().clone());
    }
    *scene.offset.lock().unwrap() = 2.0;

    let registry = BufferResourceRegistry::default();
    let mut computations = Vec::new();
    let offset = ExtCompCpuComputation::create_computation(
        &delegate,
        &catalog[&path("/Offset")],
        &catalog,
        &mut computations,
    )
    .unwrap();
    let ranges: Vec<_> = (0..8)
        .map(|_| {
            let range = registry.allocate_range(&Token::new("primvar"), &points_specs(), UsageHint::empty());
            let primvar: BufferSourceSharedPtr = Arc::new(ExtCompPrimvarBufferSource::new(
                Token::new("points"),
                offset.clone(),
                &Token::new("deformed"),
                float3(),
            ));
            registry.add_sources(&range, vec![primvar]);
            range
        })
        .collect();

    // --- 2. ACT ---
    // The computations themselves are never scheduled.
    commit_on_threads(&registry, 8);

    // --- 3. ASSERT ---
    for range in &ranges {
        assert_eq!(range.read_data(&Token::new("points")), grid(3, 2.0));
    }
    assert_eq!(registry.last_commit_stats().sources_skipped, 0);
    assert_eq!(scene.invocation_count("/Rest"), 1);
    assert_eq!(scene.invocation_count("/Offset"), 1);
}
