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

use covah_core::telemetry::perf::tokens;
use covah_core::{ScalarType, Token, TupleType, Value};
use covah_hydra::buffer::{
    BufferSourceSharedPtr, BufferSpec, CpuAggregationStrategy, UsageHint, ValueBufferSource,
};
use covah_hydra::resource_registry::{BufferResourceRegistry, ResourceRegistry};
use covah_telemetry::perf_sink::HYDRA_NAMESPACE;
use covah_telemetry::TelemetryService;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_commit_counters_reach_the_service() {
    // --- 1. ARRANGE ---
    let service = TelemetryService::new(Duration::from_secs(3600));
    let registry = BufferResourceRegistry::new(
        Arc::new(CpuAggregationStrategy::default()),
        service.perf_log(),
    );
    let points = Token::new("points");
    let range = registry.allocate_range(
        &Token::new("primvar"),
        &[BufferSpec::new(points.clone(), TupleType::new(ScalarType::Float32, 3))],
        UsageHint::empty(),
    );
    let source: BufferSourceSharedPtr = Arc::new(ValueBufferSource::new(
        points,
        Value::from(vec![[0.0f32, 0.0, 0.0], [1.0, 1.0, 1.0]]),
    ));

    // --- 2. ACT ---
    registry.add_sources(&range, vec![source]);
    registry.commit();
    registry.garbage_collect();

    // --- 3. ASSERT ---
    let snapshot = service.snapshot();
    assert_eq!(
        snapshot.counter(HYDRA_NAMESPACE, tokens::COMMITS),
        Some(1),
        "One commit should be counted"
    );
    assert_eq!(
        snapshot.counter(HYDRA_NAMESPACE, tokens::GARBAGE_COLLECTED),
        Some(1),
        "One collection should be counted"
    );
    assert_eq!(
        snapshot.counter(HYDRA_NAMESPACE, tokens::BUFFER_SOURCES_UPLOADED),
        Some(1),
        "The points source should be uploaded once"
    );
    assert!(
        snapshot.gauge(HYDRA_NAMESPACE, tokens::BUFFER_ARRAY_BYTES).unwrap_or(0.0) >= 24.0,
        "The committed array holds at least two float3 points"
    );
}
