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

//! Bridges the render core's perf counters into the metrics registry.

use crate::metrics::registry::MetricsRegistry;
use crate::metrics::{Metric, MetricId, MetricKind};
use covah_core::telemetry::perf::PerfSink;

/// Namespace under which render-core counters are stored.
pub const HYDRA_NAMESPACE: &str = "hydra";

/// A [`PerfSink`] that records every counter update as a registry metric.
///
/// Metrics are created the first time a name is seen. A name first seen as a
/// counter stays a counter: a later gauge write to it is dropped with a
/// warning, since perf emission never fails the caller.
#[derive(Debug, Clone)]
pub struct MetricsPerfSink {
    registry: MetricsRegistry,
    namespace: String,
}

impl MetricsPerfSink {
    /// Creates a sink writing into `registry` under `namespace`.
    pub fn new(registry: MetricsRegistry, namespace: impl Into<String>) -> Self {
        Self {
            registry,
            namespace: namespace.into(),
        }
    }

    /// The registry the sink writes into.
    pub fn registry(&self) -> &MetricsRegistry {
        &self.registry
    }

    fn ensure(&self, name: &str, kind: MetricKind) -> MetricId {
        let id = MetricId::new(self.namespace.clone(), name);
        let metric = match kind {
            MetricKind::Counter => Metric::new_counter(id.clone(), name),
            MetricKind::Gauge => Metric::new_gauge(id.clone(), name, ""),
        };
        if let Err(err) = self.registry.backend().insert_if_absent(metric) {
            log::warn!("Failed to create perf metric {}: {}", id, err);
        }
        id
    }
}

impl PerfSink for MetricsPerfSink {
    fn increment_counter(&self, name: &str, amount: u64) {
        let id = self.ensure(name, MetricKind::Counter);
        if let Err(err) = self.registry.backend().increment_counter(&id, amount) {
            log::warn!("Dropped perf counter update: {}", err);
        }
    }

    fn set_gauge(&self, name: &str, value: f64) {
        let id = self.ensure(name, MetricKind::Gauge);
        if let Err(err) = self.registry.backend().set_gauge(&id, value) {
            log::warn!("Dropped perf gauge update: {}", err);
        }
    }
}
