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

//! Registry for managing metrics.

use crate::metrics::{Metric, MetricId, MetricKind, MetricsError, MetricsResult};
use crate::storage::{InMemoryBackend, MetricsBackend};
use std::sync::Arc;

/// Entry point of the metrics system.
///
/// Registration is idempotent: registering an id twice returns a handle to
/// the metric already stored, keeping its value. Registering it with another
/// kind fails with [`MetricsError::KindMismatch`].
#[derive(Debug, Clone)]
pub struct MetricsRegistry {
    backend: Arc<dyn MetricsBackend>,
}

impl MetricsRegistry {
    /// Creates a registry over a fresh [`InMemoryBackend`].
    pub fn new() -> Self {
        Self::with_backend(Arc::new(InMemoryBackend::new()))
    }

    /// Creates a registry over `backend`.
    pub fn with_backend(backend: Arc<dyn MetricsBackend>) -> Self {
        Self { backend }
    }

    /// Registers counter `namespace:name`.
    pub fn register_counter(
        &self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> MetricsResult<CounterHandle> {
        let id = MetricId::new(namespace, name);
        self.register(Metric::new_counter(id.clone(), description))?;
        Ok(CounterHandle {
            id,
            backend: self.backend.clone(),
        })
    }

    /// Registers gauge `namespace:name` measured in `unit`.
    pub fn register_gauge(
        &self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
    ) -> MetricsResult<GaugeHandle> {
        let id = MetricId::new(namespace, name);
        self.register(Metric::new_gauge(id.clone(), description, unit))?;
        Ok(GaugeHandle {
            id,
            backend: self.backend.clone(),
        })
    }

    fn register(&self, metric: Metric) -> MetricsResult<()> {
        let expected = metric.kind();
        let id = metric.id.clone();
        if self.backend.insert_if_absent(metric)? {
            log::trace!("Registered {:?} metric {}", expected, id);
            return Ok(());
        }
        let found = self.backend.get_metric(&id)?.kind();
        if found != expected {
            return Err(MetricsError::KindMismatch { id, expected, found });
        }
        Ok(())
    }

    /// A copy of metric `id`.
    pub fn get_metric(&self, id: &MetricId) -> MetricsResult<Metric> {
        self.backend.get_metric(id)
    }

    /// Returns `true` if `id` is registered.
    pub fn contains_metric(&self, id: &MetricId) -> bool {
        self.backend.contains_metric(id)
    }

    /// Metrics in `namespace`, sorted by name.
    pub fn namespace_metrics(&self, namespace: &str) -> Vec<Metric> {
        let mut metrics = match self.memory_backend() {
            Some(memory) => memory.metrics_by_namespace(namespace),
            None => self
                .backend
                .list_all_metrics()
                .into_iter()
                .filter(|m| m.id.namespace == namespace)
                .collect(),
        };
        metrics.sort_by(|a, b| a.id.cmp(&b.id));
        metrics
    }

    /// Metrics of `kind`, sorted by id.
    pub fn metrics_of_kind(&self, kind: MetricKind) -> Vec<Metric> {
        let mut metrics = match self.memory_backend() {
            Some(memory) => memory.metrics_by_kind(kind),
            None => self
                .backend
                .list_all_metrics()
                .into_iter()
                .filter(|m| m.kind() == kind)
                .collect(),
        };
        metrics.sort_by(|a, b| a.id.cmp(&b.id));
        metrics
    }

    /// Every metric, sorted by id.
    pub fn all_metrics(&self) -> Vec<Metric> {
        let mut metrics = self.backend.list_all_metrics();
        metrics.sort_by(|a, b| a.id.cmp(&b.id));
        metrics
    }

    /// Number of registered metrics.
    pub fn metric_count(&self) -> usize {
        self.backend.metric_count()
    }

    /// Removes every metric. Existing handles start failing with
    /// [`MetricsError::NotFound`].
    pub fn clear_all(&self) -> MetricsResult<()> {
        self.backend.clear_all()
    }

    /// The storage backend.
    pub fn backend(&self) -> &Arc<dyn MetricsBackend> {
        &self.backend
    }

    fn memory_backend(&self) -> Option<&InMemoryBackend> {
        self.backend.as_any().downcast_ref::<InMemoryBackend>()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a registered counter.
#[derive(Debug, Clone)]
pub struct CounterHandle {
    id: MetricId,
    backend: Arc<dyn MetricsBackend>,
}

impl CounterHandle {
    /// Adds one and returns the new total.
    pub fn increment(&self) -> MetricsResult<u64> {
        self.backend.increment_counter(&self.id, 1)
    }

    /// Adds `amount` and returns the new total.
    pub fn increment_by(&self, amount: u64) -> MetricsResult<u64> {
        self.backend.increment_counter(&self.id, amount)
    }

    /// The current total.
    pub fn get(&self) -> MetricsResult<u64> {
        let metric = self.backend.get_metric(&self.id)?;
        metric.value.as_counter().ok_or(MetricsError::KindMismatch {
            id: metric.id,
            expected: MetricKind::Counter,
            found: MetricKind::Gauge,
        })
    }

    /// The counter id.
    pub fn id(&self) -> &MetricId {
        &self.id
    }
}

/// Handle to a registered gauge.
#[derive(Debug, Clone)]
pub struct GaugeHandle {
    id: MetricId,
    backend: Arc<dyn MetricsBackend>,
}

impl GaugeHandle {
    /// Sets the reading.
    pub fn set(&self, value: f64) -> MetricsResult<()> {
        self.backend.set_gauge(&self.id, value)
    }

    /// The current reading.
    pub fn get(&self) -> MetricsResult<f64> {
        let metric = self.backend.get_metric(&self.id)?;
        metric.value.as_gauge().ok_or(MetricsError::KindMismatch {
            id: metric.id,
            expected: MetricKind::Gauge,
            found: MetricKind::Counter,
        })
    }

    /// The gauge id.
    pub fn id(&self) -> &MetricId {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert_eq!(registry.metric_count(), 0);
    }

    #[test]
    fn test_counter_registration_and_operations() {
        let registry = MetricsRegistry::new();

        let counter = registry
            .register_counter("hydra", "commits", "Resource registry commits")
            .unwrap();

        assert_eq!(counter.increment().unwrap(), 1);
        assert_eq!(counter.increment_by(5).unwrap(), 6);
        assert_eq!(counter.get().unwrap(), 6);
        assert!(registry.contains_metric(counter.id()));
        assert_eq!(registry.metric_count(), 1);
    }

    #[test]
    fn test_gauge_registration_and_operations() {
        let registry = MetricsRegistry::new();

        let gauge = registry
            .register_gauge("hydra", "buffer_array_bytes", "Committed buffer bytes", "bytes")
            .unwrap();
        gauge.set(4096.0).unwrap();

        assert_eq!(gauge.get().unwrap(), 4096.0);
        assert_eq!(registry.get_metric(gauge.id()).unwrap().unit, "bytes");
    }

    #[test]
    fn test_reregistration_keeps_value() {
        // --- 1. ARRANGE ---
        let registry = MetricsRegistry::new();
        let first = registry.register_counter("hydra", "commits", "").unwrap();
        first.increment_by(3).unwrap();

        // --- 2. ACT ---
        let second = registry.register_counter("hydra", "commits", "").unwrap();

        // --- 3. ASSERT ---
        assert_eq!(second.get().unwrap(), 3);
        assert_eq!(registry.metric_count(), 1);
    }

    #[test]
    fn test_reregistration_with_other_kind_fails() {
        let registry = MetricsRegistry::new();
        registry.register_counter("hydra", "commits", "").unwrap();

        let result = registry.register_gauge("hydra", "commits", "", "count");

        assert!(matches!(
            result,
            Err(MetricsError::KindMismatch {
                expected: MetricKind::Gauge,
                found: MetricKind::Counter,
                ..
            })
        ));
    }

    #[test]
    fn test_queries_are_sorted() {
        let registry = MetricsRegistry::new();
        registry.register_counter("hydra", "sorted_ids_full_sort", "").unwrap();
        registry.register_counter("hydra", "commits", "").unwrap();
        registry.register_gauge("runtime", "frame_ms", "", "ms").unwrap();

        let names: Vec<_> = registry
            .namespace_metrics("hydra")
            .into_iter()
            .map(|m| m.id.name)
            .collect();

        assert_eq!(names, ["commits", "sorted_ids_full_sort"]);
        assert_eq!(registry.metrics_of_kind(MetricKind::Gauge).len(), 1);
        assert_eq!(registry.all_metrics()[0].id, MetricId::new("hydra", "commits"));
    }

    #[test]
    fn test_clear_all_invalidates_handles() {
        let registry = MetricsRegistry::new();
        let counter = registry.register_counter("hydra", "commits", "").unwrap();

        registry.clear_all().unwrap();

        assert_eq!(registry.metric_count(), 0);
        assert!(matches!(counter.increment(), Err(MetricsError::NotFound(_))));
    }
}
