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

//! The storage contract behind [`MetricsRegistry`](crate::MetricsRegistry).

use crate::metrics::{Metric, MetricId, MetricKind, MetricValue, MetricsError, MetricsResult};
use std::any::Any;
use std::fmt::Debug;

/// Thread-safe storage for metrics.
///
/// Writers from many threads may hit the same metric at once (rprims syncing
/// in parallel all bump the same counters), so every update goes through
/// [`modify_metric`](Self::modify_metric), which a backend must apply
/// atomically.
pub trait MetricsBackend: Send + Sync + Debug + 'static {
    /// Downcasting access.
    fn as_any(&self) -> &dyn Any;

    /// Stores `metric` unless its id is already present. Returns `true` if
    /// it was stored.
    fn insert_if_absent(&self, metric: Metric) -> MetricsResult<bool>;

    /// A copy of metric `id`.
    fn get_metric(&self, id: &MetricId) -> MetricsResult<Metric>;

    /// Applies `update` to metric `id` under the backend's write lock.
    fn modify_metric(
        &self,
        id: &MetricId,
        update: &mut dyn FnMut(&mut Metric) -> MetricsResult<()>,
    ) -> MetricsResult<()>;

    /// Returns `true` if `id` is registered.
    fn contains_metric(&self, id: &MetricId) -> bool;

    /// Copies of every metric.
    fn list_all_metrics(&self) -> Vec<Metric>;

    /// Removes every metric.
    fn clear_all(&self) -> MetricsResult<()>;

    /// Number of registered metrics.
    fn metric_count(&self) -> usize;

    /// Adds `delta` to counter `id` and returns the new total.
    fn increment_counter(&self, id: &MetricId, delta: u64) -> MetricsResult<u64> {
        let mut total = 0;
        self.modify_metric(id, &mut |metric| match metric.value {
            MetricValue::Counter(ref mut value) => {
                *value = value.saturating_add(delta);
                metric.updates += 1;
                total = *value;
                Ok(())
            }
            MetricValue::Gauge(_) => Err(MetricsError::KindMismatch {
                id: metric.id.clone(),
                expected: MetricKind::Counter,
                found: MetricKind::Gauge,
            }),
        })?;
        Ok(total)
    }

    /// Sets gauge `id` to `value`.
    fn set_gauge(&self, id: &MetricId, value: f64) -> MetricsResult<()> {
        self.modify_metric(id, &mut |metric| match metric.value {
            MetricValue::Gauge(ref mut current) => {
                *current = value;
                metric.updates += 1;
                Ok(())
            }
            MetricValue::Counter(_) => Err(MetricsError::KindMismatch {
                id: metric.id.clone(),
                expected: MetricKind::Gauge,
                found: MetricKind::Counter,
            }),
        })
    }
}
