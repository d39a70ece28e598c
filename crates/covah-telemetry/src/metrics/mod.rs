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

//! Metric identifiers, values, and errors.

pub mod registry;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a metric by namespace and name (`hydra:commits`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetricId {
    /// The component that emits the metric (`hydra`, `runtime`).
    pub namespace: String,
    /// The metric name within its namespace.
    pub name: String,
}

impl MetricId {
    /// Creates an id.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

/// The kind of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricKind {
    /// Monotonic total.
    Counter,
    /// Last written value.
    Gauge,
}

/// The current value of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MetricValue {
    /// A counter total.
    Counter(u64),
    /// A gauge reading.
    Gauge(f64),
}

impl MetricValue {
    /// The kind this value belongs to.
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Counter(_) => MetricKind::Counter,
            MetricValue::Gauge(_) => MetricKind::Gauge,
        }
    }

    /// The counter total, if this is a counter.
    pub fn as_counter(&self) -> Option<u64> {
        match self {
            MetricValue::Counter(v) => Some(*v),
            MetricValue::Gauge(_) => None,
        }
    }

    /// The gauge reading, if this is a gauge.
    pub fn as_gauge(&self) -> Option<f64> {
        match self {
            MetricValue::Gauge(v) => Some(*v),
            MetricValue::Counter(_) => None,
        }
    }
}

/// A registered metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// The metric id.
    pub id: MetricId,
    /// What the metric measures.
    pub description: String,
    /// Unit of the value (`count`, `bytes`, `ms`).
    pub unit: String,
    /// The current value.
    pub value: MetricValue,
    /// Number of writes since registration.
    pub updates: u64,
}

impl Metric {
    /// A counter starting at zero.
    pub fn new_counter(id: MetricId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            unit: "count".to_string(),
            value: MetricValue::Counter(0),
            updates: 0,
        }
    }

    /// A gauge starting at zero.
    pub fn new_gauge(id: MetricId, description: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            unit: unit.into(),
            value: MetricValue::Gauge(0.0),
            updates: 0,
        }
    }

    /// The kind of the metric.
    pub fn kind(&self) -> MetricKind {
        self.value.kind()
    }
}

/// Result of a metrics operation.
pub type MetricsResult<T> = Result<T, MetricsError>;

/// Errors raised by the metrics registry and its backends.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// No metric is registered under the id.
    #[error("metric not found: {0}")]
    NotFound(MetricId),
    /// The metric exists with another kind.
    #[error("metric {id} is a {found:?}, expected a {expected:?}")]
    KindMismatch {
        /// The metric.
        id: MetricId,
        /// The kind the operation needs.
        expected: MetricKind,
        /// The kind actually registered.
        found: MetricKind,
    },
    /// The backend could not be read or written.
    #[error("metrics storage error: {0}")]
    Storage(String),
    /// A snapshot could not be serialized.
    #[error("failed to serialize metrics snapshot")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_id_display() {
        let id = MetricId::new("hydra", "commits");
        assert_eq!(id.to_string(), "hydra:commits");
    }

    #[test]
    fn test_value_accessors_match_kind() {
        let counter = MetricValue::Counter(3);
        let gauge = MetricValue::Gauge(1.5);

        assert_eq!(counter.kind(), MetricKind::Counter);
        assert_eq!(counter.as_counter(), Some(3));
        assert_eq!(counter.as_gauge(), None);
        assert_eq!(gauge.as_gauge(), Some(1.5));
        assert_eq!(gauge.as_counter(), None);
    }

    #[test]
    fn test_kind_mismatch_message_names_the_metric() {
        let err = MetricsError::KindMismatch {
            id: MetricId::new("hydra", "buffer_array_bytes"),
            expected: MetricKind::Counter,
            found: MetricKind::Gauge,
        };
        assert!(err.to_string().contains("hydra:buffer_array_bytes"));
    }
}
