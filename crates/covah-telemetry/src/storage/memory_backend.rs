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

//! An in-memory metrics backend.

use crate::metrics::{Metric, MetricId, MetricKind, MetricsError, MetricsResult};
use crate::storage::backend::MetricsBackend;
use std::any::Any;
use std::collections::HashMap;
use std::sync::RwLock;

/// Metrics stored in a `RwLock<HashMap>`: concurrent readers, one writer.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    storage: RwLock<HashMap<MetricId, Metric>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Metrics whose namespace is `namespace`.
    pub fn metrics_by_namespace(&self, namespace: &str) -> Vec<Metric> {
        self.filtered(|metric| metric.id.namespace == namespace)
    }

    /// Metrics of `kind`.
    pub fn metrics_by_kind(&self, kind: MetricKind) -> Vec<Metric> {
        self.filtered(|metric| metric.kind() == kind)
    }

    fn filtered(&self, keep: impl Fn(&Metric) -> bool) -> Vec<Metric> {
        match self.storage.read() {
            Ok(storage) => storage.values().filter(|m| keep(m)).cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    fn lock_error() -> MetricsError {
        MetricsError::Storage("metrics lock poisoned".to_string())
    }
}

impl MetricsBackend for InMemoryBackend {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn insert_if_absent(&self, metric: Metric) -> MetricsResult<bool> {
        let mut storage = self.storage.write().map_err(|_| Self::lock_error())?;
        if storage.contains_key(&metric.id) {
            return Ok(false);
        }
        storage.insert(metric.id.clone(), metric);
        Ok(true)
    }

    fn get_metric(&self, id: &MetricId) -> MetricsResult<Metric> {
        let storage = self.storage.read().map_err(|_| Self::lock_error())?;
        storage
            .get(id)
            .cloned()
            .ok_or_else(|| MetricsError::NotFound(id.clone()))
    }

    fn modify_metric(
        &self,
        id: &MetricId,
        update: &mut dyn FnMut(&mut Metric) -> MetricsResult<()>,
    ) -> MetricsResult<()> {
        let mut storage = self.storage.write().map_err(|_| Self::lock_error())?;
        let metric = storage
            .get_mut(id)
            .ok_or_else(|| MetricsError::NotFound(id.clone()))?;
        update(metric)
    }

    fn contains_metric(&self, id: &MetricId) -> bool {
        self.storage
            .read()
            .map(|storage| storage.contains_key(id))
            .unwrap_or(false)
    }

    fn list_all_metrics(&self) -> Vec<Metric> {
        self.filtered(|_| true)
    }

    fn clear_all(&self) -> MetricsResult<()> {
        self.storage.write().map_err(|_| Self::lock_error())?.clear();
        Ok(())
    }

    fn metric_count(&self) -> usize {
        self.storage.read().map(|storage| storage.len()).unwrap_or(0)
    }
}
