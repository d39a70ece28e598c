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

//! Service owning the metrics registry and reporting it periodically.

use crate::metrics::registry::MetricsRegistry;
use crate::metrics::{Metric, MetricValue, MetricsResult};
use crate::perf_sink::{MetricsPerfSink, HYDRA_NAMESPACE};
use covah_core::telemetry::perf::{self, PerfLog};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A point-in-time copy of every metric, sorted by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// The metrics.
    pub metrics: Vec<Metric>,
}

impl TelemetrySnapshot {
    /// Counter `namespace:name`, if present.
    pub fn counter(&self, namespace: &str, name: &str) -> Option<u64> {
        self.find(namespace, name)?.value.as_counter()
    }

    /// Gauge `namespace:name`, if present.
    pub fn gauge(&self, namespace: &str, name: &str) -> Option<f64> {
        self.find(namespace, name)?.value.as_gauge()
    }

    fn find(&self, namespace: &str, name: &str) -> Option<&Metric> {
        self.metrics
            .iter()
            .find(|m| m.id.namespace == namespace && m.id.name == name)
    }

    /// The snapshot as pretty-printed JSON.
    pub fn to_json(&self) -> MetricsResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Owns the metrics registry and the perf sink feeding it.
#[derive(Debug)]
pub struct TelemetryService {
    metrics: MetricsRegistry,
    perf_sink: Arc<MetricsPerfSink>,
    last_report: Instant,
    report_interval: Duration,
}

impl TelemetryService {
    /// Creates a service that reports at most once per `report_interval`.
    pub fn new(report_interval: Duration) -> Self {
        let metrics = MetricsRegistry::new();
        let perf_sink = Arc::new(MetricsPerfSink::new(metrics.clone(), HYDRA_NAMESPACE));
        Self {
            metrics,
            perf_sink,
            last_report: Instant::now(),
            report_interval,
        }
    }

    /// Installs the service's sink as the process-wide perf sink. Returns
    /// `false` if another sink was installed first.
    pub fn install_global(&self) -> bool {
        let installed = perf::install_global_sink(self.perf_sink.clone());
        if installed {
            log::info!("Perf counters routed to telemetry namespace '{}'", HYDRA_NAMESPACE);
        } else {
            log::warn!("A global perf sink is already installed; keeping it");
        }
        installed
    }

    /// A perf handle writing into this service, independent of the global
    /// sink.
    pub fn perf_log(&self) -> PerfLog {
        PerfLog::new(self.perf_sink.clone())
    }

    /// Should be called once per frame. Logs a report if the interval has
    /// passed and returns whether it did.
    pub fn tick(&mut self) -> bool {
        if self.last_report.elapsed() < self.report_interval {
            return false;
        }
        self.report();
        self.last_report = Instant::now();
        true
    }

    /// Logs every metric at debug level and a one-line summary at info.
    pub fn report(&self) {
        let snapshot = self.snapshot();
        for metric in &snapshot.metrics {
            match metric.value {
                MetricValue::Counter(v) => log::debug!("{} = {}", metric.id, v),
                MetricValue::Gauge(v) => log::debug!("{} = {:.3} {}", metric.id, v, metric.unit),
            }
        }
        log::info!(
            "Telemetry: {} metrics, {} commits, {} rprims synced",
            snapshot.metrics.len(),
            snapshot.counter(HYDRA_NAMESPACE, perf::tokens::COMMITS).unwrap_or(0),
            snapshot.counter(HYDRA_NAMESPACE, perf::tokens::RPRIMS_SYNCED).unwrap_or(0),
        );
    }

    /// A copy of every metric.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            metrics: self.metrics.all_metrics(),
        }
    }

    /// The metrics registry.
    pub fn metrics_registry(&self) -> &MetricsRegistry {
        &self.metrics
    }
}

impl Default for TelemetryService {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
