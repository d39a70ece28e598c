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

//! # Covah Telemetry
//!
//! Aggregates the fire-and-forget perf counters of the render core into a
//! queryable metrics registry.
//!
//! The core crates only know the [`PerfSink`](covah_core::telemetry::PerfSink)
//! contract. This crate provides [`MetricsPerfSink`], which turns each counter
//! update into a registry write, and [`TelemetryService`], which owns the
//! registry and periodically reports it.

#![warn(missing_docs)]

pub mod metrics;
pub mod perf_sink;
pub mod service;
pub mod storage;
pub mod utils;

pub use metrics::registry::{CounterHandle, GaugeHandle, MetricsRegistry};
pub use metrics::{Metric, MetricId, MetricKind, MetricValue, MetricsError, MetricsResult};
pub use perf_sink::MetricsPerfSink;
pub use service::{TelemetryService, TelemetrySnapshot};
