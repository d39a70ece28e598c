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

//! Fire-and-forget performance counters.

use std::fmt;
use std::sync::{Arc, OnceLock};

/// Names of the counters emitted by the render core.
pub mod tokens {
    /// Incremented on every resource-registry garbage collection.
    pub const GARBAGE_COLLECTED: &str = "garbage_collected";
    /// Incremented on every resource-registry commit.
    pub const COMMITS: &str = "commits";
    /// Incremented when a range container grows or is resized.
    pub const BUFFER_ARRAY_RANGE_CONTAINER_RESIZED: &str = "buffer_array_range_container_resized";
    /// Number of buffer sources resolved during commits.
    pub const BUFFER_SOURCES_RESOLVED: &str = "buffer_sources_resolved";
    /// Number of buffer sources uploaded into ranges.
    pub const BUFFER_SOURCES_UPLOADED: &str = "buffer_sources_uploaded";
    /// Number of CPU computations resolved during commits.
    pub const COMPUTATIONS_COMMITTED: &str = "computations_committed";
    /// Number of computations that produced no output for a frame.
    pub const COMPUTATIONS_FAILED: &str = "computations_failed";
    /// Number of buffer arrays created by aggregation strategies.
    pub const BUFFER_ARRAYS_CREATED: &str = "buffer_arrays_created";
    /// Number of buffer-array reallocations.
    pub const BUFFER_ARRAYS_REALLOCATED: &str = "buffer_arrays_reallocated";
    /// Number of buffer arrays dropped by garbage collection.
    pub const BUFFER_ARRAYS_COLLECTED: &str = "buffer_arrays_collected";
    /// Number of instance-registry hits (deduplicated resources).
    pub const INSTANCE_REGISTRY_HITS: &str = "instance_registry_hits";
    /// Number of full sorts performed by sorted id collections.
    pub const SORTED_IDS_FULL_SORT: &str = "sorted_ids_full_sort";
    /// Number of incremental insertion sorts performed by sorted id collections.
    pub const SORTED_IDS_INSERT_SORT: &str = "sorted_ids_insert_sort";
    /// Number of rprims synced by the render index.
    pub const RPRIMS_SYNCED: &str = "rprims_synced";
    /// Gauge: bytes held by committed buffer arrays.
    pub const BUFFER_ARRAY_BYTES: &str = "buffer_array_bytes";
}

/// A destination for perf-counter updates.
pub trait PerfSink: Send + Sync + fmt::Debug {
    /// Adds `amount` to the counter `name`, creating it at zero if needed.
    fn increment_counter(&self, name: &str, amount: u64);

    /// Sets the gauge `name` to `value`.
    fn set_gauge(&self, name: &str, value: f64);
}

#[derive(Debug)]
struct NullSink;

impl PerfSink for NullSink {
    fn increment_counter(&self, _name: &str, _amount: u64) {}

    fn set_gauge(&self, _name: &str, _value: f64) {}
}

static GLOBAL_SINK: OnceLock<Arc<dyn PerfSink>> = OnceLock::new();

/// Installs the process-wide sink. Only the first call succeeds; later calls
/// return `false` and leave the installed sink in place.
pub fn install_global_sink(sink: Arc<dyn PerfSink>) -> bool {
    GLOBAL_SINK.set(sink).is_ok()
}

/// A cheap, clonable handle through which components emit perf counters.
#[derive(Debug, Clone)]
pub struct PerfLog {
    sink: Arc<dyn PerfSink>,
}

impl PerfLog {
    /// Creates a handle that writes into `sink`.
    pub fn new(sink: Arc<dyn PerfSink>) -> Self {
        Self { sink }
    }

    /// A handle that drops every update.
    pub fn null() -> Self {
        Self {
            sink: Arc::new(NullSink),
        }
    }

    /// A handle to the process-wide sink, or a null handle if none has been
    /// installed yet.
    pub fn global() -> Self {
        GLOBAL_SINK
            .get()
            .map(|sink| Self { sink: sink.clone() })
            .unwrap_or_else(Self::null)
    }

    /// Increments `name` by one.
    pub fn incr(&self, name: &str) {
        self.sink.increment_counter(name, 1);
    }

    /// Increments `name` by `amount`. Zero amounts are skipped.
    pub fn incr_by(&self, name: &str, amount: u64) {
        if amount > 0 {
            self.sink.increment_counter(name, amount);
        }
    }

    /// Sets the gauge `name`.
    pub fn set(&self, name: &str, value: f64) {
        self.sink.set_gauge(name, value);
    }
}

impl Default for PerfLog {
    fn default() -> Self {
        Self::global()
    }
}
