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

//! RAII timing of a scope into a gauge.

use crate::metrics::registry::GaugeHandle;
use std::time::Instant;

/// Records the lifetime of a scope, in milliseconds, into a gauge when
/// dropped.
#[derive(Debug)]
pub struct ScopedMetricTimer<'a> {
    start: Instant,
    gauge: &'a GaugeHandle,
}

impl<'a> ScopedMetricTimer<'a> {
    /// Starts timing.
    pub fn new(gauge: &'a GaugeHandle) -> Self {
        Self {
            start: Instant::now(),
            gauge,
        }
    }
}

impl Drop for ScopedMetricTimer<'_> {
    fn drop(&mut self) {
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        if let Err(err) = self.gauge.set(elapsed_ms) {
            log::warn!("[ScopedMetricTimer] Failed to record {}: {}", self.gauge.id(), err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MetricsRegistry;

    #[test]
    fn test_timer_writes_on_drop() {
        let registry = MetricsRegistry::new();
        let gauge = registry.register_gauge("runtime", "frame_ms", "", "ms").unwrap();
        gauge.set(-1.0).unwrap();

        {
            let _timer = ScopedMetricTimer::new(&gauge);
        }

        assert!(gauge.get().unwrap() >= 0.0);
    }
}
