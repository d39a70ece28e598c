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

//! Telemetry contracts for the render core.
//!
//! This module defines only the "what": a sink that accepts perf-counter
//! updates. `covah-telemetry` provides a sink that aggregates them into a
//! metrics registry. Nothing in the render core ever reads a counter back to
//! make a decision.

pub mod perf;

pub use perf::{install_global_sink, PerfLog, PerfSink};
