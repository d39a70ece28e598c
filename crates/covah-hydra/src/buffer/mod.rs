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

//! Buffer sources, aggregated buffer arrays, and the ranges rprims hold.

mod array;
mod computed;
mod cpu;
mod error;
mod range;
mod registry;
mod source;
mod spec;
mod strategy;
mod value_source;

pub use array::{BufferArray, BufferArrayCore, BufferArraySharedPtr, UsageHint};
pub(crate) use computed::report_null_access;
pub use computed::{ComputedBufferSource, NullBufferSource};
pub use cpu::{CpuBufferArray, CpuBufferArrayRange};
pub use error::BufferArrayError;
pub use range::{
    BufferArrayRange, BufferArrayRangeContainer, BufferArrayRangeSharedPtr,
    BufferArrayRangeWeakPtr,
};
pub use registry::BufferArrayRegistry;
pub use source::{compute_content_hash, BufferSource, BufferSourceSharedPtr, ResolveState};
pub use spec::BufferSpec;
pub use strategy::{AggregationConfig, AggregationStrategy, CpuAggregationStrategy};
pub use value_source::ValueBufferSource;
