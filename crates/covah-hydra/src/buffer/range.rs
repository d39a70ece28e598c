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

use super::array::{BufferArraySharedPtr, UsageHint};
use super::error::BufferArrayError;
use super::source::BufferSource;
use super::spec::BufferSpec;
use covah_core::telemetry::perf::{tokens, PerfLog};
use covah_core::{coding_error, Token, Value};
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

/// Shared handle to a range. Rprims hold these.
pub type BufferArrayRangeSharedPtr = Arc<dyn BufferArrayRange>;

/// Non-owning handle to a range. Buffer arrays hold these.
pub type BufferArrayRangeWeakPtr = Weak<dyn BufferArrayRange>;

/// A handle to a slice of a buffer array.
///
/// A range keeps its current array alive, so it stays readable after the
/// array's bookkeeping forgot about it.
pub trait BufferArrayRange: Send + Sync + fmt::Debug {
    /// Returns `true` if the range points at an array.
    fn is_valid(&self) -> bool;

    /// Returns `true` if the range was assigned to an array.
    fn is_assigned(&self) -> bool;

    /// Returns `true` if the data is immutable.
    fn is_immutable(&self) -> bool;

    /// Requests `num_elements` elements. Returns `true` when the owning array
    /// must be reallocated to honor the request.
    fn resize(&self, num_elements: usize) -> bool;

    /// Writes a resolved source into the resource of the same name.
    fn copy_data(&self, source: &dyn BufferSource) -> Result<(), BufferArrayError>;

    /// Reads back the resource `name`.
    fn read_data(&self, name: &Token) -> Value;

    /// The element offset within the array.
    fn element_offset(&self) -> usize;

    /// The number of elements requested.
    fn num_elements(&self) -> usize;

    /// The number of elements allocated.
    fn capacity(&self) -> usize;

    /// The owning array's version.
    fn version(&self) -> usize;

    /// The owning array's element limit.
    fn max_num_elements(&self) -> usize;

    /// The owning array's usage hint.
    fn usage_hint(&self) -> UsageHint;

    /// The owning array's resources.
    fn buffer_specs(&self) -> Vec<BufferSpec>;

    /// Returns `true` if both ranges live in the same array.
    fn is_aggregated_with(&self, other: &dyn BufferArrayRange) -> bool;

    /// Points the range at `array`. Called by the array on assignment and
    /// reallocation.
    fn set_buffer_array(&self, array: Option<BufferArraySharedPtr>);

    /// The owning array.
    fn buffer_array(&self) -> Option<BufferArraySharedPtr>;

    /// Writes a human-readable description.
    fn debug_dump(&self, out: &mut dyn fmt::Write) -> fmt::Result;

    /// Upcasts for downcasting to the concrete range.
    fn as_any(&self) -> &dyn Any;
}

/// A sparse, index-addressed list of ranges.
///
/// Empty slots are the normal state for data a prim does not have, so
/// [`get`](Self::get) past the end is not an error. Negative indices are.
#[derive(Debug, Clone, Default)]
pub struct BufferArrayRangeContainer {
    ranges: Vec<Option<BufferArrayRangeSharedPtr>>,
}

impl BufferArrayRangeContainer {
    /// Creates a container with `size` empty slots.
    pub fn new(size: usize) -> Self {
        Self {
            ranges: vec![None; size],
        }
    }

    /// Stores `range` at `index`, growing the container if needed.
    pub fn set(&mut self, index: isize, range: Option<BufferArrayRangeSharedPtr>) {
        let Ok(index) = usize::try_from(index) else {
            coding_error!("index {} must be non-negative", index);
            return;
        };
        if index >= self.ranges.len() {
            PerfLog::global().incr(tokens::BUFFER_ARRAY_RANGE_CONTAINER_RESIZED);
            self.ranges.resize(index + 1, None);
        }
        self.ranges[index] = range;
    }

    /// The range at `index`, if one was stored there.
    pub fn get(&self, index: isize) -> Option<&BufferArrayRangeSharedPtr> {
        let Ok(index) = usize::try_from(index) else {
            coding_error!("index {} must be non-negative", index);
            return None;
        };
        self.ranges.get(index).and_then(Option::as_ref)
    }

    /// Resizes the container, dropping ranges past the new end.
    pub fn resize(&mut self, size: isize) {
        let Ok(size) = usize::try_from(size) else {
            coding_error!("size {} must be non-negative", size);
            return;
        };
        PerfLog::global().incr(tokens::BUFFER_ARRAY_RANGE_CONTAINER_RESIZED);
        self.ranges.resize(size, None);
    }

    /// The number of slots.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Returns `true` if the container has no slots.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Iterates over the populated slots.
    pub fn iter(&self) -> impl Iterator<Item = &BufferArrayRangeSharedPtr> + '_ {
        self.ranges.iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::CpuBufferArrayRange;
    use covah_core::diagnostic::coding_error_count;

    fn range() -> BufferArrayRangeSharedPtr {
        Arc::new(CpuBufferArrayRange::new())
    }

    #[test]
    fn test_set_grows_and_get_returns_stored_range() {
        let mut container = BufferArrayRangeContainer::default();
        let r = range();

        container.set(3, Some(r.clone()));

        assert_eq!(container.len(), 4);
        assert!(container.get(0).is_none());
        assert!(Arc::ptr_eq(container.get(3).unwrap(), &r));
        assert_eq!(container.iter().count(), 1);
    }

    #[test]
    fn test_get_past_end_is_not_an_error() {
        let container = BufferArrayRangeContainer::new(2);
        let before = coding_error_count();
        assert!(container.get(10).is_none());
        assert_eq!(coding_error_count(), before);
    }

    #[test]
    fn test_negative_indices_are_coding_errors() {
        let mut container = BufferArrayRangeContainer::new(1);
        let before = coding_error_count();

        container.set(-1, Some(range()));
        assert!(container.get(-1).is_none());
        container.resize(-2);

        assert_eq!(coding_error_count(), before + 3);
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn test_resize_truncates() {
        let mut container = BufferArrayRangeContainer::default();
        container.set(0, Some(range()));
        container.set(1, Some(range()));
        container.resize(1);
        assert_eq!(container.len(), 1);
        assert!(container.get(1).is_none());
    }
}
