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

use super::array::{BufferArray, BufferArrayCore, BufferArraySharedPtr, UsageHint};
use super::error::BufferArrayError;
use super::range::{BufferArrayRange, BufferArrayRangeSharedPtr};
use super::source::BufferSource;
use super::spec::BufferSpec;
use covah_core::{coding_error, Token, TupleType, Value};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

#[derive(Debug)]
struct CpuResource {
    spec: BufferSpec,
    bytes: Vec<u8>,
}

impl CpuResource {
    fn element_size(&self) -> usize {
        self.spec.tuple_type.size_in_bytes()
    }
}

/// A buffer array whose resources live in host memory.
///
/// Each spec gets one contiguous byte vector; ranges are packed back to back
/// in assignment order. Reallocation rebuilds the vectors at the exact size
/// the live ranges need.
pub struct CpuBufferArray {
    core: BufferArrayCore,
    specs: Vec<BufferSpec>,
    max_num_elements: usize,
    resources: RwLock<Vec<CpuResource>>,
    capacity: AtomicUsize,
    weak_self: Weak<CpuBufferArray>,
}

impl CpuBufferArray {
    /// Creates an empty array holding one resource per spec.
    pub fn new(
        role: Token,
        gc_perf_token: &'static str,
        specs: Vec<BufferSpec>,
        usage_hint: UsageHint,
        max_num_elements: usize,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| {
            let resources = specs
                .iter()
                .map(|spec| CpuResource {
                    spec: spec.clone(),
                    bytes: Vec::new(),
                })
                .collect();
            Self {
                core: BufferArrayCore::new(role, gc_perf_token, usage_hint),
                specs,
                max_num_elements,
                resources: RwLock::new(resources),
                capacity: AtomicUsize::new(0),
                weak_self: weak_self.clone(),
            }
        })
    }

    /// The number of elements currently allocated across all ranges.
    pub fn total_capacity(&self) -> usize {
        self.capacity.load(Ordering::Acquire)
    }

    fn read_resources(&self) -> RwLockReadGuard<'_, Vec<CpuResource>> {
        self.resources.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_resources(&self) -> RwLockWriteGuard<'_, Vec<CpuResource>> {
        self.resources.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_elements(
        &self,
        name: &Token,
        tuple_type: TupleType,
        offset: usize,
        capacity: usize,
        data: &[u8],
    ) -> Result<(), BufferArrayError> {
        let mut resources = self.write_resources();
        let resource = resources
            .iter_mut()
            .find(|r| r.spec.name == *name)
            .ok_or_else(|| BufferArrayError::UnknownResource {
                role: self.core.role().clone(),
                name: name.clone(),
            })?;
        if resource.spec.tuple_type != tuple_type {
            return Err(BufferArrayError::TupleTypeMismatch {
                name: name.clone(),
                expected: resource.spec.tuple_type,
                found: tuple_type,
            });
        }
        let element_size = resource.element_size();
        if element_size == 0 {
            return Ok(());
        }
        let count = data.len() / element_size;
        if count > capacity {
            return Err(BufferArrayError::CapacityExceeded {
                name: name.clone(),
                requested: count,
                capacity,
            });
        }
        let start = offset * element_size;
        let end = start + count * element_size;
        match resource.bytes.get_mut(start..end) {
            Some(dst) => {
                dst.copy_from_slice(&data[..count * element_size]);
                Ok(())
            }
            None => Err(BufferArrayError::CapacityExceeded {
                name: name.clone(),
                requested: count,
                capacity: resource.bytes.len().saturating_sub(start) / element_size,
            }),
        }
    }

    fn read_elements(&self, name: &Token, offset: usize, count: usize) -> Value {
        let resources = self.read_resources();
        let Some(resource) = resources.iter().find(|r| r.spec.name == *name) else {
            return Value::Empty;
        };
        let element_size = resource.element_size();
        let start = offset * element_size;
        resource
            .bytes
            .get(start..start + count * element_size)
            .map_or(Value::Empty, |bytes| Value::from_bytes(resource.spec.tuple_type, bytes))
    }

    /// Copies `count` elements starting at `src_offset` into the matching
    /// resources of `dst`, starting at `dst_offset`.
    fn copy_elements_into(&self, src_offset: usize, count: usize, dst_offset: usize, dst: &mut [CpuResource]) {
        let resources = self.read_resources();
        for target in dst.iter_mut() {
            let Some(source) = resources.iter().find(|r| r.spec == target.spec) else {
                continue;
            };
            let size = source.element_size();
            let src = source.bytes.get(src_offset * size..(src_offset + count) * size);
            let dst = target.bytes.get_mut(dst_offset * size..(dst_offset + count) * size);
            if let (Some(src), Some(dst)) = (src, dst) {
                dst.copy_from_slice(src);
            }
        }
    }
}

impl fmt::Debug for CpuBufferArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuBufferArray")
            .field("core", &self.core)
            .field("specs", &self.specs)
            .field("capacity", &self.total_capacity())
            .finish()
    }
}

impl BufferArray for CpuBufferArray {
    fn core(&self) -> &BufferArrayCore {
        &self.core
    }

    fn garbage_collect(&self) -> bool {
        let removed = self.core.remove_unused_ranges();
        if self.core.range_count() == 0 {
            return true;
        }
        if removed > 0 {
            if let Some(this) = self.weak_self.upgrade() {
                let owner: BufferArraySharedPtr = this;
                let live = self.core.live_ranges();
                if let Err(err) = self.reallocate(&live, &owner) {
                    coding_error!("failed to compact '{}' array: {}", self.core.role(), err);
                }
            }
        }
        false
    }

    fn reallocate(
        &self,
        ranges: &[BufferArrayRangeSharedPtr],
        cur_range_owner: &BufferArraySharedPtr,
    ) -> Result<(), BufferArrayError> {
        let Some(this) = self.weak_self.upgrade() else {
            return Err(BufferArrayError::UnexpectedOwner);
        };

        let mut typed = Vec::with_capacity(ranges.len());
        for range in ranges {
            let cpu = range
                .as_any()
                .downcast_ref::<CpuBufferArrayRange>()
                .ok_or_else(|| BufferArrayError::ForeignRange {
                    array: "cpu",
                    found: format!("{range:?}"),
                })?;
            if let Some(owner) = cpu.array() {
                let owned_here = Arc::ptr_eq(&owner, &this);
                let owned_by_source = std::ptr::addr_eq(Arc::as_ptr(&owner), Arc::as_ptr(cur_range_owner));
                if !owned_here && !owned_by_source {
                    return Err(BufferArrayError::UnexpectedOwner);
                }
            }
            typed.push(cpu);
        }

        let total: usize = typed.iter().map(|r| r.num_elements()).sum();
        let mut fresh: Vec<CpuResource> = self
            .specs
            .iter()
            .map(|spec| CpuResource {
                spec: spec.clone(),
                bytes: vec![0; total * spec.tuple_type.size_in_bytes()],
            })
            .collect();

        let mut layout = Vec::with_capacity(typed.len());
        let mut offset = 0;
        for range in &typed {
            let num_elements = range.num_elements();
            if let Some(owner) = range.array() {
                let count = num_elements.min(range.capacity());
                if count > 0 {
                    owner.copy_elements_into(range.element_offset(), count, offset, &mut fresh);
                }
            }
            layout.push(offset);
            offset += num_elements;
        }

        *self.write_resources() = fresh;
        self.capacity.store(total, Ordering::Release);
        for (range, offset) in typed.iter().zip(layout) {
            range.place(this.clone(), offset);
        }
        self.core.set_range_list(ranges);
        self.core.set_needs_reallocation(false);
        self.core.increment_version();

        log::trace!(
            "Reallocated '{}' array #{}: {} ranges, {} elements",
            self.core.role(),
            self.core.generation(),
            ranges.len(),
            total
        );
        Ok(())
    }

    fn max_num_elements(&self) -> usize {
        self.max_num_elements
    }

    fn buffer_specs(&self) -> Vec<BufferSpec> {
        self.specs.clone()
    }

    fn resource_bytes(&self) -> usize {
        self.read_resources().iter().map(|r| r.bytes.len()).sum()
    }

    fn debug_dump(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(
            out,
            "CpuBufferArray '{}' #{} v{} ({:?})",
            self.core.role(),
            self.core.generation(),
            self.core.version(),
            self.core.usage_hint()
        )?;
        writeln!(
            out,
            "  ranges: {}, capacity: {} / {}",
            self.core.range_count(),
            self.total_capacity(),
            self.max_num_elements
        )?;
        for resource in self.read_resources().iter() {
            writeln!(out, "  {} ({} bytes)", resource.spec, resource.bytes.len())?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A range into a [`CpuBufferArray`].
#[derive(Default)]
pub struct CpuBufferArrayRange {
    array: RwLock<Option<Arc<CpuBufferArray>>>,
    offset: AtomicUsize,
    num_elements: AtomicUsize,
    capacity: AtomicUsize,
}

impl CpuBufferArrayRange {
    /// Creates an unassigned range.
    pub fn new() -> Self {
        Self::default()
    }

    fn array(&self) -> Option<Arc<CpuBufferArray>> {
        self.array.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn place(&self, array: Arc<CpuBufferArray>, offset: usize) {
        *self.array.write().unwrap_or_else(PoisonError::into_inner) = Some(array);
        self.offset.store(offset, Ordering::Release);
        self.capacity.store(self.num_elements.load(Ordering::Acquire), Ordering::Release);
    }
}

impl fmt::Debug for CpuBufferArrayRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuBufferArrayRange")
            .field("array", &self.array().map(|a| a.core.generation()))
            .field("offset", &self.element_offset())
            .field("num_elements", &self.num_elements())
            .field("capacity", &self.capacity())
            .finish()
    }
}

impl BufferArrayRange for CpuBufferArrayRange {
    fn is_valid(&self) -> bool {
        self.is_assigned()
    }

    fn is_assigned(&self) -> bool {
        self.array.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    fn is_immutable(&self) -> bool {
        self.array().is_some_and(|a| a.is_immutable())
    }

    fn resize(&self, num_elements: usize) -> bool {
        let Some(array) = self.array() else {
            coding_error!("resize called on an unassigned range");
            return false;
        };
        self.num_elements.store(num_elements, Ordering::Release);
        if num_elements != self.capacity() {
            array.core.set_needs_reallocation(true);
            return true;
        }
        false
    }

    fn copy_data(&self, source: &dyn BufferSource) -> Result<(), BufferArrayError> {
        let array = self.array().ok_or(BufferArrayError::Unassigned)?;
        let Some(data) = source.data() else {
            return Ok(());
        };
        array.write_elements(
            &source.name(),
            source.tuple_type(),
            self.element_offset(),
            self.capacity(),
            data,
        )
    }

    fn read_data(&self, name: &Token) -> Value {
        let Some(array) = self.array() else {
            coding_error!("read_data('{}') on an unassigned range", name);
            return Value::Empty;
        };
        let count = self.num_elements().min(self.capacity());
        array.read_elements(name, self.element_offset(), count)
    }

    fn element_offset(&self) -> usize {
        self.offset.load(Ordering::Acquire)
    }

    fn num_elements(&self) -> usize {
        self.num_elements.load(Ordering::Acquire)
    }

    fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Acquire)
    }

    fn version(&self) -> usize {
        self.array().map_or(0, |a| a.core.version())
    }

    fn max_num_elements(&self) -> usize {
        self.array().map_or(0, |a| a.max_num_elements)
    }

    fn usage_hint(&self) -> UsageHint {
        self.array().map_or(UsageHint::empty(), |a| a.core.usage_hint())
    }

    fn buffer_specs(&self) -> Vec<BufferSpec> {
        self.array().map_or_else(Vec::new, |a| a.specs.clone())
    }

    fn is_aggregated_with(&self, other: &dyn BufferArrayRange) -> bool {
        let Some(other) = other.as_any().downcast_ref::<CpuBufferArrayRange>() else {
            return false;
        };
        match (self.array(), other.array()) {
            (Some(a), Some(b)) => Arc::ptr_eq(&a, &b),
            _ => false,
        }
    }

    fn set_buffer_array(&self, array: Option<BufferArraySharedPtr>) {
        let typed = match array {
            Some(array) => match array.into_any_arc().downcast::<CpuBufferArray>() {
                Ok(typed) => Some(typed),
                Err(_) => {
                    coding_error!("CpuBufferArrayRange assigned to a foreign buffer array");
                    return;
                }
            },
            None => None,
        };
        *self.array.write().unwrap_or_else(PoisonError::into_inner) = typed;
    }

    fn buffer_array(&self) -> Option<BufferArraySharedPtr> {
        self.array().map(|a| a as BufferArraySharedPtr)
    }

    fn debug_dump(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(
            out,
            "CpuBufferArrayRange offset={} elements={} capacity={}",
            self.element_offset(),
            self.num_elements(),
            self.capacity()
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ValueBufferSource;
    use covah_core::telemetry::perf::tokens;
    use covah_core::ScalarType;

    fn points_spec() -> BufferSpec {
        BufferSpec::new("points", TupleType::new(ScalarType::Float32, 3))
    }

    fn new_array() -> BufferArraySharedPtr {
        CpuBufferArray::new(
            Token::new("primvar"),
            tokens::GARBAGE_COLLECTED,
            vec![points_spec()],
            UsageHint::empty(),
            1 << 16,
        )
    }

    fn points(values: &[[f32; 3]]) -> ValueBufferSource {
        ValueBufferSource::new("points", Value::from(values.to_vec()))
    }

    fn upload(array: &BufferArraySharedPtr, source: &ValueBufferSource) -> BufferArrayRangeSharedPtr {
        let range: BufferArrayRangeSharedPtr = Arc::new(CpuBufferArrayRange::new());
        assert!(array.try_assign_range(&range));
        range.resize(source.num_elements());
        let live = array.core().live_ranges();
        array.reallocate(&live, array).unwrap();
        range.copy_data(source).unwrap();
        range
    }

    #[test]
    fn test_copy_then_read_back() {
        let array = new_array();
        let source = points(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);

        let range = upload(&array, &source);

        assert_eq!(range.read_data(&Token::new("points")), *source.value());
        assert_eq!(range.capacity(), 2);
        assert!(!array.needs_reallocation());
    }

    #[test]
    fn test_reallocate_preserves_existing_data() {
        let array = new_array();
        let first = points(&[[1.0, 1.0, 1.0]]);
        let second = points(&[[2.0, 2.0, 2.0], [3.0, 3.0, 3.0]]);

        let a = upload(&array, &first);
        let b = upload(&array, &second);

        assert_eq!(a.element_offset(), 0);
        assert_eq!(b.element_offset(), 1);
        assert_eq!(a.read_data(&Token::new("points")), *first.value());
        assert_eq!(b.read_data(&Token::new("points")), *second.value());
        assert!(a.is_aggregated_with(b.as_ref()));
    }

    #[test]
    fn test_range_stays_readable_after_gc_empties_array() {
        // --- 1. ARRANGE ---
        let array = new_array();
        let source = points(&[[7.0, 8.0, 9.0]]);
        let held = upload(&array, &source);

        // --- 2. ACT: forget the range on the array side ---
        array.core().set_range_list(&[]);
        let empty = array.garbage_collect();

        // --- 3. ASSERT ---
        assert!(empty);
        assert_eq!(array.range_count(), 0);
        assert!(held.is_valid());
        assert_eq!(held.read_data(&Token::new("points")), *source.value());
    }

    #[test]
    fn test_gc_compacts_after_release() {
        let array = new_array();
        let a = upload(&array, &points(&[[1.0, 0.0, 0.0]; 3]));
        let b = upload(&array, &points(&[[2.0, 0.0, 0.0]; 2]));
        drop(a);

        assert!(!array.garbage_collect());

        assert_eq!(array.range_count(), 1);
        assert_eq!(b.element_offset(), 0);
        assert_eq!(
            b.read_data(&Token::new("points")),
            Value::from(vec![[2.0f32, 0.0, 0.0]; 2])
        );
        let cpu = array.as_any().downcast_ref::<CpuBufferArray>().unwrap();
        assert_eq!(cpu.total_capacity(), 2);
    }

    #[test]
    fn test_mismatched_source_is_rejected() {
        let array = new_array();
        let range = upload(&array, &points(&[[0.0; 3]]));

        let normals = ValueBufferSource::new("normals", Value::from(vec![[0.0f32; 3]]));
        assert!(matches!(
            range.copy_data(&normals),
            Err(BufferArrayError::UnknownResource { .. })
        ));

        let too_many = points(&[[0.0; 3]; 4]);
        assert!(matches!(
            range.copy_data(&too_many),
            Err(BufferArrayError::CapacityExceeded { requested: 4, capacity: 1, .. })
        ));
    }

    #[test]
    fn test_migration_copies_from_previous_owner() {
        let old = new_array();
        let source = points(&[[5.0, 5.0, 5.0]]);
        let range = upload(&old, &source);

        let new = new_array();
        new.reallocate(std::slice::from_ref(&range), &old).unwrap();

        let owner = range.buffer_array().unwrap();
        assert!(std::ptr::addr_eq(Arc::as_ptr(&owner), Arc::as_ptr(&new)));
        assert_eq!(range.read_data(&Token::new("points")), *source.value());
        assert_eq!(new.range_count(), 1);
    }

    #[test]
    fn test_reallocate_rejects_unrelated_owner() {
        let owner = new_array();
        let range = upload(&owner, &points(&[[0.0; 3]]));
        let unrelated = new_array();
        let target = new_array();

        assert_eq!(
            target.reallocate(&[range], &unrelated),
            Err(BufferArrayError::UnexpectedOwner)
        );
    }
}
