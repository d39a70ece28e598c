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

use super::error::BufferArrayError;
use super::range::{BufferArrayRangeSharedPtr, BufferArrayRangeWeakPtr};
use super::spec::BufferSpec;
use super::CpuBufferArrayRange;
use bitflags::bitflags;
use covah_core::Token;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Shared handle to a buffer array.
pub type BufferArraySharedPtr = Arc<dyn BufferArray>;

bitflags! {
    /// How the ranges of an array are expected to change.
    ///
    /// Strategies only aggregate ranges with equal hints into one array.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct UsageHint: u32 {
        /// Data is written once and shared (topology, rest points).
        const IMMUTABLE = 1 << 0;
        /// Ranges change their element count between frames.
        const SIZE_VARYING = 1 << 1;
    }
}

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

fn no_range() -> BufferArrayRangeWeakPtr {
    Weak::<CpuBufferArrayRange>::new()
}

/// The bookkeeping every buffer array shares: role, usage hint, version,
/// and the weak list of ranges assigned to it.
///
/// The array never owns its ranges. Rprims hold the strong references and
/// [`remove_unused_ranges`](Self::remove_unused_ranges) drops the entries of
/// ranges that were released.
pub struct BufferArrayCore {
    role: Token,
    gc_perf_token: &'static str,
    usage_hint: UsageHint,
    generation: u64,
    version: AtomicUsize,
    needs_reallocation: AtomicBool,
    max_num_ranges: AtomicUsize,
    range_list: Mutex<Vec<BufferArrayRangeWeakPtr>>,
    range_count: AtomicUsize,
}

impl BufferArrayCore {
    /// Creates the bookkeeping for an array. `gc_perf_token` names the perf
    /// counter bumped when the array is garbage collected.
    pub fn new(role: Token, gc_perf_token: &'static str, usage_hint: UsageHint) -> Self {
        Self {
            role,
            gc_perf_token,
            usage_hint,
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            version: AtomicUsize::new(0),
            needs_reallocation: AtomicBool::new(false),
            max_num_ranges: AtomicUsize::new(usize::MAX),
            range_list: Mutex::new(Vec::new()),
            range_count: AtomicUsize::new(0),
        }
    }

    /// The role of the data held (`primvar`, `topology`).
    pub fn role(&self) -> &Token {
        &self.role
    }

    /// The perf counter bumped when this array is collected.
    pub fn gc_perf_token(&self) -> &'static str {
        self.gc_perf_token
    }

    /// The usage hint the array was created with.
    pub fn usage_hint(&self) -> UsageHint {
        self.usage_hint
    }

    /// A process-unique tag telling apart arrays whose versions coincide.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The structural version.
    pub fn version(&self) -> usize {
        self.version.load(Ordering::Acquire)
    }

    /// The `(generation, version)` pair downstream caches key on.
    pub fn allocation_id(&self) -> (u64, usize) {
        (self.generation, self.version())
    }

    /// Bumps the structural version.
    pub fn increment_version(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns `true` if range membership or sizes changed since the last
    /// reallocation.
    pub fn needs_reallocation(&self) -> bool {
        self.needs_reallocation.load(Ordering::Acquire)
    }

    /// Sets the reallocation flag.
    pub fn set_needs_reallocation(&self, needs: bool) {
        self.needs_reallocation.store(needs, Ordering::Release);
    }

    /// The maximum number of ranges the array accepts.
    pub fn max_num_ranges(&self) -> usize {
        self.max_num_ranges.load(Ordering::Relaxed)
    }

    /// Caps the number of ranges the array accepts.
    pub fn set_max_num_ranges(&self, max: usize) {
        self.max_num_ranges.store(max, Ordering::Relaxed);
    }

    /// The number of assigned ranges, live or not yet collected.
    pub fn range_count(&self) -> usize {
        self.range_count.load(Ordering::Acquire)
    }

    /// Returns the weak reference at `idx`, or an empty one if out of range.
    pub fn range(&self, idx: usize) -> BufferArrayRangeWeakPtr {
        self.lock_ranges().get(idx).cloned().unwrap_or_else(no_range)
    }

    /// Upgrades every range that is still alive, in slot order.
    pub fn live_ranges(&self) -> Vec<BufferArrayRangeSharedPtr> {
        self.lock_ranges().iter().filter_map(Weak::upgrade).collect()
    }

    /// Drops the entries of released ranges and compacts the list.
    ///
    /// Bumps the version when anything was removed. Calling it again without
    /// intervening releases changes nothing.
    pub fn remove_unused_ranges(&self) -> usize {
        let mut list = self.lock_ranges();
        let before = list.len();
        list.retain(|range| range.strong_count() > 0);
        let removed = before - list.len();
        self.range_count.store(list.len(), Ordering::Release);
        drop(list);
        if removed > 0 {
            self.increment_version();
        }
        removed
    }

    /// Replaces the range list after a reallocation.
    pub fn set_range_list(&self, ranges: &[BufferArrayRangeSharedPtr]) {
        let mut list = self.lock_ranges();
        *list = ranges.iter().map(Arc::downgrade).collect();
        self.range_count.store(list.len(), Ordering::Release);
    }

    fn claim_slot(&self) -> Option<usize> {
        let max = self.max_num_ranges();
        self.range_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| (count < max).then_some(count + 1))
            .ok()
    }

    fn lock_ranges(&self) -> std::sync::MutexGuard<'_, Vec<BufferArrayRangeWeakPtr>> {
        self.range_list.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for BufferArrayCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferArrayCore")
            .field("role", &self.role)
            .field("usage_hint", &self.usage_hint)
            .field("generation", &self.generation)
            .field("version", &self.version())
            .field("range_count", &self.range_count())
            .field("needs_reallocation", &self.needs_reallocation())
            .finish()
    }
}

/// An aggregation of ranges sharing one allocation per resource.
///
/// Implementations embed a [`BufferArrayCore`] and add the storage.
pub trait BufferArray: Send + Sync + fmt::Debug {
    /// The shared bookkeeping.
    fn core(&self) -> &BufferArrayCore;

    /// Drops released ranges and compacts storage. Returns `true` when the
    /// array holds no ranges anymore and can be destroyed by its owner.
    fn garbage_collect(&self) -> bool;

    /// Lays out `ranges` in this array, copying their data from wherever it
    /// currently lives: this array or `cur_range_owner`.
    fn reallocate(
        &self,
        ranges: &[BufferArrayRangeSharedPtr],
        cur_range_owner: &BufferArraySharedPtr,
    ) -> Result<(), BufferArrayError>;

    /// The element capacity above which a strategy starts a new array.
    fn max_num_elements(&self) -> usize;

    /// The resources this array holds.
    fn buffer_specs(&self) -> Vec<BufferSpec>;

    /// Bytes held by the array's resources.
    fn resource_bytes(&self) -> usize;

    /// Writes a human-readable description.
    fn debug_dump(&self, out: &mut dyn fmt::Write) -> fmt::Result;

    /// Upcasts for downcasting to the concrete array.
    fn as_any(&self) -> &dyn Any;

    /// Upcasts a shared handle for downcasting to the concrete array.
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    /// The role of the data held.
    fn role(&self) -> &Token {
        self.core().role()
    }

    /// The structural version.
    fn version(&self) -> usize {
        self.core().version()
    }

    /// The number of assigned ranges.
    fn range_count(&self) -> usize {
        self.core().range_count()
    }

    /// Returns `true` if the array must be reallocated before upload.
    fn needs_reallocation(&self) -> bool {
        self.core().needs_reallocation()
    }

    /// Returns `true` for arrays of immutable data.
    fn is_immutable(&self) -> bool {
        self.core().usage_hint().contains(UsageHint::IMMUTABLE)
    }

    /// The usage hint.
    fn usage_hint(&self) -> UsageHint {
        self.core().usage_hint()
    }
}

impl dyn BufferArray {
    /// Attaches `range` to this array if it has room for another range.
    ///
    /// Safe to call from many threads at once; only the list mutation is
    /// serialized. Returns `false` when the array is full, which is the
    /// caller's cue to create another array.
    pub fn try_assign_range(self: &Arc<Self>, range: &BufferArrayRangeSharedPtr) -> bool {
        let core = self.core();
        let Some(slot) = core.claim_slot() else {
            return false;
        };
        {
            let mut list = core.lock_ranges();
            if list.len() <= slot {
                list.resize_with(slot + 1, no_range);
            }
            list[slot] = Arc::downgrade(range);
        }
        range.set_buffer_array(Some(self.clone()));
        core.set_needs_reallocation(true);
        core.increment_version();
        true
    }
}
