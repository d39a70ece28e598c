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

use super::spec::BufferSpec;
use covah_core::{Token, TupleType};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Shared handle to a buffer source.
pub type BufferSourceSharedPtr = Arc<dyn BufferSource>;

const UNRESOLVED: u8 = 0;
const BEING_RESOLVED: u8 = 1;
const RESOLVED: u8 = 2;
const RESOLVE_ERROR: u8 = 3;

/// The resolve state machine shared by every buffer source.
///
/// `Unresolved -> BeingResolved -> Resolved | ResolveError`. Only the thread
/// that wins [`try_lock`](Self::try_lock) may compute; everyone else observes
/// the terminal state once it is published.
#[derive(Default)]
pub struct ResolveState(AtomicU8);

impl ResolveState {
    /// A fresh, unresolved state.
    pub const fn new() -> Self {
        Self(AtomicU8::new(UNRESOLVED))
    }

    /// A state that starts out resolved, for sources whose data exists at
    /// construction.
    pub const fn resolved() -> Self {
        Self(AtomicU8::new(RESOLVED))
    }

    /// Claims the right to resolve. Returns `false` if another caller already
    /// claimed it or the source is past resolution.
    pub fn try_lock(&self) -> bool {
        self.0
            .compare_exchange(UNRESOLVED, BEING_RESOLVED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Publishes a successful resolve.
    pub fn set_resolved(&self) {
        self.0.store(RESOLVED, Ordering::Release);
    }

    /// Publishes a failed resolve. The source counts as resolved so that
    /// nothing waits on it, but carries no data.
    pub fn set_resolve_error(&self) {
        self.0.store(RESOLVE_ERROR, Ordering::Release);
    }

    /// Returns `true` once the source reached a terminal state.
    pub fn is_resolved(&self) -> bool {
        self.0.load(Ordering::Acquire) >= RESOLVED
    }

    /// Returns `true` if resolution failed.
    pub fn has_resolve_error(&self) -> bool {
        self.0.load(Ordering::Acquire) == RESOLVE_ERROR
    }

    /// Returns `true` while another caller holds the resolve claim.
    pub fn is_being_resolved(&self) -> bool {
        self.0.load(Ordering::Acquire) == BEING_RESOLVED
    }
}

impl fmt::Debug for ResolveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.0.load(Ordering::Relaxed) {
            UNRESOLVED => "Unresolved",
            BEING_RESOLVED => "BeingResolved",
            RESOLVED => "Resolved",
            _ => "ResolveError",
        };
        f.write_str(state)
    }
}

/// A lazily resolved, typed block of data destined for a buffer array.
///
/// [`data`](Self::data), [`tuple_type`](Self::tuple_type), and
/// [`num_elements`](Self::num_elements) are only meaningful after
/// [`resolve`](Self::resolve) returned `true`. Implementations report a
/// coding error and return a safe default when called earlier.
pub trait BufferSource: Send + Sync + fmt::Debug {
    /// The resource name this source fills.
    fn name(&self) -> Token;

    /// The raw element bytes.
    fn data(&self) -> Option<&[u8]>;

    /// The element type.
    fn tuple_type(&self) -> TupleType;

    /// The number of elements.
    fn num_elements(&self) -> usize;

    /// Appends the buffer specs this source needs in its destination array.
    fn buffer_specs(&self, specs: &mut Vec<BufferSpec>);

    /// Produces the data. Returns `true` once the source is resolved, `false`
    /// if it cannot make progress yet (a dependency is unresolved, or another
    /// thread is resolving it). Calling it again after success is a no-op
    /// that returns `true`.
    fn resolve(&self) -> bool;

    /// The resolve state.
    fn state(&self) -> &ResolveState;

    /// Returns `true` if the source can be resolved and scheduled.
    fn check_valid(&self) -> bool;

    /// Returns `true` once resolution reached a terminal state.
    fn is_resolved(&self) -> bool {
        self.state().is_resolved()
    }

    /// Returns `true` if resolution failed.
    fn has_resolve_error(&self) -> bool {
        self.state().has_resolve_error()
    }

    /// Returns `true` if the source is well formed.
    fn is_valid(&self) -> bool {
        self.check_valid()
    }

    /// A content hash used to share identical immutable sources.
    fn compute_hash(&self) -> u64 {
        compute_content_hash(&self.name(), self.tuple_type(), self.data().unwrap_or_default())
    }

    /// Returns `true` if a source must resolve before this one.
    fn has_pre_chained_buffer(&self) -> bool {
        false
    }

    /// The source that must resolve before this one.
    fn pre_chained_buffer(&self) -> Option<BufferSourceSharedPtr> {
        None
    }

    /// Every source that must resolve before this one. Defaults to the
    /// pre-chained source.
    fn upstream_sources(&self) -> Vec<BufferSourceSharedPtr> {
        self.pre_chained_buffer().into_iter().collect()
    }

    /// Returns `true` if this source produces follow-up sources.
    fn has_chained_buffer(&self) -> bool {
        false
    }

    /// Sources to resolve and upload after this one, into the same range.
    fn chained_buffers(&self) -> Vec<BufferSourceSharedPtr> {
        Vec::new()
    }
}

/// Hashes a source's name, element type, and bytes.
pub fn compute_content_hash(name: &Token, tuple_type: TupleType, data: &[u8]) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(name.as_str().as_bytes());
    hasher.update(&[tuple_type.scalar as u8]);
    hasher.update(&(tuple_type.components as u64).to_le_bytes());
    hasher.update(data);
    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(head)
}
