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

//! The per-delegate owner of buffer arrays and computations.
//!
//! [`ResourceRegistry::commit`] and [`ResourceRegistry::garbage_collect`] are
//! the two synchronization points of a frame. The trait runs the shared
//! bookkeeping (perf counters, the re-entrancy guard) and then hands over to
//! the implementation's `on_commit`/`on_garbage_collect` hooks.

mod buffer_registry;

pub use buffer_registry::{BufferResourceRegistry, CommitStats};

use covah_core::coding_error;
use covah_core::telemetry::perf::{tokens, PerfLog};
use covah_core::Token;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// What a registry is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryPhase {
    /// Neither committing nor collecting.
    Idle,
    /// Inside `commit`.
    Committing,
    /// Inside `garbage_collect`.
    Collecting,
}

impl RegistryPhase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => RegistryPhase::Committing,
            2 => RegistryPhase::Collecting,
            _ => RegistryPhase::Idle,
        }
    }
}

/// State shared by every registry implementation.
#[derive(Debug)]
pub struct RegistryBase {
    perf: PerfLog,
    phase: AtomicU8,
}

impl RegistryBase {
    /// Creates the shared state, reporting perf counters into `perf`.
    pub fn new(perf: PerfLog) -> Self {
        Self {
            perf,
            phase: AtomicU8::new(RegistryPhase::Idle as u8),
        }
    }

    /// The perf counter handle.
    pub fn perf(&self) -> &PerfLog {
        &self.perf
    }

    /// The current phase.
    pub fn phase(&self) -> RegistryPhase {
        RegistryPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn enter(&self, phase: RegistryPhase) -> Option<PhaseGuard<'_>> {
        match self.phase.compare_exchange(
            RegistryPhase::Idle as u8,
            phase as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Some(PhaseGuard(&self.phase)),
            Err(current) => {
                coding_error!(
                    "{:?} requested while the registry is {:?}",
                    phase,
                    RegistryPhase::from_u8(current)
                );
                None
            }
        }
    }
}

impl Default for RegistryBase {
    fn default() -> Self {
        Self::new(PerfLog::global())
    }
}

struct PhaseGuard<'a>(&'a AtomicU8);

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.0.store(RegistryPhase::Idle as u8, Ordering::Release);
    }
}

/// Owns the GPU- or host-resident resources of one render delegate.
pub trait ResourceRegistry: Send + Sync + fmt::Debug {
    /// The shared state.
    fn base(&self) -> &RegistryBase;

    /// Resolves every pending computation and source in dependency order,
    /// uploads the results, and reallocates every array that needs it.
    fn on_commit(&self);

    /// Reclaims resources no prim references anymore.
    fn on_garbage_collect(&self);

    /// Runs the per-frame commit. Must not be called from inside
    /// `garbage_collect`, and vice versa.
    fn commit(&self) {
        let Some(_guard) = self.base().enter(RegistryPhase::Committing) else {
            return;
        };
        self.base().perf().incr(tokens::COMMITS);
        log::trace!("Committing {:?}", self);
        self.on_commit();
    }

    /// Runs garbage collection. The perf counter is bumped even when the
    /// call is rejected for re-entrancy.
    fn garbage_collect(&self) {
        self.base().perf().incr(tokens::GARBAGE_COLLECTED);
        let Some(_guard) = self.base().enter(RegistryPhase::Collecting) else {
            return;
        };
        self.on_garbage_collect();
    }

    /// Drops compiled shaders. Registries without shaders ignore this.
    fn invalidate_shader_registry(&self) {}

    /// Reloads the resource at `path`. Registries without reloadable
    /// resources ignore this.
    fn reload_resource(&self, _resource_type: &Token, _path: &str) {}

    /// Bytes held, per role.
    fn resource_allocation(&self) -> BTreeMap<Token, usize> {
        BTreeMap::new()
    }

    /// Upcasts for downcasting to the concrete registry.
    fn as_any(&self) -> &dyn Any;
}
