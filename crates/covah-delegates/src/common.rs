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

//! Pieces shared by the backends.

use covah_core::{Token, Value};
use covah_hydra::render_delegate::{
    RenderSettingDescriptor, RenderSettingsMap, RenderSettingsStore, RenderStats,
};
use covah_hydra::render_index::RenderIndex;
use covah_hydra::tokens;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Statistics written by a render pass and read by its delegate.
pub(crate) type SharedStats = Arc<Mutex<RenderStats>>;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Seeds a settings store with `settings`, then the defaults the caller left
/// out.
pub(crate) fn settings_store(
    settings: &RenderSettingsMap,
    descriptors: &[RenderSettingDescriptor],
) -> RenderSettingsStore {
    let mut store = RenderSettingsStore::new(settings.clone());
    store.populate_defaults(descriptors);
    store
}

/// The delegate's converged sample count, or `fallback`.
pub(crate) fn target_samples(index: &RenderIndex, fallback: u32) -> u32 {
    index
        .render_delegate()
        .and_then(|d| d.get_render_setting(&Token::new(tokens::CONVERGED_SAMPLES_PER_PIXEL)))
        .and_then(|v| v.as_int())
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(fallback)
}

pub(crate) fn settings_version(index: &RenderIndex) -> u64 {
    index
        .render_delegate()
        .map(|d| d.render_settings_version())
        .unwrap_or(0)
}

pub(crate) fn set_stat(stats: &mut RenderStats, key: &str, value: impl Into<Value>) {
    stats.insert(Token::new(key), value.into());
}

/// A count as a stat value, clamped to `u32::MAX`.
pub(crate) fn stat_count<T>(count: T) -> u32
where
    u32: TryFrom<T>,
{
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Progressive sample accumulation across executions of a pass.
///
/// Each execution adds one sample. A changed scene or settings version
/// restarts the count, since the accumulated image no longer matches.
#[derive(Debug, Clone, Default)]
pub struct SampleProgress {
    samples: u32,
    target: u32,
    last_scene_version: Option<u64>,
    last_settings_version: Option<u64>,
}

impl SampleProgress {
    /// Records one execution. Returns `true` if the accumulation restarted.
    pub fn advance(&mut self, scene_version: u64, settings_version: u64, target: u32) -> bool {
        let restarted = self.last_scene_version != Some(scene_version)
            || self.last_settings_version != Some(settings_version);
        if restarted {
            self.samples = 0;
            self.last_scene_version = Some(scene_version);
            self.last_settings_version = Some(settings_version);
        }
        self.target = target;
        if self.samples < target {
            self.samples += 1;
        }
        restarted
    }

    /// Drops the accumulated samples. The next execution restarts.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Samples accumulated since the last restart.
    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// Returns `true` once the target sample count is reached.
    pub fn is_converged(&self) -> bool {
        self.last_scene_version.is_some() && self.samples >= self.target
    }
}
