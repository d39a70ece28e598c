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

use super::RprRenderControl;
use crate::common::{lock, set_stat, settings_version, stat_count, target_samples, SampleProgress, SharedStats};
use covah_core::Token;
use covah_hydra::render_index::RenderIndex;
use covah_hydra::render_pass::{RenderPass, RenderPassState};
use covah_hydra::rprim::PRIMVAR_SLOT;
use std::sync::Arc;

/// Stat: prims in the RPR scene.
pub const PRIM_COUNT: &str = "primCount";
/// Stat: primvar elements over every visible prim.
pub const ELEMENT_COUNT: &str = "elementCount";
/// Stat: samples accumulated so far.
pub const SAMPLES: &str = "samples";

/// Accumulates samples unless the delegate paused or stopped rendering.
#[derive(Debug)]
pub struct RprRenderPass {
    progress: SampleProgress,
    stats: SharedStats,
    control: Arc<RprRenderControl>,
    seen_restarts: u64,
}

impl RprRenderPass {
    pub(super) fn new(stats: SharedStats, control: Arc<RprRenderControl>) -> Self {
        let seen_restarts = control.restarts();
        Self {
            progress: SampleProgress::default(),
            stats,
            control,
            seen_restarts,
        }
    }

    /// The sample accumulation state.
    pub fn progress(&self) -> &SampleProgress {
        &self.progress
    }
}

impl RenderPass for RprRenderPass {
    fn execute(&mut self, index: &RenderIndex, _state: &RenderPassState, render_tags: &[Token]) {
        let restarts = self.control.restarts();
        if restarts != self.seen_restarts {
            self.seen_restarts = restarts;
            self.progress.reset();
        }
        if self.control.is_stopped() || self.control.is_paused() {
            log::trace!("RPR render idle, skipping execution");
            return;
        }

        self.progress.advance(
            index.change_tracker().scene_state_version(),
            settings_version(index),
            target_samples(index, 256),
        );

        let (mut prims, mut elements) = (0usize, 0usize);
        for rprim in index.rprims_for_tags(render_tags) {
            let shared = rprim.shared_data();
            if !shared.visible {
                continue;
            }
            prims += 1;
            elements += shared.range(PRIMVAR_SLOT).map_or(0, |r| r.num_elements());
        }

        let mut stats = lock(&self.stats);
        set_stat(&mut stats, PRIM_COUNT, stat_count(prims));
        set_stat(&mut stats, ELEMENT_COUNT, stat_count(elements));
        set_stat(&mut stats, SAMPLES, self.progress.samples());
    }

    fn is_converged(&self) -> bool {
        self.control.is_stopped() || self.progress.is_converged()
    }
}
