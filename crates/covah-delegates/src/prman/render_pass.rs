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

use super::INTEGRATOR;
use crate::common::{lock, set_stat, settings_version, stat_count, target_samples, SampleProgress, SharedStats};
use covah_core::{Token, Value};
use covah_hydra::render_index::RenderIndex;
use covah_hydra::render_pass::{RenderPass, RenderPassState};

/// Stat: prims handed to RenderMan.
pub const PRIM_COUNT: &str = "primCount";
/// Stat: samples accumulated so far.
pub const SAMPLES: &str = "samples";

/// Drives the interactive RenderMan session.
#[derive(Debug)]
pub struct PrmanRenderPass {
    progress: SampleProgress,
    stats: SharedStats,
}

impl PrmanRenderPass {
    pub(super) fn new(stats: SharedStats) -> Self {
        Self {
            progress: SampleProgress::default(),
            stats,
        }
    }
}

impl RenderPass for PrmanRenderPass {
    fn execute(&mut self, index: &RenderIndex, _state: &RenderPassState, render_tags: &[Token]) {
        let restarted = self.progress.advance(
            index.change_tracker().scene_state_version(),
            settings_version(index),
            target_samples(index, 64),
        );
        if restarted {
            let integrator = index
                .render_delegate()
                .and_then(|d| d.get_render_setting(&Token::new(INTEGRATOR)))
                .unwrap_or(Value::Empty);
            log::debug!("RenderMan edit restarted {:?}", integrator.as_str());
        }

        let prims = index
            .rprims_for_tags(render_tags)
            .filter(|rprim| rprim.shared_data().visible)
            .count();

        let mut stats = lock(&self.stats);
        set_stat(&mut stats, PRIM_COUNT, stat_count(prims));
        set_stat(&mut stats, SAMPLES, self.progress.samples());
    }

    fn is_converged(&self) -> bool {
        self.progress.is_converged()
    }
}
