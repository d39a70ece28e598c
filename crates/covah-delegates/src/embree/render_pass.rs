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

use crate::common::{lock, set_stat, settings_version, stat_count, target_samples, SampleProgress, SharedStats};
use covah_core::{Token, Value};
use covah_hydra::render_index::RenderIndex;
use covah_hydra::render_pass::{RenderPass, RenderPassState};
use covah_hydra::rprim::PRIMVAR_SLOT;
use covah_hydra::tokens;

/// Stat: prims gathered by the last execution.
pub const PRIM_COUNT: &str = "primCount";
/// Stat: points gathered by the last execution.
pub const POINT_COUNT: &str = "pointCount";
/// Stat: world bounds of the gathered points, as `[min, max]`.
pub const WORLD_BOUNDS: &str = "worldBounds";
/// Stat: samples accumulated so far.
pub const SAMPLES: &str = "samples";

/// Gathers the committed points of every visible mesh into one scene and
/// accumulates samples until the delegate's convergence target.
#[derive(Debug)]
pub struct EmbreeRenderPass {
    progress: SampleProgress,
    stats: SharedStats,
}

impl EmbreeRenderPass {
    pub(super) fn new(stats: SharedStats) -> Self {
        Self {
            progress: SampleProgress::default(),
            stats,
        }
    }

    /// The sample accumulation state.
    pub fn progress(&self) -> &SampleProgress {
        &self.progress
    }
}

#[derive(Debug)]
struct Bounds {
    min: [f32; 3],
    max: [f32; 3],
}

impl Bounds {
    fn empty() -> Self {
        Self {
            min: [f32::INFINITY; 3],
            max: [f32::NEG_INFINITY; 3],
        }
    }

    fn extend(&mut self, point: &[f32; 3]) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(point[axis]);
            self.max[axis] = self.max[axis].max(point[axis]);
        }
    }

    fn is_empty(&self) -> bool {
        self.min[0] > self.max[0]
    }
}

impl RenderPass for EmbreeRenderPass {
    fn execute(&mut self, index: &RenderIndex, _state: &RenderPassState, render_tags: &[Token]) {
        let restarted = self.progress.advance(
            index.change_tracker().scene_state_version(),
            settings_version(index),
            target_samples(index, 16),
        );

        let points_name = Token::new(tokens::POINTS);
        let mut bounds = Bounds::empty();
        let mut prim_count = 0usize;
        let mut point_count = 0usize;
        for rprim in index.rprims_for_tags(render_tags) {
            let shared = rprim.shared_data();
            if !shared.visible {
                continue;
            }
            let Some(range) = shared.range(PRIMVAR_SLOT) else {
                continue;
            };
            let points = range.read_data(&points_name);
            let Some(points) = points.as_vec3f_array() else {
                continue;
            };
            prim_count += 1;
            point_count += points.len();
            points.iter().for_each(|p| bounds.extend(p));
        }

        if restarted {
            log::debug!("Embree scene rebuilt: {} prims, {} points", prim_count, point_count);
        }

        let mut stats = lock(&self.stats);
        set_stat(&mut stats, PRIM_COUNT, stat_count(prim_count));
        set_stat(&mut stats, POINT_COUNT, stat_count(point_count));
        set_stat(&mut stats, SAMPLES, self.progress.samples());
        if bounds.is_empty() {
            stats.remove(&Token::new(WORLD_BOUNDS));
        } else {
            set_stat(&mut stats, WORLD_BOUNDS, Value::Vec3fArray(vec![bounds.min, bounds.max]));
        }
    }

    fn is_converged(&self) -> bool {
        self.progress.is_converged()
    }
}
