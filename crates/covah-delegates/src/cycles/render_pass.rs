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

use super::mesh::CyclesMesh;
use crate::common::{lock, set_stat, settings_version, stat_count, target_samples, SampleProgress, SharedStats};
use covah_core::Token;
use covah_hydra::render_index::RenderIndex;
use covah_hydra::render_pass::{RenderPass, RenderPassState};

/// Stat: objects in the Cycles scene.
pub const OBJECT_COUNT: &str = "objectCount";
/// Stat: vertices over every visible object.
pub const VERTEX_COUNT: &str = "vertexCount";
/// Stat: triangles over every visible object.
pub const TRIANGLE_COUNT: &str = "triangleCount";
/// Stat: samples accumulated so far.
pub const SAMPLES: &str = "samples";
/// Stat: the render resolution as `[width, height]`.
pub const RESOLUTION: &str = "resolution";

/// Drives the Cycles session: counts the bound scene and accumulates
/// samples until convergence.
#[derive(Debug)]
pub struct CyclesRenderPass {
    progress: SampleProgress,
    stats: SharedStats,
}

impl CyclesRenderPass {
    pub(super) fn new(stats: SharedStats) -> Self {
        Self {
            progress: SampleProgress::default(),
            stats,
        }
    }
}

impl RenderPass for CyclesRenderPass {
    fn execute(&mut self, index: &RenderIndex, state: &RenderPassState, render_tags: &[Token]) {
        self.progress.advance(
            index.change_tracker().scene_state_version(),
            settings_version(index),
            target_samples(index, 64),
        );

        let (mut objects, mut vertices, mut triangles) = (0usize, 0usize, 0usize);
        for rprim in index.rprims_for_tags(render_tags) {
            let Some(mesh) = rprim.as_any().downcast_ref::<CyclesMesh>() else {
                continue;
            };
            let Some(object) = mesh.object() else {
                continue;
            };
            let geometry = object.geometry();
            if !geometry.visible || !object.is_resolved() {
                continue;
            }
            objects += 1;
            vertices += geometry.points.len();
            triangles += geometry.triangle_count();
        }

        let mut stats = lock(&self.stats);
        set_stat(&mut stats, OBJECT_COUNT, stat_count(objects));
        set_stat(&mut stats, VERTEX_COUNT, stat_count(vertices));
        set_stat(&mut stats, TRIANGLE_COUNT, stat_count(triangles));
        set_stat(&mut stats, SAMPLES, self.progress.samples());
        let resolution = [state.width, state.height].map(|extent| i32::try_from(extent).unwrap_or(i32::MAX));
        set_stat(&mut stats, RESOLUTION, resolution.to_vec());
    }

    fn is_converged(&self) -> bool {
        self.progress.is_converged()
    }
}
