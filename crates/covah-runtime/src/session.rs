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

//! The frame loop: sync, commit, render, collect.

use crate::config::SessionConfig;
use crate::scene::ProceduralScene;
use anyhow::{bail, Context};
use covah_core::telemetry::perf::PerfLog;
use covah_core::Token;
use covah_hydra::plugin::RendererPluginRegistry;
use covah_hydra::render_delegate::RenderStats;
use covah_hydra::render_pass::{RenderPass, RenderPassState};
use covah_hydra::{tokens, RenderIndex, SceneDelegate};
use std::sync::Arc;

/// What one frame produced.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame: u32,
    pub converged: bool,
    pub stats: RenderStats,
}

/// A render index over a procedural scene and one renderer plugin.
pub struct Session {
    plugin_id: Token,
    index: RenderIndex,
    scene: Arc<ProceduralScene>,
    pass: Option<Box<dyn RenderPass>>,
    pass_state: RenderPassState,
    config: SessionConfig,
    time: f32,
}

impl Session {
    /// Loads the configured plugin from `registry` and populates the index.
    pub fn new(registry: &RendererPluginRegistry, config: SessionConfig, perf: PerfLog) -> anyhow::Result<Self> {
        config.validate()?;
        let plugin_id = match &config.renderer {
            Some(id) => Token::new(id),
            None => registry
                .default_plugin_id()
                .context("no supported renderer plugin is linked")?,
        };

        let delegate = registry.create_render_delegate(&plugin_id, &config.settings);
        if delegate.is_null() {
            bail!("renderer plugin '{}' is unknown or unsupported", plugin_id);
        }
        let mut index = RenderIndex::with_perf(delegate, perf).context("render index without a delegate")?;

        let scene = Arc::new(ProceduralScene::new(&config.scene)?);
        let scene_delegate: Arc<dyn SceneDelegate> = scene.clone();
        for id in scene.computation_ids() {
            index.insert_ext_computation(scene_delegate.clone(), id.clone());
        }
        let mesh = Token::new(tokens::MESH);
        for id in scene.mesh_ids() {
            if !index.insert_rprim(&mesh, scene_delegate.clone(), id.clone()) {
                bail!("renderer plugin '{}' cannot render mesh {}", plugin_id, id);
            }
        }

        log::info!(
            "Session on '{}': {} meshes, {} computations",
            plugin_id,
            config.scene.prims,
            scene.computation_ids().count()
        );
        Ok(Self {
            plugin_id,
            index,
            scene,
            pass: None,
            pass_state: RenderPassState::default(),
            config,
            time: 0.0,
        })
    }

    /// The loaded plugin.
    pub fn plugin_id(&self) -> &Token {
        &self.plugin_id
    }

    /// The render index.
    pub fn index(&self) -> &RenderIndex {
        &self.index
    }

    /// Runs one frame. Frames after the first advance the scene time, which
    /// dirties the deformer chain.
    pub fn run_frame(&mut self, frame: u32) -> FrameReport {
        if frame > 0 && self.config.scene.deformer {
            self.time += self.config.time_step;
            self.scene.set_time(self.time);
            self.index.mark_all_ext_computations_dirty();
        }

        self.index.sync_all();
        match &mut self.pass {
            Some(pass) => self.index.execute(pass.as_mut(), &self.pass_state, &[]),
            None => self.pass = self.index.render(&self.pass_state, &[]),
        }

        let interval = self.config.gc_interval;
        if interval > 0 && (frame + 1) % interval == 0 {
            self.index.garbage_collect();
            log::trace!("Collected garbage after frame {}", frame);
        }

        FrameReport {
            frame,
            converged: self.pass.as_ref().is_some_and(|pass| pass.is_converged()),
            stats: self
                .index
                .render_delegate()
                .map(|delegate| delegate.render_stats())
                .unwrap_or_default(),
        }
    }

    /// The configured frame count.
    pub fn frames(&self) -> u32 {
        self.config.frames
    }
}
