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
use super::registry::CyclesResourceRegistry;
use super::render_pass::CyclesRenderPass;
use super::{DEVICE, SCENE_RESETS};
use crate::common::{lock, set_stat, settings_store, stat_count, SharedStats};
use covah_core::{PrimPath, Token};
use covah_hydra::render_delegate::{
    RenderDelegate, RenderSettingDescriptor, RenderSettingsMap, RenderSettingsStore, RenderStats,
};
use covah_hydra::render_pass::RenderPass;
use covah_hydra::resource_registry::ResourceRegistry;
use covah_hydra::rprim::Rprim;
use covah_hydra::tokens;
use std::any::Any;
use std::sync::Arc;

/// The Cycles render delegate.
#[derive(Debug)]
pub struct CyclesRenderDelegate {
    registry: Arc<CyclesResourceRegistry>,
    settings: RenderSettingsStore,
    stats: SharedStats,
}

impl CyclesRenderDelegate {
    /// Creates a delegate seeded with `settings`.
    pub fn new(settings: &RenderSettingsMap) -> Self {
        let delegate = Self {
            registry: Arc::new(CyclesResourceRegistry::default()),
            settings: settings_store(settings, &Self::descriptors()),
            stats: SharedStats::default(),
        };
        log::info!(
            "Cycles session on device '{}'",
            delegate
                .settings
                .get(&Token::new(DEVICE))
                .and_then(|v| v.as_str().map(str::to_owned))
                .unwrap_or_default()
        );
        delegate
    }

    fn descriptors() -> Vec<RenderSettingDescriptor> {
        vec![
            RenderSettingDescriptor::new("Samples To Convergence", tokens::CONVERGED_SAMPLES_PER_PIXEL, 64),
            RenderSettingDescriptor::new("Thread Limit", tokens::THREAD_LIMIT, 0),
            RenderSettingDescriptor::new("Device", DEVICE, "CPU"),
            RenderSettingDescriptor::new("Interactive", tokens::ENABLE_INTERACTIVE, true),
        ]
    }

    /// The typed resource registry.
    pub fn cycles_registry(&self) -> &Arc<CyclesResourceRegistry> {
        &self.registry
    }
}

impl RenderDelegate for CyclesRenderDelegate {
    fn resource_registry(&self) -> Arc<dyn ResourceRegistry> {
        self.registry.clone()
    }

    fn supported_rprim_types(&self) -> Vec<Token> {
        vec![Token::new(tokens::MESH)]
    }

    fn create_rprim(&self, type_id: &Token, id: &PrimPath) -> Option<Box<dyn Rprim>> {
        if type_id != tokens::MESH {
            return None;
        }
        Some(Box::new(CyclesMesh::new(id.clone(), self.registry.clone())))
    }

    fn create_render_pass(&self) -> Box<dyn RenderPass> {
        Box::new(CyclesRenderPass::new(self.stats.clone()))
    }

    fn render_settings(&self) -> &RenderSettingsStore {
        &self.settings
    }

    fn render_settings_mut(&mut self) -> &mut RenderSettingsStore {
        &mut self.settings
    }

    fn render_setting_descriptors(&self) -> Vec<RenderSettingDescriptor> {
        Self::descriptors()
    }

    fn render_stats(&self) -> RenderStats {
        let mut stats = lock(&self.stats).clone();
        set_stat(&mut stats, SCENE_RESETS, stat_count(self.registry.scene_resets()));
        stats
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
