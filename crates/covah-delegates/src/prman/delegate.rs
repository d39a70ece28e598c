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

use super::registry::PrmanResourceRegistry;
use super::{PrmanRenderPass, INTEGRATOR, RELOAD_TEXTURE, TEXTURE};
use crate::common::{lock, settings_store, SharedStats};
use covah_core::{PrimPath, Token};
use covah_hydra::mesh::BufferedMesh;
use covah_hydra::render_delegate::{
    RenderDelegate, RenderSettingDescriptor, RenderSettingsMap, RenderSettingsStore, RenderStats,
};
use covah_hydra::render_pass::RenderPass;
use covah_hydra::resource_registry::ResourceRegistry;
use covah_hydra::rprim::Rprim;
use covah_hydra::tokens;
use std::any::Any;
use std::sync::Arc;

/// The RenderMan render delegate.
#[derive(Debug)]
pub struct PrmanRenderDelegate {
    registry: Arc<PrmanResourceRegistry>,
    settings: RenderSettingsStore,
    stats: SharedStats,
}

impl PrmanRenderDelegate {
    /// Creates a delegate seeded with `settings`.
    pub fn new(settings: &RenderSettingsMap) -> Self {
        Self {
            registry: Arc::new(PrmanResourceRegistry::default()),
            settings: settings_store(settings, &Self::descriptors()),
            stats: SharedStats::default(),
        }
    }

    fn descriptors() -> Vec<RenderSettingDescriptor> {
        vec![
            RenderSettingDescriptor::new("Max Samples", tokens::CONVERGED_SAMPLES_PER_PIXEL, 64),
            RenderSettingDescriptor::new("Integrator", INTEGRATOR, "PxrPathTracer"),
            RenderSettingDescriptor::new("Interactive", tokens::ENABLE_INTERACTIVE, true),
        ]
    }

    /// The typed resource registry.
    pub fn prman_registry(&self) -> &Arc<PrmanResourceRegistry> {
        &self.registry
    }
}

impl RenderDelegate for PrmanRenderDelegate {
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
        Some(Box::new(BufferedMesh::new(id.clone(), self.registry.buffers().clone())))
    }

    fn create_render_pass(&self) -> Box<dyn RenderPass> {
        Box::new(PrmanRenderPass::new(self.stats.clone()))
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
        lock(&self.stats).clone()
    }

    fn invoke_command(&mut self, command: &Token, args: &RenderSettingsMap) -> bool {
        if command != RELOAD_TEXTURE {
            log::warn!("RenderMan does not support command '{}'", command);
            return false;
        }
        let Some(path) = args.get(&Token::new("path")).and_then(|v| v.as_str()) else {
            log::warn!("Command '{}' needs a 'path' argument", command);
            return false;
        };
        self.registry.reload_resource(&Token::new(TEXTURE), path);
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
