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

//! A CPU ray-tracing backend over aggregated host buffers.

mod delegate;
mod render_pass;

pub use delegate::EmbreeRenderDelegate;
pub use render_pass::{EmbreeRenderPass, POINT_COUNT, PRIM_COUNT, SAMPLES, WORLD_BOUNDS};

use covah_hydra::plugin::RendererPlugin;
use covah_hydra::render_delegate::{RenderDelegate, RenderSettingsMap};

/// Plugin id of the Embree backend.
pub const EMBREE_PLUGIN_ID: &str = "CovahEmbreeRendererPlugin";

/// Render setting: whether ambient occlusion is traced.
pub const ENABLE_AMBIENT_OCCLUSION: &str = "enableAmbientOcclusion";
/// Render setting: ambient occlusion rays per sample.
pub const AMBIENT_OCCLUSION_SAMPLES: &str = "ambientOcclusionSamples";
/// Render setting: whether display colors shade the geometry.
pub const ENABLE_SCENE_COLORS: &str = "enableSceneColors";

/// Creates [`EmbreeRenderDelegate`]s. Always supported: the backend needs
/// nothing outside the process.
#[derive(Debug, Default)]
pub struct EmbreeRendererPlugin;

impl RendererPlugin for EmbreeRendererPlugin {
    fn is_supported(&self) -> bool {
        true
    }

    fn create_render_delegate(&self) -> Option<Box<dyn RenderDelegate>> {
        self.create_render_delegate_with_settings(&RenderSettingsMap::new())
    }

    fn create_render_delegate_with_settings(
        &self,
        settings: &RenderSettingsMap,
    ) -> Option<Box<dyn RenderDelegate>> {
        Some(Box::new(EmbreeRenderDelegate::new(settings)))
    }
}

covah_hydra::renderer_plugin!(EMBREE_PLUGIN, {
    id: EMBREE_PLUGIN_ID,
    display_name: "Embree",
    priority: 10,
}, factory: || Box::new(EmbreeRendererPlugin));
