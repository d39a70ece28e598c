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

//! The Radeon ProRender backend.
//!
//! Meshes keep their data in aggregated host buffers, as with Embree. The
//! backend renders in the background, so the delegate supports pausing,
//! stopping, and restarting its render thread.

mod delegate;
mod render_pass;

pub use delegate::{RprRenderControl, RprRenderDelegate};
pub use render_pass::{RprRenderPass, ELEMENT_COUNT, PRIM_COUNT, SAMPLES};

use covah_hydra::plugin::RendererPlugin;
use covah_hydra::render_delegate::{RenderDelegate, RenderSettingsMap};

/// Plugin id of the RPR backend.
pub const RPR_PLUGIN_ID: &str = "CovahRprRendererPlugin";

/// Render setting: the render quality preset.
pub const RENDER_QUALITY: &str = "renderQuality";
/// Render setting: the device the backend renders on.
pub const RENDER_DEVICE: &str = "renderDevice";

/// Creates [`RprRenderDelegate`]s.
#[derive(Debug, Default)]
pub struct RprRendererPlugin;

impl RendererPlugin for RprRendererPlugin {
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
        Some(Box::new(RprRenderDelegate::new(settings)))
    }

    fn delete_render_delegate(&self, delegate: Box<dyn RenderDelegate>) {
        if let Some(rpr) = delegate.as_any().downcast_ref::<RprRenderDelegate>() {
            rpr.control().stop();
        }
        drop(delegate);
    }
}

covah_hydra::renderer_plugin!(RPR_PLUGIN, {
    id: RPR_PLUGIN_ID,
    display_name: "Radeon ProRender",
    priority: 15,
}, factory: || Box::new(RprRendererPlugin));
