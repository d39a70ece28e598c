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

//! A production path-tracing backend.
//!
//! Cycles owns its scene, so rprims do not allocate aggregated buffers.
//! Each mesh binds one [`CyclesObjectSource`] from the
//! [`CyclesResourceRegistry`] and queues its topology and primvars on it.
//! Commit resolves the queued sources of all objects in parallel and resets
//! the render session when anything changed.

mod delegate;
mod mesh;
mod object_source;
mod registry;
mod render_pass;

pub use delegate::CyclesRenderDelegate;
pub use mesh::CyclesMesh;
pub use object_source::{CyclesGeometry, CyclesObjectSource};
pub use registry::CyclesResourceRegistry;
pub use render_pass::{CyclesRenderPass, OBJECT_COUNT, RESOLUTION, SAMPLES, TRIANGLE_COUNT, VERTEX_COUNT};

use covah_hydra::plugin::RendererPlugin;
use covah_hydra::render_delegate::{RenderDelegate, RenderSettingsMap};

/// Plugin id of the Cycles backend.
pub const CYCLES_PLUGIN_ID: &str = "CovahCyclesRendererPlugin";

/// Render setting: the device the session renders on.
pub const DEVICE: &str = "device";

/// Stat: commits that changed the scene and reset the session.
pub const SCENE_RESETS: &str = "sceneResets";

/// Creates [`CyclesRenderDelegate`]s.
#[derive(Debug, Default)]
pub struct CyclesRendererPlugin;

impl RendererPlugin for CyclesRendererPlugin {
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
        Some(Box::new(CyclesRenderDelegate::new(settings)))
    }
}

covah_hydra::renderer_plugin!(CYCLES_PLUGIN, {
    id: CYCLES_PLUGIN_ID,
    display_name: "Cycles",
    priority: 20,
}, factory: || Box::new(CyclesRendererPlugin));
