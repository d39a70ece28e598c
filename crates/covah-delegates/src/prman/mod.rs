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

//! The RenderMan backend.
//!
//! Supported only when `RMANTREE` points at a RenderMan installation.

mod delegate;
mod registry;
mod render_pass;

pub use delegate::PrmanRenderDelegate;
pub use registry::{PrmanResourceRegistry, ResourceReload};
pub use render_pass::{PrmanRenderPass, PRIM_COUNT, SAMPLES};

use covah_hydra::plugin::RendererPlugin;
use covah_hydra::render_delegate::{RenderDelegate, RenderSettingsMap};
use std::ffi::OsString;
use std::path::Path;

/// Plugin id of the RenderMan backend.
pub const PRMAN_PLUGIN_ID: &str = "CovahPrmanRendererPlugin";

/// Environment variable naming the RenderMan installation.
pub const RMANTREE: &str = "RMANTREE";

/// Render setting: the integrator.
pub const INTEGRATOR: &str = "integrator";

/// Command: reload the texture at argument `path`.
pub const RELOAD_TEXTURE: &str = "reloadTexture";

/// Resource type of texture reloads.
pub const TEXTURE: &str = "texture";

/// Returns `true` if `rmantree` names an existing directory.
pub fn is_installation(rmantree: Option<OsString>) -> bool {
    rmantree.is_some_and(|root| Path::new(&root).is_dir())
}

/// Creates [`PrmanRenderDelegate`]s.
#[derive(Debug, Default)]
pub struct PrmanRendererPlugin;

impl RendererPlugin for PrmanRendererPlugin {
    fn is_supported(&self) -> bool {
        let supported = is_installation(std::env::var_os(RMANTREE));
        if !supported {
            log::debug!("RenderMan unavailable: {} does not name an installation", RMANTREE);
        }
        supported
    }

    fn create_render_delegate(&self) -> Option<Box<dyn RenderDelegate>> {
        self.create_render_delegate_with_settings(&RenderSettingsMap::new())
    }

    fn create_render_delegate_with_settings(
        &self,
        settings: &RenderSettingsMap,
    ) -> Option<Box<dyn RenderDelegate>> {
        Some(Box::new(PrmanRenderDelegate::new(settings)))
    }
}

covah_hydra::renderer_plugin!(PRMAN_PLUGIN, {
    id: PRMAN_PLUGIN_ID,
    display_name: "RenderMan",
    priority: 30,
}, factory: || Box::new(PrmanRendererPlugin));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_installation_requires_existing_directory() {
        let root = tempfile::tempdir().unwrap();

        assert!(is_installation(Some(root.path().as_os_str().to_owned())));
        assert!(!is_installation(Some(root.path().join("missing").into_os_string())));
        assert!(!is_installation(None));
    }
}
