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

//! Renderer plugin discovery and lifetime.
//!
//! Backends describe themselves with a [`RendererPluginDesc`] and register
//! it at link time with [`renderer_plugin!`](crate::renderer_plugin). The
//! [`RendererPluginRegistry`] instantiates plugins on demand and counts the
//! handles pinning each one; a plugin whose count drops to zero is unloaded.
//!
//! ```text
//! Registered -> (is_supported) -> Instantiated (pinned) -> Released (count 0)
//! ```

mod handle;
mod registry;

pub use handle::{PluginRenderDelegateUniqueHandle, RendererPluginHandle};
pub use registry::RendererPluginRegistry;

use crate::render_delegate::{RenderDelegate, RenderSettingsMap};
use std::fmt;

/// A renderer backend factory.
///
/// A plugin only has to implement the settings-less factory; the
/// settings-aware one forwards to it unless overridden.
pub trait RendererPlugin: Send + Sync + fmt::Debug {
    /// Returns `true` if the backend can run in this process, e.g. its native
    /// library is installed.
    fn is_supported(&self) -> bool;

    /// Creates a delegate with default settings.
    fn create_render_delegate(&self) -> Option<Box<dyn RenderDelegate>>;

    /// Creates a delegate seeded with `settings`.
    fn create_render_delegate_with_settings(
        &self,
        _settings: &RenderSettingsMap,
    ) -> Option<Box<dyn RenderDelegate>> {
        self.create_render_delegate()
    }

    /// Destroys a delegate this plugin created.
    fn delete_render_delegate(&self, delegate: Box<dyn RenderDelegate>) {
        drop(delegate);
    }
}

/// Builds a plugin instance.
pub type RendererPluginFactory = fn() -> Box<dyn RendererPlugin>;

/// Static description of a renderer plugin.
#[derive(Clone, Copy)]
pub struct RendererPluginDesc {
    /// The plugin id, e.g. `"CovahEmbreeRendererPlugin"`.
    pub id: &'static str,
    /// A human-readable name.
    pub display_name: &'static str,
    /// Higher priorities are preferred as the default plugin.
    pub priority: i32,
    /// Builds the plugin on first use.
    pub factory: RendererPluginFactory,
}

impl fmt::Debug for RendererPluginDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RendererPluginDesc")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Wrapper for `inventory::collect!`.
pub struct RendererPluginReg(pub &'static RendererPluginDesc);
inventory::collect!(RendererPluginReg);

/// Registers a renderer plugin with the process-wide registry.
///
/// ```ignore
/// covah_hydra::renderer_plugin!(EMBREE_PLUGIN, {
///     id: "CovahEmbreeRendererPlugin",
///     display_name: "Embree",
///     priority: 10,
/// }, factory: || Box::new(EmbreeRendererPlugin));
/// ```
#[macro_export]
macro_rules! renderer_plugin {
    ($name:ident, {
        id: $id:expr,
        display_name: $display_name:expr,
        priority: $priority:expr
        $(,)?
    }, factory: $factory:expr) => {
        /// Registration of this crate's renderer plugin.
        pub static $name: $crate::plugin::RendererPluginDesc = $crate::plugin::RendererPluginDesc {
            id: $id,
            display_name: $display_name,
            priority: $priority,
            factory: $factory,
        };

        $crate::inventory::submit! { $crate::plugin::RendererPluginReg(&$name) }
    };
}

#[cfg(test)]
mod tests;
