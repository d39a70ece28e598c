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

use super::registry::RegistryInner;
use super::RendererPlugin;
use crate::render_delegate::{RenderDelegate, RenderSettingsMap};
use covah_core::Token;
use std::fmt;
use std::sync::Arc;

/// A pin on a loaded renderer plugin. Cloning adds a pin and dropping
/// removes one.
pub struct RendererPluginHandle {
    registry: Arc<RegistryInner>,
    id: Token,
    plugin: Arc<dyn RendererPlugin>,
}

impl RendererPluginHandle {
    pub(super) fn new(registry: Arc<RegistryInner>, id: Token, plugin: Arc<dyn RendererPlugin>) -> Self {
        Self { registry, id, plugin }
    }

    /// The plugin id.
    pub fn id(&self) -> &Token {
        &self.id
    }

    /// The plugin.
    pub fn plugin(&self) -> &dyn RendererPlugin {
        self.plugin.as_ref()
    }

    /// See [`RendererPlugin::is_supported`].
    pub fn is_supported(&self) -> bool {
        self.plugin.is_supported()
    }

    /// Creates a delegate whose handle keeps this plugin pinned.
    ///
    /// An unsupported plugin yields a null handle and no pin.
    pub fn create_delegate(&self, settings: &RenderSettingsMap) -> PluginRenderDelegateUniqueHandle {
        if !self.is_supported() {
            log::warn!("Renderer plugin '{}' is not supported here", self.id);
            return PluginRenderDelegateUniqueHandle::null();
        }
        let pin = self.clone();
        match self.plugin.create_render_delegate_with_settings(settings) {
            Some(delegate) => {
                log::info!("Created render delegate from '{}'", self.id);
                PluginRenderDelegateUniqueHandle {
                    plugin: Some(pin),
                    delegate: Some(delegate),
                }
            }
            None => {
                log::warn!("Renderer plugin '{}' failed to create a delegate", self.id);
                PluginRenderDelegateUniqueHandle::null()
            }
        }
    }
}

impl Clone for RendererPluginHandle {
    fn clone(&self) -> Self {
        self.registry.add_reference(&self.id);
        Self {
            registry: self.registry.clone(),
            id: self.id.clone(),
            plugin: self.plugin.clone(),
        }
    }
}

impl Drop for RendererPluginHandle {
    fn drop(&mut self) {
        self.registry.release(&self.id);
    }
}

impl fmt::Debug for RendererPluginHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RendererPluginHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Owns a render delegate together with a pin on the plugin that made it.
///
/// Dropping the handle hands the delegate back to its plugin for deletion
/// and then releases the pin, so a plugin never unloads under a live
/// delegate.
#[derive(Default)]
pub struct PluginRenderDelegateUniqueHandle {
    plugin: Option<RendererPluginHandle>,
    delegate: Option<Box<dyn RenderDelegate>>,
}

impl PluginRenderDelegateUniqueHandle {
    /// A handle holding nothing.
    pub fn null() -> Self {
        Self::default()
    }

    /// Wraps a delegate created outside the plugin system. Nothing is pinned.
    pub fn from_delegate(delegate: Box<dyn RenderDelegate>) -> Self {
        Self {
            plugin: None,
            delegate: Some(delegate),
        }
    }

    /// Returns `true` if no delegate is held.
    pub fn is_null(&self) -> bool {
        self.delegate.is_none()
    }

    /// The delegate.
    pub fn get(&self) -> Option<&dyn RenderDelegate> {
        self.delegate.as_deref()
    }

    /// The delegate, for writing.
    pub fn get_mut(&mut self) -> Option<&mut (dyn RenderDelegate + 'static)> {
        self.delegate.as_deref_mut()
    }

    /// The id of the plugin that created the delegate.
    pub fn plugin_id(&self) -> Option<&Token> {
        self.plugin.as_ref().map(RendererPluginHandle::id)
    }
}

impl Drop for PluginRenderDelegateUniqueHandle {
    fn drop(&mut self) {
        let Some(delegate) = self.delegate.take() else {
            return;
        };
        match &self.plugin {
            Some(plugin) => plugin.plugin().delete_render_delegate(delegate),
            None => drop(delegate),
        }
        // The pin is released when `plugin` drops, after the delegate is gone.
    }
}

impl fmt::Debug for PluginRenderDelegateUniqueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRenderDelegateUniqueHandle")
            .field("plugin", &self.plugin_id())
            .field("delegate", &self.delegate)
            .finish()
    }
}
