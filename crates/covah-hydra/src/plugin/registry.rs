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

use super::handle::{PluginRenderDelegateUniqueHandle, RendererPluginHandle};
use super::{RendererPlugin, RendererPluginDesc, RendererPluginReg};
use crate::render_delegate::RenderSettingsMap;
use covah_core::Token;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct PluginEntry {
    instance: Option<Arc<dyn RendererPlugin>>,
    ref_count: usize,
}

/// The shared state behind a registry and every handle it gave out.
#[derive(Debug)]
pub(super) struct RegistryInner {
    descs: Vec<RendererPluginDesc>,
    entries: Mutex<HashMap<Token, PluginEntry>>,
}

impl RegistryInner {
    fn entries(&self) -> MutexGuard<'_, HashMap<Token, PluginEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn desc(&self, id: &Token) -> Option<&RendererPluginDesc> {
        self.descs.iter().find(|desc| *id == desc.id)
    }

    /// Pins plugin `id`, instantiating it if nothing held it.
    fn acquire(&self, id: &Token) -> Option<Arc<dyn RendererPlugin>> {
        let desc = self.desc(id)?;
        let mut entries = self.entries();
        let entry = entries.entry(id.clone()).or_default();
        let instance = match &entry.instance {
            Some(instance) => instance.clone(),
            None => {
                log::info!("Loading renderer plugin '{}' ({})", desc.id, desc.display_name);
                let instance: Arc<dyn RendererPlugin> = Arc::from((desc.factory)());
                entry.instance = Some(instance.clone());
                instance
            }
        };
        entry.ref_count += 1;
        Some(instance)
    }

    /// Adds a pin to an already loaded plugin.
    pub(super) fn add_reference(&self, id: &Token) {
        match self.entries().get_mut(id) {
            Some(entry) if entry.instance.is_some() => entry.ref_count += 1,
            _ => covah_core::coding_error!("renderer plugin '{}' referenced while unloaded", id),
        }
    }

    /// Drops a pin, unloading the plugin with the last one.
    pub(super) fn release(&self, id: &Token) {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(id) else {
            covah_core::coding_error!("release of unknown renderer plugin '{}'", id);
            return;
        };
        if entry.ref_count == 0 {
            covah_core::coding_error!("renderer plugin '{}' released more often than acquired", id);
            return;
        }
        entry.ref_count -= 1;
        if entry.ref_count == 0 {
            entry.instance = None;
            log::info!("Unloaded renderer plugin '{}'", id);
        }
    }

    fn ref_count(&self, id: &Token) -> usize {
        self.entries().get(id).map_or(0, |entry| entry.ref_count)
    }

    fn is_loaded(&self, id: &Token) -> bool {
        self.entries()
            .get(id)
            .is_some_and(|entry| entry.instance.is_some())
    }
}

static GLOBAL_REGISTRY: LazyLock<RendererPluginRegistry> = LazyLock::new(|| {
    RendererPluginRegistry::from_descs(inventory::iter::<RendererPluginReg>().map(|reg| *reg.0))
});

/// Maps plugin ids to plugin factories and reference-counts loaded plugins.
///
/// The process-wide instance, [`global`](Self::global), is filled from the
/// plugins linked into the binary. Tests and embedders can build their own
/// with [`from_descs`](Self::from_descs).
#[derive(Clone)]
pub struct RendererPluginRegistry {
    inner: Arc<RegistryInner>,
}

impl RendererPluginRegistry {
    /// The registry of every plugin registered with
    /// [`renderer_plugin!`](crate::renderer_plugin).
    pub fn global() -> &'static RendererPluginRegistry {
        &GLOBAL_REGISTRY
    }

    /// Creates a registry over `descs`. Later duplicates of an id are
    /// ignored.
    pub fn from_descs(descs: impl IntoIterator<Item = RendererPluginDesc>) -> Self {
        let mut unique: Vec<RendererPluginDesc> = Vec::new();
        for desc in descs {
            if unique.iter().any(|known| known.id == desc.id) {
                log::warn!("Renderer plugin '{}' registered twice, keeping the first", desc.id);
                continue;
            }
            unique.push(desc);
        }
        unique.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(b.id)));

        Self {
            inner: Arc::new(RegistryInner {
                descs: unique,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Every registered plugin, highest priority first.
    pub fn plugin_descs(&self) -> &[RendererPluginDesc] {
        &self.inner.descs
    }

    /// The description of plugin `id`.
    pub fn plugin_desc(&self, id: &Token) -> Option<&RendererPluginDesc> {
        self.inner.desc(id)
    }

    /// The highest-priority plugin that is supported in this process.
    pub fn default_plugin_id(&self) -> Option<Token> {
        self.inner.descs.iter().find_map(|desc| {
            let id = Token::new(desc.id);
            let handle = self.get_or_create_renderer_plugin(&id)?;
            handle.is_supported().then_some(id)
        })
    }

    /// Returns a handle pinning plugin `id`, loading it if needed. `None` if
    /// no such plugin is registered.
    pub fn get_or_create_renderer_plugin(&self, id: &Token) -> Option<RendererPluginHandle> {
        let plugin = self.inner.acquire(id)?;
        Some(RendererPluginHandle::new(self.inner.clone(), id.clone(), plugin))
    }

    /// Creates a delegate from plugin `id`. Returns a null handle if the
    /// plugin is unknown or unsupported.
    pub fn create_render_delegate(
        &self,
        id: &Token,
        settings: &RenderSettingsMap,
    ) -> PluginRenderDelegateUniqueHandle {
        match self.get_or_create_renderer_plugin(id) {
            Some(plugin) => plugin.create_delegate(settings),
            None => {
                log::warn!("No renderer plugin named '{}'", id);
                PluginRenderDelegateUniqueHandle::null()
            }
        }
    }

    /// The number of live handles pinning plugin `id`.
    pub fn plugin_ref_count(&self, id: &Token) -> usize {
        self.inner.ref_count(id)
    }

    /// Returns `true` while plugin `id` is instantiated.
    pub fn is_plugin_loaded(&self, id: &Token) -> bool {
        self.inner.is_loaded(id)
    }
}

impl fmt::Debug for RendererPluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RendererPluginRegistry")
            .field("plugins", &self.inner.descs)
            .finish_non_exhaustive()
    }
}
