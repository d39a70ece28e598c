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

use covah_core::telemetry::perf::PerfLog;
use covah_core::Token;
use covah_hydra::resource_registry::{BufferResourceRegistry, RegistryBase, ResourceRegistry};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::common::lock;

/// A resource reload requested by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceReload {
    /// The kind of resource, e.g. `texture`.
    pub resource_type: Token,
    /// The file that changed.
    pub path: String,
}

/// The RenderMan resource registry.
///
/// RenderMan manages its own resources. Geometry still goes through host
/// buffers, and the registry answers reload requests for textures and
/// shaders.
#[derive(Debug)]
pub struct PrmanResourceRegistry {
    base: RegistryBase,
    buffers: Arc<BufferResourceRegistry>,
    reloads: Mutex<Vec<ResourceReload>>,
    shader_invalidations: AtomicU64,
}

impl PrmanResourceRegistry {
    /// Creates an empty registry.
    pub fn new(perf: PerfLog) -> Self {
        Self {
            base: RegistryBase::new(perf),
            buffers: Arc::new(BufferResourceRegistry::default()),
            reloads: Mutex::new(Vec::new()),
            shader_invalidations: AtomicU64::new(0),
        }
    }

    /// The registry meshes allocate from.
    pub fn buffers(&self) -> &Arc<BufferResourceRegistry> {
        &self.buffers
    }

    /// Every reload requested so far, oldest first.
    pub fn reloads(&self) -> Vec<ResourceReload> {
        lock(&self.reloads).clone()
    }

    /// Number of shader registry invalidations.
    pub fn shader_invalidations(&self) -> u64 {
        self.shader_invalidations.load(Ordering::Relaxed)
    }
}

impl Default for PrmanResourceRegistry {
    fn default() -> Self {
        Self::new(PerfLog::global())
    }
}

impl ResourceRegistry for PrmanResourceRegistry {
    fn base(&self) -> &RegistryBase {
        &self.base
    }

    fn on_commit(&self) {
        self.buffers.on_commit();
    }

    fn on_garbage_collect(&self) {
        self.buffers.on_garbage_collect();
    }

    fn invalidate_shader_registry(&self) {
        self.shader_invalidations.fetch_add(1, Ordering::Relaxed);
        log::debug!("RenderMan shader registry invalidated");
    }

    fn reload_resource(&self, resource_type: &Token, path: &str) {
        log::info!("Reloading RenderMan {} '{}'", resource_type, path);
        lock(&self.reloads).push(ResourceReload {
            resource_type: resource_type.clone(),
            path: path.to_owned(),
        });
    }

    fn resource_allocation(&self) -> BTreeMap<Token, usize> {
        self.buffers.resource_allocation()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reloads_are_recorded_in_order() {
        let registry = PrmanResourceRegistry::new(PerfLog::null());

        registry.reload_resource(&Token::new("texture"), "/tex/a.tex");
        registry.reload_resource(&Token::new("texture"), "/tex/b.tex");

        let paths: Vec<String> = registry.reloads().into_iter().map(|r| r.path).collect();
        assert_eq!(paths, ["/tex/a.tex", "/tex/b.tex"]);
    }

    #[test]
    fn test_shader_invalidations_count() {
        let registry = PrmanResourceRegistry::new(PerfLog::null());
        registry.invalidate_shader_registry();
        registry.invalidate_shader_registry();
        assert_eq!(registry.shader_invalidations(), 2);
    }
}
