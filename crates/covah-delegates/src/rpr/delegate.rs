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

use super::{RprRenderPass, RENDER_DEVICE, RENDER_QUALITY};
use crate::common::{lock, settings_store, SharedStats};
use covah_core::{PrimPath, Token};
use covah_hydra::mesh::BufferedMesh;
use covah_hydra::render_delegate::{
    RenderDelegate, RenderSettingDescriptor, RenderSettingsMap, RenderSettingsStore, RenderStats,
};
use covah_hydra::render_pass::RenderPass;
use covah_hydra::resource_registry::{BufferResourceRegistry, ResourceRegistry};
use covah_hydra::rprim::Rprim;
use covah_hydra::tokens;
use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Run state of the background render, shared by the delegate and its
/// passes.
#[derive(Debug, Default)]
pub struct RprRenderControl {
    paused: AtomicBool,
    stopped: AtomicBool,
    restarts: AtomicU64,
}

impl RprRenderControl {
    /// Pauses accumulation. Returns `false` if already paused.
    pub fn pause(&self) -> bool {
        !self.paused.swap(true, Ordering::AcqRel)
    }

    /// Resumes accumulation. Returns `false` if not paused.
    pub fn resume(&self) -> bool {
        self.paused.swap(false, Ordering::AcqRel)
    }

    /// Stops rendering. Returns `false` if already stopped.
    pub fn stop(&self) -> bool {
        !self.stopped.swap(true, Ordering::AcqRel)
    }

    /// Restarts rendering from zero samples.
    pub fn restart(&self) -> bool {
        self.stopped.store(false, Ordering::Release);
        self.paused.store(false, Ordering::Release);
        self.restarts.fetch_add(1, Ordering::AcqRel);
        true
    }

    /// Returns `true` while paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Returns `true` while stopped.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Number of restarts so far.
    pub fn restarts(&self) -> u64 {
        self.restarts.load(Ordering::Acquire)
    }
}

/// The RPR render delegate.
#[derive(Debug)]
pub struct RprRenderDelegate {
    registry: Arc<BufferResourceRegistry>,
    settings: RenderSettingsStore,
    stats: SharedStats,
    control: Arc<RprRenderControl>,
}

impl RprRenderDelegate {
    /// Creates a delegate seeded with `settings`.
    pub fn new(settings: &RenderSettingsMap) -> Self {
        Self {
            registry: Arc::new(BufferResourceRegistry::default()),
            settings: settings_store(settings, &Self::descriptors()),
            stats: SharedStats::default(),
            control: Arc::default(),
        }
    }

    fn descriptors() -> Vec<RenderSettingDescriptor> {
        vec![
            RenderSettingDescriptor::new("Max Samples", tokens::CONVERGED_SAMPLES_PER_PIXEL, 256),
            RenderSettingDescriptor::new("Render Quality", RENDER_QUALITY, "Full"),
            RenderSettingDescriptor::new("Render Device", RENDER_DEVICE, "CPU"),
        ]
    }

    /// The run state of the background render.
    pub fn control(&self) -> &Arc<RprRenderControl> {
        &self.control
    }
}

impl RenderDelegate for RprRenderDelegate {
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
        Some(Box::new(BufferedMesh::new(id.clone(), self.registry.clone())))
    }

    fn create_render_pass(&self) -> Box<dyn RenderPass> {
        Box::new(RprRenderPass::new(self.stats.clone(), self.control.clone()))
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

    fn is_pause_supported(&self) -> bool {
        true
    }

    fn pause(&mut self) -> bool {
        self.control.pause()
    }

    fn resume(&mut self) -> bool {
        self.control.resume()
    }

    fn is_stop_supported(&self) -> bool {
        true
    }

    fn stop(&mut self) -> bool {
        self.control.stop()
    }

    fn restart(&mut self) -> bool {
        log::info!("Restarting RPR render");
        self.control.restart()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_and_resume_toggle_once() {
        let control = RprRenderControl::default();

        assert!(control.pause());
        assert!(!control.pause());
        assert!(control.is_paused());
        assert!(control.resume());
        assert!(!control.resume());
    }

    #[test]
    fn test_restart_clears_stop() {
        // --- 1. ARRANGE ---
        let mut delegate = RprRenderDelegate::new(&RenderSettingsMap::new());
        assert!(delegate.stop());

        // --- 2. ACT ---
        let restarted = delegate.restart();

        // --- 3. ASSERT ---
        assert!(restarted);
        assert!(!delegate.control().is_stopped());
        assert_eq!(delegate.control().restarts(), 1);
    }

    #[test]
    fn test_defaults_fill_missing_settings() {
        let mut settings = RenderSettingsMap::new();
        settings.insert(Token::new(RENDER_QUALITY), "Low".into());

        let delegate = RprRenderDelegate::new(&settings);

        assert_eq!(
            delegate.get_render_setting(&Token::new(RENDER_QUALITY)).and_then(|v| v.as_str().map(str::to_owned)),
            Some("Low".to_owned())
        );
        assert_eq!(
            delegate
                .get_render_setting(&Token::new(tokens::CONVERGED_SAMPLES_PER_PIXEL))
                .and_then(|v| v.as_int()),
            Some(256)
        );
    }
}
