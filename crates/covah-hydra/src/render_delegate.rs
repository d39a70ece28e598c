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

//! The backend contract: what a renderer supplies to the render index.

use crate::change_tracker::ChangeTracker;
use crate::render_pass::RenderPass;
use crate::resource_registry::ResourceRegistry;
use crate::rprim::Rprim;
use covah_core::{PrimPath, Token, Value};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Opaque renderer settings, passed from the caller to a render delegate
/// factory.
pub type RenderSettingsMap = BTreeMap<Token, Value>;

/// Named statistics a delegate reports about its last frame.
pub type RenderStats = BTreeMap<Token, Value>;

/// Declares one setting a delegate understands and its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettingDescriptor {
    /// A display name.
    pub name: String,
    /// The settings-map key.
    pub key: Token,
    /// The value used when the caller supplies none.
    pub default_value: Value,
}

impl RenderSettingDescriptor {
    /// Creates a descriptor.
    pub fn new(name: impl Into<String>, key: impl Into<Token>, default_value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            default_value: default_value.into(),
        }
    }
}

/// The settings of one delegate, versioned so render passes can notice
/// changes.
#[derive(Debug, Clone, Default)]
pub struct RenderSettingsStore {
    settings: RenderSettingsMap,
    version: u64,
}

impl RenderSettingsStore {
    /// Creates a store seeded with `settings`.
    pub fn new(settings: RenderSettingsMap) -> Self {
        Self {
            settings,
            version: 1,
        }
    }

    /// Fills in the default of every descriptor whose key is unset.
    pub fn populate_defaults(&mut self, descriptors: &[RenderSettingDescriptor]) {
        for descriptor in descriptors {
            self.settings
                .entry(descriptor.key.clone())
                .or_insert_with(|| descriptor.default_value.clone());
        }
    }

    /// The value of `key`.
    pub fn get(&self, key: &Token) -> Option<&Value> {
        self.settings.get(key)
    }

    /// Sets `key`. The version only moves when the value actually changes.
    /// Returns `true` if it did.
    pub fn set(&mut self, key: Token, value: Value) -> bool {
        if self.settings.get(&key) == Some(&value) {
            return false;
        }
        log::debug!("Render setting '{}' = {}", key, value);
        self.settings.insert(key, value);
        self.version += 1;
        true
    }

    /// Bumped on every effective change.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Every setting.
    pub fn settings(&self) -> &RenderSettingsMap {
        &self.settings
    }
}

/// A renderer backend.
///
/// The render index asks the delegate for prims and passes; the delegate owns
/// the resource registry those prims schedule their buffers on. Backends
/// that support interactive control override the pause and stop family,
/// which otherwise report the operation as unsupported.
pub trait RenderDelegate: Send + Sync + fmt::Debug {
    /// The registry committed once per frame.
    fn resource_registry(&self) -> Arc<dyn ResourceRegistry>;

    /// The rprim types [`create_rprim`](Self::create_rprim) accepts.
    fn supported_rprim_types(&self) -> Vec<Token>;

    /// Creates an rprim, or `None` for an unsupported type.
    fn create_rprim(&self, type_id: &Token, id: &PrimPath) -> Option<Box<dyn Rprim>>;

    /// Creates a render pass drawing this delegate's prims.
    fn create_render_pass(&self) -> Box<dyn RenderPass>;

    /// The settings store.
    fn render_settings(&self) -> &RenderSettingsStore;

    /// The settings store, for writing.
    fn render_settings_mut(&mut self) -> &mut RenderSettingsStore;

    /// The settings this delegate understands.
    fn render_setting_descriptors(&self) -> Vec<RenderSettingDescriptor> {
        Vec::new()
    }

    /// Reads a setting.
    fn get_render_setting(&self, key: &Token) -> Option<Value> {
        self.render_settings().get(key).cloned()
    }

    /// Writes a setting.
    fn set_render_setting(&mut self, key: Token, value: Value) {
        self.render_settings_mut().set(key, value);
    }

    /// See [`RenderSettingsStore::version`].
    fn render_settings_version(&self) -> u64 {
        self.render_settings().version()
    }

    /// Statistics about the last frame.
    fn render_stats(&self) -> RenderStats {
        RenderStats::new()
    }

    /// Returns `true` if [`pause`](Self::pause) can succeed.
    fn is_pause_supported(&self) -> bool {
        false
    }

    /// Pauses background rendering.
    fn pause(&mut self) -> bool {
        false
    }

    /// Resumes background rendering.
    fn resume(&mut self) -> bool {
        false
    }

    /// Returns `true` if [`stop`](Self::stop) can succeed.
    fn is_stop_supported(&self) -> bool {
        false
    }

    /// Stops background rendering.
    fn stop(&mut self) -> bool {
        false
    }

    /// Restarts background rendering after a stop.
    fn restart(&mut self) -> bool {
        false
    }

    /// Runs a backend-specific command.
    fn invoke_command(&mut self, command: &Token, _args: &RenderSettingsMap) -> bool {
        log::warn!("{:?} does not support command '{}'", self, command);
        false
    }

    /// Commits the resources scheduled during sync.
    fn commit_resources(&mut self, _tracker: &ChangeTracker) {
        self.resource_registry().commit();
    }

    /// Downcasting support.
    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_moves_only_on_change() {
        // --- 1. ARRANGE ---
        let mut store = RenderSettingsStore::new(RenderSettingsMap::new());
        let key = Token::new("threadLimit");
        let start = store.version();

        // --- 2. ACT ---
        let first = store.set(key.clone(), Value::Int(4));
        let second = store.set(key.clone(), Value::Int(4));

        // --- 3. ASSERT ---
        assert!(first);
        assert!(!second);
        assert_eq!(store.version(), start + 1);
        assert_eq!(store.get(&key), Some(&Value::Int(4)));
    }

    #[test]
    fn test_defaults_do_not_override_caller_settings() {
        let key = Token::new("convergedSamplesPerPixel");
        let mut store =
            RenderSettingsStore::new(RenderSettingsMap::from([(key.clone(), Value::Int(64))]));

        store.populate_defaults(&[
            RenderSettingDescriptor::new("Samples", "convergedSamplesPerPixel", 16),
            RenderSettingDescriptor::new("Interactive", "enableInteractive", true),
        ]);

        assert_eq!(store.get(&key), Some(&Value::Int(64)));
        assert_eq!(store.get(&Token::new("enableInteractive")), Some(&Value::Bool(true)));
    }
}
