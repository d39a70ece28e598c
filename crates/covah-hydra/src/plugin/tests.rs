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

use super::*;
use crate::change_tracker::ChangeTracker;
use crate::render_delegate::RenderSettingsStore;
use crate::render_pass::{RenderPass, RenderPassState};
use crate::render_index::RenderIndex;
use crate::resource_registry::{BufferResourceRegistry, ResourceRegistry};
use crate::rprim::Rprim;
use covah_core::{PrimPath, Token, Value};
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static DELETED: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug)]
struct NullPass;

impl RenderPass for NullPass {
    fn execute(&mut self, _index: &RenderIndex, _state: &RenderPassState, _render_tags: &[Token]) {}
}

#[derive(Debug)]
struct StubDelegate {
    registry: Arc<BufferResourceRegistry>,
    settings: RenderSettingsStore,
}

impl RenderDelegate for StubDelegate {
    fn resource_registry(&self) -> Arc<dyn ResourceRegistry> {
        self.registry.clone()
    }

    fn supported_rprim_types(&self) -> Vec<Token> {
        Vec::new()
    }

    fn create_rprim(&self, _type_id: &Token, _id: &PrimPath) -> Option<Box<dyn Rprim>> {
        None
    }

    fn create_render_pass(&self) -> Box<dyn RenderPass> {
        Box::new(NullPass)
    }

    fn render_settings(&self) -> &RenderSettingsStore {
        &self.settings
    }

    fn render_settings_mut(&mut self) -> &mut RenderSettingsStore {
        &mut self.settings
    }

    fn commit_resources(&mut self, _tracker: &ChangeTracker) {
        self.registry.commit();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
struct StubPlugin {
    supported: bool,
}

impl RendererPlugin for StubPlugin {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn create_render_delegate(&self) -> Option<Box<dyn RenderDelegate>> {
        Some(Box::new(StubDelegate {
            registry: Arc::new(BufferResourceRegistry::default()),
            settings: RenderSettingsStore::default(),
        }))
    }

    fn delete_render_delegate(&self, delegate: Box<dyn RenderDelegate>) {
        DELETED.fetch_add(1, Ordering::SeqCst);
        drop(delegate);
    }
}

fn supported() -> Box<dyn RendererPlugin> {
    Box::new(StubPlugin { supported: true })
}

fn unsupported() -> Box<dyn RendererPlugin> {
    Box::new(StubPlugin { supported: false })
}

fn desc(id: &'static str, priority: i32, factory: RendererPluginFactory) -> RendererPluginDesc {
    RendererPluginDesc {
        id,
        display_name: id,
        priority,
        factory,
    }
}

fn registry() -> RendererPluginRegistry {
    RendererPluginRegistry::from_descs([
        desc("Low", 1, supported),
        desc("High", 10, supported),
        desc("Missing", 20, unsupported),
    ])
}

#[test]
fn test_descs_sorted_by_priority() {
    let registry = registry();

    let ids: Vec<_> = registry.plugin_descs().iter().map(|d| d.id).collect();

    assert_eq!(ids, vec!["Missing", "High", "Low"]);
}

#[test]
fn test_default_plugin_skips_unsupported() {
    // --- 1. ARRANGE ---
    let registry = registry();

    // --- 2. ACT ---
    let id = registry.default_plugin_id();

    // --- 3. ASSERT ---
    assert_eq!(id, Some(Token::new("High")));
    assert_eq!(registry.plugin_ref_count(&Token::new("Missing")), 0);
    assert!(!registry.is_plugin_loaded(&Token::new("Missing")));
}

#[test]
fn test_unsupported_plugin_yields_null_handle_without_pin() {
    // --- 1. ARRANGE ---
    let registry = registry();
    let id = Token::new("Missing");
    let plugin = registry.get_or_create_renderer_plugin(&id).unwrap();
    let before = registry.plugin_ref_count(&id);

    // --- 2. ACT ---
    let delegate = plugin.create_delegate(&RenderSettingsMap::new());

    // --- 3. ASSERT ---
    assert!(delegate.is_null());
    assert_eq!(registry.plugin_ref_count(&id), before);
}

#[test]
fn test_delegate_handle_pins_until_dropped() {
    // --- 1. ARRANGE ---
    let registry = registry();
    let id = Token::new("High");
    let plugin = registry.get_or_create_renderer_plugin(&id).unwrap();
    let before = registry.plugin_ref_count(&id);
    let deleted = DELETED.load(Ordering::SeqCst);

    // --- 2. ACT ---
    let delegate = plugin.create_delegate(&RenderSettingsMap::new());
    let pinned = registry.plugin_ref_count(&id);
    drop(delegate);

    // --- 3. ASSERT ---
    assert_eq!(pinned, before + 1);
    assert_eq!(registry.plugin_ref_count(&id), before);
    assert!(DELETED.load(Ordering::SeqCst) > deleted);
}

#[test]
fn test_last_handle_unloads_plugin() {
    let registry = registry();
    let id = Token::new("Low");

    let delegate = registry.create_render_delegate(&id, &RenderSettingsMap::new());
    assert!(!delegate.is_null());
    assert_eq!(delegate.plugin_id(), Some(&id));
    assert_eq!(registry.plugin_ref_count(&id), 1);

    drop(delegate);
    assert_eq!(registry.plugin_ref_count(&id), 0);
    assert!(!registry.is_plugin_loaded(&id));
}

#[test]
fn test_cloned_plugin_handles_count_separately() {
    let registry = registry();
    let id = Token::new("Low");

    let first = registry.get_or_create_renderer_plugin(&id).unwrap();
    let second = first.clone();
    assert_eq!(registry.plugin_ref_count(&id), 2);

    drop(first);
    assert!(registry.is_plugin_loaded(&id));
    drop(second);
    assert!(!registry.is_plugin_loaded(&id));
}

#[test]
fn test_unknown_plugin() {
    let registry = registry();

    assert!(registry.get_or_create_renderer_plugin(&Token::new("Nope")).is_none());
    assert!(registry
        .create_render_delegate(&Token::new("Nope"), &RenderSettingsMap::new())
        .is_null());
}

#[test]
fn test_settings_forward_to_default_factory() {
    let registry = registry();
    let settings = RenderSettingsMap::from([(Token::new("threadLimit"), Value::Int(2))]);

    let delegate = registry.create_render_delegate(&Token::new("High"), &settings);

    // The stub only implements the settings-less factory.
    assert!(delegate.get().unwrap().get_render_setting(&Token::new("threadLimit")).is_none());
}
