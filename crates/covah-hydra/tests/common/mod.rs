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

//! Shared scene and render-delegate stubs for the integration tests.

#![allow(dead_code)]

use covah_core::{PrimPath, ScalarType, Token, TupleType, Value};
use covah_hydra::ext_computation::{
    ExtComputationContext, ExtComputationInputDescriptor, ExtComputationOutputDescriptor,
    ExtComputationPrimvarDescriptor,
};
use covah_hydra::mesh::BufferedMesh;
use covah_hydra::plugin::PluginRenderDelegateUniqueHandle;
use covah_hydra::render_delegate::{RenderDelegate, RenderSettingsStore};
use covah_hydra::render_index::RenderIndex;
use covah_hydra::render_pass::{RenderPass, RenderPassState};
use covah_hydra::resource_registry::{BufferResourceRegistry, ResourceRegistry};
use covah_hydra::rprim::Rprim;
use covah_hydra::{tokens, SceneDelegate};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub fn path(text: &str) -> PrimPath {
    PrimPath::new(text).unwrap()
}

pub fn float3() -> TupleType {
    TupleType::new(ScalarType::Float32, 3)
}

pub fn grid(n: usize, z: f32) -> Value {
    Value::from((0..n).map(|i| [i as f32, 0.0, z]).collect::<Vec<[f32; 3]>>())
}

/// A deformer: `/Rest` publishes its rest points, `/Offset` adds the scene
/// value `offset` to their z coordinate.
#[derive(Default)]
pub struct TestScene {
    pub points: Mutex<BTreeMap<PrimPath, Value>>,
    pub hidden: Mutex<Vec<PrimPath>>,
    pub deformed: Vec<PrimPath>,
    pub offset: Mutex<f32>,
    pub invocations: Mutex<Vec<PrimPath>>,
}

impl TestScene {
    pub fn with_meshes(ids: &[&str], points: usize) -> Self {
        let scene = Self::default();
        for id in ids {
            scene.points.lock().unwrap().insert(path(id), grid(points, 0.0));
        }
        scene
    }

    pub fn invocation_count(&self, id: &str) -> usize {
        let id = path(id);
        self.invocations.lock().unwrap().iter().filter(|p| **p == id).count()
    }
}

impl SceneDelegate for TestScene {
    fn get(&self, id: &PrimPath, key: &Token) -> Value {
        match key.as_str() {
            tokens::POINTS => self.points.lock().unwrap().get(id).cloned().unwrap_or_default(),
            tokens::FACE_VERTEX_COUNTS => Value::IntArray(vec![3]),
            tokens::FACE_VERTEX_INDICES => Value::IntArray(vec![0, 1, 2]),
            tokens::ELEMENT_COUNT => Value::Int(3),
            _ => Value::Empty,
        }
    }

    fn get_ext_computation_input(&self, _id: &PrimPath, input: &Token) -> Value {
        match input.as_str() {
            "rest" => grid(3, 0.0),
            "offset" => Value::Float(*self.offset.lock().unwrap()),
            _ => Value::Empty,
        }
    }

    fn invoke_ext_computation(&self, id: &PrimPath, context: &mut dyn ExtComputationContext) {
        self.invocations.lock().unwrap().push(id.clone());
        match id.as_str() {
            "/Rest" => {
                let rest = context.input_value(&Token::new("rest")).cloned().unwrap_or_default();
                context.set_output_value(&Token::new("points"), rest);
            }
            "/Offset" => {
                let offset = context
                    .input_value(&Token::new("offset"))
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0) as f32;
                let points: Vec<[f32; 3]> = context
                    .input_value(&Token::new("points"))
                    .and_then(Value::as_vec3f_array)
                    .map(|p| p.iter().map(|p| [p[0], p[1], p[2] + offset]).collect())
                    .unwrap_or_default();
                context.set_output_value(&Token::new("deformed"), Value::from(points));
            }
            _ => context.raise_computation_error(),
        }
    }

    fn ext_computation_primvar_descriptors(&self, id: &PrimPath) -> Vec<ExtComputationPrimvarDescriptor> {
        if !self.deformed.contains(id) {
            return Vec::new();
        }
        vec![ExtComputationPrimvarDescriptor {
            name: Token::new(tokens::POINTS),
            source_computation_id: path("/Offset"),
            source_computation_output_name: Token::new("deformed"),
            value_type: float3(),
        }]
    }

    fn ext_computation_scene_input_names(&self, id: &PrimPath) -> Vec<Token> {
        match id.as_str() {
            "/Rest" => vec![Token::new("rest")],
            "/Offset" => vec![Token::new("offset")],
            _ => Vec::new(),
        }
    }

    fn ext_computation_input_descriptors(&self, id: &PrimPath) -> Vec<ExtComputationInputDescriptor> {
        if id.as_str() != "/Offset" {
            return Vec::new();
        }
        vec![ExtComputationInputDescriptor {
            name: Token::new("points"),
            source_computation_id: path("/Rest"),
            source_computation_output_name: Token::new("points"),
        }]
    }

    fn ext_computation_output_descriptors(&self, id: &PrimPath) -> Vec<ExtComputationOutputDescriptor> {
        let name = match id.as_str() {
            "/Rest" => "points",
            "/Offset" => "deformed",
            _ => return Vec::new(),
        };
        vec![ExtComputationOutputDescriptor {
            name: Token::new(name),
            value_type: float3(),
        }]
    }

    fn visible(&self, id: &PrimPath) -> bool {
        !self.hidden.lock().unwrap().contains(id)
    }
}

/// Records the prims it was asked to draw.
#[derive(Debug, Default)]
pub struct RecordingPass {
    pub drawn: Vec<PrimPath>,
}

impl RenderPass for RecordingPass {
    fn execute(&mut self, index: &RenderIndex, _state: &RenderPassState, render_tags: &[Token]) {
        self.drawn = index
            .rprims_for_tags(render_tags)
            .filter(|rprim| rprim.shared_data().visible)
            .map(|rprim| rprim.id().clone())
            .collect();
    }
}

#[derive(Debug)]
pub struct TestDelegate {
    pub registry: Arc<BufferResourceRegistry>,
    settings: RenderSettingsStore,
}

impl TestDelegate {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(BufferResourceRegistry::default()),
            settings: RenderSettingsStore::default(),
        }
    }
}

impl RenderDelegate for TestDelegate {
    fn resource_registry(&self) -> Arc<dyn ResourceRegistry> {
        self.registry.clone()
    }

    fn supported_rprim_types(&self) -> Vec<Token> {
        vec![Token::new(tokens::MESH)]
    }

    fn create_rprim(&self, type_id: &Token, id: &PrimPath) -> Option<Box<dyn Rprim>> {
        (type_id == tokens::MESH)
            .then(|| Box::new(BufferedMesh::new(id.clone(), self.registry.clone())) as Box<dyn Rprim>)
    }

    fn create_render_pass(&self) -> Box<dyn RenderPass> {
        Box::new(RecordingPass::default())
    }

    fn render_settings(&self) -> &RenderSettingsStore {
        &self.settings
    }

    fn render_settings_mut(&mut self) -> &mut RenderSettingsStore {
        &mut self.settings
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A render index over a fresh [`TestDelegate`], and that delegate's
/// registry.
pub fn test_index() -> (RenderIndex, Arc<BufferResourceRegistry>) {
    let delegate = TestDelegate::new();
    let registry = delegate.registry.clone();
    let handle = PluginRenderDelegateUniqueHandle::from_delegate(Box::new(delegate));
    let index = RenderIndex::new(handle).unwrap();
    (index, registry)
}
