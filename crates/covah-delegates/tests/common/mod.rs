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

//! A small triangle scene shared by the backend tests.

#![allow(dead_code)]

use covah_core::{PrimPath, ScalarType, Token, TupleType, Value};
use covah_hydra::ext_computation::{ExtComputationContext, ExtComputationOutputDescriptor, ExtComputationPrimvarDescriptor};
use covah_hydra::plugin::RendererPluginRegistry;
use covah_hydra::render_delegate::RenderSettingsMap;
use covah_hydra::{tokens, RenderIndex, SceneDelegate};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

pub const LIFT: &str = "/Lift";

pub fn path(text: &str) -> PrimPath {
    PrimPath::new(text).unwrap()
}

pub fn triangle(z: f32) -> Value {
    Value::from(vec![[0.0f32, 0.0, z], [1.0, 0.0, z], [0.0, 1.0, z]])
}

/// Triangles at z = 0. Meshes in `lifted` take their points from the `/Lift`
/// computation, which raises the triangle by `lift`.
#[derive(Default)]
pub struct TriangleScene {
    pub lifted: BTreeSet<PrimPath>,
    pub hidden: Mutex<BTreeSet<PrimPath>>,
    pub lift: Mutex<f32>,
}

impl TriangleScene {
    pub fn lifted(ids: &[&str], lift: f32) -> Self {
        Self {
            lifted: ids.iter().map(|id| path(id)).collect(),
            lift: Mutex::new(lift),
            ..Self::default()
        }
    }
}

impl SceneDelegate for TriangleScene {
    fn get(&self, _id: &PrimPath, key: &Token) -> Value {
        match key.as_str() {
            tokens::POINTS => triangle(0.0),
            tokens::FACE_VERTEX_COUNTS => Value::IntArray(vec![3]),
            tokens::FACE_VERTEX_INDICES => Value::IntArray(vec![0, 1, 2]),
            tokens::ELEMENT_COUNT => Value::Int(3),
            _ => Value::Empty,
        }
    }

    fn get_ext_computation_input(&self, _id: &PrimPath, input: &Token) -> Value {
        match input.as_str() {
            "lift" => Value::Float(*self.lift.lock().unwrap()),
            _ => Value::Empty,
        }
    }

    fn invoke_ext_computation(&self, _id: &PrimPath, context: &mut dyn ExtComputationContext) {
        let lift = context
            .input_value(&Token::new("lift"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0) as f32;
        context.set_output_value(&Token::new("points"), triangle(lift));
    }

    fn ext_computation_primvar_descriptors(&self, id: &PrimPath) -> Vec<ExtComputationPrimvarDescriptor> {
        if !self.lifted.contains(id) {
            return Vec::new();
        }
        vec![ExtComputationPrimvarDescriptor {
            name: Token::new(tokens::POINTS),
            source_computation_id: path(LIFT),
            source_computation_output_name: Token::new("points"),
            value_type: TupleType::new(ScalarType::Float32, 3),
        }]
    }

    fn ext_computation_scene_input_names(&self, _id: &PrimPath) -> Vec<Token> {
        vec![Token::new("lift")]
    }

    fn ext_computation_output_descriptors(&self, _id: &PrimPath) -> Vec<ExtComputationOutputDescriptor> {
        vec![ExtComputationOutputDescriptor {
            name: Token::new("points"),
            value_type: TupleType::new(ScalarType::Float32, 3),
        }]
    }

    fn visible(&self, id: &PrimPath) -> bool {
        !self.hidden.lock().unwrap().contains(id)
    }
}

/// An index over a fresh delegate of plugin `id` holding one mesh per entry
/// of `meshes`, plus the `/Lift` computation.
pub fn index_with_meshes(id: &str, scene: Arc<TriangleScene>, meshes: &[&str]) -> RenderIndex {
    let delegate = RendererPluginRegistry::global()
        .create_render_delegate(&Token::new(id), &RenderSettingsMap::new());
    let mut index = RenderIndex::new(delegate).expect("plugin should create a delegate");
    let scene: Arc<dyn SceneDelegate> = scene;
    index.insert_ext_computation(scene.clone(), path(LIFT));
    for mesh in meshes {
        assert!(index.insert_rprim(&Token::new(tokens::MESH), scene.clone(), path(mesh)));
    }
    index
}

pub fn stat(index: &RenderIndex, key: &str) -> Option<i32> {
    index
        .render_delegate()?
        .render_stats()
        .get(&Token::new(key))?
        .as_int()
}
