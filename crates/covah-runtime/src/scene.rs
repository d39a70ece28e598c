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

//! A procedural scene delegate.
//!
//! Every mesh is a disc of points in its own grid cell. With the deformer
//! enabled, each mesh reads its points from a two-step computation chain:
//! `Rest` publishes the rest positions and `Wave` displaces them along z by
//! a sine of the scene time.

use crate::config::SceneConfig;
use covah_core::{PrimPath, ScalarType, Token, TupleType, Value};
use covah_hydra::ext_computation::{
    ExtComputationContext, ExtComputationInputDescriptor, ExtComputationOutputDescriptor,
    ExtComputationPrimvarDescriptor,
};
use covah_hydra::{tokens, SceneDelegate};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

const REST: &str = "Rest";
const WAVE: &str = "Wave";
const REST_POINTS: &str = "restPoints";
const TIME: &str = "time";
const DEFORMED: &str = "deformed";

fn float3() -> TupleType {
    TupleType::new(ScalarType::Float32, 3)
}

#[derive(Debug)]
struct ProceduralMesh {
    rest: Vec<[f32; 3]>,
    face_vertex_counts: Vec<i32>,
    face_vertex_indices: Vec<i32>,
    rest_computation: PrimPath,
    wave_computation: PrimPath,
}

impl ProceduralMesh {
    fn new(id: &PrimPath, cell: usize, points: usize) -> anyhow::Result<Self> {
        anyhow::ensure!(points >= 3, "mesh {} needs at least 3 points, got {}", id, points);
        let (cx, cy) = ((cell % 8) as f32 * 3.0, (cell / 8) as f32 * 3.0);
        let ring = points - 1;
        let mut rest = Vec::with_capacity(points);
        rest.push([cx, cy, 0.0]);
        for i in 0..ring {
            let angle = i as f32 / ring as f32 * std::f32::consts::TAU;
            rest.push([cx + angle.cos(), cy + angle.sin(), 0.0]);
        }

        let mut face_vertex_indices = Vec::with_capacity(ring * 3);
        for i in 0..ring {
            let next = (i + 1) % ring;
            face_vertex_indices.extend([0, i as i32 + 1, next as i32 + 1]);
        }

        Ok(Self {
            rest,
            face_vertex_counts: vec![3; ring],
            face_vertex_indices,
            rest_computation: id.append_child(REST)?,
            wave_computation: id.append_child(WAVE)?,
        })
    }
}

/// Scene delegate over generated meshes.
#[derive(Debug)]
pub struct ProceduralScene {
    meshes: BTreeMap<PrimPath, ProceduralMesh>,
    computations: BTreeMap<PrimPath, (PrimPath, &'static str)>,
    deformer: bool,
    time: Mutex<f32>,
}

impl ProceduralScene {
    /// Generates the meshes `config` describes under `/World`.
    pub fn new(config: &SceneConfig) -> anyhow::Result<Self> {
        let root = PrimPath::new("/World")?;
        let mut meshes = BTreeMap::new();
        let mut computations = BTreeMap::new();
        for cell in 0..config.prims {
            let id = root.append_child(&format!("Mesh_{cell}"))?;
            let mesh = ProceduralMesh::new(&id, cell, config.points_per_prim)?;
            if config.deformer {
                computations.insert(mesh.rest_computation.clone(), (id.clone(), REST));
                computations.insert(mesh.wave_computation.clone(), (id.clone(), WAVE));
            }
            meshes.insert(id, mesh);
        }
        Ok(Self {
            meshes,
            computations,
            deformer: config.deformer,
            time: Mutex::new(0.0),
        })
    }

    /// The mesh ids, in path order.
    pub fn mesh_ids(&self) -> impl Iterator<Item = &PrimPath> {
        self.meshes.keys()
    }

    /// The computation ids, in path order. Empty without the deformer.
    pub fn computation_ids(&self) -> impl Iterator<Item = &PrimPath> {
        self.computations.keys()
    }

    /// Sets the scene time the wave reads.
    pub fn set_time(&self, time: f32) {
        *self.time.lock().unwrap_or_else(PoisonError::into_inner) = time;
    }

    fn time(&self) -> f32 {
        *self.time.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn computation(&self, id: &PrimPath) -> Option<(&ProceduralMesh, &'static str)> {
        let (mesh, kind) = self.computations.get(id)?;
        Some((self.meshes.get(mesh)?, kind))
    }
}

impl SceneDelegate for ProceduralScene {
    fn get(&self, id: &PrimPath, key: &Token) -> Value {
        if let Some((mesh, _)) = self.computation(id) {
            return match key.as_str() {
                tokens::ELEMENT_COUNT => Value::Int(mesh.rest.len() as i32),
                _ => Value::Empty,
            };
        }
        let Some(mesh) = self.meshes.get(id) else {
            return Value::Empty;
        };
        match key.as_str() {
            tokens::POINTS => Value::Vec3fArray(mesh.rest.clone()),
            tokens::FACE_VERTEX_COUNTS => Value::IntArray(mesh.face_vertex_counts.clone()),
            tokens::FACE_VERTEX_INDICES => Value::IntArray(mesh.face_vertex_indices.clone()),
            tokens::DISPLAY_COLOR => {
                let shade = (id.as_str().len() % 7) as f32 / 7.0;
                Value::Vec3fArray(vec![[shade, 0.5, 1.0 - shade]; mesh.rest.len()])
            }
            _ => Value::Empty,
        }
    }

    fn get_ext_computation_input(&self, computation_id: &PrimPath, input: &Token) -> Value {
        let Some((mesh, _)) = self.computation(computation_id) else {
            return Value::Empty;
        };
        match input.as_str() {
            REST_POINTS => Value::Vec3fArray(mesh.rest.clone()),
            TIME => Value::Float(self.time()),
            _ => Value::Empty,
        }
    }

    fn invoke_ext_computation(&self, computation_id: &PrimPath, context: &mut dyn ExtComputationContext) {
        match self.computation(computation_id).map(|(_, kind)| kind) {
            Some(REST) => {
                let Some(rest) = context.input_value(&Token::new(REST_POINTS)).cloned() else {
                    context.raise_computation_error();
                    return;
                };
                context.set_output_value(&Token::new(tokens::POINTS), rest);
            }
            Some(WAVE) => {
                let time = context
                    .input_value(&Token::new(TIME))
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0) as f32;
                let Some(points) = context
                    .input_value(&Token::new(tokens::POINTS))
                    .and_then(Value::as_vec3f_array)
                    .map(|points| {
                        points
                            .iter()
                            .map(|p| [p[0], p[1], 0.25 * (time + p[0] + p[1]).sin()])
                            .collect::<Vec<_>>()
                    })
                else {
                    context.raise_computation_error();
                    return;
                };
                context.set_output_value(&Token::new(DEFORMED), Value::Vec3fArray(points));
            }
            _ => context.raise_computation_error(),
        }
    }

    fn primvar_names(&self, id: &PrimPath) -> Vec<Token> {
        if self.meshes.contains_key(id) {
            vec![Token::new(tokens::DISPLAY_COLOR)]
        } else {
            Vec::new()
        }
    }

    fn ext_computation_primvar_descriptors(&self, id: &PrimPath) -> Vec<ExtComputationPrimvarDescriptor> {
        let Some(mesh) = self.meshes.get(id).filter(|_| self.deformer) else {
            return Vec::new();
        };
        vec![ExtComputationPrimvarDescriptor {
            name: Token::new(tokens::POINTS),
            source_computation_id: mesh.wave_computation.clone(),
            source_computation_output_name: Token::new(DEFORMED),
            value_type: float3(),
        }]
    }

    fn ext_computation_scene_input_names(&self, computation_id: &PrimPath) -> Vec<Token> {
        match self.computation(computation_id).map(|(_, kind)| kind) {
            Some(REST) => vec![Token::new(REST_POINTS)],
            Some(WAVE) => vec![Token::new(TIME)],
            _ => Vec::new(),
        }
    }

    fn ext_computation_input_descriptors(&self, computation_id: &PrimPath) -> Vec<ExtComputationInputDescriptor> {
        match self.computation(computation_id) {
            Some((mesh, WAVE)) => vec![ExtComputationInputDescriptor {
                name: Token::new(tokens::POINTS),
                source_computation_id: mesh.rest_computation.clone(),
                source_computation_output_name: Token::new(tokens::POINTS),
            }],
            _ => Vec::new(),
        }
    }

    fn ext_computation_output_descriptors(&self, computation_id: &PrimPath) -> Vec<ExtComputationOutputDescriptor> {
        let name = match self.computation(computation_id).map(|(_, kind)| kind) {
            Some(REST) => tokens::POINTS,
            Some(WAVE) => DEFORMED,
            _ => return Vec::new(),
        };
        vec![ExtComputationOutputDescriptor {
            name: Token::new(name),
            value_type: float3(),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covah_hydra::ext_computation::ExtComputationContextImpl;

    fn scene(deformer: bool) -> ProceduralScene {
        ProceduralScene::new(&SceneConfig {
            prims: 3,
            points_per_prim: 5,
            deformer,
        })
        .unwrap()
    }

    #[test]
    fn test_meshes_fan_from_center() {
        let scene = scene(false);
        let id = scene.mesh_ids().next().unwrap().clone();

        let counts = scene.get(&id, &Token::new(tokens::FACE_VERTEX_COUNTS));
        let indices = scene.get(&id, &Token::new(tokens::FACE_VERTEX_INDICES));

        assert_eq!(counts, Value::IntArray(vec![3; 4]));
        assert_eq!(
            indices.as_int_array().map(|i| i.len()),
            Some(12),
            "Four triangles around the center"
        );
        assert_eq!(scene.get(&id, &Token::new(tokens::POINTS)).num_elements(), 5);
    }

    #[test]
    fn test_deformer_adds_two_computations_per_mesh() {
        assert_eq!(scene(true).computation_ids().count(), 6);
        assert_eq!(scene(false).computation_ids().count(), 0);
    }

    #[test]
    fn test_wave_displaces_along_z() {
        // --- 1. ARRANGE ---
        let scene = scene(true);
        scene.set_time(1.0);
        let wave = scene
            .computation_ids()
            .find(|id| id.name() == WAVE)
            .unwrap()
            .clone();
        let mut context = ExtComputationContextImpl::new();
        context.set_input_value(Token::new(TIME), scene.get_ext_computation_input(&wave, &Token::new(TIME)));
        context.set_input_value(Token::new(tokens::POINTS), Value::from(vec![[0.0f32, 0.0, 0.0]]));

        // --- 2. ACT ---
        scene.invoke_ext_computation(&wave, &mut context);

        // --- 3. ASSERT ---
        let deformed = context.output_value(&Token::new(DEFORMED)).cloned().unwrap();
        let z = deformed.as_vec3f_array().unwrap()[0][2];
        assert!((z - 0.25 * 1.0f32.sin()).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_computation_raises() {
        let scene = scene(true);
        let mut context = ExtComputationContextImpl::new();
        scene.invoke_ext_computation(&PrimPath::new("/Nowhere").unwrap(), &mut context);
        assert!(context.has_computation_error());
    }
}
