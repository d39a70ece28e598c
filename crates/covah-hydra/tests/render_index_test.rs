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

mod common;

use common::{grid, path, test_index, RecordingPass, TestScene};
use covah_core::Token;
use covah_hydra::change_tracker::ExtComputationDirtyBits;
use covah_hydra::plugin::PluginRenderDelegateUniqueHandle;
use covah_hydra::render_pass::RenderPassState;
use covah_hydra::resource_registry::ResourceRegistry;
use covah_hydra::rprim::PRIMVAR_SLOT;
use covah_hydra::{tokens, DirtyBits, RenderIndex, SceneDelegate};
use std::sync::Arc;

fn mesh() -> Token {
    Token::new(tokens::MESH)
}

fn points_of(index: &RenderIndex, id: &str) -> covah_core::Value {
    index
        .rprim(&path(id))
        .and_then(|rprim| rprim.shared_data().range(PRIMVAR_SLOT).cloned())
        .map(|range| range.read_data(&Token::new(tokens::POINTS)))
        .unwrap_or_default()
}

#[test]
fn test_null_delegate_has_no_index() {
    assert!(RenderIndex::new(PluginRenderDelegateUniqueHandle::null()).is_none());
}

#[test]
fn test_sync_all_commits_every_inserted_mesh() {
    // --- 1. ARRANGE ---
    let (mut index, registry) = test_index();
    let scene: Arc<dyn SceneDelegate> = Arc::new(TestScene::with_meshes(&["/World/B", "/World/A"], 5));
    assert!(index.insert_rprim(&mesh(), scene.clone(), path("/World/B")));
    assert!(index.insert_rprim(&mesh(), scene.clone(), path("/World/A")));

    // --- 2. ACT ---
    index.sync_all();

    // --- 3. ASSERT ---
    assert_eq!(index.rprim_ids(), &[path("/World/A"), path("/World/B")]);
    assert_eq!(points_of(&index, "/World/A"), grid(5, 0.0));
    assert_eq!(points_of(&index, "/World/B"), grid(5, 0.0));
    assert!(
        index.change_tracker().dirty_rprim_ids().is_empty(),
        "Synced prims should be clean"
    );
    assert!(
        !registry.buffer_arrays().needs_reallocation(),
        "Commit should leave no array awaiting reallocation"
    );
}

#[test]
fn test_unsupported_type_and_duplicate_id_are_rejected() {
    let (mut index, _) = test_index();
    let scene: Arc<dyn SceneDelegate> = Arc::new(TestScene::default());

    assert!(!index.insert_rprim(&Token::new("basisCurves"), scene.clone(), path("/Curve")));
    assert!(index.insert_rprim(&mesh(), scene.clone(), path("/Mesh")));
    assert!(!index.insert_rprim(&mesh(), scene, path("/Mesh")));
}

#[test]
fn test_only_dirty_prims_resync() {
    // --- 1. ARRANGE ---
    let (mut index, _) = test_index();
    let scene = Arc::new(TestScene::with_meshes(&["/A", "/B"], 3));
    let delegate: Arc<dyn SceneDelegate> = scene.clone();
    index.insert_rprim(&mesh(), delegate.clone(), path("/A"));
    index.insert_rprim(&mesh(), delegate, path("/B"));
    index.sync_all();

    // --- 2. ACT ---
    scene.points.lock().unwrap().insert(path("/A"), grid(4, 1.0));
    scene.points.lock().unwrap().insert(path("/B"), grid(4, 1.0));
    index
        .change_tracker_mut()
        .mark_rprim_dirty(&path("/A"), DirtyBits::DIRTY_POINTS);
    index.sync_all();

    // --- 3. ASSERT ---
    assert_eq!(points_of(&index, "/A"), grid(4, 1.0), "Dirty prim should pick up the edit");
    assert_eq!(points_of(&index, "/B"), grid(3, 0.0), "Clean prim should keep its data");
}

#[test]
fn test_removed_prims_are_reclaimed_by_garbage_collection() {
    // --- 1. ARRANGE ---
    let (mut index, registry) = test_index();
    let scene: Arc<dyn SceneDelegate> = Arc::new(TestScene::with_meshes(&["/A", "/B"], 3));
    index.insert_rprim(&mesh(), scene.clone(), path("/A"));
    index.insert_rprim(&mesh(), scene, path("/B"));
    index.sync_all();
    let bytes_before: usize = registry.resource_allocation().values().sum();

    // --- 2. ACT ---
    assert!(index.remove_rprim(&path("/A")));
    index.garbage_collect();

    // --- 3. ASSERT ---
    let bytes_after: usize = registry.resource_allocation().values().sum();
    assert!(bytes_after < bytes_before, "Removing a prim should free its primvar storage");
    assert_eq!(points_of(&index, "/B"), grid(3, 0.0), "Survivor must stay readable");
    assert_eq!(index.rprim_ids(), &[path("/B")]);

    index.clear();
    index.garbage_collect();
    assert!(registry.buffer_arrays().arrays().is_empty());
}

#[test]
fn test_render_pass_visits_visible_prims_in_path_order() {
    // --- 1. ARRANGE ---
    let (mut index, _) = test_index();
    let scene = Arc::new(TestScene::with_meshes(&["/C", "/A", "/B"], 3));
    scene.hidden.lock().unwrap().push(path("/B"));
    let delegate: Arc<dyn SceneDelegate> = scene;
    for id in ["/C", "/A", "/B"] {
        index.insert_rprim(&mesh(), delegate.clone(), path(id));
    }
    index.sync_all();

    // --- 2. ACT ---
    let mut pass = RecordingPass::default();
    index.execute(&mut pass, &RenderPassState::default(), &[]);
    let mut filtered = RecordingPass::default();
    index.execute(&mut filtered, &RenderPassState::default(), &[Token::new("points")]);

    // --- 3. ASSERT ---
    assert_eq!(pass.drawn, vec![path("/A"), path("/C")]);
    assert!(filtered.drawn.is_empty(), "No prim carries the 'points' tag");
}

#[test]
fn test_computation_edit_propagates_to_consumers() {
    // --- 1. ARRANGE ---
    let (mut index, registry) = test_index();
    let scene = Arc::new(TestScene {
        deformed: vec![path("/Deformed")],
        ..TestScene::with_meshes(&["/Deformed"], 3)
    });
    let delegate: Arc<dyn SceneDelegate> = scene.clone();
    index.insert_ext_computation(delegate.clone(), path("/Rest"));
    index.insert_ext_computation(delegate.clone(), path("/Offset"));
    index.insert_rprim(&mesh(), delegate, path("/Deformed"));
    index.sync_all();
    assert_eq!(points_of(&index, "/Deformed"), grid(3, 0.0));

    // --- 2. ACT ---
    *scene.offset.lock().unwrap() = 2.0;
    index
        .change_tracker_mut()
        .mark_ext_computation_dirty(&path("/Rest"), ExtComputationDirtyBits::DIRTY_SCENE_INPUT);
    index.sync_all();

    // --- 3. ASSERT ---
    assert_eq!(
        points_of(&index, "/Deformed"),
        grid(3, 2.0),
        "Dirtying the head of the chain should re-run the whole chain"
    );
    assert_eq!(scene.invocation_count("/Rest"), 2);
    assert_eq!(scene.invocation_count("/Offset"), 2);
    assert_eq!(registry.last_commit_stats().computations_resolved, 2);
}
