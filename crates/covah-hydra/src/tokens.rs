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

//! Well-known names shared by the render index, rprims, and backends.
//!
//! These are plain string constants; build a [`Token`](covah_core::Token)
//! from them where one is needed.

/// Point positions.
pub const POINTS: &str = "points";
/// Vertex normals.
pub const NORMALS: &str = "normals";
/// Display colors.
pub const DISPLAY_COLOR: &str = "displayColor";
/// Face-vertex indices of a mesh.
pub const FACE_VERTEX_INDICES: &str = "faceVertexIndices";
/// Per-face vertex counts of a mesh.
pub const FACE_VERTEX_COUNTS: &str = "faceVertexCounts";
/// The element count of an ext computation.
pub const ELEMENT_COUNT: &str = "elementCount";

/// Buffer role for per-vertex primvars.
pub const PRIMVAR_ROLE: &str = "primvar";
/// Buffer role for mesh topology.
pub const TOPOLOGY_ROLE: &str = "topology";

/// The mesh rprim type.
pub const MESH: &str = "mesh";

/// The default render tag.
pub const GEOMETRY: &str = "geometry";

/// Render setting: the number of samples per pixel to converge to.
pub const CONVERGED_SAMPLES_PER_PIXEL: &str = "convergedSamplesPerPixel";
/// Render setting: the number of worker threads a backend may use.
pub const THREAD_LIMIT: &str = "threadLimit";
/// Render setting: whether the backend renders incrementally.
pub const ENABLE_INTERACTIVE: &str = "enableInteractive";
