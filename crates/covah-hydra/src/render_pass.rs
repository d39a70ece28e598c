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

//! The render-pass contract.

use crate::render_index::RenderIndex;
use covah_core::Token;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-pass camera and target state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderPassState {
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Row-major world-to-view matrix.
    pub view_matrix: [[f64; 4]; 4],
    /// Row-major view-to-clip matrix.
    pub projection_matrix: [[f64; 4]; 4],
}

impl Default for RenderPassState {
    fn default() -> Self {
        let identity = [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        Self {
            width: 512,
            height: 512,
            view_matrix: identity,
            projection_matrix: identity,
        }
    }
}

/// Draws or computes over committed rprim data for one backend.
pub trait RenderPass: Send + fmt::Debug {
    /// Consumes the committed ranges of the prims selected by `render_tags`.
    /// An empty tag list selects every prim.
    fn execute(&mut self, index: &RenderIndex, state: &RenderPassState, render_tags: &[Token]);

    /// Returns `true` once progressive rendering has finished.
    fn is_converged(&self) -> bool {
        true
    }
}
