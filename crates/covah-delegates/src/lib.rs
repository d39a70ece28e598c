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

//! # Covah Delegates
//!
//! The renderer backends of the Covah render core. Each backend is a
//! [`RendererPlugin`](covah_hydra::plugin::RendererPlugin) registered at link
//! time, a render delegate owning its resource registry, and a render pass.
//!
//! | Plugin | Registry | Supported |
//! |---|---|---|
//! | Embree | aggregated host buffers | always |
//! | Cycles | per-object sources, committed in parallel | always |
//! | RPR | aggregated host buffers | always |
//! | Prman | host buffers with resource reloading | when `RMANTREE` names an installation |

#![warn(missing_docs)]

mod common;
pub mod cycles;
pub mod embree;
pub mod prman;
pub mod rpr;

pub use common::SampleProgress;

use covah_hydra::plugin::RendererPluginDesc;

/// The descriptors of every backend in this crate, in no particular order.
///
/// Referencing this from a binary also guarantees the crate is linked, so
/// its plugins show up in the global registry.
pub fn builtin_plugin_descs() -> [&'static RendererPluginDesc; 4] {
    [
        &embree::EMBREE_PLUGIN,
        &cycles::CYCLES_PLUGIN,
        &rpr::RPR_PLUGIN,
        &prman::PRMAN_PLUGIN,
    ]
}
