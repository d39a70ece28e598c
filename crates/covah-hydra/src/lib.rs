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

//! The Covah render core.
//!
//! Scene delegates describe prims; the [`RenderIndex`] tracks them and asks a
//! [`RenderDelegate`] to create backend objects. During sync, rprims schedule
//! [`BufferSource`]s against [`BufferArrayRange`]s and CPU computations on a
//! [`ResourceRegistry`]. `Commit()` resolves every computation in dependency
//! order, resolves and uploads the sources, and reallocates the aggregated
//! [`BufferArray`]s. Renderer backends register themselves as
//! [`RendererPlugin`]s and are loaded on demand through the
//! [`RendererPluginRegistry`].
//!
//! [`BufferSource`]: buffer::BufferSource
//! [`BufferArrayRange`]: buffer::BufferArrayRange
//! [`BufferArray`]: buffer::BufferArray
//! [`RenderIndex`]: render_index::RenderIndex
//! [`RenderDelegate`]: render_delegate::RenderDelegate
//! [`ResourceRegistry`]: resource_registry::ResourceRegistry
//! [`RendererPlugin`]: plugin::RendererPlugin
//! [`RendererPluginRegistry`]: plugin::RendererPluginRegistry

#![warn(missing_docs)]

pub mod buffer;
pub mod change_tracker;
pub mod ext_computation;
pub mod instance_registry;
pub mod mesh;
pub mod plugin;
pub mod render_delegate;
pub mod render_index;
pub mod render_pass;
pub mod resource_registry;
pub mod rprim;
pub mod scene_delegate;
pub mod sorted_ids;
pub mod tokens;

#[doc(hidden)]
pub use inventory;

pub use change_tracker::{ChangeTracker, DirtyBits};
pub use render_index::RenderIndex;
pub use scene_delegate::SceneDelegate;
pub use sorted_ids::SortedIds;
