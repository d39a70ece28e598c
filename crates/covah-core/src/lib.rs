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

//! # Covah Core
//!
//! Foundational crate containing the value types, diagnostics, and small
//! algorithms shared by every layer of the Covah render core.
//!
//! Nothing here knows about buffers or render delegates. The crate provides
//! the vocabulary those layers speak: identifiers ([`Token`], [`PrimPath`]),
//! typed data ([`Value`], [`TupleType`]), the non-fatal coding-error channel,
//! a cycle-checked dependency sort, and the fire-and-forget perf counters.

#![warn(missing_docs)]

pub mod diagnostic;
pub mod graph;
pub mod path;
pub mod telemetry;
pub mod token;
pub mod types;
pub mod value;

pub use path::PrimPath;
pub use token::Token;
pub use types::{ScalarType, TupleType};
pub use value::Value;
