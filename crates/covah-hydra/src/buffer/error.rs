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

use covah_core::{Token, TupleType};
use thiserror::Error;

/// Failures reported by buffer-array reallocation and range uploads.
///
/// These are internal-consistency failures. Callers report them through the
/// coding-error channel and skip the affected array for the frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferArrayError {
    /// A range of another backend's type was handed to this array.
    #[error("range {found} cannot be managed by a {array} buffer array")]
    ForeignRange {
        /// The array implementation.
        array: &'static str,
        /// Debug rendering of the offending range.
        found: String,
    },

    /// A migrating range belongs to neither this array nor the declared
    /// current owner.
    #[error("range is owned by a buffer array other than the reallocation source")]
    UnexpectedOwner,

    /// A source named a resource the array does not hold.
    #[error("buffer array '{role}' has no resource named '{name}'")]
    UnknownResource {
        /// The array role.
        role: Token,
        /// The missing resource name.
        name: Token,
    },

    /// A source's element type differs from the resource's.
    #[error("tuple type mismatch for '{name}': resource is {expected}, source is {found}")]
    TupleTypeMismatch {
        /// The resource name.
        name: Token,
        /// The resource element type.
        expected: TupleType,
        /// The source element type.
        found: TupleType,
    },

    /// A source holds more elements than the range has room for.
    #[error("'{name}' holds {requested} elements but the range has room for {capacity}")]
    CapacityExceeded {
        /// The resource name.
        name: Token,
        /// Elements in the source.
        requested: usize,
        /// Elements allocated to the range.
        capacity: usize,
    },

    /// The range is not attached to any array.
    #[error("range is not assigned to a buffer array")]
    Unassigned,
}
