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

//! Scalar and tuple type descriptions for buffer data.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The scalar component type of a buffer element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum ScalarType {
    /// No valid type. Produced by accessors called out of order.
    #[default]
    Invalid,
    /// A boolean stored as one byte.
    Bool,
    /// An unsigned 8-bit integer.
    UInt8,
    /// A signed 32-bit integer.
    Int32,
    /// An unsigned 32-bit integer.
    UInt32,
    /// A 32-bit float.
    Float32,
    /// A 64-bit float.
    Float64,
}

impl ScalarType {
    /// Size of one scalar in bytes.
    pub const fn size_in_bytes(self) -> usize {
        match self {
            ScalarType::Invalid => 0,
            ScalarType::Bool | ScalarType::UInt8 => 1,
            ScalarType::Int32 | ScalarType::UInt32 | ScalarType::Float32 => 4,
            ScalarType::Float64 => 8,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarType::Invalid => "invalid",
            ScalarType::Bool => "bool",
            ScalarType::UInt8 => "uint8",
            ScalarType::Int32 => "int32",
            ScalarType::UInt32 => "uint32",
            ScalarType::Float32 => "float32",
            ScalarType::Float64 => "float64",
        };
        f.write_str(name)
    }
}

/// The full type of one buffer element: a scalar type and a component count
/// (`float32 x 3` for a point, `int32 x 1` for an index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TupleType {
    /// The scalar type of each component.
    pub scalar: ScalarType,
    /// The number of components per element.
    pub components: usize,
}

impl TupleType {
    /// The invalid tuple type returned by accessors used before resolution.
    pub const INVALID: TupleType = TupleType {
        scalar: ScalarType::Invalid,
        components: 0,
    };

    /// Creates a tuple type.
    pub const fn new(scalar: ScalarType, components: usize) -> Self {
        Self { scalar, components }
    }

    /// Returns `true` if the type describes actual data.
    pub const fn is_valid(&self) -> bool {
        !matches!(self.scalar, ScalarType::Invalid) && self.components > 0
    }

    /// Size of one element in bytes.
    pub const fn size_in_bytes(&self) -> usize {
        self.scalar.size_in_bytes() * self.components
    }
}

impl fmt::Display for TupleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components == 1 {
            write!(f, "{}", self.scalar)
        } else {
            write!(f, "{}x{}", self.scalar, self.components)
        }
    }
}
