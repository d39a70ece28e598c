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

//! A type-erased container for scene attribute values.

use crate::token::Token;
use crate::types::{ScalarType, TupleType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A dynamically typed attribute value, as supplied by a scene delegate or
/// stored in a render-settings map.
///
/// Array variants are what buffer sources carry; scalar variants mostly show
/// up as computation inputs and render settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    /// No value.
    #[default]
    Empty,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i32),
    /// An unsigned integer.
    UInt(u32),
    /// A single-precision float.
    Float(f32),
    /// A double-precision float.
    Double(f64),
    /// A token.
    Token(Token),
    /// A string.
    String(String),
    /// An array of signed integers (indices, face counts).
    IntArray(Vec<i32>),
    /// An array of unsigned integers.
    UIntArray(Vec<u32>),
    /// An array of floats (widths, weights).
    FloatArray(Vec<f32>),
    /// An array of doubles.
    DoubleArray(Vec<f64>),
    /// An array of 2D float vectors (texture coordinates).
    Vec2fArray(Vec<[f32; 2]>),
    /// An array of 3D float vectors (points, normals, colors).
    Vec3fArray(Vec<[f32; 3]>),
    /// An array of 4D float vectors.
    Vec4fArray(Vec<[f32; 4]>),
}

impl Value {
    /// Returns `true` if the value holds nothing.
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Returns `true` if the value is one of the array variants.
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            Value::IntArray(_)
                | Value::UIntArray(_)
                | Value::FloatArray(_)
                | Value::DoubleArray(_)
                | Value::Vec2fArray(_)
                | Value::Vec3fArray(_)
                | Value::Vec4fArray(_)
        )
    }

    /// Returns the per-element tuple type, or [`TupleType::INVALID`] for
    /// values that cannot be placed in a buffer.
    pub fn tuple_type(&self) -> TupleType {
        match self {
            Value::Bool(_) => TupleType::new(ScalarType::Bool, 1),
            Value::Int(_) | Value::IntArray(_) => TupleType::new(ScalarType::Int32, 1),
            Value::UInt(_) | Value::UIntArray(_) => TupleType::new(ScalarType::UInt32, 1),
            Value::Float(_) | Value::FloatArray(_) => TupleType::new(ScalarType::Float32, 1),
            Value::Double(_) | Value::DoubleArray(_) => TupleType::new(ScalarType::Float64, 1),
            Value::Vec2fArray(_) => TupleType::new(ScalarType::Float32, 2),
            Value::Vec3fArray(_) => TupleType::new(ScalarType::Float32, 3),
            Value::Vec4fArray(_) => TupleType::new(ScalarType::Float32, 4),
            Value::Empty | Value::Token(_) | Value::String(_) => TupleType::INVALID,
        }
    }

    /// Number of buffer elements: the array length, 1 for numeric scalars,
    /// 0 otherwise.
    pub fn num_elements(&self) -> usize {
        match self {
            Value::Bool(_) | Value::Int(_) | Value::UInt(_) | Value::Float(_) | Value::Double(_) => 1,
            Value::IntArray(v) => v.len(),
            Value::UIntArray(v) => v.len(),
            Value::FloatArray(v) => v.len(),
            Value::DoubleArray(v) => v.len(),
            Value::Vec2fArray(v) => v.len(),
            Value::Vec3fArray(v) => v.len(),
            Value::Vec4fArray(v) => v.len(),
            Value::Empty | Value::Token(_) | Value::String(_) => 0,
        }
    }

    /// Views the numeric payload as raw bytes. Non-numeric values yield an
    /// empty slice.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Value::Bool(v) => bytemuck::bytes_of(v),
            Value::Int(v) => bytemuck::bytes_of(v),
            Value::UInt(v) => bytemuck::bytes_of(v),
            Value::Float(v) => bytemuck::bytes_of(v),
            Value::Double(v) => bytemuck::bytes_of(v),
            Value::IntArray(v) => bytemuck::cast_slice(v),
            Value::UIntArray(v) => bytemuck::cast_slice(v),
            Value::FloatArray(v) => bytemuck::cast_slice(v),
            Value::DoubleArray(v) => bytemuck::cast_slice(v),
            Value::Vec2fArray(v) => bytemuck::cast_slice(v),
            Value::Vec3fArray(v) => bytemuck::cast_slice(v),
            Value::Vec4fArray(v) => bytemuck::cast_slice(v),
            Value::Empty | Value::Token(_) | Value::String(_) => &[],
        }
    }

    /// Rebuilds an array value from raw bytes of the given element type.
    ///
    /// Returns [`Value::Empty`] for element types with no array variant or
    /// byte counts that are not a whole number of elements.
    pub fn from_bytes(tuple_type: TupleType, bytes: &[u8]) -> Value {
        let element_size = tuple_type.size_in_bytes();
        if element_size == 0 || bytes.len() % element_size != 0 {
            return Value::Empty;
        }
        match (tuple_type.scalar, tuple_type.components) {
            (ScalarType::Int32, 1) => Value::IntArray(bytemuck::pod_collect_to_vec(bytes)),
            (ScalarType::UInt32, 1) => Value::UIntArray(bytemuck::pod_collect_to_vec(bytes)),
            (ScalarType::Float32, 1) => Value::FloatArray(bytemuck::pod_collect_to_vec(bytes)),
            (ScalarType::Float64, 1) => Value::DoubleArray(bytemuck::pod_collect_to_vec(bytes)),
            (ScalarType::Float32, 2) => Value::Vec2fArray(bytemuck::pod_collect_to_vec(bytes)),
            (ScalarType::Float32, 3) => Value::Vec3fArray(bytemuck::pod_collect_to_vec(bytes)),
            (ScalarType::Float32, 4) => Value::Vec4fArray(bytemuck::pod_collect_to_vec(bytes)),
            _ => Value::Empty,
        }
    }

    /// Returns the boolean payload.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns an integer payload, widening unsigned values that fit.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => i32::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Returns a floating-point payload, converting integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(f64::from(*v)),
            Value::UInt(v) => Some(f64::from(*v)),
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string payload of a `String` or `Token` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Token(t) => Some(t.as_str()),
            _ => None,
        }
    }

    /// Returns the float array payload.
    pub fn as_float_array(&self) -> Option<&[f32]> {
        match self {
            Value::FloatArray(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the int array payload.
    pub fn as_int_array(&self) -> Option<&[i32]> {
        match self {
            Value::IntArray(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the 3D vector array payload.
    pub fn as_vec3f_array(&self) -> Option<&[[f32; 3]]> {
        match self {
            Value::Vec3fArray(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => f.write_str("<empty>"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Token(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v:?}"),
            other => write!(f, "[{}; {}]", other.tuple_type(), other.num_elements()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInt(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<Token> for Value {
    fn from(v: Token) -> Self {
        Value::Token(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<i32>> for Value {
    fn from(v: Vec<i32>) -> Self {
        Value::IntArray(v)
    }
}

impl From<Vec<f32>> for Value {
    fn from(v: Vec<f32>) -> Self {
        Value::FloatArray(v)
    }
}

impl From<Vec<[f32; 3]>> for Value {
    fn from(v: Vec<[f32; 3]>) -> Self {
        Value::Vec3fArray(v)
    }
}
