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

use super::source::{BufferSource, ResolveState};
use super::spec::BufferSpec;
use covah_core::{coding_error, Token, TupleType, Value};

/// A buffer source wrapping a scene value that already exists.
///
/// The data is available at construction, so the source starts resolved.
/// Values that cannot be placed in a buffer (tokens, strings, empty values)
/// produce an invalid source that registries refuse to schedule.
#[derive(Debug)]
pub struct ValueBufferSource {
    name: Token,
    value: Value,
    tuple_type: TupleType,
    state: ResolveState,
}

impl ValueBufferSource {
    /// Wraps `value` as the resource `name`.
    pub fn new(name: impl Into<Token>, value: Value) -> Self {
        let tuple_type = value.tuple_type();
        Self {
            name: name.into(),
            value,
            tuple_type,
            state: ResolveState::resolved(),
        }
    }

    /// The wrapped value.
    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl BufferSource for ValueBufferSource {
    fn name(&self) -> Token {
        self.name.clone()
    }

    fn data(&self) -> Option<&[u8]> {
        if !self.tuple_type.is_valid() {
            coding_error!("value source '{}' holds no bufferable data", self.name);
            return None;
        }
        Some(self.value.as_bytes())
    }

    fn tuple_type(&self) -> TupleType {
        self.tuple_type
    }

    fn num_elements(&self) -> usize {
        self.value.num_elements()
    }

    fn buffer_specs(&self, specs: &mut Vec<BufferSpec>) {
        specs.push(BufferSpec::new(self.name.clone(), self.tuple_type));
    }

    fn resolve(&self) -> bool {
        if self.state.try_lock() {
            self.state.set_resolved();
        }
        self.state.is_resolved()
    }

    fn state(&self) -> &ResolveState {
        &self.state
    }

    fn check_valid(&self) -> bool {
        self.tuple_type.is_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covah_core::diagnostic::coding_error_count;
    use covah_core::ScalarType;

    #[test]
    fn test_points_source_is_resolved_and_valid() {
        let source = ValueBufferSource::new("points", Value::from(vec![[0.0f32; 3]; 4]));

        assert!(source.is_resolved());
        assert!(source.resolve());
        assert!(source.resolve());
        assert!(source.is_valid());
        assert_eq!(source.num_elements(), 4);
        assert_eq!(source.tuple_type(), TupleType::new(ScalarType::Float32, 3));
        assert_eq!(source.data().map(<[u8]>::len), Some(48));
    }

    #[test]
    fn test_token_value_is_invalid() {
        let source = ValueBufferSource::new("purpose", Value::Token(Token::new("render")));
        assert!(!source.is_valid());

        let before = coding_error_count();
        assert!(source.data().is_none());
        assert_eq!(coding_error_count(), before + 1);
    }

    #[test]
    fn test_identical_sources_hash_equal() {
        let a = ValueBufferSource::new("faceVertexIndices", Value::from(vec![0, 1, 2]));
        let b = ValueBufferSource::new("faceVertexIndices", Value::from(vec![0, 1, 2]));
        let c = ValueBufferSource::new("faceVertexIndices", Value::from(vec![0, 2, 1]));
        assert_eq!(a.compute_hash(), b.compute_hash());
        assert_ne!(a.compute_hash(), c.compute_hash());
    }
}
