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
use std::fmt;

/// Describes one named resource of a buffer array: its name and element type.
///
/// Sources report the specs they need; aggregation strategies bucket ranges
/// whose spec lists are equal into the same arrays.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferSpec {
    /// The resource name, usually a primvar name.
    pub name: Token,
    /// The element type.
    pub tuple_type: TupleType,
}

impl BufferSpec {
    /// Creates a spec.
    pub fn new(name: impl Into<Token>, tuple_type: TupleType) -> Self {
        Self {
            name: name.into(),
            tuple_type,
        }
    }

    /// Returns `true` if every spec of `subset` is in `superset`.
    pub fn is_subset(subset: &[BufferSpec], superset: &[BufferSpec]) -> bool {
        subset.iter().all(|spec| superset.contains(spec))
    }

    /// Returns the specs of `a` followed by those of `b` that `a` lacks.
    ///
    /// A spec in `b` with the same name as one in `a` but a different type
    /// replaces the one from `a`.
    pub fn compute_union(a: &[BufferSpec], b: &[BufferSpec]) -> Vec<BufferSpec> {
        let mut union: Vec<BufferSpec> = a
            .iter()
            .filter(|spec| !b.iter().any(|o| o.name == spec.name && o != *spec))
            .cloned()
            .collect();
        for spec in b {
            if !union.contains(spec) {
                union.push(spec.clone());
            }
        }
        union
    }

    /// Returns the specs of `a` that are not in `b`.
    pub fn compute_difference(a: &[BufferSpec], b: &[BufferSpec]) -> Vec<BufferSpec> {
        a.iter().filter(|spec| !b.contains(spec)).cloned().collect()
    }
}

impl fmt::Display for BufferSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tuple_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covah_core::types::ScalarType;

    fn float3(name: &str) -> BufferSpec {
        BufferSpec::new(name, TupleType::new(ScalarType::Float32, 3))
    }

    #[test]
    fn test_subset() {
        let all = [float3("points"), float3("normals")];
        assert!(BufferSpec::is_subset(&[float3("normals")], &all));
        assert!(!BufferSpec::is_subset(&[float3("displayColor")], &all));
        assert!(BufferSpec::is_subset(&[], &all));
    }

    #[test]
    fn test_union_keeps_order_and_replaces_retyped_specs() {
        let a = [float3("points"), float3("widths")];
        let widths = BufferSpec::new("widths", TupleType::new(ScalarType::Float32, 1));
        let b = [widths.clone(), float3("normals")];

        let union = BufferSpec::compute_union(&a, &b);

        assert_eq!(union, vec![float3("points"), widths, float3("normals")]);
    }

    #[test]
    fn test_specs_sort_by_name_then_type() {
        let widths = BufferSpec::new("widths", TupleType::new(ScalarType::Float32, 1));
        let mut specs = vec![float3("widths"), float3("normals"), widths.clone()];

        specs.sort();

        assert_eq!(specs, vec![float3("normals"), widths, float3("widths")]);
    }

    #[test]
    fn test_difference() {
        let a = [float3("points"), float3("normals")];
        let b = [float3("points")];
        assert_eq!(BufferSpec::compute_difference(&a, &b), vec![float3("normals")]);
    }
}
