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

//! A leveled variant of Kahn's algorithm for topological sorting.
//!
//! Nodes are grouped into levels: every node in level `n` depends only on
//! nodes in levels `< n`. Nodes within a level are independent of each other
//! and may be processed in parallel.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::hash::Hash;

/// An error indicating that the graph contains at least one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError<T> {
    /// The nodes that could not be ordered: members of a cycle or nodes
    /// downstream of one.
    pub unresolved: Vec<T>,
}

impl<T: fmt::Debug> fmt::Display for CycleError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dependency cycle detected among {} node(s): {:?}",
            self.unresolved.len(),
            self.unresolved
        )
    }
}

impl<T: fmt::Debug> std::error::Error for CycleError<T> {}

/// Sorts a directed graph into dependency levels.
///
/// # Arguments
///
/// * `nodes`: The unique nodes of the graph. Their order fixes the order of
///   nodes within each level, which keeps the result deterministic.
/// * `edges`: Directed `(dependency, dependent)` pairs. Edges that mention a
///   node not present in `nodes` are ignored.
///
/// # Returns
///
/// * `Ok(levels)`: Every node exactly once, grouped by depth.
/// * `Err(CycleError)`: If some nodes can never become ready.
pub fn topological_levels<T>(
    nodes: impl IntoIterator<Item = T>,
    edges: impl IntoIterator<Item = (T, T)>,
) -> Result<Vec<Vec<T>>, CycleError<T>>
where
    T: Copy + Eq + Hash,
{
    let node_list: Vec<T> = nodes.into_iter().collect();
    if node_list.is_empty() {
        return Ok(Vec::new());
    }

    let mut dependents: HashMap<T, Vec<T>> = HashMap::new();
    let mut in_degree: HashMap<T, usize> = node_list.iter().map(|n| (*n, 0)).collect();

    for (dependency, dependent) in edges {
        if !in_degree.contains_key(&dependency) {
            continue;
        }
        if let Some(degree) = in_degree.get_mut(&dependent) {
            *degree += 1;
            dependents.entry(dependency).or_default().push(dependent);
        }
    }

    let mut current: VecDeque<T> = node_list
        .iter()
        .copied()
        .filter(|n| in_degree.get(n).copied().unwrap_or(0) == 0)
        .collect();

    let mut levels = Vec::new();
    let mut placed = 0;
    while !current.is_empty() {
        let level: Vec<T> = current.drain(..).collect();
        placed += level.len();
        for node in &level {
            let Some(children) = dependents.get(node) else {
                continue;
            };
            for child in children {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        current.push_back(*child);
                    }
                }
            }
        }
        levels.push(level);
    }

    if placed != node_list.len() {
        let unresolved = node_list
            .into_iter()
            .filter(|n| in_degree.get(n).copied().unwrap_or(0) > 0)
            .collect();
        return Err(CycleError { unresolved });
    }
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_produces_one_node_per_level() {
        let levels = topological_levels([3, 2, 1], [(1, 2), (2, 3)]).unwrap();
        assert_eq!(levels, vec![vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn test_independent_nodes_share_a_level() {
        let levels = topological_levels([1, 2, 3, 4], [(1, 3), (2, 3), (3, 4)]).unwrap();
        assert_eq!(levels, vec![vec![1, 2], vec![3], vec![4]]);
    }

    #[test]
    fn test_diamond() {
        let levels = topological_levels(['a', 'b', 'c', 'd'], [('a', 'b'), ('a', 'c'), ('b', 'd'), ('c', 'd')])
            .unwrap();
        assert_eq!(levels, vec![vec!['a'], vec!['b', 'c'], vec!['d']]);
    }

    #[test]
    fn test_cycle_is_reported_with_downstream_nodes() {
        let err = topological_levels([1, 2, 3, 4], [(1, 2), (2, 3), (3, 2), (3, 4)]).unwrap_err();
        assert_eq!(err.unresolved, vec![2, 3, 4]);
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        assert!(topological_levels([7], [(7, 7)]).is_err());
    }

    #[test]
    fn test_edges_to_unknown_nodes_are_ignored() {
        let levels = topological_levels([1, 2], [(1, 2), (9, 1), (2, 9)]).unwrap();
        assert_eq!(levels, vec![vec![1], vec![2]]);
    }

    #[test]
    fn test_empty_graph() {
        let levels = topological_levels(Vec::<u32>::new(), Vec::new()).unwrap();
        assert!(levels.is_empty());
    }
}
