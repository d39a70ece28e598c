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

//! An amortized-sort set of prim paths.

use covah_core::telemetry::perf::{tokens, PerfLog};
use covah_core::{coding_error, PrimPath};

/// Above this many pending insertions a flush sorts the whole list instead
/// of splicing each new id into the sorted prefix.
pub const INSERT_SORT_MAX_PENDING: usize = 32;

/// The prim ids of a render index, kept in canonical path order.
///
/// Insertions append to an unsorted tail. The tail is merged into the
/// sorted prefix lazily, the next time the ids are read or an id is removed:
/// a short tail is spliced in one binary search at a time, a long one
/// (a scene load) triggers a single full sort. Either way the list handed out
/// by [`ids`](Self::ids) is sorted and free of duplicates.
#[derive(Debug)]
pub struct SortedIds {
    ids: Vec<PrimPath>,
    sorted_count: usize,
    after_last_delete_point: Option<usize>,
    perf: PerfLog,
}

impl SortedIds {
    /// Creates an empty set reporting sort counters into `perf`.
    pub fn new(perf: PerfLog) -> Self {
        Self {
            ids: Vec::new(),
            sorted_count: 0,
            after_last_delete_point: None,
            perf,
        }
    }

    /// Sorts pending insertions and returns every id in path order.
    pub fn ids(&mut self) -> &[PrimPath] {
        self.sort();
        &self.ids
    }

    /// The part of the list known to be sorted. Equal to [`ids`](Self::ids)
    /// when nothing was inserted since the last flush.
    pub fn sorted_prefix(&self) -> &[PrimPath] {
        &self.ids[..self.sorted_count]
    }

    /// Returns `true` if no insertion is waiting to be sorted.
    pub fn is_sorted(&self) -> bool {
        self.sorted_count == self.ids.len()
    }

    /// Adds `id`. Inserting an id twice keeps one copy.
    pub fn insert(&mut self, id: PrimPath) {
        self.ids.push(id);
    }

    /// Removes `id`, returning `false` if it was not present.
    ///
    /// Consecutive removals of neighbouring ids (tearing down a subtree)
    /// skip the binary search.
    pub fn remove(&mut self, id: &PrimPath) -> bool {
        self.sort();

        let position = match self.after_last_delete_point {
            Some(p) if self.ids.get(p) == Some(id) => p,
            _ => match self.ids.binary_search(id) {
                Ok(p) => p,
                Err(_) => return false,
            },
        };
        self.ids.remove(position);
        self.sorted_count = self.ids.len();
        self.after_last_delete_point = Some(position);
        true
    }

    /// Removes the ids at sorted positions `start..=end`.
    pub fn remove_range(&mut self, start: usize, end: usize) {
        self.sort();

        if start > end || end >= self.ids.len() {
            coding_error!(
                "remove_range({}, {}) outside of {} sorted ids",
                start,
                end,
                self.ids.len()
            );
            return;
        }
        self.ids.drain(start..=end);
        self.sorted_count = self.ids.len();
        self.after_last_delete_point = Some(start);
    }

    /// Removes every id.
    pub fn clear(&mut self) {
        self.ids.clear();
        self.sorted_count = 0;
        self.after_last_delete_point = None;
    }

    fn sort(&mut self) {
        let pending = self.ids.len() - self.sorted_count;
        if pending == 0 {
            return;
        }
        if self.sorted_count == 0 || pending > INSERT_SORT_MAX_PENDING {
            self.full_sort();
        } else {
            self.insert_sort();
        }
        self.sorted_count = self.ids.len();
        self.after_last_delete_point = None;
    }

    fn full_sort(&mut self) {
        self.perf.incr(tokens::SORTED_IDS_FULL_SORT);
        self.ids.sort_unstable();
        self.ids.dedup();
    }

    fn insert_sort(&mut self) {
        self.perf.incr(tokens::SORTED_IDS_INSERT_SORT);
        let mut pending = self.ids.split_off(self.sorted_count);
        pending.sort_unstable();
        pending.dedup();
        for id in pending {
            if let Err(position) = self.ids.binary_search(&id) {
                self.ids.insert(position, id);
            }
        }
    }
}

impl Default for SortedIds {
    fn default() -> Self {
        Self::new(PerfLog::global())
    }
}
