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

//! Deduplication of shared resources by content hash.

use covah_core::telemetry::perf::{tokens, PerfLog};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// The result of an instance lookup.
#[derive(Debug)]
pub struct Instance<T: ?Sized> {
    /// The shared value.
    pub value: Arc<T>,
    /// `true` if this lookup created the value. The first user is the one
    /// that populates it.
    pub is_first_instance: bool,
}

/// A map from content hash to a shared value.
///
/// The registry keeps one strong reference to every value. A value nobody
/// else references is dropped by [`garbage_collect`](Self::garbage_collect).
pub struct InstanceRegistry<T: ?Sized> {
    entries: Mutex<HashMap<u64, Arc<T>>>,
    perf: PerfLog,
}

impl<T: ?Sized> InstanceRegistry<T> {
    /// Creates an empty registry.
    pub fn new(perf: PerfLog) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            perf,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<u64, Arc<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the value stored under `key`, creating it with `create` if
    /// absent.
    pub fn get_or_insert_with(&self, key: u64, create: impl FnOnce() -> Arc<T>) -> Instance<T> {
        let mut entries = self.entries();
        if let Some(value) = entries.get(&key) {
            self.perf.incr(tokens::INSTANCE_REGISTRY_HITS);
            return Instance {
                value: value.clone(),
                is_first_instance: false,
            };
        }
        let value = create();
        entries.insert(key, value.clone());
        Instance {
            value,
            is_first_instance: true,
        }
    }

    /// Returns the value stored under `key`.
    pub fn find(&self, key: u64) -> Option<Arc<T>> {
        self.entries().get(&key).cloned()
    }

    /// Returns every stored value.
    pub fn values(&self) -> Vec<Arc<T>> {
        self.entries().values().cloned().collect()
    }

    /// Drops values only the registry still references. Returns how many
    /// were dropped.
    pub fn garbage_collect(&self) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, value| Arc::strong_count(value) > 1);
        before - entries.len()
    }

    /// The number of stored values.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl<T: ?Sized> Default for InstanceRegistry<T> {
    fn default() -> Self {
        Self::new(PerfLog::global())
    }
}

impl<T: ?Sized> fmt::Debug for InstanceRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceRegistry")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_lookup_creates_later_lookups_share() {
        let registry: InstanceRegistry<String> = InstanceRegistry::new(PerfLog::null());

        let first = registry.get_or_insert_with(7, || Arc::new("topology".to_string()));
        let second = registry.get_or_insert_with(7, || unreachable!("value already exists"));

        assert!(first.is_first_instance);
        assert!(!second.is_first_instance);
        assert!(Arc::ptr_eq(&first.value, &second.value));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_garbage_collect_drops_unreferenced_values() {
        let registry: InstanceRegistry<u32> = InstanceRegistry::new(PerfLog::null());
        let kept = registry.get_or_insert_with(1, || Arc::new(1)).value;
        let _ = registry.get_or_insert_with(2, || Arc::new(2));

        assert_eq!(registry.garbage_collect(), 1);
        assert!(registry.find(1).is_some());
        assert!(registry.find(2).is_none());
        drop(kept);
        assert_eq!(registry.garbage_collect(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unsized_values() {
        let registry: InstanceRegistry<[i32]> = InstanceRegistry::new(PerfLog::null());
        let instance = registry.get_or_insert_with(3, || Arc::from(vec![0, 1, 2]));
        assert_eq!(&*instance.value, &[0, 1, 2]);
    }
}
