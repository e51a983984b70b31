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

//! A storage for the handles of resources that finished loading.

use ambry_core::asset::ResourceHandle;
use std::collections::HashMap;

/// A central, in-memory cache mapping a resource key to its loaded handle.
///
/// This ensures that any given resource is loaded only once: later requests for
/// the same key receive a clone of the cached handle. Only `Loaded` handles are
/// stored; evicting an entry with [`remove`](Self::remove) makes the next load
/// start a fresh cycle.
#[derive(Debug, Default, Clone)]
pub struct ResourceCache {
    storage: HashMap<String, ResourceHandle>,
}

impl ResourceCache {
    /// Creates a new, empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Caches `handle` under `key`, replacing any previous entry.
    ///
    /// Handles that are not loaded are ignored and `false` is returned.
    pub fn insert(&mut self, key: impl Into<String>, handle: ResourceHandle) -> bool {
        if !handle.is_loaded() {
            return false;
        }
        self.storage.insert(key.into(), handle);
        true
    }

    /// The cached handle for `key`.
    pub fn get(&self, key: &str) -> Option<&ResourceHandle> {
        self.storage.get(key)
    }

    /// Evicts `key`, returning the handle that was cached.
    pub fn remove(&mut self, key: &str) -> Option<ResourceHandle> {
        self.storage.remove(key)
    }

    /// Checks if `key` is cached.
    pub fn contains(&self, key: &str) -> bool {
        self.storage.contains_key(key)
    }

    /// Number of cached handles.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Returns `true` if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}
