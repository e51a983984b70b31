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

//! Tracks in-flight loads so concurrent requests for one resource share a single request.

use ambry_core::asset::ResourceHandle;
use std::collections::HashMap;

/// The result of [`LoadRequestDeduplicator::try_begin`].
#[derive(Debug)]
pub enum BeginOutcome {
    /// The caller's handle now owns the key and the caller must submit the request.
    Proceed,
    /// A load is already in flight; share this handle instead of submitting.
    InFlight(ResourceHandle),
}

/// A map from resource key (normalized logical path) to the handle being populated.
///
/// An entry exists from the moment a request is about to be submitted until its
/// response has been installed. At most one entry exists per key.
#[derive(Debug, Default)]
pub struct LoadRequestDeduplicator {
    in_flight: HashMap<String, ResourceHandle>,
}

impl LoadRequestDeduplicator {
    /// Creates an empty deduplicator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handle` as the owner of `key`, unless a load for `key` is already
    /// in flight, in which case that load's handle is returned.
    pub fn try_begin(&mut self, key: &str, handle: &ResourceHandle) -> BeginOutcome {
        if let Some(existing) = self.in_flight.get(key) {
            return BeginOutcome::InFlight(existing.clone());
        }
        self.in_flight.insert(key.to_string(), handle.clone());
        BeginOutcome::Proceed
    }

    /// Releases `key` once its load has resolved, successfully or not.
    pub fn complete(&mut self, key: &str) -> Option<ResourceHandle> {
        self.in_flight.remove(key)
    }

    /// Releases `key` only if `handle` still owns it.
    ///
    /// Returns `false`, leaving the entry in place, when the slot has been
    /// disowned or taken over by a newer load.
    pub fn release(&mut self, key: &str, handle: &ResourceHandle) -> bool {
        if !self.in_flight.get(key).is_some_and(|owner| owner.ptr_eq(handle)) {
            return false;
        }
        self.in_flight.remove(key);
        true
    }

    /// The handle currently in flight for `key`.
    pub fn get(&self, key: &str) -> Option<&ResourceHandle> {
        self.in_flight.get(key)
    }

    /// Number of loads in flight.
    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    /// Returns `true` if nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_caller_shares_the_first_handle() {
        let mut dedup = LoadRequestDeduplicator::new();
        let first = ResourceHandle::unresolved("x.asset", None);
        let second = ResourceHandle::unresolved("x.asset", None);

        assert!(matches!(dedup.try_begin("x.asset", &first), BeginOutcome::Proceed));
        match dedup.try_begin("x.asset", &second) {
            BeginOutcome::InFlight(shared) => assert_eq!(shared, first),
            BeginOutcome::Proceed => panic!("second request should be deduplicated"),
        }
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn distinct_keys_do_not_interfere() {
        let mut dedup = LoadRequestDeduplicator::new();
        let a = ResourceHandle::unresolved("a.asset", None);
        let b = ResourceHandle::unresolved("b.asset", None);
        assert!(matches!(dedup.try_begin("a.asset", &a), BeginOutcome::Proceed));
        assert!(matches!(dedup.try_begin("b.asset", &b), BeginOutcome::Proceed));
        assert_eq!(dedup.len(), 2);
    }

    #[test]
    fn complete_releases_the_slot() {
        let mut dedup = LoadRequestDeduplicator::new();
        let first = ResourceHandle::unresolved("x.asset", None);
        dedup.try_begin("x.asset", &first);

        assert_eq!(dedup.complete("x.asset"), Some(first));
        assert!(dedup.is_empty());
        assert!(dedup.complete("x.asset").is_none());

        let reload = ResourceHandle::unresolved("x.asset", None);
        assert!(matches!(dedup.try_begin("x.asset", &reload), BeginOutcome::Proceed));
        assert_eq!(dedup.get("x.asset"), Some(&reload));
    }

    #[test]
    fn release_leaves_a_newer_owner_in_place() {
        let mut dedup = LoadRequestDeduplicator::new();
        let stale = ResourceHandle::unresolved("x.asset", None);
        dedup.try_begin("x.asset", &stale);
        dedup.complete("x.asset");

        let newer = ResourceHandle::unresolved("x.asset", None);
        dedup.try_begin("x.asset", &newer);

        assert!(!dedup.release("x.asset", &stale));
        assert_eq!(dedup.get("x.asset"), Some(&newer));
        assert!(dedup.release("x.asset", &newer));
        assert!(dedup.is_empty());
    }
}
