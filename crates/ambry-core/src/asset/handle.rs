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

use super::{Resource, ResourceUUID};
use crate::error::ResourceError;
use std::{
    fmt,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

/// The lifecycle of one load attempt behind a [`ResourceHandle`].
///
/// `Unresolved -> Pending -> {Loaded | Failed}`. `Loaded` and `Failed` are terminal:
/// reloading produces a new handle instead of rewinding an old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadState {
    /// Created, but no request has been submitted for it yet.
    Unresolved,
    /// A load request is in flight.
    Pending,
    /// The payload is available.
    Loaded,
    /// The load failed; the error is available through [`ResourceHandle::error`].
    Failed,
}

impl LoadState {
    /// Returns `true` for `Loaded` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, LoadState::Loaded | LoadState::Failed)
    }
}

struct Slot {
    state: LoadState,
    payload: Option<Arc<dyn Resource>>,
    error: Option<ResourceError>,
}

#[derive(Default)]
struct Identity {
    path: Option<String>,
    uuid: Option<ResourceUUID>,
}

struct HandleInner {
    identity: Mutex<Identity>,
    slot: Mutex<Slot>,
    resolved: Condvar,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A thread-safe, reference-counted handle to a resource whose payload may not be
/// available yet.
///
/// Cloning a handle is cheap and every clone refers to the same resource: equality
/// is identity, not payload comparison. The handle returned by an asynchronous load
/// is the very same handle that later receives the payload, so callers can hold on
/// to it immediately and inspect or [`wait`](ResourceHandle::wait) on it later.
#[derive(Clone)]
pub struct ResourceHandle(Arc<HandleInner>);

impl ResourceHandle {
    /// Creates a handle that already holds an in-memory payload.
    ///
    /// The handle has no path or UUID until it is registered with the resource
    /// manager's `create`.
    pub fn new<R: Resource>(resource: R) -> Self {
        Self::from_payload(Arc::new(resource))
    }

    /// Creates an already-loaded handle from a shared payload.
    pub fn from_payload(payload: Arc<dyn Resource>) -> Self {
        Self::with_slot(
            Identity::default(),
            Slot {
                state: LoadState::Loaded,
                payload: Some(payload),
                error: None,
            },
        )
    }

    /// Creates an empty handle for the resource at `path`, in the `Unresolved` state.
    pub fn unresolved(path: impl Into<String>, uuid: Option<ResourceUUID>) -> Self {
        Self::with_slot(
            Identity {
                path: Some(path.into()),
                uuid,
            },
            Slot {
                state: LoadState::Unresolved,
                payload: None,
                error: None,
            },
        )
    }

    /// Creates a handle for `path` that has already failed with `error`.
    pub fn failed(path: impl Into<String>, error: ResourceError) -> Self {
        Self::with_slot(
            Identity {
                path: Some(path.into()),
                uuid: None,
            },
            Slot {
                state: LoadState::Failed,
                payload: None,
                error: Some(error),
            },
        )
    }

    fn with_slot(identity: Identity, slot: Slot) -> Self {
        Self(Arc::new(HandleInner {
            identity: Mutex::new(identity),
            slot: Mutex::new(slot),
            resolved: Condvar::new(),
        }))
    }

    /// The current lifecycle state.
    pub fn state(&self) -> LoadState {
        lock(&self.0.slot).state
    }

    /// Returns `true` while the handle has not reached a terminal state.
    pub fn is_pending(&self) -> bool {
        !self.state().is_terminal()
    }

    /// Returns `true` once the payload is available.
    pub fn is_loaded(&self) -> bool {
        self.state() == LoadState::Loaded
    }

    /// Returns `true` if the load attempt failed.
    pub fn is_failed(&self) -> bool {
        self.state() == LoadState::Failed
    }

    /// Moves the handle from `Unresolved` to `Pending`.
    ///
    /// Returns `false`, leaving the handle untouched, from any other state.
    pub fn mark_pending(&self) -> bool {
        let mut slot = lock(&self.0.slot);
        if slot.state != LoadState::Unresolved {
            return false;
        }
        slot.state = LoadState::Pending;
        true
    }

    /// Completes the load attempt and wakes every thread blocked in [`wait`](Self::wait).
    ///
    /// Only a `Pending` handle can be resolved; the transition happens at most once.
    /// Returns `false` if the handle was not pending.
    pub fn resolve(&self, result: Result<Arc<dyn Resource>, ResourceError>) -> bool {
        let mut slot = lock(&self.0.slot);
        if slot.state != LoadState::Pending {
            log::warn!(
                "Ignoring completion for resource '{}' in state {:?}",
                self.describe(),
                slot.state
            );
            return false;
        }

        match result {
            Ok(payload) => {
                slot.payload = Some(payload);
                slot.state = LoadState::Loaded;
            }
            Err(error) => {
                slot.error = Some(error);
                slot.state = LoadState::Failed;
            }
        }
        drop(slot);

        self.0.resolved.notify_all();
        true
    }

    /// Replaces the payload of a loaded handle with new in-memory data.
    ///
    /// Every holder of the handle observes the new payload. Returns `false` if the
    /// handle is not `Loaded`.
    pub fn replace_payload(&self, payload: Arc<dyn Resource>) -> bool {
        let mut slot = lock(&self.0.slot);
        if slot.state != LoadState::Loaded {
            return false;
        }
        slot.payload = Some(payload);
        true
    }

    /// Blocks the calling thread until the handle reaches a terminal state.
    ///
    /// There is no timeout: a handle that is never submitted is never resolved.
    pub fn wait(&self) -> LoadState {
        let slot = lock(&self.0.slot);
        let slot = self
            .0
            .resolved
            .wait_while(slot, |slot| !slot.state.is_terminal())
            .unwrap_or_else(PoisonError::into_inner);
        slot.state
    }

    /// Like [`wait`](Self::wait), but gives up after `timeout` and returns the
    /// state observed at that point.
    pub fn wait_timeout(&self, timeout: Duration) -> LoadState {
        let slot = lock(&self.0.slot);
        let (slot, _) = self
            .0
            .resolved
            .wait_timeout_while(slot, timeout, |slot| !slot.state.is_terminal())
            .unwrap_or_else(PoisonError::into_inner);
        slot.state
    }

    /// The payload, if the handle is loaded.
    pub fn payload(&self) -> Option<Arc<dyn Resource>> {
        lock(&self.0.slot).payload.clone()
    }

    /// The payload as its concrete type, if loaded and of type `T`.
    pub fn downcast<T: Resource>(&self) -> Option<Arc<T>> {
        self.payload()?.into_any().downcast::<T>().ok()
    }

    /// The error of a failed load.
    pub fn error(&self) -> Option<ResourceError> {
        lock(&self.0.slot).error.clone()
    }

    /// The logical path, if the handle has one.
    pub fn path(&self) -> Option<String> {
        lock(&self.0.identity).path.clone()
    }

    /// The UUID, if the handle is backed by a metadata record.
    pub fn uuid(&self) -> Option<ResourceUUID> {
        lock(&self.0.identity).uuid
    }

    /// Associates the handle with a registered identity.
    ///
    /// Called by the resource manager when the resource is created at `path`.
    pub fn bind(&self, uuid: ResourceUUID, path: impl Into<String>) {
        let mut identity = lock(&self.0.identity);
        identity.uuid = Some(uuid);
        identity.path = Some(path.into());
    }

    /// Returns `true` if both handles refer to the same resource.
    pub fn ptr_eq(&self, other: &ResourceHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn describe(&self) -> String {
        self.path().unwrap_or_else(|| "<unnamed>".to_string())
    }
}

impl PartialEq for ResourceHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ResourceHandle {}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (path, uuid) = {
            let identity = lock(&self.0.identity);
            (identity.path.clone(), identity.uuid)
        };
        let slot = lock(&self.0.slot);
        f.debug_struct("ResourceHandle")
            .field("path", &path)
            .field("uuid", &uuid)
            .field("state", &slot.state)
            .field("type_tag", &slot.payload.as_ref().map(|p| p.type_tag()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Serializable;
    use crate::error::SerializationError;
    use std::thread;

    #[derive(Debug, PartialEq)]
    struct Blob(Vec<u8>);

    impl Serializable for Blob {
        const TYPE_TAG: &'static str = "blob";

        fn encode(&self) -> Result<Vec<u8>, SerializationError> {
            Ok(self.0.clone())
        }

        fn decode(bytes: &[u8]) -> Result<Self, SerializationError> {
            Ok(Blob(bytes.to_vec()))
        }
    }

    #[test]
    fn in_memory_handle_is_loaded() {
        let handle = ResourceHandle::new(Blob(vec![1, 2, 3]));
        assert_eq!(handle.state(), LoadState::Loaded);
        assert_eq!(handle.downcast::<Blob>().unwrap().0, vec![1, 2, 3]);
        assert!(handle.path().is_none());
        assert!(handle.uuid().is_none());
    }

    #[test]
    fn lifecycle_moves_forward_only() {
        let handle = ResourceHandle::unresolved("a.asset", None);
        assert_eq!(handle.state(), LoadState::Unresolved);

        assert!(handle.mark_pending());
        assert!(!handle.mark_pending());
        assert_eq!(handle.state(), LoadState::Pending);

        assert!(handle.resolve(Ok(Arc::new(Blob(vec![7])))));
        assert_eq!(handle.state(), LoadState::Loaded);

        // A second completion is ignored, the handle never goes back.
        assert!(!handle.resolve(Err(ResourceError::not_found("a.asset"))));
        assert!(!handle.mark_pending());
        assert_eq!(handle.state(), LoadState::Loaded);
        assert!(handle.error().is_none());
    }

    #[test]
    fn unresolved_handle_cannot_be_resolved() {
        let handle = ResourceHandle::unresolved("a.asset", None);
        assert!(!handle.resolve(Ok(Arc::new(Blob(vec![])))));
        assert_eq!(handle.state(), LoadState::Unresolved);
    }

    #[test]
    fn failed_handle_exposes_error_and_no_payload() {
        let handle = ResourceHandle::unresolved("missing.asset", None);
        handle.mark_pending();
        handle.resolve(Err(ResourceError::not_found("missing.asset")));

        assert!(handle.is_failed());
        assert!(!handle.is_loaded());
        assert!(handle.payload().is_none());
        assert!(handle.error().unwrap().is_not_found());
    }

    #[test]
    fn failed_constructor_is_terminal() {
        let handle = ResourceHandle::failed(
            "",
            ResourceError::InvalidPath {
                path: String::new(),
            },
        );
        assert_eq!(handle.wait(), LoadState::Failed);
        assert!(!handle.mark_pending());
        assert!(matches!(
            handle.error(),
            Some(ResourceError::InvalidPath { .. })
        ));
    }

    #[test]
    fn clones_share_identity() {
        let a = ResourceHandle::unresolved("a.asset", None);
        let b = a.clone();
        let other = ResourceHandle::unresolved("a.asset", None);
        assert_eq!(a, b);
        assert_ne!(a, other);

        let uuid = ResourceUUID::new();
        a.bind(uuid, "b.asset");
        assert_eq!(b.uuid(), Some(uuid));
        assert_eq!(b.path().as_deref(), Some("b.asset"));
    }

    #[test]
    fn downcast_to_wrong_type_is_none() {
        #[derive(Debug)]
        struct Other;
        impl Serializable for Other {
            const TYPE_TAG: &'static str = "other";
            fn encode(&self) -> Result<Vec<u8>, SerializationError> {
                Ok(Vec::new())
            }
            fn decode(_: &[u8]) -> Result<Self, SerializationError> {
                Ok(Other)
            }
        }

        let handle = ResourceHandle::new(Blob(vec![]));
        assert!(handle.downcast::<Other>().is_none());
    }

    #[test]
    fn wait_wakes_when_resolved_from_another_thread() {
        let handle = ResourceHandle::unresolved("a.asset", None);
        handle.mark_pending();

        let remote = handle.clone();
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.resolve(Ok(Arc::new(Blob(vec![42]))));
        });

        assert_eq!(handle.wait(), LoadState::Loaded);
        worker.join().expect("Thread join failed");
        assert_eq!(handle.downcast::<Blob>().unwrap().0, vec![42]);
    }

    #[test]
    fn wait_timeout_returns_current_state() {
        let handle = ResourceHandle::unresolved("a.asset", None);
        handle.mark_pending();
        assert_eq!(
            handle.wait_timeout(Duration::from_millis(10)),
            LoadState::Pending
        );
    }

    #[test]
    fn replace_payload_only_on_loaded_handles() {
        let pending = ResourceHandle::unresolved("a.asset", None);
        assert!(!pending.replace_payload(Arc::new(Blob(vec![1]))));

        let loaded = ResourceHandle::new(Blob(vec![1]));
        assert!(loaded.replace_payload(Arc::new(Blob(vec![2]))));
        assert_eq!(loaded.downcast::<Blob>().unwrap().0, vec![2]);
    }
}
