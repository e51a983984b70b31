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

//! The public facade of the resource system.

use super::{
    config::ResourceManagerConfig,
    decoders::DecoderRegistry,
    dedup::BeginOutcome,
    pipeline::{is_well_formed_key, AsyncLoadPipeline},
};
use ambry_core::asset::{Resource, ResourceHandle, ResourceUUID};
use ambry_core::work_queue::WorkQueue;
use ambry_core::ResourceError;
use ambry_io::{normalize_path, MetadataStore, ResourceFile};
use std::{
    sync::Arc,
    thread::{self, ThreadId},
};

/// Loads, registers, and saves resources.
///
/// The manager is built once by the application's composition root and passed
/// to whatever needs it. The thread that constructs it is its owner: only that
/// thread installs completed loads, through
/// [`process_responses`](Self::process_responses) or a blocking
/// [`load`](Self::load). Other threads may share the manager and call `load`
/// or `load_async`; they wait on their handle while the owner pumps.
pub struct ResourceManager {
    config: ResourceManagerConfig,
    metadata: MetadataStore,
    pipeline: AsyncLoadPipeline,
    owner: ThreadId,
}

impl ResourceManager {
    /// Opens the metadata store and registers the load pipeline on `queue`.
    ///
    /// # Errors
    /// Fails if the metadata directory cannot be created or listed.
    pub fn new(
        config: ResourceManagerConfig,
        queue: Arc<dyn WorkQueue>,
        decoders: DecoderRegistry,
    ) -> Result<Self, ResourceError> {
        let metadata = MetadataStore::open(&config.metadata_dir)?;
        let pipeline = AsyncLoadPipeline::new(queue, &config.channel_name, decoders)?;
        log::info!(
            "ResourceManager ready: {} registered resource(s), channel '{}'.",
            metadata.len(),
            config.channel_name
        );

        Ok(Self {
            config,
            metadata,
            pipeline,
            owner: thread::current().id(),
        })
    }

    fn on_owner_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Loads the resource at `path` and blocks until it is available.
    ///
    /// The path is looked up in the metadata store first; if it has no record the
    /// file is loaded as a temporary resource, which behaves the same but has no
    /// UUID and cannot be saved.
    ///
    /// On the owner thread this installs responses until the handle resolves.
    /// On any other thread it blocks on the handle itself, which stays pending
    /// until the owner thread processes the response.
    ///
    /// Returns `None` if the resource cannot be loaded. A missing resource is an
    /// ordinary outcome, not an error.
    pub fn load(&self, path: &str) -> Option<ResourceHandle> {
        let handle = self.load_async(path);

        if self.on_owner_thread() {
            while handle.is_pending() {
                if !self.pipeline.wait_for_response() {
                    log::error!("Work queue shut down while loading '{path}'.");
                    return None;
                }
            }
        } else {
            handle.wait();
        }

        if handle.is_loaded() {
            Some(handle)
        } else {
            log::debug!(
                "Load of '{}' failed: {}",
                path,
                handle
                    .error()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown error".to_string())
            );
            None
        }
    }

    /// Starts loading the resource at `path` and returns its handle immediately.
    ///
    /// A cached resource is returned as is, and a load already in flight for the
    /// same path is shared rather than queued twice. Otherwise a new `Pending`
    /// handle is returned and filled in once the owner thread processes the
    /// response.
    ///
    /// An empty path, or one containing a NUL byte, yields a handle that has
    /// already failed with [`ResourceError::InvalidPath`].
    pub fn load_async(&self, path: &str) -> ResourceHandle {
        let key = normalize_path(path);
        if !is_well_formed_key(&key) {
            log::debug!("Rejecting malformed resource path {path:?}.");
            return ResourceHandle::failed(
                key,
                ResourceError::InvalidPath {
                    path: path.to_string(),
                },
            );
        }

        let uuid = self.metadata.uuid_of(&key).ok();
        if uuid.is_none() {
            log::trace!("'{key}' has no metadata, loading it as a temporary resource.");
        }

        let handle = {
            let mut tracker = self.pipeline.tracker();
            if let Some(cached) = tracker.cache.get(&key) {
                return cached.clone();
            }

            let handle = ResourceHandle::unresolved(key.clone(), uuid);
            match tracker.in_flight.try_begin(&key, &handle) {
                BeginOutcome::Proceed => handle,
                BeginOutcome::InFlight(existing) => {
                    log::debug!("Sharing in-flight load of '{key}'.");
                    return existing;
                }
            }
        };

        let file_path = self.config.resolve(&key);
        // On failure the handle is already marked failed; callers observe it there.
        let _ = self.pipeline.submit(key, file_path, handle.clone());
        handle
    }

    /// Loads the resource registered under `uuid` and blocks until it is available.
    ///
    /// Returns `None` if the UUID is not registered or the load fails.
    pub fn load_from_uuid(&self, uuid: &ResourceUUID) -> Option<ResourceHandle> {
        match self.metadata.path_of(uuid) {
            Ok(path) => self.load(path),
            Err(e) => {
                log::debug!("Cannot load by uuid: {e}");
                None
            }
        }
    }

    /// Writes the handle's current in-memory payload to its registered path.
    ///
    /// # Errors
    /// - [`ResourceError::NotRegistered`] if the handle was never passed through
    ///   [`create`](Self::create), or its record has since been removed.
    /// - [`ResourceError::NotLoaded`] if the handle has no payload.
    /// - [`ResourceError::DataCorruption`] if the payload cannot be encoded.
    /// - [`ResourceError::Io`] if the file cannot be written.
    pub fn save(&self, handle: &ResourceHandle) -> Result<(), ResourceError> {
        let not_registered = || ResourceError::NotRegistered {
            path: handle.path().unwrap_or_else(|| "<unnamed>".to_string()),
        };

        let uuid = handle.uuid().ok_or_else(not_registered)?;
        let path = self
            .metadata
            .path_of(&uuid)
            .map_err(|_| not_registered())?;
        let payload = handle.payload().ok_or_else(|| ResourceError::NotLoaded {
            path: path.to_string(),
        })?;

        self.write_payload(path, &*payload)?;
        log::debug!("Saved resource {uuid} to '{path}'.");
        Ok(())
    }

    fn write_payload(&self, key: &str, payload: &dyn Resource) -> Result<(), ResourceError> {
        let file =
            ResourceFile::from_resource(payload).map_err(|e| ResourceError::corrupt(key, e))?;
        file.write(&self.config.resolve(key))
    }

    /// Registers `handle` at `path` and saves it there.
    ///
    /// A handle without a UUID gets a new one. If the handle is already registered
    /// elsewhere, its record is moved to `path`. The payload is written before any
    /// metadata changes, so a failed write leaves the store as it was.
    ///
    /// Loads of `path` still in flight are disowned: they resolve their own
    /// handles but never replace `handle` in the cache.
    ///
    /// # Errors
    /// - [`ResourceError::InvalidPath`] if `path` is empty or contains a NUL byte.
    /// - [`ResourceError::NotLoaded`] if the handle has no payload to save.
    /// - [`ResourceError::AlreadyExists`] if `path` is registered and `overwrite`
    ///   is `false`. With `overwrite`, the previous record at `path` is replaced.
    /// - [`ResourceError::DataCorruption`] or [`ResourceError::Io`] if the payload
    ///   or its metadata record cannot be written.
    pub fn create(
        &mut self,
        handle: &ResourceHandle,
        path: &str,
        overwrite: bool,
    ) -> Result<(), ResourceError> {
        let key = normalize_path(path);
        if !is_well_formed_key(&key) {
            return Err(ResourceError::InvalidPath {
                path: path.to_string(),
            });
        }
        let payload = handle
            .payload()
            .ok_or_else(|| ResourceError::NotLoaded { path: key.clone() })?;

        let uuid = handle.uuid().unwrap_or_default();
        let replaced = match self.metadata.uuid_of(&key) {
            Ok(_) if !overwrite => return Err(ResourceError::already_exists(key)),
            Ok(existing) if existing != uuid => Some(existing),
            _ => None,
        };
        let old_path = self.metadata.path_of(&uuid).ok().map(str::to_string);

        self.write_payload(&key, &*payload)?;
        self.register(uuid, &key, replaced, old_path.is_some())?;
        handle.bind(uuid, key.clone());
        log::debug!("Created resource {uuid} at '{key}'.");

        let mut tracker = self.pipeline.tracker();
        if let Some(old_path) = old_path.as_deref().filter(|old| *old != key) {
            tracker.cache.remove(old_path);
            tracker.in_flight.complete(old_path);
        }
        tracker.in_flight.complete(&key);
        tracker.cache.insert(key, handle.clone());
        Ok(())
    }

    /// Points `key` at `uuid`, replacing the record of `replaced` if given.
    ///
    /// If the new record cannot be written, the replaced record is restored.
    fn register(
        &mut self,
        uuid: ResourceUUID,
        key: &str,
        replaced: Option<ResourceUUID>,
        moving: bool,
    ) -> Result<(), ResourceError> {
        if let Some(previous) = replaced {
            log::debug!("Overwriting resource {previous} at '{key}'.");
            self.metadata.remove(previous)?;
        }

        let registered = if moving {
            self.metadata.update(uuid, key)
        } else {
            self.metadata.create(uuid, key)
        };

        if let (Err(_), Some(previous)) = (&registered, replaced) {
            if let Err(e) = self.metadata.create(previous, key) {
                log::error!("Could not restore resource {previous} at '{key}': {e}");
            }
        }
        registered
    }

    /// Evicts the cached handle for `path`, so the next load reads it again.
    ///
    /// Existing holders keep their handle; it is simply no longer shared with
    /// future loads.
    pub fn unload(&self, path: &str) -> Option<ResourceHandle> {
        self.pipeline.tracker().cache.remove(&normalize_path(path))
    }

    /// Installs every completed load. Hosts call this once per frame.
    ///
    /// Only the owner thread installs responses; calls from any other thread
    /// do nothing and return zero.
    pub fn process_responses(&self) -> usize {
        if !self.on_owner_thread() {
            log::warn!("process_responses called off the owner thread; ignored.");
            return 0;
        }
        self.pipeline.process_responses()
    }

    /// The UUID registered at `path`.
    pub fn uuid_of(&self, path: &str) -> Result<ResourceUUID, ResourceError> {
        self.metadata.uuid_of(path)
    }

    /// The path registered for `uuid`.
    pub fn path_of(&self, uuid: &ResourceUUID) -> Result<&str, ResourceError> {
        self.metadata.path_of(uuid)
    }

    /// Returns `true` if `path` has a metadata record.
    pub fn is_registered(&self, path: &str) -> bool {
        self.metadata.exists_by_path(path)
    }

    /// Number of loads currently in flight.
    pub fn in_flight(&self) -> usize {
        self.pipeline.tracker().in_flight.len()
    }

    /// Read access to the metadata store.
    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// The configuration the manager was built with.
    pub fn config(&self) -> &ResourceManagerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambry_core::asset::Serializable;
    use ambry_core::SerializationError;
    use ambry_infra::{ThreadPoolWorkQueue, WorkQueueConfig};
    use std::{fs, path::Path, thread};
    use tempfile::{tempdir, TempDir};

    #[derive(Debug, PartialEq)]
    struct Score(u64);

    impl Serializable for Score {
        const TYPE_TAG: &'static str = "score";

        fn encode(&self) -> Result<Vec<u8>, SerializationError> {
            Ok(self.0.to_le_bytes().to_vec())
        }

        fn decode(bytes: &[u8]) -> Result<Self, SerializationError> {
            let bytes: [u8; 8] = bytes
                .try_into()
                .map_err(|_| SerializationError::new("expected 8 bytes"))?;
            Ok(Score(u64::from_le_bytes(bytes)))
        }
    }

    struct Fixture {
        dir: TempDir,
        queue: Arc<ThreadPoolWorkQueue>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: tempdir().unwrap(),
                queue: Arc::new(ThreadPoolWorkQueue::new(WorkQueueConfig {
                    name: "manager-test".to_string(),
                    worker_threads: 2,
                })),
            }
        }

        fn manager(&self) -> ResourceManager {
            self.manager_with_root(&self.dir.path().join("assets"))
        }

        fn manager_with_root(&self, asset_root: &Path) -> ResourceManager {
            let config = ResourceManagerConfig::new(self.dir.path().join("metadata"))
                .with_asset_root(asset_root);
            let mut decoders = DecoderRegistry::new();
            decoders.register::<Score>();
            ResourceManager::new(config, self.queue.clone(), decoders).unwrap()
        }
    }

    #[test]
    fn create_then_load_returns_the_cached_handle() {
        let fixture = Fixture::new();
        let mut manager = fixture.manager();
        let handle = ResourceHandle::new(Score(10));
        manager.create(&handle, "scores/a.asset", false).unwrap();

        assert!(handle.uuid().is_some());
        assert_eq!(handle.path().as_deref(), Some("scores/a.asset"));
        let loaded = manager.load("scores/a.asset").unwrap();
        assert_eq!(loaded, handle);
    }

    #[test]
    fn unload_forces_a_fresh_load_from_disk() {
        let fixture = Fixture::new();
        let mut manager = fixture.manager();
        let handle = ResourceHandle::new(Score(10));
        manager.create(&handle, "a.asset", false).unwrap();

        assert_eq!(manager.unload("a.asset"), Some(handle.clone()));
        let reloaded = manager.load("a.asset").unwrap();
        assert_ne!(reloaded, handle);
        assert_eq!(*reloaded.downcast::<Score>().unwrap(), Score(10));
        assert_eq!(reloaded.uuid(), handle.uuid());
    }

    #[test]
    fn create_rejects_empty_path_and_unloaded_handles() {
        let fixture = Fixture::new();
        let mut manager = fixture.manager();

        assert!(matches!(
            manager.create(&ResourceHandle::new(Score(1)), "  ", false),
            Err(ResourceError::InvalidPath { .. })
        ));
        assert!(matches!(
            manager.create(&ResourceHandle::unresolved("x.asset", None), "x.asset", false),
            Err(ResourceError::NotLoaded { .. })
        ));
        assert!(manager.metadata().is_empty());
    }

    #[test]
    fn create_moves_an_already_registered_handle() {
        let fixture = Fixture::new();
        let mut manager = fixture.manager();
        let handle = ResourceHandle::new(Score(3));
        manager.create(&handle, "old.asset", false).unwrap();
        let uuid = handle.uuid().unwrap();

        manager.create(&handle, "new.asset", false).unwrap();
        assert_eq!(handle.uuid(), Some(uuid));
        assert_eq!(manager.path_of(&uuid).unwrap(), "new.asset");
        assert!(!manager.is_registered("old.asset"));
    }

    #[test]
    fn save_writes_current_in_memory_payload() {
        let fixture = Fixture::new();
        let mut manager = fixture.manager();
        let handle = ResourceHandle::new(Score(1));
        manager.create(&handle, "a.asset", false).unwrap();

        assert!(handle.replace_payload(Arc::new(Score(2))));
        manager.save(&handle).unwrap();

        manager.unload("a.asset");
        let reloaded = manager.load("a.asset").unwrap();
        assert_eq!(*reloaded.downcast::<Score>().unwrap(), Score(2));
    }

    #[test]
    fn process_responses_installs_async_loads() {
        let fixture = Fixture::new();
        let mut manager = fixture.manager();
        manager
            .create(&ResourceHandle::new(Score(5)), "a.asset", false)
            .unwrap();
        manager.unload("a.asset");

        let handle = manager.load_async("a.asset");
        assert_eq!(manager.in_flight(), 1);
        while handle.is_pending() {
            manager.process_responses();
            std::thread::yield_now();
        }
        assert!(handle.is_loaded());
        assert_eq!(manager.in_flight(), 0);
    }

    #[test]
    fn create_disowns_an_in_flight_load_of_the_same_path() {
        let fixture = Fixture::new();
        let mut manager = fixture.manager();
        manager
            .create(&ResourceHandle::new(Score(1)), "a.asset", false)
            .unwrap();
        manager.unload("a.asset");

        let stale = manager.load_async("a.asset");
        let replacement = ResourceHandle::new(Score(2));
        manager.create(&replacement, "a.asset", true).unwrap();
        assert_eq!(manager.in_flight(), 0);

        while stale.is_pending() {
            manager.process_responses();
            thread::yield_now();
        }

        let current = manager.load("a.asset").unwrap();
        assert_eq!(current, replacement);
        manager.save(&current).unwrap();
    }

    #[test]
    fn failed_payload_write_leaves_metadata_untouched() {
        let fixture = Fixture::new();
        let original = {
            let mut manager = fixture.manager();
            let handle = ResourceHandle::new(Score(1));
            manager.create(&handle, "a.asset", false).unwrap();
            handle.uuid().unwrap()
        };

        // A plain file where the asset root should be makes every write fail.
        let blocked = fixture.dir.path().join("blocked");
        fs::write(&blocked, b"").unwrap();
        let mut manager = fixture.manager_with_root(&blocked);

        let replacement = ResourceHandle::new(Score(2));
        assert!(matches!(
            manager.create(&replacement, "a.asset", true),
            Err(ResourceError::Io { .. })
        ));
        assert_eq!(manager.uuid_of("a.asset").unwrap(), original);
        assert!(replacement.uuid().is_none());

        assert!(manager
            .create(&ResourceHandle::new(Score(3)), "b.asset", false)
            .is_err());
        assert!(!manager.is_registered("b.asset"));
        assert_eq!(manager.metadata().len(), 1);
    }

    #[test]
    fn malformed_paths_fail_without_queueing() {
        let fixture = Fixture::new();
        let manager = fixture.manager();

        let handle = manager.load_async("  ");
        assert!(handle.is_failed());
        assert!(matches!(
            handle.error(),
            Some(ResourceError::InvalidPath { .. })
        ));
        assert_eq!(manager.in_flight(), 0);
        assert!(manager.load("bad\0name.asset").is_none());
        assert_eq!(manager.process_responses(), 0);
    }

    #[test]
    fn only_the_owner_thread_processes_responses() {
        let fixture = Fixture::new();
        let manager = Arc::new(fixture.manager());

        let remote = Arc::clone(&manager);
        let processed = thread::spawn(move || remote.process_responses())
            .join()
            .unwrap();
        assert_eq!(processed, 0);
    }
}
