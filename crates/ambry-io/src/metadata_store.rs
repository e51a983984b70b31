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

//! Persistent mapping between resource UUIDs and logical paths.
//!
//! Each registered resource owns one record file, `<uuid>.meta`, inside the
//! metadata directory. The in-memory indices are rebuilt from those files by
//! [`MetadataStore::load`], and every mutation writes (or deletes) the affected
//! record before the in-memory indices change, so the directory never lags
//! behind what the store reports.

use crate::{normalize_path, write_atomically};
use ambry_core::asset::{ResourceMetadata, ResourceUUID, Serializable};
use ambry_core::ResourceError;
use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

/// File extension of metadata records.
pub const RECORD_EXTENSION: &str = "meta";

/// The UUID <-> path index backing the resource manager.
///
/// The store performs no locking of its own; it is owned by the resource
/// manager and only mutated from the owner thread.
#[derive(Debug)]
pub struct MetadataStore {
    directory: PathBuf,
    by_uuid: HashMap<ResourceUUID, ResourceMetadata>,
    by_path: HashMap<String, ResourceUUID>,
}

impl MetadataStore {
    /// Opens the store rooted at `directory`, creating the directory if it does
    /// not exist, and loads every record found in it.
    ///
    /// # Errors
    /// Fails only if the directory cannot be created or listed. Individual
    /// unreadable records are skipped, see [`load`](Self::load).
    pub fn open(directory: impl Into<PathBuf>) -> Result<Self, ResourceError> {
        let directory = directory.into();
        fs::create_dir_all(&directory)
            .map_err(|e| ResourceError::io(directory.display().to_string(), e))?;

        let mut store = Self {
            directory,
            by_uuid: HashMap::new(),
            by_path: HashMap::new(),
        };
        store.load()?;
        Ok(store)
    }

    /// Rebuilds the indices from the records in the metadata directory.
    ///
    /// Records that cannot be read or decoded, or that collide with a record
    /// already loaded, are logged and skipped. Returns the number of records loaded.
    pub fn load(&mut self) -> Result<usize, ResourceError> {
        self.by_uuid.clear();
        self.by_path.clear();

        let entries = fs::read_dir(&self.directory)
            .map_err(|e| ResourceError::io(self.directory.display().to_string(), e))?;

        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    log::warn!("Skipping unreadable entry in metadata directory: {e}");
                    continue;
                }
            };
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }

            match Self::read_record(&path) {
                Ok(record) => self.index_loaded(record, &path),
                Err(e) => log::warn!("Skipping metadata record: {e}"),
            }
        }

        log::info!(
            "Loaded {} resource metadata record(s) from '{}'.",
            self.by_uuid.len(),
            self.directory.display()
        );
        Ok(self.by_uuid.len())
    }

    fn read_record(path: &Path) -> Result<ResourceMetadata, ResourceError> {
        let display = path.display().to_string();
        let bytes = fs::read(path).map_err(|e| ResourceError::io(&display, e))?;
        let mut record =
            ResourceMetadata::decode(&bytes).map_err(|e| ResourceError::corrupt(&display, e))?;
        record.path = normalize_path(&record.path);
        if record.path.is_empty() {
            return Err(ResourceError::corrupt(display, "record has an empty path"));
        }
        Ok(record)
    }

    fn index_loaded(&mut self, record: ResourceMetadata, file: &Path) {
        if self.by_uuid.contains_key(&record.uuid) {
            log::warn!(
                "Skipping metadata record '{}': duplicate uuid {}",
                file.display(),
                record.uuid
            );
            return;
        }
        if let Some(owner) = self.by_path.get(&record.path) {
            log::warn!(
                "Skipping metadata record '{}': path '{}' already belongs to {}",
                file.display(),
                record.path,
                owner
            );
            return;
        }
        self.insert(record);
    }

    fn insert(&mut self, record: ResourceMetadata) {
        self.by_path.insert(record.path.clone(), record.uuid);
        self.by_uuid.insert(record.uuid, record);
    }

    fn record_path(&self, uuid: &ResourceUUID) -> PathBuf {
        self.directory.join(format!("{uuid}.{RECORD_EXTENSION}"))
    }

    fn persist(&self, record: &ResourceMetadata) -> Result<(), ResourceError> {
        let file = self.record_path(&record.uuid);
        let bytes = record
            .encode()
            .map_err(|e| ResourceError::corrupt(file.display().to_string(), e))?;
        write_atomically(&file, &bytes)
    }

    /// Registers a new `uuid -> path` record and persists it.
    ///
    /// # Errors
    /// [`ResourceError::AlreadyExists`] if either the UUID or the path is taken.
    pub fn create(&mut self, uuid: ResourceUUID, path: &str) -> Result<(), ResourceError> {
        let path = normalize_path(path);
        if self.by_uuid.contains_key(&uuid) {
            return Err(ResourceError::already_exists(uuid));
        }
        if self.by_path.contains_key(&path) {
            return Err(ResourceError::already_exists(path));
        }

        let record = ResourceMetadata::new(uuid, path);
        self.persist(&record)?;
        log::debug!("Registered resource {} at '{}'", record.uuid, record.path);
        self.insert(record);
        Ok(())
    }

    /// Moves an existing record to `new_path` and persists it.
    ///
    /// # Errors
    /// [`ResourceError::NotFound`] if the UUID is unknown, and
    /// [`ResourceError::AlreadyExists`] if `new_path` belongs to another UUID.
    pub fn update(&mut self, uuid: ResourceUUID, new_path: &str) -> Result<(), ResourceError> {
        let new_path = normalize_path(new_path);
        let current = self
            .by_uuid
            .get(&uuid)
            .ok_or_else(|| ResourceError::not_found(uuid))?;
        if current.path == new_path {
            return Ok(());
        }
        if self.by_path.contains_key(&new_path) {
            return Err(ResourceError::already_exists(new_path));
        }

        let record = ResourceMetadata::new(uuid, new_path);
        self.persist(&record)?;

        if let Some(old) = self.by_uuid.insert(uuid, record.clone()) {
            self.by_path.remove(&old.path);
            log::debug!("Moved resource {} from '{}' to '{}'", uuid, old.path, record.path);
        }
        self.by_path.insert(record.path, uuid);
        Ok(())
    }

    /// Deletes the record for `uuid`.
    ///
    /// Removing an unknown UUID, or removing the same UUID twice, succeeds
    /// without doing anything.
    pub fn remove(&mut self, uuid: ResourceUUID) -> Result<(), ResourceError> {
        if !self.by_uuid.contains_key(&uuid) {
            return Ok(());
        }

        let file = self.record_path(&uuid);
        match fs::remove_file(&file) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(ResourceError::io(file.display().to_string(), e)),
        }

        if let Some(record) = self.by_uuid.remove(&uuid) {
            self.by_path.remove(&record.path);
            log::debug!("Removed resource {} ('{}')", uuid, record.path);
        }
        Ok(())
    }

    /// Returns `true` if `uuid` is registered.
    pub fn exists_by_uuid(&self, uuid: &ResourceUUID) -> bool {
        self.by_uuid.contains_key(uuid)
    }

    /// Returns `true` if `path` is registered.
    pub fn exists_by_path(&self, path: &str) -> bool {
        self.by_path.contains_key(&normalize_path(path))
    }

    /// The logical path registered for `uuid`.
    pub fn path_of(&self, uuid: &ResourceUUID) -> Result<&str, ResourceError> {
        self.by_uuid
            .get(uuid)
            .map(|record| record.path.as_str())
            .ok_or_else(|| ResourceError::not_found(uuid))
    }

    /// The UUID registered at `path`.
    pub fn uuid_of(&self, path: &str) -> Result<ResourceUUID, ResourceError> {
        let path = normalize_path(path);
        self.by_path
            .get(&path)
            .copied()
            .ok_or_else(|| ResourceError::not_found(path))
    }

    /// Iterates over every record, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &ResourceMetadata> {
        self.by_uuid.values()
    }

    /// Number of registered records.
    pub fn len(&self) -> usize {
        self.by_uuid.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.by_uuid.is_empty()
    }

    /// The directory holding the records.
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}
