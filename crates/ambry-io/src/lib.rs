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

//! # Ambry IO
//!
//! I/O services for the resource system: the persistent UUID/path
//! [`MetadataStore`] and the [`ResourceFile`] envelope that wraps every
//! payload written to disk.

#![warn(missing_docs)]

pub mod metadata_store;
pub mod resource_file;

pub use metadata_store::MetadataStore;
pub use resource_file::ResourceFile;

use ambry_core::ResourceError;
use std::{fs, path::Path};

/// Normalizes a logical path to forward slashes, without leading `./`.
///
/// Logical paths are used as keys by the metadata store and the load pipeline,
/// so `textures\\a.asset`, `./textures/a.asset` and `textures/a.asset` must all
/// name the same resource.
pub fn normalize_path(path: &str) -> String {
    let forward = path.trim().replace('\\', "/");
    let mut trimmed = forward.as_str();
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    trimmed.to_string()
}

/// Writes `bytes` to `path` through a sibling temporary file and a rename, so
/// readers never observe a half-written file. Parent directories are created.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), ResourceError> {
    let display = path.display().to_string();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ResourceError::io(&display, e))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, bytes).map_err(|e| ResourceError::io(&display, e))?;
    fs::rename(&tmp, path).map_err(|e| ResourceError::io(&display, e))
}
