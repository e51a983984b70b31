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

//! Configuration of the resource manager.

use ambry_core::ResourceError;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Configuration for the [`ResourceManager`](super::ResourceManager).
///
/// Missing fields fall back to their defaults when deserialized, so a RON file
/// only needs to name what it changes:
///
/// ```text
/// (
///     metadata_dir: "project/metadata",
///     asset_root: Some("project/assets"),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceManagerConfig {
    /// Directory holding one metadata record per registered resource.
    /// Created if it does not exist.
    pub metadata_dir: PathBuf,
    /// Directory logical paths are resolved against. When `None`, logical paths
    /// are used as file-system paths as they are.
    pub asset_root: Option<PathBuf>,
    /// Name of the work-queue channel the load pipeline registers on.
    pub channel_name: String,
}

impl Default for ResourceManagerConfig {
    fn default() -> Self {
        Self {
            metadata_dir: PathBuf::from("metadata"),
            asset_root: None,
            channel_name: "resources".to_string(),
        }
    }
}

impl ResourceManagerConfig {
    /// Creates a configuration with the given metadata directory and defaults elsewhere.
    pub fn new(metadata_dir: impl Into<PathBuf>) -> Self {
        Self {
            metadata_dir: metadata_dir.into(),
            ..Self::default()
        }
    }

    /// Sets the directory logical paths are resolved against.
    pub fn with_asset_root(mut self, asset_root: impl Into<PathBuf>) -> Self {
        self.asset_root = Some(asset_root.into());
        self
    }

    /// Parses a configuration from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self, ResourceError> {
        ron::from_str(text).map_err(|e| ResourceError::corrupt("<config>", e))
    }

    /// Reads a configuration from a RON file.
    pub fn from_ron_file(path: impl AsRef<Path>) -> Result<Self, ResourceError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|e| ResourceError::io(&display, e))?;
        ron::from_str(&text).map_err(|e| ResourceError::corrupt(display, e))
    }

    /// The file-system path of the resource at logical path `key`.
    pub fn resolve(&self, key: &str) -> PathBuf {
        match &self.asset_root {
            Some(root) => root.join(key),
            None => PathBuf::from(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_ron_uses_defaults() {
        let config =
            ResourceManagerConfig::from_ron_str(r#"(metadata_dir: "meta", asset_root: Some("assets"))"#)
                .unwrap();
        assert_eq!(config.metadata_dir, PathBuf::from("meta"));
        assert_eq!(config.asset_root, Some(PathBuf::from("assets")));
        assert_eq!(config.channel_name, "resources");
    }

    #[test]
    fn malformed_ron_is_rejected() {
        assert!(matches!(
            ResourceManagerConfig::from_ron_str("(metadata_dir: "),
            Err(ResourceError::DataCorruption { .. })
        ));
    }

    #[test]
    fn resolve_joins_the_asset_root() {
        let plain = ResourceManagerConfig::default();
        assert_eq!(plain.resolve("a/b.asset"), PathBuf::from("a/b.asset"));

        let rooted = ResourceManagerConfig::default().with_asset_root("assets");
        assert_eq!(rooted.resolve("a/b.asset"), PathBuf::from("assets/a/b.asset"));
    }
}
