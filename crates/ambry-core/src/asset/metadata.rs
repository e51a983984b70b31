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

use super::{ResourceUUID, Serializable};
use crate::error::SerializationError;
use serde::{Deserialize, Serialize};

/// The persisted record linking a resource's stable identity to its logical path.
///
/// One record exists per registered resource. Temporary resources (loaded from a
/// path that has no record) never get one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    /// The unique, stable identifier for this resource.
    pub uuid: ResourceUUID,

    /// The logical, engine-relative path of the resource's payload file,
    /// always using forward slashes.
    pub path: String,
}

impl ResourceMetadata {
    /// Creates a new record.
    pub fn new(uuid: ResourceUUID, path: impl Into<String>) -> Self {
        Self {
            uuid,
            path: path.into(),
        }
    }
}

impl Serializable for ResourceMetadata {
    const TYPE_TAG: &'static str = "resource_metadata";

    fn encode(&self) -> Result<Vec<u8>, SerializationError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map(String::into_bytes)
            .map_err(|e| SerializationError::new(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<Self, SerializationError> {
        ron::de::from_bytes(bytes).map_err(|e| SerializationError::new(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_survives_encode_and_decode() {
        let meta = ResourceMetadata::new(ResourceUUID::new(), "meshes/crate.asset");
        let bytes = meta.encode().unwrap();
        assert_eq!(ResourceMetadata::decode(&bytes).unwrap(), meta);
    }

    #[test]
    fn encoded_record_is_human_readable() {
        let uuid = ResourceUUID::new();
        let meta = ResourceMetadata::new(uuid, "a.asset");
        let text = String::from_utf8(meta.encode().unwrap()).unwrap();
        assert!(text.contains(&uuid.to_string()));
        assert!(text.contains("a.asset"));
    }

    #[test]
    fn decode_rejects_malformed_input() {
        assert!(ResourceMetadata::decode(b"(uuid: 12, path").is_err());
    }
}
