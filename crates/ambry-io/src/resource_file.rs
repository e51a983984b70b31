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

//! The on-disk envelope around a resource payload.
//!
//! A resource file is a bincode-encoded [`ResourceFile`]: a magic number, a
//! format version, the payload's type tag, and the payload bytes produced by
//! its [`Serializable`](ambry_core::asset::Serializable) implementation. The
//! type tag is what lets a worker pick the right decoder without knowing the
//! concrete type up front.

use crate::write_atomically;
use ambry_core::asset::Resource;
use ambry_core::{ResourceError, SerializationError};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Identifies Ambry resource files.
pub const MAGIC: [u8; 4] = *b"AMBR";

/// The current envelope version.
pub const FORMAT_VERSION: u32 = 1;

/// A payload together with the type tag needed to decode it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFile {
    magic: [u8; 4],
    format_version: u32,
    /// The [`Serializable::TYPE_TAG`](ambry_core::asset::Serializable::TYPE_TAG) of the payload.
    pub type_tag: String,
    /// The encoded payload.
    pub payload: Vec<u8>,
}

impl ResourceFile {
    /// Wraps an already-encoded payload.
    pub fn new(type_tag: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            magic: MAGIC,
            format_version: FORMAT_VERSION,
            type_tag: type_tag.into(),
            payload,
        }
    }

    /// Encodes a resource's current in-memory state into an envelope.
    pub fn from_resource(resource: &dyn Resource) -> Result<Self, SerializationError> {
        Ok(Self::new(resource.type_tag(), resource.encode_payload()?))
    }

    /// Serializes the envelope.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializationError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| SerializationError::new(e.to_string()))
    }

    /// Parses an envelope, rejecting foreign files and unknown versions.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SerializationError> {
        let (file, _): (ResourceFile, _) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| SerializationError::new(e.to_string()))?;

        if file.magic != MAGIC {
            return Err(SerializationError::new("not a resource file (bad magic)"));
        }
        if file.format_version != FORMAT_VERSION {
            return Err(SerializationError::new(format!(
                "unsupported resource file version {}",
                file.format_version
            )));
        }
        Ok(file)
    }

    /// Reads and parses the envelope stored at `path`.
    ///
    /// # Errors
    /// [`ResourceError::Io`] if the file cannot be read, and
    /// [`ResourceError::DataCorruption`] if it cannot be parsed.
    pub fn read(path: &Path) -> Result<Self, ResourceError> {
        let display = path.display().to_string();
        let bytes = fs::read(path).map_err(|e| ResourceError::io(&display, e))?;
        Self::from_bytes(&bytes).map_err(|e| ResourceError::corrupt(display, e))
    }

    /// Writes the envelope to `path`, creating parent directories as needed.
    pub fn write(&self, path: &Path) -> Result<(), ResourceError> {
        let bytes = self
            .to_bytes()
            .map_err(|e| ResourceError::corrupt(path.display().to_string(), e))?;
        write_atomically(path, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambry_core::asset::Serializable;
    use tempfile::tempdir;

    struct Note(String);

    impl Serializable for Note {
        const TYPE_TAG: &'static str = "note";

        fn encode(&self) -> Result<Vec<u8>, SerializationError> {
            Ok(self.0.as_bytes().to_vec())
        }

        fn decode(bytes: &[u8]) -> Result<Self, SerializationError> {
            String::from_utf8(bytes.to_vec())
                .map(Note)
                .map_err(|e| SerializationError::new(e.to_string()))
        }
    }

    #[test]
    fn envelope_carries_type_tag_and_payload() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("notes/hello.asset");

        let file = ResourceFile::from_resource(&Note("hello".to_string()))?;
        file.write(&path)?;

        let read = ResourceFile::read(&path)?;
        assert_eq!(read.type_tag, "note");
        assert_eq!(Note::decode(&read.payload)?.0, "hello");
        Ok(())
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let err = ResourceFile::read(&dir.path().join("nope.asset")).unwrap_err();
        assert!(matches!(err, ResourceError::Io { .. }));
    }

    #[test]
    fn garbage_is_data_corruption() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("garbage.asset");
        fs::write(&path, b"definitely not bincode")?;

        let err = ResourceFile::read(&path).unwrap_err();
        assert!(matches!(err, ResourceError::DataCorruption { .. }));
        Ok(())
    }

    #[test]
    fn wrong_version_is_rejected() {
        let mut file = ResourceFile::new("note", vec![1, 2, 3]);
        file.format_version = FORMAT_VERSION + 1;
        let bytes = file.to_bytes().unwrap();
        assert!(ResourceFile::from_bytes(&bytes).is_err());
    }
}
