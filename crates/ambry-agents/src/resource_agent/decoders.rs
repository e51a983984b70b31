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

//! A registry of payload decoders, keyed by the type tag stored in each resource file.

use ambry_core::asset::{Resource, Serializable};
use ambry_core::{ResourceError, SerializationError};
use std::{collections::HashMap, marker::PhantomData, sync::Arc};

/// Internal trait for decoding any resource type.
trait AnyDecoder: Send + Sync {
    fn decode_any(&self, bytes: &[u8]) -> Result<Arc<dyn Resource>, SerializationError>;
}

/// A "wrapper" that takes a concrete `Serializable` type and implements `AnyDecoder`.
struct SerializableDecoder<T>(PhantomData<fn() -> T>);

impl<T> AnyDecoder for SerializableDecoder<T>
where
    T: Serializable + Send + Sync + 'static,
{
    fn decode_any(&self, bytes: &[u8]) -> Result<Arc<dyn Resource>, SerializationError> {
        let resource: T = T::decode(bytes)?;
        Ok(Arc::new(resource))
    }
}

/// Maps type tags to the decoder of the matching [`Serializable`] type.
///
/// The registry is built once, before the resource manager is constructed, and is
/// then shared read-only with the worker threads.
#[derive(Default)]
pub struct DecoderRegistry {
    decoders: HashMap<&'static str, Box<dyn AnyDecoder>>,
}

impl DecoderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` under its [`TYPE_TAG`](Serializable::TYPE_TAG).
    ///
    /// Registering a second type with the same tag replaces the first.
    pub fn register<T>(&mut self) -> &mut Self
    where
        T: Serializable + Send + Sync + 'static,
    {
        if self
            .decoders
            .insert(T::TYPE_TAG, Box::new(SerializableDecoder::<T>(PhantomData)))
            .is_some()
        {
            log::warn!("Decoder for resource type '{}' was replaced.", T::TYPE_TAG);
        }
        self
    }

    /// Returns `true` if a decoder is registered for `type_tag`.
    pub fn contains(&self, type_tag: &str) -> bool {
        self.decoders.contains_key(type_tag)
    }

    /// Decodes `bytes` with the decoder registered for `type_tag`.
    ///
    /// `origin` names the data source in errors.
    ///
    /// # Errors
    /// [`ResourceError::UnknownResourceType`] if no decoder is registered, and
    /// [`ResourceError::DataCorruption`] if decoding fails.
    pub fn decode(
        &self,
        type_tag: &str,
        bytes: &[u8],
        origin: &str,
    ) -> Result<Arc<dyn Resource>, ResourceError> {
        let decoder =
            self.decoders
                .get(type_tag)
                .ok_or_else(|| ResourceError::UnknownResourceType {
                    type_tag: type_tag.to_string(),
                })?;
        decoder
            .decode_any(bytes)
            .map_err(|e| ResourceError::corrupt(origin, e))
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags: Vec<_> = self.decoders.keys().collect();
        tags.sort_unstable();
        f.debug_struct("DecoderRegistry").field("types", &tags).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Counter(u32);

    impl Serializable for Counter {
        const TYPE_TAG: &'static str = "counter";

        fn encode(&self) -> Result<Vec<u8>, SerializationError> {
            Ok(self.0.to_le_bytes().to_vec())
        }

        fn decode(bytes: &[u8]) -> Result<Self, SerializationError> {
            let bytes: [u8; 4] = bytes
                .try_into()
                .map_err(|_| SerializationError::new("expected 4 bytes"))?;
            Ok(Counter(u32::from_le_bytes(bytes)))
        }
    }

    #[test]
    fn decodes_registered_type() {
        let mut registry = DecoderRegistry::new();
        registry.register::<Counter>();
        assert!(registry.contains("counter"));

        let resource = registry
            .decode("counter", &9u32.to_le_bytes(), "c.asset")
            .unwrap();
        assert_eq!(resource.type_tag(), "counter");
        let counter = resource.into_any().downcast::<Counter>().unwrap();
        assert_eq!(*counter, Counter(9));
    }

    #[test]
    fn unknown_tag_is_reported() {
        let registry = DecoderRegistry::new();
        let err = registry.decode("mesh", &[], "m.asset").err().unwrap();
        assert!(matches!(err, ResourceError::UnknownResourceType { ref type_tag } if type_tag == "mesh"));
    }

    #[test]
    fn decode_failure_is_data_corruption() {
        let mut registry = DecoderRegistry::new();
        registry.register::<Counter>();
        let err = registry.decode("counter", &[1, 2], "c.asset").err().unwrap();
        assert!(matches!(err, ResourceError::DataCorruption { ref path, .. } if path == "c.asset"));
    }
}
