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

//! Provides the foundational traits and primitive types for Ambry's resource system.
//!
//! This module defines the "common language" for all resource-related operations.
//! It contains the core contracts that other crates implement or use, but it has
//! no knowledge of how resources are located on disk or decoded.
//!
//! The key components are:
//! - The [`Serializable`] capability: how a concrete type turns into bytes and back.
//! - The [`Resource`] trait: the object-safe view of a payload held by a handle.
//! - [`ResourceUUID`] and [`ResourceMetadata`]: stable identity and its path record.
//! - [`ResourceHandle`]: the shared handle whose payload may not be available yet.

mod handle;
mod metadata;
mod resource_uuid;

pub use handle::*;
pub use metadata::*;
pub use resource_uuid::*;

use crate::error::SerializationError;
use std::{any::Any, sync::Arc};

/// A capability for types that can be persisted as a byte payload.
///
/// Every implementor exposes a stable [`TYPE_TAG`](Serializable::TYPE_TAG). The tag
/// is written next to the payload on disk and is the key used to look up the
/// matching decoder when the payload is read back, so it must never change once
/// data has been written with it.
///
/// # Examples
///
/// ```
/// use ambry_core::asset::Serializable;
/// use ambry_core::SerializationError;
///
/// struct Greeting(String);
///
/// impl Serializable for Greeting {
///     const TYPE_TAG: &'static str = "greeting";
///
///     fn encode(&self) -> Result<Vec<u8>, SerializationError> {
///         Ok(self.0.as_bytes().to_vec())
///     }
///
///     fn decode(bytes: &[u8]) -> Result<Self, SerializationError> {
///         String::from_utf8(bytes.to_vec())
///             .map(Greeting)
///             .map_err(|e| SerializationError::new(e.to_string()))
///     }
/// }
/// ```
pub trait Serializable: Sized {
    /// The stable type identity used to dispatch decoding.
    const TYPE_TAG: &'static str;

    /// Converts the value into its persisted byte representation.
    fn encode(&self) -> Result<Vec<u8>, SerializationError>;

    /// Reconstructs a value from bytes previously produced by [`encode`](Serializable::encode).
    fn decode(bytes: &[u8]) -> Result<Self, SerializationError>;
}

/// The object-safe view of a resource payload.
///
/// Handles store payloads as `Arc<dyn Resource>` so that the resource manager can
/// move them across threads and re-encode them on save without knowing their
/// concrete type. It is implemented automatically for every
/// `Serializable + Send + Sync + 'static` type.
///
/// The supertraits enforce critical safety guarantees:
/// - `Send` + `Sync`: payloads are decoded on worker threads and shared by every
///   holder of a handle.
/// - `Any`: typed access through [`ResourceHandle::downcast`].
pub trait Resource: Any + Send + Sync {
    /// The stable type tag of the concrete payload type.
    fn type_tag(&self) -> &'static str;

    /// Encodes the payload through its [`Serializable`] implementation.
    fn encode_payload(&self) -> Result<Vec<u8>, SerializationError>;

    /// Converts the shared payload into `Arc<dyn Any>` for downcasting.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T> Resource for T
where
    T: Serializable + Send + Sync + 'static,
{
    fn type_tag(&self) -> &'static str {
        T::TYPE_TAG
    }

    fn encode_payload(&self) -> Result<Vec<u8>, SerializationError> {
        self.encode()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
