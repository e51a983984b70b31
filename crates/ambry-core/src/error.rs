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

//! Defines the error taxonomy shared by every layer of the resource system.

use std::{io, sync::Arc};
use thiserror::Error;

/// An error produced while encoding or decoding a [`Serializable`](crate::asset::Serializable) value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SerializationError {
    message: String,
}

impl SerializationError {
    /// Creates a new error carrying a human-readable description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The description of what went wrong.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// An error raised by the metadata store, the load pipeline, or the resource manager.
///
/// The type is `Clone` so that a failed handle can hand the same error to every
/// holder; I/O sources are therefore kept behind an [`Arc`].
#[derive(Debug, Clone, Error)]
pub enum ResourceError {
    /// A UUID or path is absent from the metadata store.
    #[error("no resource registered for '{key}'")]
    NotFound {
        /// The UUID or path that was looked up.
        key: String,
    },

    /// A UUID or path is already registered to another resource.
    #[error("a resource is already registered for '{key}'")]
    AlreadyExists {
        /// The colliding UUID or path.
        key: String,
    },

    /// A logical path is empty or otherwise unusable.
    #[error("invalid resource path '{path}'")]
    InvalidPath {
        /// The rejected path.
        path: String,
    },

    /// A save was requested for a resource that was never registered with `create`.
    #[error("resource '{path}' is not registered, it must be created before it can be saved")]
    NotRegistered {
        /// The path of the handle, or `<unnamed>` when it has none.
        path: String,
    },

    /// A save was requested for a handle that holds no payload.
    #[error("resource '{path}' has no loaded payload")]
    NotLoaded {
        /// The path of the handle.
        path: String,
    },

    /// A metadata record or a payload file could not be decoded.
    #[error("corrupt data in '{path}': {details}")]
    DataCorruption {
        /// The file or logical path holding the corrupt data.
        path: String,
        /// What the decoder reported.
        details: String,
    },

    /// A payload's type tag has no registered decoder.
    #[error("no decoder registered for resource type '{type_tag}'")]
    UnknownResourceType {
        /// The tag read from the payload file.
        type_tag: String,
    },

    /// Underlying file access failed.
    #[error("I/O failure on '{path}': {source}")]
    Io {
        /// The file-system path being accessed.
        path: String,
        /// The original I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The work queue refused the request or has shut down.
    #[error("work queue unavailable: {0}")]
    QueueUnavailable(String),
}

impl ResourceError {
    /// Builds an [`Io`](ResourceError::Io) error for the given path.
    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Builds a [`DataCorruption`](ResourceError::DataCorruption) error for the given path.
    pub fn corrupt(path: impl Into<String>, details: impl ToString) -> Self {
        Self::DataCorruption {
            path: path.into(),
            details: details.to_string(),
        }
    }

    /// Builds a [`NotFound`](ResourceError::NotFound) error for the given key.
    pub fn not_found(key: impl ToString) -> Self {
        Self::NotFound {
            key: key.to_string(),
        }
    }

    /// Builds an [`AlreadyExists`](ResourceError::AlreadyExists) error for the given key.
    pub fn already_exists(key: impl ToString) -> Self {
        Self::AlreadyExists {
            key: key.to_string(),
        }
    }

    /// Returns `true` for [`NotFound`](ResourceError::NotFound).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
