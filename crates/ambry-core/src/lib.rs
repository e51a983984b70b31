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

//! # Ambry Core
//!
//! Foundational crate containing the resource identifiers, handles, error
//! taxonomy, and the interface contracts that the rest of Ambry is built on.
//!
//! Nothing in this crate performs I/O or spawns threads. The concrete work
//! queue lives in `ambry-infra`, metadata persistence in `ambry-io`, and the
//! resource manager itself in `ambry-agents`.

#![warn(missing_docs)]

pub mod asset;
pub mod error;
pub mod work_queue;

pub use error::{ResourceError, SerializationError};
