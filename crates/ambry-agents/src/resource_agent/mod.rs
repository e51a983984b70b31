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

//! Loads, registers, and saves resources on behalf of the host application.
//!
//! This module provides the high-level logic for resource management. The
//! [`ResourceManager`] is the public entry point; it resolves identifiers through
//! the metadata store, shares in-flight loads through the
//! [`LoadRequestDeduplicator`], and hands the actual file reading and decoding
//! to the [`AsyncLoadPipeline`], which runs it on the work queue's workers.
//!
//! Threading model:
//! - The thread that owns the manager is the only one that mutates metadata
//!   and the only one that processes load responses.
//! - Worker threads only read a file path and produce a decoded payload.
//! - Any thread holding a [`ResourceHandle`](ambry_core::asset::ResourceHandle)
//!   may wait on it.

pub mod cache;
pub mod config;
pub mod decoders;
pub mod dedup;
pub mod manager;
pub mod pipeline;

pub use cache::ResourceCache;
pub use config::ResourceManagerConfig;
pub use decoders::DecoderRegistry;
pub use dedup::{BeginOutcome, LoadRequestDeduplicator};
pub use manager::ResourceManager;
pub use pipeline::{AsyncLoadPipeline, LoadRequest, LoadResponse};
