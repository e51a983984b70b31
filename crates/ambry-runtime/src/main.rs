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

//! The Ambry runtime: a minimal host that wires the work queue and the resource
//! manager together, registers a resource, and loads it back asynchronously.
//!
//! Usage: `ambry-runtime [config.ron]`

use ambry_agents::{DecoderRegistry, ResourceManager, ResourceManagerConfig};
use ambry_core::asset::{ResourceHandle, Serializable};
use ambry_core::SerializationError;
use ambry_infra::logging::init_logging;
use ambry_infra::{ThreadPoolWorkQueue, WorkQueueConfig};
use anyhow::{Context, Result};
use std::{sync::Arc, thread, time::Duration};

const WELCOME_PATH: &str = "notes/welcome.asset";
const FRAME_TIME: Duration = Duration::from_millis(16);

/// A plain-text resource.
struct Note {
    text: String,
}

impl Serializable for Note {
    const TYPE_TAG: &'static str = "note";

    fn encode(&self) -> Result<Vec<u8>, SerializationError> {
        Ok(self.text.as_bytes().to_vec())
    }

    fn decode(bytes: &[u8]) -> Result<Self, SerializationError> {
        String::from_utf8(bytes.to_vec())
            .map(|text| Note { text })
            .map_err(|e| SerializationError::new(e.to_string()))
    }
}

fn load_config() -> Result<ResourceManagerConfig> {
    match std::env::args().nth(1) {
        Some(path) => ResourceManagerConfig::from_ron_file(&path)
            .with_context(|| format!("Failed to read configuration '{path}'")),
        None => Ok(ResourceManagerConfig::new("ambry-demo/metadata")
            .with_asset_root("ambry-demo/assets")),
    }
}

fn main() -> Result<()> {
    init_logging("info");

    let config = load_config()?;
    let queue = Arc::new(ThreadPoolWorkQueue::new(WorkQueueConfig::default()));

    let mut decoders = DecoderRegistry::new();
    decoders.register::<Note>();

    let mut resources = ResourceManager::new(config, queue.clone(), decoders)
        .context("Failed to initialize the resource manager")?;

    if !resources.is_registered(WELCOME_PATH) {
        let note = ResourceHandle::new(Note {
            text: "Welcome to Ambry.".to_string(),
        });
        resources
            .create(&note, WELCOME_PATH, false)
            .context("Failed to create the welcome note")?;
        log::info!("Created '{WELCOME_PATH}' as {:?}", note.uuid());
    }

    // Drop the cached copy so the load below goes through the worker pool.
    resources.unload(WELCOME_PATH);
    let handle = resources.load_async(WELCOME_PATH);

    let mut frames = 0u32;
    while handle.is_pending() {
        resources.process_responses();
        frames += 1;
        thread::sleep(FRAME_TIME);
    }

    match handle.downcast::<Note>() {
        Some(note) => log::info!("Loaded '{WELCOME_PATH}' after {frames} frame(s): {}", note.text),
        None => log::error!("Loading '{WELCOME_PATH}' failed: {:?}", handle.error()),
    }

    let uuid = resources.uuid_of(WELCOME_PATH)?;
    let by_uuid = resources
        .load_from_uuid(&uuid)
        .context("Registered resource could not be loaded by uuid")?;
    log::info!("load_from_uuid({uuid}) returned the same handle: {}", by_uuid == handle);

    drop(resources);
    queue.shutdown();
    Ok(())
}
