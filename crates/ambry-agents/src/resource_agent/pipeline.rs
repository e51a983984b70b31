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

//! The request/response handler pair bridging the resource manager and the work queue.
//!
//! A load travels through the pipeline in three steps:
//! 1. [`AsyncLoadPipeline::submit`] marks the handle `Pending` and queues a
//!    [`LoadRequest`] on the pipeline's channel.
//! 2. On a worker thread, the [`ResourceRequestHandler`] reads the file, parses
//!    its envelope, and decodes the payload into a [`LoadResponse`].
//! 3. On the owner thread, the [`ResourceResponseHandler`] installs the result
//!    into the handle, wakes its waiters, and releases the in-flight entry.
//!
//! Requests for different resources decode in parallel; only step 3 is serialized.

use super::{cache::ResourceCache, decoders::DecoderRegistry, dedup::LoadRequestDeduplicator};
use ambry_core::asset::{Resource, ResourceHandle};
use ambry_core::work_queue::{
    ChannelId, HandlerRegistration, Request, RequestHandler, Response, ResponseHandler, WorkData,
    WorkQueue,
};
use ambry_core::ResourceError;
use ambry_io::ResourceFile;
use std::{
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// Request type of resource loads on the pipeline's channel.
pub const LOAD_REQUEST: u16 = 1;

/// One queued load.
#[derive(Debug)]
pub struct LoadRequest {
    /// The normalized logical path; the in-flight and cache key.
    pub key: String,
    /// Where the payload file lives on disk.
    pub file_path: PathBuf,
    /// The handle that receives the result. Workers never touch it.
    pub handle: ResourceHandle,
}

/// The outcome of decoding one [`LoadRequest`].
pub struct LoadResponse {
    /// The decoded payload, or why it could not be produced.
    pub result: Result<Arc<dyn Resource>, ResourceError>,
}

/// The bookkeeping shared by the manager and the response handler.
#[derive(Debug, Default)]
pub struct LoadTracker {
    /// Loads between submission and response installation.
    pub in_flight: LoadRequestDeduplicator,
    /// Handles whose load completed successfully.
    pub cache: ResourceCache,
}

type SharedTracker = Arc<Mutex<LoadTracker>>;

/// Returns `true` if `key` can name a resource file: non-empty and free of NUL bytes.
pub fn is_well_formed_key(key: &str) -> bool {
    !key.is_empty() && !key.contains('\0')
}

fn lock(tracker: &SharedTracker) -> MutexGuard<'_, LoadTracker> {
    tracker.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Worker-side half of the pipeline: reads and decodes payload files.
pub struct ResourceRequestHandler {
    decoders: Arc<DecoderRegistry>,
}

impl ResourceRequestHandler {
    fn load(&self, request: &LoadRequest) -> Result<Arc<dyn Resource>, ResourceError> {
        let file = ResourceFile::read(&request.file_path)?;
        self.decoders
            .decode(&file.type_tag, &file.payload, &request.key)
    }
}

impl RequestHandler for ResourceRequestHandler {
    fn can_handle_request(&self, request: &Request) -> bool {
        request.request_type() == LOAD_REQUEST
            && request
                .data::<LoadRequest>()
                .is_some_and(|load| is_well_formed_key(&load.key))
    }

    fn handle_request(&self, request: &Request) -> Result<WorkData, String> {
        let load = request
            .data::<LoadRequest>()
            .ok_or("request does not carry a LoadRequest")?;

        let result = self.load(load);
        if let Err(e) = &result {
            log::warn!("Failed to load resource '{}': {e}", load.key);
        }
        Ok(Box::new(LoadResponse { result }))
    }
}

/// Owner-side half of the pipeline: installs results into handles.
pub struct ResourceResponseHandler {
    tracker: SharedTracker,
}

impl ResponseHandler for ResourceResponseHandler {
    fn can_handle_response(&self, response: &Response) -> bool {
        response.request().request_type() == LOAD_REQUEST
            && response.request().data::<LoadRequest>().is_some()
    }

    fn handle_response(&self, response: &Response) {
        let Some(load) = response.request().data::<LoadRequest>() else {
            return;
        };

        let result = match response.data::<LoadResponse>() {
            Some(decoded) => decoded.result.clone(),
            None => Err(ResourceError::QueueUnavailable(
                response
                    .failure_message()
                    .unwrap_or("malformed load response")
                    .to_string(),
            )),
        };

        let loaded = result.is_ok();
        load.handle.resolve(result);

        let mut tracker = lock(&self.tracker);
        // `create` or a newer load may have taken the key over; only the owner
        // caches, and never over a handle that is already cached.
        let owned = tracker.in_flight.release(&load.key, &load.handle);
        if loaded && owned && !tracker.cache.contains(&load.key) {
            tracker.cache.insert(load.key.clone(), load.handle.clone());
        }
        log::trace!(
            "Installed load response for '{}' ({})",
            load.key,
            if loaded { "loaded" } else { "failed" }
        );
    }
}

/// Owns the handler registration on the work queue and the shared load bookkeeping.
///
/// Dropping the pipeline deregisters both handlers from the queue.
pub struct AsyncLoadPipeline {
    registration: HandlerRegistration,
    tracker: SharedTracker,
}

impl AsyncLoadPipeline {
    /// Registers the pipeline's handlers on the channel named `channel_name`.
    ///
    /// # Errors
    /// Fails if the queue cannot register the channel.
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        channel_name: &str,
        decoders: DecoderRegistry,
    ) -> Result<Self, ResourceError> {
        let channel = queue.channel(channel_name)?;
        let tracker = SharedTracker::default();

        let request_handler = Arc::new(ResourceRequestHandler {
            decoders: Arc::new(decoders),
        });
        let response_handler = Arc::new(ResourceResponseHandler {
            tracker: Arc::clone(&tracker),
        });
        let registration =
            HandlerRegistration::register(queue, channel, request_handler, response_handler);

        Ok(Self {
            registration,
            tracker,
        })
    }

    /// The channel the pipeline listens on.
    pub fn channel(&self) -> ChannelId {
        self.registration.channel()
    }

    /// Locks the in-flight registry and the cache.
    pub fn tracker(&self) -> MutexGuard<'_, LoadTracker> {
        lock(&self.tracker)
    }

    /// Queues a load of `file_path` into `handle`.
    ///
    /// The caller must already own `key` in the in-flight registry. If the queue
    /// refuses the request, the handle is failed and the key released before the
    /// error is returned, so no waiter is left hanging.
    pub fn submit(
        &self,
        key: String,
        file_path: PathBuf,
        handle: ResourceHandle,
    ) -> Result<(), ResourceError> {
        handle.mark_pending();
        log::debug!("Queueing load of '{}' from '{}'", key, file_path.display());

        let request = LoadRequest {
            key: key.clone(),
            file_path,
            handle: handle.clone(),
        };
        let queued = self.registration.queue().add_request(
            self.channel(),
            LOAD_REQUEST,
            Box::new(request),
        );

        if let Err(e) = queued {
            log::error!("Could not queue load of '{key}': {e}");
            handle.resolve(Err(e.clone()));
            self.tracker().in_flight.release(&key, &handle);
            return Err(e);
        }
        Ok(())
    }

    /// Installs every completed load, without blocking.
    pub fn process_responses(&self) -> usize {
        self.registration.queue().process_responses()
    }

    /// Blocks until one response has been processed. Returns `false` if the
    /// queue has shut down.
    pub fn wait_for_response(&self) -> bool {
        self.registration.queue().wait_for_response()
    }
}
