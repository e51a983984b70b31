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

//! The boundary between the resource system and a generic request/response work queue.
//!
//! A work queue moves typed requests to a pool of worker threads and brings the
//! resulting responses back to the thread that owns the queue. This module only
//! defines the contract; `ambry-infra` provides a thread-pool implementation.
//!
//! The contract is:
//! - Requests are submitted on a named [`ChannelId`].
//! - [`RequestHandler`]s run on arbitrary worker threads, in no particular order.
//! - [`ResponseHandler`]s run on the thread that calls
//!   [`WorkQueue::process_responses`] or [`WorkQueue::wait_for_response`], one
//!   response at a time.

use crate::error::ResourceError;
use std::{any::Any, fmt, sync::Arc};

/// Identifies a named channel on a work queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u16);

/// Identifies one submitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

/// Identifies a registered request or response handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub u64);

/// Type-erased request or response data.
pub type WorkData = Box<dyn Any + Send>;

/// A unit of work travelling from the submitting thread to a worker.
pub struct Request {
    id: RequestId,
    channel: ChannelId,
    request_type: u16,
    data: WorkData,
}

impl Request {
    /// Creates a request. Queues call this when a request is submitted.
    pub fn new(id: RequestId, channel: ChannelId, request_type: u16, data: WorkData) -> Self {
        Self {
            id,
            channel,
            request_type,
            data,
        }
    }

    /// The queue-assigned id.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// The channel the request was submitted on.
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// A channel-specific discriminator chosen by the submitter.
    pub fn request_type(&self) -> u16 {
        self.request_type
    }

    /// The request data as `T`, if it is one.
    pub fn data<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .field("request_type", &self.request_type)
            .finish_non_exhaustive()
    }
}

/// The outcome of a request, delivered back to the owner thread.
///
/// The original request travels with its response so response handlers can find
/// whatever state the submitter attached to it.
pub struct Response {
    request: Request,
    outcome: Result<WorkData, String>,
}

impl Response {
    /// A response carrying the data produced by a request handler.
    pub fn success(request: Request, data: WorkData) -> Self {
        Self {
            request,
            outcome: Ok(data),
        }
    }

    /// A response for a request that could not be processed at all.
    pub fn failure(request: Request, message: impl Into<String>) -> Self {
        Self {
            request,
            outcome: Err(message.into()),
        }
    }

    /// The request this response answers.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Returns `true` if a request handler produced data.
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The queue-level failure message, if the request was not processed.
    pub fn failure_message(&self) -> Option<&str> {
        self.outcome.as_ref().err().map(String::as_str)
    }

    /// The response data as `T`, if the request succeeded and produced a `T`.
    pub fn data<T: Any>(&self) -> Option<&T> {
        self.outcome.as_ref().ok()?.downcast_ref::<T>()
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("request", &self.request)
            .field("succeeded", &self.succeeded())
            .field("failure", &self.failure_message())
            .finish()
    }
}

/// Services requests on worker threads.
pub trait RequestHandler: Send + Sync {
    /// Whether this handler accepts the request. Queues offer a request to each
    /// handler registered on its channel and run the first one that accepts.
    fn can_handle_request(&self, _request: &Request) -> bool {
        true
    }

    /// Performs the work. Runs off the owner thread and must not touch state that
    /// the owner thread mutates.
    fn handle_request(&self, request: &Request) -> Result<WorkData, String>;
}

/// Consumes responses on the owner thread.
pub trait ResponseHandler: Send + Sync {
    /// Whether this handler wants the response.
    fn can_handle_response(&self, _response: &Response) -> bool {
        true
    }

    /// Consumes the response. Calls are serialized with respect to each other.
    fn handle_response(&self, response: &Response);
}

/// A generic producer/consumer facility.
pub trait WorkQueue: Send + Sync {
    /// Returns the channel registered under `name`, registering it if needed.
    ///
    /// # Errors
    /// Returns [`ResourceError::QueueUnavailable`] if no channel id is left for a
    /// new name.
    fn channel(&self, name: &str) -> Result<ChannelId, ResourceError>;

    /// Submits a request on `channel`.
    ///
    /// # Errors
    /// Returns [`ResourceError::QueueUnavailable`] if the queue has shut down.
    fn add_request(
        &self,
        channel: ChannelId,
        request_type: u16,
        data: WorkData,
    ) -> Result<RequestId, ResourceError>;

    /// Registers a handler that services requests on `channel`.
    fn add_request_handler(&self, channel: ChannelId, handler: Arc<dyn RequestHandler>)
        -> HandlerId;

    /// Deregisters a request handler. Unknown ids are ignored.
    fn remove_request_handler(&self, channel: ChannelId, id: HandlerId);

    /// Registers a handler that consumes responses on `channel`.
    fn add_response_handler(
        &self,
        channel: ChannelId,
        handler: Arc<dyn ResponseHandler>,
    ) -> HandlerId;

    /// Deregisters a response handler. Unknown ids are ignored.
    fn remove_response_handler(&self, channel: ChannelId, id: HandlerId);

    /// Dispatches every response that is ready, without blocking.
    ///
    /// Returns the number of responses processed.
    fn process_responses(&self) -> usize;

    /// Blocks until one response is available and dispatches it.
    ///
    /// Returns `false` if the queue has shut down and no response will ever arrive.
    fn wait_for_response(&self) -> bool;
}

/// Keeps a request/response handler pair registered for as long as it lives.
///
/// Dropping the registration removes both handlers from the queue.
pub struct HandlerRegistration {
    queue: Arc<dyn WorkQueue>,
    channel: ChannelId,
    request_handler: HandlerId,
    response_handler: HandlerId,
}

impl HandlerRegistration {
    /// Registers both handlers on `channel`.
    pub fn register(
        queue: Arc<dyn WorkQueue>,
        channel: ChannelId,
        request_handler: Arc<dyn RequestHandler>,
        response_handler: Arc<dyn ResponseHandler>,
    ) -> Self {
        let request_handler = queue.add_request_handler(channel, request_handler);
        let response_handler = queue.add_response_handler(channel, response_handler);
        log::debug!(
            "Registered handlers {:?}/{:?} on channel {:?}",
            request_handler,
            response_handler,
            channel
        );
        Self {
            queue,
            channel,
            request_handler,
            response_handler,
        }
    }

    /// The channel the handlers are registered on.
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// The queue the handlers are registered with.
    pub fn queue(&self) -> &Arc<dyn WorkQueue> {
        &self.queue
    }
}

impl Drop for HandlerRegistration {
    fn drop(&mut self) {
        self.queue
            .remove_request_handler(self.channel, self.request_handler);
        self.queue
            .remove_response_handler(self.channel, self.response_handler);
        log::debug!("Deregistered handlers on channel {:?}", self.channel);
    }
}

impl fmt::Debug for HandlerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistration")
            .field("channel", &self.channel)
            .field("request_handler", &self.request_handler)
            .field("response_handler", &self.response_handler)
            .finish()
    }
}
