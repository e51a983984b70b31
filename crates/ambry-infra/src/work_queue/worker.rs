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

//! The loop run by each worker thread of the pool.

use ambry_core::work_queue::{ChannelId, HandlerId, Request, RequestHandler, Response};
use crossbeam_channel::{Receiver, Sender};
use std::{
    collections::HashMap,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, PoisonError, RwLock},
};

pub(super) type HandlerList<H> = Vec<(HandlerId, Arc<H>)>;

/// Request handlers, shared between the queue and its workers.
#[derive(Default)]
pub(super) struct RequestHandlers {
    by_channel: RwLock<HashMap<ChannelId, HandlerList<dyn RequestHandler>>>,
}

impl RequestHandlers {
    pub(super) fn add(&self, channel: ChannelId, id: HandlerId, handler: Arc<dyn RequestHandler>) {
        self.by_channel
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(channel)
            .or_default()
            .push((id, handler));
    }

    pub(super) fn remove(&self, channel: ChannelId, id: HandlerId) {
        let mut by_channel = self
            .by_channel
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(list) = by_channel.get_mut(&channel) {
            list.retain(|(handler_id, _)| *handler_id != id);
        }
    }

    /// The first handler on the request's channel that accepts it.
    fn find(&self, request: &Request) -> Option<Arc<dyn RequestHandler>> {
        let by_channel = self
            .by_channel
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        by_channel
            .get(&request.channel())?
            .iter()
            .find(|(_, handler)| handler.can_handle_request(request))
            .map(|(_, handler)| Arc::clone(handler))
    }

    /// Runs the request through a matching handler, turning a missing handler or a
    /// panicking one into a failed response.
    pub(super) fn service(&self, request: Request) -> Response {
        let Some(handler) = self.find(&request) else {
            log::warn!(
                "No request handler accepted request {:?} on channel {:?}",
                request.id(),
                request.channel()
            );
            return Response::failure(request, "no request handler accepted the request");
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.handle_request(&request)));
        match outcome {
            Ok(Ok(data)) => Response::success(request, data),
            Ok(Err(message)) => Response::failure(request, message),
            Err(_) => {
                log::error!("Request handler panicked on request {:?}", request.id());
                Response::failure(request, "request handler panicked")
            }
        }
    }
}

pub(super) fn run(
    index: usize,
    handlers: Arc<RequestHandlers>,
    requests: Receiver<Request>,
    responses: Sender<Response>,
) {
    log::trace!("Worker {index} started.");
    while let Ok(request) = requests.recv() {
        let response = handlers.service(request);
        if responses.send(response).is_err() {
            log::debug!("Worker {index}: response channel closed, exiting.");
            break;
        }
    }
    log::trace!("Worker {index} stopped.");
}
