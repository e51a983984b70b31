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

//! A thread-pool implementation of the [`WorkQueue`] contract.
//!
//! Requests from every channel share one unbounded crossbeam channel drained by
//! a fixed set of worker threads. Responses are funnelled into a single channel
//! that only the owner thread reads, through [`WorkQueue::process_responses`] or
//! [`WorkQueue::wait_for_response`].

mod worker;

use ambry_core::work_queue::{
    ChannelId, HandlerId, Request, RequestHandler, RequestId, Response, ResponseHandler,
    WorkData, WorkQueue,
};
use ambry_core::ResourceError;
use crossbeam_channel::{Receiver, Sender};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, RwLock,
    },
    thread::{self, JoinHandle},
};
use worker::{HandlerList, RequestHandlers};

/// Configuration for a [`ThreadPoolWorkQueue`].
#[derive(Debug, Clone)]
pub struct WorkQueueConfig {
    /// Used to name the worker threads.
    pub name: String,
    /// Number of worker threads. Values below one are raised to one.
    pub worker_threads: usize,
}

impl Default for WorkQueueConfig {
    fn default() -> Self {
        Self {
            name: "ambry-worker".to_string(),
            worker_threads: thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A bounded pool of worker threads implementing [`WorkQueue`].
///
/// Dropping the queue stops accepting requests, lets the workers finish what is
/// already queued, and joins them.
pub struct ThreadPoolWorkQueue {
    request_tx: Mutex<Option<Sender<Request>>>,
    response_rx: Receiver<Response>,
    request_handlers: Arc<RequestHandlers>,
    response_handlers: RwLock<HashMap<ChannelId, HandlerList<dyn ResponseHandler>>>,
    channels: Mutex<HashMap<String, ChannelId>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    // Held while a response handler runs so deliveries never overlap.
    dispatch: Mutex<()>,
    next_request_id: AtomicU64,
    next_handler_id: AtomicU64,
}

impl ThreadPoolWorkQueue {
    /// Creates the queue and starts its worker threads.
    pub fn new(config: WorkQueueConfig) -> Self {
        let (request_tx, request_rx) = crossbeam_channel::unbounded::<Request>();
        let (response_tx, response_rx) = crossbeam_channel::unbounded::<Response>();
        let request_handlers = Arc::new(RequestHandlers::default());
        let worker_count = config.worker_threads.max(1);

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let handlers = Arc::clone(&request_handlers);
            let requests = request_rx.clone();
            let responses = response_tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("{}-{index}", config.name))
                .spawn(move || worker::run(index, handlers, requests, responses));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => log::error!("Failed to spawn worker {index}: {e}"),
            }
        }

        log::info!(
            "Work queue '{}' started with {} worker thread(s).",
            config.name,
            workers.len()
        );

        Self {
            request_tx: Mutex::new(Some(request_tx)),
            response_rx,
            request_handlers,
            response_handlers: RwLock::new(HashMap::new()),
            channels: Mutex::new(HashMap::new()),
            workers: Mutex::new(workers),
            dispatch: Mutex::new(()),
            next_request_id: AtomicU64::new(1),
            next_handler_id: AtomicU64::new(1),
        }
    }

    /// Stops accepting requests and joins the workers once the queued requests
    /// have been serviced. Responses already produced can still be processed.
    pub fn shutdown(&self) {
        if lock(&self.request_tx).take().is_none() {
            return;
        }

        let workers = std::mem::take(&mut *lock(&self.workers));
        for worker in workers {
            if worker.join().is_err() {
                log::error!("A work queue worker thread panicked.");
            }
        }
        log::info!("Work queue shut down.");
    }

    fn next_handler_id(&self) -> HandlerId {
        HandlerId(self.next_handler_id.fetch_add(1, Ordering::Relaxed))
    }

    fn dispatch(&self, response: Response) {
        let _serial = lock(&self.dispatch);
        let channel = response.request().channel();

        let handler = self
            .response_handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&channel)
            .and_then(|list| {
                list.iter()
                    .find(|(_, handler)| handler.can_handle_response(&response))
                    .map(|(_, handler)| Arc::clone(handler))
            });

        match handler {
            Some(handler) => handler.handle_response(&response),
            None => log::warn!(
                "Dropping response to request {:?}: no response handler on channel {:?}",
                response.request().id(),
                channel
            ),
        }
    }
}

impl Default for ThreadPoolWorkQueue {
    fn default() -> Self {
        Self::new(WorkQueueConfig::default())
    }
}

impl WorkQueue for ThreadPoolWorkQueue {
    fn channel(&self, name: &str) -> Result<ChannelId, ResourceError> {
        let mut channels = lock(&self.channels);
        if let Some(id) = channels.get(name) {
            return Ok(*id);
        }

        let id = u16::try_from(channels.len()).map(ChannelId).map_err(|_| {
            ResourceError::QueueUnavailable(format!(
                "cannot register channel '{name}': all {} channel ids are in use",
                channels.len()
            ))
        })?;
        channels.insert(name.to_string(), id);
        log::debug!("Registered channel '{name}' as {id:?}");
        Ok(id)
    }

    fn add_request(
        &self,
        channel: ChannelId,
        request_type: u16,
        data: WorkData,
    ) -> Result<RequestId, ResourceError> {
        let id = RequestId(self.next_request_id.fetch_add(1, Ordering::Relaxed));
        let request = Request::new(id, channel, request_type, data);

        let sender = lock(&self.request_tx);
        let sender = sender
            .as_ref()
            .ok_or_else(|| ResourceError::QueueUnavailable("queue is shut down".to_string()))?;
        sender
            .send(request)
            .map_err(|_| ResourceError::QueueUnavailable("all workers have exited".to_string()))?;

        log::trace!("Queued request {id:?} on channel {channel:?}");
        Ok(id)
    }

    fn add_request_handler(
        &self,
        channel: ChannelId,
        handler: Arc<dyn RequestHandler>,
    ) -> HandlerId {
        let id = self.next_handler_id();
        self.request_handlers.add(channel, id, handler);
        id
    }

    fn remove_request_handler(&self, channel: ChannelId, id: HandlerId) {
        self.request_handlers.remove(channel, id);
    }

    fn add_response_handler(
        &self,
        channel: ChannelId,
        handler: Arc<dyn ResponseHandler>,
    ) -> HandlerId {
        let id = self.next_handler_id();
        self.response_handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(channel)
            .or_default()
            .push((id, handler));
        id
    }

    fn remove_response_handler(&self, channel: ChannelId, id: HandlerId) {
        let mut handlers = self
            .response_handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(list) = handlers.get_mut(&channel) {
            list.retain(|(handler_id, _)| *handler_id != id);
        }
    }

    fn process_responses(&self) -> usize {
        let mut processed = 0;
        while let Ok(response) = self.response_rx.try_recv() {
            self.dispatch(response);
            processed += 1;
        }
        processed
    }

    fn wait_for_response(&self) -> bool {
        match self.response_rx.recv() {
            Ok(response) => {
                self.dispatch(response);
                true
            }
            Err(_) => false,
        }
    }
}

impl Drop for ThreadPoolWorkQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Doubler;

    impl RequestHandler for Doubler {
        fn can_handle_request(&self, request: &Request) -> bool {
            request.data::<u32>().is_some()
        }

        fn handle_request(&self, request: &Request) -> Result<WorkData, String> {
            let value = request.data::<u32>().ok_or("expected a u32")?;
            Ok(Box::new(value * 2))
        }
    }

    #[derive(Default)]
    struct Collector {
        values: Mutex<Vec<u32>>,
        failures: AtomicUsize,
    }

    impl ResponseHandler for Collector {
        fn handle_response(&self, response: &Response) {
            match response.data::<u32>() {
                Some(value) => lock(&self.values).push(*value),
                None => {
                    self.failures.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
    }

    fn queue(workers: usize) -> ThreadPoolWorkQueue {
        ThreadPoolWorkQueue::new(WorkQueueConfig {
            name: "test-worker".to_string(),
            worker_threads: workers,
        })
    }

    #[test]
    fn channels_are_registered_once_per_name() {
        let queue = queue(1);
        let a = queue.channel("a").unwrap();
        let b = queue.channel("b").unwrap();
        assert_ne!(a, b);
        assert_eq!(queue.channel("a").unwrap(), a);
    }

    #[test]
    fn channel_ids_never_wrap_around() {
        let queue = queue(1);
        let first = queue.channel("channel-0").unwrap();
        for i in 1..=usize::from(u16::MAX) {
            queue.channel(&format!("channel-{i}")).unwrap();
        }

        let err = queue.channel("one-too-many").unwrap_err();
        assert!(matches!(err, ResourceError::QueueUnavailable(_)));
        // Existing names still resolve to their original ids.
        assert_eq!(queue.channel("channel-0").unwrap(), first);
        assert_eq!(
            queue.channel("channel-65535").unwrap(),
            ChannelId(u16::MAX)
        );
    }

    #[test]
    fn responses_are_delivered_to_the_owner_thread() {
        let queue = queue(4);
        let channel = queue.channel("math").unwrap();
        let collector = Arc::new(Collector::default());
        queue.add_request_handler(channel, Arc::new(Doubler));
        queue.add_response_handler(channel, collector.clone());

        for value in 1..=8u32 {
            queue.add_request(channel, 0, Box::new(value)).unwrap();
        }
        for _ in 0..8 {
            assert!(queue.wait_for_response());
        }

        let mut values = lock(&collector.values).clone();
        values.sort_unstable();
        assert_eq!(values, vec![2, 4, 6, 8, 10, 12, 14, 16]);
    }

    #[test]
    fn unhandled_request_produces_failed_response() {
        let queue = queue(1);
        let channel = queue.channel("math").unwrap();
        let collector = Arc::new(Collector::default());
        queue.add_request_handler(channel, Arc::new(Doubler));
        queue.add_response_handler(channel, collector.clone());

        // Doubler refuses anything that is not a u32.
        queue
            .add_request(channel, 0, Box::new("not a number"))
            .unwrap();
        assert!(queue.wait_for_response());
        assert_eq!(collector.failures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_handler_does_not_kill_the_worker() {
        struct Bomb;
        impl RequestHandler for Bomb {
            fn handle_request(&self, _request: &Request) -> Result<WorkData, String> {
                panic!("boom");
            }
        }

        let queue = queue(1);
        let channel = queue.channel("bomb").unwrap();
        let collector = Arc::new(Collector::default());
        queue.add_request_handler(channel, Arc::new(Bomb));
        queue.add_response_handler(channel, collector.clone());

        queue.add_request(channel, 0, Box::new(())).unwrap();
        queue.add_request(channel, 0, Box::new(())).unwrap();
        assert!(queue.wait_for_response());
        assert!(queue.wait_for_response());
        assert_eq!(collector.failures.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn removed_handlers_no_longer_receive_work() {
        let queue = queue(1);
        let channel = queue.channel("math").unwrap();
        let collector = Arc::new(Collector::default());
        let request_id = queue.add_request_handler(channel, Arc::new(Doubler));
        queue.add_response_handler(channel, collector.clone());
        queue.remove_request_handler(channel, request_id);

        queue.add_request(channel, 0, Box::new(3u32)).unwrap();
        assert!(queue.wait_for_response());
        assert!(lock(&collector.values).is_empty());
        assert_eq!(collector.failures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn process_responses_does_not_block_when_idle() {
        let queue = queue(1);
        assert_eq!(queue.process_responses(), 0);
    }

    #[test]
    fn requests_after_shutdown_are_rejected() {
        let queue = queue(2);
        let channel = queue.channel("math").unwrap();
        queue.shutdown();

        let err = queue.add_request(channel, 0, Box::new(1u32)).unwrap_err();
        assert!(matches!(err, ResourceError::QueueUnavailable(_)));
        assert!(!queue.wait_for_response());
    }
}
