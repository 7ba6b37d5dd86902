// Copyright 2025-Present Floodgate, Inc. https://www.floodgate.dev/
// SPDX-License-Identifier: Apache-2.0

//! Asynchronous batching collector for the Floodgate collect endpoint.
//!
//! Callers enqueue events with [`Collector::collect`]; a single
//! coordinator task merges them into a per-stream buffer and ships each
//! snapshot as one POST, with at most [`MAX_REQUESTS_IN_FLIGHT`] requests
//! executing at a time. Delivery is fire-and-forget: a flush that errors,
//! times out, or gets a non-success status is logged and dropped, never
//! retried. [`Collector::close`] drains the queue, flushes what remains,
//! and waits for every outstanding request before returning.

use std::collections::HashMap;
use std::sync::Arc;

use floodgate_core::config::CollectorConfig;
use floodgate_core::error::{error_from_status, ApiError};
use floodgate_core::event::Event;
use reqwest::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::buffer::BatchBuffer;

/// Upper bound on concurrently executing flush requests.
pub const MAX_REQUESTS_IN_FLIGHT: usize = 1000;

/// Capacity of the inbound request queue. Producers that outrun the
/// coordinator suspend in [`Collector::collect`] once it fills, instead
/// of growing memory without bound.
const INCOMING_CAPACITY: usize = 100;

/// Error returned by [`Collector::collect`] once the collector has shut
/// down.
#[derive(Debug, thiserror::Error)]
#[error("collector is shut down")]
pub struct CollectorClosed;

/// Outcome of one flush attempt, as observed by a [`FlushHook`].
#[derive(Debug, Clone)]
pub struct FlushReport {
    /// Number of distinct streams in the batch.
    pub streams: usize,
    /// Total number of events in the batch.
    pub events: usize,
    /// Delivery outcome; an error means the batch was dropped.
    pub result: Result<(), ApiError>,
}

/// Callback invoked after each flush attempt completes.
pub type FlushHook = Arc<dyn Fn(FlushReport) + Send + Sync>;

struct CollectRequest {
    stream: String,
    events: Vec<Event>,
}

/// Asynchronous client for the collect endpoint.
pub struct Collector {
    incoming: mpsc::Sender<CollectRequest>,
    shutdown: CancellationToken,
    coordinator: Mutex<Option<JoinHandle<()>>>,
}

impl Collector {
    /// Validates the configuration and starts the coordinator task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(api_key: &str, config: CollectorConfig) -> Result<Self, ApiError> {
        Self::start_with_hook(api_key, config, None)
    }

    /// Like [`Collector::start`], with a hook observing flush outcomes.
    ///
    /// The hook changes nothing about delivery: failed batches are still
    /// dropped. It exists so tests and metrics code can see the drops.
    pub fn start_with_hook(
        api_key: &str,
        config: CollectorConfig,
        hook: Option<FlushHook>,
    ) -> Result<Self, ApiError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        let (incoming, rx) = mpsc::channel(INCOMING_CAPACITY);
        let shutdown = CancellationToken::new();
        let coordinator = Coordinator {
            api_key: api_key.to_string(),
            config,
            client,
            incoming: rx,
            shutdown: shutdown.clone(),
            limiter: Arc::new(Semaphore::new(MAX_REQUESTS_IN_FLIGHT)),
            in_flight: JoinSet::new(),
            buffer: BatchBuffer::default(),
            hook,
        };

        Ok(Self {
            incoming,
            shutdown,
            coordinator: Mutex::new(Some(tokio::spawn(coordinator.run()))),
        })
    }

    /// Enqueues `events` for `stream`.
    ///
    /// Suspends while the inbound queue is full. Events accepted here are
    /// never dropped by the collector itself; delivery to the service is
    /// at-most-once.
    pub async fn collect(&self, stream: &str, events: Vec<Event>) -> Result<(), CollectorClosed> {
        self.incoming
            .send(CollectRequest {
                stream: stream.to_string(),
                events,
            })
            .await
            .map_err(|_| CollectorClosed)
    }

    /// Gracefully shuts down: drains every already-enqueued request,
    /// flushes whatever is buffered, and waits for all in-flight
    /// requests to finish.
    ///
    /// Once this returns, no further HTTP calls are issued by this
    /// instance. Calling it again is a no-op.
    pub async fn close(&self) {
        self.shutdown.cancel();
        let handle = self.coordinator.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("collector coordinator task failed: {e}");
            }
        }
    }
}

/// Single-task event loop owning the buffer. Reacts to whichever comes
/// first: an inbound request, a flush-interval tick, or shutdown.
struct Coordinator {
    api_key: String,
    config: CollectorConfig,
    client: reqwest::Client,
    incoming: mpsc::Receiver<CollectRequest>,
    shutdown: CancellationToken,
    limiter: Arc<Semaphore>,
    in_flight: JoinSet<()>,
    buffer: BatchBuffer,
    hook: Option<FlushHook>,
}

impl Coordinator {
    async fn run(mut self) {
        debug!(endpoint = %self.config.endpoint, "starting collector");
        // The first tick lands one full interval after start.
        let mut tick = interval_at(
            Instant::now() + self.config.flush_interval,
            self.config.flush_interval,
        );
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let shutdown = self.shutdown.clone();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                request = self.incoming.recv() => match request {
                    Some(request) => {
                        if self.config.debug {
                            debug!(
                                stream = %request.stream,
                                num_events = request.events.len(),
                                "received new events"
                            );
                        }
                        self.buffer.append(request.stream, request.events);
                        if self.buffer.len() >= self.config.batch_size {
                            self.flush().await;
                        }
                    }
                    // Every sender is gone; nothing more can arrive.
                    None => break,
                },
                _ = tick.tick() => {
                    if !self.buffer.is_empty() {
                        self.flush().await;
                    }
                }
            }
            // Reap finished flush tasks so the set does not accumulate.
            while self.in_flight.try_join_next().is_some() {}
        }

        self.drain().await;
    }

    /// Shutdown path: drain already-enqueued requests, flush once if
    /// anything is buffered, then wait out every in-flight request.
    async fn drain(mut self) {
        debug!("shutting down collector");
        self.incoming.close();
        while let Some(request) = self.incoming.recv().await {
            self.buffer.append(request.stream, request.events);
        }
        if !self.buffer.is_empty() {
            self.flush().await;
        }
        while self.in_flight.join_next().await.is_some() {}
    }

    /// Snapshots the buffer and ships it on an independent task, holding
    /// one limiter permit for the lifetime of the request. The live
    /// buffer is empty again before this returns.
    async fn flush(&mut self) {
        let permit = match self.limiter.clone().acquire_owned().await {
            Ok(permit) => permit,
            // The semaphore is never closed.
            Err(_) => return,
        };

        let batch = self.buffer.take();
        let streams = batch.len();
        let events: usize = batch.values().map(Vec::len).sum();
        debug!(num_events = events, num_streams = streams, "flushing events to server");

        let client = self.client.clone();
        let url = format!("{}/collect", self.config.endpoint);
        let api_key = self.api_key.clone();
        let hook = self.hook.clone();
        self.in_flight.spawn(async move {
            let result = post_batch(&client, &url, &api_key, &batch).await;
            if let Err(ref e) = result {
                error!(num_events = events, "dropping unflushed batch: {e}");
            }
            if let Some(hook) = hook {
                hook(FlushReport {
                    streams,
                    events,
                    result,
                });
            }
            drop(permit);
        });
    }
}

/// One POST to the collect endpoint, body keyed by stream name.
async fn post_batch(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    batch: &HashMap<String, Vec<Event>>,
) -> Result<(), ApiError> {
    let body = serde_json::to_vec(batch).map_err(|e| {
        error!("failed to serialize request body: {e}");
        ApiError::InvalidBody
    })?;

    let response = client
        .post(url)
        .header(USER_AGENT, floodgate_core::USER_AGENT)
        .header(ACCEPT, "application/json")
        .header(CONTENT_TYPE, "application/json")
        .header(CONTENT_LENGTH, body.len())
        .basic_auth(api_key, Some(""))
        .body(body)
        .send()
        .await
        .map_err(|e| {
            error!("request to the Floodgate API failed: {e}");
            if e.is_timeout() {
                ApiError::Timeout
            } else {
                ApiError::RequestFailed
            }
        })?;

    let status = response.status().as_u16();
    if status == 200 {
        return Ok(());
    }
    match error_from_status(status) {
        None => Ok(()),
        Some(e) => {
            error!(status_code = status, "the Floodgate API returned an invalid status code");
            Err(e)
        }
    }
}
