// Copyright 2025-Present Floodgate, Inc. https://www.floodgate.dev/
// SPDX-License-Identifier: Apache-2.0

//! Resilient streaming subscriber for `/subscribe` endpoints.
//!
//! A [`Subscription`] holds one long-lived GET against a resource's feed
//! and decodes the CRLF-framed JSON events it carries. Transient
//! failures (connection loss, 429/500/502/504) reconnect with capped
//! exponential backoff; a 404 or any other status stops the loop with a
//! terminal error that [`Subscription::stop`] reports.

use std::sync::{Arc, Mutex};

use bytes::BytesMut;
use floodgate_core::api::is_subscribe_path_valid;
use floodgate_core::config::ClientConfig;
use floodgate_core::error::ApiError;
use floodgate_core::event::Event;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::backoff::Backoff;
use crate::framing::next_frame;

/// Lifecycle of a [`Subscription`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Created, not yet started.
    Idle,
    /// Issuing the streaming GET.
    Connecting,
    /// Frames are being decoded and delivered.
    Connected,
    /// Waiting out a reconnect delay.
    BackingOff,
    /// Terminal: permanent failure or cancellation.
    Stopped,
}

/// A long-lived subscription to one resource's event feed.
pub struct Subscription {
    url: String,
    config: ClientConfig,
    api_key: String,
    client: reqwest::Client,
    state: Arc<Mutex<SubscriptionState>>,
    shutdown: CancellationToken,
    sender: Mutex<Option<mpsc::Sender<Event>>>,
    receiver: Mutex<Option<mpsc::Receiver<Event>>>,
    task: Mutex<Option<JoinHandle<Result<(), ApiError>>>>,
    terminal: Mutex<Option<ApiError>>,
}

impl Subscription {
    /// Prepares a subscription to `{endpoint}{path}/subscribe`.
    ///
    /// Fails fast when `path` is not a subscribable resource path or the
    /// configuration is malformed. Only the connection attempt is given
    /// a timeout; the streaming response itself stays open indefinitely.
    pub fn new(api_key: &str, path: &str, config: ClientConfig) -> Result<Self, ApiError> {
        config.validate()?;
        if !is_subscribe_path_valid(path) {
            return Err(ApiError::InvalidPath);
        }
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        let (sender, receiver) = mpsc::channel(1);
        Ok(Self {
            url: format!("{}{}/subscribe", config.endpoint, path),
            config,
            api_key: api_key.to_string(),
            client,
            state: Arc::new(Mutex::new(SubscriptionState::Idle)),
            shutdown: CancellationToken::new(),
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
            task: Mutex::new(None),
            terminal: Mutex::new(None),
        })
    }

    /// Takes the receive side of the delivery channel.
    ///
    /// Delivery is a synchronous hand-off: the read loop stages at most
    /// one decoded event here and does not pull further frames off the
    /// wire until the consumer has taken it. The channel closes exactly
    /// once, when the background loop exits; `None` from `recv` means no
    /// more events will ever arrive. Returns `None` on a second call.
    pub fn events(&self) -> Option<mpsc::Receiver<Event>> {
        self.receiver.lock().expect("lock poisoned").take()
    }

    /// Starts the reconnect loop in the background and returns
    /// immediately.
    ///
    /// Must be called from within a tokio runtime. Starting an
    /// already-started subscription is a caller error: the second call
    /// logs a warning and does nothing.
    pub fn start(&self) {
        let Some(sender) = self.sender.lock().expect("lock poisoned").take() else {
            warn!(url = %self.url, "subscription already started");
            return;
        };
        let driver = Driver {
            api_key: self.api_key.clone(),
            url: self.url.clone(),
            client: self.client.clone(),
            backoff: Backoff::new(
                self.config.subscription.initial_interval,
                self.config.subscription.max_interval,
            ),
            events: sender,
            state: Arc::clone(&self.state),
            shutdown: self.shutdown.clone(),
        };
        *self.task.lock().expect("lock poisoned") = Some(tokio::spawn(driver.run()));
    }

    /// Requests cancellation, waits for the background loop to exit, and
    /// returns the terminal error the loop recorded (`Ok` when
    /// cancellation was the cause).
    ///
    /// Safe to call repeatedly; later calls return the recorded outcome
    /// again without touching the already-closed channel.
    pub async fn stop(&self) -> Result<(), ApiError> {
        self.shutdown.cancel();
        let task = self.task.lock().expect("lock poisoned").take();
        if let Some(task) = task {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => *self.terminal.lock().expect("lock poisoned") = Some(e),
                Err(e) => error!("subscription task failed: {e}"),
            }
        }
        match self.terminal.lock().expect("lock poisoned").clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Best-effort: whether the background loop is still alive. Racy
    /// with respect to internal transitions; not for correctness
    /// decisions.
    pub fn is_running(&self) -> bool {
        !matches!(
            *self.state.lock().expect("lock poisoned"),
            SubscriptionState::Idle | SubscriptionState::Stopped
        )
    }

    /// Best-effort: whether a connection is currently delivering frames.
    pub fn is_connected(&self) -> bool {
        *self.state.lock().expect("lock poisoned") == SubscriptionState::Connected
    }
}

enum ReceiveEnd {
    /// The response body ended or errored; reconnect.
    Stream,
    /// Shutdown (or a dropped consumer) interrupted delivery.
    Cancelled,
}

/// The background reconnect-and-decode loop.
struct Driver {
    api_key: String,
    url: String,
    client: reqwest::Client,
    backoff: Backoff,
    events: mpsc::Sender<Event>,
    state: Arc<Mutex<SubscriptionState>>,
    shutdown: CancellationToken,
}

impl Driver {
    async fn run(mut self) -> Result<(), ApiError> {
        let outcome = self.reconnect_loop().await;
        self.set_state(SubscriptionState::Stopped);
        if let Err(ref e) = outcome {
            error!(url = %self.url, "subscription terminated: {e}");
        }
        outcome
    }

    async fn reconnect_loop(&mut self) -> Result<(), ApiError> {
        loop {
            self.set_state(SubscriptionState::Connecting);
            let request = self
                .client
                .get(&self.url)
                .header(USER_AGENT, floodgate_core::USER_AGENT)
                .header(ACCEPT, "application/json")
                .header(CONTENT_TYPE, "application/json")
                .basic_auth(&self.api_key, Some(""));

            let response = tokio::select! {
                response = request.send() => response,
                _ = self.shutdown.cancelled() => return Ok(()),
            };

            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    error!(url = %self.url, "request to the Floodgate API failed: {e}");
                    return Err(if e.is_timeout() {
                        ApiError::Timeout
                    } else {
                        ApiError::RequestFailed
                    });
                }
            };

            match response.status().as_u16() {
                200 => {
                    self.set_state(SubscriptionState::Connected);
                    let end = self.receive(response).await;
                    self.set_state(SubscriptionState::BackingOff);
                    if matches!(end, ReceiveEnd::Cancelled) {
                        return Ok(());
                    }
                    self.backoff.reset();
                }
                status @ (429 | 500 | 502 | 504) => {
                    warn!(status_code = status, "retryable status from subscribe endpoint");
                    self.set_state(SubscriptionState::BackingOff);
                }
                404 => return Err(ApiError::ResourceMissing),
                status => {
                    error!(status_code = status, "the Floodgate API returned an invalid status code");
                    return Err(ApiError::ServerError);
                }
            }

            let Some(delay) = self.backoff.next_delay() else {
                return Err(ApiError::Timeout);
            };
            tokio::select! {
                _ = sleep(delay) => {}
                _ = self.shutdown.cancelled() => return Ok(()),
            }
        }
    }

    /// Reads the open body, handing decoded frames to the delivery
    /// channel until the stream ends, errors, or shutdown wins.
    async fn receive(&mut self, response: reqwest::Response) -> ReceiveEnd {
        let mut stream = response.bytes_stream();
        let mut buf = BytesMut::new();

        loop {
            let chunk = tokio::select! {
                chunk = stream.next() => chunk,
                _ = self.shutdown.cancelled() => return ReceiveEnd::Cancelled,
            };
            match chunk {
                Some(Ok(bytes)) => {
                    buf.extend_from_slice(&bytes);
                    while let Some(frame) = next_frame(&mut buf, false) {
                        if !self.deliver(&frame).await {
                            return ReceiveEnd::Cancelled;
                        }
                    }
                }
                Some(Err(e)) => {
                    // Read errors caused by our own shutdown tearing the
                    // connection down are not worth reporting.
                    if !self.shutdown.is_cancelled() {
                        error!("error reading subscription data: {e}");
                    }
                    break;
                }
                None => break,
            }
        }

        while let Some(frame) = next_frame(&mut buf, true) {
            if !self.deliver(&frame).await {
                return ReceiveEnd::Cancelled;
            }
        }
        ReceiveEnd::Stream
    }

    /// Decodes and delivers one frame. Returns `false` when delivery was
    /// interrupted by shutdown or the consumer dropped the receiver.
    async fn deliver(&self, frame: &[u8]) -> bool {
        if frame.is_empty() {
            // Keep-alive.
            return true;
        }
        let event: Event = match serde_json::from_slice(frame) {
            Ok(event) => event,
            Err(e) => {
                error!("failed to parse incoming event: {e}");
                return true;
            }
        };
        tokio::select! {
            sent = self.events.send(event) => match sent {
                Ok(()) => true,
                Err(_) => {
                    debug!("event receiver dropped, stopping delivery");
                    false
                }
            },
            _ = self.shutdown.cancelled() => false,
        }
    }

    fn set_state(&self, state: SubscriptionState) {
        *self.state.lock().expect("lock poisoned") = state;
    }
}
