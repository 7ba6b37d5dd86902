// Copyright 2025-Present Floodgate, Inc. https://www.floodgate.dev/
// SPDX-License-Identifier: Apache-2.0

//! Long-running ingestion components for the Floodgate API.
//!
//! [`Collector`] ships application events to the collect endpoint in
//! batched, concurrency-capped POSTs without blocking its callers.
//! [`Subscription`] maintains a long-lived streaming GET against a
//! resource's feed, decoding delimiter-framed JSON events and
//! reconnecting with exponential backoff on transient failure.

mod backoff;
mod buffer;
mod framing;

pub mod collector;
pub mod subscription;

pub use collector::{Collector, CollectorClosed, FlushHook, FlushReport};
pub use subscription::{Subscription, SubscriptionState};
