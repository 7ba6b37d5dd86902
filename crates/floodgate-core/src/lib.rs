// Copyright 2025-Present Floodgate, Inc. https://www.floodgate.dev/
// SPDX-License-Identifier: Apache-2.0

//! Shared plumbing for the Floodgate Rust client components: the event
//! model, the error taxonomy, configuration, and the one-shot request
//! executor used for plain API calls.
//!
//! The two long-running components, the batching collector and the
//! streaming subscription, live in the `floodgate-ingest` crate and build
//! on the types defined here.

pub mod api;
pub mod config;
pub mod error;
pub mod event;

pub use api::{ApiClient, ApiResponse};
pub use config::{ClientConfig, CollectorConfig, SubscriptionConfig, DEFAULT_ENDPOINT};
pub use error::ApiError;
pub use event::Event;

/// Version of the client library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `User-Agent` sent on every request to the Floodgate API.
pub const USER_AGENT: &str = concat!("floodgate-rust (version: ", env!("CARGO_PKG_VERSION"), ")");
