// Copyright 2025-Present Floodgate, Inc. https://www.floodgate.dev/
// SPDX-License-Identifier: Apache-2.0

//! Configuration for the Floodgate client components.

use std::time::Duration;

use reqwest::Url;

use crate::error::ApiError;

/// Default base URL of the hosted Floodgate API.
pub const DEFAULT_ENDPOINT: &str = "https://api.floodgate.dev/v1";

/// Reconnect behavior of a streaming subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    /// First reconnect delay after a retryable failure.
    pub initial_interval: Duration,
    /// Upper bound on the reconnect delay.
    pub max_interval: Duration,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(300),
        }
    }
}

/// Configuration for the one-shot API client and subscriptions.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Base URL of the Floodgate API.
    pub endpoint: String,
    /// Reconnect backoff bounds for streaming subscriptions.
    pub subscription: SubscriptionConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            subscription: SubscriptionConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Checks the configuration before any client is built.
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_endpoint(&self.endpoint)?;
        if self.subscription.initial_interval.is_zero() || self.subscription.max_interval.is_zero()
        {
            return Err(ApiError::InvalidConfig(
                "subscription backoff intervals must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the asynchronous batching collector.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Period of the timer-driven flush.
    pub flush_interval: Duration,
    /// Aggregate buffered-event count that triggers an immediate flush.
    pub batch_size: usize,
    /// Per-request HTTP timeout for flush calls.
    pub timeout: Duration,
    /// Base URL of the Floodgate API.
    pub endpoint: String,
    /// Enables per-request debug logging.
    pub debug: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_millis(250),
            batch_size: 1000,
            timeout: Duration::from_secs(5),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            debug: false,
        }
    }
}

impl CollectorConfig {
    /// Checks the configuration before the coordinator task is spawned.
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_endpoint(&self.endpoint)?;
        if self.flush_interval.is_zero() {
            return Err(ApiError::InvalidConfig(
                "flush interval must be non-zero".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ApiError::InvalidConfig(
                "batch size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_endpoint(endpoint: &str) -> Result<(), ApiError> {
    Url::parse(endpoint)
        .map_err(|e| ApiError::InvalidConfig(format!("endpoint {endpoint:?} is not a valid URL: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ClientConfig::default().validate().is_ok());
        assert!(CollectorConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_malformed_endpoint() {
        let config = ClientConfig {
            endpoint: "not a url".to_string(),
            ..ClientConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ApiError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_zero_intervals() {
        let mut config = ClientConfig::default();
        config.subscription.initial_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        let config = CollectorConfig {
            flush_interval: Duration::ZERO,
            ..CollectorConfig::default()
        };
        assert!(config.validate().is_err());

        let config = CollectorConfig {
            batch_size: 0,
            ..CollectorConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
