// Copyright 2025-Present Floodgate, Inc. https://www.floodgate.dev/
// SPDX-License-Identifier: Apache-2.0

/// Errors surfaced by the Floodgate client components.
///
/// Variants are `Clone` so a terminal error recorded by a background loop
/// can be handed back to the caller more than once.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("request to the Floodgate API failed")]
    RequestFailed,

    #[error("the Floodgate API returned an invalid status code")]
    ServerError,

    #[error("timed out while issuing requests to the Floodgate API")]
    Timeout,

    #[error("no resource with that name exists")]
    ResourceMissing,

    #[error("invalid request body")]
    InvalidBody,

    #[error("invalid response body")]
    InvalidResponse,

    #[error("invalid endpoint path")]
    InvalidPath,

    #[error("invalid API key")]
    InvalidApiKey,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Maps an HTTP status code onto the error taxonomy.
///
/// Returns `None` for statuses that count as success.
pub fn error_from_status(status: u16) -> Option<ApiError> {
    match status {
        200 | 201 => None,
        400 => Some(ApiError::InvalidBody),
        401 | 403 => Some(ApiError::InvalidApiKey),
        404 => Some(ApiError::ResourceMissing),
        504 => Some(ApiError::Timeout),
        _ => Some(ApiError::ServerError),
    }
}
