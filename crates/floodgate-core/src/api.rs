// Copyright 2025-Present Floodgate, Inc. https://www.floodgate.dev/
// SPDX-License-Identifier: Apache-2.0

//! One-shot request executor for the Floodgate API.
//!
//! [`ApiClient`] wraps plain GET/POST/PUT/DELETE calls: it validates the
//! path syntax up front, serializes JSON bodies (gzip-compressing those
//! shipped to `/collect`), attaches the standard headers and Basic auth,
//! and decodes the JSON response envelope.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header::{ACCEPT, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use serde_json::Value;
use tracing::error;

use crate::config::ClientConfig;
use crate::error::{error_from_status, ApiError};

lazy_static! {
    static ref COLLECT_PATH: Regex = Regex::new(r"^/collect").expect("static regex");
    static ref GET_PATHS: Vec<Regex> = vec![
        Regex::new(r"^/(collect|process)(/[A-Za-z][A-Za-z0-9_]*)?$").expect("static regex"),
        Regex::new(r"^/process(/[A-Za-z][A-Za-z0-9_]*(/stats)?)?$").expect("static regex"),
        Regex::new(r"^/analyze(/[A-Za-z][A-Za-z0-9_]*(/results)?)?$").expect("static regex"),
    ];
    static ref POST_PATHS: Vec<Regex> = vec![
        Regex::new(r"^/(collect|process|analyze)/[A-Za-z][A-Za-z0-9_]*$").expect("static regex"),
        Regex::new(r"^/(collect|analyze)$").expect("static regex"),
        Regex::new(r"^/analyze/[A-Za-z][A-Za-z0-9_]*/results$").expect("static regex"),
    ];
    static ref PUT_PATHS: Vec<Regex> = vec![
        Regex::new(r"^/(analyze|process)/[A-Za-z][A-Za-z0-9_]*$").expect("static regex"),
    ];
    static ref DELETE_PATHS: Vec<Regex> = vec![
        Regex::new(r"^/(collect|process|analyze)/[A-Za-z][A-Za-z0-9_]*$").expect("static regex"),
    ];
    static ref SUBSCRIBE_PATHS: Vec<Regex> = vec![
        Regex::new(r"^/(collect|process)/[A-Za-z][A-Za-z0-9_]*$").expect("static regex"),
    ];
}

/// Returns whether `path` is syntactically valid for `method`.
pub fn is_path_valid(method: &Method, path: &str) -> bool {
    let table: &[Regex] = if *method == Method::GET {
        &GET_PATHS
    } else if *method == Method::POST {
        &POST_PATHS
    } else if *method == Method::PUT {
        &PUT_PATHS
    } else if *method == Method::DELETE {
        &DELETE_PATHS
    } else {
        return false;
    };
    table.iter().any(|re| re.is_match(path))
}

/// Returns whether `path` names a resource whose feed can be subscribed
/// to.
pub fn is_subscribe_path_valid(path: &str) -> bool {
    SUBSCRIBE_PATHS.iter().any(|re| re.is_match(path))
}

/// A decoded response from the Floodgate API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code of the response.
    pub status_code: u16,
    /// JSON response body, when the service sent one.
    pub data: Option<Value>,
}

/// Client for one-shot calls against the Floodgate API.
pub struct ApiClient {
    api_key: String,
    config: ClientConfig,
    client: reqwest::Client,
}

impl ApiClient {
    /// Validates the configuration and builds the underlying HTTP client.
    pub fn new(api_key: &str, config: ClientConfig) -> Result<Self, ApiError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            api_key: api_key.to_string(),
            config,
            client,
        })
    }

    /// Issues a GET request to `path`.
    pub async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.request(Method::GET, path, None).await
    }

    /// Issues a POST request to `path` with a JSON body.
    pub async fn post(&self, path: &str, data: &Value) -> Result<ApiResponse, ApiError> {
        self.request(Method::POST, path, Some(data)).await
    }

    /// Issues a PUT request to `path` with a JSON body.
    pub async fn put(&self, path: &str, data: &Value) -> Result<ApiResponse, ApiError> {
        self.request(Method::PUT, path, Some(data)).await
    }

    /// Issues a DELETE request to `path`.
    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.request(Method::DELETE, path, None).await
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        data: Option<&Value>,
    ) -> Result<ApiResponse, ApiError> {
        if !is_path_valid(&method, path) {
            return Err(ApiError::InvalidPath);
        }

        let url = format!("{}{}", self.config.endpoint, path);
        let mut request = self
            .client
            .request(method, &url)
            .header(USER_AGENT, crate::USER_AGENT)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .basic_auth(&self.api_key, Some(""));

        if let Some(data) = data {
            let raw = serde_json::to_vec(data).map_err(|e| {
                error!("failed to serialize request body: {e}");
                ApiError::InvalidBody
            })?;
            // Event payloads written to /collect are compressed.
            let body = if COLLECT_PATH.is_match(path) {
                request = request.header(CONTENT_ENCODING, "gzip");
                compress_body(&raw)?
            } else {
                raw
            };
            request = request.header(CONTENT_LENGTH, body.len()).body(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                error!(endpoint = %self.config.endpoint, "request to the Floodgate API failed: {e}");
                return Err(if e.is_timeout() {
                    ApiError::Timeout
                } else {
                    ApiError::RequestFailed
                });
            }
        };

        let status_code = response.status().as_u16();
        let text = response.text().await.map_err(|e| {
            error!("failed to read response body: {e}");
            ApiError::InvalidResponse
        })?;
        let data = if text.is_empty() {
            None
        } else {
            match serde_json::from_str(&text) {
                Ok(value) => Some(value),
                Err(e) => {
                    error!("failed to parse response body: {e}");
                    return Err(ApiError::InvalidResponse);
                }
            }
        };

        if let Some(err) = error_from_status(status_code) {
            error!(status_code, "the Floodgate API returned an invalid status code");
            return Err(err);
        }

        Ok(ApiResponse { status_code, data })
    }
}

fn compress_body(raw: &[u8]) -> Result<Vec<u8>, ApiError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    if let Err(e) = encoder.write_all(raw) {
        error!("failed to compress request body: {e}");
        return Err(ApiError::InvalidBody);
    }
    encoder.finish().map_err(|e| {
        error!("failed to compress request body: {e}");
        ApiError::InvalidBody
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use serde_json::json;

    fn config(endpoint: &str) -> ClientConfig {
        ClientConfig {
            endpoint: endpoint.to_string(),
            ..ClientConfig::default()
        }
    }

    #[test]
    fn validates_paths_per_method() {
        assert!(is_path_valid(&Method::GET, "/collect"));
        assert!(is_path_valid(&Method::GET, "/collect/orders"));
        assert!(is_path_valid(&Method::GET, "/process/orders/stats"));
        assert!(is_path_valid(&Method::GET, "/analyze/report/results"));
        assert!(!is_path_valid(&Method::GET, "/collect/9orders"));
        assert!(!is_path_valid(&Method::GET, "/unknown"));

        assert!(is_path_valid(&Method::POST, "/collect"));
        assert!(is_path_valid(&Method::POST, "/collect/orders"));
        assert!(is_path_valid(&Method::POST, "/analyze/report/results"));
        assert!(!is_path_valid(&Method::POST, "/process"));

        assert!(is_path_valid(&Method::PUT, "/process/orders"));
        assert!(!is_path_valid(&Method::PUT, "/collect/orders"));

        assert!(is_path_valid(&Method::DELETE, "/analyze/report"));
        assert!(!is_path_valid(&Method::DELETE, "/analyze"));
    }

    #[test]
    fn validates_subscribe_paths() {
        assert!(is_subscribe_path_valid("/collect/orders"));
        assert!(is_subscribe_path_valid("/process/orders"));
        assert!(!is_subscribe_path_valid("/analyze/orders"));
        assert!(!is_subscribe_path_valid("/collect"));
    }

    #[tokio::test]
    async fn rejects_invalid_path_without_a_request() {
        let client = ApiClient::new("key", config("http://127.0.0.1:1")).unwrap();
        assert_eq!(client.get("/nope").await, Err(ApiError::InvalidPath));
    }

    #[tokio::test]
    async fn get_decodes_response_data() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/collect/orders")
            .match_header("authorization", "Basic a2V5Og==")
            .with_status(200)
            .with_body(r#"{"name":"orders"}"#)
            .create_async()
            .await;

        let client = ApiClient::new("key", config(&server.url())).unwrap();
        let response = client.get("/collect/orders").await.unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(response.data, Some(json!({"name": "orders"})));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn post_to_collect_is_gzipped() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/collect")
            .match_header("content-encoding", "gzip")
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let client = ApiClient::new("key", config(&server.url())).unwrap();
        let response = client
            .post("/collect", &json!({"orders": [{"n": 1}]}))
            .await
            .unwrap();

        assert_eq!(response.status_code, 200);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_resource_maps_to_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/collect/orders")
            .with_status(404)
            .with_body(r#"{"error":"no such stream"}"#)
            .create_async()
            .await;

        let client = ApiClient::new("key", config(&server.url())).unwrap();
        assert_eq!(
            client.get("/collect/orders").await,
            Err(ApiError::ResourceMissing)
        );
    }

    #[tokio::test]
    async fn unauthorized_maps_to_invalid_api_key() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/collect/orders")
            .with_status(401)
            .create_async()
            .await;

        let client = ApiClient::new("bad-key", config(&server.url())).unwrap();
        assert_eq!(
            client.get("/collect/orders").await,
            Err(ApiError::InvalidApiKey)
        );
    }
}
