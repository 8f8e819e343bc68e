//! API client trait and HTTP implementation.
//!
//! The [`ApiClient`] trait is the seam between the coordination core and
//! the remote server, allowing the poller, updater, and session flows to
//! run against mocks in tests. [`HttpApiClient`] talks to the real endpoint
//! via `reqwest` with a pooled client and request timeout.

use std::future::Future;
use std::time::Duration;

use super::error::ApiError;
use super::types::{StatusResponse, UpdateFields, UserStatus};

/// Default HTTP timeout for status and update requests.
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Read endpoint path, relative to the base URL.
const READ_PATH: &str = "read.php";

/// Update endpoint path, relative to the base URL.
const UPDATE_PATH: &str = "update.php";

/// Trait for talking to the tracking server.
pub trait ApiClient: Send + Sync {
    /// Fetch the current server record for a user.
    fn fetch_status(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<UserStatus, ApiError>> + Send;

    /// Push a partial update. Only the fields present in the payload are
    /// mutated server-side.
    fn send_update(
        &self,
        fields: &UpdateFields,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// HTTP client for the tracking server.
///
/// Reads are `GET` with a query string, updates are form-encoded `POST`.
/// Uses a reusable `reqwest::Client` with connection pooling and timeouts.
pub struct HttpApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpApiClient {
    /// Create a client for the given base URL (with or without a trailing
    /// slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

impl ApiClient for HttpApiClient {
    async fn fetch_status(&self, username: &str) -> Result<UserStatus, ApiError> {
        let response = self
            .http
            .get(self.endpoint(READ_PATH))
            .query(&[("username", username)])
            .send()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;

        let code = response.status();
        if !code.is_success() {
            return Err(ApiError::ServerStatus(code.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;

        let envelope: StatusResponse =
            serde_json::from_slice(&bytes).map_err(|e| ApiError::Json(e.to_string()))?;

        tracing::debug!(
            rows = envelope.data.len(),
            envelope_ok = envelope.is_ok(),
            username,
            "Status fetched"
        );

        envelope
            .data
            .iter()
            .find(|row| row.username.as_deref() == Some(username))
            .map(UserStatus::from_record)
            .ok_or_else(|| ApiError::UserNotFound(username.to_string()))
    }

    async fn send_update(&self, fields: &UpdateFields) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.endpoint(UPDATE_PATH))
            .form(fields)
            .send()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;

        let code = response.status();
        if !code.is_success() {
            return Err(ApiError::ServerStatus(code.as_u16()));
        }

        // Response envelope carries only a human-readable message; ignored.
        Ok(())
    }
}
