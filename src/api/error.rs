//! Error types for the remote status API.

use thiserror::Error;

/// Errors that can occur when talking to the tracking server.
///
/// All variants are transient from the core's point of view: the poll loop
/// reports "status unknown this cycle" and the next cycle retries.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The HTTP request itself failed (connection, timeout, DNS).
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The server answered with a non-success HTTP status.
    #[error("Server returned HTTP {0}")]
    ServerStatus(u16),

    /// Response body could not be parsed.
    #[error("Failed to parse response: {0}")]
    Json(String),

    /// The requested user does not exist in the server's data set.
    #[error("User {0} not found")]
    UserNotFound(String),
}
