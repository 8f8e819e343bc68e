//! Remote tracking server interface.
//!
//! # Components
//!
//! - [`types`] - Wire records, [`UserStatus`] projection, partial update payloads
//! - [`client`] - [`ApiClient`] seam and the `reqwest`-backed [`HttpApiClient`]
//! - [`error`] - [`ApiError`]

mod client;
mod error;
mod types;

pub use client::{ApiClient, HttpApiClient};
pub use error::ApiError;
pub use types::{ConfirmationStatus, StatusResponse, UpdateFields, UserRecord, UserStatus};
