//! Login and logout flows.
//!
//! Login verifies the username against the server's data set before
//! persisting it; the stored username then seeds the status poller on the
//! next launch. Credential handling beyond the username is out of scope;
//! the server's read endpoint is the source of truth for "does this user
//! exist".

use thiserror::Error;
use tracing::info;

use crate::api::{ApiClient, ApiError, UserStatus};
use crate::store::{SessionStore, StoreError};

/// Errors from the login flow.
#[derive(Debug, Error)]
pub enum LoginError {
    /// The username was empty after trimming.
    #[error("username must not be empty")]
    EmptyUsername,

    /// The server has no record for this username.
    #[error("user {0} not found")]
    UnknownUser(String),

    /// The verification request failed.
    #[error(transparent)]
    Api(ApiError),

    /// The session could not be persisted.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Verify a username server-side and persist the session.
///
/// Returns the user's current status so the caller can render it without
/// an extra poll.
pub async fn login<C: ApiClient>(
    client: &C,
    store: &dyn SessionStore,
    username: &str,
) -> Result<UserStatus, LoginError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(LoginError::EmptyUsername);
    }

    let status = client.fetch_status(username).await.map_err(|e| match e {
        ApiError::UserNotFound(user) => LoginError::UnknownUser(user),
        other => LoginError::Api(other),
    })?;

    store.save_login(username)?;
    info!(username, "Login recorded");
    Ok(status)
}

/// Clear the persisted session.
///
/// The caller is responsible for stopping the poller; a cleared session
/// only guarantees the next launch starts logged out.
pub fn logout(store: &dyn SessionStore) -> Result<(), StoreError> {
    store.clear_login()?;
    info!("Session cleared");
    Ok(())
}

/// The username to resume with, if a non-empty session is persisted.
pub fn restore_session(store: &dyn SessionStore) -> Option<String> {
    store.username().filter(|u| !u.is_empty())
}
