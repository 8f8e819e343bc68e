//! Outbound state pushes to the tracking server.
//!
//! Fire-and-forget semantics: no retries here, every failure is logged and
//! the controller's next cycle re-attempts naturally through its own state
//! re-evaluation. Payloads are partial: absent fields are stripped before
//! the request is built.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::{ApiClient, ApiError, UpdateFields};
use crate::sampler::Fix;

/// Sends local state changes to the server.
pub struct RemoteUpdater<C: ApiClient> {
    client: Arc<C>,
}

impl<C: ApiClient> Clone for RemoteUpdater<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
        }
    }
}

impl<C: ApiClient + 'static> RemoteUpdater<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    /// Send a location heartbeat tagged with an active emergency.
    pub async fn send_location(&self, username: &str, fix: Fix) -> Result<(), ApiError> {
        let fields = UpdateFields::location(username, fix.latitude, fix.longitude);
        self.client.send_update(&fields).await?;
        debug!(
            latitude = fix.latitude,
            longitude = fix.longitude,
            "Location heartbeat sent"
        );
        Ok(())
    }

    /// Spawn a location heartbeat send without waiting for completion.
    ///
    /// Failures are logged; the next sample is the retry.
    pub fn dispatch_location(&self, username: String, fix: Fix) {
        let updater = self.clone();
        tokio::spawn(async move {
            if let Err(error) = updater.send_location(&username, fix).await {
                warn!(%error, "Location heartbeat failed");
            }
        });
    }

    /// Toggle the emergency flag, with an optional description when raising.
    pub async fn send_emergency_flag(
        &self,
        username: &str,
        active: bool,
        description: Option<&str>,
    ) -> Result<(), ApiError> {
        let fields = UpdateFields::emergency(username, active, description);
        self.client.send_update(&fields).await?;
        debug!(active, "Emergency flag sent");
        Ok(())
    }

    /// Clear the server-side confirmation flag.
    pub async fn send_acknowledgement(&self, username: &str) -> Result<(), ApiError> {
        let fields = UpdateFields::acknowledgement(username);
        self.client.send_update(&fields).await?;
        debug!("Confirmation clear sent");
        Ok(())
    }
}
