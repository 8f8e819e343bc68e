//! Status polling loop.
//!
//! While the app is foregrounded, [`StatusPoller`] fetches the server
//! record for the active user on a fixed interval (first fetch immediately
//! on start) and feeds each result into the reporting controller. A manual
//! refresh performs one out-of-band fetch without disturbing the interval
//! timer; the `refreshing` watch flips back to `false` exactly once per
//! trigger, whether or not the fetch succeeded.
//!
//! A failed poll is reported to the controller as "status unknown this
//! cycle"; one failure never tears down the loop.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, UserStatus};
use crate::reporting::ReportingController;
use crate::sampler::FixProvider;

/// Shared internals, cloned into the poll task and refresh tasks.
struct PollerShared<C: ApiClient, P: FixProvider> {
    client: Arc<C>,
    controller: Arc<ReportingController<C, P>>,
    username: String,
    refreshing_tx: watch::Sender<bool>,
    status_tx: watch::Sender<Option<UserStatus>>,
}

impl<C, P> PollerShared<C, P>
where
    C: ApiClient + 'static,
    P: FixProvider + 'static,
{
    /// One poll cycle. `manual` marks an out-of-band refresh whose
    /// indicator must be cleared on completion.
    async fn poll_once(&self, manual: bool) {
        if self.username.is_empty() {
            warn!("Status poll skipped, no active username");
            if manual {
                let _ = self.refreshing_tx.send(false);
            }
            return;
        }

        let result = self.client.fetch_status(&self.username).await;

        if manual {
            let _ = self.refreshing_tx.send(false);
        }

        match result {
            Ok(status) => {
                debug!(
                    emergency_active = status.emergency_active,
                    confirmation = %status.confirmation,
                    "Status poll succeeded"
                );
                let _ = self.status_tx.send(Some(status.clone()));
                self.controller.apply_status(Some(&status));
            }
            Err(error) => {
                warn!(%error, "Status poll failed");
                self.controller.apply_status(None);
            }
        }
    }
}

/// Fixed-interval status poller with manual out-of-band refresh.
///
/// State machine: `Idle -> Polling` on `start()`, back to `Idle` on
/// `stop()`. Both transitions are idempotent.
pub struct StatusPoller<C: ApiClient, P: FixProvider> {
    shared: Arc<PollerShared<C, P>>,
    interval: Duration,
    active: Mutex<Option<CancellationToken>>,
}

impl<C, P> StatusPoller<C, P>
where
    C: ApiClient + 'static,
    P: FixProvider + 'static,
{
    /// Create a poller for the given user. An empty username yields no-op
    /// polls that still clear any pending refresh indicator.
    pub fn new(
        client: Arc<C>,
        controller: Arc<ReportingController<C, P>>,
        username: impl Into<String>,
        interval: Duration,
    ) -> Self {
        let (refreshing_tx, _) = watch::channel(false);
        let (status_tx, _) = watch::channel(None);
        Self {
            shared: Arc::new(PollerShared {
                client,
                controller,
                username: username.into(),
                refreshing_tx,
                status_tx,
            }),
            interval,
            active: Mutex::new(None),
        }
    }

    /// Watch the manual-refresh indicator.
    pub fn refreshing(&self) -> watch::Receiver<bool> {
        self.shared.refreshing_tx.subscribe()
    }

    /// Watch the latest successfully fetched status.
    pub fn latest_status(&self) -> watch::Receiver<Option<UserStatus>> {
        self.shared.status_tx.subscribe()
    }

    /// Whether the interval loop is running.
    pub fn is_polling(&self) -> bool {
        self.lock_active()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// Enter `Polling`. The first fetch fires immediately. Returns `false`
    /// (no-op) if already polling.
    pub fn start(&self) -> bool {
        let mut active = self.lock_active();
        if active.as_ref().is_some_and(|token| !token.is_cancelled()) {
            debug!("Status poller already running, skipping start");
            return false;
        }

        let token = CancellationToken::new();
        *active = Some(token.clone());

        let shared = Arc::clone(&self.shared);
        let interval = self.interval;
        tokio::spawn(async move {
            info!(
                interval_secs = interval.as_secs(),
                username = %shared.username,
                "Status poller started"
            );
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => shared.poll_once(false).await,
                }
            }
            info!("Status poller stopped");
        });
        true
    }

    /// Return to `Idle`. Returns `false` (no-op) if already stopped.
    pub fn stop(&self) -> bool {
        let mut active = self.lock_active();
        match active.take() {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Trigger one immediate out-of-band fetch. The interval timer is not
    /// disturbed; works from `Idle` as well.
    pub fn refresh(&self) {
        let _ = self.shared.refreshing_tx.send(true);
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            shared.poll_once(true).await;
        });
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
