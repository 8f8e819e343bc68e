//! The reporting controller state machine.
//!
//! Single authoritative decision point: from each poll cycle's server flags
//! and the persisted heartbeat state, decide whether the location sampler
//! must be started, kept running, or stopped, and whether a confirmation
//! clear must be pushed to the server.
//!
//! # Decision table
//!
//! | emergency | confirmation | action |
//! |-----------|--------------|--------|
//! | inactive  | unconfirmed  | ensure stopped |
//! | inactive  | confirmed    | ensure stopped, acknowledge once |
//! | active    | unconfirmed  | ensure started |
//! | active    | confirmed    | ensure started (emergency flag is authoritative) |
//!
//! # Concurrency
//!
//! The controller is invoked from the poll loop, the sample listener, and
//! outbound-call completions. One mutex serializes the volatile running
//! flag and the acknowledgement guards; the heartbeat store is only
//! mutated under that lock, so store and flag behave as a single resource.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError, ConfirmationStatus, UserStatus};
use crate::config::TrackerConfig;
use crate::sampler::{Fix, FixProvider, LocationSampler, SamplerEvent};
use crate::store::HeartbeatStore;
use crate::time::Clock;
use crate::updater::RemoteUpdater;

use super::permission::PermissionGate;

/// Result of an ensure-start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The platform sampler was started and the running marker persisted.
    Started,
    /// The local flag already says running; nothing to do.
    AlreadyRunning,
    /// Persisted state shows a fresh heartbeat from another owner (for
    /// example a prior process generation); adopted without re-invoking
    /// the platform start.
    Adopted,
    /// A stop happened inside the debounce window; the request was ignored.
    Debounced,
    /// Required permissions are missing; start deferred to a later cycle.
    PermissionDenied,
}

/// Volatile controller state, serialized by one mutex.
#[derive(Debug, Default)]
struct ControlState {
    /// Local running flag for the sampler. Owned here, not a process-wide
    /// global; persisted state may disagree after a crash.
    sampler_running: bool,

    /// An acknowledgement request is outstanding.
    ack_in_flight: bool,

    /// An acknowledgement succeeded for the current
    /// inactive-but-confirmed episode; reset when the episode ends.
    ack_sent: bool,

    /// Latest server flags, gating sample forwarding.
    emergency_active: bool,
    confirmation: ConfirmationStatus,
}

/// The status-polling / location-heartbeat coordination state machine.
pub struct ReportingController<C: ApiClient, P: FixProvider> {
    username: String,
    updater: RemoteUpdater<C>,
    sampler: LocationSampler<P>,
    store: Arc<dyn HeartbeatStore>,
    permissions: Arc<dyn PermissionGate>,
    clock: Arc<dyn Clock>,
    config: TrackerConfig,
    state: Arc<Mutex<ControlState>>,
}

impl<C, P> ReportingController<C, P>
where
    C: ApiClient + 'static,
    P: FixProvider + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        username: impl Into<String>,
        updater: RemoteUpdater<C>,
        sampler: LocationSampler<P>,
        store: Arc<dyn HeartbeatStore>,
        permissions: Arc<dyn PermissionGate>,
        clock: Arc<dyn Clock>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            username: username.into(),
            updater,
            sampler,
            store,
            permissions,
            clock,
            config,
            state: Arc::new(Mutex::new(ControlState::default())),
        }
    }

    /// Whether the controller currently believes the reporting loop is up.
    pub fn is_reporting(&self) -> bool {
        self.lock_state().sampler_running
    }

    /// Feed one poll cycle's result into the state machine.
    ///
    /// `None` means "status unknown this cycle" (poll failed): no state
    /// changes, the next cycle re-evaluates.
    pub fn apply_status(&self, status: Option<&UserStatus>) {
        let Some(status) = status else {
            debug!("Status unknown this cycle, keeping current state");
            return;
        };

        {
            let mut state = self.lock_state();
            state.emergency_active = status.emergency_active;
            state.confirmation = status.confirmation;

            let ack_condition =
                !status.emergency_active && status.confirmation == ConfirmationStatus::Confirmed;
            if !ack_condition {
                // Episode over (or never started): allow a future ack
                state.ack_sent = false;
            }
        }

        match (status.emergency_active, status.confirmation) {
            (true, confirmation) => {
                if confirmation == ConfirmationStatus::Confirmed {
                    debug!("Emergency still active despite confirmation, keeping loop running");
                }
                let outcome = self.ensure_started();
                debug!(?outcome, "Ensure-start evaluated");
            }
            (false, ConfirmationStatus::Confirmed) => {
                self.ensure_stopped();
                self.maybe_dispatch_acknowledgement();
            }
            (false, ConfirmationStatus::Unconfirmed) => {
                self.ensure_stopped();
            }
        }
    }

    /// Start the reporting loop unless something says not to.
    ///
    /// Gating order: local flag, debounce window, persisted fresh
    /// heartbeat (adoption), permissions.
    pub fn ensure_started(&self) -> StartOutcome {
        let now_ms = self.clock.now_ms();
        let mut state = self.lock_state();

        if state.sampler_running {
            return StartOutcome::AlreadyRunning;
        }

        let persisted = self.store.get();

        if persisted.stopped_within(now_ms, self.config.debounce_window) {
            debug!(
                last_stopped_ms = persisted.last_stopped_ms,
                "Start request inside debounce window, ignoring"
            );
            return StartOutcome::Debounced;
        }

        if persisted.is_running && persisted.heartbeat_fresh(now_ms, self.config.heartbeat_timeout) {
            info!(
                last_heartbeat_ms = persisted.last_heartbeat_ms,
                "Persisted loop heartbeat is fresh, adopting without platform start"
            );
            state.sampler_running = true;
            return StartOutcome::Adopted;
        }

        if !self.permissions.location_reporting_granted() {
            info!("Location permissions not granted, deferring start");
            return StartOutcome::PermissionDenied;
        }

        self.sampler.start();
        state.sampler_running = true;
        self.store.set_running(true);
        self.store.record_heartbeat(now_ms);
        info!("Location reporting started");
        StartOutcome::Started
    }

    /// Stop the reporting loop if either the local or persisted flag says
    /// it is running. Returns whether a stop was performed.
    pub fn ensure_stopped(&self) -> bool {
        let now_ms = self.clock.now_ms();
        let mut state = self.lock_state();

        let persisted = self.store.get();
        if !state.sampler_running && !persisted.is_running {
            return false;
        }

        self.sampler.stop();
        state.sampler_running = false;
        self.store.set_running(false);
        self.store.record_stop(now_ms);
        info!("Location reporting stopped");
        true
    }

    /// Handle an event from the sampling loop.
    pub fn handle_sampler_event(&self, event: SamplerEvent) {
        match event {
            SamplerEvent::Sample(fix) => self.handle_sample(fix),
            SamplerEvent::Failed(error) => {
                warn!(%error, "Location provider failed, stopping reporting");
                self.ensure_stopped();
            }
        }
    }

    /// Raise the emergency flag server-side, then drive the local state
    /// machine immediately instead of waiting for the next poll.
    pub async fn activate_emergency(
        &self,
        description: Option<&str>,
    ) -> Result<StartOutcome, ApiError> {
        self.updater
            .send_emergency_flag(&self.username, true, description)
            .await?;
        self.lock_state().emergency_active = true;
        info!("Emergency raised");
        Ok(self.ensure_started())
    }

    /// Clear the emergency flag server-side and stop reporting.
    pub async fn cancel_emergency(&self) -> Result<(), ApiError> {
        self.updater
            .send_emergency_flag(&self.username, false, None)
            .await?;
        self.lock_state().emergency_active = false;
        info!("Emergency cancelled");
        self.ensure_stopped();
        Ok(())
    }

    /// Record a validated sample and forward it if the emergency is still
    /// active per the latest known server state.
    fn handle_sample(&self, fix: Fix) {
        let now_ms = self.clock.now_ms();
        let emergency_active = {
            let state = self.lock_state();
            // Timestamp only. The running flag is owned by the start/stop
            // paths; a sample racing a stop must not resurrect it, or a
            // later ensure-start would adopt a loop that no longer exists.
            self.store.record_heartbeat(now_ms);
            state.emergency_active
        };

        if emergency_active {
            self.updater.dispatch_location(self.username.clone(), fix);
        } else {
            debug!("Emergency no longer active, sample recorded but not forwarded");
        }
    }

    /// Dispatch a confirmation clear, at most one concurrently and at most
    /// one successful send per inactive-but-confirmed episode.
    fn maybe_dispatch_acknowledgement(&self) {
        {
            let mut state = self.lock_state();
            if state.ack_sent {
                return;
            }
            if state.ack_in_flight {
                debug!("Acknowledgement already in flight, skipping");
                return;
            }
            state.ack_in_flight = true;
        }

        info!("Dispatching confirmation clear");
        let updater = self.updater.clone();
        let username = self.username.clone();
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let result = updater.send_acknowledgement(&username).await;
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            state.ack_in_flight = false;
            match result {
                Ok(()) => state.ack_sent = true,
                Err(error) => {
                    warn!(%error, "Acknowledgement failed, next cycle retries");
                }
            }
        });
    }

    fn lock_state(&self) -> MutexGuard<'_, ControlState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
