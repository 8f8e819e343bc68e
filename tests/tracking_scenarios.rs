//! Integration tests for the tracking core.
//!
//! These tests wire the full pipeline the way an embedding app would:
//! - Status poller → reporting controller (poll drives the state machine)
//! - Sampler → event channel → sample listener → controller → updater
//! - Persisted heartbeat state across simulated process restarts
//!
//! Run with: `cargo test --test tracking_scenarios`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use vigil::api::{ApiClient, ApiError, ConfirmationStatus, UpdateFields, UserStatus};
use vigil::config::TrackerConfig;
use vigil::poller::StatusPoller;
use vigil::reporting::{spawn_sample_listener, AlwaysGranted, ReportingController, StartOutcome};
use vigil::sampler::{Fix, FixError, FixProvider, LocationSampler, SamplerConfig, SamplerEvent};
use vigil::store::{HeartbeatState, HeartbeatStore, MemoryHeartbeatStore};
use vigil::time::{Clock, ManualClock};
use vigil::updater::RemoteUpdater;

// ============================================================================
// Test Helpers
// ============================================================================

/// Fake server: serves a settable status record and records every update.
struct ScriptedServer {
    status: Mutex<Option<UserStatus>>,
    updates: Mutex<Vec<UpdateFields>>,
    fetch_count: AtomicUsize,
}

impl ScriptedServer {
    fn new(status: UserStatus) -> Self {
        Self {
            status: Mutex::new(Some(status)),
            updates: Mutex::new(Vec::new()),
            fetch_count: AtomicUsize::new(0),
        }
    }

    /// Change the status the next fetch will return. `None` makes fetches
    /// fail, simulating an unreachable server.
    fn set_status(&self, status: Option<UserStatus>) {
        *self.status.lock().unwrap() = status;
    }

    fn updates(&self) -> Vec<UpdateFields> {
        self.updates.lock().unwrap().clone()
    }

    fn location_updates(&self) -> Vec<UpdateFields> {
        self.updates()
            .into_iter()
            .filter(|u| u.la.is_some())
            .collect()
    }

    fn ack_count(&self) -> usize {
        self.updates()
            .iter()
            .filter(|u| u.conf_status == Some(0))
            .count()
    }

    fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

impl ApiClient for ScriptedServer {
    async fn fetch_status(&self, _username: &str) -> Result<UserStatus, ApiError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.status
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ApiError::Http("scripted outage".to_string()))
    }

    async fn send_update(&self, fields: &UpdateFields) -> Result<(), ApiError> {
        self.updates.lock().unwrap().push(fields.clone());
        Ok(())
    }
}

/// Provider that serves a drifting fix, or a permanent failure once armed.
struct ScriptedProvider {
    served: AtomicUsize,
    fail_permanently: Mutex<bool>,
}

impl ScriptedProvider {
    fn new() -> Self {
        Self {
            served: AtomicUsize::new(0),
            fail_permanently: Mutex::new(false),
        }
    }

    fn arm_failure(&self) {
        *self.fail_permanently.lock().unwrap() = true;
    }
}

impl FixProvider for ScriptedProvider {
    async fn current_fix(&self) -> Result<Fix, FixError> {
        if *self.fail_permanently.lock().unwrap() {
            return Err(FixError::PermissionRevoked);
        }
        let n = self.served.fetch_add(1, Ordering::SeqCst) as f64;
        Ok(Fix::new(-6.2 + n * 0.001, 106.8))
    }
}

struct Rig {
    server: Arc<ScriptedServer>,
    provider: Arc<ScriptedProvider>,
    store: Arc<MemoryHeartbeatStore>,
    clock: Arc<ManualClock>,
    controller: Arc<ReportingController<ScriptedServer, ScriptedProvider>>,
    poller: StatusPoller<ScriptedServer, ScriptedProvider>,
}

/// Wire the full pipeline with fast timers and a scripted server.
fn rig_with(initial: UserStatus, persisted: HeartbeatState) -> Rig {
    let config = TrackerConfig {
        poll_interval: Duration::from_millis(20),
        sample_cadence: Duration::from_millis(5),
        ..TrackerConfig::default()
    };

    let server = Arc::new(ScriptedServer::new(initial));
    let provider = Arc::new(ScriptedProvider::new());
    let store = Arc::new(MemoryHeartbeatStore::with_state(persisted));
    let clock = Arc::new(ManualClock::new(1_000_000));

    let (events_tx, events_rx) = mpsc::channel(64);
    let sampler = LocationSampler::new(
        Arc::clone(&provider),
        events_tx,
        SamplerConfig {
            cadence: config.sample_cadence,
        },
    );
    let controller = Arc::new(ReportingController::new(
        "andi",
        RemoteUpdater::new(Arc::clone(&server)),
        sampler,
        Arc::clone(&store) as Arc<dyn HeartbeatStore>,
        Arc::new(AlwaysGranted),
        Arc::clone(&clock) as Arc<dyn Clock>,
        config.clone(),
    ));
    spawn_sample_listener(Arc::clone(&controller), events_rx);

    let poller = StatusPoller::new(
        Arc::clone(&server),
        Arc::clone(&controller),
        "andi",
        config.poll_interval,
    );

    Rig {
        server,
        provider,
        store,
        clock,
        controller,
        poller,
    }
}

fn rig(initial: UserStatus) -> Rig {
    rig_with(initial, HeartbeatState::default())
}

fn status(emergency: bool, confirmed: bool) -> UserStatus {
    UserStatus {
        username: "andi".to_string(),
        latitude: -6.2,
        longitude: 106.8,
        emergency_active: emergency,
        confirmation: if confirmed {
            ConfirmationStatus::Confirmed
        } else {
            ConfirmationStatus::Unconfirmed
        },
        emergency_description: Some("flood".to_string()).filter(|_| emergency),
        updated_at: None,
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn active_emergency_streams_location_updates() {
    let r = rig(status(true, false));

    r.poller.start();
    tokio::time::sleep(Duration::from_millis(80)).await;
    r.poller.stop();

    assert!(r.controller.is_reporting());
    assert!(r.server.fetch_count() >= 2, "poller should have cycled");

    let sent = r.server.location_updates();
    assert!(sent.len() >= 2, "sampler should have streamed fixes");
    for update in &sent {
        assert_eq!(update.username.as_deref(), Some("andi"));
        assert_eq!(update.emr, Some(1));
        assert_eq!(update.lo, Some(106.8));
    }

    // Heartbeats were persisted alongside the forwarded samples
    let persisted = r.store.get();
    assert!(persisted.is_running);
    assert_eq!(persisted.last_heartbeat_ms, Some(1_000_000));
}

#[tokio::test]
async fn clearing_the_emergency_stops_the_stream() {
    let r = rig(status(true, false));
    r.poller.start();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(r.controller.is_reporting());

    r.server.set_status(Some(status(false, false)));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(!r.controller.is_reporting());
    assert!(!r.store.get().is_running);
    assert_eq!(r.store.get().last_stopped_ms, Some(1_000_000));

    // No more location updates once the stop has settled
    let settled = r.server.location_updates().len();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(r.server.location_updates().len(), settled);

    r.poller.stop();
}

#[tokio::test]
async fn confirmed_resolution_acknowledges_exactly_once() {
    let r = rig(status(false, true));

    r.poller.start();
    // Several poll cycles with the condition persisting
    tokio::time::sleep(Duration::from_millis(120)).await;
    r.poller.stop();

    assert!(r.server.fetch_count() >= 4);
    assert_eq!(r.server.ack_count(), 1);
    assert!(!r.controller.is_reporting());
}

#[tokio::test]
async fn server_outage_keeps_reporting_running() {
    let r = rig(status(true, false));
    r.poller.start();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(r.controller.is_reporting());

    // Outage: fetches fail, state machine holds its last decision
    r.server.set_status(None);
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert!(r.controller.is_reporting());
    assert!(r.store.get().is_running);

    r.poller.stop();
}

#[tokio::test]
async fn restart_with_fresh_heartbeat_adopts_the_loop() {
    // Simulated restart: the store says running with a 5s-old heartbeat
    let persisted = HeartbeatState {
        is_running: true,
        last_heartbeat_ms: Some(1_000_000 - 5_000),
        last_stopped_ms: None,
    };
    let r = rig_with(status(true, false), persisted);

    assert_eq!(r.controller.ensure_started(), StartOutcome::Adopted);
    assert!(r.controller.is_reporting());
    // Adoption trusts the persisted owner; no fixes of our own yet
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(r.server.location_updates().is_empty());
}

#[tokio::test]
async fn restart_with_stale_heartbeat_starts_fresh() {
    let persisted = HeartbeatState {
        is_running: true,
        last_heartbeat_ms: Some(1_000_000 - 60_000),
        last_stopped_ms: None,
    };
    let r = rig_with(status(true, false), persisted);

    r.poller.start();
    tokio::time::sleep(Duration::from_millis(60)).await;
    r.poller.stop();

    // The stale marker was overruled by a real start
    assert!(r.controller.is_reporting());
    assert!(!r.server.location_updates().is_empty());
    assert_eq!(r.store.get().last_heartbeat_ms, Some(1_000_000));
}

#[tokio::test]
async fn provider_permission_loss_shuts_the_pipeline_down() {
    let r = rig(status(true, false));
    r.poller.start();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(r.controller.is_reporting());
    r.poller.stop();

    r.provider.arm_failure();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The failure event travelled sampler → listener → controller
    assert!(!r.controller.is_reporting());
    assert!(!r.store.get().is_running);
}

#[tokio::test]
async fn manual_refresh_reaches_the_state_machine() {
    let r = rig(status(false, false));
    // No periodic polling: only the manual refresh should fetch
    assert!(!r.controller.is_reporting());

    r.server.set_status(Some(status(true, false)));
    r.poller.refresh();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(r.server.fetch_count(), 1);
    assert!(r.controller.is_reporting());
    assert!(!*r.poller.refreshing().borrow());

    r.controller.ensure_stopped();
}

#[tokio::test]
async fn latest_status_is_published_for_observers() {
    let r = rig(status(true, false));
    let mut rx = r.poller.latest_status();
    assert!(rx.borrow().is_none());

    r.poller.start();
    rx.changed().await.unwrap();
    let seen = rx.borrow().clone().unwrap();
    assert!(seen.emergency_active);
    assert_eq!(seen.username, "andi");

    r.poller.stop();
}

#[tokio::test]
async fn activating_an_emergency_locally_streams_before_the_next_poll() {
    let r = rig(status(false, false));

    let outcome = r.controller.activate_emergency(Some("trapped")).await.unwrap();
    assert_eq!(outcome, StartOutcome::Started);

    tokio::time::sleep(Duration::from_millis(40)).await;

    let updates = r.server.updates();
    assert_eq!(updates[0].emr, Some(1));
    assert_eq!(updates[0].emr_desc.as_deref(), Some("trapped"));
    assert!(!r.server.location_updates().is_empty());

    r.controller.cancel_emergency().await.unwrap();
    assert!(!r.controller.is_reporting());
    let cleared = r
        .server
        .updates()
        .into_iter()
        .any(|u| u.emr == Some(0) && u.la.is_none());
    assert!(cleared, "emergency clear should have been pushed");
}

#[tokio::test]
async fn late_sample_after_clear_is_not_forwarded() {
    let r = rig(status(true, false));
    r.controller.apply_status(Some(&status(true, false)));
    r.controller.apply_status(Some(&status(false, false)));

    r.clock.advance_ms(500);
    r.controller
        .handle_sampler_event(SamplerEvent::Sample(Fix::new(-6.3, 106.9)));
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(r.server.location_updates().is_empty());
    // The heartbeat still advanced so freshness detection keeps working
    assert_eq!(r.store.get().last_heartbeat_ms, Some(1_000_500));
    // But the persisted running marker stays cleared
    assert!(!r.store.get().is_running);

    // Once the debounce window passes, the orphaned-but-fresh heartbeat
    // must yield a real platform start, not an adoption of a dead loop
    r.clock.advance_ms(2_000);
    assert_eq!(r.controller.ensure_started(), StartOutcome::Started);
    assert!(r.controller.is_reporting());
}
