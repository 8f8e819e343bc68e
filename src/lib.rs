//! Vigil - Emergency tracking client core
//!
//! This library provides the coordination core of an emergency tracking
//! client: it polls the server for the user's emergency status, runs a
//! location sampler while an emergency is active, and pushes location and
//! acknowledgement updates back to the server.
//!
//! # Architecture
//!
//! - [`poller`]: periodic status fetch that drives the reporting state
//!   machine and publishes the latest status for UI consumption
//! - [`reporting`]: the controller that starts, adopts, or stops location
//!   reporting based on server status, persisted heartbeats, and
//!   permissions
//! - [`sampler`]: cadenced location fix acquisition behind a provider
//!   trait
//! - [`updater`]: fire-and-forget remote writes (location, emergency
//!   flag, acknowledgement)
//! - [`store`]: persisted heartbeat and session state
//! - [`session`]: login, logout, and session restore
//!
//! # Wiring
//!
//! ```ignore
//! use std::sync::Arc;
//! use vigil::api::HttpApiClient;
//! use vigil::config::TrackerConfig;
//! use vigil::poller::StatusPoller;
//! use vigil::reporting::{spawn_sample_listener, AlwaysGranted, ReportingController};
//! use vigil::sampler::{LocationSampler, SamplerConfig};
//! use vigil::store::MemoryHeartbeatStore;
//! use vigil::time::SystemClock;
//! use vigil::updater::RemoteUpdater;
//!
//! let config = TrackerConfig::default();
//! let client = Arc::new(HttpApiClient::new("https://example.com/api/"));
//! let (events_tx, events_rx) = tokio::sync::mpsc::channel(16);
//! let sampler = LocationSampler::new(
//!     provider,
//!     events_tx,
//!     SamplerConfig {
//!         cadence: config.sample_cadence,
//!     },
//! );
//! let controller = Arc::new(ReportingController::new(
//!     "andi",
//!     RemoteUpdater::new(client.clone()),
//!     sampler,
//!     Arc::new(MemoryHeartbeatStore::new()),
//!     Arc::new(AlwaysGranted),
//!     Arc::new(SystemClock),
//!     config.clone(),
//! ));
//! spawn_sample_listener(controller.clone(), events_rx);
//!
//! let poller = StatusPoller::new(client, controller, "andi", config.poll_interval);
//! poller.start();
//! ```
//!
//! All `start()` methods spawn onto the ambient tokio runtime and must be
//! called from within one.

pub mod api;
pub mod config;
pub mod poller;
pub mod reporting;
pub mod sampler;
pub mod session;
pub mod store;
pub mod time;
pub mod updater;

pub use config::TrackerConfig;
pub use poller::StatusPoller;
pub use reporting::{ReportingController, StartOutcome};

/// Version of the vigil library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
