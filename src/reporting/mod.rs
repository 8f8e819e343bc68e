//! Reporting coordination.
//!
//! # Components
//!
//! - [`controller`] - [`ReportingController`], the core state machine
//! - [`permission`] - [`PermissionGate`] seam for platform grants

mod controller;
mod permission;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::api::ApiClient;
use crate::sampler::{FixProvider, SamplerEvent};

pub use controller::{ReportingController, StartOutcome};
pub use permission::{AlwaysGranted, Permission, PermissionGate};

/// Forward sampler events to the controller until the channel closes.
///
/// This is the single evaluation point for sample callbacks: the sampler
/// task pushes events onto the channel, and this task serializes them into
/// the controller.
pub fn spawn_sample_listener<C, P>(
    controller: Arc<ReportingController<C, P>>,
    mut events_rx: mpsc::Receiver<SamplerEvent>,
) -> tokio::task::JoinHandle<()>
where
    C: ApiClient + 'static,
    P: FixProvider + 'static,
{
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            controller.handle_sampler_event(event);
        }
        debug!("Sample listener stopped (channel closed)");
    })
}
