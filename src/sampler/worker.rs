//! Location sampling loop.
//!
//! Once started, [`LocationSampler`] asks the platform provider for a fix
//! at a fixed cadence and forwards validated samples over an mpsc channel
//! until stopped or the provider permanently fails. Start and stop are
//! idempotent: the running state is a non-cancelled [`CancellationToken`],
//! so a second `start()` never double-registers a loop.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_SAMPLE_CADENCE_SECS;

use super::provider::{Fix, FixError, FixProvider};

/// Events emitted by the sampling loop.
#[derive(Debug)]
pub enum SamplerEvent {
    /// A validated position sample.
    Sample(Fix),
    /// The provider permanently failed; the loop has exited.
    Failed(FixError),
}

/// Configuration for the sampling loop.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// How often to ask the provider for a fix.
    pub cadence: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            cadence: Duration::from_secs(DEFAULT_SAMPLE_CADENCE_SECS),
        }
    }
}

/// Restartable location sampling loop.
///
/// At most one loop is active per sampler at any time. Stopping cancels
/// the loop's token; the task observes the cancellation on its next tick
/// and exits. A permanently failed provider cancels its own token before
/// exiting, so the sampler reads as stopped afterwards.
pub struct LocationSampler<P: FixProvider> {
    provider: Arc<P>,
    events_tx: mpsc::Sender<SamplerEvent>,
    config: SamplerConfig,
    active: Mutex<Option<CancellationToken>>,
}

impl<P: FixProvider + 'static> LocationSampler<P> {
    pub fn new(provider: Arc<P>, events_tx: mpsc::Sender<SamplerEvent>, config: SamplerConfig) -> Self {
        Self {
            provider,
            events_tx,
            config,
            active: Mutex::new(None),
        }
    }

    /// Whether a sampling loop is currently active.
    pub fn is_active(&self) -> bool {
        self.lock_active()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// Start the sampling loop. Returns `false` (no-op) if already active.
    pub fn start(&self) -> bool {
        let mut active = self.lock_active();
        if active.as_ref().is_some_and(|token| !token.is_cancelled()) {
            debug!("Sampler already active, skipping start");
            return false;
        }

        let token = CancellationToken::new();
        *active = Some(token.clone());

        let provider = Arc::clone(&self.provider);
        let events_tx = self.events_tx.clone();
        let cadence = self.config.cadence;
        tokio::spawn(async move {
            run_loop(provider, events_tx, cadence, token).await;
        });
        true
    }

    /// Stop the sampling loop. Returns `false` (no-op) if already stopped.
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

    fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run_loop<P: FixProvider>(
    provider: Arc<P>,
    events_tx: mpsc::Sender<SamplerEvent>,
    cadence: Duration,
    token: CancellationToken,
) {
    info!(cadence_ms = cadence.as_millis() as u64, "Location sampler started");

    let mut interval = tokio::time::interval(cadence);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => {
                match provider.current_fix().await {
                    Ok(fix) if fix.is_finite() => {
                        if events_tx.send(SamplerEvent::Sample(fix)).await.is_err() {
                            debug!("Sampler channel closed, stopping");
                            token.cancel();
                            break;
                        }
                    }
                    Ok(fix) => {
                        warn!(
                            latitude = fix.latitude,
                            longitude = fix.longitude,
                            "Dropping non-finite fix"
                        );
                    }
                    Err(error) if error.is_permanent() => {
                        warn!(%error, "Location provider failed permanently, stopping sampler");
                        token.cancel();
                        let _ = events_tx.send(SamplerEvent::Failed(error)).await;
                        break;
                    }
                    Err(error) => {
                        debug!(%error, "No fix this cycle");
                    }
                }
            }
        }
    }

    info!("Location sampler stopped");
}
