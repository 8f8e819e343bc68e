//! Durable heartbeat bookkeeping for the location-reporting loop.
//!
//! The heartbeat store records whether the reporting loop is believed to be
//! running, when it last produced a sample, and when it was last stopped.
//! A restarted process uses these to tell "crashed with a stale running
//! marker" apart from "recently fresh, still valid". The running flag
//! alone is never trusted without a fresh heartbeat.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::StoreError;

/// Persisted state of the location-reporting loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatState {
    /// Whether the loop was asked to start and has not been told to stop.
    /// May be stale if the process died; judge freshness via
    /// `last_heartbeat_ms`.
    pub is_running: bool,

    /// Epoch milliseconds of the last successful location sample.
    pub last_heartbeat_ms: Option<u64>,

    /// Epoch milliseconds of the last explicit stop.
    pub last_stopped_ms: Option<u64>,
}

impl HeartbeatState {
    /// Whether the last heartbeat is younger than `timeout` as of `now_ms`.
    ///
    /// A state with no heartbeat at all is never fresh.
    pub fn heartbeat_fresh(&self, now_ms: u64, timeout: Duration) -> bool {
        match self.last_heartbeat_ms {
            Some(at) => now_ms.saturating_sub(at) < timeout.as_millis() as u64,
            None => false,
        }
    }

    /// Whether `now_ms` still falls inside the debounce window after the
    /// last stop.
    pub fn stopped_within(&self, now_ms: u64, window: Duration) -> bool {
        match self.last_stopped_ms {
            Some(at) => now_ms.saturating_sub(at) < window.as_millis() as u64,
            None => false,
        }
    }
}

/// Contract for heartbeat bookkeeping.
///
/// All operations are synchronous and safe to call from the sampling
/// callback concurrently with reads from the controller. Implementations
/// serialize access with an internal lock, not a queue.
pub trait HeartbeatStore: Send + Sync {
    /// Snapshot the current state.
    fn get(&self) -> HeartbeatState;

    /// Record whether the loop is running.
    fn set_running(&self, running: bool);

    /// Record a successful location sample at the given epoch millisecond.
    fn record_heartbeat(&self, now_ms: u64);

    /// Record an explicit stop at the given epoch millisecond.
    fn record_stop(&self, now_ms: u64);
}

fn lock_state(state: &Mutex<HeartbeatState>) -> std::sync::MutexGuard<'_, HeartbeatState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory heartbeat store.
///
/// For tests, and for hosts whose embedding layer provides its own
/// durability. State does not survive process restart.
#[derive(Debug, Default)]
pub struct MemoryHeartbeatStore {
    state: Mutex<HeartbeatState>,
}

impl MemoryHeartbeatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing state, as a restarted process would
    /// find it.
    pub fn with_state(state: HeartbeatState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }
}

impl HeartbeatStore for MemoryHeartbeatStore {
    fn get(&self) -> HeartbeatState {
        lock_state(&self.state).clone()
    }

    fn set_running(&self, running: bool) {
        lock_state(&self.state).is_running = running;
    }

    fn record_heartbeat(&self, now_ms: u64) {
        let mut state = lock_state(&self.state);
        state.last_heartbeat_ms = Some(now_ms);
    }

    fn record_stop(&self, now_ms: u64) {
        let mut state = lock_state(&self.state);
        state.last_stopped_ms = Some(now_ms);
    }
}

/// File-backed heartbeat store.
///
/// State is a single JSON document, rewritten atomically (temp file +
/// rename) on every mutation. A corrupt or missing file loads as the
/// default state rather than failing; losing the marker only costs one
/// redundant start check.
pub struct FileHeartbeatStore {
    path: PathBuf,
    state: Mutex<HeartbeatState>,
}

impl FileHeartbeatStore {
    /// Open the store at `path`, loading any persisted state.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let state = load_state(&path)?;
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    fn persist(&self, state: &HeartbeatState) {
        if let Err(error) = write_state(&self.path, state) {
            warn!(path = %self.path.display(), %error, "Failed to persist heartbeat state");
        }
    }
}

impl HeartbeatStore for FileHeartbeatStore {
    fn get(&self) -> HeartbeatState {
        lock_state(&self.state).clone()
    }

    fn set_running(&self, running: bool) {
        let mut state = lock_state(&self.state);
        state.is_running = running;
        self.persist(&state);
    }

    fn record_heartbeat(&self, now_ms: u64) {
        let mut state = lock_state(&self.state);
        state.last_heartbeat_ms = Some(now_ms);
        self.persist(&state);
    }

    fn record_stop(&self, now_ms: u64) {
        let mut state = lock_state(&self.state);
        state.last_stopped_ms = Some(now_ms);
        self.persist(&state);
    }
}

fn load_state(path: &Path) -> Result<HeartbeatState, StoreError> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(HeartbeatState::default())
        }
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_slice(&raw) {
        Ok(state) => {
            debug!(path = %path.display(), "Loaded heartbeat state");
            Ok(state)
        }
        Err(error) => {
            warn!(path = %path.display(), %error, "Corrupt heartbeat state, starting fresh");
            Ok(HeartbeatState::default())
        }
    }
}

fn write_state(path: &Path, state: &HeartbeatState) -> Result<(), StoreError> {
    let tmp = path.with_extension("tmp");
    let raw = serde_json::to_vec(state).map_err(StoreError::Encode)?;
    std::fs::write(&tmp, raw)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
