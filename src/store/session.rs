//! Logged-in session persistence.
//!
//! Holds the active username across launches so the app can resume polling
//! without re-login. Kept separate from the heartbeat store: session state
//! changes on login/logout, heartbeat state on every sample.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::StoreError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct SessionState {
    logged_in: bool,
    username: Option<String>,
}

/// Contract for session persistence.
pub trait SessionStore: Send + Sync {
    /// Record a successful login.
    fn save_login(&self, username: &str) -> Result<(), StoreError>;

    /// Clear the session on logout.
    fn clear_login(&self) -> Result<(), StoreError>;

    /// The logged-in username, if any.
    fn username(&self) -> Option<String>;

    /// Whether a session is active.
    fn is_logged_in(&self) -> bool {
        self.username().is_some()
    }
}

fn lock_state(state: &Mutex<SessionState>) -> std::sync::MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory session store for tests and embedders with their own storage.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    state: Mutex<SessionState>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn save_login(&self, username: &str) -> Result<(), StoreError> {
        let mut state = lock_state(&self.state);
        state.logged_in = true;
        state.username = Some(username.to_string());
        Ok(())
    }

    fn clear_login(&self) -> Result<(), StoreError> {
        let mut state = lock_state(&self.state);
        state.logged_in = false;
        state.username = None;
        Ok(())
    }

    fn username(&self) -> Option<String> {
        let state = lock_state(&self.state);
        if state.logged_in {
            state.username.clone()
        } else {
            None
        }
    }
}

/// File-backed session store (single JSON document, atomic rewrite).
pub struct FileSessionStore {
    path: PathBuf,
    state: Mutex<SessionState>,
}

impl FileSessionStore {
    /// Open the store at `path`, loading any persisted session.
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

    fn persist(&self, state: &SessionState) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("tmp");
        let raw = serde_json::to_vec(state).map_err(StoreError::Encode)?;
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn save_login(&self, username: &str) -> Result<(), StoreError> {
        let mut state = lock_state(&self.state);
        state.logged_in = true;
        state.username = Some(username.to_string());
        self.persist(&state)
    }

    fn clear_login(&self) -> Result<(), StoreError> {
        let mut state = lock_state(&self.state);
        state.logged_in = false;
        state.username = None;
        self.persist(&state)
    }

    fn username(&self) -> Option<String> {
        let state = lock_state(&self.state);
        if state.logged_in {
            state.username.clone()
        } else {
            None
        }
    }
}

fn load_state(path: &Path) -> Result<SessionState, StoreError> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(SessionState::default()),
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_slice(&raw) {
        Ok(state) => Ok(state),
        Err(error) => {
            warn!(path = %path.display(), %error, "Corrupt session state, starting logged out");
            Ok(SessionState::default())
        }
    }
}
