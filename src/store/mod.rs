//! Durable local state.
//!
//! Two small key/value surfaces, each a single JSON document:
//!
//! - [`heartbeat`] - running marker, last heartbeat, last stop (crash recovery)
//! - [`session`] - logged-in username across launches

mod heartbeat;
mod session;

use thiserror::Error;

pub use heartbeat::{FileHeartbeatStore, HeartbeatState, HeartbeatStore, MemoryHeartbeatStore};
pub use session::{FileSessionStore, MemorySessionStore, SessionStore};

/// Errors from the durable stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem access failed.
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// State could not be encoded for persistence.
    #[error("store encoding failed: {0}")]
    Encode(#[source] serde_json::Error),
}
