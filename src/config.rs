//! Tuning knobs for the tracking core.

use std::time::Duration;

/// Default interval between status polls while in foreground.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;

/// Default cadence of the location sampling loop.
pub const DEFAULT_SAMPLE_CADENCE_SECS: u64 = 1;

/// Default minimum time after a stop before a new start is honored.
pub const DEFAULT_DEBOUNCE_WINDOW_MS: u64 = 2_000;

/// Default maximum heartbeat age before a persisted "running" marker is
/// treated as stale (crashed process).
pub const DEFAULT_HEARTBEAT_TIMEOUT_MS: u64 = 15_000;

/// Timing configuration shared by the poller, sampler, and controller.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// How often the status poller fetches the server record.
    pub poll_interval: Duration,

    /// How often the location sampler asks the platform for a fix.
    pub sample_cadence: Duration,

    /// Window after a stop during which start requests are ignored.
    pub debounce_window: Duration,

    /// Maximum heartbeat age for a persisted running marker to count as
    /// still healthy.
    pub heartbeat_timeout: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            sample_cadence: Duration::from_secs(DEFAULT_SAMPLE_CADENCE_SECS),
            debounce_window: Duration::from_millis(DEFAULT_DEBOUNCE_WINDOW_MS),
            heartbeat_timeout: Duration::from_millis(DEFAULT_HEARTBEAT_TIMEOUT_MS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_constants() {
        let config = TrackerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.sample_cadence, Duration::from_secs(1));
        assert_eq!(config.debounce_window, Duration::from_millis(2_000));
        assert_eq!(config.heartbeat_timeout, Duration::from_millis(15_000));
    }
}
