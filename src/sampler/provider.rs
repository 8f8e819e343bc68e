//! Platform location provider seam.
//!
//! The OS-level fix mechanism is a black box that either yields a
//! latitude/longitude pair or fails. [`FixProvider`] is the only contract
//! the sampler needs; the embedding layer adapts the platform API behind it.

use std::future::Future;

use thiserror::Error;

/// A single position fix from the platform provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl Fix {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both coordinates are finite numbers.
    ///
    /// Platform providers occasionally emit NaN/infinite values during
    /// sensor warm-up; those samples are dropped, not propagated.
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

/// Errors from the platform location provider.
#[derive(Debug, Error)]
pub enum FixError {
    /// No fix was available this cycle. Transient; the loop waits for the
    /// next tick.
    #[error("no position fix available")]
    Unavailable,

    /// Location permission was revoked while the loop was running.
    /// Permanent; the sampler stops.
    #[error("location permission revoked")]
    PermissionRevoked,

    /// The provider shut down or failed unrecoverably.
    #[error("location provider failed: {0}")]
    ProviderFailed(String),
}

impl FixError {
    /// Whether this failure ends the sampling loop.
    pub fn is_permanent(&self) -> bool {
        !matches!(self, Self::Unavailable)
    }
}

/// Trait for obtaining position fixes from the platform.
pub trait FixProvider: Send + Sync {
    /// Obtain the current position fix, or fail.
    fn current_fix(&self) -> impl Future<Output = Result<Fix, FixError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finite_fix_validation() {
        assert!(Fix::new(-6.2, 106.8).is_finite());
        assert!(!Fix::new(f64::NAN, 106.8).is_finite());
        assert!(!Fix::new(-6.2, f64::INFINITY).is_finite());
        assert!(!Fix::new(f64::NEG_INFINITY, f64::NAN).is_finite());
    }

    #[test]
    fn error_permanence() {
        assert!(!FixError::Unavailable.is_permanent());
        assert!(FixError::PermissionRevoked.is_permanent());
        assert!(FixError::ProviderFailed("gps off".to_string()).is_permanent());
    }
}
