//! Location permission seam.
//!
//! The controller never requests permissions itself; it asks the gate and
//! treats denial as "cannot ensure-start now", deferring to the next cycle
//! after the embedding layer has obtained the grant.

/// Permissions the reporting loop depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Precise (GPS-grade) location access.
    FineLocation,
    /// Location access while backgrounded.
    BackgroundLocation,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FineLocation => write!(f, "fine location"),
            Self::BackgroundLocation => write!(f, "background location"),
        }
    }
}

/// Trait for querying platform permission grants.
pub trait PermissionGate: Send + Sync {
    /// Whether the given permission is currently granted.
    fn is_granted(&self, permission: Permission) -> bool;

    /// Whether everything the reporting loop needs is granted.
    fn location_reporting_granted(&self) -> bool {
        self.is_granted(Permission::FineLocation) && self.is_granted(Permission::BackgroundLocation)
    }
}

/// Gate that grants everything.
///
/// For tests and for platforms where grants are enforced before the core
/// is constructed.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysGranted;

impl PermissionGate for AlwaysGranted {
    fn is_granted(&self, _permission: Permission) -> bool {
        true
    }
}
