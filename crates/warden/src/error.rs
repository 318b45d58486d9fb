//! Unified error type for Warden.

use warden_drivers::DriverError;
use warden_guard::GuardError;
use warden_session::{AuthError, ConfigurationError};

/// Top-level error wrapping every crate-specific error.
///
/// `?` converts the sub-crate errors through the `#[from]` impls.
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    /// A driver failed outside of a session action.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// A session action failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The session could not be assembled or a router call was invalid.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The router refused a redirect.
    #[error(transparent)]
    Guard(#[from] GuardError),
}

impl WardenError {
    /// Whether this is a session action result discarded as stale.
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Auth(e) if e.is_superseded())
    }
}
