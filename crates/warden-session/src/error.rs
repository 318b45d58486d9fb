//! Error types for the session layer.

use warden_drivers::DriverError;
use warden_event::Action;

/// Errors returned by session actions.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The transport failed or the API reported a failure.
    #[error(transparent)]
    RequestFailed(#[from] DriverError),

    /// The fetched user payload is not a JSON object.
    #[error("invalid user data: {0}")]
    InvalidUserData(String),

    /// The token could not be decoded, so no refresh can be scheduled.
    #[error("cannot schedule token refresh: {0}")]
    TokenRefreshScheduling(String),

    /// The action needs a token but the session has none.
    #[error("no token in session")]
    MissingToken,

    /// A logout, login or newer token landed while the request was in
    /// flight; its response was discarded.
    #[error("{0} response superseded by a newer session change")]
    Superseded(Action),
}

impl AuthError {
    /// Whether this error only means the result arrived too late.
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded(_))
    }
}

/// Errors raised while assembling a session.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// A required driver was not supplied.
    #[error("missing driver: {0}")]
    MissingDriver(&'static str),

    #[error("min refresh seconds ({min}) exceeds max refresh seconds ({max})")]
    InvalidRefreshWindow { min: u64, max: u64 },

    #[error("endpoint {0} has an empty url")]
    EmptyEndpoint(&'static str),

    #[error("auto logout enabled with a zero idle window")]
    ZeroIdleWindow,

    /// A duration setting is longer than a timer can schedule.
    #[error("{field} is {value} seconds, limit is {limit}")]
    ValueOutOfRange {
        field: &'static str,
        value: u64,
        limit: u64,
    },

    /// `bind_router` was called twice.
    #[error("a router is already bound")]
    RouterAlreadyBound,

    /// A router operation was requested before `bind_router`.
    #[error("no router bound")]
    MissingRouter,

    #[error("invalid configuration document: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_converts_to_request_failed() {
        let err: AuthError = DriverError::request_failed("timeout").into();
        assert!(matches!(err, AuthError::RequestFailed(_)));
        assert_eq!(err.to_string(), "request failed: timeout");
    }

    #[test]
    fn test_superseded_names_the_action() {
        let err = AuthError::Superseded(Action::RefreshToken);
        assert!(err.is_superseded());
        assert_eq!(
            err.to_string(),
            "refreshToken response superseded by a newer session change"
        );
    }
}
