/// Errors reported by driver implementations.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The request could not be sent, or the API reported a failure
    /// according to the transport's response-validity predicate.
    #[error("request failed: {message}")]
    RequestFailed {
        /// HTTP status, when a response was received at all.
        status: Option<u16>,
        /// Human-readable cause.
        message: String,
    },

    /// A response arrived but did not carry what the caller needed
    /// (e.g. no token in a login response).
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The HTTP transport was configured without an absolute base URL.
    #[error("invalid base url {base_url:?}: {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },

    /// Reading or writing the persisted token failed.
    #[error("token storage failed: {0}")]
    Storage(String),
}

impl DriverError {
    /// Shorthand for a [`DriverError::RequestFailed`] without a status.
    pub fn request_failed(message: impl Into<String>) -> Self {
        Self::RequestFailed {
            status: None,
            message: message.into(),
        }
    }
}
