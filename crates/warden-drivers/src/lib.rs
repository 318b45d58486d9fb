//! Driver abstraction layer for Warden.
//!
//! Warden never talks to the network, a cookie jar or a JWT library
//! directly. Everything environment-specific goes through four traits:
//!
//! - [`TokenStorage`]: persists the remembered token across sessions
//! - [`TokenDecoder`]: turns an opaque token into [`Claims`]
//! - [`HttpTransport`]: sends (authenticated) API requests
//! - [`IdleDetector`]: reports user activity and inactivity
//!
//! Reference implementations ship alongside: [`MemoryTokenStorage`],
//! [`FileTokenStorage`], [`JwtDecoder`], [`ActivityIdleDetector`] and,
//! behind the `reqwest` feature, `ReqwestTransport`.
//!
//! # Feature Flags
//!
//! - `reqwest`: HTTP transport via `reqwest`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "reqwest")]
mod http;
mod idle;
mod jwt;
mod storage;

pub use error::DriverError;
#[cfg(feature = "reqwest")]
pub use http::{ReqwestTransport, ReqwestTransportConfig, ResponseValidator, status_is_success};
pub use idle::{ActivityIdleDetector, IdleConfig, IdleSignal, IdleSignals};
pub use jwt::{Claims, JwtDecoder};
pub use storage::{DEFAULT_TOKEN_KEY, FileTokenStorage, MemoryTokenStorage};

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// HTTP types
// ---------------------------------------------------------------------------

/// HTTP method of an API endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    #[default]
    Post,
    Put,
    Patch,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

/// Per-request options passed through to the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestConfig {
    /// Extra headers, applied in order.
    pub headers: Vec<(String, String)>,
    /// Request timeout. `None` uses the transport's default.
    pub timeout: Option<Duration>,
}

/// A structured API response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Parsed JSON body (`Null` when the body was empty or not JSON).
    pub body: Value,
}

impl Response {
    /// Creates a `200` response with the given body.
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    /// Looks up a top-level field of the body.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }
}

// ---------------------------------------------------------------------------
// Driver traits
// ---------------------------------------------------------------------------

/// Persists the remembered token between sessions.
///
/// Backed by a cookie jar, a keychain, a file or plain memory
/// ([`MemoryTokenStorage`]).
pub trait TokenStorage: Send + Sync + 'static {
    /// Returns the remembered token, if any.
    fn get_token(&self) -> impl Future<Output = Result<Option<String>, DriverError>> + Send;

    /// Remembers `token`, replacing any previous one.
    fn set_token(&self, token: &str) -> impl Future<Output = Result<(), DriverError>> + Send;

    /// Forgets the remembered token. Deleting nothing is not an error.
    fn delete_token(&self) -> impl Future<Output = Result<(), DriverError>> + Send;
}

/// Decodes an opaque token into claims.
///
/// Must not panic: malformed input yields `None`.
pub trait TokenDecoder: Send + Sync + 'static {
    /// Decodes `token`, or returns `None` if it cannot be read.
    fn decode(&self, token: &str) -> Option<Claims>;
}

/// Sends API requests.
///
/// Implementations decide what counts as a failed response (their
/// response-validity predicate) and report it as
/// [`DriverError::RequestFailed`].
pub trait HttpTransport: Send + Sync + 'static {
    /// Sends an unauthenticated request.
    fn send_request(
        &self,
        method: Method,
        url: &str,
        body: Value,
        config: RequestConfig,
    ) -> impl Future<Output = Result<Response, DriverError>> + Send;

    /// Sends a request carrying `token` as a bearer credential.
    ///
    /// The default adds `Authorization: Bearer <token>` and delegates to
    /// [`send_request`](Self::send_request).
    fn send_authenticated_request(
        &self,
        method: Method,
        url: &str,
        token: &str,
        body: Value,
        mut config: RequestConfig,
    ) -> impl Future<Output = Result<Response, DriverError>> + Send {
        config
            .headers
            .push(("Authorization".to_string(), format!("Bearer {token}")));
        self.send_request(method, url, body, config)
    }
}

/// Reports user activity and inactivity.
///
/// Replaces per-event callbacks with a signal stream: subscribe once and
/// receive [`IdleSignal::Active`] / [`IdleSignal::Idle`].
pub trait IdleDetector: Send + Sync + 'static {
    /// Starts listening to the watched activity events.
    fn register_events(&self);

    /// Restarts the inactivity window. Emits [`IdleSignal::Active`] when
    /// `emit_active` is set.
    fn reset_timer(&self, emit_active: bool);

    /// Subscribes to activity / idle signals.
    fn subscribe(&self) -> IdleSignals;
}
