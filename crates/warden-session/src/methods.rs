//! The overridable steps of every session action.
//!
//! [`AuthActions`](crate::AuthActions) never talks to the API or picks a
//! response apart itself: each step goes through [`AuthMethods`], and
//! every method has a default. Override only the steps your API does
//! differently.
//!
//! ```ignore
//! struct NestedToken;
//!
//! impl AuthMethods for NestedToken {
//!     fn map_login_response_to_token(&self, response: &Response) -> Result<String, AuthError> {
//!         response.body["data"]["accessToken"]
//!             .as_str()
//!             .map(String::from)
//!             .ok_or_else(|| DriverError::InvalidResponse("no accessToken".into()).into())
//!     }
//! }
//! ```

use std::future::Future;

use serde_json::Value;
use tracing::warn;
use warden_drivers::{DriverError, HttpTransport, RequestConfig, Response};
use warden_event::User;

use crate::{AuthError, Endpoint};

/// Per-step hooks for the session actions.
pub trait AuthMethods: Send + Sync + 'static {
    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    /// Turns the caller's credentials into the login request body.
    fn map_credentials(&self, credentials: Value) -> Value {
        credentials
    }

    /// Sends the login request (unauthenticated).
    fn send_login<H: HttpTransport>(
        &self,
        http: &H,
        endpoint: &Endpoint,
        credentials: Value,
    ) -> impl Future<Output = Result<Response, DriverError>> + Send {
        http.send_request(endpoint.method, &endpoint.url, credentials, RequestConfig::default())
    }

    /// Sends the token refresh request.
    fn send_refresh<H: HttpTransport>(
        &self,
        http: &H,
        endpoint: &Endpoint,
        token: &str,
    ) -> impl Future<Output = Result<Response, DriverError>> + Send {
        http.send_authenticated_request(
            endpoint.method,
            &endpoint.url,
            token,
            Value::Null,
            RequestConfig::default(),
        )
    }

    /// Sends the fetch-user request.
    fn send_fetch_user<H: HttpTransport>(
        &self,
        http: &H,
        endpoint: &Endpoint,
        token: &str,
    ) -> impl Future<Output = Result<Response, DriverError>> + Send {
        http.send_authenticated_request(
            endpoint.method,
            &endpoint.url,
            token,
            Value::Null,
            RequestConfig::default(),
        )
    }

    /// Sends the server-side logout request.
    fn send_server_side_logout<H: HttpTransport>(
        &self,
        http: &H,
        endpoint: &Endpoint,
        token: &str,
    ) -> impl Future<Output = Result<Response, DriverError>> + Send {
        http.send_authenticated_request(
            endpoint.method,
            &endpoint.url,
            token,
            Value::Null,
            RequestConfig::default(),
        )
    }

    // -----------------------------------------------------------------------
    // Response mappers
    // -----------------------------------------------------------------------

    /// Extracts the token from a login response. Default: `body.token`.
    fn map_login_response_to_token(&self, response: &Response) -> Result<String, AuthError> {
        token_field(response, "login")
    }

    /// Extracts the token from a refresh response. Default: `body.token`.
    fn map_refresh_response_to_token(&self, response: &Response) -> Result<String, AuthError> {
        token_field(response, "refresh")
    }

    /// Extracts the user from a fetch-user response. Default: `body.user`.
    fn map_fetch_user_response(&self, response: &Response) -> Value {
        response.field("user").cloned().unwrap_or(Value::Null)
    }

    /// Checks the mapped user is a JSON object.
    fn check_user_object(&self, user: Value) -> Result<User, AuthError> {
        match user {
            Value::Object(map) => Ok(map),
            other => Err(AuthError::InvalidUserData(format!(
                "expected an object, got {}",
                json_kind(&other)
            ))),
        }
    }

    // -----------------------------------------------------------------------
    // Callbacks
    // -----------------------------------------------------------------------

    /// Called when the server-side logout request fails. The client-side
    /// logout has already happened.
    fn handle_server_side_logout_error(&self, error: &AuthError) {
        warn!(error = %error, "server-side logout failed");
    }

    /// Called once, when the session first becomes ready.
    fn on_ready(&self) {}
}

/// The stock behaviour: every method at its default.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMethods;

impl AuthMethods for DefaultMethods {}

fn token_field(response: &Response, what: &str) -> Result<String, AuthError> {
    match response.field("token").and_then(Value::as_str) {
        Some(token) if !token.is_empty() => Ok(token.to_string()),
        _ => Err(DriverError::InvalidResponse(format!("{what} response carries no token")).into()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
