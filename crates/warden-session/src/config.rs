//! Session configuration.

use serde::{Deserialize, Serialize};
use tracing::warn;
use warden_drivers::{IdleConfig, Method};
use warden_guard::GuardConfig;
use warden_timer::{MAX_DELAY, RefreshWindow};

use crate::ConfigurationError;

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// One API endpoint: method plus URL (relative to the transport's base).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(default)]
    pub method: Method,
    pub url: String,
}

impl Endpoint {
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
        }
    }
}

/// The four endpoints the session talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiEndpoints {
    pub login: Endpoint,
    pub logout: Endpoint,
    pub refresh_token: Endpoint,
    pub fetch_user: Endpoint,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            login: Endpoint::post("login"),
            logout: Endpoint::post("logout"),
            refresh_token: Endpoint::post("refresh"),
            fetch_user: Endpoint::post("user"),
        }
    }
}

impl ApiEndpoints {
    fn named(&self) -> [(&'static str, &Endpoint); 4] {
        [
            ("login", &self.login),
            ("logout", &self.logout),
            ("refresh_token", &self.refresh_token),
            ("fetch_user", &self.fetch_user),
        ]
    }
}

// ---------------------------------------------------------------------------
// AuthConfig
// ---------------------------------------------------------------------------

/// Everything configurable about a session.
///
/// Every field has a default, so a partial JSON document (or `{}`) is a
/// valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Label for logs and the event bus.
    pub module: String,

    /// Restore the remembered session while building.
    pub auto_initialize: bool,

    /// Refresh tokens shortly before they expire.
    pub auto_refresh_token: bool,
    /// Never refresh more often than this.
    pub min_refresh_seconds: u64,
    /// Always refresh at least this often.
    pub max_refresh_seconds: u64,
    /// Refresh this long before expiry.
    pub refresh_seconds_ahead: u64,
    /// Up to this many seconds are randomly taken off each delay.
    pub refresh_jitter_seconds: u64,

    /// Mirror the token into token storage when "remember me" is set.
    pub auto_sync_token_storage: bool,

    /// Log out after a period without user activity.
    pub auto_logout: bool,
    pub idle: IdleConfig,

    pub fetch_user_after_login: bool,
    pub refresh_token_after_login: bool,
    pub fetch_user_after_token_refreshed: bool,

    /// Route metadata, redirect targets and the next-URL parameter.
    #[serde(flatten)]
    pub guard: GuardConfig,

    pub api_endpoints: ApiEndpoints,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            module: "auth".to_string(),
            auto_initialize: true,
            auto_refresh_token: true,
            min_refresh_seconds: 10,
            max_refresh_seconds: 3600,
            refresh_seconds_ahead: 10,
            refresh_jitter_seconds: 0,
            auto_sync_token_storage: true,
            auto_logout: true,
            idle: IdleConfig::default(),
            fetch_user_after_login: true,
            refresh_token_after_login: true,
            fetch_user_after_token_refreshed: true,
            guard: GuardConfig::default(),
            api_endpoints: ApiEndpoints::default(),
        }
    }
}

impl AuthConfig {
    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Rejects configurations the session cannot run with.
    ///
    /// # Errors
    /// - [`ConfigurationError::InvalidRefreshWindow`] if min > max
    /// - [`ConfigurationError::EmptyEndpoint`] if an endpoint URL is blank
    /// - [`ConfigurationError::ZeroIdleWindow`] if auto-logout would fire
    ///   immediately
    /// - [`ConfigurationError::ValueOutOfRange`] if a duration exceeds
    ///   [`MAX_DELAY`]
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let limit = MAX_DELAY.as_secs();
        for (field, value) in self.durations() {
            if value > limit {
                return Err(ConfigurationError::ValueOutOfRange { field, value, limit });
            }
        }
        if self.auto_refresh_token && self.min_refresh_seconds > self.max_refresh_seconds {
            return Err(ConfigurationError::InvalidRefreshWindow {
                min: self.min_refresh_seconds,
                max: self.max_refresh_seconds,
            });
        }
        for (name, endpoint) in self.api_endpoints.named() {
            if endpoint.url.trim().is_empty() {
                return Err(ConfigurationError::EmptyEndpoint(name));
            }
        }
        if self.auto_logout && self.idle.idle_seconds == 0 {
            return Err(ConfigurationError::ZeroIdleWindow);
        }
        if self.refresh_jitter_seconds >= self.min_refresh_seconds && self.refresh_jitter_seconds > 0 {
            warn!(
                jitter = self.refresh_jitter_seconds,
                min = self.min_refresh_seconds,
                "refresh jitter not below min refresh seconds; delays will often clamp to min"
            );
        }
        Ok(())
    }

    fn durations(&self) -> [(&'static str, u64); 5] {
        [
            ("min_refresh_seconds", self.min_refresh_seconds),
            ("max_refresh_seconds", self.max_refresh_seconds),
            ("refresh_seconds_ahead", self.refresh_seconds_ahead),
            ("refresh_jitter_seconds", self.refresh_jitter_seconds),
            ("idle.idle_seconds", self.idle.idle_seconds),
        ]
    }

    /// The refresh timing parameters.
    pub fn refresh_window(&self) -> RefreshWindow {
        RefreshWindow {
            min_secs: self.min_refresh_seconds,
            max_secs: self.max_refresh_seconds,
            ahead_secs: self.refresh_seconds_ahead,
            jitter_secs: self.refresh_jitter_seconds,
        }
        .validated()
    }
}
