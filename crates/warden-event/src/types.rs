//! Session events.
//!
//! Every observable thing Warden does is an [`AuthEvent`]. Events carry a
//! dotted name (see [`AuthEvent::name`]) so subscribers can filter with
//! wildcard patterns instead of matching on variants.
//!
//! Events never carry tokens.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A user profile as returned by the API: an arbitrary JSON object.
pub type User = Map<String, Value>;

// ---------------------------------------------------------------------------
// Mutation
// ---------------------------------------------------------------------------

/// Named state transitions of the session store, with their payloads.
///
/// The token itself never rides on the bus; [`SetToken`](Self::SetToken)
/// only says whether one is now present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", content = "payload", rename_all = "camelCase")]
pub enum Mutation {
    SetToken { present: bool },
    SetUser(User),
    SetRememberToken(bool),
    SetReady,
    Logout,
}

impl Mutation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SetToken { .. } => "setToken",
            Self::SetUser(_) => "setUser",
            Self::SetRememberToken(_) => "setRememberToken",
            Self::SetReady => "setReady",
            Self::Logout => "logout",
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// The five session operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    Initialize,
    AttemptLogin,
    RefreshToken,
    FetchUser,
    Logout,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::AttemptLogin => "attemptLogin",
            Self::RefreshToken => "refreshToken",
            Self::FetchUser => "fetchUser",
            Self::Logout => "logout",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an action finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum ActionOutcome {
    /// `initialize` completed; whether a session was restored.
    Initialized { logged: bool },
    /// A new token was committed (login or refresh).
    TokenCommitted,
    /// A user profile was committed.
    UserCommitted { user: User },
    /// The client-side session was cleared.
    LoggedOut { server_acknowledged: bool },
    /// The action failed; the error was returned to the caller.
    Failed { message: String },
}

// ---------------------------------------------------------------------------
// ErrorContext
// ---------------------------------------------------------------------------

/// Where a failure that is not returned to any caller happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorContext {
    /// `initialize` could not restore the remembered session.
    Initialize,
    /// A token could not be decoded to schedule its refresh.
    ScheduleRefresh,
    /// A timer-triggered refresh failed.
    ScheduledRefresh,
    /// A fire-and-forget follow-up (refresh or fetch after login) failed.
    FollowUp,
    /// The server-side logout request failed.
    ServerSideLogout,
    /// Writing or deleting the remembered token failed.
    TokenStorage,
    /// The reactive navigation guard could not redirect.
    Redirect,
}

impl ErrorContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::ScheduleRefresh => "scheduleRefresh",
            Self::ScheduledRefresh => "scheduledRefresh",
            Self::FollowUp => "followUp",
            Self::ServerSideLogout => "serverSideLogout",
            Self::TokenStorage => "tokenStorage",
            Self::Redirect => "redirect",
        }
    }
}

// ---------------------------------------------------------------------------
// AuthEvent
// ---------------------------------------------------------------------------

/// Everything published on the [`EventBus`](crate::EventBus).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AuthEvent {
    /// The store committed a mutation.
    Mutation { mutation: Mutation },
    /// An action finished.
    ActionAfter {
        action: Action,
        outcome: ActionOutcome,
    },
    /// `attempt_login` committed a token.
    LoginSuccess,
    /// `attempt_login` failed.
    LoginFailed { reason: String },
    /// The idle scheduler is about to log out.
    AutoLogout,
    /// The idle-triggered logout completed.
    AutoLogoutAfter,
    /// The session became ready (emitted once).
    Ready,
    /// A failure that no caller will see.
    Error {
        context: ErrorContext,
        message: String,
    },
}

impl AuthEvent {
    pub fn mutation(mutation: Mutation) -> Self {
        Self::Mutation { mutation }
    }

    pub fn action_after(action: Action, outcome: ActionOutcome) -> Self {
        Self::ActionAfter { action, outcome }
    }

    pub fn error(context: ErrorContext, message: impl Into<String>) -> Self {
        Self::Error {
            context,
            message: message.into(),
        }
    }

    /// Dotted event name, e.g. `mutation.setToken` or
    /// `action.refreshToken.after`.
    pub fn name(&self) -> String {
        match self {
            Self::Mutation { mutation } => format!("mutation.{mutation}"),
            Self::ActionAfter { action, .. } => format!("action.{action}.after"),
            Self::LoginSuccess => "login.success".to_string(),
            Self::LoginFailed { .. } => "login.failed".to_string(),
            Self::AutoLogout => "autoLogout".to_string(),
            Self::AutoLogoutAfter => "autoLogout.after".to_string(),
            Self::Ready => "ready".to_string(),
            Self::Error { context, .. } => format!("error.{}", context.as_str()),
        }
    }

    /// Returns the mutation if this is a mutation event.
    pub fn as_mutation(&self) -> Option<&Mutation> {
        match self {
            Self::Mutation { mutation } => Some(mutation),
            _ => None,
        }
    }

    /// Whether this event's name matches a dotted wildcard pattern.
    ///
    /// `*` matches exactly one segment, `**` matches any number of
    /// remaining segments (including none).
    pub fn matches(&self, pattern: &str) -> bool {
        name_matches(&self.name(), pattern)
    }
}

impl fmt::Display for AuthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Matches a dotted name against a wildcard pattern.
pub fn name_matches(name: &str, pattern: &str) -> bool {
    let name: Vec<&str> = name.split('.').collect();
    let pattern: Vec<&str> = pattern.split('.').collect();
    segments_match(&name, &pattern)
}

fn segments_match(name: &[&str], pattern: &[&str]) -> bool {
    match (pattern.first(), name.first()) {
        (None, None) => true,
        (Some(&"**"), _) => true,
        (None, Some(_)) | (Some(_), None) => false,
        (Some(&p), Some(&n)) => (p == "*" || p == n) && segments_match(&name[1..], &pattern[1..]),
    }
}
