//! The access decision.
//!
//! [`decide`] is pure: same route, same snapshot, same config, same
//! answer. The pre-navigation hook and the reactive redirect both go
//! through it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use warden_store::Snapshot;

use crate::{Location, Route};

/// Which metadata marks a route as restricted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthMeta {
    /// Metadata key looked up on every matched record.
    pub key: String,
    /// Value meaning "logged-in users only".
    pub authenticated: Value,
    /// Value meaning "guests only".
    pub unauthenticated: Value,
}

impl Default for AuthMeta {
    fn default() -> Self {
        Self {
            key: "auth".to_string(),
            authenticated: Value::Bool(true),
            unauthenticated: Value::Bool(false),
        }
    }
}

/// Where to send users who may not stay on a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Redirects {
    /// Destination for guests hitting a logged-in-only route.
    pub unauthenticated: Location,
    /// Destination for logged-in users hitting a guest-only route.
    pub authenticated: Location,
}

impl Default for Redirects {
    fn default() -> Self {
        Self {
            unauthenticated: Location::new("/login"),
            authenticated: Location::new("/"),
        }
    }
}

/// Guard settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub auth_meta: AuthMeta,
    pub redirects: Redirects,
    /// Query parameter carrying the originally requested path.
    pub next_url_param: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            auth_meta: AuthMeta::default(),
            redirects: Redirects::default(),
            next_url_param: "nextUrl".to_string(),
        }
    }
}

/// What a route demands of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRequirement {
    Authenticated,
    Unauthenticated,
    Public,
}

impl AccessRequirement {
    /// Reads the requirement from the route's matched records.
    ///
    /// Any record marked authenticated wins over records marked
    /// unauthenticated.
    pub fn of(route: &Route, meta: &AuthMeta) -> Self {
        let marked = |value: &Value| {
            route
                .matched
                .iter()
                .any(|r| r.meta.get(&meta.key) == Some(value))
        };
        if marked(&meta.authenticated) {
            Self::Authenticated
        } else if marked(&meta.unauthenticated) {
            Self::Unauthenticated
        } else {
            Self::Public
        }
    }
}

/// Outcome of a guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(Location),
}

/// Decides whether navigation to `route` may proceed.
///
/// Until the session is ready every route is allowed.
pub fn decide(route: &Route, session: &Snapshot, config: &GuardConfig) -> GuardDecision {
    if !session.ready {
        return GuardDecision::Allow;
    }

    match AccessRequirement::of(route, &config.auth_meta) {
        AccessRequirement::Authenticated if !session.logged => {
            let mut target = config.redirects.unauthenticated.clone();
            target
                .query
                .entry(config.next_url_param.clone())
                .or_insert_with(|| route.full_path());
            GuardDecision::Redirect(target)
        }
        AccessRequirement::Unauthenticated if session.logged => {
            GuardDecision::Redirect(config.redirects.authenticated.clone())
        }
        _ => GuardDecision::Allow,
    }
}
