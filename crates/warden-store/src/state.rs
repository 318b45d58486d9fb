//! Session state and its read-only views.

use serde::{Deserialize, Serialize};
use warden_event::User;

/// Staleness marker for in-flight requests.
///
/// Captured before a request is sent and checked before its response is
/// committed. If either counter moved, something newer already landed
/// and the response must be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Generation {
    /// Bumped by every logout and every login commit.
    pub epoch: u64,
    /// Bumped by every token commit.
    pub token_version: u64,
}

/// The authoritative session state. Owned by [`SessionStore`](crate::SessionStore).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub(crate) token: Option<String>,
    pub(crate) user: User,
    pub(crate) remember_token: bool,
    pub(crate) ready: bool,
    pub(crate) generation: Generation,
}

impl SessionState {
    /// `true` iff a token is present. Derived, never stored.
    pub fn logged(&self) -> bool {
        self.token.is_some()
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            token: self.token.clone(),
            user: self.user.clone(),
            remember_token: self.remember_token,
            ready: self.ready,
            logged: self.logged(),
            generation: self.generation,
        }
    }
}

/// A consistent copy of the session state at one instant.
///
/// The token is skipped when serializing so snapshots can be logged or
/// shipped to a UI without leaking credentials.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    #[serde(skip)]
    pub token: Option<String>,
    pub user: User,
    pub remember_token: bool,
    pub ready: bool,
    pub logged: bool,
    pub generation: Generation,
}
