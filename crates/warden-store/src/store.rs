//! The session store: the only place session state changes.
//!
//! # Ordering
//!
//! Every mutation commits and publishes its [`AuthEvent::Mutation`] while
//! holding the state lock. Two mutations can never interleave their
//! notifications, so every subscriber sees mutations in commit order.
//! The lock is never held across an `.await`.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};
use warden_event::{AuthEvent, EventBus, Mutation, User};

use crate::{Generation, SessionState, Snapshot};

/// Shared handle to the session state. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SessionStore {
    state: Arc<Mutex<SessionState>>,
    bus: EventBus,
}

impl SessionStore {
    /// Creates an empty store publishing on `bus`.
    pub fn new(bus: EventBus) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::default())),
            bus,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> Snapshot {
        self.state.lock().snapshot()
    }

    pub fn token(&self) -> Option<String> {
        self.state.lock().token.clone()
    }

    pub fn user(&self) -> User {
        self.state.lock().user.clone()
    }

    pub fn logged(&self) -> bool {
        self.state.lock().logged()
    }

    pub fn ready(&self) -> bool {
        self.state.lock().ready
    }

    pub fn remember_token(&self) -> bool {
        self.state.lock().remember_token
    }

    pub fn generation(&self) -> Generation {
        self.state.lock().generation
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Replaces the token unconditionally.
    pub fn set_token(&self, token: Option<String>) {
        let mut state = self.state.lock();
        self.commit_token(&mut state, token);
    }

    /// Replaces the token only if `expected` is still current.
    ///
    /// Returns `false` (and commits nothing) when a logout, login or
    /// another token commit happened since `expected` was captured.
    pub fn set_token_if(&self, expected: Generation, token: Option<String>) -> bool {
        let mut state = self.state.lock();
        if state.generation != expected {
            debug!(
                expected = ?expected,
                current = ?state.generation,
                "token commit superseded"
            );
            return false;
        }
        self.commit_token(&mut state, token);
        true
    }

    /// Commits the token and remember flag of a fresh login and starts a
    /// new session epoch.
    ///
    /// Returns `false` when a logout or another login landed after
    /// `expected_epoch` was captured; the previous session, including its
    /// remember flag, is then left untouched. Starting a new epoch
    /// invalidates every request still in flight for the previous session.
    pub fn start_session(&self, expected_epoch: u64, token: String, remember: bool) -> bool {
        let mut state = self.state.lock();
        if state.generation.epoch != expected_epoch {
            debug!(
                expected_epoch,
                current_epoch = state.generation.epoch,
                "login commit superseded"
            );
            return false;
        }
        state.generation.epoch += 1;
        self.commit_remember(&mut state, remember);
        self.commit_token(&mut state, Some(token));
        info!(epoch = state.generation.epoch, "session started");
        true
    }

    pub fn set_user(&self, user: User) {
        let mut state = self.state.lock();
        self.commit_user(&mut state, user);
    }

    /// Replaces the user only if no logout or login happened since
    /// `expected_epoch` was captured.
    pub fn set_user_if(&self, expected_epoch: u64, user: User) -> bool {
        let mut state = self.state.lock();
        if state.generation.epoch != expected_epoch {
            debug!(
                expected_epoch,
                current_epoch = state.generation.epoch,
                "user commit superseded"
            );
            return false;
        }
        self.commit_user(&mut state, user);
        true
    }

    pub fn set_remember_token(&self, remember: bool) {
        let mut state = self.state.lock();
        self.commit_remember(&mut state, remember);
    }

    /// Marks the session ready. Returns `true` only on the first call;
    /// later calls change nothing and publish nothing.
    pub fn set_ready(&self) -> bool {
        let mut state = self.state.lock();
        if state.ready {
            return false;
        }
        state.ready = true;
        debug!(logged = state.logged(), "session ready");
        self.bus.emit(AuthEvent::mutation(Mutation::SetReady));
        true
    }

    /// Clears token, user and remember flag, and starts a new epoch.
    /// `ready` is kept.
    pub fn logout(&self) {
        let mut state = self.state.lock();
        let was_logged = state.logged();
        state.token = None;
        state.user.clear();
        state.remember_token = false;
        state.generation.epoch += 1;
        info!(was_logged, epoch = state.generation.epoch, "session cleared");
        self.bus.emit(AuthEvent::mutation(Mutation::Logout));
    }

    fn commit_token(&self, state: &mut SessionState, token: Option<String>) {
        state.token = token;
        state.generation.token_version += 1;
        debug!(
            token_version = state.generation.token_version,
            present = state.token.is_some(),
            "token set"
        );
        self.bus.emit(AuthEvent::mutation(Mutation::SetToken {
            present: state.token.is_some(),
        }));
    }

    fn commit_user(&self, state: &mut SessionState, user: User) {
        state.user = user;
        debug!(fields = state.user.len(), "user set");
        self.bus
            .emit(AuthEvent::mutation(Mutation::SetUser(state.user.clone())));
    }

    fn commit_remember(&self, state: &mut SessionState, remember: bool) {
        state.remember_token = remember;
        debug!(remember, "remember token set");
        self.bus
            .emit(AuthEvent::mutation(Mutation::SetRememberToken(remember)));
    }
}
