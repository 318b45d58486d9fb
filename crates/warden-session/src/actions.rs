//! The five session actions.
//!
//! [`AuthActions`] is the only writer of session state besides the
//! schedulers it drives. Every action:
//!
//! 1. reads what it needs from one store snapshot,
//! 2. awaits the driver call with no lock held,
//! 3. commits through a guarded mutation so a late response can never
//!    overwrite a newer session,
//! 4. publishes `action.<name>.after`.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};
use warden_drivers::{HttpTransport, TokenStorage};
use warden_event::{Action, ActionOutcome, AuthEvent, ErrorContext, EventBus, User};
use warden_store::SessionStore;

use crate::{AuthConfig, AuthError, AuthMethods, DefaultMethods};

/// Handle to the session actions. Cheap to clone; clones share everything.
pub struct AuthActions<H, S, M = DefaultMethods> {
    inner: Arc<Inner<H, S, M>>,
}

struct Inner<H, S, M> {
    store: SessionStore,
    http: H,
    storage: S,
    methods: M,
    config: Arc<AuthConfig>,
}

impl<H, S, M> Clone for AuthActions<H, S, M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H, S, M> AuthActions<H, S, M>
where
    H: HttpTransport,
    S: TokenStorage,
    M: AuthMethods,
{
    pub fn new(store: SessionStore, http: H, storage: S, methods: M, config: Arc<AuthConfig>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                http,
                storage,
                methods,
                config,
            }),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.inner.store
    }

    pub fn bus(&self) -> &EventBus {
        self.inner.store.bus()
    }

    pub fn storage(&self) -> &S {
        &self.inner.storage
    }

    pub fn http(&self) -> &H {
        &self.inner.http
    }

    pub fn methods(&self) -> &M {
        &self.inner.methods
    }

    pub fn config(&self) -> &AuthConfig {
        &self.inner.config
    }

    // -----------------------------------------------------------------------
    // initialize
    // -----------------------------------------------------------------------

    /// Restores the remembered session, then marks the session ready.
    ///
    /// Never fails: any error during restore falls back to a client-side
    /// logout that also forgets the remembered token. Returns whether a
    /// session is active afterwards.
    pub async fn initialize(&self) -> bool {
        match self.restore().await {
            Ok(restored) => debug!(restored, "initialize finished restore"),
            Err(e) if e.is_superseded() => {
                debug!("remembered session superseded during initialize");
            }
            Err(e) => {
                warn!(error = %e, "could not restore remembered session");
                self.report(ErrorContext::Initialize, &e);
                self.store().logout();
                if let Err(e) = self.inner.storage.delete_token().await {
                    warn!(error = %e, "could not forget remembered token");
                }
            }
        }

        if self.store().set_ready() {
            info!(module = %self.config().module, logged = self.store().logged(), "session ready");
            self.bus().emit(AuthEvent::Ready);
            self.inner.methods.on_ready();
        }

        let logged = self.store().logged();
        self.bus().emit(AuthEvent::action_after(
            Action::Initialize,
            ActionOutcome::Initialized { logged },
        ));
        logged
    }

    async fn restore(&self) -> Result<bool, AuthError> {
        let Some(token) = self.inner.storage.get_token().await? else {
            debug!("no remembered token");
            return Ok(false);
        };

        self.store().set_token(Some(token));
        self.store().set_remember_token(true);
        self.refresh_token().await?;

        let config = self.config();
        if config.fetch_user_after_login && !config.fetch_user_after_token_refreshed {
            self.spawn_fetch_user();
        }
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // attempt_login
    // -----------------------------------------------------------------------

    /// Logs in with `credentials`. Returns the committed token.
    ///
    /// The configured follow-ups (refresh, then fetch user) run in the
    /// background after this returns.
    ///
    /// # Errors
    /// - [`AuthError::RequestFailed`] if the request fails or the response
    ///   carries no token
    /// - [`AuthError::Superseded`] if a logout or another login landed
    ///   while the request was in flight
    pub async fn attempt_login(&self, credentials: Value, remember_token: bool) -> Result<String, AuthError> {
        let result = self.login(credentials, remember_token).await;
        match &result {
            Ok(_) => {
                self.bus().emit(AuthEvent::action_after(
                    Action::AttemptLogin,
                    ActionOutcome::TokenCommitted,
                ));
                self.bus().emit(AuthEvent::LoginSuccess);
            }
            Err(e) => {
                self.bus()
                    .emit(AuthEvent::action_after(Action::AttemptLogin, failed(e)));
                self.bus().emit(AuthEvent::LoginFailed {
                    reason: e.to_string(),
                });
            }
        }
        result
    }

    async fn login(&self, credentials: Value, remember_token: bool) -> Result<String, AuthError> {
        let epoch = self.store().generation().epoch;

        let body = self.inner.methods.map_credentials(credentials);
        let endpoint = &self.config().api_endpoints.login;
        let response = self
            .inner
            .methods
            .send_login(&self.inner.http, endpoint, body)
            .await?;
        let token = self.inner.methods.map_login_response_to_token(&response)?;

        if !self.store().start_session(epoch, token.clone(), remember_token) {
            return Err(AuthError::Superseded(Action::AttemptLogin));
        }
        info!(module = %self.config().module, remember_token, "login succeeded");

        self.spawn_login_follow_up();
        Ok(token)
    }

    fn spawn_login_follow_up(&self) {
        let config = self.config();
        let refresh = config.refresh_token_after_login;
        let fetch = config.fetch_user_after_login && !config.fetch_user_after_token_refreshed;
        if !refresh && !fetch {
            return;
        }

        let this = self.clone();
        tokio::spawn(async move {
            if refresh {
                if let Err(e) = this.refresh_token().await {
                    this.report(ErrorContext::FollowUp, &e);
                    return;
                }
            }
            if fetch {
                if let Err(e) = this.fetch_user().await {
                    this.report(ErrorContext::FollowUp, &e);
                }
            }
        });
    }

    // -----------------------------------------------------------------------
    // refresh_token
    // -----------------------------------------------------------------------

    /// Exchanges the current token for a new one. Returns the new token.
    ///
    /// # Errors
    /// - [`AuthError::MissingToken`] if there is no session
    /// - [`AuthError::RequestFailed`] if the request fails
    /// - [`AuthError::Superseded`] if the session changed meanwhile
    pub async fn refresh_token(&self) -> Result<String, AuthError> {
        let result = self.refresh().await;
        let outcome = match &result {
            Ok(_) => ActionOutcome::TokenCommitted,
            Err(e) => failed(e),
        };
        self.bus()
            .emit(AuthEvent::action_after(Action::RefreshToken, outcome));
        result
    }

    async fn refresh(&self) -> Result<String, AuthError> {
        let snapshot = self.store().snapshot();
        let token = snapshot.token.ok_or(AuthError::MissingToken)?;

        let endpoint = &self.config().api_endpoints.refresh_token;
        let response = self
            .inner
            .methods
            .send_refresh(&self.inner.http, endpoint, &token)
            .await?;
        let fresh = self.inner.methods.map_refresh_response_to_token(&response)?;

        if !self.store().set_token_if(snapshot.generation, Some(fresh.clone())) {
            return Err(AuthError::Superseded(Action::RefreshToken));
        }
        debug!("token refreshed");

        if self.config().fetch_user_after_token_refreshed {
            self.spawn_fetch_user();
        }
        Ok(fresh)
    }

    // -----------------------------------------------------------------------
    // fetch_user
    // -----------------------------------------------------------------------

    /// Loads the user profile for the current session.
    ///
    /// # Errors
    /// - [`AuthError::MissingToken`] if there is no session
    /// - [`AuthError::RequestFailed`] if the request fails
    /// - [`AuthError::InvalidUserData`] if the payload is not an object
    /// - [`AuthError::Superseded`] if a logout or login landed meanwhile
    pub async fn fetch_user(&self) -> Result<User, AuthError> {
        let result = self.fetch().await;
        let outcome = match &result {
            Ok(user) => ActionOutcome::UserCommitted { user: user.clone() },
            Err(e) => failed(e),
        };
        self.bus()
            .emit(AuthEvent::action_after(Action::FetchUser, outcome));
        result
    }

    async fn fetch(&self) -> Result<User, AuthError> {
        let snapshot = self.store().snapshot();
        let token = snapshot.token.ok_or(AuthError::MissingToken)?;

        let endpoint = &self.config().api_endpoints.fetch_user;
        let response = self
            .inner
            .methods
            .send_fetch_user(&self.inner.http, endpoint, &token)
            .await?;
        let raw = self.inner.methods.map_fetch_user_response(&response);
        let user = self.inner.methods.check_user_object(raw)?;

        if !self.store().set_user_if(snapshot.generation.epoch, user.clone()) {
            return Err(AuthError::Superseded(Action::FetchUser));
        }
        Ok(user)
    }

    fn spawn_fetch_user(&self) {
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.fetch_user().await {
                this.report(ErrorContext::FollowUp, &e);
            }
        });
    }

    // -----------------------------------------------------------------------
    // logout
    // -----------------------------------------------------------------------

    /// Clears the session immediately, then tells the server.
    ///
    /// Never fails. Returns whether the server acknowledged the logout;
    /// `false` when there was no token to log out.
    pub async fn logout(&self) -> bool {
        let token = self.store().token();
        self.store().logout();

        let server_acknowledged = match token {
            None => false,
            Some(token) => {
                let endpoint = &self.config().api_endpoints.logout;
                let sent = self
                    .inner
                    .methods
                    .send_server_side_logout(&self.inner.http, endpoint, &token)
                    .await;
                match sent {
                    Ok(_) => true,
                    Err(e) => {
                        let err = AuthError::from(e);
                        self.inner.methods.handle_server_side_logout_error(&err);
                        self.bus()
                            .emit(AuthEvent::error(ErrorContext::ServerSideLogout, err.to_string()));
                        false
                    }
                }
            }
        };

        self.bus().emit(AuthEvent::action_after(
            Action::Logout,
            ActionOutcome::LoggedOut { server_acknowledged },
        ));
        server_acknowledged
    }

    // -----------------------------------------------------------------------
    // Reporting
    // -----------------------------------------------------------------------

    /// Reports a failure that no caller will see.
    ///
    /// Superseded results are expected under concurrency and only logged.
    pub fn report(&self, context: ErrorContext, error: &AuthError) {
        if error.is_superseded() {
            debug!(context = context.as_str(), error = %error, "result discarded");
            return;
        }
        warn!(context = context.as_str(), error = %error, "background session task failed");
        self.bus().emit(AuthEvent::error(context, error.to_string()));
    }
}

fn failed(error: &AuthError) -> ActionOutcome {
    ActionOutcome::Failed {
        message: error.to_string(),
    }
}
