//! `Auth` builder and the assembled session.
//!
//! Construction is two-phase: [`AuthBuilder::build`] wires drivers, store
//! and background tasks (and runs `initialize` when configured), then
//! [`Auth::bind_router`] attaches the navigation guard to a router.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info};
use warden_drivers::{
    ActivityIdleDetector, Claims, HttpTransport, IdleDetector, JwtDecoder, TokenDecoder,
    TokenStorage,
};
use warden_event::{EventBus, EventSubscription, User};
use warden_guard::{GuardDecision, Location, NavigationGuard, Route, Router};
use warden_session::{
    AuthActions, AuthConfig, AuthMethods, ConfigurationError, DefaultMethods, SyncStatus,
    TaskHandle, spawn_idle_logout, spawn_refresh_scheduler, spawn_token_sync,
};
use warden_store::{SessionStore, Snapshot};
use warden_timer::{Clock, SystemClock, TimerState};

use crate::WardenError;
use crate::router::{RouterBinding, spawn_router_binding};

// ---------------------------------------------------------------------------
// AuthBuilder
// ---------------------------------------------------------------------------

/// Builder for an [`Auth`] session.
///
/// The HTTP transport and token storage are required. Everything else has
/// a default: [`DefaultMethods`], [`JwtDecoder`], [`SystemClock`], an
/// [`ActivityIdleDetector`] over `config.idle` and an event bus named after
/// `config.module`.
///
/// # Example
///
/// ```rust,ignore
/// let auth = Auth::builder(AuthConfig::default())
///     .http(my_transport)
///     .storage(MemoryTokenStorage::new())
///     .build()
///     .await?;
/// auth.attempt_login(json!({ "email": "ada@example.com" }), true).await?;
/// ```
pub struct AuthBuilder<H, S, M = DefaultMethods> {
    config: AuthConfig,
    http: Option<H>,
    storage: Option<S>,
    methods: M,
    decoder: Option<Arc<dyn TokenDecoder>>,
    idle_detector: Option<Arc<dyn IdleDetector>>,
    clock: Option<Arc<dyn Clock>>,
    bus: Option<EventBus>,
}

impl<H, S> AuthBuilder<H, S, DefaultMethods>
where
    H: HttpTransport,
    S: TokenStorage,
{
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            http: None,
            storage: None,
            methods: DefaultMethods,
            decoder: None,
            idle_detector: None,
            clock: None,
            bus: None,
        }
    }
}

impl<H, S, M> AuthBuilder<H, S, M>
where
    H: HttpTransport,
    S: TokenStorage,
    M: AuthMethods,
{
    pub fn http(mut self, http: H) -> Self {
        self.http = Some(http);
        self
    }

    pub fn storage(mut self, storage: S) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Replaces the per-step hooks.
    pub fn methods<M2: AuthMethods>(self, methods: M2) -> AuthBuilder<H, S, M2> {
        AuthBuilder {
            config: self.config,
            http: self.http,
            storage: self.storage,
            methods,
            decoder: self.decoder,
            idle_detector: self.idle_detector,
            clock: self.clock,
            bus: self.bus,
        }
    }

    pub fn decoder(mut self, decoder: Arc<dyn TokenDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn idle_detector(mut self, detector: Arc<dyn IdleDetector>) -> Self {
        self.idle_detector = Some(detector);
        self
    }

    /// Wall clock used to estimate server time when scheduling refreshes.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Publishes on an existing bus instead of creating one.
    pub fn event_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Validates the configuration, starts the configured background
    /// tasks and, with `auto_initialize`, restores the remembered session.
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    /// [`WardenError::Configuration`] if the configuration is invalid or a
    /// required driver is missing. Initialization itself never fails.
    pub async fn build(self) -> Result<Auth<H, S, M>, WardenError> {
        self.config.validate()?;
        let http = self.http.ok_or(ConfigurationError::MissingDriver("http"))?;
        let storage = self
            .storage
            .ok_or(ConfigurationError::MissingDriver("storage"))?;

        let config = Arc::new(self.config);
        let bus = self
            .bus
            .unwrap_or_else(|| EventBus::new(config.module.clone()));
        let store = SessionStore::new(bus);
        let actions = AuthActions::new(
            store.clone(),
            http,
            storage,
            self.methods,
            Arc::clone(&config),
        );
        let decoder = self.decoder.unwrap_or_else(|| Arc::new(JwtDecoder));

        let sync = config
            .auto_sync_token_storage
            .then(|| spawn_token_sync(actions.clone()));

        let refresher = config.auto_refresh_token.then(|| {
            let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
            spawn_refresh_scheduler(
                actions.clone(),
                Arc::clone(&decoder),
                clock,
                config.refresh_window(),
            )
        });

        let idle = config.auto_logout.then(|| {
            let detector = self
                .idle_detector
                .unwrap_or_else(|| Arc::new(ActivityIdleDetector::new(config.idle.clone())));
            spawn_idle_logout(actions.clone(), detector)
        });

        info!(
            module = %config.module,
            refresh = refresher.is_some(),
            idle_logout = idle.is_some(),
            token_sync = sync.is_some(),
            "session assembled"
        );

        let auth = Auth {
            guard: NavigationGuard::new(store, config.guard.clone()),
            actions,
            decoder,
            refresher,
            idle,
            sync,
            router: Mutex::new(None),
        };

        if config.auto_initialize {
            auth.initialize().await;
        }
        Ok(auth)
    }
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// An assembled session: actions, state, events and navigation guard.
///
/// Dropping it stops every background task it started.
pub struct Auth<H, S, M = DefaultMethods> {
    actions: AuthActions<H, S, M>,
    guard: NavigationGuard,
    decoder: Arc<dyn TokenDecoder>,
    refresher: Option<TaskHandle<TimerState>>,
    idle: Option<TaskHandle<u64>>,
    sync: Option<TaskHandle<SyncStatus>>,
    router: Mutex<Option<RouterBinding>>,
}

impl<H, S> Auth<H, S, DefaultMethods>
where
    H: HttpTransport,
    S: TokenStorage,
{
    /// Creates a builder.
    pub fn builder(config: AuthConfig) -> AuthBuilder<H, S> {
        AuthBuilder::new(config)
    }
}

impl<H, S, M> Auth<H, S, M>
where
    H: HttpTransport,
    S: TokenStorage,
    M: AuthMethods,
{
    // -- Actions ------------------------------------------------------------

    /// See [`AuthActions::initialize`].
    pub async fn initialize(&self) -> bool {
        self.actions.initialize().await
    }

    /// See [`AuthActions::attempt_login`].
    pub async fn attempt_login(&self, credentials: Value, remember_token: bool) -> Result<String, WardenError> {
        Ok(self.actions.attempt_login(credentials, remember_token).await?)
    }

    /// See [`AuthActions::refresh_token`].
    pub async fn refresh_token(&self) -> Result<String, WardenError> {
        Ok(self.actions.refresh_token().await?)
    }

    /// See [`AuthActions::fetch_user`].
    pub async fn fetch_user(&self) -> Result<User, WardenError> {
        Ok(self.actions.fetch_user().await?)
    }

    /// See [`AuthActions::logout`].
    pub async fn logout(&self) -> bool {
        self.actions.logout().await
    }

    /// The underlying actions handle, for spawning work that outlives a
    /// borrow of `self`.
    pub fn actions(&self) -> &AuthActions<H, S, M> {
        &self.actions
    }

    // -- State --------------------------------------------------------------

    pub fn logged(&self) -> bool {
        self.actions.store().logged()
    }

    pub fn ready(&self) -> bool {
        self.actions.store().ready()
    }

    pub fn user(&self) -> User {
        self.actions.store().user()
    }

    pub fn token(&self) -> Option<String> {
        self.actions.store().token()
    }

    pub fn remember_token(&self) -> bool {
        self.actions.store().remember_token()
    }

    /// Claims of the current token, if there is one and it decodes.
    pub fn decoded_token(&self) -> Option<Claims> {
        self.token().and_then(|t| self.decoder.decode(&t))
    }

    pub fn snapshot(&self) -> Snapshot {
        self.actions.store().snapshot()
    }

    pub fn store(&self) -> &SessionStore {
        self.actions.store()
    }

    pub fn config(&self) -> &AuthConfig {
        self.actions.config()
    }

    // -- Events -------------------------------------------------------------

    pub fn bus(&self) -> &EventBus {
        self.actions.bus()
    }

    pub fn subscribe(&self) -> EventSubscription {
        self.bus().subscribe()
    }

    /// Subscribes to events whose name matches a dotted wildcard pattern.
    pub fn subscribe_filtered(&self, pattern: &str) -> EventSubscription {
        self.bus().subscribe_filtered(pattern)
    }

    // -- Background task status --------------------------------------------

    /// The refresh timer, or `None` when auto-refresh is off.
    pub fn refresh_status(&self) -> Option<TimerState> {
        self.refresher.as_ref().map(TaskHandle::status)
    }

    /// Idle logouts performed, or `None` when auto-logout is off.
    pub fn idle_logouts(&self) -> Option<u64> {
        self.idle.as_ref().map(TaskHandle::status)
    }

    /// Storage writes performed, or `None` when storage sync is off.
    pub fn sync_status(&self) -> Option<SyncStatus> {
        self.sync.as_ref().map(TaskHandle::status)
    }

    // -- Navigation ---------------------------------------------------------

    /// Pre-navigation check for a transition to `to`.
    pub fn before_each(&self, to: &Route) -> GuardDecision {
        self.guard.before_each(to)
    }

    /// Binds the navigation guard to `router`.
    ///
    /// Checks the current route immediately, then again after every store
    /// mutation. Failures of those later checks are published as
    /// `error.redirect` events.
    ///
    /// # Errors
    /// - [`ConfigurationError::RouterAlreadyBound`] on a second call
    /// - [`WardenError::Guard`] if the initial redirect fails; the router
    ///   stays bound
    pub fn bind_router(&self, router: Arc<dyn Router>) -> Result<(), WardenError> {
        let mut slot = self.router.lock();
        if slot.is_some() {
            return Err(ConfigurationError::RouterAlreadyBound.into());
        }
        let binding = spawn_router_binding(self.guard.clone(), router, self.bus().clone());
        let initial = self.guard.redirect_if_needed(binding.router.as_ref());
        *slot = Some(binding);
        debug!("router bound");

        initial?;
        Ok(())
    }

    /// Re-checks the bound router's current route now. Returns the
    /// location pushed, if any.
    ///
    /// # Errors
    /// - [`ConfigurationError::MissingRouter`] before [`bind_router`](Self::bind_router)
    /// - [`WardenError::Guard`] if the router refuses the redirect
    pub fn redirect_if_needed(&self) -> Result<Option<Location>, WardenError> {
        let router = self
            .router
            .lock()
            .as_ref()
            .map(|b| Arc::clone(&b.router))
            .ok_or(ConfigurationError::MissingRouter)?;
        Ok(self.guard.redirect_if_needed(router.as_ref())?)
    }

    /// Redirects pushed by the reactive guard, or `None` before
    /// [`bind_router`](Self::bind_router).
    pub fn router_redirects(&self) -> Option<u64> {
        self.router.lock().as_ref().map(|b| b.task.status())
    }
}
