//! End-to-end tests of the assembled session.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Value, json};
use warden::prelude::*;
use warden::drivers::{ActivityIdleDetector, IdleConfig};
use warden::timer::{ManualClock, TimerState};

// =========================================================================
// Drivers
// =========================================================================

/// API answering each URL with a fixed body; unknown URLs fail.
#[derive(Clone, Default)]
struct FakeApi {
    replies: Arc<Mutex<HashMap<String, Value>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeApi {
    fn reply(self, url: &str, body: Value) -> Self {
        self.replies.lock().insert(url.to_string(), body);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl HttpTransport for FakeApi {
    async fn send_request(
        &self,
        _method: Method,
        url: &str,
        _body: Value,
        _config: RequestConfig,
    ) -> Result<Response, DriverError> {
        self.calls.lock().push(url.to_string());
        match self.replies.lock().get(url) {
            Some(body) => Ok(Response::ok(body.clone())),
            None => Err(DriverError::request_failed(format!("{url} unavailable"))),
        }
    }
}

/// Decodes `tok-<iat>-<exp>[-suffix]`.
struct PlainDecoder;

impl TokenDecoder for PlainDecoder {
    fn decode(&self, token: &str) -> Option<Claims> {
        let mut parts = token.strip_prefix("tok-")?.split('-');
        let iat = parts.next()?.parse().ok()?;
        let exp = parts.next()?.parse().ok()?;
        Some(Claims::new(iat, exp))
    }
}

fn api() -> FakeApi {
    FakeApi::default()
        .reply("login", json!({ "status": "success", "token": "tok-1000-1100" }))
        .reply("refresh", json!({ "status": "success", "token": "tok-1000-1100-r" }))
        .reply("user", json!({ "status": "success", "user": { "name": "ada" } }))
        .reply("logout", json!({ "status": "success" }))
}

fn config() -> AuthConfig {
    AuthConfig {
        auto_logout: false,
        refresh_token_after_login: false,
        ..AuthConfig::default()
    }
}

fn builder(config: AuthConfig, http: FakeApi, storage: MemoryTokenStorage) -> AuthBuilder<FakeApi, MemoryTokenStorage> {
    Auth::builder(config)
        .http(http)
        .storage(storage)
        .decoder(Arc::new(PlainDecoder))
        .clock(Arc::new(ManualClock::new(1000)))
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

fn router() -> Arc<MemoryRouter> {
    Arc::new(MemoryRouter::new(vec![
        RouteRecord::new("/"),
        RouteRecord::new("/account").with_meta("auth", true),
        RouteRecord::new("/login").with_meta("auth", false),
    ]))
}

// =========================================================================
// Construction
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_build_without_http_is_missing_driver() {
    let result = AuthBuilder::<FakeApi, MemoryTokenStorage>::new(config())
        .storage(MemoryTokenStorage::new())
        .build()
        .await;

    assert!(matches!(
        result,
        Err(WardenError::Configuration(ConfigurationError::MissingDriver("http")))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_build_without_storage_is_missing_driver() {
    let result = AuthBuilder::<FakeApi, MemoryTokenStorage>::new(config())
        .http(api())
        .build()
        .await;

    assert!(matches!(
        result,
        Err(WardenError::Configuration(ConfigurationError::MissingDriver("storage")))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_build_rejects_inverted_refresh_window() {
    let bad = AuthConfig {
        min_refresh_seconds: 100,
        max_refresh_seconds: 10,
        ..config()
    };

    let result = builder(bad, api(), MemoryTokenStorage::new()).build().await;

    assert!(matches!(
        result,
        Err(WardenError::Configuration(
            ConfigurationError::InvalidRefreshWindow { min: 100, max: 10 }
        ))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_build_rejects_unbounded_refresh_and_idle_windows() {
    let refresh = AuthConfig {
        max_refresh_seconds: u64::MAX,
        ..config()
    };
    let result = builder(refresh, api(), MemoryTokenStorage::new()).build().await;
    assert!(matches!(
        result,
        Err(WardenError::Configuration(ConfigurationError::ValueOutOfRange { .. }))
    ));

    let idle = AuthConfig {
        auto_logout: true,
        idle: IdleConfig {
            idle_seconds: u64::MAX,
            ..IdleConfig::default()
        },
        ..config()
    };
    let result = builder(idle, api(), MemoryTokenStorage::new()).build().await;
    assert!(matches!(
        result,
        Err(WardenError::Configuration(ConfigurationError::ValueOutOfRange {
            field: "idle.idle_seconds",
            ..
        }))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_build_initializes_to_ready_without_session() {
    let http = api();
    let auth = builder(config(), http.clone(), MemoryTokenStorage::new())
        .build()
        .await
        .unwrap();

    assert!(auth.ready());
    assert!(!auth.logged());
    assert!(http.calls().is_empty());
    assert_eq!(auth.refresh_status(), Some(TimerState::Disarmed));
    assert_eq!(auth.idle_logouts(), None);
}

#[tokio::test(start_paused = true)]
async fn test_build_restores_remembered_session() {
    let http = api();
    let storage = MemoryTokenStorage::with_token("tok-1000-1100");

    let auth = builder(config(), http.clone(), storage.clone())
        .build()
        .await
        .unwrap();
    settle().await;

    assert!(auth.logged() && auth.remember_token() && auth.ready());
    assert_eq!(auth.token().as_deref(), Some("tok-1000-1100-r"));
    assert_eq!(auth.user().get("name"), Some(&json!("ada")));
    assert_eq!(storage.peek().as_deref(), Some("tok-1000-1100-r"));
    assert!(matches!(auth.refresh_status(), Some(TimerState::Armed { .. })));
    assert_eq!(http.calls(), ["refresh", "user"]);
}

#[tokio::test]
async fn test_file_storage_restores_session_after_rebuild() {
    let dir = tempfile::TempDir::new().unwrap();
    let build = |http: FakeApi| {
        Auth::builder(config())
            .http(http)
            .storage(FileTokenStorage::new(dir.path()))
            .decoder(Arc::new(PlainDecoder))
            .clock(Arc::new(ManualClock::new(1000)))
            .build()
    };

    let stored = FileTokenStorage::new(dir.path());

    let first = build(api()).await.unwrap();
    first.attempt_login(json!({}), true).await.unwrap();
    wait_for_token(&stored, "tok-1000-1100").await;
    drop(first);

    let http = api();
    let second = build(http.clone()).await.unwrap();
    wait_for_token(&stored, "tok-1000-1100-r").await;
    settle().await;

    assert!(second.logged() && second.remember_token());
    assert_eq!(second.user().get("name"), Some(&json!("ada")));
    assert_eq!(http.calls(), ["refresh", "user"]);
}

/// Polls file storage until the background sync has written `expected`.
async fn wait_for_token(storage: &FileTokenStorage, expected: &str) {
    for _ in 0..200 {
        if storage.get_token().await.unwrap().as_deref() == Some(expected) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("token file never held {expected}");
}

#[tokio::test(start_paused = true)]
async fn test_build_without_auto_initialize_is_not_ready() {
    let cfg = AuthConfig {
        auto_initialize: false,
        ..config()
    };
    let auth = builder(cfg, api(), MemoryTokenStorage::with_token("tok-1-2"))
        .build()
        .await
        .unwrap();

    assert!(!auth.ready());
    assert!(!auth.logged());
    assert!(auth.initialize().await);
}

// =========================================================================
// Session flow
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_login_then_logout_keeps_storage_and_timer_in_step() {
    let storage = MemoryTokenStorage::new();
    let auth = builder(config(), api(), storage.clone())
        .build()
        .await
        .unwrap();
    let mut login = auth.subscribe_filtered("login.*");

    auth.attempt_login(json!({ "email": "ada@example.com" }), true)
        .await
        .unwrap();
    settle().await;

    assert_eq!(login.try_recv(), Some(AuthEvent::LoginSuccess));
    assert_eq!(storage.peek().as_deref(), Some("tok-1000-1100"));
    assert!(matches!(auth.refresh_status(), Some(TimerState::Armed { .. })));
    assert_eq!(auth.decoded_token().map(|c| c.exp), Some(1100));

    assert!(auth.logout().await);
    settle().await;

    assert!(!auth.logged());
    assert!(auth.user().is_empty());
    assert_eq!(storage.peek(), None);
    assert_eq!(auth.refresh_status(), Some(TimerState::Disarmed));
    assert_eq!(auth.decoded_token(), None);
}

#[tokio::test(start_paused = true)]
async fn test_login_failure_surfaces_as_auth_error() {
    let http = FakeApi::default();
    let auth = builder(config(), http, MemoryTokenStorage::new())
        .build()
        .await
        .unwrap();

    let err = auth.attempt_login(json!({}), false).await.unwrap_err();

    assert!(matches!(err, WardenError::Auth(AuthError::RequestFailed(_))));
    assert!(!auth.logged());
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_refresh_runs_through_assembled_session() {
    let http = api();
    let auth = builder(config(), http.clone(), MemoryTokenStorage::new())
        .build()
        .await
        .unwrap();

    auth.attempt_login(json!({}), false).await.unwrap();
    tokio::time::sleep(Duration::from_secs(91)).await;
    settle().await;

    assert_eq!(auth.token().as_deref(), Some("tok-1000-1100-r"));
    assert!(http.calls().contains(&"refresh".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_idle_logout_through_builder() {
    let detector = Arc::new(ActivityIdleDetector::new(IdleConfig {
        idle_seconds: 60,
        ..IdleConfig::default()
    }));
    let cfg = AuthConfig {
        auto_logout: true,
        auto_refresh_token: false,
        ..config()
    };
    let auth = builder(cfg, api(), MemoryTokenStorage::new())
        .idle_detector(detector.clone())
        .build()
        .await
        .unwrap();

    auth.attempt_login(json!({}), false).await.unwrap();
    settle().await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    detector.record_activity("keypress");
    tokio::time::sleep(Duration::from_secs(45)).await;
    assert!(auth.logged());

    tokio::time::sleep(Duration::from_secs(20)).await;
    settle().await;
    assert!(!auth.logged());
    assert_eq!(auth.idle_logouts(), Some(1));
    assert_eq!(auth.refresh_status(), None);
}

// =========================================================================
// Navigation
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_bind_router_redirects_current_route_immediately() {
    let auth = builder(config(), api(), MemoryTokenStorage::new())
        .build()
        .await
        .unwrap();
    let router = router();
    router.push(Location::new("/account")).unwrap();

    auth.bind_router(router.clone()).unwrap();

    assert_eq!(
        router.current_route().unwrap().full_path(),
        "/login?nextUrl=/account"
    );
}

#[tokio::test(start_paused = true)]
async fn test_bound_router_follows_login_and_logout() {
    let auth = builder(config(), api(), MemoryTokenStorage::new())
        .build()
        .await
        .unwrap();
    let router = router();
    router.push(Location::new("/login")).unwrap();
    auth.bind_router(router.clone()).unwrap();

    auth.attempt_login(json!({}), false).await.unwrap();
    settle().await;
    assert_eq!(router.current_route().unwrap().path(), "/");

    router.push(Location::new("/account")).unwrap();
    auth.logout().await;
    settle().await;
    assert_eq!(router.current_route().unwrap().path(), "/login");
    assert_eq!(auth.router_redirects(), Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_bind_router_twice_is_rejected() {
    let auth = builder(config(), api(), MemoryTokenStorage::new())
        .build()
        .await
        .unwrap();

    auth.bind_router(router()).unwrap();
    let err = auth.bind_router(router()).unwrap_err();

    assert!(matches!(
        err,
        WardenError::Configuration(ConfigurationError::RouterAlreadyBound)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_redirect_if_needed_without_router_is_rejected() {
    let auth = builder(config(), api(), MemoryTokenStorage::new())
        .build()
        .await
        .unwrap();

    assert!(matches!(
        auth.redirect_if_needed(),
        Err(WardenError::Configuration(ConfigurationError::MissingRouter))
    ));
    assert_eq!(auth.router_redirects(), None);
}

#[tokio::test(start_paused = true)]
async fn test_before_each_guards_transitions() {
    let auth = builder(config(), api(), MemoryTokenStorage::new())
        .build()
        .await
        .unwrap();
    let router = router();
    let account = router.resolve(Location::new("/account"));

    assert_eq!(
        auth.before_each(&account),
        GuardDecision::Redirect(Location::new("/login").with_query("nextUrl", "/account"))
    );

    auth.attempt_login(json!({}), false).await.unwrap();
    assert_eq!(auth.before_each(&account), GuardDecision::Allow);
}
