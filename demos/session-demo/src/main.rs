use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use tracing::info;
use tracing_subscriber::EnvFilter;
use warden::drivers::{ActivityIdleDetector, IdleConfig};
use warden::prelude::*;

// ---------------------------------------------------------------------------
// In-process API
// ---------------------------------------------------------------------------

const PASSWORD: &str = "hunter2";

/// Answers the four auth endpoints locally and mints short-lived JWTs.
struct DemoApi {
    lifetime_secs: i64,
    issued: AtomicU64,
}

impl DemoApi {
    fn new(lifetime_secs: i64) -> Self {
        Self {
            lifetime_secs,
            issued: AtomicU64::new(0),
        }
    }

    fn mint(&self) -> String {
        let iat = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        let serial = self.issued.fetch_add(1, Ordering::Relaxed);
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
        let claims = json!({ "iat": iat, "exp": iat + self.lifetime_secs, "sub": "ada", "serial": serial });
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.")
    }
}

impl HttpTransport for DemoApi {
    async fn send_request(
        &self,
        method: Method,
        url: &str,
        body: Value,
        config: RequestConfig,
    ) -> Result<Response, DriverError> {
        let authorized = config.headers.iter().any(|(k, _)| k == "Authorization");
        info!(%method, url, authorized, "api request");

        match url {
            "login" if body["password"] == PASSWORD => Ok(Response::ok(
                json!({ "status": "success", "token": self.mint() }),
            )),
            "login" => Err(DriverError::RequestFailed {
                status: Some(401),
                message: "invalid credentials".into(),
            }),
            "refresh" if authorized => Ok(Response::ok(
                json!({ "status": "success", "token": self.mint() }),
            )),
            "user" if authorized => Ok(Response::ok(json!({
                "status": "success",
                "user": { "id": 1, "name": "Ada", "email": "ada@example.com" }
            }))),
            "logout" => Ok(Response::ok(json!({ "status": "success" }))),
            _ => Err(DriverError::RequestFailed {
                status: Some(403),
                message: format!("{url} refused"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Walkthrough
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AuthConfig {
        min_refresh_seconds: 3,
        refresh_seconds_ahead: 5,
        idle: IdleConfig {
            idle_seconds: 4,
            ..IdleConfig::default()
        },
        ..AuthConfig::default()
    };
    let detector = Arc::new(ActivityIdleDetector::new(config.idle.clone()));
    let storage = MemoryTokenStorage::new();

    let auth = Auth::builder(config)
        .http(DemoApi::new(8))
        .storage(storage.clone())
        .idle_detector(detector.clone())
        .build()
        .await?;

    let mut events = auth.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("event {line}"),
                Err(e) => eprintln!("unprintable event: {e}"),
            }
        }
    });

    let router = Arc::new(MemoryRouter::new(vec![
        RouteRecord::new("/"),
        RouteRecord::new("/account").with_meta("auth", true),
        RouteRecord::new("/login").with_meta("auth", false),
    ]));
    router.push(Location::new("/account"))?;
    auth.bind_router(router.clone())?;
    print_route("guest opened /account", &router);

    if let Err(e) = auth.attempt_login(json!({ "email": "ada@example.com", "password": "wrong" }), true).await {
        println!("login rejected: {e}");
    }
    auth.attempt_login(json!({ "email": "ada@example.com", "password": PASSWORD }), true)
        .await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    print_route("after login", &router);
    println!("remembered token: {}", storage.peek().is_some());

    // Keep the user active across one scheduled refresh.
    for _ in 0..4 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        detector.record_activity("mousemove");
    }
    println!("refresh timer: {:?}", auth.refresh_status());

    // Then go quiet until the idle logout.
    tokio::time::sleep(Duration::from_secs(5)).await;
    print_route("after idle logout", &router);
    println!("idle logouts: {:?}", auth.idle_logouts());
    println!("snapshot {}", serde_json::to_string(&auth.snapshot())?);

    drop(auth);
    printer.abort();
    Ok(())
}

fn print_route(label: &str, router: &MemoryRouter) {
    let path = router
        .current_route()
        .map(|r| r.full_path())
        .unwrap_or_else(|| "<none>".into());
    println!("{label}: {path}");
}
