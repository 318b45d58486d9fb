//! Scripted drivers shared by the session integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Value, json};
use warden_drivers::{
    Claims, DriverError, HttpTransport, MemoryTokenStorage, Method, RequestConfig, Response,
    TokenDecoder, TokenStorage,
};
use warden_event::{AuthEvent, EventBus, EventSubscription};
use warden_session::{AuthActions, AuthConfig, DefaultMethods};
use warden_store::SessionStore;

// =========================================================================
// Scripted HTTP transport
// =========================================================================

/// A canned reply for one request.
#[derive(Debug, Clone)]
pub enum Reply {
    Ok(Value),
    Fail(String),
}

impl Reply {
    pub fn token(token: &str) -> Self {
        Self::Ok(json!({ "status": "success", "token": token }))
    }

    pub fn user(user: Value) -> Self {
        Self::Ok(json!({ "status": "success", "user": user }))
    }

    pub fn success() -> Self {
        Self::Ok(json!({ "status": "success" }))
    }
}

/// One request as the transport saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub url: String,
    pub bearer: Option<String>,
    pub body: Value,
}

#[derive(Default)]
struct Script {
    queued: HashMap<String, VecDeque<Reply>>,
    fallback: HashMap<String, Reply>,
    delays: HashMap<String, Duration>,
    calls: Vec<Call>,
}

/// HTTP transport answering from per-URL scripts.
///
/// Queued replies are used first, then the URL's fallback. Unscripted
/// URLs fail.
#[derive(Clone, Default)]
pub struct ScriptedHttp {
    script: Arc<Mutex<Script>>,
}

impl ScriptedHttp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a one-shot reply for `url`.
    pub fn then(&self, url: &str, reply: Reply) -> &Self {
        self.script
            .lock()
            .queued
            .entry(url.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Sets the reply used once the queue for `url` is empty.
    pub fn always(&self, url: &str, reply: Reply) -> &Self {
        self.script.lock().fallback.insert(url.to_string(), reply);
        self
    }

    /// Makes every request to `url` take `delay` before answering.
    pub fn delay(&self, url: &str, delay: Duration) -> &Self {
        self.script.lock().delays.insert(url.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().calls.clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.url).collect()
    }

    pub fn count(&self, url: &str) -> usize {
        self.calls().iter().filter(|c| c.url == url).count()
    }
}

impl HttpTransport for ScriptedHttp {
    async fn send_request(
        &self,
        _method: Method,
        url: &str,
        body: Value,
        config: RequestConfig,
    ) -> Result<Response, DriverError> {
        let bearer = config
            .headers
            .iter()
            .find(|(k, _)| k == "Authorization")
            .and_then(|(_, v)| v.strip_prefix("Bearer "))
            .map(String::from);

        let (reply, delay) = {
            let mut script = self.script.lock();
            script.calls.push(Call {
                url: url.to_string(),
                bearer,
                body,
            });
            let queued = script.queued.get_mut(url).and_then(VecDeque::pop_front);
            let reply = queued.or_else(|| script.fallback.get(url).cloned());
            (reply, script.delays.get(url).copied())
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match reply {
            Some(Reply::Ok(body)) => Ok(Response::ok(body)),
            Some(Reply::Fail(message)) => Err(DriverError::RequestFailed {
                status: Some(500),
                message,
            }),
            None => Err(DriverError::request_failed(format!("unscripted url {url}"))),
        }
    }
}

// =========================================================================
// Token decoder for "tok-<iat>-<exp>[-suffix]" tokens
// =========================================================================

pub struct TestDecoder;

impl TokenDecoder for TestDecoder {
    fn decode(&self, token: &str) -> Option<Claims> {
        let mut parts = token.strip_prefix("tok-")?.split('-');
        let iat = parts.next()?.parse().ok()?;
        let exp = parts.next()?.parse().ok()?;
        Some(Claims::new(iat, exp))
    }
}

// =========================================================================
// Token storage that always fails
// =========================================================================

pub struct BrokenStorage;

impl TokenStorage for BrokenStorage {
    async fn get_token(&self) -> Result<Option<String>, DriverError> {
        Err(DriverError::Storage("disk unavailable".into()))
    }

    async fn set_token(&self, _token: &str) -> Result<(), DriverError> {
        Err(DriverError::Storage("disk unavailable".into()))
    }

    async fn delete_token(&self) -> Result<(), DriverError> {
        Err(DriverError::Storage("disk unavailable".into()))
    }
}

// =========================================================================
// Harness
// =========================================================================

pub type TestActions = AuthActions<ScriptedHttp, MemoryTokenStorage, DefaultMethods>;

/// Config with every automatic follow-up switched off.
pub fn quiet_config() -> AuthConfig {
    AuthConfig {
        fetch_user_after_login: false,
        refresh_token_after_login: false,
        fetch_user_after_token_refreshed: false,
        ..AuthConfig::default()
    }
}

pub fn actions(config: AuthConfig) -> (TestActions, ScriptedHttp, MemoryTokenStorage) {
    let http = ScriptedHttp::new();
    let storage = MemoryTokenStorage::new();
    let store = SessionStore::new(EventBus::new(config.module.clone()));
    let actions = AuthActions::new(
        store,
        http.clone(),
        storage.clone(),
        DefaultMethods,
        Arc::new(config),
    );
    (actions, http, storage)
}

/// Lets spawned tasks run. Time is paused in these tests, so this only
/// advances the clock by a few milliseconds.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

pub fn names(sub: &mut EventSubscription) -> Vec<String> {
    sub.drain().iter().map(AuthEvent::name).collect()
}
