//! Token storage sync tests.

mod common;

use std::sync::Arc;

use common::{BrokenStorage, Reply, ScriptedHttp, actions, names, quiet_config, settle};
use serde_json::json;
use warden_drivers::TokenStorage;
use warden_event::EventBus;
use warden_session::{AuthActions, DefaultMethods, SyncStatus, spawn_token_sync};
use warden_store::SessionStore;

#[tokio::test(start_paused = true)]
async fn test_token_sync_remembered_login_is_saved() {
    let (actions, http, storage) = actions(quiet_config());
    http.always("login", Reply::token("tok-1-2"));
    let handle = spawn_token_sync(actions.clone());

    actions.attempt_login(json!({}), true).await.unwrap();
    settle().await;

    assert_eq!(storage.peek().as_deref(), Some("tok-1-2"));
    assert!(handle.status().saved >= 1);
}

#[tokio::test(start_paused = true)]
async fn test_token_sync_unremembered_login_leaves_storage_empty() {
    let (actions, http, storage) = actions(quiet_config());
    storage.set_token("tok-0-1-stale").await.unwrap();
    http.always("login", Reply::token("tok-1-2"));
    let _handle = spawn_token_sync(actions.clone());

    actions.attempt_login(json!({}), false).await.unwrap();
    settle().await;

    assert_eq!(storage.peek(), None);
}

#[tokio::test(start_paused = true)]
async fn test_token_sync_failed_login_keeps_remembered_session() {
    let (actions, http, storage) = actions(quiet_config());
    http.then("login", Reply::token("tok-1-2"));
    http.then("login", Reply::Fail("bad credentials".into()));
    let _handle = spawn_token_sync(actions.clone());

    actions.attempt_login(json!({}), true).await.unwrap();
    settle().await;
    let mut mutations = actions.bus().subscribe_filtered("mutation.*");

    assert!(actions.attempt_login(json!({}), false).await.is_err());
    settle().await;

    assert!(names(&mut mutations).is_empty());
    assert!(actions.store().remember_token());
    assert_eq!(actions.store().token().as_deref(), Some("tok-1-2"));
    assert_eq!(storage.peek().as_deref(), Some("tok-1-2"));
}

#[tokio::test(start_paused = true)]
async fn test_token_sync_refresh_overwrites_saved_token() {
    let (actions, http, storage) = actions(quiet_config());
    http.always("login", Reply::token("tok-1-2-login"));
    http.always("refresh", Reply::token("tok-1-2-refreshed"));
    let _handle = spawn_token_sync(actions.clone());

    actions.attempt_login(json!({}), true).await.unwrap();
    actions.refresh_token().await.unwrap();
    settle().await;

    assert_eq!(storage.peek().as_deref(), Some("tok-1-2-refreshed"));
}

#[tokio::test(start_paused = true)]
async fn test_token_sync_logout_clears_storage() {
    let (actions, http, storage) = actions(quiet_config());
    http.always("login", Reply::token("tok-1-2"));
    http.always("logout", Reply::success());
    let handle = spawn_token_sync(actions.clone());

    actions.attempt_login(json!({}), true).await.unwrap();
    settle().await;
    actions.logout().await;
    settle().await;

    assert_eq!(storage.peek(), None);
    assert!(handle.status().deleted >= 1);
}

#[tokio::test(start_paused = true)]
async fn test_token_sync_storage_failure_is_reported() {
    let store = SessionStore::new(EventBus::new("auth"));
    let actions = AuthActions::new(
        store,
        ScriptedHttp::new(),
        BrokenStorage,
        DefaultMethods,
        Arc::new(quiet_config()),
    );
    let mut errors = actions.bus().subscribe_filtered("error.*");
    let handle = spawn_token_sync(actions.clone());

    actions.store().set_remember_token(true);
    settle().await;

    assert_eq!(names(&mut errors), ["error.tokenStorage"]);
    assert_eq!(handle.status(), SyncStatus::default());
}
