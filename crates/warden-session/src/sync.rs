//! Mirrors the session token into token storage.
//!
//! After every token or "remember me" commit, storage holds the current
//! token if it should be remembered and nothing otherwise. A logout
//! always clears storage.

use tokio::sync::watch;
use tracing::{debug, trace, warn};
use warden_drivers::{DriverError, HttpTransport, TokenStorage};
use warden_event::{AuthEvent, ErrorContext, EventSubscription, Mutation};

use crate::{AuthActions, AuthMethods, TaskHandle};

/// Counts of storage writes performed by the sync task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStatus {
    pub saved: u64,
    pub deleted: u64,
}

/// Starts the token storage sync task.
pub fn spawn_token_sync<H, S, M>(actions: AuthActions<H, S, M>) -> TaskHandle<SyncStatus>
where
    H: HttpTransport,
    S: TokenStorage,
    M: AuthMethods,
{
    let events = actions.bus().subscribe_filtered("mutation.*");
    let (status_tx, status_rx) = watch::channel(SyncStatus::default());
    let task = tokio::spawn(run(actions, events, status_tx));
    TaskHandle::new(status_rx, task)
}

async fn run<H, S, M>(
    actions: AuthActions<H, S, M>,
    mut events: EventSubscription,
    status: watch::Sender<SyncStatus>,
) where
    H: HttpTransport,
    S: TokenStorage,
    M: AuthMethods,
{
    debug!("token storage sync started");

    while let Some(event) = events.recv().await {
        let result = match event.as_mutation() {
            Some(Mutation::SetToken { .. } | Mutation::SetRememberToken(_)) => {
                let snapshot = actions.store().snapshot();
                match snapshot.token.filter(|_| snapshot.remember_token) {
                    Some(token) => save(&actions, &status, &token).await,
                    None => delete(&actions, &status).await,
                }
            }
            Some(Mutation::Logout) => delete(&actions, &status).await,
            _ => continue,
        };

        if let Err(e) = result {
            warn!(error = %e, "token storage sync failed");
            actions
                .bus()
                .emit(AuthEvent::error(ErrorContext::TokenStorage, e.to_string()));
        }
    }

    debug!("token storage sync stopped");
}

async fn save<H, S, M>(
    actions: &AuthActions<H, S, M>,
    status: &watch::Sender<SyncStatus>,
    token: &str,
) -> Result<(), DriverError>
where
    H: HttpTransport,
    S: TokenStorage,
    M: AuthMethods,
{
    actions.storage().set_token(token).await?;
    trace!("remembered token saved");
    status.send_modify(|s| s.saved += 1);
    Ok(())
}

async fn delete<H, S, M>(
    actions: &AuthActions<H, S, M>,
    status: &watch::Sender<SyncStatus>,
) -> Result<(), DriverError>
where
    H: HttpTransport,
    S: TokenStorage,
    M: AuthMethods,
{
    actions.storage().delete_token().await?;
    trace!("remembered token deleted");
    status.send_modify(|s| s.deleted += 1);
    Ok(())
}
