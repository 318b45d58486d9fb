//! Keeps a bound router consistent with the session.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};
use warden_event::{AuthEvent, ErrorContext, EventBus, EventSubscription};
use warden_guard::{NavigationGuard, Router};
use warden_session::TaskHandle;

/// A router bound to a session, with the task that re-checks it.
pub(crate) struct RouterBinding {
    pub(crate) router: Arc<dyn Router>,
    pub(crate) task: TaskHandle<u64>,
}

/// Re-runs the guard against the current route after every store
/// mutation. The status counts redirects pushed.
pub(crate) fn spawn_router_binding(
    guard: NavigationGuard,
    router: Arc<dyn Router>,
    bus: EventBus,
) -> RouterBinding {
    let events = bus.subscribe_filtered("mutation.*");
    let (status_tx, status_rx) = watch::channel(0);
    let task = tokio::spawn(run(guard, Arc::clone(&router), bus, events, status_tx));
    RouterBinding {
        router,
        task: TaskHandle::new(status_rx, task),
    }
}

async fn run(
    guard: NavigationGuard,
    router: Arc<dyn Router>,
    bus: EventBus,
    mut events: EventSubscription,
    redirects: watch::Sender<u64>,
) {
    debug!("router binding started");

    while let Some(event) = events.recv().await {
        match guard.redirect_if_needed(router.as_ref()) {
            Ok(Some(target)) => {
                debug!(after = %event, to = %target.full_path(), "redirect pushed");
                redirects.send_modify(|n| *n += 1);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "reactive redirect failed");
                bus.emit(AuthEvent::error(ErrorContext::Redirect, e.to_string()));
            }
        }
    }

    debug!("router binding stopped");
}
