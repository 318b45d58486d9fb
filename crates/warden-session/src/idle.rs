//! Logs the user out after a period of inactivity.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, trace, warn};
use warden_drivers::{HttpTransport, IdleDetector, IdleSignal, IdleSignals, TokenStorage};
use warden_event::{AuthEvent, EventSubscription};

use crate::{AuthActions, AuthMethods, TaskHandle};

/// Starts the idle-logout scheduler. Its status counts idle logouts.
///
/// Registers the detector's activity events and starts its inactivity
/// window immediately. The window restarts whenever the session goes
/// from logged out to logged in.
pub fn spawn_idle_logout<H, S, M>(
    actions: AuthActions<H, S, M>,
    detector: Arc<dyn IdleDetector>,
) -> TaskHandle<u64>
where
    H: HttpTransport,
    S: TokenStorage,
    M: AuthMethods,
{
    let events = actions.bus().subscribe_filtered("mutation.*");
    let signals = detector.subscribe();
    detector.register_events();
    detector.reset_timer(false);

    let (status_tx, status_rx) = watch::channel(0);
    let scheduler = IdleLogout {
        was_logged: actions.store().logged(),
        actions,
        detector,
        logouts: status_tx,
    };
    let task = tokio::spawn(scheduler.run(events, signals));
    TaskHandle::new(status_rx, task)
}

struct IdleLogout<H, S, M> {
    actions: AuthActions<H, S, M>,
    detector: Arc<dyn IdleDetector>,
    was_logged: bool,
    logouts: watch::Sender<u64>,
}

impl<H, S, M> IdleLogout<H, S, M>
where
    H: HttpTransport,
    S: TokenStorage,
    M: AuthMethods,
{
    async fn run(mut self, mut events: EventSubscription, mut signals: IdleSignals) {
        debug!("idle logout scheduler started");

        loop {
            tokio::select! {
                event = events.recv() => {
                    if event.is_none() {
                        break;
                    }
                    let logged = self.actions.store().logged();
                    if logged && !self.was_logged {
                        trace!("session started, restarting inactivity window");
                        self.detector.reset_timer(false);
                    }
                    self.was_logged = logged;
                }
                signal = signals.recv() => {
                    match signal {
                        Ok(IdleSignal::Idle) => self.on_idle().await,
                        Ok(IdleSignal::Active) => trace!("user active"),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "idle signals lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }

        debug!("idle logout scheduler stopped");
    }

    async fn on_idle(&mut self) {
        if !self.actions.store().logged() {
            trace!("idle without a session");
            return;
        }
        info!("logging out idle user");
        self.actions.bus().emit(AuthEvent::AutoLogout);
        self.actions.logout().await;
        self.actions.bus().emit(AuthEvent::AutoLogoutAfter);
        self.logouts.send_modify(|n| *n += 1);
    }
}
