//! Automatic token refresh.
//!
//! Watches token commits and keeps exactly one refresh deadline armed for
//! the current token:
//!
//! ```text
//!              setToken(Some, decodable)
//!   Disarmed ──────────────────────────► Armed(deadline)
//!      ▲  ▲                                 │   │
//!      │  └──── setToken / logout ──────────┘   │ fires: refresh if logged
//!      └────────────────────────────────────────┘
//! ```
//!
//! A new token always disarms first, so repeated logins or refreshes
//! never stack timers.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};
use warden_drivers::{HttpTransport, TokenDecoder, TokenStorage};
use warden_event::{AuthEvent, ErrorContext, EventSubscription, Mutation};
use warden_timer::{Clock, RefreshTimer, RefreshWindow, TimerState};

use crate::{AuthActions, AuthError, AuthMethods, TaskHandle};

/// Starts the refresh scheduler. Its status is the timer state.
///
/// Subscribes before spawning, so no token commit made after this
/// returns can be missed.
pub fn spawn_refresh_scheduler<H, S, M>(
    actions: AuthActions<H, S, M>,
    decoder: Arc<dyn TokenDecoder>,
    clock: Arc<dyn Clock>,
    window: RefreshWindow,
) -> TaskHandle<TimerState>
where
    H: HttpTransport,
    S: TokenStorage,
    M: AuthMethods,
{
    let events = actions.bus().subscribe_filtered("mutation.*");
    let (status_tx, status_rx) = watch::channel(TimerState::Disarmed);
    let scheduler = RefreshScheduler {
        actions,
        decoder,
        clock,
        window,
        timer: RefreshTimer::new(),
        status: status_tx,
    };
    let task = tokio::spawn(scheduler.run(events));
    TaskHandle::new(status_rx, task)
}

struct RefreshScheduler<H, S, M> {
    actions: AuthActions<H, S, M>,
    decoder: Arc<dyn TokenDecoder>,
    clock: Arc<dyn Clock>,
    window: RefreshWindow,
    timer: RefreshTimer,
    status: watch::Sender<TimerState>,
}

impl<H, S, M> RefreshScheduler<H, S, M>
where
    H: HttpTransport,
    S: TokenStorage,
    M: AuthMethods,
{
    async fn run(mut self, mut events: EventSubscription) {
        debug!(
            min = self.window.min_secs,
            max = self.window.max_secs,
            ahead = self.window.ahead_secs,
            "refresh scheduler started"
        );

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    match event.as_mutation() {
                        Some(Mutation::SetToken { .. }) => self.reschedule(),
                        Some(Mutation::Logout) => {
                            self.timer.disarm();
                        }
                        _ => continue,
                    }
                    self.status.send_replace(self.timer.state());
                }
                () = self.timer.wait_for_fire() => {
                    self.status.send_replace(self.timer.state());
                    self.fire();
                }
            }
        }

        debug!("refresh scheduler stopped");
    }

    fn reschedule(&mut self) {
        self.timer.disarm();
        let Some(token) = self.actions.store().token() else {
            return;
        };

        let Some(claims) = self.decoder.decode(&token) else {
            let err = AuthError::TokenRefreshScheduling("token could not be decoded".into());
            warn!(error = %err, "refresh not scheduled");
            self.actions
                .bus()
                .emit(AuthEvent::error(ErrorContext::ScheduleRefresh, err.to_string()));
            return;
        };

        let delay = self
            .window
            .refresh_in_jittered(claims.iat, claims.exp, self.clock.now_secs());
        self.timer.arm(delay);
    }

    fn fire(&self) {
        if !self.actions.store().logged() {
            debug!("refresh deadline passed without a session");
            return;
        }
        let actions = self.actions.clone();
        tokio::spawn(async move {
            if let Err(e) = actions.refresh_token().await {
                actions.report(ErrorContext::ScheduledRefresh, &e);
            }
        });
    }
}
