//! One-shot timers for Warden's background schedulers.
//!
//! Two timers live here, both built on the same cancel-and-replace rule:
//! at most one deadline is outstanding at any time, and arming a timer
//! always discards the previous deadline.
//!
//! - [`RefreshTimer`]: Disarmed / Armed(deadline) state machine that drives
//!   automatic token refresh. The delay comes from [`RefreshWindow`].
//! - [`IdleTimer`]: fixed inactivity window that is pushed forward by
//!   every activity signal and fires once when it elapses.
//!
//! # Integration
//!
//! Both timers are meant to sit inside a scheduler task's `tokio::select!`
//! loop next to an event subscription:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(event) = events.recv() => { /* arm or disarm */ }
//!         () = timer.wait_for_fire() => { /* dispatch refresh */ }
//!     }
//! }
//! ```
//!
//! `wait_for_fire` / `wait_for_idle` pend forever while disarmed, so the
//! other branches keep being served.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Wall-clock source in epoch seconds.
///
/// Token claims are expressed in epoch seconds, so the refresh delay needs a
/// wall clock rather than Tokio's monotonic one. Tests substitute
/// [`ManualClock`] to pin "now".
pub trait Clock: Send + Sync + 'static {
    /// Current time in seconds since the Unix epoch.
    fn now_secs(&self) -> i64;
}

/// [`Clock`] backed by [`SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
    }
}

/// [`Clock`] that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: std::sync::atomic::AtomicI64,
}

impl ManualClock {
    /// Creates a clock frozen at `now` epoch seconds.
    pub fn new(now: i64) -> Self {
        Self {
            now: std::sync::atomic::AtomicI64::new(now),
        }
    }

    /// Moves the clock to `now`.
    pub fn set(&self, now: i64) {
        self.now.store(now, std::sync::atomic::Ordering::SeqCst);
    }

    /// Moves the clock forward by `secs`.
    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> i64 {
        self.now.load(std::sync::atomic::Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Refresh window
// ---------------------------------------------------------------------------

/// Bounds for computing when a token should be refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshWindow {
    /// Never refresh more often than every `min_secs` seconds.
    pub min_secs: u64,
    /// Always refresh at least every `max_secs` seconds.
    pub max_secs: u64,
    /// Refresh this many seconds before the token expires.
    pub ahead_secs: u64,
    /// Random 0..=`jitter_secs` taken off the delay (before clamping) so
    /// that clients sharing a token lifetime do not refresh in lockstep.
    pub jitter_secs: u64,
}

impl Default for RefreshWindow {
    fn default() -> Self {
        Self {
            min_secs: 10,
            max_secs: 3600,
            ahead_secs: 10,
            jitter_secs: 0,
        }
    }
}

impl RefreshWindow {
    /// Fix out-of-range values so the window is safe to use.
    ///
    /// `max_secs` is raised to `min_secs` when it is smaller.
    pub fn validated(mut self) -> Self {
        if self.max_secs < self.min_secs {
            warn!(
                min = self.min_secs,
                max = self.max_secs,
                "max refresh seconds below min, raising max"
            );
            self.max_secs = self.min_secs;
        }
        self
    }

    /// Seconds until the token should be refreshed, before clamping.
    ///
    /// `now - iat` estimates how long ago the server issued the token (clock
    /// skew plus latency), so the remaining lifetime is
    /// `(exp - iat) - (now - iat)`, minus the configured lead time.
    pub fn raw_refresh_in(&self, iat: i64, exp: i64, now: i64) -> i64 {
        let server_now_delta = now.saturating_sub(iat);
        exp.saturating_sub(iat)
            .saturating_sub(server_now_delta)
            .saturating_sub(saturate(self.ahead_secs))
    }

    /// Delay until refresh, clamped to `[min_secs, max_secs]`. Deterministic.
    pub fn refresh_in(&self, iat: i64, exp: i64, now: i64) -> Duration {
        let raw = self.raw_refresh_in(iat, exp, now);
        Duration::from_secs(self.clamp(raw))
    }

    /// Like [`refresh_in`](Self::refresh_in) but with the random jitter
    /// applied before clamping.
    pub fn refresh_in_jittered(&self, iat: i64, exp: i64, now: i64) -> Duration {
        let mut raw = self.raw_refresh_in(iat, exp, now);
        if self.jitter_secs > 0 {
            let jitter = rand::rng().random_range(0..=self.jitter_secs);
            raw = raw.saturating_sub(saturate(jitter));
        }
        Duration::from_secs(self.clamp(raw))
    }

    fn clamp(&self, raw: i64) -> u64 {
        let min = saturate(self.min_secs);
        let max = saturate(self.max_secs.max(self.min_secs));
        raw.clamp(min, max).unsigned_abs()
    }
}

fn saturate(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX)
}

/// Longest delay a timer will actually schedule, about thirty years.
///
/// Longer delays are capped here so the deadline stays representable.
pub const MAX_DELAY: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `now + delay`, capped at [`MAX_DELAY`] from now.
fn deadline_after(delay: Duration) -> TokioInstant {
    let now = TokioInstant::now();
    now.checked_add(delay.min(MAX_DELAY))
        .or_else(|| now.checked_add(Duration::from_secs(86_400)))
        .unwrap_or(now)
}

// ---------------------------------------------------------------------------
// Timer state
// ---------------------------------------------------------------------------

/// Observable state of a one-shot timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// No deadline outstanding.
    Disarmed,
    /// A deadline is pending.
    Armed {
        /// When the timer fires (Tokio clock).
        deadline: TokioInstant,
    },
}

/// The shared one-shot core behind both public timers.
#[derive(Debug, Default)]
struct OneShot {
    deadline: Option<TokioInstant>,
    arm_count: u64,
    fire_count: u64,
}

impl OneShot {
    fn arm(&mut self, delay: Duration) -> TokioInstant {
        let deadline = deadline_after(delay);
        self.deadline = Some(deadline);
        self.arm_count += 1;
        deadline
    }

    fn disarm(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Cancel-safe: state only changes after the sleep has completed.
    async fn wait(&mut self) {
        let Some(deadline) = self.deadline else {
            std::future::pending::<()>().await;
            unreachable!()
        };
        time::sleep_until(deadline).await;
        self.deadline = None;
        self.fire_count += 1;
    }

    fn state(&self) -> TimerState {
        match self.deadline {
            Some(deadline) => TimerState::Armed { deadline },
            None => TimerState::Disarmed,
        }
    }

    fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(TokioInstant::now()))
    }
}

// ---------------------------------------------------------------------------
// RefreshTimer
// ---------------------------------------------------------------------------

/// Disarmed / Armed(deadline) timer that triggers a token refresh.
#[derive(Debug, Default)]
pub struct RefreshTimer {
    inner: OneShot,
}

impl RefreshTimer {
    /// Creates a disarmed timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the timer `delay` from now, replacing any pending deadline.
    pub fn arm(&mut self, delay: Duration) {
        let replaced = self.inner.disarm();
        self.inner.arm(delay);
        debug!(
            refresh_in_secs = delay.as_secs(),
            replaced, "refresh timer armed"
        );
    }

    /// Cancels the pending deadline. Returns `true` if one was pending.
    pub fn disarm(&mut self) -> bool {
        let was_armed = self.inner.disarm();
        if was_armed {
            debug!("refresh timer disarmed");
        }
        was_armed
    }

    /// Waits until the armed deadline passes, then returns to Disarmed.
    ///
    /// While disarmed this future never resolves.
    pub async fn wait_for_fire(&mut self) {
        self.inner.wait().await;
        trace!(fired = self.inner.fire_count, "refresh timer fired");
    }

    /// Current state.
    pub fn state(&self) -> TimerState {
        self.inner.state()
    }

    /// Whether a deadline is pending.
    pub fn is_armed(&self) -> bool {
        self.inner.deadline.is_some()
    }

    /// Time left until the pending deadline, if any.
    pub fn remaining(&self) -> Option<Duration> {
        self.inner.remaining()
    }

    /// How many times the timer has been armed.
    pub fn arm_count(&self) -> u64 {
        self.inner.arm_count
    }

    /// How many times the timer has fired.
    pub fn fire_count(&self) -> u64 {
        self.inner.fire_count
    }
}

// ---------------------------------------------------------------------------
// IdleTimer
// ---------------------------------------------------------------------------

/// Inactivity timer with a fixed window.
///
/// Every [`reset`](Self::reset) pushes the deadline to `now + window`. Once
/// the window elapses the timer fires and stays disarmed until the next
/// reset, so one quiet period yields exactly one idle event.
#[derive(Debug)]
pub struct IdleTimer {
    window: Duration,
    inner: OneShot,
}

impl IdleTimer {
    /// Creates a disarmed idle timer with the given window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            inner: OneShot::default(),
        }
    }

    /// Restarts the inactivity window from now.
    pub fn reset(&mut self) {
        self.inner.arm(self.window);
        trace!(window_secs = self.window.as_secs(), "idle timer reset");
    }

    /// Stops watching for inactivity.
    pub fn disarm(&mut self) -> bool {
        self.inner.disarm()
    }

    /// Waits for the window to elapse without a reset.
    pub async fn wait_for_idle(&mut self) {
        self.inner.wait().await;
        debug!(
            window_secs = self.window.as_secs(),
            "inactivity window elapsed"
        );
    }

    /// The configured inactivity window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether the window is currently running.
    pub fn is_armed(&self) -> bool {
        self.inner.deadline.is_some()
    }

    /// How many idle events have fired.
    pub fn fire_count(&self) -> u64 {
        self.inner.fire_count
    }
}
