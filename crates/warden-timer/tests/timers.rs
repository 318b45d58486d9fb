//! Integration tests for the refresh and idle timers.
//!
//! Uses `start_paused = true` so Tokio's clock only advances when every
//! task is idle, which makes deadline checks exact.

use std::time::Duration;

use warden_timer::{IdleTimer, RefreshTimer, RefreshWindow, TimerState};

// =========================================================================
// RefreshTimer
// =========================================================================

#[test]
fn test_refresh_timer_starts_disarmed() {
    let t = RefreshTimer::new();
    assert_eq!(t.state(), TimerState::Disarmed);
    assert!(!t.is_armed());
    assert_eq!(t.remaining(), None);
    assert_eq!(t.arm_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_fire_resolves_at_deadline() {
    let mut t = RefreshTimer::new();
    t.arm(Duration::from_secs(90));

    let start = tokio::time::Instant::now();
    t.wait_for_fire().await;

    assert_eq!(start.elapsed(), Duration::from_secs(90));
    assert_eq!(t.state(), TimerState::Disarmed);
    assert_eq!(t.fire_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_arm_replaces_pending_deadline() {
    let mut t = RefreshTimer::new();
    t.arm(Duration::from_secs(10));
    t.arm(Duration::from_secs(90));

    assert_eq!(t.remaining(), Some(Duration::from_secs(90)));

    // The first deadline must not fire.
    let early = tokio::time::timeout(Duration::from_secs(20), t.wait_for_fire()).await;
    assert!(early.is_err(), "replaced deadline should not fire");

    t.wait_for_fire().await;
    assert_eq!(t.fire_count(), 1);
    assert_eq!(t.arm_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_disarmed_timer_pends_forever() {
    let mut t = RefreshTimer::new();
    t.arm(Duration::from_secs(5));
    assert!(t.disarm());
    assert!(!t.disarm(), "second disarm has nothing to cancel");

    let result = tokio::time::timeout(Duration::from_secs(3600), t.wait_for_fire()).await;
    assert!(result.is_err(), "disarmed timer should never fire");
    assert_eq!(t.fire_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_does_not_consume_deadline() {
    // Dropping the wait future (as select! does) must leave the timer armed.
    let mut t = RefreshTimer::new();
    t.arm(Duration::from_secs(30));

    let _ = tokio::time::timeout(Duration::from_secs(10), t.wait_for_fire()).await;
    assert!(t.is_armed());
    assert_eq!(t.remaining(), Some(Duration::from_secs(20)));
}

#[tokio::test(start_paused = true)]
async fn test_window_drives_timer() {
    let window = RefreshWindow::default();
    let mut t = RefreshTimer::new();
    t.arm(window.refresh_in(1000, 1100, 1000));

    assert_eq!(t.remaining(), Some(Duration::from_secs(90)));
}

// =========================================================================
// IdleTimer
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_idle_timer_fires_after_window() {
    let mut t = IdleTimer::new(Duration::from_secs(300));
    t.reset();

    let start = tokio::time::Instant::now();
    t.wait_for_idle().await;

    assert_eq!(start.elapsed(), Duration::from_secs(300));
    assert!(!t.is_armed());
}

#[tokio::test(start_paused = true)]
async fn test_idle_timer_reset_pushes_deadline() {
    let mut t = IdleTimer::new(Duration::from_secs(60));
    t.reset();

    tokio::time::sleep(Duration::from_secs(45)).await;
    t.reset();

    let start = tokio::time::Instant::now();
    t.wait_for_idle().await;
    assert_eq!(start.elapsed(), Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_idle_timer_fires_once_per_window() {
    let mut t = IdleTimer::new(Duration::from_secs(60));
    t.reset();
    t.wait_for_idle().await;

    let again = tokio::time::timeout(Duration::from_secs(600), t.wait_for_idle()).await;
    assert!(again.is_err(), "no second idle event without activity");
    assert_eq!(t.fire_count(), 1);
}

// =========================================================================
// select! loop pattern (mirrors the scheduler tasks)
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_select_loop_rearm_on_command() {
    let mut t = RefreshTimer::new();
    let (tx, mut rx) = tokio::sync::mpsc::channel::<u64>(4);

    tokio::spawn(async move {
        tx.send(30).await.ok();
        tokio::time::sleep(Duration::from_secs(10)).await;
        // Re-arm before the first deadline: only the second should fire.
        tx.send(50).await.ok();
        tokio::time::sleep(Duration::from_secs(3600)).await;
    });

    let start = tokio::time::Instant::now();
    loop {
        tokio::select! {
            Some(secs) = rx.recv() => t.arm(Duration::from_secs(secs)),
            () = t.wait_for_fire() => break,
        }
    }

    assert_eq!(start.elapsed(), Duration::from_secs(60));
    assert_eq!(t.fire_count(), 1);
}
