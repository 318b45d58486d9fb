//! Activity-driven idle detection.
//!
//! [`ActivityIdleDetector`] is a small actor: the host feeds it raw
//! activity events (`"mousemove"`, `"keypress"`, ...) through
//! [`record_activity`](ActivityIdleDetector::record_activity), and it
//! broadcasts [`IdleSignal`]s to every subscriber.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace};
use warden_timer::IdleTimer;

use crate::IdleDetector;

/// Receiver half of an idle detector's signal stream.
pub type IdleSignals = broadcast::Receiver<IdleSignal>;

/// What an idle detector reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdleSignal {
    /// The user did something.
    Active,
    /// The inactivity window elapsed.
    Idle,
}

/// Configuration for [`ActivityIdleDetector`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleConfig {
    /// Seconds without activity before [`IdleSignal::Idle`] fires.
    pub idle_seconds: u64,
    /// Activity event names that count as user activity.
    pub events: Vec<String>,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            idle_seconds: 300,
            events: [
                "mousemove",
                "mousedown",
                "keypress",
                "DOMMouseScroll",
                "DOMContentLoaded",
                "mousewheel",
                "touchmove",
                "MSPointerMove",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl IdleConfig {
    /// The inactivity window as a [`Duration`].
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.idle_seconds)
    }
}

const SIGNAL_CAPACITY: usize = 64;

#[derive(Debug)]
enum Command {
    Register,
    Reset { emit_active: bool },
    Activity(String),
}

/// Idle detector driven by host-reported activity events.
///
/// Activity is ignored until [`register_events`](IdleDetector::register_events)
/// is called. Dropping the detector stops its task.
///
/// Must be created inside a Tokio runtime.
#[derive(Debug)]
pub struct ActivityIdleDetector {
    commands: mpsc::UnboundedSender<Command>,
    signals: broadcast::Sender<IdleSignal>,
    config: IdleConfig,
}

impl ActivityIdleDetector {
    /// Spawns the detector task.
    pub fn new(config: IdleConfig) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);

        let actor = IdleActor {
            timer: IdleTimer::new(config.window()),
            watched: config.events.clone(),
            registered: false,
            signals: signals.clone(),
            commands: rx,
        };
        tokio::spawn(actor.run());

        Self {
            commands,
            signals,
            config,
        }
    }

    /// Reports a raw activity event from the host.
    ///
    /// Events not in the watched list are dropped.
    pub fn record_activity(&self, event: &str) {
        let _ = self.commands.send(Command::Activity(event.to_string()));
    }

    pub fn config(&self) -> &IdleConfig {
        &self.config
    }
}

impl IdleDetector for ActivityIdleDetector {
    fn register_events(&self) {
        let _ = self.commands.send(Command::Register);
    }

    fn reset_timer(&self, emit_active: bool) {
        let _ = self.commands.send(Command::Reset { emit_active });
    }

    fn subscribe(&self) -> IdleSignals {
        self.signals.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct IdleActor {
    timer: IdleTimer,
    watched: Vec<String>,
    registered: bool,
    signals: broadcast::Sender<IdleSignal>,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl IdleActor {
    async fn run(mut self) {
        debug!(
            window_secs = self.timer.window().as_secs(),
            "idle detector started"
        );

        loop {
            tokio::select! {
                cmd = self.commands.recv() => {
                    let Some(cmd) = cmd else { break };
                    self.handle(cmd);
                }
                () = self.timer.wait_for_idle() => {
                    info!("user idle");
                    let _ = self.signals.send(IdleSignal::Idle);
                }
            }
        }

        debug!("idle detector stopped");
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Register => {
                self.registered = true;
                debug!(events = self.watched.len(), "activity events registered");
            }
            Command::Reset { emit_active } => self.reset(emit_active),
            Command::Activity(event) => {
                if !self.registered {
                    return;
                }
                if !self.watched.iter().any(|w| *w == event) {
                    trace!(%event, "ignoring unwatched event");
                    return;
                }
                self.reset(true);
            }
        }
    }

    fn reset(&mut self, emit_active: bool) {
        self.timer.reset();
        if emit_active {
            let _ = self.signals.send(IdleSignal::Active);
        }
    }
}
