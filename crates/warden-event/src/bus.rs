use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use crate::AuthEvent;

struct Subscriber {
    filter: Option<String>,
    tx: mpsc::UnboundedSender<AuthEvent>,
}

impl Subscriber {
    fn wants(&self, event: &AuthEvent) -> bool {
        self.filter.as_deref().is_none_or(|p| event.matches(p))
    }
}

/// Fan-out bus for [`AuthEvent`]s.
///
/// Each subscriber owns an unbounded queue, so `emit` never blocks and
/// never drops an event for a live subscriber. Events reach every
/// subscriber in the order they were emitted. Closed subscriptions are
/// pruned on the next emit.
///
/// Cloning yields another handle to the same bus.
#[derive(Clone)]
pub struct EventBus {
    name: Arc<str>,
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("name", &self.name)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    /// Creates a bus labelled `name` (the configured module name).
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Publishes an event. Returns how many subscribers received it.
    pub fn emit(&self, event: AuthEvent) -> usize {
        let mut subscribers = self.subscribers.lock();
        let mut delivered = 0;
        subscribers.retain(|s| {
            if !s.wants(&event) {
                return !s.tx.is_closed();
            }
            match s.tx.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            }
        });
        trace!(bus = %self.name, event = %event, delivered, "event emitted");
        delivered
    }

    /// Subscribes to every event.
    pub fn subscribe(&self) -> EventSubscription {
        self.add(None)
    }

    /// Subscribes to events whose name matches `pattern`
    /// (see [`AuthEvent::matches`]).
    pub fn subscribe_filtered(&self, pattern: impl Into<String>) -> EventSubscription {
        self.add(Some(pattern.into()))
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .iter()
            .filter(|s| !s.tx.is_closed())
            .count()
    }

    fn add(&self, filter: Option<String>) -> EventSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(Subscriber { filter, tx });
        EventSubscription { rx }
    }
}

/// Receiving end of an [`EventBus`] subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct EventSubscription {
    rx: mpsc::UnboundedReceiver<AuthEvent>,
}

impl EventSubscription {
    /// Waits for the next event. Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<AuthEvent> {
        self.rx.recv().await
    }

    /// Returns the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<AuthEvent> {
        self.rx.try_recv().ok()
    }

    /// Drains every queued event.
    pub fn drain(&mut self) -> Vec<AuthEvent> {
        let mut events = Vec::new();
        while let Some(e) = self.try_recv() {
            events.push(e);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Mutation;

    #[test]
    fn test_emit_reaches_all_subscribers_in_order() {
        let bus = EventBus::new("auth");
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.emit(AuthEvent::mutation(Mutation::SetToken { present: true }));
        bus.emit(AuthEvent::Ready);

        for sub in [&mut a, &mut b] {
            assert_eq!(
                sub.drain(),
                vec![AuthEvent::mutation(Mutation::SetToken { present: true }), AuthEvent::Ready]
            );
        }
    }

    #[test]
    fn test_filtered_subscription_skips_other_events() {
        let bus = EventBus::new("auth");
        let mut mutations = bus.subscribe_filtered("mutation.*");

        assert_eq!(bus.emit(AuthEvent::Ready), 0);
        assert_eq!(bus.emit(AuthEvent::mutation(Mutation::Logout)), 1);

        assert_eq!(mutations.drain(), vec![AuthEvent::mutation(Mutation::Logout)]);
    }

    #[test]
    fn test_dropped_subscription_is_pruned() {
        let bus = EventBus::new("auth");
        let keep = bus.subscribe();
        let gone = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(gone);
        assert_eq!(bus.emit(AuthEvent::Ready), 1);
        assert_eq!(bus.subscriber_count(), 1);
        drop(keep);
    }

    #[test]
    fn test_emit_without_subscribers_is_noop() {
        let bus = EventBus::new("auth");
        assert_eq!(bus.emit(AuthEvent::LoginSuccess), 0);
    }

    #[tokio::test]
    async fn test_recv_returns_none_after_bus_dropped() {
        let bus = EventBus::new("auth");
        let mut sub = bus.subscribe();
        bus.emit(AuthEvent::AutoLogout);
        drop(bus);

        assert_eq!(sub.recv().await, Some(AuthEvent::AutoLogout));
        assert_eq!(sub.recv().await, None);
    }
}
