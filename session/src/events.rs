//! Ordered subscriber lists with per-subscriber failure isolation.

use std::fmt;

use log::warn;

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

type Subscriber<E> = Box<dyn FnMut(&E) -> anyhow::Result<()>>;

/// Delivers events to subscribers in subscription order.
///
/// A subscriber returning an error is logged and the remaining subscribers
/// still receive the event.
pub struct EventBus<E> {
    subscribers: Vec<(SubscriptionId, Subscriber<E>)>,
    next_id: u64,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            subscribers: Vec::new(),
            next_id: 1,
        }
    }
}

impl<E> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl<E: fmt::Debug> EventBus<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &mut self,
        subscriber: impl FnMut(&E) -> anyhow::Result<()> + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    /// Removes a subscriber. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        self.subscribers.len() != before
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn publish(&mut self, event: &E) {
        for (id, subscriber) in &mut self.subscribers {
            if let Err(err) = subscriber(event) {
                warn!("subscriber {} failed on {event:?}: {err:#}", id.raw());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn publishes_in_subscription_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        for tag in ["a", "b", "c"] {
            let seen = Rc::clone(&seen);
            bus.subscribe(move |event: &u32| {
                seen.borrow_mut().push(format!("{tag}{event}"));
                Ok(())
            });
        }
        bus.publish(&1);
        assert_eq!(*seen.borrow(), vec!["a1", "b1", "c1"]);
    }

    #[test]
    fn failing_subscriber_does_not_stop_dispatch() {
        let count = Rc::new(RefCell::new(0));
        let mut bus = EventBus::new();
        bus.subscribe(|_: &u32| anyhow::bail!("boom"));
        let counter = Rc::clone(&count);
        bus.subscribe(move |_: &u32| {
            *counter.borrow_mut() += 1;
            Ok(())
        });
        bus.publish(&7);
        bus.publish(&8);
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn unsubscribe_removes_only_that_subscriber() {
        let mut bus: EventBus<u32> = EventBus::new();
        let first = bus.subscribe(|_| Ok(()));
        let _second = bus.subscribe(|_| Ok(()));
        assert!(bus.unsubscribe(first));
        assert!(!bus.unsubscribe(first));
        assert_eq!(bus.len(), 1);
    }
}
