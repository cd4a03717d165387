// src/core/events.rs

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Changes to session state that other parts of a run may observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    CwdChanged { from: PathBuf, to: PathBuf },
    CacheWritten { path: PathBuf },
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&SessionEvent)>;

/// Publish/subscribe registry keyed by the stable id of the observed subject.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    subscribers: HashMap<Uuid, Vec<(SubscriptionId, Callback)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls `callback` for every event published about `subject`.
    pub fn subscribe(
        &mut self,
        subject: Uuid,
        callback: impl FnMut(&SessionEvent) + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers
            .entry(subject)
            .or_default()
            .push((id, Box::new(callback)));
        id
    }

    /// Returns whether the subscription existed.
    pub fn unsubscribe(&mut self, subject: Uuid, id: SubscriptionId) -> bool {
        let Some(list) = self.subscribers.get_mut(&subject) else {
            return false;
        };
        let before = list.len();
        list.retain(|(sub, _)| *sub != id);
        before != list.len()
    }

    /// Calls every subscriber of `subject` in subscription order.
    /// Returns how many were called.
    pub fn publish(&mut self, subject: Uuid, event: &SessionEvent) -> usize {
        let Some(list) = self.subscribers.get_mut(&subject) else {
            return 0;
        };
        log::trace!("Publishing {:?} to {} subscribers.", event, list.len());
        for (_, callback) in list.iter_mut() {
            callback(event);
        }
        list.len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subjects", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_events_reach_only_their_subject() {
        let mut bus = EventBus::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&seen);
        bus.subscribe(a, move |event| sink.borrow_mut().push(event.clone()));

        let event = SessionEvent::CacheWritten {
            path: PathBuf::from("/tmp/x.bin.gz"),
        };
        assert_eq!(bus.publish(a, &event), 1);
        assert_eq!(bus.publish(b, &event), 0);
        assert_eq!(*seen.borrow(), vec![event]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut bus = EventBus::new();
        let subject = Uuid::new_v4();
        let count = Rc::new(RefCell::new(0));

        let first = Rc::clone(&count);
        let id = bus.subscribe(subject, move |_| *first.borrow_mut() += 1);
        let second = Rc::clone(&count);
        bus.subscribe(subject, move |_| *second.borrow_mut() += 10);

        let event = SessionEvent::CwdChanged {
            from: PathBuf::from("/a"),
            to: PathBuf::from("/b"),
        };
        bus.publish(subject, &event);
        assert!(bus.unsubscribe(subject, id));
        assert!(!bus.unsubscribe(subject, id));
        bus.publish(subject, &event);
        assert_eq!(*count.borrow(), 21);
    }
}
