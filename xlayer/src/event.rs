//! Fault notification with explicit subscription handles.
//!
//! A [`FaultEvent`] keeps a list of handlers. Subscribing returns a
//! [`Subscription`]; the handler stays registered until the subscription is
//! unsubscribed or dropped.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Callback fired when a communication object faults.
pub type FaultHandler = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Handlers {
    next_id: u64,
    entries: Vec<(u64, FaultHandler)>,
}

#[derive(Clone, Default)]
pub struct FaultEvent {
    handlers: Arc<Mutex<Handlers>>,
}

impl FaultEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: FaultHandler) -> Subscription {
        let mut handlers = self.handlers.lock();
        let id = handlers.next_id;
        handlers.next_id += 1;
        handlers.entries.push((id, handler));
        Subscription {
            id,
            handlers: Arc::downgrade(&self.handlers),
        }
    }

    /// Invokes every registered handler.
    ///
    /// Handlers run outside the lock, so a handler may subscribe or
    /// unsubscribe without deadlocking.
    pub fn fire(&self) {
        let snapshot: Vec<FaultHandler> = self
            .handlers
            .lock()
            .entries
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for handler in snapshot {
            handler();
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.lock().entries.len()
    }
}

impl std::fmt::Debug for FaultEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultEvent")
            .field("handlers", &self.handler_count())
            .finish()
    }
}

/// Registration handle returned by [`FaultEvent::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    handlers: Weak<Mutex<Handlers>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the removal.
    }

    fn remove(&self) {
        if let Some(handlers) = self.handlers.upgrade() {
            handlers.lock().entries.retain(|(id, _)| *id != self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_handler(counter: &Arc<AtomicUsize>) -> FaultHandler {
        let counter = Arc::clone(counter);
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_fire_reaches_subscribers() {
        let event = FaultEvent::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let _a = event.subscribe(counting_handler(&counter));
        let _b = event.subscribe(counting_handler(&counter));

        event.fire();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_removes_handler() {
        let event = FaultEvent::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let sub = event.subscribe(counting_handler(&counter));
        let _other = event.subscribe(counting_handler(&counter));
        assert_eq!(event.handler_count(), 2);

        sub.unsubscribe();
        assert_eq!(event.handler_count(), 1);

        event.fire();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_outlives_event() {
        let event = FaultEvent::new();
        let sub = event.subscribe(Arc::new(|| {}));
        drop(event);
        sub.unsubscribe();
    }

    #[test]
    fn test_handler_may_unsubscribe_during_fire() {
        let event = FaultEvent::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let inner = Arc::clone(&slot);
        let sub = event.subscribe(Arc::new(move || {
            inner.lock().take();
        }));
        *slot.lock() = Some(sub);

        event.fire();
        assert_eq!(event.handler_count(), 0);
    }
}
