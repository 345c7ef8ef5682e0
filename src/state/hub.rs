use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use tracing::debug;

use crate::models::Snapshot;

/// Snapshot observer
pub type Callback = Box<dyn FnMut(&Snapshot) + Send>;

struct Subscriber {
    id: u64,
    active: AtomicBool,
    /// Emptied on unsubscribe so captured state is released
    callback: Mutex<Option<Callback>>,
}

/// Fan-out of snapshot changes to registered observers
///
/// Callbacks run synchronously, in registration order, on the task that
/// produced the change. The subscriber list is not locked while callbacks run,
/// so a callback may unsubscribe itself or any other subscriber.
#[derive(Clone, Default)]
pub struct SubscriptionHub {
    inner: Arc<HubInner>,
}

#[derive(Default)]
struct HubInner {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Arc<Subscriber>>>,
}

/// Handle returned by [`SubscriptionHub::subscribe`]
///
/// Dropping the handle keeps the subscription alive; call
/// [`Subscription::unsubscribe`] to stop notifications.
#[derive(Clone)]
pub struct Subscription {
    subscriber: Arc<Subscriber>,
    hub: std::sync::Weak<HubInner>,
}

impl SubscriptionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&Snapshot) + Send + 'static,
    {
        let subscriber = Arc::new(Subscriber {
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            active: AtomicBool::new(true),
            callback: Mutex::new(Some(Box::new(callback))),
        });
        lock(&self.inner.subscribers).push(Arc::clone(&subscriber));
        debug!("Subscriber {} registered", subscriber.id);

        Subscription {
            subscriber,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `snapshot` to every active subscriber
    pub fn notify(&self, snapshot: &Snapshot) {
        let subscribers = lock(&self.inner.subscribers).clone();

        for subscriber in subscribers {
            // Re-checked per subscriber so removals made by earlier callbacks take effect
            if !subscriber.active.load(Ordering::Acquire) {
                continue;
            }
            let mut slot = lock(&subscriber.callback);
            if let Some(callback) = slot.as_mut() {
                callback(snapshot);
            }
            // A callback that unsubscribed itself could not release its own slot
            if !subscriber.active.load(Ordering::Acquire) {
                slot.take();
            }
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.subscribers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Subscription {
    /// Stop notifications; safe to call repeatedly and from inside a callback
    pub fn unsubscribe(&self) {
        if !self.subscriber.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(hub) = self.hub.upgrade() {
            lock(&hub.subscribers).retain(|s| s.id != self.subscriber.id);
        }

        // Busy means the callback is running; notify drops it once it returns
        let callback = match self.subscriber.callback.try_lock() {
            Ok(mut slot) => slot.take(),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().take(),
            Err(TryLockError::WouldBlock) => None,
        };
        drop(callback);
        debug!("Subscriber {} removed", self.subscriber.id);
    }

    pub fn is_active(&self) -> bool {
        self.subscriber.active.load(Ordering::Acquire)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
