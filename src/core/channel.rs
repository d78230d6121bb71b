//! Broadcast channel used for enter, leave, change and invoke notifications.
//!
//! Every subscriber sees every value published after it subscribed, in
//! subscription order. There is no replay buffer. Dispatch is synchronous:
//! `publish` returns once every handler has returned.
//!
//! The subscriber list is copied before dispatch, so handlers may subscribe,
//! unsubscribe or publish again without deadlocking. A handler added during
//! dispatch first sees the next value.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Process-wide counter so ids are unique across channels.
static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Slots<T> {
    closed: bool,
    handlers: Vec<(SubscriptionId, Handler<T>)>,
}

/// Removal half of a channel, type-erased so a [`Subscription`] need not
/// carry the channel's value type.
trait Detach: Send + Sync {
    fn detach(&self, id: SubscriptionId) -> bool;
    fn contains(&self, id: SubscriptionId) -> bool;
}

impl<T> Detach for Mutex<Slots<T>> {
    fn contains(&self, id: SubscriptionId) -> bool {
        self.lock().handlers.iter().any(|(sub, _)| *sub == id)
    }

    fn detach(&self, id: SubscriptionId) -> bool {
        let mut slots = self.lock();
        let before = slots.handlers.len();
        slots.handlers.retain(|(sub, _)| *sub != id);
        slots.handlers.len() != before
    }
}

/// Ordered multi-subscriber broadcast channel.
pub struct Channel<T> {
    slots: Arc<Mutex<Slots<T>>>,
}

impl<T: 'static> Channel<T> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots {
                closed: false,
                handlers: Vec::new(),
            })),
        }
    }

    /// Register a handler for future values.
    ///
    /// Subscribing to a closed channel returns an inert subscription and the
    /// handler is dropped immediately.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut slots = self.slots.lock();
        if slots.closed {
            return Subscription::inert();
        }

        let id = SubscriptionId(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::SeqCst));
        slots.handlers.push((id, Arc::new(handler)));

        let link: Arc<dyn Detach> = self.slots.clone();
        Subscription {
            id: Some(id),
            link: Some(Arc::downgrade(&link)),
        }
    }

    /// Remove a handler. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.slots.detach(id)
    }

    /// Deliver `value` to every current subscriber, in order.
    pub fn publish(&self, value: &T) {
        let handlers: Vec<Handler<T>> = {
            let slots = self.slots.lock();
            slots.handlers.iter().map(|(_, h)| Arc::clone(h)).collect()
        };

        for handler in handlers {
            handler(value);
        }
    }

    /// Drop every subscriber and refuse new ones. Closing twice is a no-op.
    pub fn close(&self) {
        let mut slots = self.slots.lock();
        slots.closed = true;
        slots.handlers.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.slots.lock().closed
    }

    pub fn subscriber_count(&self) -> usize {
        self.slots.lock().handlers.len()
    }
}

impl<T: 'static> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.lock();
        f.debug_struct("Channel")
            .field("subscribers", &slots.handlers.len())
            .field("closed", &slots.closed)
            .finish()
    }
}

/// Handle to one registered handler.
///
/// Dropping the handle does not unsubscribe; the handler stays registered
/// until [`unsubscribe`](Subscription::unsubscribe) is called or its channel
/// is closed.
#[derive(Clone)]
pub struct Subscription {
    id: Option<SubscriptionId>,
    link: Option<Weak<dyn Detach>>,
}

impl Subscription {
    /// A subscription attached to nothing. Used for the wildcard marker and
    /// for closed channels.
    pub(crate) fn inert() -> Self {
        Self {
            id: None,
            link: None,
        }
    }

    /// The id, or `None` for an inert subscription.
    pub fn id(&self) -> Option<SubscriptionId> {
        self.id
    }

    /// True if the handler is still registered on a live channel.
    pub fn is_active(&self) -> bool {
        match (self.id, &self.link) {
            (Some(id), Some(link)) => link.upgrade().is_some_and(|slots| slots.contains(id)),
            _ => false,
        }
    }

    /// Remove the handler. Idempotent.
    pub fn unsubscribe(&self) {
        if let (Some(id), Some(link)) = (self.id, &self.link) {
            if let Some(slots) = link.upgrade() {
                if slots.detach(id) {
                    tracing::trace!(subscription = %id, "unsubscribed");
                }
            }
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
