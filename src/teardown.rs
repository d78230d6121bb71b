//! Releasing subscriptions when a host object is torn down.
//!
//! [`Dispose`] is implemented by everything that owns channels or
//! subscriptions. A [`Disposer`] collects cleanup actions for a host object
//! and runs them once, on [`dispose`](Disposer::dispose) or on drop.

use crate::core::Subscription;
use crate::history::HistoryRecorder;
use crate::machine::{Machine, State, Transition};
use parking_lot::Mutex;
use std::fmt;

/// Something that can release the resources it owns. Must be idempotent.
pub trait Dispose {
    fn dispose(&self);
}

impl<P: 'static> Dispose for Machine<P> {
    fn dispose(&self) {
        self.close();
    }
}

impl<P: 'static> Dispose for State<P> {
    fn dispose(&self) {
        self.close();
    }
}

impl<P: 'static> Dispose for Transition<P> {
    fn dispose(&self) {
        self.close();
    }
}

impl Dispose for Subscription {
    fn dispose(&self) {
        self.unsubscribe();
    }
}

impl Dispose for HistoryRecorder {
    fn dispose(&self) {
        self.detach();
    }
}

type Action = Box<dyn FnOnce() + Send>;

/// Bag of cleanup actions run in reverse registration order.
///
/// # Example
///
/// ```rust
/// use statekit::{Disposer, Machine};
///
/// let machine: Machine = Machine::new("widget");
/// let idle = machine.new_state("Idle").unwrap();
/// let subscription = idle.on_enter(|_| {});
///
/// {
///     let disposer = Disposer::new();
///     disposer.adopt(machine.clone());
///     // Host object torn down here.
/// }
///
/// assert!(!subscription.is_active());
/// ```
pub struct Disposer {
    actions: Mutex<Vec<Action>>,
}

impl Disposer {
    pub fn new() -> Self {
        Self {
            actions: Mutex::new(Vec::new()),
        }
    }

    /// Register a cleanup action.
    ///
    /// Registering on an already disposed bag is allowed; the action runs at
    /// the next `dispose` or on drop.
    pub fn register<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.actions.lock().push(Box::new(action));
    }

    /// Take ownership of a disposable and dispose it with the bag.
    pub fn adopt<D>(&self, resource: D)
    where
        D: Dispose + Send + 'static,
    {
        self.register(move || resource.dispose());
    }

    /// Run every pending action, most recent first. A second call only runs
    /// actions registered since the first.
    pub fn dispose(&self) {
        let actions = std::mem::take(&mut *self.actions.lock());
        if !actions.is_empty() {
            tracing::trace!(actions = actions.len(), "disposing");
        }
        for action in actions.into_iter().rev() {
            action();
        }
    }

    pub fn pending(&self) -> usize {
        self.actions.lock().len()
    }
}

impl Default for Disposer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Disposer {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("pending", &self.pending())
            .finish()
    }
}
