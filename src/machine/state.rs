//! Observable states.
//!
//! A [`State`] is a cheap handle. Two handles are equal only when they refer
//! to the same declared state; names are labels, not identity.

use super::machine::MachineInner;
use crate::core::{Channel, StateChange, Subscription};
use std::fmt;
use std::sync::{Arc, Weak};

pub(crate) struct StateInner<P> {
    pub(crate) name: String,
    pub(crate) machine: Weak<MachineInner<P>>,
    /// Set only for the placeholder a machine occupies before `start`.
    pub(crate) sentinel: bool,
    entered: Channel<StateChange<P>>,
    left: Channel<StateChange<P>>,
}

enum Repr<P> {
    Any,
    Declared(Arc<StateInner<P>>),
}

/// A named point in a machine's state space.
///
/// States are created with [`Machine::new_state`](crate::Machine::new_state)
/// and expose two notification channels: [`on_enter`](State::on_enter) fires
/// when the machine moves into the state, [`on_leave`](State::on_leave) when
/// it moves out. A transition from a state to itself fires both.
///
/// [`State::ANY`] is the wildcard marker. It belongs to no machine, is never
/// active, and is only meaningful in a transition's source list, where it
/// makes the transition legal from every current state. It is not a real
/// state and can never be entered, left or used as a target.
///
/// # Example
///
/// ```rust
/// use statekit::{Machine, State};
///
/// let machine: Machine = Machine::new("door");
/// let open = machine.new_state("Open").unwrap();
/// let closed = machine.new_state("Closed").unwrap();
/// let broken = machine.new_state("Broken").unwrap();
/// let smash = machine.new_transition("break", &[State::ANY], &broken).unwrap();
///
/// machine.start(&closed).unwrap();
/// assert!(closed.is_active());
/// assert!(!open.is_active());
///
/// smash.invoke(None).unwrap();
/// assert!(broken.is_active());
/// assert!(!State::<()>::ANY.is_active());
/// ```
pub struct State<P = ()> {
    repr: Repr<P>,
}

impl<P> State<P> {
    /// The wildcard marker: "legal from any current state".
    pub const ANY: Self = State { repr: Repr::Any };

    /// Name given at declaration. The wildcard is named `*`.
    pub fn name(&self) -> &str {
        match &self.repr {
            Repr::Any => "*",
            Repr::Declared(inner) => &inner.name,
        }
    }

    /// True for [`State::ANY`].
    pub fn is_wildcard(&self) -> bool {
        matches!(self.repr, Repr::Any)
    }

    /// True if this state is its machine's current state.
    ///
    /// The wildcard is never active. A state whose machine has been dropped
    /// is never active.
    pub fn is_active(&self) -> bool {
        match &self.repr {
            Repr::Any => false,
            Repr::Declared(inner) => inner
                .machine
                .upgrade()
                .is_some_and(|machine| machine.current() == *self),
        }
    }

    pub(crate) fn declared(name: String, machine: Weak<MachineInner<P>>, sentinel: bool) -> Self
    where
        P: 'static,
    {
        State {
            repr: Repr::Declared(Arc::new(StateInner {
                name,
                machine,
                sentinel,
                entered: Channel::new(),
                left: Channel::new(),
            })),
        }
    }

    pub(crate) fn inner(&self) -> Option<&Arc<StateInner<P>>> {
        match &self.repr {
            Repr::Any => None,
            Repr::Declared(inner) => Some(inner),
        }
    }

    pub(crate) fn is_sentinel(&self) -> bool {
        self.inner().is_some_and(|inner| inner.sentinel)
    }

    /// True if this state was declared by (or is the placeholder of) the
    /// machine behind `machine`.
    pub(crate) fn belongs_to(&self, machine: &Arc<MachineInner<P>>) -> bool {
        self.inner()
            .is_some_and(|inner| std::ptr::eq(inner.machine.as_ptr(), Arc::as_ptr(machine)))
    }
}

impl<P: 'static> State<P> {
    /// Subscribe to every change whose `to` is this state.
    ///
    /// Subscribers only see changes that happen after they subscribe. On the
    /// wildcard marker this returns an inert subscription.
    pub fn on_enter<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&StateChange<P>) + Send + Sync + 'static,
    {
        match &self.repr {
            Repr::Any => Subscription::inert(),
            Repr::Declared(inner) => inner.entered.subscribe(handler),
        }
    }

    /// Subscribe to every change whose `from` is this state.
    pub fn on_leave<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&StateChange<P>) + Send + Sync + 'static,
    {
        match &self.repr {
            Repr::Any => Subscription::inert(),
            Repr::Declared(inner) => inner.left.subscribe(handler),
        }
    }

    /// Close both notification channels. Idempotent.
    pub fn close(&self) {
        if let Repr::Declared(inner) = &self.repr {
            inner.entered.close();
            inner.left.close();
        }
    }

    pub(crate) fn notify_enter(&self, change: &StateChange<P>) {
        if let Repr::Declared(inner) = &self.repr {
            inner.entered.publish(change);
        }
    }

    pub(crate) fn notify_leave(&self, change: &StateChange<P>) {
        if let Repr::Declared(inner) = &self.repr {
            inner.left.publish(change);
        }
    }
}

impl<P> Clone for State<P> {
    fn clone(&self) -> Self {
        let repr = match &self.repr {
            Repr::Any => Repr::Any,
            Repr::Declared(inner) => Repr::Declared(Arc::clone(inner)),
        };
        State { repr }
    }
}

impl<P> PartialEq for State<P> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.repr, &other.repr) {
            (Repr::Any, Repr::Any) => true,
            (Repr::Declared(a), Repr::Declared(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<P> Eq for State<P> {}

impl<P> fmt::Display for State<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_wildcard() {
            return f.write_str("State(*)");
        }
        let activity = if self.is_active() { "active" } else { "inactive" };
        write!(f, "State({}, {})", self.name(), activity)
    }
}

impl<P> fmt::Debug for State<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_wildcard() {
            return f.write_str("State::ANY");
        }
        f.debug_struct("State")
            .field("name", &self.name())
            .field("active", &self.is_active())
            .finish()
    }
}
