//! The record describing one state change.

use crate::machine::State;
use std::fmt;

/// Immutable `(from, to, payload)` record of a single state change.
///
/// A change is produced by [`Machine::start`](crate::Machine::start) and by
/// every successful [`Transition::invoke`](crate::Transition::invoke). The
/// same value is delivered, in order, to the leave channel of `from`, the
/// enter channel of `to`, the machine-wide channel and finally the channel
/// of the transition that produced it.
///
/// The payload belongs to the caller of the transition. The runtime never
/// inspects it.
///
/// # Example
///
/// ```rust
/// use statekit::Machine;
///
/// let machine: Machine<&str> = Machine::new("door");
/// let open = machine.new_state("Open").unwrap();
/// let closed = machine.new_state("Closed").unwrap();
/// let close = machine.new_transition("close", &[open.clone()], &closed).unwrap();
///
/// close.on_invoke(|change| {
///     assert_eq!(change.from.name(), "Open");
///     assert_eq!(change.payload, Some("15w"));
/// });
///
/// machine.start(&open).unwrap();
/// assert!(close.invoke(Some("15w")).unwrap());
/// ```
#[derive(Clone)]
pub struct StateChange<P = ()> {
    /// The state occupied immediately before the change.
    pub from: State<P>,
    /// The state occupied immediately after the change.
    pub to: State<P>,
    /// Host-defined value supplied by the caller.
    pub payload: Option<P>,
}

impl<P> StateChange<P> {
    pub fn new(from: State<P>, to: State<P>, payload: Option<P>) -> Self {
        Self { from, to, payload }
    }

    /// True when `from` and `to` are the same state.
    pub fn is_reentry(&self) -> bool {
        self.from == self.to
    }
}

impl<P: fmt::Debug> fmt::Debug for StateChange<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateChange")
            .field("from", &self.from.name())
            .field("to", &self.to.name())
            .field("payload", &self.payload)
            .finish()
    }
}

impl<P> fmt::Display for StateChange<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from.name(), self.to.name())
    }
}
