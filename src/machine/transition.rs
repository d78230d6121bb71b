//! Named, validated, cancellable transitions.

use super::error::{MachineError, Result};
use super::machine::MachineInner;
use super::State;
use crate::core::guard::first_veto;
use crate::core::{Channel, StateChange, Subscription, Veto};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

pub(crate) struct TransitionInner<P> {
    name: String,
    machine: Weak<MachineInner<P>>,
    sources: Vec<State<P>>,
    target: State<P>,
    vetoes: Mutex<Vec<Veto<P>>>,
    invoked: Channel<StateChange<P>>,
}

/// A directed edge from one or more source states to a single target.
///
/// Invoking a transition checks that the machine's current state is one of
/// the sources (or that [`State::ANY`] is), then runs every veto registered
/// with [`cancel_if`](Transition::cancel_if). A source mismatch is a hard
/// error; a veto is reported as `Ok(false)`.
///
/// # Example
///
/// ```rust
/// use statekit::Machine;
///
/// let machine: Machine = Machine::new("door");
/// let open = machine.new_state("Open").unwrap();
/// let closed = machine.new_state("Closed").unwrap();
/// let close = machine.new_transition("close", &[open.clone()], &closed).unwrap();
///
/// machine.start(&open).unwrap();
/// assert!(close.can_invoke(None));
/// assert!(close.invoke(None).unwrap());
///
/// // Closed is not a source of `close`.
/// assert!(!close.can_invoke(None));
/// assert!(close.invoke(None).is_err());
/// ```
pub struct Transition<P = ()> {
    inner: Arc<TransitionInner<P>>,
}

impl<P> Transition<P> {
    pub(crate) fn new(
        name: String,
        machine: Weak<MachineInner<P>>,
        sources: Vec<State<P>>,
        target: State<P>,
    ) -> Self
    where
        P: 'static,
    {
        Self {
            inner: Arc::new(TransitionInner {
                name,
                machine,
                sources,
                target,
                vetoes: Mutex::new(Vec::new()),
                invoked: Channel::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Legal source states, in declaration order.
    pub fn sources(&self) -> &[State<P>] {
        &self.inner.sources
    }

    pub fn target(&self) -> &State<P> {
        &self.inner.target
    }

    /// True if the source list contains [`State::ANY`].
    pub fn is_wildcard(&self) -> bool {
        self.inner.sources.iter().any(State::is_wildcard)
    }

    /// True if `state` is a legal source, directly or through the wildcard.
    ///
    /// The placeholder a machine occupies before `start` is never legal.
    pub fn accepts(&self, state: &State<P>) -> bool {
        if state.is_wildcard() || state.is_sentinel() {
            return false;
        }
        self.is_wildcard() || self.inner.sources.contains(state)
    }

    /// Number of registered vetoes.
    pub fn veto_count(&self) -> usize {
        self.inner.vetoes.lock().len()
    }

    /// Register a veto. Vetoes run in registration order at every
    /// invocation and may be added after the machine has started.
    ///
    /// Vetoes run inside the machine's dispatch, so a veto that invokes a
    /// transition of the same machine gets [`MachineError::Reentrant`].
    pub fn cancel_if<F>(&self, predicate: F)
    where
        F: Fn(&StateChange<P>) -> bool + Send + Sync + 'static,
    {
        self.add_veto(Veto::new(predicate));
    }

    pub fn add_veto(&self, veto: Veto<P>) {
        let mut vetoes = self.inner.vetoes.lock();
        vetoes.push(veto);
        trace!(transition = %self.inner.name, vetoes = vetoes.len(), "veto registered");
    }

    fn machine(&self) -> Result<Arc<MachineInner<P>>, P> {
        self.inner
            .machine
            .upgrade()
            .ok_or_else(|| MachineError::Detached(self.inner.name.clone()))
    }

    /// Build the change this invocation would produce, checking lifecycle
    /// and source legality. Vetoes are not consulted.
    fn candidate(
        &self,
        machine: &MachineInner<P>,
        payload: Option<P>,
    ) -> Result<StateChange<P>, P> {
        if !machine.is_started() {
            return Err(MachineError::NotStarted {
                transition: self.inner.name.clone(),
                machine: machine.name().to_owned(),
            });
        }

        let from = machine.current();
        if !self.accepts(&from) {
            return Err(MachineError::IllegalTransition {
                transition: self.clone(),
                from,
                to: self.inner.target.clone(),
            });
        }

        Ok(StateChange::new(from, self.inner.target.clone(), payload))
    }

    /// Index of the first veto cancelling `change`. The veto list is copied
    /// first so a veto may register further vetoes.
    fn vetoed(&self, change: &StateChange<P>) -> Option<usize> {
        let vetoes = self.inner.vetoes.lock().clone();
        first_veto(&vetoes, change)
    }
}

impl<P: 'static> Transition<P> {
    /// Move the machine to this transition's target.
    ///
    /// Returns `Ok(true)` once the change has been applied and every
    /// subscriber has been notified, `Ok(false)` if a veto cancelled it, and
    /// an error if the machine has not started or the current state is not a
    /// legal source.
    ///
    /// Handlers and vetoes cannot move their own machine: invoking a
    /// transition of the same machine from one of them fails with
    /// [`MachineError::Reentrant`]. Chain transitions after `invoke` returns.
    ///
    /// Notifications go out in a fixed order: leave of the old state, enter
    /// of the new state, the machine-wide channel, then this transition's own
    /// subscribers.
    pub fn invoke(&self, payload: Option<P>) -> Result<bool, P> {
        let machine = self.machine()?;
        let Some(_dispatch) = machine.begin_dispatch() else {
            debug!(
                machine = %machine.name(),
                transition = %self.inner.name,
                "re-entrant invocation refused"
            );
            return Err(MachineError::Reentrant {
                transition: self.inner.name.clone(),
                machine: machine.name().to_owned(),
            });
        };

        let change = self.candidate(&machine, payload)?;
        if let Some(index) = self.vetoed(&change) {
            debug!(
                machine = %machine.name(),
                transition = %self.inner.name,
                from = %change.from.name(),
                veto = index,
                "transition cancelled"
            );
            return Ok(false);
        }

        machine.apply(&change);
        self.inner.invoked.publish(&change);
        Ok(true)
    }

    /// Whether [`invoke`](Transition::invoke) with this payload would
    /// currently succeed. Nothing is mutated and nothing is notified.
    pub fn can_invoke(&self, payload: Option<P>) -> bool {
        let Ok(machine) = self.machine() else {
            return false;
        };
        let Some(_dispatch) = machine.begin_dispatch() else {
            return false;
        };

        match self.candidate(&machine, payload) {
            Ok(change) => self.vetoed(&change).is_none(),
            Err(_) => false,
        }
    }

    /// Subscribe to every successful invocation of this transition.
    pub fn on_invoke<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&StateChange<P>) + Send + Sync + 'static,
    {
        self.inner.invoked.subscribe(handler)
    }

    /// Close this transition's channel. Idempotent.
    pub fn close(&self) {
        self.inner.invoked.close();
    }
}

impl<P> Clone for Transition<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> PartialEq for Transition<P> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<P> Eq for Transition<P> {}

impl<P> fmt::Display for Transition<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources: Vec<&str> = self.inner.sources.iter().map(State::name).collect();
        write!(
            f,
            "Transition({}: [{}] -> {})",
            self.inner.name,
            sources.join(", "),
            self.inner.target.name()
        )
    }
}

impl<P> fmt::Debug for Transition<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources: Vec<&str> = self.inner.sources.iter().map(State::name).collect();
        f.debug_struct("Transition")
            .field("name", &self.inner.name)
            .field("sources", &sources)
            .field("target", &self.inner.target.name())
            .field("vetoes", &self.veto_count())
            .finish()
    }
}
