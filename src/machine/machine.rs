//! The machine: current state, lifecycle lock and the machine-wide change
//! channel.

use super::error::{MachineError, Result};
use super::snapshot::{MachineSnapshot, StateSummary, TransitionSummary};
use super::{State, Transition};
use crate::core::{Channel, StateChange, Subscription};
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};
use uuid::Uuid;

/// Name of the placeholder state a machine occupies before `start`.
pub const NONE_STATE_NAME: &str = "none";

/// Unique identifier of a machine instance, used in logs and snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MachineId(pub Uuid);

impl MachineId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MachineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything guarded by the start lock.
struct Registry<P> {
    started: bool,
    states: Vec<State<P>>,
    transitions: Vec<Transition<P>>,
}

pub(crate) struct MachineInner<P> {
    id: MachineId,
    name: String,
    none: State<P>,
    current: Mutex<State<P>>,
    registry: Mutex<Registry<P>>,
    /// Held across validate, apply and publish so that reading and replacing
    /// the current state and notifying subscribers is one critical section.
    /// The flag is set while a dispatch is open; a handler on the same thread
    /// re-acquires the lock, sees the flag and is refused.
    dispatch: ReentrantMutex<Cell<bool>>,
    changes: Channel<StateChange<P>>,
}

impl<P> MachineInner<P> {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn current(&self) -> State<P> {
        self.current.lock().clone()
    }

    pub(crate) fn is_started(&self) -> bool {
        self.registry.lock().started
    }

    /// Enter the dispatch critical section, blocking other threads.
    ///
    /// Returns `None` when this thread is already dispatching a change on
    /// this machine, i.e. when called from a handler or a veto.
    pub(crate) fn begin_dispatch(&self) -> Option<Dispatch<'_>> {
        let guard = self.dispatch.lock();
        if guard.replace(true) {
            return None;
        }
        Some(Dispatch { guard })
    }
}

/// An open dispatch. The busy flag is cleared on drop, so a panicking
/// handler does not leave the machine refusing every later invocation.
pub(crate) struct Dispatch<'a> {
    guard: ReentrantMutexGuard<'a, Cell<bool>>,
}

impl Drop for Dispatch<'_> {
    fn drop(&mut self) {
        self.guard.set(false);
    }
}

impl<P: 'static> MachineInner<P> {
    /// The only place the current state changes.
    ///
    /// Leave of the old state fires before `current` is replaced, enter of
    /// the new state after, and the machine-wide channel last.
    pub(crate) fn apply(&self, change: &StateChange<P>) {
        debug!(
            machine = %self.name,
            id = %self.id,
            from = %change.from.name(),
            to = %change.to.name(),
            "applying state change"
        );
        change.from.notify_leave(change);
        *self.current.lock() = change.to.clone();
        change.to.notify_enter(change);
        self.changes.publish(change);
    }
}

/// A finite state machine.
///
/// The machine is a factory for its own [`State`]s and [`Transition`]s,
/// which may only be declared before [`start`](Machine::start). Once started
/// the structure is locked and the machine moves only when a transition is
/// invoked.
///
/// `Machine` is a cheap handle; clones refer to the same machine. States and
/// transitions hold only a weak link back to it.
///
/// # Example
///
/// ```rust
/// use statekit::{Machine, MachineError};
///
/// let machine: Machine = Machine::new("turnstile");
/// let locked = machine.new_state("Locked").unwrap();
/// let unlocked = machine.new_state("Unlocked").unwrap();
/// let coin = machine.new_transition("coin", &[locked.clone()], &unlocked).unwrap();
/// let push = machine.new_transition("push", &[unlocked.clone()], &locked).unwrap();
///
/// machine.start(&locked).unwrap();
/// assert!(coin.invoke(None).unwrap());
/// assert!(push.invoke(None).unwrap());
/// assert_eq!(machine.current(), locked);
///
/// assert!(matches!(
///     machine.new_state("Broken"),
///     Err(MachineError::IllegalMutation { .. })
/// ));
/// ```
pub struct Machine<P = ()> {
    inner: Arc<MachineInner<P>>,
}

impl<P: 'static> Machine<P> {
    /// Create an unstarted machine. `name` is only used for diagnostics.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let id = MachineId::new();
        let inner = Arc::new_cyclic(|weak: &Weak<MachineInner<P>>| {
            let none = State::declared(NONE_STATE_NAME.to_owned(), weak.clone(), true);
            MachineInner {
                id,
                name,
                current: Mutex::new(none.clone()),
                none,
                registry: Mutex::new(Registry {
                    started: false,
                    states: Vec::new(),
                    transitions: Vec::new(),
                }),
                dispatch: ReentrantMutex::new(Cell::new(false)),
                changes: Channel::new(),
            }
        });
        trace!(machine = %inner.name, id = %id, "machine created");
        Self { inner }
    }

    /// Declare a state. Fails once the machine has started.
    pub fn new_state(&self, name: impl Into<String>) -> Result<State<P>, P> {
        let name = name.into();
        let mut registry = self.inner.registry.lock();
        if registry.started {
            return Err(self.illegal_mutation(format!("declare state '{name}'")));
        }

        let state = State::declared(name, Arc::downgrade(&self.inner), false);
        registry.states.push(state.clone());
        trace!(machine = %self.inner.name, state = %state.name(), "state declared");
        Ok(state)
    }

    /// Declare a transition from any of `from` to `to`.
    ///
    /// `from` may contain [`State::ANY`]. `to` must be a concrete state of
    /// this machine. Fails once the machine has started.
    pub fn new_transition(
        &self,
        name: impl Into<String>,
        from: &[State<P>],
        to: &State<P>,
    ) -> Result<Transition<P>, P> {
        let name = name.into();
        let mut registry = self.inner.registry.lock();
        if registry.started {
            return Err(self.illegal_mutation(format!("declare transition '{name}'")));
        }

        self.check_member(to, &format!("the target of transition '{name}'"))?;
        for source in from.iter().filter(|s| !s.is_wildcard()) {
            self.check_member(source, &format!("a source of transition '{name}'"))?;
        }

        let transition = Transition::new(
            name,
            Arc::downgrade(&self.inner),
            from.to_vec(),
            to.clone(),
        );
        registry.transitions.push(transition.clone());
        trace!(machine = %self.inner.name, transition = %transition, "transition declared");
        Ok(transition)
    }

    /// Enter `initial` and lock the machine's structure.
    ///
    /// Source legality does not apply: any state of this machine may be the
    /// initial state. Subscribers are notified exactly as for a transition,
    /// with `from` set to the placeholder state. Succeeds at most once.
    pub fn start(&self, initial: &State<P>) -> Result<(), P> {
        // Only a started machine dispatches, so a refused dispatch means a
        // handler of this machine is calling `start`.
        let Some(_dispatch) = self.inner.begin_dispatch() else {
            return Err(MachineError::AlreadyStarted {
                machine: self.inner.name.clone(),
            });
        };
        {
            let mut registry = self.inner.registry.lock();
            if registry.started {
                return Err(MachineError::AlreadyStarted {
                    machine: self.inner.name.clone(),
                });
            }
            self.check_member(initial, "the initial state")?;
            registry.started = true;
        }

        debug!(
            machine = %self.inner.name,
            id = %self.inner.id,
            initial = %initial.name(),
            "machine started"
        );
        let change = StateChange::new(self.inner.none.clone(), initial.clone(), None);
        self.inner.apply(&change);
        Ok(())
    }

    /// Subscribe to every state change of this machine, after the states'
    /// own enter and leave subscribers have run.
    pub fn on_change<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&StateChange<P>) + Send + Sync + 'static,
    {
        self.inner.changes.subscribe(handler)
    }

    /// Release every subscription owned by this machine and by the states
    /// and transitions it declared. Idempotent.
    ///
    /// The machine stays usable; it simply has no one left to notify.
    pub fn close(&self) {
        let (states, transitions) = {
            let registry = self.inner.registry.lock();
            (registry.states.clone(), registry.transitions.clone())
        };

        self.inner.changes.close();
        self.inner.none.close();
        for state in &states {
            state.close();
        }
        for transition in &transitions {
            transition.close();
        }
        trace!(machine = %self.inner.name, "machine closed");
    }

    /// Diagnostic view of the machine.
    pub fn snapshot(&self) -> MachineSnapshot {
        let registry = self.inner.registry.lock();
        let current = self.inner.current();
        MachineSnapshot {
            id: self.inner.id,
            name: self.inner.name.clone(),
            started: registry.started,
            current: current.name().to_owned(),
            states: registry
                .states
                .iter()
                .map(|state| StateSummary {
                    name: state.name().to_owned(),
                    active: *state == current,
                })
                .collect(),
            transitions: registry
                .transitions
                .iter()
                .map(|transition| TransitionSummary {
                    name: transition.name().to_owned(),
                    sources: transition
                        .sources()
                        .iter()
                        .map(|s| s.name().to_owned())
                        .collect(),
                    target: transition.target().name().to_owned(),
                    vetoes: transition.veto_count(),
                })
                .collect(),
        }
    }
}

impl<P> Machine<P> {
    pub fn id(&self) -> MachineId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_started(&self) -> bool {
        self.inner.is_started()
    }

    /// The state the machine occupies. Before `start` this is a placeholder
    /// named `none` that is not among [`states`](Machine::states).
    pub fn current(&self) -> State<P> {
        self.inner.current()
    }

    /// Declared states in declaration order.
    pub fn states(&self) -> Vec<State<P>> {
        self.inner.registry.lock().states.clone()
    }

    /// Declared transitions in declaration order.
    pub fn transitions(&self) -> Vec<Transition<P>> {
        self.inner.registry.lock().transitions.clone()
    }

    fn illegal_mutation(&self, operation: String) -> MachineError<P> {
        MachineError::IllegalMutation {
            machine: self.inner.name.clone(),
            operation,
        }
    }

    fn check_member(&self, state: &State<P>, role: &str) -> Result<(), P> {
        if state.is_wildcard() {
            return Err(MachineError::InvalidArgument(format!(
                "the wildcard marker cannot be {role}"
            )));
        }
        if state.is_sentinel() {
            return Err(MachineError::InvalidArgument(format!(
                "the placeholder state cannot be {role}"
            )));
        }
        if !state.belongs_to(&self.inner) {
            return Err(MachineError::InvalidArgument(format!(
                "state '{}' does not belong to machine '{}' and cannot be {role}",
                state.name(),
                self.inner.name
            )));
        }
        Ok(())
    }
}

impl<P> Clone for Machine<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> PartialEq for Machine<P> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<P> Eq for Machine<P> {}

impl<P> fmt::Display for Machine<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self.current();
        let names: Vec<String> = self
            .states()
            .iter()
            .map(|s| {
                if *s == current {
                    format!("{}*", s.name())
                } else {
                    s.name().to_owned()
                }
            })
            .collect();
        write!(
            f,
            "Machine({}: current={}, states=[{}])",
            self.inner.name,
            current.name(),
            names.join(", ")
        )
    }
}

impl<P> fmt::Debug for Machine<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("name", &self.inner.name)
            .field("id", &self.inner.id)
            .field("started", &self.is_started())
            .field("current", &self.current().name())
            .field("states", &self.states().len())
            .field("transitions", &self.transitions().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HistoryRecorder;

    #[test]
    fn current_is_placeholder_before_start() {
        let machine: Machine = Machine::new("m");
        let a = machine.new_state("A").unwrap();

        let current = machine.current();
        assert_eq!(current.name(), NONE_STATE_NAME);
        assert!(!machine.states().contains(&current));
        assert!(!a.is_active());
        assert!(!machine.is_started());
    }

    #[test]
    fn start_enters_initial_state_from_placeholder() {
        let machine: Machine = Machine::new("m");
        let a = machine.new_state("A").unwrap();
        let placeholder = machine.current();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        a.on_enter(move |change| sink.lock().push((change.from.clone(), change.to.clone())));

        machine.start(&a).unwrap();

        assert!(machine.is_started());
        assert_eq!(*seen.lock(), vec![(placeholder, a.clone())]);
    }

    #[test]
    fn start_succeeds_at_most_once() {
        let machine: Machine = Machine::new("m");
        let a = machine.new_state("A").unwrap();
        let b = machine.new_state("B").unwrap();

        machine.start(&a).unwrap();
        assert!(matches!(
            machine.start(&b),
            Err(MachineError::AlreadyStarted { .. })
        ));
        assert!(matches!(
            machine.start(&a),
            Err(MachineError::AlreadyStarted { .. })
        ));
        assert_eq!(machine.current(), a);
    }

    #[test]
    fn declarations_are_locked_after_start() {
        let machine: Machine = Machine::new("m");
        let a = machine.new_state("A").unwrap();
        machine.start(&a).unwrap();

        assert!(matches!(
            machine.new_state("B"),
            Err(MachineError::IllegalMutation { .. })
        ));
        assert!(matches!(
            machine.new_transition("loop", &[a.clone()], &a),
            Err(MachineError::IllegalMutation { .. })
        ));
        assert_eq!(machine.states().len(), 1);
        assert!(machine.transitions().is_empty());
    }

    #[test]
    fn wildcard_cannot_be_a_target_or_initial_state() {
        let machine: Machine = Machine::new("m");
        let a = machine.new_state("A").unwrap();

        assert!(matches!(
            machine.new_transition("bad", &[a.clone()], &State::ANY),
            Err(MachineError::InvalidArgument(_))
        ));
        assert!(matches!(
            machine.start(&State::ANY),
            Err(MachineError::InvalidArgument(_))
        ));
        assert!(!machine.is_started());
    }

    #[test]
    fn foreign_states_are_rejected() {
        let machine: Machine = Machine::new("m");
        let other: Machine = Machine::new("other");
        let a = machine.new_state("A").unwrap();
        let stranger = other.new_state("X").unwrap();

        assert!(matches!(
            machine.new_transition("t", &[stranger.clone()], &a),
            Err(MachineError::InvalidArgument(_))
        ));
        assert!(matches!(
            machine.new_transition("t", &[a.clone()], &stranger),
            Err(MachineError::InvalidArgument(_))
        ));
        assert!(matches!(
            machine.start(&stranger),
            Err(MachineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn placeholder_cannot_be_declared_as_source() {
        let machine: Machine = Machine::new("m");
        let a = machine.new_state("A").unwrap();

        assert!(matches!(
            machine.new_transition("t", &[machine.current()], &a),
            Err(MachineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn machine_channel_fires_after_enter_and_leave() {
        let machine: Machine = Machine::new("m");
        let a = machine.new_state("A").unwrap();
        let b = machine.new_state("B").unwrap();
        let go = machine.new_transition("go", &[a.clone()], &b).unwrap();

        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        machine.on_change(move |c| sink.lock().push(format!("machine {c}")));
        let sink = log.clone();
        b.on_enter(move |c| sink.lock().push(format!("enter {c}")));
        let sink = log.clone();
        a.on_leave(move |c| sink.lock().push(format!("leave {c}")));

        machine.start(&a).unwrap();
        go.invoke(None).unwrap();

        assert_eq!(
            *log.lock(),
            vec!["machine none -> A", "leave A -> B", "enter A -> B", "machine A -> B"]
        );
    }

    fn chain() -> (Machine, [State; 3], Transition, Transition) {
        let machine: Machine = Machine::new("m");
        let a = machine.new_state("A").unwrap();
        let b = machine.new_state("B").unwrap();
        let c = machine.new_state("C").unwrap();
        let go = machine.new_transition("go", &[a.clone()], &b).unwrap();
        let onward = machine.new_transition("onward", &[b.clone()], &c).unwrap();
        (machine, [a, b, c], go, onward)
    }

    #[test]
    fn enter_handler_cannot_invoke_while_dispatching() {
        let (machine, [a, b, c], go, onward) = chain();
        let stream = Arc::new(Mutex::new(Vec::new()));
        let sink = stream.clone();
        machine.on_change(move |change| sink.lock().push(change.to_string()));
        let recorder = HistoryRecorder::attach(&machine);

        let nested = Arc::new(Mutex::new(None));
        let slot = nested.clone();
        let chained = onward.clone();
        b.on_enter(move |_| *slot.lock() = Some(chained.invoke(None)));

        machine.start(&a).unwrap();
        assert!(go.invoke(None).unwrap());

        assert!(matches!(
            nested.lock().take(),
            Some(Err(MachineError::Reentrant { .. }))
        ));
        assert_eq!(machine.current(), b);
        assert_eq!(*stream.lock(), vec!["none -> A", "A -> B"]);
        assert_eq!(recorder.get_path(), vec!["none", "A", "B"]);

        // Once the outer dispatch has returned the chain may continue.
        assert!(onward.invoke(None).unwrap());
        assert_eq!(machine.current(), c);
        assert_eq!(*stream.lock(), vec!["none -> A", "A -> B", "B -> C"]);
        assert_eq!(recorder.get_path().last().map(String::as_str), Some("C"));
    }

    #[test]
    fn leave_handler_cannot_overwrite_the_change_in_flight() {
        let (machine, [a, b, _c], go, _onward) = chain();
        let reset = machine.transitions()[0].clone();
        let refused = Arc::new(Mutex::new(false));
        let flag = refused.clone();
        a.on_leave(move |_| {
            *flag.lock() = matches!(reset.invoke(None), Err(MachineError::Reentrant { .. }));
        });

        machine.start(&a).unwrap();
        assert!(go.invoke(None).unwrap());

        assert!(*refused.lock());
        assert_eq!(machine.current(), b);
    }

    #[test]
    fn start_from_a_handler_is_refused() {
        let (machine, [a, _b, _c], _go, _onward) = chain();
        let again = machine.clone();
        let initial = a.clone();
        let result = Arc::new(Mutex::new(None));
        let slot = result.clone();
        a.on_enter(move |_| *slot.lock() = Some(again.start(&initial)));

        machine.start(&a).unwrap();

        assert!(matches!(
            result.lock().take(),
            Some(Err(MachineError::AlreadyStarted { .. }))
        ));
    }

    #[test]
    fn panicking_handler_does_not_wedge_dispatch() {
        let (machine, [a, b, c], go, onward) = chain();
        b.on_enter(|_| panic!("handler failure"));
        machine.start(&a).unwrap();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| go.invoke(None)));
        assert!(outcome.is_err());
        assert_eq!(machine.current(), b);

        assert!(onward.invoke(None).unwrap());
        assert_eq!(machine.current(), c);
    }

    #[test]
    fn close_releases_every_channel() {
        let machine: Machine = Machine::new("m");
        let a = machine.new_state("A").unwrap();
        let b = machine.new_state("B").unwrap();
        let go = machine.new_transition("go", &[a.clone()], &b).unwrap();

        let subs = vec![
            machine.on_change(|_| panic!("machine channel fired after close")),
            a.on_leave(|_| panic!("leave fired after close")),
            b.on_enter(|_| panic!("enter fired after close")),
            go.on_invoke(|_| panic!("transition fired after close")),
        ];

        machine.close();
        machine.close();

        assert!(subs.iter().all(|s| !s.is_active()));
        machine.start(&a).unwrap();
        assert!(go.invoke(None).unwrap());
        assert!(b.is_active());
    }

    #[test]
    fn display_renders_name_current_and_states() {
        let machine: Machine = Machine::new("door");
        let open = machine.new_state("Open").unwrap();
        machine.new_state("Closed").unwrap();

        assert_eq!(
            machine.to_string(),
            "Machine(door: current=none, states=[Open, Closed])"
        );
        machine.start(&open).unwrap();
        assert_eq!(
            machine.to_string(),
            "Machine(door: current=Open, states=[Open*, Closed])"
        );
    }

    #[test]
    fn clones_share_identity() {
        let machine: Machine = Machine::new("m");
        let copy = machine.clone();
        let other: Machine = Machine::new("m");

        assert_eq!(machine, copy);
        assert_ne!(machine, other);
        assert_eq!(machine.id(), copy.id());
        assert_ne!(machine.id(), other.id());
    }
}
